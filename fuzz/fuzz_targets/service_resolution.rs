#![no_main]

use keystone_di::{Constructor, Container, Injectable, Lifestyle, Parameter, Resolver};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

macro_rules! node {
    ($ty:ident $(, $dep:ident)*) => {
        struct $ty;

        impl Injectable for $ty {
            fn constructors() -> Vec<Constructor<Self>> {
                vec![Constructor::new("new", |args| {
                    $( let _: Arc<$dep> = args.next()?; )*
                    Ok($ty)
                })
                $( .param(Parameter::service::<$dep>(stringify!($dep))) )*]
            }
        }
    };
}

node!(A, B, C);
node!(B, C);
node!(C);
node!(D, A);
node!(E, E);

fn lifestyle(byte: u8) -> Lifestyle {
    match byte % 3 {
        0 => Lifestyle::Transient,
        1 => Lifestyle::Singleton,
        _ => Lifestyle::scoped(),
    }
}

// Arbitrary subsets of a small graph, with a self-cycle in E: resolution and
// verification must report errors rather than panic or overflow.
fuzz_target!(|data: &[u8]| {
    if data.len() < 6 {
        return;
    }

    let mask = data[0];
    let container = Container::new();
    if mask & 0b00001 != 0 { let _ = container.register_concrete::<A>(lifestyle(data[1])); }
    if mask & 0b00010 != 0 { let _ = container.register_concrete::<B>(lifestyle(data[2])); }
    if mask & 0b00100 != 0 { let _ = container.register_concrete::<C>(lifestyle(data[3])); }
    if mask & 0b01000 != 0 { let _ = container.register_concrete::<D>(lifestyle(data[4])); }
    if mask & 0b10000 != 0 { let _ = container.register_concrete::<E>(lifestyle(data[5])); }

    let verified = container.verify();
    let scope = container.begin_scope();

    let resolved_a = scope.get_instance::<A>().is_ok();
    let _ = scope.get_instance::<D>();
    assert!(scope.get_instance::<E>().is_err());

    if verified.is_ok() && mask & 0b00001 != 0 {
        assert!(resolved_a);
    }
});
