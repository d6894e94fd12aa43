#![no_main]

use keystone_di::{Constructor, Container, ContainerOptions, DiError, Injectable, Lifestyle, Resolver};
use libfuzzer_sys::fuzz_target;

struct TestService;

impl Injectable for TestService {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |_| Ok(TestService))]
    }
}

const NAMES: [&str; 4] = ["a", "b", "c", "d"];

fn lifestyle(byte: u8) -> Lifestyle {
    match byte % 4 {
        0 => Lifestyle::Transient,
        1 => Lifestyle::Singleton,
        2 => Lifestyle::scoped(),
        _ => Lifestyle::hybrid(move || byte % 8 < 4, Lifestyle::Singleton, Lifestyle::Transient),
    }
}

// Each pair of bytes is one operation; registration must never panic and
// must fail cleanly once the container is locked.
fuzz_target!(|data: &[u8]| {
    let allow_overriding = data.first().is_some_and(|byte| byte & 1 == 1);
    let container = Container::with_options(ContainerOptions::new().with_allow_overriding_registrations(allow_overriding));

    for op in data.chunks_exact(2) {
        let name = NAMES[(op[0] as usize >> 1) % NAMES.len()];
        match op[0] % 4 {
            0 => {
                let result = container.register_named::<TestService, TestService>(name, lifestyle(op[1]));
                if container.is_locked() {
                    assert!(matches!(result, Err(DiError::Locked)));
                }
            }
            1 => {
                let _ = container.append_to_collection::<TestService, TestService>(lifestyle(op[1]));
            }
            2 => {
                let scope = container.begin_scope();
                let _ = scope.get_named_instance::<TestService>(name);
                let _ = scope.get_all_instances::<TestService>();
            }
            _ => {
                let _ = container.verify();
                assert!(container.is_locked());
            }
        }
    }
});
