//! Property-based tests for registration and resolution.

use keystone_di::{Constructor, Container, DiError, Injectable, Lifestyle, Resolver};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

const NAMES: [&str; 6] = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"];

struct Widget;

impl Injectable for Widget {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |_| Ok(Widget))]
    }
}

fn lifestyle_strategy() -> impl Strategy<Value = Lifestyle> {
    prop_oneof![Just(Lifestyle::Transient), Just(Lifestyle::Singleton), Just(Lifestyle::scoped())]
}

proptest! {
    // Identity across resolutions depends only on the lifestyle
    #[test]
    fn resolution_identity_matches_lifestyle(
        registrations in prop::collection::vec((0..NAMES.len(), lifestyle_strategy()), 1..12)
    ) {
        let container = Container::new();
        let mut registered = Vec::new();
        let mut seen = HashSet::new();

        for (index, lifestyle) in registrations {
            let result = container.register_named::<Widget, Widget>(NAMES[index], lifestyle.clone());
            if seen.insert(index) {
                prop_assert!(result.is_ok());
                registered.push((NAMES[index], lifestyle));
            } else {
                prop_assert!(matches!(result, Err(DiError::DuplicateRegistration(_))));
            }
        }

        let scope = container.begin_scope();
        for (name, lifestyle) in registered {
            let first = scope.get_named_instance::<Widget>(name).unwrap();
            let second = scope.get_named_instance::<Widget>(name).unwrap();
            let same = Arc::ptr_eq(&first, &second);
            prop_assert_eq!(same, lifestyle != Lifestyle::Transient);

            let other_scope = container.begin_scope();
            let third = other_scope.get_named_instance::<Widget>(name).unwrap();
            prop_assert_eq!(Arc::ptr_eq(&first, &third), lifestyle == Lifestyle::Singleton);
        }
    }

    // Every registered element comes back, in order
    #[test]
    fn collections_preserve_order(count in 0usize..20) {
        let container = Container::new();
        for value in 0..count {
            container.append_instance_to_collection::<usize>(Arc::new(value)).unwrap();
        }

        let values: Vec<usize> = container
            .get_all_instances::<usize>()
            .unwrap()
            .iter()
            .map(|value| **value)
            .collect();
        prop_assert_eq!(values, (0..count).collect::<Vec<_>>());
    }

    // Verification never mutates the outcome of later resolutions
    #[test]
    fn verify_is_repeatable(singleton in any::<bool>(), rounds in 1usize..4) {
        let container = Container::new();
        let lifestyle = if singleton { Lifestyle::Singleton } else { Lifestyle::Transient };
        container.register_concrete::<Widget>(lifestyle).unwrap();

        for _ in 0..rounds {
            let report = container.verify().unwrap();
            prop_assert!(!report.has_warnings());
            prop_assert_eq!(report.graph().nodes.len(), 1);
        }
        prop_assert!(container.get_instance::<Widget>().is_ok());
    }
}
