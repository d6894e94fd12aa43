//! Pluggable construction strategies.
//!
//! Three decisions are delegated to strategy objects held in
//! [`ContainerOptions`](crate::ContainerOptions): which constructor to call,
//! whether a parameter may be injected at all, and which producer supplies
//! a parameter.

use std::any::TypeId;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::container::Container;
use crate::descriptors::{ConstructorInfo, Parameter, ParameterKind};
use crate::error::{DiError, DiResult, InvalidParameterReason};
use crate::key::TypeInfo;
use crate::producer::InstanceProducer;

/// Selects the constructor the container calls.
pub trait ConstructorResolutionBehavior: Send + Sync {
    /// Returns the index of the chosen constructor in `constructors`.
    ///
    /// `overridden` names the parameters whose values the registration
    /// supplies itself.
    fn select(
        &self,
        implementation: TypeInfo,
        constructors: &[ConstructorInfo],
        overridden: &[&'static str],
        container: &Container,
    ) -> DiResult<usize>;
}

/// Decides whether a constructor parameter can be injected.
pub trait ConstructorVerificationBehavior: Send + Sync {
    fn verify(&self, implementation: TypeInfo, parameter: &Parameter) -> DiResult<()>;
}

/// Finds the producer that supplies a constructor parameter.
pub trait DependencyInjectionBehavior: Send + Sync {
    fn resolve(
        &self,
        container: &Container,
        implementation: TypeInfo,
        parameter: &Parameter,
    ) -> DiResult<Arc<InstanceProducer>>;
}

/// Uses the only constructor; with several, the one with the most
/// parameters, ties going to the first declared.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConstructorResolutionBehavior;

impl ConstructorResolutionBehavior for DefaultConstructorResolutionBehavior {
    fn select(
        &self,
        implementation: TypeInfo,
        constructors: &[ConstructorInfo],
        _overridden: &[&'static str],
        _container: &Container,
    ) -> DiResult<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (index, constructor) in constructors.iter().enumerate() {
            let arity = constructor.parameters().len();
            if best.map_or(true, |(_, most)| arity > most) {
                best = Some((index, arity));
            }
        }
        best.map(|(index, _)| index)
            .ok_or(DiError::NoPublicConstructor(implementation.name()))
    }
}

/// Picks the constructor with the most parameters that can all be resolved.
///
/// A type's only constructor is always used, so its parameter errors are
/// reported as such. Overridden parameters count as resolvable; the others
/// are looked up through the container's [`DependencyInjectionBehavior`].
/// Resolvability is only known once the container is locked; before that the
/// default policy applies.
#[derive(Debug, Default, Clone, Copy)]
pub struct MostResolvableParametersBehavior;

impl ConstructorResolutionBehavior for MostResolvableParametersBehavior {
    fn select(
        &self,
        implementation: TypeInfo,
        constructors: &[ConstructorInfo],
        overridden: &[&'static str],
        container: &Container,
    ) -> DiResult<usize> {
        match constructors.len() {
            0 => return Err(DiError::NoPublicConstructor(implementation.name())),
            1 => return Ok(0),
            _ => {}
        }
        if !container.is_locked() {
            return DefaultConstructorResolutionBehavior.select(implementation, constructors, overridden, container);
        }

        let injection = container.options().dependency_injection();
        let mut best: Option<(usize, usize)> = None;
        for (index, constructor) in constructors.iter().enumerate() {
            let arity = constructor.parameters().len();
            if best.is_some_and(|(_, most)| arity <= most) {
                continue;
            }
            let resolvable = constructor.parameters().iter().all(|parameter| {
                overridden.contains(&parameter.name())
                    || injection.resolve(container, implementation, parameter).is_ok()
            });
            if resolvable {
                best = Some((index, arity));
            }
        }
        best.map(|(index, _)| index)
            .ok_or(DiError::NoResolvableConstructor(implementation.name()))
    }
}

/// Rejects by-value parameters and primitive types with no single obvious
/// registration.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConstructorVerificationBehavior;

impl ConstructorVerificationBehavior for DefaultConstructorVerificationBehavior {
    fn verify(&self, implementation: TypeInfo, parameter: &Parameter) -> DiResult<()> {
        let reason = if parameter.kind() == ParameterKind::Value {
            InvalidParameterReason::ValueType
        } else if is_ambiguous(parameter.type_info()) {
            InvalidParameterReason::Ambiguous
        } else {
            return Ok(());
        };

        Err(DiError::InvalidParameter {
            implementation: implementation.name(),
            parameter: parameter.name(),
            parameter_type: parameter.type_info().name(),
            reason,
        })
    }
}

/// Whether `type_info` is a primitive that can't identify a dependency.
pub fn is_ambiguous(type_info: TypeInfo) -> bool {
    static AMBIGUOUS: Lazy<[TypeId; 18]> = Lazy::new(|| {
        [
            TypeId::of::<String>(),
            TypeId::of::<str>(),
            TypeId::of::<bool>(),
            TypeId::of::<char>(),
            TypeId::of::<i8>(),
            TypeId::of::<i16>(),
            TypeId::of::<i32>(),
            TypeId::of::<i64>(),
            TypeId::of::<i128>(),
            TypeId::of::<isize>(),
            TypeId::of::<u8>(),
            TypeId::of::<u16>(),
            TypeId::of::<u32>(),
            TypeId::of::<u64>(),
            TypeId::of::<u128>(),
            TypeId::of::<usize>(),
            TypeId::of::<f32>(),
            TypeId::of::<f64>(),
        ]
    });
    AMBIGUOUS.contains(&type_info.id())
}

/// Looks the parameter's key up in the container.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDependencyInjectionBehavior;

impl DependencyInjectionBehavior for DefaultDependencyInjectionBehavior {
    fn resolve(
        &self,
        container: &Container,
        implementation: TypeInfo,
        parameter: &Parameter,
    ) -> DiResult<Arc<InstanceProducer>> {
        container.get_registration(&parameter.key()).map_err(|err| match err {
            DiError::NotRegistered(_) => DiError::UnregisteredParameter {
                implementation: implementation.name(),
                parameter: parameter.name(),
                parameter_type: parameter.key().to_string(),
            },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::Constructor;

    struct Widget;

    fn infos(arities: &[usize]) -> Vec<ConstructorInfo> {
        const NAMES: [&str; 4] = ["a", "b", "c", "d"];
        arities
            .iter()
            .map(|&arity| {
                let mut constructor = Constructor::<Widget>::new("ctor", |_| Ok(Widget));
                for name in NAMES.iter().copied().take(arity) {
                    constructor = constructor.param(Parameter::service::<Widget>(name));
                }
                constructor.info().clone()
            })
            .collect()
    }

    #[test]
    fn default_resolution_prefers_most_parameters_then_declaration_order() {
        let container = Container::new();
        let widget = TypeInfo::of::<Widget>();
        let behavior = DefaultConstructorResolutionBehavior;

        assert_eq!(behavior.select(widget, &infos(&[2]), &[], &container).unwrap(), 0);
        assert_eq!(behavior.select(widget, &infos(&[1, 3, 2]), &[], &container).unwrap(), 1);
        assert_eq!(behavior.select(widget, &infos(&[2, 2]), &[], &container).unwrap(), 0);
        assert!(matches!(
            behavior.select(widget, &[], &[], &container),
            Err(DiError::NoPublicConstructor(_))
        ));
    }

    #[test]
    fn verification_rejects_values_and_primitives() {
        let widget = TypeInfo::of::<Widget>();
        let behavior = DefaultConstructorVerificationBehavior;

        assert!(behavior.verify(widget, &Parameter::service::<Widget>("widget")).is_ok());
        assert!(matches!(
            behavior.verify(widget, &Parameter::value::<Vec<u8>>("buffer")),
            Err(DiError::InvalidParameter { reason: InvalidParameterReason::ValueType, .. })
        ));
        assert!(matches!(
            behavior.verify(widget, &Parameter::service::<String>("name")),
            Err(DiError::InvalidParameter { reason: InvalidParameterReason::Ambiguous, .. })
        ));
    }
}
