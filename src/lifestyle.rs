//! Lifestyle definitions.
//!
//! A lifestyle decides how long an instance lives and where it is cached.
//! It is an immutable strategy value: it carries no per-resolution state and
//! can be shared freely between registrations.

use std::fmt;
use std::sync::Arc;

use crate::container::Container;
use crate::descriptors::{Implements, Injectable};
use crate::error::DiResult;
use crate::plan::Instance;
use crate::provider::{AmbientScope, ResolverContext, Scope};
use crate::registration::Registration;
use crate::key::erase;

/// Returns the scope that is active for a container, if any.
pub type ScopeFactory = Arc<dyn Fn(&Container) -> Option<Scope> + Send + Sync>;

/// Predicate evaluated on every resolution of a hybrid registration.
pub type HybridTest = Arc<dyn Fn() -> bool + Send + Sync>;

const TRANSIENT_LENGTH: u32 = 0;
const SCOPED_LENGTH: u32 = 500;
const SINGLETON_LENGTH: u32 = 1000;

/// Instance lifetime strategy.
///
/// | Lifestyle | Cached in | Component length |
/// |-----------|-----------|------------------|
/// | `Transient` | nowhere | 0 |
/// | `Scoped` | the active [`Scope`] | 500 |
/// | `Singleton` | the registration | 1000 |
/// | `Hybrid` | the branch chosen by the test | max of both branches |
///
/// # Examples
///
/// ```rust
/// use keystone_di::{Constructor, Container, Injectable, Lifestyle, Resolver};
/// use std::sync::Arc;
///
/// struct Repository;
/// impl Injectable for Repository {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("new", |_| Ok(Repository))]
///     }
/// }
///
/// let container = Container::new();
/// container.register::<Repository, Repository>(Lifestyle::scoped()).unwrap();
///
/// let first = container.begin_scope();
/// let a = first.get_instance::<Repository>().unwrap();
/// let b = first.get_instance::<Repository>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let second = container.begin_scope();
/// let c = second.get_instance::<Repository>().unwrap();
/// assert!(!Arc::ptr_eq(&a, &c));
/// ```
#[derive(Clone, Default)]
pub enum Lifestyle {
    /// New instance per resolution, never cached
    #[default]
    Transient,
    /// Single instance per registration, created exactly once
    Singleton,
    /// Single instance per active scope
    Scoped(ScopedLifestyle),
    /// Delegates to one of two lifestyles, chosen per resolution
    Hybrid(Arc<HybridLifestyle>),
}

impl Lifestyle {
    /// Scoped lifestyle that uses the scope the request was made through.
    pub fn scoped() -> Self {
        Lifestyle::Scoped(ScopedLifestyle::new())
    }

    /// Scoped lifestyle that falls back to the innermost scope entered on
    /// the current thread with [`AmbientScope::enter`].
    pub fn thread_scoped() -> Self {
        Lifestyle::Scoped(ScopedLifestyle::with_scope_factory("Thread Scoped", |container| {
            AmbientScope::current(container)
        }))
    }

    /// Scoped lifestyle that asks `factory` for the active scope when the
    /// request was made outside of one.
    pub fn scoped_with<F>(name: &'static str, factory: F) -> Self
    where
        F: Fn(&Container) -> Option<Scope> + Send + Sync + 'static,
    {
        Lifestyle::Scoped(ScopedLifestyle::with_scope_factory(name, factory))
    }

    /// Hybrid lifestyle: `when_true` while `test` holds, `when_false` otherwise.
    pub fn hybrid<F>(test: F, when_true: Lifestyle, when_false: Lifestyle) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Lifestyle::Hybrid(Arc::new(HybridLifestyle { test: Arc::new(test), when_true, when_false }))
    }

    /// Display name used in diagnostics.
    pub fn name(&self) -> String {
        match self {
            Lifestyle::Transient => "Transient".to_string(),
            Lifestyle::Singleton => "Singleton".to_string(),
            Lifestyle::Scoped(scoped) => scoped.name().to_string(),
            Lifestyle::Hybrid(hybrid) => format!(
                "Hybrid {} / {}",
                hybrid.when_true.branch_name(),
                hybrid.when_false.branch_name()
            ),
        }
    }

    // Nested hybrids read "Hybrid A / B / C" rather than repeating the prefix
    fn branch_name(&self) -> String {
        match self {
            Lifestyle::Hybrid(_) => self.name().trim_start_matches("Hybrid ").to_string(),
            _ => self.name(),
        }
    }

    /// How long instances of this lifestyle live.
    pub fn component_length(&self) -> u32 {
        match self {
            Lifestyle::Transient => TRANSIENT_LENGTH,
            Lifestyle::Scoped(_) => SCOPED_LENGTH,
            Lifestyle::Singleton => SINGLETON_LENGTH,
            Lifestyle::Hybrid(hybrid) => hybrid
                .when_true
                .component_length()
                .max(hybrid.when_false.component_length()),
        }
    }

    /// Shortest lifetime a component may rely on when depending on this lifestyle.
    pub fn dependency_length(&self) -> u32 {
        match self {
            Lifestyle::Hybrid(hybrid) => hybrid
                .when_true
                .dependency_length()
                .min(hybrid.when_false.dependency_length()),
            _ => self.component_length(),
        }
    }

    /// Creates a registration that constructs `I` and serves it as `S`.
    pub fn create_registration<S, I>(&self, container: &Container) -> Arc<Registration>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        match self {
            Lifestyle::Hybrid(hybrid) => {
                let when_true = hybrid.when_true.create_registration::<S, I>(container);
                let when_false = hybrid.when_false.create_registration::<S, I>(container);
                Registration::hybrid(container, self.clone(), hybrid.test.clone(), when_true, when_false)
            }
            _ => Registration::constructed::<S, I>(container, self.clone()),
        }
    }

    /// Creates a registration whose instances come from `factory`.
    pub fn create_factory_registration<S, F>(&self, container: &Container, factory: F) -> Arc<Registration>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        let factory = Arc::new(factory);
        self.create_erased_factory_registration::<S>(
            container,
            Arc::new(move |context: &ResolverContext| {
                Ok(Instance { value: erase::<S>(factory(context)?), disposable: None })
            }),
        )
    }

    fn create_erased_factory_registration<S>(
        &self,
        container: &Container,
        factory: crate::plan::Factory,
    ) -> Arc<Registration>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        match self {
            Lifestyle::Hybrid(hybrid) => {
                let when_true = hybrid.when_true.create_erased_factory_registration::<S>(container, factory.clone());
                let when_false = hybrid.when_false.create_erased_factory_registration::<S>(container, factory);
                Registration::hybrid(container, self.clone(), hybrid.test.clone(), when_true, when_false)
            }
            _ => Registration::factory::<S>(container, self.clone(), factory),
        }
    }
}

impl PartialEq for Lifestyle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Lifestyle::Transient, Lifestyle::Transient) => true,
            (Lifestyle::Singleton, Lifestyle::Singleton) => true,
            (Lifestyle::Scoped(a), Lifestyle::Scoped(b)) => a == b,
            (Lifestyle::Hybrid(a), Lifestyle::Hybrid(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Lifestyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Display for Lifestyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Scoped lifestyle with an optional scope factory.
#[derive(Clone)]
pub struct ScopedLifestyle {
    name: &'static str,
    factory: Option<ScopeFactory>,
}

impl ScopedLifestyle {
    pub fn new() -> Self {
        Self { name: "Scoped", factory: None }
    }

    pub fn with_scope_factory<F>(name: &'static str, factory: F) -> Self
    where
        F: Fn(&Container) -> Option<Scope> + Send + Sync + 'static,
    {
        Self { name, factory: Some(Arc::new(factory)) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The scope a resolution should cache into.
    ///
    /// The scope carried by the resolution context wins; the scope factory
    /// is only consulted for requests made outside of a scope.
    pub(crate) fn active_scope(&self, context: &ResolverContext) -> Option<Scope> {
        if let Some(scope) = context.scope() {
            return Some(scope.clone());
        }
        self.factory.as_ref().and_then(|factory| factory(context.container()))
    }
}

impl Default for ScopedLifestyle {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ScopedLifestyle {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && match (&self.factory, &other.factory) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            }
    }
}

impl fmt::Debug for ScopedLifestyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedLifestyle")
            .field("name", &self.name)
            .field("has_factory", &self.factory.is_some())
            .finish()
    }
}

/// Two lifestyles and the predicate that picks between them.
pub struct HybridLifestyle {
    pub(crate) test: HybridTest,
    pub(crate) when_true: Lifestyle,
    pub(crate) when_false: Lifestyle,
}

impl HybridLifestyle {
    pub fn when_true(&self) -> &Lifestyle {
        &self.when_true
    }

    pub fn when_false(&self) -> &Lifestyle {
        &self.when_false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_lengths_are_ordered() {
        assert!(Lifestyle::Transient.component_length() < Lifestyle::scoped().component_length());
        assert!(Lifestyle::scoped().component_length() < Lifestyle::Singleton.component_length());
        assert_eq!(Lifestyle::Singleton.dependency_length(), Lifestyle::Singleton.component_length());
    }

    #[test]
    fn hybrid_lengths_are_conservative() {
        let hybrid = Lifestyle::hybrid(|| true, Lifestyle::Singleton, Lifestyle::Transient);
        assert_eq!(hybrid.component_length(), SINGLETON_LENGTH);
        assert_eq!(hybrid.dependency_length(), TRANSIENT_LENGTH);
    }

    #[test]
    fn nested_hybrid_names_are_flattened() {
        let inner = Lifestyle::hybrid(|| false, Lifestyle::scoped(), Lifestyle::Transient);
        let outer = Lifestyle::hybrid(|| true, Lifestyle::Singleton, inner);
        assert_eq!(outer.name(), "Hybrid Singleton / Scoped / Transient");
    }

    #[test]
    fn equality_is_by_identity_for_composed_lifestyles() {
        let hybrid = Lifestyle::hybrid(|| true, Lifestyle::Singleton, Lifestyle::Transient);
        assert_eq!(hybrid, hybrid.clone());
        assert_ne!(hybrid, Lifestyle::hybrid(|| true, Lifestyle::Singleton, Lifestyle::Transient));
        assert_eq!(Lifestyle::scoped(), Lifestyle::scoped());
        assert_ne!(Lifestyle::thread_scoped(), Lifestyle::thread_scoped());
    }
}
