//! Container-wide options.
//!
//! Options are fixed when the container is created and hold the pluggable
//! construction strategies plus registration and verification policy.

use std::fmt;
use std::sync::Arc;

use crate::behaviors::{
    ConstructorResolutionBehavior, ConstructorVerificationBehavior, DefaultConstructorResolutionBehavior,
    DefaultConstructorVerificationBehavior, DefaultDependencyInjectionBehavior, DependencyInjectionBehavior,
};
use crate::lifestyle::Lifestyle;

const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 1024;

/// What [`Container::verify`](crate::Container::verify) does beyond building the graph.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOption {
    /// Compile every producer and run the graph diagnostics
    #[default]
    Compile,
    /// Additionally resolve every producer inside a throw-away scope
    VerifyAndInstantiate,
}

/// Configuration for a [`Container`](crate::Container).
///
/// # Examples
///
/// ```rust
/// use keystone_di::{Container, ContainerOptions, Lifestyle, MostResolvableParametersBehavior};
///
/// let options = ContainerOptions::new()
///     .with_default_lifestyle(Lifestyle::Singleton)
///     .with_allow_overriding_registrations(true)
///     .with_constructor_resolution(MostResolvableParametersBehavior);
///
/// let container = Container::with_options(options);
/// assert!(container.options().allow_overriding_registrations());
/// ```
#[derive(Clone)]
pub struct ContainerOptions {
    constructor_resolution: Arc<dyn ConstructorResolutionBehavior>,
    constructor_verification: Arc<dyn ConstructorVerificationBehavior>,
    dependency_injection: Arc<dyn DependencyInjectionBehavior>,
    default_lifestyle: Lifestyle,
    allow_overriding_registrations: bool,
    verification: VerificationOption,
    max_resolution_depth: usize,
}

impl ContainerOptions {
    pub fn new() -> Self {
        Self {
            constructor_resolution: Arc::new(DefaultConstructorResolutionBehavior),
            constructor_verification: Arc::new(DefaultConstructorVerificationBehavior),
            dependency_injection: Arc::new(DefaultDependencyInjectionBehavior),
            default_lifestyle: Lifestyle::Transient,
            allow_overriding_registrations: false,
            verification: VerificationOption::Compile,
            max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
        }
    }

    pub fn with_constructor_resolution(mut self, behavior: impl ConstructorResolutionBehavior + 'static) -> Self {
        self.constructor_resolution = Arc::new(behavior);
        self
    }

    pub fn with_constructor_verification(mut self, behavior: impl ConstructorVerificationBehavior + 'static) -> Self {
        self.constructor_verification = Arc::new(behavior);
        self
    }

    pub fn with_dependency_injection(mut self, behavior: impl DependencyInjectionBehavior + 'static) -> Self {
        self.dependency_injection = Arc::new(behavior);
        self
    }

    /// Lifestyle used by [`Container::register_default`](crate::Container::register_default).
    pub fn with_default_lifestyle(mut self, lifestyle: Lifestyle) -> Self {
        self.default_lifestyle = lifestyle;
        self
    }

    /// When enabled, registering an existing key replaces the earlier registration.
    pub fn with_allow_overriding_registrations(mut self, allow: bool) -> Self {
        self.allow_overriding_registrations = allow;
        self
    }

    pub fn with_verification(mut self, verification: VerificationOption) -> Self {
        self.verification = verification;
        self
    }

    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    pub fn constructor_resolution(&self) -> &dyn ConstructorResolutionBehavior {
        self.constructor_resolution.as_ref()
    }

    pub fn constructor_verification(&self) -> &dyn ConstructorVerificationBehavior {
        self.constructor_verification.as_ref()
    }

    pub fn dependency_injection(&self) -> &dyn DependencyInjectionBehavior {
        self.dependency_injection.as_ref()
    }

    pub fn default_lifestyle(&self) -> &Lifestyle {
        &self.default_lifestyle
    }

    pub fn allow_overriding_registrations(&self) -> bool {
        self.allow_overriding_registrations
    }

    pub fn verification(&self) -> VerificationOption {
        self.verification
    }

    pub fn max_resolution_depth(&self) -> usize {
        self.max_resolution_depth
    }
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContainerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerOptions")
            .field("default_lifestyle", &self.default_lifestyle)
            .field("allow_overriding_registrations", &self.allow_overriding_registrations)
            .field("verification", &self.verification)
            .field("max_resolution_depth", &self.max_resolution_depth)
            .finish_non_exhaustive()
    }
}
