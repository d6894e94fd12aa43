//! Error types for the container.

use std::fmt;

use thiserror::Error;

use crate::diagnostics::DiagnosticIssue;

/// Container errors.
///
/// Every failure the container can report, grouped by [`ErrorCategory`]:
/// configuration errors surface at the registration call that caused them,
/// activation errors surface at resolution time, verification errors are the
/// aggregate produced by [`Container::verify`](crate::Container::verify) and
/// disposal errors are the aggregate produced when a scope ends.
///
/// # Examples
///
/// ```rust
/// use keystone_di::{Container, DiError, Resolver};
///
/// struct Unregistered;
///
/// let container = Container::new();
/// match container.get_instance::<Unregistered>() {
///     Err(DiError::NotRegistered(name)) => assert!(name.ends_with("Unregistered")),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Invalid registration call
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Service key registered twice while overriding is disabled
    #[error("Type {0} has already been registered. Overriding registrations is disabled.")]
    DuplicateRegistration(String),
    /// Registration attempted after the container was locked
    #[error("The container can't be changed after the first call to get_instance, get_all_instances and verify.")]
    Locked,
    /// Operation requires a locked container
    #[error("Invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// Requested service has no registration
    #[error("No registration for type {0} could be found.")]
    NotRegistered(String),
    /// Implementation describes no constructors
    #[error("For the container to be able to create {0}, it should contain at least one public constructor.")]
    NoPublicConstructor(&'static str),
    /// No constructor qualifies under the active resolution behavior
    #[error("For the container to be able to create {0}, it should contain a public constructor that only contains parameters that can be resolved.")]
    NoResolvableConstructor(&'static str),
    /// Constructor parameter rejected by the verification behavior
    #[error("The constructor of type {implementation} contains parameter '{parameter}' of type {parameter_type} which can not be used for constructor injection{reason}.")]
    InvalidParameter {
        implementation: &'static str,
        parameter: &'static str,
        parameter_type: &'static str,
        reason: InvalidParameterReason,
    },
    /// Constructor parameter whose service is not registered
    #[error("The constructor of type {implementation} contains the parameter '{parameter}' of type {parameter_type} that is not registered.")]
    UnregisteredParameter {
        implementation: &'static str,
        parameter: &'static str,
        parameter_type: String,
    },
    /// Scoped service resolved with no active scope
    #[error("{service} is registered as '{lifestyle}', but the instance is requested outside the context of an active scope.")]
    NoActiveScope { service: &'static str, lifestyle: String },
    /// Resolution through a scope that has already ended
    #[error("Cannot resolve {0}: the scope has already ended.")]
    ScopeEnded(&'static str),
    /// Cycle found while resolving (includes path)
    #[error("Cyclic dependency: {}", .0.join(" -> "))]
    Cyclic(Vec<&'static str>),
    /// Maximum resolution depth exceeded
    #[error("Max resolution depth {0} exceeded")]
    DepthExceeded(usize),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// A user factory reported a failure
    #[error("The factory for {service} failed: {message}")]
    Factory { service: &'static str, message: String },

    /// Aggregate of every problem found by `verify`
    #[error("{0}")]
    Verification(VerificationError),
    /// Aggregate of every disposal failure while ending a scope
    #[error("{0}")]
    Disposal(DisposalError),
}

/// Taxonomy class of a [`DiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    InvalidOperation,
    Activation,
    Verification,
    Disposal,
}

impl DiError {
    /// Returns the taxonomy class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            DiError::Configuration(_) | DiError::DuplicateRegistration(_) => ErrorCategory::Configuration,
            DiError::Locked | DiError::InvalidOperation(_) => ErrorCategory::InvalidOperation,
            DiError::Verification(_) => ErrorCategory::Verification,
            DiError::Disposal(_) => ErrorCategory::Disposal,
            _ => ErrorCategory::Activation,
        }
    }

    /// Convenience constructor for failures raised inside user factories.
    pub fn factory(service: &'static str, message: impl Into<String>) -> Self {
        DiError::Factory { service, message: message.into() }
    }
}

/// Why a constructor parameter can't be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidParameterReason {
    /// Parameter is taken by value
    ValueType,
    /// Parameter type is a primitive with no single obvious registration
    Ambiguous,
}

impl fmt::Display for InvalidParameterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidParameterReason::ValueType => f.write_str(" because it is a value type"),
            InvalidParameterReason::Ambiguous => Ok(()),
        }
    }
}

/// Aggregated verification failure listing every issue found.
#[derive(Debug, Clone)]
pub struct VerificationError {
    pub issues: Vec<DiagnosticIssue>,
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "The configuration is invalid. {} issue(s) found:", self.issues.len())?;
        for (i, issue) in self.issues.iter().enumerate() {
            write!(f, "\n  {}) {}", i + 1, issue)?;
        }
        Ok(())
    }
}

impl VerificationError {
    /// Returns true when any issue's message contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.issues.iter().any(|issue| issue.message.contains(needle))
    }
}

/// Aggregated disposal failures collected while ending a scope.
#[derive(Debug, Clone)]
pub struct DisposalError {
    /// One rendered message per failed disposal, in disposal order
    pub failures: Vec<String>,
}

impl fmt::Display for DisposalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance(s) failed to dispose: {}", self.failures.len(), self.failures.join("; "))
    }
}

/// Result type for container operations
///
/// # Examples
///
/// ```rust
/// use keystone_di::{DiResult, DiError};
///
/// fn create_service() -> DiResult<String> {
///     Ok("service created".to_string())
/// }
///
/// fn failing_operation() -> DiResult<()> {
///     Err(DiError::NotRegistered("some_service".to_string()))
/// }
///
/// assert!(create_service().is_ok());
/// assert!(failing_operation().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;
