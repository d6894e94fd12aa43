//! # keystone-di
//!
//! Inversion-of-control container with lifestyles, scopes and ahead-of-time
//! verification of the whole object graph.
//!
//! ## Features
//!
//! - **Lifestyles**: Transient, Singleton, Scoped and Hybrid (a runtime test
//!   choosing between two lifestyles)
//! - **Constructor injection**: implementations describe their constructors
//!   through [`Injectable`]; pluggable behaviors select the constructor and
//!   validate and resolve its parameters
//! - **Exactly-once compilation**: every producer builds its plan once and
//!   reuses the compiled factory from any thread
//! - **Lock on first use**: registration ends at the first resolution or
//!   [`Container::verify`]; lookups then read an immutable snapshot
//! - **Verification**: missing dependencies, cycles and potential lifestyle
//!   mismatches are found before production use, all reported at once
//! - **Collections and late registration**: ordered collections, implicit
//!   empty collections and a hook for unregistered types
//!
//! ## Quick Start
//!
//! ```rust
//! use keystone_di::{Constructor, Container, Injectable, Lifestyle, Parameter, Resolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! impl Injectable for Database {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new("new", |_| Ok(Database { url: "postgres://localhost".to_string() }))]
//!     }
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for UserService {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new("new", |args| Ok(UserService { db: args.next()? }))
//!             .param(Parameter::service::<Database>("db"))]
//!     }
//! }
//!
//! let container = Container::new();
//! container.register_concrete::<Database>(Lifestyle::Singleton).unwrap();
//! container.register_concrete::<UserService>(Lifestyle::Transient).unwrap();
//! container.verify().unwrap();
//!
//! let service = container.get_instance::<UserService>().unwrap();
//! assert_eq!(service.db.url, "postgres://localhost");
//! ```
//!
//! ## Lifestyles
//!
//! - **Transient**: a new instance on every resolution
//! - **Singleton**: one instance per container, created on first use
//! - **Scoped**: one instance per [`Scope`]; resolving outside a scope fails
//! - **Hybrid**: evaluates a test on every resolution and delegates to one
//!   of two lifestyles
//!
//! ## Trait services
//!
//! ```rust
//! use keystone_di::{implements, Constructor, Container, Injectable, Lifestyle, Resolver};
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, message: &str) -> String;
//! }
//!
//! struct ConsoleLogger;
//!
//! impl Logger for ConsoleLogger {
//!     fn log(&self, message: &str) -> String {
//!         format!("[console] {message}")
//!     }
//! }
//!
//! impl Injectable for ConsoleLogger {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new("new", |_| Ok(ConsoleLogger))]
//!     }
//! }
//!
//! implements!(ConsoleLogger => dyn Logger);
//!
//! let container = Container::new();
//! container.register::<dyn Logger, ConsoleLogger>(Lifestyle::Singleton).unwrap();
//!
//! let logger = container.get_instance::<dyn Logger>().unwrap();
//! assert_eq!(logger.log("ready"), "[console] ready");
//! ```

// Module declarations
pub mod behaviors;
pub mod collection;
pub mod config;
pub mod container;
pub mod descriptors;
pub mod diagnostics;
pub mod error;
pub mod key;
pub mod lifestyle;
pub mod producer;
pub mod provider;
pub mod registration;
pub mod traits;

// Internal modules
mod internal;
mod plan;

// Re-export core types
pub use behaviors::{
    is_ambiguous, ConstructorResolutionBehavior, ConstructorVerificationBehavior, DefaultConstructorResolutionBehavior,
    DefaultConstructorVerificationBehavior, DefaultDependencyInjectionBehavior, DependencyInjectionBehavior,
    MostResolvableParametersBehavior,
};
pub use collection::Collection;
pub use config::{ContainerOptions, VerificationOption};
pub use container::{Container, UnregisteredTypeEvent};
pub use descriptors::{Arguments, Constructor, ConstructorInfo, Implements, Injectable, Parameter, ParameterKind};
pub use diagnostics::{
    DependencyGraph, DiagnosticIssue, DiagnosticKind, GraphEdge, GraphNode, KnownRelationship, Severity,
    VerificationReport,
};
pub use error::{DiError, DiResult, DisposalError, ErrorCategory, InvalidParameterReason, VerificationError};
pub use key::{CollectionShape, Key, TypeInfo};
pub use lifestyle::{HybridLifestyle, Lifestyle, ScopedLifestyle};
pub use producer::InstanceProducer;
pub use provider::{AmbientScope, ResolverContext, Scope};
pub use registration::{Registration, RegistrationId};
pub use traits::{Dispose, Resolver, ResolverCore};
