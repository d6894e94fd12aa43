//! Resolution-side types: the resolver context, scopes and the ambient
//! scope adapter.

pub mod ambient;
pub mod context;
pub mod scope;

pub use ambient::AmbientScope;
pub use context::ResolverContext;
pub use scope::Scope;
