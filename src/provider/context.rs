//! Resolver context for factories and nested resolution.
//!
//! The context is threaded explicitly through every resolution: it names the
//! container being resolved from and, when the request came through a scope,
//! that scope. Scoped lifestyles read the scope from here instead of from
//! ambient state.

use std::any::Any;
use std::sync::Arc;

use crate::container::Container;
use crate::error::DiResult;
use crate::key::Key;
use crate::provider::Scope;
use crate::traits::ResolverCore;

/// Context passed to factory functions for resolving dependencies.
///
/// # Examples
///
/// ```
/// use keystone_di::{Container, Lifestyle, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let container = Container::new();
/// container.register_instance(Arc::new(Database { url: "postgres://localhost".to_string() })).unwrap();
/// container
///     .register_factory::<UserService, _>(Lifestyle::Transient, |context| {
///         Ok(Arc::new(UserService { db: context.get_instance::<Database>()? }))
///     })
///     .unwrap();
///
/// let service = container.get_instance::<UserService>().unwrap();
/// assert_eq!(service.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct ResolverContext {
    container: Container,
    scope: Option<Scope>,
}

impl ResolverContext {
    pub(crate) fn new(container: Container, scope: Option<Scope>) -> Self {
        Self { container, scope }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The scope the current request was made through, if any.
    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    pub(crate) fn with_scope(&self, scope: Scope) -> Self {
        Self { container: self.container.clone(), scope: Some(scope) }
    }
}

impl ResolverCore for ResolverContext {
    fn resolve_any(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>> {
        if let Some(scope) = &self.scope {
            scope.ensure_active(key.display_name())?;
        }
        let producer = self.container.get_registration(key)?;
        Ok(producer.resolve(self)?.value)
    }
}
