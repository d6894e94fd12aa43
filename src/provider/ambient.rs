//! Thread-local ambient scope adapter.
//!
//! Core resolution passes scopes explicitly. This adapter exists for code
//! that can't thread a scope through, and is only read by scoped lifestyles
//! created with [`Lifestyle::thread_scoped`](crate::Lifestyle::thread_scoped).

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::container::Container;

use super::Scope;

thread_local! {
    static AMBIENT_SCOPES: RefCell<Vec<Scope>> = const { RefCell::new(Vec::new()) };
}

/// Makes a scope ambient on the current thread until the guard is dropped.
///
/// # Examples
///
/// ```
/// use keystone_di::{AmbientScope, Constructor, Container, Injectable, Lifestyle, Resolver};
/// use std::sync::Arc;
///
/// struct RequestState;
/// impl Injectable for RequestState {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("new", |_| Ok(RequestState))]
///     }
/// }
///
/// let container = Container::new();
/// container.register::<RequestState, RequestState>(Lifestyle::thread_scoped()).unwrap();
///
/// assert!(container.get_instance::<RequestState>().is_err());
///
/// let scope = container.begin_scope();
/// let _ambient = AmbientScope::enter(&scope);
/// let a = container.get_instance::<RequestState>().unwrap();
/// let b = scope.get_instance::<RequestState>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
pub struct AmbientScope {
    scope_id: u64,
    // Guards pop a thread-local stack and must stay on their thread
    _not_send: PhantomData<*const ()>,
}

impl AmbientScope {
    pub fn enter(scope: &Scope) -> Self {
        AMBIENT_SCOPES.with(|scopes| scopes.borrow_mut().push(scope.clone()));
        Self { scope_id: scope.id(), _not_send: PhantomData }
    }

    /// Innermost ambient scope on this thread that belongs to `container`.
    pub fn current(container: &Container) -> Option<Scope> {
        AMBIENT_SCOPES.with(|scopes| {
            scopes
                .borrow()
                .iter()
                .rev()
                .find(|scope| scope.belongs_to(container) && !scope.is_ended())
                .cloned()
        })
    }
}

impl Drop for AmbientScope {
    fn drop(&mut self) {
        // Removed outside the borrow so a final scope drop can't re-enter it
        let removed = AMBIENT_SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            scopes
                .iter()
                .rposition(|scope| scope.id() == self.scope_id)
                .map(|index| scopes.remove(index))
        });
        drop(removed);
    }
}
