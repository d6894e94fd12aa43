//! Disposal trait for resource cleanup.

/// Trait for synchronous resource disposal.
///
/// Implement this for services that need structured teardown (flushing
/// buffers, closing connections) and expose it through
/// [`Injectable::disposable`](crate::Injectable::disposable). Scoped instances
/// are disposed in reverse creation order when their scope ends; singletons
/// when [`Container::dispose`](crate::Container::dispose) runs.
///
/// # Examples
///
/// ```
/// use keystone_di::{Constructor, Container, Dispose, Injectable, Lifestyle, Resolver};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Connection {
///     closed: AtomicBool,
/// }
///
/// impl Dispose for Connection {
///     fn dispose(&self) -> anyhow::Result<()> {
///         self.closed.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// impl Injectable for Connection {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("default", |_| Ok(Connection::default()))]
///     }
///
///     fn disposable(instance: Arc<Self>) -> Option<Arc<dyn Dispose>> {
///         Some(instance)
///     }
/// }
///
/// let container = Container::new();
/// container.register::<Connection, Connection>(Lifestyle::scoped()).unwrap();
///
/// let connection = container
///     .using_scope(|scope| scope.get_instance::<Connection>())
///     .unwrap();
/// assert!(connection.closed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Release the instance's resources.
    fn dispose(&self) -> anyhow::Result<()>;
}
