//! Resolver traits for service resolution.

use std::any::Any;
use std::sync::Arc;

use crate::collection::Collection;
use crate::error::DiResult;
use crate::key::{downcast_instance, Key};

/// Object-safe resolution core.
///
/// Implemented by [`Container`](crate::Container), [`Scope`](crate::Scope)
/// and [`ResolverContext`](crate::ResolverContext). Most callers use the
/// generic methods of [`Resolver`] instead.
pub trait ResolverCore: Send + Sync {
    /// Resolves the producer registered under `key` and returns the
    /// type-erased instance (an `Arc<S>` boxed in `Arc<dyn Any>`).
    fn resolve_any(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>>;
}

/// Typed resolution API, available on everything that implements [`ResolverCore`].
///
/// # Examples
///
/// ```
/// use keystone_di::{implements, Container, Lifestyle, Resolver};
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// struct FixedClock;
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 { 42 }
/// }
///
/// let container = Container::new();
/// container
///     .register_factory::<dyn Clock, _>(Lifestyle::Singleton, |_| Ok(Arc::new(FixedClock) as Arc<dyn Clock>))
///     .unwrap();
///
/// let clock = container.get_instance::<dyn Clock>().unwrap();
/// assert_eq!(clock.now(), 42);
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves the unnamed registration of `S`.
    fn get_instance<S: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<S>> {
        let any = self.resolve_any(&Key::of::<S>())?;
        downcast_instance::<S>(&any)
    }

    /// Resolves the registration of `S` made under `name`.
    fn get_named_instance<S: ?Sized + Send + Sync + 'static>(&self, name: &'static str) -> DiResult<Arc<S>> {
        let any = self.resolve_any(&Key::named::<S>(name))?;
        downcast_instance::<S>(&any)
    }

    /// Resolves every element registered in the collection of `S`, in
    /// registration order. An unregistered collection is empty.
    fn get_all_instances<S: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<S>>> {
        let any = self.resolve_any(&Key::collection_of::<S>())?;
        Ok(downcast_instance::<Collection<S>>(&any)?.to_vec())
    }

    /// Resolves `S`, panicking with the error message on failure.
    ///
    /// # Panics
    ///
    /// Panics if the service can't be resolved.
    fn get_required<S: ?Sized + Send + Sync + 'static>(&self) -> Arc<S> {
        match self.get_instance::<S>() {
            Ok(instance) => instance,
            Err(err) => panic!("{}", err),
        }
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
