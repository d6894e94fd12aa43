//! Scopes: unit-of-work boundaries with their own instance cache.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::container::Container;
use crate::error::{DiError, DiResult, DisposalError};
use crate::internal::DisposeBag;
use crate::key::{downcast_instance, Key, Map};
use crate::plan::Instance;
use crate::producer::InstanceProducer;
use crate::registration::RegistrationId;
use crate::traits::ResolverCore;

use super::ResolverContext;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Unit-of-work boundary for scoped instances.
///
/// Scoped registrations resolve to one instance per scope. Singletons are
/// shared with the container, transients are created fresh. Instances that
/// expose [`Dispose`](crate::Dispose) are disposed in reverse creation order
/// when the scope ends, either through [`end`](Scope::end) or when the last
/// handle is dropped.
///
/// `Scope` is a cheap handle; clones refer to the same scope.
///
/// # Examples
///
/// ```
/// use keystone_di::{Constructor, Container, Injectable, Lifestyle, Resolver};
/// use std::sync::Arc;
///
/// struct UnitOfWork;
/// impl Injectable for UnitOfWork {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("new", |_| Ok(UnitOfWork))]
///     }
/// }
///
/// let container = Container::new();
/// container.register::<UnitOfWork, UnitOfWork>(Lifestyle::scoped()).unwrap();
///
/// let scope = container.begin_scope();
/// let a = scope.get_instance::<UnitOfWork>().unwrap();
/// let b = scope.get_instance::<UnitOfWork>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// scope.end().unwrap();
/// assert!(scope.get_instance::<UnitOfWork>().is_err());
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    id: u64,
    container: Container,
    instances: Mutex<Map<RegistrationId, Arc<OnceCell<Instance>>>>,
    disposables: Mutex<DisposeBag>,
    ended: AtomicBool,
}

impl Scope {
    pub(crate) fn new(container: Container) -> Self {
        let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
        debug!(scope = id, "scope started");
        Self {
            inner: Arc::new(ScopeInner {
                id,
                container,
                instances: Mutex::new(Map::default()),
                disposables: Mutex::new(DisposeBag::default()),
                ended: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The container this scope resolves from.
    pub fn container(&self) -> &Container {
        &self.inner.container
    }

    pub fn is_ended(&self) -> bool {
        self.inner.ended.load(Ordering::Acquire)
    }

    /// Resolves `producer` within this scope.
    pub fn get_instance_of<S: ?Sized + Send + Sync + 'static>(&self, producer: &InstanceProducer) -> DiResult<Arc<S>> {
        self.ensure_active(producer.key().display_name())?;
        let context = ResolverContext::new(self.container().clone(), Some(self.clone()));
        downcast_instance::<S>(&producer.resolve(&context)?.value)
    }

    /// Ends the scope, disposing tracked instances in reverse creation order.
    ///
    /// Every disposal is attempted; failures are aggregated into one
    /// [`DiError::Disposal`]. Ending an already ended scope is a no-op.
    pub fn end(&self) -> DiResult<()> {
        match self.inner.end() {
            Some(failures) if !failures.is_empty() => Err(DiError::Disposal(DisposalError { failures })),
            _ => Ok(()),
        }
    }

    pub(crate) fn ensure_active(&self, service: &'static str) -> DiResult<()> {
        if self.is_ended() {
            return Err(DiError::ScopeEnded(service));
        }
        Ok(())
    }

    pub(crate) fn belongs_to(&self, container: &Container) -> bool {
        self.inner.container.id() == container.id()
    }

    /// Returns this scope's instance for `registration`, creating it exactly
    /// once. Disposable instances are tracked in creation order.
    pub(crate) fn get_or_create<F>(&self, registration: RegistrationId, service: &'static str, create: F) -> DiResult<Instance>
    where
        F: FnOnce() -> DiResult<Instance>,
    {
        self.ensure_active(service)?;

        // Release the map lock before running the factory; nested scoped
        // dependencies need it.
        let cell = self.inner.instances.lock().entry(registration).or_default().clone();

        cell.get_or_try_init(|| {
            let instance = create()?;
            let mut disposables = self.inner.disposables.lock();
            // The scope may have ended while the factory ran; its bag is gone.
            if self.is_ended() {
                drop(disposables);
                if let Some(disposer) = &instance.disposable {
                    let mut orphan = DisposeBag::default();
                    orphan.push(disposer.clone());
                    for failure in orphan.dispose_reverse() {
                        warn!(scope = self.inner.id, %failure, "disposal failed for an instance created after scope end");
                    }
                }
                return Err(DiError::ScopeEnded(service));
            }
            if let Some(disposer) = &instance.disposable {
                disposables.push(disposer.clone());
            }
            Ok(instance)
        })
        .cloned()
    }
}

impl ScopeInner {
    /// Returns `None` when the scope had already ended.
    fn end(&self) -> Option<Vec<String>> {
        let bag = {
            // Flipped under the bag lock so late creations see either the
            // live bag or the ended flag.
            let mut disposables = self.disposables.lock();
            if self.ended.swap(true, Ordering::AcqRel) {
                return None;
            }
            disposables.take()
        };
        debug!(scope = self.id, tracked = bag.len(), "ending scope");
        let failures = bag.dispose_reverse();
        let instances = std::mem::take(&mut *self.instances.lock());
        drop(instances);
        Some(failures)
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if let Some(failures) = self.end() {
            for failure in failures {
                warn!(scope = self.id, %failure, "disposal failed while dropping scope");
            }
        }
    }
}

impl ResolverCore for Scope {
    fn resolve_any(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>> {
        ResolverContext::new(self.container().clone(), Some(self.clone())).resolve_any(key)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("ended", &self.is_ended())
            .finish()
    }
}
