//! Instance producers: the resolvable unit bound to a service key.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::container::{Container, ContainerInner};
use crate::diagnostics::KnownRelationship;
use crate::error::{DiError, DiResult};
use crate::internal::StackGuard;
use crate::key::{downcast_instance, Key, TypeInfo};
use crate::lifestyle::Lifestyle;
use crate::plan::{Factory, Instance};
use crate::provider::ResolverContext;
use crate::registration::Registration;

static NEXT_PRODUCER_ID: AtomicU64 = AtomicU64::new(1);

/// A registration bound to the key it is resolved under.
///
/// The registration's plan is compiled into a factory at most once; every
/// later resolution, from any thread, reuses it. A build failure is cached
/// as well, so repeated builds report the same error.
pub struct InstanceProducer {
    id: u64,
    key: Key,
    registration: Arc<Registration>,
    container: Weak<ContainerInner>,
    compiled: OnceCell<Result<Factory, DiError>>,
}

impl InstanceProducer {
    pub(crate) fn new(key: Key, registration: Arc<Registration>, container: &Container) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_PRODUCER_ID.fetch_add(1, Ordering::Relaxed),
            key,
            registration,
            container: container.downgrade(),
            compiled: OnceCell::new(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn service_type(&self) -> TypeInfo {
        self.key.type_info()
    }

    pub fn implementation_type(&self) -> TypeInfo {
        self.registration.implementation_type()
    }

    pub fn lifestyle(&self) -> &Lifestyle {
        self.registration.lifestyle()
    }

    pub fn registration(&self) -> &Arc<Registration> {
        &self.registration
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// Dependency edges of this producer. Empty until it has been compiled.
    pub fn relationships(&self) -> Vec<KnownRelationship> {
        self.registration.relationships()
    }

    /// Compiles the producer without creating an instance, surfacing
    /// constructor and parameter errors.
    pub fn compile(&self) -> DiResult<()> {
        let container = self.container()?;
        self.build(&container)
    }

    /// Resolves an instance outside of any scope.
    pub fn get_instance<S: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<S>> {
        let context = ResolverContext::new(self.container()?, None);
        downcast_instance::<S>(&self.resolve(&context)?.value)
    }

    pub(crate) fn build(&self, container: &Container) -> DiResult<()> {
        let _guard = StackGuard::enter(self.id, self.key.display_name(), container.options().max_resolution_depth())?;
        self.factory(container).map(|_| ())
    }

    pub(crate) fn resolve(&self, context: &ResolverContext) -> DiResult<Instance> {
        let container = context.container();
        let _guard = StackGuard::enter(self.id, self.key.display_name(), container.options().max_resolution_depth())?;
        let factory = self.factory(container)?;
        factory(context)
    }

    fn factory(&self, container: &Container) -> DiResult<Factory> {
        self.compiled
            .get_or_init(|| {
                let compiled = self.registration.plan(container).map(|plan| plan.compile());
                match &compiled {
                    Ok(_) => debug!(service = %self.key, lifestyle = %self.lifestyle(), "producer compiled"),
                    Err(err) => debug!(service = %self.key, error = %err, "producer failed to compile"),
                }
                compiled
            })
            .clone()
    }

    fn container(&self) -> DiResult<Container> {
        self.container
            .upgrade()
            .map(Container::from_inner)
            .ok_or(DiError::InvalidOperation("the container that owns this producer has been dropped"))
    }
}

impl fmt::Debug for InstanceProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceProducer")
            .field("id", &self.id)
            .field("service", &self.key)
            .field("implementation", &self.implementation_type())
            .field("lifestyle", self.lifestyle())
            .finish()
    }
}
