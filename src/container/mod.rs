//! The container: registration, the lock transition and lookup.

mod registry;
mod unregistered;

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::collection::{cast_to, CollectionElement};
use crate::config::ContainerOptions;
use crate::descriptors::{Implements, Injectable};
use crate::diagnostics::{self, KnownRelationship, VerificationReport};
use crate::error::{DiError, DiResult, DisposalError};
use crate::internal::{DisposeBag, Disposer};
use crate::key::{CollectionShape, Key, Map, TypeInfo};
use crate::lifestyle::Lifestyle;
use crate::producer::InstanceProducer;
use crate::provider::{ResolverContext, Scope};
use crate::registration::Registration;
use crate::traits::ResolverCore;

pub(crate) use registry::Snapshot;
use registry::PendingRegistry;
pub use unregistered::UnregisteredTypeEvent;

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Inversion-of-control container.
///
/// Registration happens first, from a single thread. The first call to
/// `get_instance`, `get_all_instances`, [`get_registration`](Self::get_registration)
/// or [`verify`](Self::verify) locks the container: the registry is captured
/// in an immutable snapshot that every later lookup reads, and any further
/// registration fails with [`DiError::Locked`].
///
/// `Container` is a cheap handle; clones refer to the same container.
///
/// # Examples
///
/// ```rust
/// use keystone_di::{implements, Constructor, Container, DiError, Injectable, Lifestyle, Parameter, Resolver};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct Name(&'static str);
/// impl Injectable for Name {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("new", |_| Ok(Name("world")))]
///     }
/// }
///
/// struct English { name: Arc<Name> }
/// impl Greeter for English {
///     fn greet(&self) -> String { format!("hello {}", self.name.0) }
/// }
/// impl Injectable for English {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("new", |args| Ok(English { name: args.next()? }))
///             .param(Parameter::service::<Name>("name"))]
///     }
/// }
/// implements!(English => dyn Greeter);
///
/// let container = Container::new();
/// container.register::<Name, Name>(Lifestyle::Singleton).unwrap();
/// container.register::<dyn Greeter, English>(Lifestyle::Transient).unwrap();
/// container.verify().unwrap();
///
/// assert_eq!(container.get_instance::<dyn Greeter>().unwrap().greet(), "hello world");
/// assert!(matches!(
///     container.register::<Name, Name>(Lifestyle::Transient),
///     Err(DiError::Locked)
/// ));
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    id: u64,
    options: ContainerOptions,
    pending: Mutex<Option<PendingRegistry>>,
    snapshot: OnceCell<Arc<Snapshot>>,
    late: RwLock<Map<Key, Arc<InstanceProducer>>>,
    singletons: Mutex<DisposeBag>,
}

impl Container {
    pub fn new() -> Self {
        Self::with_options(ContainerOptions::default())
    }

    pub fn with_options(options: ContainerOptions) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                id: NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed),
                options,
                pending: Mutex::new(Some(PendingRegistry::default())),
                snapshot: OnceCell::new(),
                late: RwLock::new(Map::default()),
                singletons: Mutex::new(DisposeBag::default()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ContainerInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ContainerInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.inner.options
    }

    /// Whether the registry has been captured and further registration is rejected.
    pub fn is_locked(&self) -> bool {
        self.inner.pending.lock().is_none()
    }

    // ----- Registration -----

    /// Registers `I` as the implementation of `S`.
    pub fn register<S, I>(&self, lifestyle: Lifestyle) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        let registration = lifestyle.create_registration::<S, I>(self);
        self.add_producer(Key::of::<S>(), registration)
    }

    /// Registers a concrete type as its own service.
    pub fn register_concrete<I: Injectable>(&self, lifestyle: Lifestyle) -> DiResult<()> {
        self.register::<I, I>(lifestyle)
    }

    /// Registers `I` for `S` with the configured default lifestyle.
    pub fn register_default<S, I>(&self) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        let lifestyle = self.inner.options.default_lifestyle().clone();
        self.register::<S, I>(lifestyle)
    }

    /// Registers `I` for `S` under a discriminator name.
    pub fn register_named<S, I>(&self, name: &'static str, lifestyle: Lifestyle) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        let registration = lifestyle.create_registration::<S, I>(self);
        self.add_producer(Key::named::<S>(name), registration)
    }

    /// Registers a factory for `S`; the lifestyle caches its results.
    pub fn register_factory<S, F>(&self, lifestyle: Lifestyle, factory: F) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        let registration = lifestyle.create_factory_registration::<S, F>(self, factory);
        self.add_producer(Key::of::<S>(), registration)
    }

    /// Registers a pre-built singleton.
    pub fn register_instance<S: ?Sized + Send + Sync + 'static>(&self, instance: Arc<S>) -> DiResult<()> {
        self.add_producer(Key::of::<S>(), Registration::instance::<S>(self, instance))
    }

    /// Registers a registration created with [`Lifestyle::create_registration`].
    pub fn add_registration<S: ?Sized + Send + Sync + 'static>(&self, registration: Arc<Registration>) -> DiResult<()> {
        self.check_registration::<S>(&registration)?;
        self.add_producer(Key::of::<S>(), registration)
    }

    fn check_registration<S: ?Sized + 'static>(&self, registration: &Registration) -> DiResult<()> {
        if registration.container_id() != self.inner.id {
            return Err(DiError::Configuration(format!(
                "The supplied registration for {} was created for a different container.",
                registration.implementation_type()
            )));
        }
        if registration.service_type() != TypeInfo::of::<S>() {
            return Err(DiError::Configuration(format!(
                "The supplied registration for {} does not implement {}.",
                registration.implementation_type(),
                std::any::type_name::<S>()
            )));
        }
        Ok(())
    }

    fn add_producer(&self, key: Key, registration: Arc<Registration>) -> DiResult<()> {
        let mut pending = self.inner.pending.lock();
        let registry = pending.as_mut().ok_or(DiError::Locked)?;

        if registry.contains(&key) && !self.inner.options.allow_overriding_registrations() {
            return Err(DiError::DuplicateRegistration(key.to_string()));
        }

        debug!(
            service = %key,
            implementation = %registration.implementation_type(),
            lifestyle = %registration.lifestyle(),
            "registration added"
        );
        registry.insert(InstanceProducer::new(key, registration, self));
        Ok(())
    }

    // ----- Collections -----

    /// Registers the collection of `S` with the given element registrations.
    ///
    /// Fails if a collection of `S` already exists, unless overriding is allowed.
    pub fn register_collection<S: ?Sized + Send + Sync + 'static>(&self, registrations: Vec<Arc<Registration>>) -> DiResult<()> {
        let key = Key::collection_of::<S>();
        let mut pending = self.inner.pending.lock();
        let registry = pending.as_mut().ok_or(DiError::Locked)?;

        if registry.contains_collection(&key) && !self.inner.options.allow_overriding_registrations() {
            return Err(DiError::DuplicateRegistration(key.to_string()));
        }

        let elements = registrations
            .into_iter()
            .map(|registration| {
                self.check_registration::<S>(&registration)?;
                Ok(CollectionElement::Producer(InstanceProducer::new(Key::of::<S>(), registration, self)))
            })
            .collect::<DiResult<Vec<_>>>()?;

        debug!(collection = %key, elements = elements.len(), "collection registered");
        registry.replace_collection(key, CollectionShape::of::<S>(), elements);
        Ok(())
    }

    /// Appends a constructed implementation to the collection of `S`.
    pub fn append_to_collection<S, I>(&self, lifestyle: Lifestyle) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        let registration = lifestyle.create_registration::<S, I>(self);
        let producer = InstanceProducer::new(Key::of::<S>(), registration, self);
        self.append_element::<S>(CollectionElement::Producer(producer))
    }

    /// Appends an element that resolves through `T`'s own registration.
    ///
    /// A missing registration for `T` surfaces when the collection is built.
    pub fn append_reference_to_collection<S, T>(&self) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        T: ?Sized + Implements<S>,
    {
        if TypeInfo::of::<T>() == TypeInfo::of::<S>() {
            return Err(DiError::Configuration(format!(
                "Type {} can't be appended to its own collection as a reference; the element would resolve to the collection's own service.",
                std::any::type_name::<S>()
            )));
        }
        self.append_element::<S>(CollectionElement::Reference { key: Key::of::<T>(), cast: cast_to::<S, T> })
    }

    /// Appends a pre-built instance to the collection of `S`.
    pub fn append_instance_to_collection<S: ?Sized + Send + Sync + 'static>(&self, instance: Arc<S>) -> DiResult<()> {
        let producer = InstanceProducer::new(Key::of::<S>(), Registration::instance::<S>(self, instance), self);
        self.append_element::<S>(CollectionElement::Producer(producer))
    }

    fn append_element<S: ?Sized + Send + Sync + 'static>(&self, element: CollectionElement) -> DiResult<()> {
        let key = Key::collection_of::<S>();
        let mut pending = self.inner.pending.lock();
        let registry = pending.as_mut().ok_or(DiError::Locked)?;
        debug!(collection = %key, element = ?element, "collection element appended");
        registry.append_to_collection(key, CollectionShape::of::<S>(), element);
        Ok(())
    }

    /// Adds a hook that may supply registrations for keys missing from the
    /// locked registry. Hooks run in the order they were added.
    pub fn on_unregistered_type<F>(&self, hook: F) -> DiResult<()>
    where
        F: Fn(&mut UnregisteredTypeEvent<'_>) -> DiResult<()> + Send + Sync + 'static,
    {
        let mut pending = self.inner.pending.lock();
        let registry = pending.as_mut().ok_or(DiError::Locked)?;
        registry.hooks.push(Arc::new(hook));
        Ok(())
    }

    // ----- Lookup -----

    /// Captures the registry on first call and returns the snapshot.
    pub(crate) fn snapshot(&self) -> Arc<Snapshot> {
        self.inner
            .snapshot
            .get_or_init(|| {
                let pending = self.inner.pending.lock().take().unwrap_or_default();
                let snapshot = Snapshot::capture(pending, self);
                debug!(container = self.inner.id, registrations = snapshot.ordered().len(), "container locked");
                Arc::new(snapshot)
            })
            .clone()
    }

    /// Returns the producer for `key`, locking the container.
    ///
    /// A miss runs the unregistered-type hooks, then synthesizes an implicit
    /// collection for collection keys, and otherwise fails with
    /// [`DiError::NotRegistered`].
    pub fn get_registration(&self, key: &Key) -> DiResult<Arc<InstanceProducer>> {
        let snapshot = self.snapshot();
        if let Some(producer) = snapshot.find(key) {
            return Ok(producer);
        }
        if let Some(producer) = self.inner.late.read().get(key) {
            return Ok(producer.clone());
        }

        // Hooks run without any container lock held; they may resolve too
        let mut event = UnregisteredTypeEvent::new(self, *key);
        for hook in &snapshot.hooks {
            hook(&mut event)?;
        }
        if let Some(producer) = event.into_producer() {
            debug!(service = %key, "registration supplied by unregistered type hook");
            return Ok(self.cache_late(producer));
        }

        if let Some(shape) = key.collection_shape() {
            let registration = Registration::collection(self, key.type_info(), shape, Vec::new());
            return Ok(self.cache_late(InstanceProducer::new(*key, registration, self)));
        }

        Err(DiError::NotRegistered(key.to_string()))
    }

    fn cache_late(&self, producer: Arc<InstanceProducer>) -> Arc<InstanceProducer> {
        self.inner.late.write().entry(producer.key()).or_insert(producer).clone()
    }

    /// Producers known so far: registrations in order, then producers
    /// supplied after the lock.
    pub fn get_current_registrations(&self) -> Vec<Arc<InstanceProducer>> {
        if let Some(pending) = self.inner.pending.lock().as_ref() {
            return pending.producers().to_vec();
        }
        let mut producers = self.snapshot().ordered().to_vec();
        producers.extend(self.late_producers());
        producers
    }

    pub(crate) fn late_producers(&self) -> Vec<Arc<InstanceProducer>> {
        self.inner.late.read().values().cloned().collect()
    }

    // ----- Scopes -----

    pub fn begin_scope(&self) -> Scope {
        Scope::new(self.clone())
    }

    /// Runs `f` inside a fresh scope and ends the scope afterwards.
    ///
    /// An error from `f` takes precedence over disposal failures.
    pub fn using_scope<T, F>(&self, f: F) -> DiResult<T>
    where
        F: FnOnce(&Scope) -> DiResult<T>,
    {
        let scope = self.begin_scope();
        let result = f(&scope);
        let ended = scope.end();
        match (result, ended) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(disposal)) => Err(disposal),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(disposal)) => {
                warn!(scope = scope.id(), error = %disposal, "scope disposal failed after an earlier error");
                Err(err)
            }
        }
    }

    // ----- Diagnostics -----

    /// Builds every producer and checks the graph; locks the container.
    ///
    /// Returns the non-fatal warnings on success, or every error found at
    /// once. Safe to call repeatedly.
    pub fn verify(&self) -> DiResult<VerificationReport> {
        diagnostics::verify(self)
    }

    /// Every recorded dependency edge. Requires a locked container.
    pub fn relationships(&self) -> DiResult<Vec<KnownRelationship>> {
        if !self.is_locked() {
            return Err(DiError::InvalidOperation(
                "relationships are only available after the container has been locked",
            ));
        }
        Ok(diagnostics::walk(self, false)
            .into_iter()
            .flat_map(|visited| visited.producer.relationships())
            .collect())
    }

    // ----- Disposal -----

    pub(crate) fn track_singleton(&self, disposer: Disposer) {
        self.inner.singletons.lock().push(disposer);
    }

    /// Disposes tracked singletons in reverse creation order.
    pub fn dispose(&self) -> DiResult<()> {
        let failures = self.inner.singletons.lock().take().dispose_reverse();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiError::Disposal(DisposalError { failures }))
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverCore for Container {
    fn resolve_any(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>> {
        ResolverContext::new(self.clone(), None).resolve_any(key)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        let failures = self.singletons.get_mut().take().dispose_reverse();
        for failure in failures {
            warn!(container = self.id, %failure, "singleton disposal failed while dropping container");
        }
    }
}
