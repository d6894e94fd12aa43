//! Unregistered-type resolution hook.

use std::sync::Arc;

use crate::descriptors::{Implements, Injectable};
use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::lifestyle::Lifestyle;
use crate::producer::InstanceProducer;
use crate::provider::ResolverContext;
use crate::registration::Registration;

use super::Container;

pub(crate) type UnregisteredTypeHook = Arc<dyn Fn(&mut UnregisteredTypeEvent<'_>) -> DiResult<()> + Send + Sync>;

/// Raised when a lookup misses the locked registry.
///
/// Hooks run in the order they were added and may supply a registration for
/// the requested key. At most one hook may do so; a second one is a
/// configuration error. The supplied producer serves the triggering request
/// and every later request for the key.
///
/// # Examples
///
/// ```rust
/// use keystone_di::{Container, Key, Lifestyle, Resolver};
/// use std::sync::Arc;
///
/// struct Settings { name: &'static str }
///
/// let container = Container::new();
/// container
///     .on_unregistered_type(|event| {
///         if event.key() == Key::of::<Settings>() {
///             event.register_factory::<Settings, _>(Lifestyle::Singleton, |_| Ok(Arc::new(Settings { name: "late" })))?;
///         }
///         Ok(())
///     })
///     .unwrap();
///
/// assert_eq!(container.get_instance::<Settings>().unwrap().name, "late");
/// ```
pub struct UnregisteredTypeEvent<'a> {
    container: &'a Container,
    key: Key,
    producer: Option<Arc<InstanceProducer>>,
}

impl<'a> UnregisteredTypeEvent<'a> {
    pub(crate) fn new(container: &'a Container, key: Key) -> Self {
        Self { container, key, producer: None }
    }

    /// The key that could not be found.
    pub fn key(&self) -> Key {
        self.key
    }

    pub fn container(&self) -> &Container {
        self.container
    }

    /// Whether a hook has already supplied a registration.
    pub fn handled(&self) -> bool {
        self.producer.is_some()
    }

    /// Supplies a constructed registration of `I` for the requested key.
    pub fn register<S, I>(&mut self, lifestyle: Lifestyle) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        let registration = lifestyle.create_registration::<S, I>(self.container);
        self.register_registration(registration)
    }

    /// Supplies a factory registration for the requested key.
    pub fn register_factory<S, F>(&mut self, lifestyle: Lifestyle, factory: F) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        let registration = lifestyle.create_factory_registration::<S, F>(self.container, factory);
        self.register_registration(registration)
    }

    pub fn register_registration(&mut self, registration: Arc<Registration>) -> DiResult<()> {
        if registration.service_type() != self.key.type_info() {
            return Err(DiError::Configuration(format!(
                "The supplied registration for {} does not implement {}.",
                registration.implementation_type(),
                self.key
            )));
        }
        if self.producer.is_some() {
            return Err(DiError::Configuration(format!(
                "Multiple unregistered type hooks are supplying a registration for the same service type {}.",
                self.key
            )));
        }
        self.producer = Some(InstanceProducer::new(self.key, registration, self.container));
        Ok(())
    }

    pub(crate) fn into_producer(self) -> Option<Arc<InstanceProducer>> {
        self.producer
    }
}
