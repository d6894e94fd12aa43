//! Collections of services.
//!
//! A request for [`Collection<S>`] resolves every element registered for `S`
//! in registration order. Elements are either producers owned by the
//! collection (appended implementations and instances) or references that
//! resolve through another service's own registration.

use std::fmt;
use std::sync::Arc;

use crate::descriptors::Implements;
use crate::error::DiResult;
use crate::key::{downcast_instance, erase, AnyArc, Key};
use crate::producer::InstanceProducer;

/// Ordered, resolved elements of a collection of `S`.
///
/// # Examples
///
/// ```rust
/// use keystone_di::{implements, Collection, Constructor, Container, Injectable, Lifestyle, Resolver};
///
/// trait Plugin: Send + Sync {
///     fn name(&self) -> &'static str;
/// }
///
/// struct Audit;
/// impl Plugin for Audit {
///     fn name(&self) -> &'static str { "audit" }
/// }
/// impl Injectable for Audit {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("new", |_| Ok(Audit))]
///     }
/// }
/// implements!(Audit => dyn Plugin);
///
/// let container = Container::new();
/// container.append_to_collection::<dyn Plugin, Audit>(Lifestyle::Transient).unwrap();
///
/// let plugins = container.get_instance::<Collection<dyn Plugin>>().unwrap();
/// assert_eq!(plugins.len(), 1);
/// assert_eq!(plugins.iter().next().unwrap().name(), "audit");
/// ```
pub struct Collection<S: ?Sized> {
    items: Vec<Arc<S>>,
}

impl<S: ?Sized> Collection<S> {
    pub(crate) fn from_vec(items: Vec<Arc<S>>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<S>> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<S>> {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<Arc<S>> {
        self.items.clone()
    }
}

impl<'a, S: ?Sized> IntoIterator for &'a Collection<S> {
    type Item = &'a Arc<S>;
    type IntoIter = std::slice::Iter<'a, Arc<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<S: ?Sized> fmt::Debug for Collection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("element", &std::any::type_name::<S>())
            .field("len", &self.items.len())
            .finish()
    }
}

/// Converts an erased `Arc<T>` into an erased `Arc<S>`.
pub(crate) type Cast = fn(&AnyArc) -> DiResult<AnyArc>;

pub(crate) fn cast_to<S, T>(any: &AnyArc) -> DiResult<AnyArc>
where
    S: ?Sized + Send + Sync + 'static,
    T: ?Sized + Implements<S>,
{
    let typed = downcast_instance::<T>(any)?;
    Ok(erase::<S>(<T as Implements<S>>::upcast(typed)))
}

/// One registered element of a collection.
#[derive(Clone)]
pub(crate) enum CollectionElement {
    /// Element with its own registration, owned by the collection
    Producer(Arc<InstanceProducer>),
    /// Element resolved through the registration of `key`, then cast
    Reference { key: Key, cast: Cast },
}

impl fmt::Debug for CollectionElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionElement::Producer(producer) => write!(f, "Producer({})", producer.key()),
            CollectionElement::Reference { key, .. } => write!(f, "Reference({})", key),
        }
    }
}
