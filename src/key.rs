//! Service key types for the container.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::collection::Collection;
use crate::error::{DiError, DiResult};

/// Type-erased instance storage: an `Arc<dyn Any>` wrapping an `Arc<S>`.
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

#[cfg(feature = "ahash")]
pub(crate) type Map<K, V> = ahash::AHashMap<K, V>;
#[cfg(not(feature = "ahash"))]
pub(crate) type Map<K, V> = std::collections::HashMap<K, V>;

/// Runtime type descriptor.
///
/// Works for sized types and trait objects alike: `TypeInfo::of::<dyn Logger>()`
/// is as valid as `TypeInfo::of::<FileLogger>()`.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: std::any::type_name::<T>() }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The `std::any::type_name` of the described type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeInfo {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub(crate) type Assembler = fn(Vec<AnyArc>) -> DiResult<AnyArc>;

/// Shape of a "collection of S" request.
///
/// Carried by keys created with [`Key::collection_of`] so that a lookup miss
/// can synthesize an implicit collection producer without knowing `S` statically.
#[derive(Clone, Copy)]
pub struct CollectionShape {
    pub(crate) element: TypeInfo,
    pub(crate) assemble: Assembler,
}

impl CollectionShape {
    pub(crate) fn of<S: ?Sized + Send + Sync + 'static>() -> Self {
        Self { element: TypeInfo::of::<S>(), assemble: assemble_collection::<S> }
    }

    /// Element type of the collection.
    pub fn element(&self) -> TypeInfo {
        self.element
    }
}

fn assemble_collection<S: ?Sized + Send + Sync + 'static>(items: Vec<AnyArc>) -> DiResult<AnyArc> {
    let items = items
        .into_iter()
        .map(|any| downcast_instance::<S>(&any))
        .collect::<DiResult<Vec<_>>>()?;
    Ok(Arc::new(Arc::new(Collection::from_vec(items))) as AnyArc)
}

/// Key for service storage and lookup.
///
/// A key is a type descriptor plus an optional discriminator name. Two keys
/// are equal when both the type and the name match; the collection shape
/// (if any) does not participate in equality.
///
/// # Examples
///
/// ```rust
/// use keystone_di::Key;
///
/// trait Logger: Send + Sync {}
///
/// let unnamed = Key::of::<dyn Logger>();
/// let named = Key::named::<dyn Logger>("audit");
///
/// assert_ne!(unnamed, named);
/// assert_eq!(named.service_name(), Some("audit"));
/// assert!(unnamed.display_name().contains("Logger"));
/// ```
#[derive(Clone, Copy)]
pub struct Key {
    type_info: TypeInfo,
    name: Option<&'static str>,
    shape: Option<CollectionShape>,
}

impl Key {
    #[inline(always)]
    pub fn of<S: ?Sized + 'static>() -> Self {
        Self { type_info: TypeInfo::of::<S>(), name: None, shape: None }
    }

    pub fn named<S: ?Sized + 'static>(name: &'static str) -> Self {
        Self { type_info: TypeInfo::of::<S>(), name: Some(name), shape: None }
    }

    /// Key for a `Collection<S>` request.
    pub fn collection_of<S: ?Sized + Send + Sync + 'static>() -> Self {
        Self {
            type_info: TypeInfo::of::<Collection<S>>(),
            name: None,
            shape: Some(CollectionShape::of::<S>()),
        }
    }

    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    /// Get the type name for display
    pub fn display_name(&self) -> &'static str {
        self.type_info.name
    }

    /// Get the discriminator for named services, or None for unnamed services
    pub fn service_name(&self) -> Option<&'static str> {
        self.name
    }

    /// Collection shape, present only for collection requests.
    pub fn collection_shape(&self) -> Option<CollectionShape> {
        self.shape
    }
}

impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.type_info == other.type_info && self.name == other.name
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_info.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "{} (named '{}')", self.type_info.name, name),
            None => f.write_str(self.type_info.name),
        }
    }
}

/// Wraps a typed instance into type-erased storage.
pub(crate) fn erase<S: ?Sized + Send + Sync + 'static>(instance: Arc<S>) -> AnyArc {
    Arc::new(instance)
}

/// Recovers a typed instance from type-erased storage.
pub(crate) fn downcast_instance<S: ?Sized + Send + Sync + 'static>(any: &AnyArc) -> DiResult<Arc<S>> {
    any.downcast_ref::<Arc<S>>()
        .cloned()
        .ok_or(DiError::TypeMismatch(std::any::type_name::<S>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    #[test]
    fn named_and_unnamed_keys_differ() {
        let mut set = HashSet::new();
        set.insert(Key::of::<u32>());
        set.insert(Key::named::<u32>("port"));
        set.insert(Key::named::<u32>("port"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn collection_keys_ignore_shape_in_equality() {
        let a = Key::collection_of::<dyn Greeter>();
        let b = Key::of::<Collection<dyn Greeter>>();
        assert_eq!(a, b);
        assert!(a.collection_shape().is_some());
        assert!(b.collection_shape().is_none());
        assert_eq!(a.collection_shape().map(|shape| shape.element()), Some(TypeInfo::of::<dyn Greeter>()));
    }

    #[test]
    fn erased_trait_objects_round_trip() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let any = erase(greeter.clone());
        let back = downcast_instance::<dyn Greeter>(&any).unwrap();
        assert!(Arc::ptr_eq(&greeter, &back));
        assert_eq!(back.greet(), "hello");
        assert!(matches!(downcast_instance::<English>(&any), Err(DiError::TypeMismatch(_))));
    }
}
