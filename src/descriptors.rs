//! Constructor and parameter descriptors.
//!
//! Rust has no runtime reflection, so an implementation type describes the
//! constructors it offers through [`Injectable`]. Each [`Constructor`] lists
//! its [`Parameter`]s in declaration order and carries a closure that builds
//! the value from resolved [`Arguments`].

use std::fmt;
use std::sync::Arc;

use crate::collection::Collection;
use crate::error::{DiError, DiResult};
use crate::key::{downcast_instance, AnyArc, Key, TypeInfo};
use crate::traits::Dispose;

/// Types the container can construct by selecting one of their constructors.
///
/// # Examples
///
/// ```rust
/// use keystone_di::{Constructor, Container, Injectable, Lifestyle, Parameter, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
///
/// impl Injectable for Database {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("new", |_| Ok(Database { url: "postgres://localhost".into() }))]
///     }
/// }
///
/// struct UserService { db: Arc<Database> }
///
/// impl Injectable for UserService {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("new", |args| Ok(UserService { db: args.next()? }))
///             .param(Parameter::service::<Database>("db"))]
///     }
/// }
///
/// let container = Container::new();
/// container.register::<Database, Database>(Lifestyle::Singleton).unwrap();
/// container.register::<UserService, UserService>(Lifestyle::Transient).unwrap();
///
/// let service = container.get_instance::<UserService>().unwrap();
/// assert_eq!(service.db.url, "postgres://localhost");
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Public constructors of the type, in declaration order.
    fn constructors() -> Vec<Constructor<Self>>;

    /// Exposes the instance's disposal capability, if it has one.
    ///
    /// Scoped instances that return `Some` are disposed when their scope
    /// ends; singletons are disposed by [`Container::dispose`](crate::Container::dispose).
    fn disposable(instance: Arc<Self>) -> Option<Arc<dyn Dispose>> {
        let _ = instance;
        None
    }
}

/// Declares that `Self` can be served as `S`.
///
/// Every type implements its own identity. Trait-object services need one
/// impl per implementation, usually written with [`implements!`](crate::implements).
pub trait Implements<S: ?Sized>: Send + Sync + 'static {
    fn upcast(self: Arc<Self>) -> Arc<S>;
}

impl<T: ?Sized + Send + Sync + 'static> Implements<T> for T {
    #[inline(always)]
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Implements [`Implements`] for a concrete type and one or more trait objects.
///
/// ```rust
/// use keystone_di::implements;
///
/// trait Logger: Send + Sync {}
/// trait Sink: Send + Sync {}
///
/// struct FileLogger;
/// impl Logger for FileLogger {}
/// impl Sink for FileLogger {}
///
/// implements!(FileLogger => dyn Logger, dyn Sink);
/// ```
#[macro_export]
macro_rules! implements {
    ($implementation:ty => $($service:ty),+ $(,)?) => {
        $(
            impl $crate::Implements<$service> for $implementation {
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$service> {
                    self
                }
            }
        )+
    };
}

/// How a constructor parameter is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// A shared service, injected as `Arc<S>`
    Service,
    /// A plain value taken by value
    Value,
    /// Every registered implementation of an element service
    Collection,
}

/// Describes one constructor parameter.
#[derive(Clone)]
pub struct Parameter {
    name: &'static str,
    type_info: TypeInfo,
    kind: ParameterKind,
    key: Key,
}

impl Parameter {
    /// A parameter injected with the registration for `S`.
    pub fn service<S: ?Sized + Send + Sync + 'static>(name: &'static str) -> Self {
        Self { name, type_info: TypeInfo::of::<S>(), kind: ParameterKind::Service, key: Key::of::<S>() }
    }

    /// A parameter injected with the registration for `S` under `service_name`.
    pub fn named<S: ?Sized + Send + Sync + 'static>(name: &'static str, service_name: &'static str) -> Self {
        Self {
            name,
            type_info: TypeInfo::of::<S>(),
            kind: ParameterKind::Service,
            key: Key::named::<S>(service_name),
        }
    }

    /// A parameter injected with `Collection<S>`.
    pub fn collection<S: ?Sized + Send + Sync + 'static>(name: &'static str) -> Self {
        Self {
            name,
            type_info: TypeInfo::of::<Collection<S>>(),
            kind: ParameterKind::Collection,
            key: Key::collection_of::<S>(),
        }
    }

    /// A by-value parameter. Rejected by the default verification behavior
    /// unless the registration overrides it.
    pub fn value<T: Clone + Send + Sync + 'static>(name: &'static str) -> Self {
        Self { name, type_info: TypeInfo::of::<T>(), kind: ParameterKind::Value, key: Key::of::<T>() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    /// Key used to look up the injected producer.
    pub fn key(&self) -> Key {
        self.key
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({:?})", self.name, self.type_info, self.kind)
    }
}

/// Type-erased constructor metadata seen by the pluggable behaviors.
#[derive(Debug, Clone)]
pub struct ConstructorInfo {
    name: &'static str,
    parameters: Vec<Parameter>,
}

impl ConstructorInfo {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }
}

pub(crate) type Invoke<T> = Arc<dyn Fn(&mut Arguments) -> DiResult<T> + Send + Sync>;

/// One public constructor of an [`Injectable`] type.
pub struct Constructor<T> {
    info: ConstructorInfo,
    invoke: Invoke<T>,
}

impl<T> Constructor<T> {
    /// Creates a constructor; declare its parameters with [`param`](Self::param)
    /// in the order `invoke` consumes them.
    pub fn new<F>(name: &'static str, invoke: F) -> Self
    where
        F: Fn(&mut Arguments) -> DiResult<T> + Send + Sync + 'static,
    {
        Self {
            info: ConstructorInfo { name, parameters: Vec::new() },
            invoke: Arc::new(invoke),
        }
    }

    pub fn param(mut self, parameter: Parameter) -> Self {
        self.info.parameters.push(parameter);
        self
    }

    pub fn info(&self) -> &ConstructorInfo {
        &self.info
    }

    pub(crate) fn into_parts(self) -> (ConstructorInfo, Invoke<T>) {
        (self.info, self.invoke)
    }
}

/// Resolved constructor arguments, consumed in declaration order.
pub struct Arguments {
    implementation: &'static str,
    values: std::vec::IntoIter<(&'static str, AnyArc)>,
}

impl Arguments {
    pub(crate) fn new(implementation: &'static str, values: Vec<(&'static str, AnyArc)>) -> Self {
        Self { implementation, values: values.into_iter() }
    }

    /// Takes the next argument as a shared service.
    pub fn next<S: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Arc<S>> {
        let (_, any) = self.values.next().ok_or_else(|| {
            DiError::Configuration(format!(
                "The constructor of type {} consumed more arguments than it declares.",
                self.implementation
            ))
        })?;
        downcast_instance::<S>(&any)
    }

    /// Takes the next argument as a by-value parameter.
    pub fn value<T: Clone + Send + Sync + 'static>(&mut self) -> DiResult<T> {
        self.next::<T>().map(|value| (*value).clone())
    }

    /// Takes the next argument as a collection of `S`.
    pub fn collection<S: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Arc<Collection<S>>> {
        self.next::<Collection<S>>()
    }

    /// Name of the parameter the next call will consume.
    pub fn peek_name(&self) -> Option<&'static str> {
        self.values.as_slice().first().map(|(name, _)| *name)
    }
}
