//! Registrations: instantiation logic for one implementation, bound to a lifestyle.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::collection::CollectionElement;
use crate::container::Container;
use crate::descriptors::{Arguments, ConstructorInfo, Implements, Injectable, Invoke, Parameter};
use crate::diagnostics::KnownRelationship;
use crate::error::{DiError, DiResult};
use crate::internal::Disposer;
use crate::key::{erase, AnyArc, CollectionShape, TypeInfo};
use crate::lifestyle::{HybridTest, Lifestyle};
use crate::plan::{Argument, Factory, Instance, Plan};

static NEXT_REGISTRATION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a registration; scoped caches are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl RegistrationId {
    fn next() -> Self {
        RegistrationId(NEXT_REGISTRATION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

enum RegistrationKind {
    Constructed {
        constructors: Vec<ConstructorInfo>,
        invokers: Vec<Invoke<Instance>>,
    },
    Factory(Factory),
    Instance(Instance),
    Hybrid {
        test: HybridTest,
        when_true: Arc<Registration>,
        when_false: Arc<Registration>,
    },
    Collection {
        shape: CollectionShape,
        elements: Vec<CollectionElement>,
    },
}

#[derive(Clone)]
struct ParameterOverride {
    name: &'static str,
    value: AnyArc,
}

struct BuiltPlan {
    plan: Plan,
    relationships: Vec<KnownRelationship>,
}

/// Compiled instantiation logic for one implementation.
///
/// The plan is built at most once, on first use, and then reused forever.
/// Relationship edges are stored together with the plan, so they are either
/// complete or absent.
///
/// # Examples
///
/// Overriding a by-value constructor argument:
///
/// ```rust
/// use keystone_di::{Constructor, Container, Injectable, Lifestyle, Parameter, Resolver};
///
/// struct Client { timeout_ms: u64 }
///
/// impl Injectable for Client {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("new", |args| Ok(Client { timeout_ms: args.value()? }))
///             .param(Parameter::value::<u64>("timeout_ms"))]
///     }
/// }
///
/// let container = Container::new();
/// let registration = Lifestyle::Transient.create_registration::<Client, Client>(&container);
/// registration.override_parameter("timeout_ms", 250u64).unwrap();
/// container.add_registration::<Client>(registration).unwrap();
///
/// assert_eq!(container.get_instance::<Client>().unwrap().timeout_ms, 250);
/// ```
pub struct Registration {
    id: RegistrationId,
    container_id: u64,
    service: TypeInfo,
    implementation: TypeInfo,
    lifestyle: Lifestyle,
    kind: RegistrationKind,
    overrides: Mutex<Vec<ParameterOverride>>,
    singleton: Arc<OnceCell<Instance>>,
    built: OnceCell<Result<BuiltPlan, DiError>>,
}

impl Registration {
    fn new(
        container: &Container,
        service: TypeInfo,
        implementation: TypeInfo,
        lifestyle: Lifestyle,
        kind: RegistrationKind,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: RegistrationId::next(),
            container_id: container.id(),
            service,
            implementation,
            lifestyle,
            kind,
            overrides: Mutex::new(Vec::new()),
            singleton: Arc::new(OnceCell::new()),
            built: OnceCell::new(),
        })
    }

    pub(crate) fn constructed<S, I>(container: &Container, lifestyle: Lifestyle) -> Arc<Self>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        let (constructors, invokers) = I::constructors()
            .into_iter()
            .map(|constructor| {
                let (info, invoke) = constructor.into_parts();
                let erased: Invoke<Instance> = Arc::new(move |arguments: &mut Arguments| {
                    let value = Arc::new(invoke(arguments)?);
                    let disposable = I::disposable(value.clone())
                        .map(|target| Disposer::new(std::any::type_name::<I>(), target));
                    Ok(Instance {
                        value: erase::<S>(<I as Implements<S>>::upcast(value)),
                        disposable,
                    })
                });
                (info, erased)
            })
            .unzip();

        Self::new(
            container,
            TypeInfo::of::<S>(),
            TypeInfo::of::<I>(),
            lifestyle,
            RegistrationKind::Constructed { constructors, invokers },
        )
    }

    pub(crate) fn factory<S>(container: &Container, lifestyle: Lifestyle, factory: Factory) -> Arc<Self>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        Self::new(
            container,
            TypeInfo::of::<S>(),
            TypeInfo::of::<S>(),
            lifestyle,
            RegistrationKind::Factory(factory),
        )
    }

    pub(crate) fn instance<S>(container: &Container, instance: Arc<S>) -> Arc<Self>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        Self::new(
            container,
            TypeInfo::of::<S>(),
            TypeInfo::of::<S>(),
            Lifestyle::Singleton,
            RegistrationKind::Instance(Instance { value: erase::<S>(instance), disposable: None }),
        )
    }

    pub(crate) fn hybrid(
        container: &Container,
        lifestyle: Lifestyle,
        test: HybridTest,
        when_true: Arc<Registration>,
        when_false: Arc<Registration>,
    ) -> Arc<Self> {
        Self::new(
            container,
            when_true.service,
            when_true.implementation,
            lifestyle,
            RegistrationKind::Hybrid { test, when_true, when_false },
        )
    }

    pub(crate) fn collection(
        container: &Container,
        service: TypeInfo,
        shape: CollectionShape,
        elements: Vec<CollectionElement>,
    ) -> Arc<Self> {
        Self::new(
            container,
            service,
            service,
            Lifestyle::Transient,
            RegistrationKind::Collection { shape, elements },
        )
    }

    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// The service type this registration serves.
    pub fn service_type(&self) -> TypeInfo {
        self.service
    }

    pub fn implementation_type(&self) -> TypeInfo {
        self.implementation
    }

    pub fn lifestyle(&self) -> &Lifestyle {
        &self.lifestyle
    }

    pub(crate) fn container_id(&self) -> u64 {
        self.container_id
    }

    /// Whether the instantiation plan has been built.
    pub fn is_built(&self) -> bool {
        self.built.get().is_some()
    }

    /// Whether this registration assembles a collection of other producers.
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, RegistrationKind::Collection { .. })
    }

    /// Dependency edges recorded while building the plan. Empty until built.
    pub fn relationships(&self) -> Vec<KnownRelationship> {
        match self.built.get() {
            Some(Ok(built)) => built.relationships.clone(),
            _ => Vec::new(),
        }
    }

    /// Supplies a fixed value for the constructor parameter `name`.
    ///
    /// Must be called before the plan is built. Overridden parameters bypass
    /// constructor verification.
    pub fn override_parameter<T: Send + Sync + 'static>(&self, name: &'static str, value: T) -> DiResult<()> {
        self.add_override(name, TypeInfo::of::<T>(), erase::<T>(Arc::new(value)))
    }

    /// Supplies a fixed shared service for the constructor parameter `name`.
    pub fn override_service<S: ?Sized + Send + Sync + 'static>(&self, name: &'static str, service: Arc<S>) -> DiResult<()> {
        self.add_override(name, TypeInfo::of::<S>(), erase::<S>(service))
    }

    fn add_override(&self, name: &'static str, value_type: TypeInfo, value: AnyArc) -> DiResult<()> {
        if self.is_built() {
            return Err(DiError::Configuration(format!(
                "The registration for {} has already been built; parameter overrides must be applied before the first resolution.",
                self.implementation
            )));
        }

        match &self.kind {
            RegistrationKind::Constructed { constructors, .. } => {
                let parameter = find_parameter(constructors, name).ok_or_else(|| {
                    DiError::Configuration(format!(
                        "Parameter '{}' does not exist on any constructor of type {}.",
                        name, self.implementation
                    ))
                })?;
                if parameter.type_info() != value_type {
                    return Err(DiError::Configuration(format!(
                        "Parameter '{}' of type {} can't be overridden with a value of type {}.",
                        name,
                        parameter.type_info(),
                        value_type
                    )));
                }
                let mut overrides = self.overrides.lock();
                overrides.retain(|existing| existing.name != name);
                overrides.push(ParameterOverride { name, value });
                Ok(())
            }
            RegistrationKind::Hybrid { when_true, when_false, .. } => {
                // Both branches or neither
                if when_true.is_built() || when_false.is_built() {
                    return Err(DiError::Configuration(format!(
                        "A branch of the hybrid registration for {} has already been built; parameter overrides must be applied before the first resolution.",
                        self.implementation
                    )));
                }
                when_true.add_override(name, value_type, value.clone())?;
                when_false.add_override(name, value_type, value)
            }
            _ => Err(DiError::Configuration(format!(
                "The registration for {} has no constructor parameters to override.",
                self.implementation
            ))),
        }
    }

    /// Builds the plan on first call and returns the cached outcome afterwards.
    pub(crate) fn plan(&self, container: &Container) -> DiResult<&Plan> {
        match self.built.get_or_init(|| self.build(container)) {
            Ok(built) => Ok(&built.plan),
            Err(err) => Err(err.clone()),
        }
    }

    fn build(&self, container: &Container) -> DiResult<BuiltPlan> {
        let (plan, relationships) = match &self.kind {
            RegistrationKind::Constructed { constructors, invokers } => {
                self.build_constructor(container, constructors, invokers)?
            }
            RegistrationKind::Factory(factory) => (Plan::Factory(factory.clone()), Vec::new()),
            RegistrationKind::Instance(instance) => {
                return Ok(BuiltPlan { plan: Plan::Constant(instance.clone()), relationships: Vec::new() });
            }
            RegistrationKind::Hybrid { test, when_true, when_false } => {
                return self.build_hybrid(container, test, when_true, when_false);
            }
            RegistrationKind::Collection { shape, elements } => self.build_collection(container, shape, elements)?,
        };

        Ok(BuiltPlan { plan: self.wrap(plan), relationships })
    }

    fn build_constructor(
        &self,
        container: &Container,
        constructors: &[ConstructorInfo],
        invokers: &[Invoke<Instance>],
    ) -> DiResult<(Plan, Vec<KnownRelationship>)> {
        let options = container.options();
        let overrides = self.overrides.lock().clone();
        let overridden: Vec<&'static str> = overrides.iter().map(|o| o.name).collect();
        let index = options
            .constructor_resolution()
            .select(self.implementation, constructors, &overridden, container)?;
        let (constructor, invoke) = match (constructors.get(index), invokers.get(index)) {
            (Some(constructor), Some(invoke)) => (constructor, invoke.clone()),
            _ => return Err(DiError::NoResolvableConstructor(self.implementation.name())),
        };

        let mut arguments = Vec::with_capacity(constructor.parameters().len());
        let mut relationships = Vec::new();

        for parameter in constructor.parameters() {
            if let Some(fixed) = overrides.iter().find(|o| o.name == parameter.name()) {
                arguments.push(Argument::fixed(parameter.name(), fixed.value.clone()));
                continue;
            }

            options.constructor_verification().verify(self.implementation, parameter)?;
            let producer = options
                .dependency_injection()
                .resolve(container, self.implementation, parameter)?;

            relationships.push(KnownRelationship::new(self.implementation, self.lifestyle.clone(), producer.clone()));
            arguments.push(Argument::producer(parameter.name(), producer));
        }

        let plan = Plan::Construct { implementation: self.implementation.name(), invoke, arguments };
        Ok((plan, relationships))
    }

    fn build_hybrid(
        &self,
        container: &Container,
        test: &HybridTest,
        when_true: &Registration,
        when_false: &Registration,
    ) -> DiResult<BuiltPlan> {
        let true_plan = when_true.plan(container)?.clone();
        let false_plan = when_false.plan(container)?.clone();

        // Both branches' edges, attributed to the hybrid as a whole
        let mut relationships: Vec<KnownRelationship> = Vec::new();
        for relationship in when_true.relationships().into_iter().chain(when_false.relationships()) {
            let relationship = relationship.with_lifestyle(self.lifestyle.clone());
            if !relationships.iter().any(|known| known.same_edge(&relationship)) {
                relationships.push(relationship);
            }
        }

        Ok(BuiltPlan {
            plan: Plan::Conditional {
                test: test.clone(),
                when_true: Box::new(true_plan),
                when_false: Box::new(false_plan),
            },
            relationships,
        })
    }

    fn build_collection(
        &self,
        container: &Container,
        shape: &CollectionShape,
        elements: &[CollectionElement],
    ) -> DiResult<(Plan, Vec<KnownRelationship>)> {
        let mut plans = Vec::with_capacity(elements.len());
        let mut relationships = Vec::with_capacity(elements.len());

        for element in elements {
            let (producer, plan) = match element {
                CollectionElement::Producer(producer) => (producer.clone(), Plan::Dependency(producer.clone())),
                CollectionElement::Reference { key, cast } => {
                    let producer = container.get_registration(key)?;
                    let plan = Plan::Cast { inner: Box::new(Plan::Dependency(producer.clone())), cast: *cast };
                    (producer, plan)
                }
            };
            relationships.push(KnownRelationship::new(self.implementation, self.lifestyle.clone(), producer));
            plans.push(plan);
        }

        Ok((Plan::Collection { assemble: shape.assemble, elements: plans }, relationships))
    }

    fn wrap(&self, plan: Plan) -> Plan {
        match &self.lifestyle {
            Lifestyle::Transient | Lifestyle::Hybrid(_) => plan,
            Lifestyle::Singleton => Plan::Cached { cell: self.singleton.clone(), inner: Box::new(plan) },
            Lifestyle::Scoped(scoped) => Plan::Scoped {
                registration: self.id,
                service: self.service.name(),
                lifestyle: scoped.clone(),
                inner: Box::new(plan),
            },
        }
    }
}

fn find_parameter<'a>(constructors: &'a [ConstructorInfo], name: &str) -> Option<&'a Parameter> {
    constructors
        .iter()
        .flat_map(|constructor| constructor.parameters())
        .find(|parameter| parameter.name() == name)
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("service", &self.service)
            .field("implementation", &self.implementation)
            .field("lifestyle", &self.lifestyle)
            .field("built", &self.is_built())
            .finish()
    }
}
