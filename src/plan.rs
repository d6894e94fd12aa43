//! Instantiation plans.
//!
//! A [`Plan`] is the small invocation tree a registration builds once: a
//! constructor call with its argument sources, wrapped by the lifestyle's
//! cache. [`Plan::compile`] turns the tree into a single closure that the
//! owning producer keeps for the rest of the container's life.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::collection::Cast;
use crate::descriptors::{Arguments, Invoke};
use crate::error::{DiError, DiResult};
use crate::internal::Disposer;
use crate::key::{AnyArc, Assembler};
use crate::lifestyle::{HybridTest, ScopedLifestyle};
use crate::producer::InstanceProducer;
use crate::provider::ResolverContext;
use crate::registration::RegistrationId;

/// A produced value plus its disposal capability.
#[derive(Clone)]
pub(crate) struct Instance {
    pub(crate) value: AnyArc,
    pub(crate) disposable: Option<Disposer>,
}

/// Compiled plan.
pub(crate) type Factory = Arc<dyn Fn(&ResolverContext) -> DiResult<Instance> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum ArgumentSource {
    Producer(Arc<InstanceProducer>),
    Fixed(AnyArc),
}

/// One constructor argument.
#[derive(Clone)]
pub(crate) struct Argument {
    name: &'static str,
    source: ArgumentSource,
}

impl Argument {
    pub(crate) fn producer(name: &'static str, producer: Arc<InstanceProducer>) -> Self {
        Self { name, source: ArgumentSource::Producer(producer) }
    }

    pub(crate) fn fixed(name: &'static str, value: AnyArc) -> Self {
        Self { name, source: ArgumentSource::Fixed(value) }
    }

    fn resolve(&self, context: &ResolverContext) -> DiResult<(&'static str, AnyArc)> {
        let value = match &self.source {
            ArgumentSource::Producer(producer) => producer.resolve(context)?.value,
            ArgumentSource::Fixed(value) => value.clone(),
        };
        Ok((self.name, value))
    }
}

#[derive(Clone)]
pub(crate) enum Plan {
    /// Invoke a constructor with resolved arguments
    Construct {
        implementation: &'static str,
        invoke: Invoke<Instance>,
        arguments: Vec<Argument>,
    },
    /// Invoke a user factory
    Factory(Factory),
    /// Return a pre-built instance
    Constant(Instance),
    /// Resolve another producer
    Dependency(Arc<InstanceProducer>),
    /// Singleton cache
    Cached {
        cell: Arc<OnceCell<Instance>>,
        inner: Box<Plan>,
    },
    /// Per-scope cache
    Scoped {
        registration: RegistrationId,
        service: &'static str,
        lifestyle: ScopedLifestyle,
        inner: Box<Plan>,
    },
    /// Hybrid branch selection
    Conditional {
        test: HybridTest,
        when_true: Box<Plan>,
        when_false: Box<Plan>,
    },
    /// Reinterpret an element as the collection's element type
    Cast { inner: Box<Plan>, cast: Cast },
    /// Resolve every element and assemble the collection
    Collection { assemble: Assembler, elements: Vec<Plan> },
}

impl Plan {
    pub(crate) fn compile(&self) -> Factory {
        match self {
            Plan::Construct { implementation, invoke, arguments } => {
                let implementation = *implementation;
                let invoke = invoke.clone();
                let arguments = arguments.clone();
                Arc::new(move |context: &ResolverContext| {
                    let values = arguments
                        .iter()
                        .map(|argument| argument.resolve(context))
                        .collect::<DiResult<Vec<_>>>()?;
                    invoke(&mut Arguments::new(implementation, values))
                })
            }
            Plan::Factory(factory) => factory.clone(),
            Plan::Constant(instance) => {
                let instance = instance.clone();
                Arc::new(move |_: &ResolverContext| Ok(instance.clone()))
            }
            Plan::Dependency(producer) => {
                let producer = producer.clone();
                Arc::new(move |context: &ResolverContext| producer.resolve(context))
            }
            Plan::Cached { cell, inner } => {
                let cell = cell.clone();
                let inner = inner.compile();
                Arc::new(move |context: &ResolverContext| {
                    cell.get_or_try_init(|| {
                        let instance = inner(context)?;
                        if let Some(disposer) = &instance.disposable {
                            context.container().track_singleton(disposer.clone());
                        }
                        Ok(instance)
                    })
                    .cloned()
                })
            }
            Plan::Scoped { registration, service, lifestyle, inner } => {
                let registration = *registration;
                let service = *service;
                let lifestyle = lifestyle.clone();
                let inner = inner.compile();
                Arc::new(move |context: &ResolverContext| {
                    let scope = lifestyle.active_scope(context).ok_or_else(|| DiError::NoActiveScope {
                        service,
                        lifestyle: lifestyle.name().to_string(),
                    })?;
                    let scoped = context.with_scope(scope.clone());
                    scope.get_or_create(registration, service, || inner(&scoped))
                })
            }
            Plan::Conditional { test, when_true, when_false } => {
                let test = test.clone();
                let when_true = when_true.compile();
                let when_false = when_false.compile();
                Arc::new(move |context: &ResolverContext| if test() { when_true(context) } else { when_false(context) })
            }
            Plan::Cast { inner, cast } => {
                let inner = inner.compile();
                let cast = *cast;
                Arc::new(move |context: &ResolverContext| {
                    let instance = inner(context)?;
                    Ok(Instance { value: cast(&instance.value)?, disposable: None })
                })
            }
            Plan::Collection { assemble, elements } => {
                let assemble = *assemble;
                let elements: Vec<Factory> = elements.iter().map(Plan::compile).collect();
                Arc::new(move |context: &ResolverContext| {
                    let items = elements
                        .iter()
                        .map(|element| element(context).map(|instance| instance.value))
                        .collect::<DiResult<Vec<_>>>()?;
                    Ok(Instance { value: assemble(items)?, disposable: None })
                })
            }
        }
    }
}
