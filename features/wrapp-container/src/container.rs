use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;

use crate::{
    builder::{ContainerBuilder, ContainerOptions},
    compiler::{compile_plan, BuildPlan},
    context::{Frame, Overrides, ResolutionContext},
    dependency_graph::DependencyGraph,
    errors::{ResolveError, ValidateError},
    factories::{DynFactory, FnFactory, GenericFactory},
    lifetime::Lifetime,
    metadata::TypeMetadata,
    registry::{InjectionConstructor, Registration, RegistrationKey, RegistrationSource, Registry},
    types::{DynError, GenericDefinition, Injectable, Instance, TypeDescriptor, TypeInfo},
};

/// Dependency injection container
///
/// Cheap to clone, all clones share registrations, singletons and compiled plans.
#[derive(Clone)]
pub struct Container(pub(crate) Arc<ContainerInner>);
pub struct ContainerInner {
    registry: RwLock<Registry>,
    /// Compiled plans, stale once the registry generation moves on or the descriptor kind differs
    plans: RwLock<HashMap<RegistrationKey, Arc<BuildPlan>>>,
    options: ContainerOptions,
    compilations: AtomicUsize,
}
impl Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.0.registry.read();
        let mut map = f.debug_struct("Container");
        for registration in registry.registrations() {
            map.field(registration.key.info.type_name, &registration.lifetime());
        }
        map.finish()
    }
}
impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::from_parts(Registry::new(), ContainerOptions::default())
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub(crate) fn from_parts(registry: Registry, options: ContainerOptions) -> Self {
        Container(Arc::new(ContainerInner {
            registry: RwLock::new(registry),
            plans: RwLock::new(HashMap::new()),
            options,
            compilations: AtomicUsize::new(0),
        }))
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.0.options
    }

    /// Number of build plans compiled so far
    pub fn compiled_plan_count(&self) -> usize {
        self.0.compilations.load(Ordering::Relaxed)
    }
}

// Registration
impl Container {
    /// Adds or replaces the constructor table of a type
    pub fn describe(&self, metadata: TypeMetadata) -> &Self {
        self.0.registry.write().describe(metadata);
        self
    }

    pub fn register(&self, registration: Registration) -> &Self {
        self.0.registry.write().register(registration);
        self
    }

    /// Builds the type through its own constructors
    pub fn register_type(&self, descriptor: TypeDescriptor, name: Option<&str>, lifetime: Lifetime) -> &Self {
        self.register(Registration::new(descriptor, name, RegistrationSource::Type, lifetime))
    }

    /// Builds the type through the constructor matching `constructor`
    pub fn register_type_with(
        &self,
        descriptor: TypeDescriptor,
        name: Option<&str>,
        lifetime: Lifetime,
        constructor: InjectionConstructor,
    ) -> &Self {
        self.register(
            Registration::new(descriptor, name, RegistrationSource::Type, lifetime)
                .with_injection_constructor(constructor),
        )
    }

    pub fn register_instance(&self, descriptor: TypeDescriptor, name: Option<&str>, instance: Instance) -> &Self {
        self.register(Registration::new(
            descriptor,
            name,
            RegistrationSource::Instance(instance),
            Lifetime::Transient,
        ))
    }

    pub fn register_factory(
        &self,
        descriptor: TypeDescriptor,
        name: Option<&str>,
        lifetime: Lifetime,
        factory: impl DynFactory + 'static,
    ) -> &Self {
        self.register(Registration::new(
            descriptor,
            name,
            RegistrationSource::Factory(Arc::new(factory)),
            lifetime,
        ))
    }

    pub fn register_fn<T, F>(&self, descriptor: TypeDescriptor, name: Option<&str>, lifetime: Lifetime, construct: F) -> &Self
    where
        T: Injectable,
        F: Fn(&mut ResolutionContext<'_>) -> Result<T, DynError> + Send + Sync + 'static,
    {
        self.register_factory(descriptor, name, lifetime, FnFactory::new(construct))
    }

    /// Resolves `to` and converts it whenever `from` is requested
    ///
    /// Typically maps a trait object key onto its implementation:
    /// `convert` receives the built `Implementation` and returns the `Service` value, e.g. `Arc<dyn Trait>`.
    pub fn register_mapping<Service, Implementation, F>(
        &self,
        from: TypeDescriptor,
        name: Option<&str>,
        lifetime: Lifetime,
        to: TypeDescriptor,
        convert: F,
    ) -> &Self
    where
        Service: Injectable,
        Implementation: Injectable,
        F: Fn(Arc<Implementation>) -> Service + Send + Sync + 'static,
    {
        let convert = move |instance: Instance| -> Result<Instance, ResolveError> {
            Ok(Instance::new(convert(instance.downcast::<Implementation>()?)))
        };
        self.register(Registration::new(
            from,
            name,
            RegistrationSource::Mapping {
                target: to,
                convert: Arc::new(convert),
            },
            lifetime,
        ))
    }

    /// Registers a factory for every closed type of an open generic definition
    pub fn register_generic_factory(&self, definition: GenericDefinition, factory: impl GenericFactory + 'static) -> &Self {
        self.0.registry.write().register_generic(definition, Arc::new(factory));
        self
    }

    /// Is the type registered under any name
    pub fn is_registered(&self, info: &TypeInfo) -> bool {
        self.0.registry.read().is_registered(info)
    }

    /// Is the type registered under exactly this name
    pub fn is_registered_as(&self, key: &RegistrationKey) -> bool {
        self.0.registry.read().find(key).is_some()
    }

    pub fn is_generic_registered(&self, definition: GenericDefinition) -> bool {
        self.0.registry.read().is_generic_registered(definition)
    }

    pub fn registrations_of(&self, info: &TypeInfo) -> Vec<Arc<Registration>> {
        self.0.registry.read().registrations_of(info)
    }

    /// Checks all registrations for missing and circular dependencies
    pub fn validate(&self) -> Result<(), ValidateError> {
        let registry = self.0.registry.read();
        DependencyGraph::new(&registry, self.0.options.selection).check()?;
        Ok(())
    }
}

// Resolution
impl Container {
    pub fn resolve(&self, descriptor: &TypeDescriptor) -> Result<Instance, ResolveError> {
        self.resolve_with(descriptor, None, Overrides::default())
    }

    pub fn resolve_named(&self, descriptor: &TypeDescriptor, name: Option<&str>) -> Result<Instance, ResolveError> {
        self.resolve_with(descriptor, name, Overrides::default())
    }

    /// Resolves with caller supplied instances for some of the types in the tree
    pub fn resolve_with(
        &self,
        descriptor: &TypeDescriptor,
        name: Option<&str>,
        overrides: Overrides,
    ) -> Result<Instance, ResolveError> {
        let mut ctx = ResolutionContext::new(self, overrides);
        self.resolve_in(&mut ctx, descriptor, name)
    }

    pub fn resolve_as<T: Injectable>(&self, descriptor: &TypeDescriptor) -> Result<Arc<T>, ResolveError> {
        self.resolve(descriptor)?.downcast()
    }

    /// Runs the plan of `descriptor` against an existing instance
    ///
    /// The instance counts as already built, so construction is skipped while
    /// the remaining steps still apply.
    pub fn build_up(&self, descriptor: &TypeDescriptor, instance: Instance) -> Result<Instance, ResolveError> {
        self.resolve_with(descriptor, None, Overrides::new().dependency_instance(instance))
    }

    /// Attempts to get the requested type, looked up by its Rust type alone
    pub fn require<T: Injectable>(&self) -> Result<Arc<T>, ResolveError> {
        let info = TypeInfo::of::<T>();
        let descriptor = {
            let registry = self.0.registry.read();
            match registry.registrations_of(&info).first() {
                Some(registration) => registration.descriptor.clone(),
                None if registry.metadata(info.type_id).is_some() => TypeDescriptor::class::<T>(),
                None => return Err(ResolveError::TypeMissing { type_info: info, name: None }),
            }
        };

        self.resolve_as(&descriptor)
    }

    /// Resolves every registration of `descriptor`, the unnamed one first
    pub fn resolve_all(&self, descriptor: &TypeDescriptor) -> Result<Vec<Instance>, ResolveError> {
        let names: Vec<Option<String>> = self
            .registrations_of(&descriptor.info)
            .iter()
            .map(|registration| registration.key.name.clone())
            .collect();

        let mut ctx = ResolutionContext::new(self, Overrides::default());
        names
            .iter()
            .map(|name| self.resolve_in(&mut ctx, descriptor, name.as_deref()))
            .collect()
    }

    /// The resolve pipeline, re-entered for every dependency
    pub(crate) fn resolve_in(
        &self,
        ctx: &mut ResolutionContext<'_>,
        descriptor: &TypeDescriptor,
        name: Option<&str>,
    ) -> Result<Instance, ResolveError> {
        let key = RegistrationKey::new(descriptor.info, name);

        if let Some(scoped) = ctx.scoped(&key) {
            tracing::trace!("Reusing per-resolve instance of {key}");
            return Ok(scoped);
        }

        let existing = ctx.dependency_override(&descriptor.info);
        let registration = self.0.registry.read().find(&key);

        if existing.is_none() {
            if let Some(stored) = registration.as_ref().and_then(|r| r.manager.get()) {
                tracing::trace!("Reusing stored instance of {key}");
                return Ok(stored);
            }
        }

        let supplied = existing.is_some();
        let descriptor = registration.as_ref().map_or(descriptor, |r| &r.descriptor);
        let plan = self.plan_for(&key, descriptor, registration.as_deref());
        let lifetime = registration.as_ref().map(|r| r.lifetime()).unwrap_or_default();

        ctx.enter(Frame {
            key: key.clone(),
            existing,
            lifetime: lifetime.into(),
        })?;
        let result = plan.execute(ctx);
        let frame = ctx.leave();
        result?;

        let instance = frame
            .and_then(|frame| frame.existing)
            .ok_or_else(|| ResolveError::TypeMissing {
                type_info: key.info,
                name: key.name.clone(),
            })?;

        match registration {
            Some(registration) if !supplied => Ok(registration.manager.store(instance)),
            _ => Ok(instance),
        }
    }

    /// The cached plan for `key`, compiled if missing or stale
    fn plan_for(
        &self,
        key: &RegistrationKey,
        descriptor: &TypeDescriptor,
        registration: Option<&Registration>,
    ) -> Arc<BuildPlan> {
        let registry = self.0.registry.read();
        let cache_plans = self.0.options.cache_plans;

        if cache_plans {
            if let Some(plan) = self.0.plans.read().get(key) {
                // Unregistered keys compile by descriptor kind, another kind needs its own plan
                if plan.generation == registry.generation() && plan.kind == descriptor.kind.tag() {
                    tracing::trace!("Using cached build plan for {key}");
                    return plan.clone();
                }
            }
        }

        let plan = Arc::new(compile_plan(
            &registry,
            key,
            descriptor,
            registration,
            self.0.options.selection,
        ));
        self.0.compilations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Compiled build plan for {key}: {:?}", plan.steps());

        if cache_plans {
            self.0.plans.write().insert(key.clone(), plan.clone());
        }
        plan
    }
}
