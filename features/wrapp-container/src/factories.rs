use std::sync::Arc;

use crate::{
    context::ResolutionContext,
    dependency_graph::DependencyInfo,
    errors::ResolveError,
    types::{DynError, Injectable, Instance, TypeDescriptor, TypeInfo},
};

/// A Factory providing instances of a given type
pub trait InstanceFactory: Send + Sync {
    type Provides: Injectable;

    /// Returns the typeinfo about the factory's provided type
    fn supplies() -> TypeInfo {
        TypeInfo::of::<Self::Provides>()
    }

    /// Returns a list of dependencies the factory requires to supply it's type
    ///
    /// Only used for validating the dependency graph.
    fn get_dependencies() -> Vec<DependencyInfo> {
        Vec::new()
    }

    /// Constructs a new instance of the factory's provided type
    ///
    /// Dependencies are resolved through the context, so they share its per-resolve scope.
    fn construct(&self, ctx: &mut ResolutionContext<'_>) -> Result<Self::Provides, impl Into<DynError>>;
}

/// Wrapper Trait for factories, providing instances of Any
pub trait DynFactory: Send + Sync {
    fn supplies(&self) -> TypeInfo;

    /// Returns a list of dependencies for the factory
    fn dependencies(&self) -> Vec<DependencyInfo>;

    /// Constructs a new instance of the factory's provided type
    fn construct(&self, ctx: &mut ResolutionContext<'_>) -> Result<Instance, ResolveError>;
}
// Impl DynFactory for any InstanceFactory
impl<T: Injectable, SpecificFactory: InstanceFactory<Provides = T>> DynFactory for SpecificFactory {
    fn supplies(&self) -> TypeInfo {
        SpecificFactory::supplies()
    }

    fn dependencies(&self) -> Vec<DependencyInfo> {
        SpecificFactory::get_dependencies()
    }

    fn construct(&self, ctx: &mut ResolutionContext<'_>) -> Result<Instance, ResolveError> {
        // Forward the call to the specific implementation
        SpecificFactory::construct(self, ctx)
            .map(Instance::new)
            .map_err(|e| ResolveError::factory_failed(SpecificFactory::supplies(), e.into()))
    }
}

/// Adapts a closure into an [InstanceFactory]
pub struct FnFactory<T, F> {
    construct: F,
    dependencies: Vec<DependencyInfo>,
    _marker: std::marker::PhantomData<fn() -> T>,
}
impl<T, F> FnFactory<T, F>
where
    T: Injectable,
    F: Fn(&mut ResolutionContext<'_>) -> Result<T, DynError> + Send + Sync,
{
    pub fn new(construct: F) -> Self {
        FnFactory {
            construct,
            dependencies: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Declares a dependency for graph validation
    pub fn depends_on(mut self, dependency: DependencyInfo) -> Self {
        self.dependencies.push(dependency);
        self
    }
}
impl<T, F> DynFactory for FnFactory<T, F>
where
    T: Injectable,
    F: Fn(&mut ResolutionContext<'_>) -> Result<T, DynError> + Send + Sync,
{
    fn supplies(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn dependencies(&self) -> Vec<DependencyInfo> {
        self.dependencies.clone()
    }

    fn construct(&self, ctx: &mut ResolutionContext<'_>) -> Result<Instance, ResolveError> {
        (self.construct)(ctx)
            .map(Instance::new)
            .map_err(|e| ResolveError::factory_failed(TypeInfo::of::<T>(), e))
    }
}

/// Builds closed types of an open generic definition
pub trait GenericFactory: Send + Sync {
    fn build(
        &self,
        ctx: &mut ResolutionContext<'_>,
        descriptor: &TypeDescriptor,
    ) -> Result<Instance, ResolveError>;
}
impl<F> GenericFactory for F
where
    F: Fn(&mut ResolutionContext<'_>, &TypeDescriptor) -> Result<Instance, ResolveError> + Send + Sync,
{
    fn build(
        &self,
        ctx: &mut ResolutionContext<'_>,
        descriptor: &TypeDescriptor,
    ) -> Result<Instance, ResolveError> {
        self(ctx, descriptor)
    }
}

pub(crate) type SharedFactory = Arc<dyn DynFactory>;
pub(crate) type SharedGenericFactory = Arc<dyn GenericFactory>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{container::Container, lifetime::Lifetime};

    struct Config {
        port: u16,
    }
    struct ConfigFactory;
    impl InstanceFactory for ConfigFactory {
        type Provides = Config;

        fn get_dependencies() -> Vec<DependencyInfo> {
            vec![DependencyInfo::required(TypeDescriptor::primitive::<u16>())]
        }

        fn construct(&self, ctx: &mut ResolutionContext<'_>) -> Result<Self::Provides, impl Into<DynError>> {
            ctx.resolve_as::<u16>(&TypeDescriptor::primitive::<u16>())
                .map(|port| Config { port: *port })
        }
    }

    #[test]
    fn instance_factories_resolve_through_the_context() {
        let container = Container::new();
        container.register_factory(TypeDescriptor::class::<Config>(), None, Lifetime::Transient, ConfigFactory);

        assert!(matches!(container.require::<Config>(), Err(ResolveError::TypeMissing { .. })));
        assert!(container.validate().is_err());

        container.register_instance(TypeDescriptor::primitive::<u16>(), None, Instance::new(8080_u16));
        assert_eq!(container.require::<Config>().unwrap().port, 8080);
        assert!(container.validate().is_ok());
        assert_eq!(ConfigFactory.supplies(), TypeInfo::of::<Config>());
    }

    #[test]
    fn closure_factories_declare_their_dependencies() {
        let factory = FnFactory::new(|_| Ok::<u8, DynError>(1))
            .depends_on(DependencyInfo::required(TypeDescriptor::string()).optional());
        assert_eq!(factory.dependencies().len(), 1);
        assert!(factory.dependencies()[0].optional);
    }
}
