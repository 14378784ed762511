use crate::{
    container::Container,
    lifetime::Lifetime,
    metadata::TypeMetadata,
    registry::{Registration, RegistrationSource, Registry},
    selection::SelectionStrategy,
    types::{Instance, TypeDescriptor},
};

/// Configuration of a [Container], fixed once it is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerOptions {
    /// Heuristic when several constructors are eligible and none is preferred
    pub selection: SelectionStrategy,
    /// Reuse compiled build plans until the registrations change
    pub cache_plans: bool,
}
impl Default for ContainerOptions {
    fn default() -> Self {
        ContainerOptions {
            selection: SelectionStrategy::Smart,
            cache_plans: true,
        }
    }
}

/// Collects options and initial registrations, then builds the [Container]
///
/// The container stays open for registrations after it is built, the builder
/// only exists to configure it up front.
pub struct ContainerBuilder {
    registry: Registry,
    options: ContainerOptions,
}
impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        ContainerBuilder {
            registry: Registry::new(),
            options: ContainerOptions::default(),
        }
    }
}
impl ContainerBuilder {
    pub fn options(mut self, options: ContainerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn selection(mut self, selection: SelectionStrategy) -> Self {
        self.options.selection = selection;
        self
    }

    pub fn cache_plans(mut self, cache_plans: bool) -> Self {
        self.options.cache_plans = cache_plans;
        self
    }

    pub fn describe(mut self, metadata: TypeMetadata) -> Self {
        self.registry.describe(metadata);
        self
    }

    pub fn register(mut self, registration: Registration) -> Self {
        self.registry.register(registration);
        self
    }

    pub fn register_type(self, descriptor: TypeDescriptor, name: Option<&str>, lifetime: Lifetime) -> Self {
        self.register(Registration::new(descriptor, name, RegistrationSource::Type, lifetime))
    }

    pub fn add_instance(self, descriptor: TypeDescriptor, instance: Instance) -> Self {
        self.register(Registration::new(
            descriptor,
            None,
            RegistrationSource::Instance(instance),
            Lifetime::Transient,
        ))
    }

    pub fn build(self) -> Container {
        tracing::debug!(
            "Building container with {} registrations ({:?})",
            self.registry.registrations().count(),
            self.options
        );
        Container::from_parts(self.registry, self.options)
    }
}
