use std::{
    any::TypeId,
    collections::HashMap,
    fmt::Debug,
    sync::Arc,
};

use crate::{
    errors::ResolveError,
    factories::{SharedFactory, SharedGenericFactory},
    lifetime::{Lifetime, LifetimeManager},
    metadata::TypeMetadata,
    resolver::lazy::LazyResolver,
    types::{GenericDefinition, Instance, TypeDescriptor, TypeInfo},
};

/// A registered type under an optional name
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct RegistrationKey {
    pub info: TypeInfo,
    pub name: Option<String>,
}
impl RegistrationKey {
    pub fn new(info: TypeInfo, name: Option<&str>) -> Self {
        RegistrationKey {
            info,
            name: name.map(str::to_owned),
        }
    }
}
impl std::fmt::Display for RegistrationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({name})", self.info),
            None => write!(f, "{}", self.info),
        }
    }
}

pub(crate) type ConvertFn = Arc<dyn Fn(Instance) -> Result<Instance, ResolveError> + Send + Sync>;

/// Where instances of a registration come from
#[derive(Clone)]
pub enum RegistrationSource {
    /// Built through the registered type's own constructors
    Type,
    /// Always the given instance
    Instance(Instance),
    Factory(SharedFactory),
    /// Resolve `target` and convert it, e.g. into a trait object
    Mapping {
        target: TypeDescriptor,
        convert: ConvertFn,
    },
}
impl Debug for RegistrationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationSource::Type => f.write_str("Type"),
            RegistrationSource::Instance(instance) => f.debug_tuple("Instance").field(instance).finish(),
            RegistrationSource::Factory(factory) => f.debug_tuple("Factory").field(&factory.supplies()).finish(),
            RegistrationSource::Mapping { target, .. } => f.debug_tuple("Mapping").field(&target.info).finish(),
        }
    }
}

/// An explicitly configured argument of an injection constructor
#[derive(Clone, Debug)]
pub enum InjectionValue {
    /// Pass this instance
    Value(Instance),
    /// Resolve this type, optionally by name
    Resolve {
        ty: TypeDescriptor,
        name: Option<String>,
    },
}
impl InjectionValue {
    pub fn value<T: crate::types::Injectable>(value: T) -> Self {
        InjectionValue::Value(Instance::new(value))
    }

    pub fn resolve(ty: TypeDescriptor) -> Self {
        InjectionValue::Resolve { ty, name: None }
    }

    pub fn resolve_named(ty: TypeDescriptor, name: impl Into<String>) -> Self {
        InjectionValue::Resolve {
            ty,
            name: Some(name.into()),
        }
    }

    pub fn type_info(&self) -> TypeInfo {
        match self {
            InjectionValue::Value(instance) => instance.info,
            InjectionValue::Resolve { ty, .. } => ty.info,
        }
    }
}

/// Selects a constructor by the types of its explicit arguments
#[derive(Clone, Debug, Default)]
pub struct InjectionConstructor {
    pub values: Vec<InjectionValue>,
}
impl InjectionConstructor {
    pub fn new(values: Vec<InjectionValue>) -> Self {
        InjectionConstructor { values }
    }

    pub fn signature(&self) -> Vec<TypeInfo> {
        self.values.iter().map(InjectionValue::type_info).collect()
    }
}

#[derive(Debug)]
pub struct Registration {
    pub key: RegistrationKey,
    pub descriptor: TypeDescriptor,
    pub source: RegistrationSource,
    pub injection_constructor: Option<InjectionConstructor>,
    pub(crate) manager: LifetimeManager,
}
impl Registration {
    pub fn new(
        descriptor: TypeDescriptor,
        name: Option<&str>,
        source: RegistrationSource,
        lifetime: Lifetime,
    ) -> Self {
        Registration {
            key: RegistrationKey::new(descriptor.info, name),
            descriptor,
            source,
            injection_constructor: None,
            manager: LifetimeManager::new(lifetime),
        }
    }

    pub fn with_injection_constructor(mut self, constructor: InjectionConstructor) -> Self {
        self.injection_constructor = Some(constructor);
        self
    }

    /// The configured constructor override, which beats any selection heuristic
    pub fn explicit_constructor(&self) -> Option<&InjectionConstructor> {
        self.injection_constructor.as_ref()
    }

    /// The lifetime instances of this registration live for
    pub fn lifetime(&self) -> Lifetime {
        self.manager.lifetime()
    }
}

/// All registrations and type descriptions known to a container
///
/// Every mutation bumps the generation, compiled plans of older generations are stale.
pub struct Registry {
    metadata: HashMap<TypeId, Arc<TypeMetadata>>,
    registrations: HashMap<RegistrationKey, Arc<Registration>>,
    /// Registration order, for enumerating all registrations of a type
    order: Vec<RegistrationKey>,
    generic_factories: HashMap<GenericDefinition, SharedGenericFactory>,
    generation: u64,
}
impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry, with the built-in `Lazy<T>` factory
    pub fn new() -> Self {
        let mut registry = Registry {
            metadata: HashMap::new(),
            registrations: HashMap::new(),
            order: Vec::new(),
            generic_factories: HashMap::new(),
            generation: 0,
        };
        registry.register_generic(GenericDefinition::LAZY, Arc::new(LazyResolver));
        registry
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn describe(&mut self, metadata: TypeMetadata) {
        self.metadata.insert(metadata.info.type_id, Arc::new(metadata));
        self.generation += 1;
    }

    pub fn register(&mut self, registration: Registration) {
        let key = registration.key.clone();
        tracing::debug!("Registering {key} as {:?} ({:?})", registration.source, registration.lifetime());

        if self.registrations.insert(key.clone(), Arc::new(registration)).is_none() {
            self.order.push(key);
        }
        self.generation += 1;
    }

    pub fn register_generic(&mut self, definition: GenericDefinition, factory: SharedGenericFactory) {
        self.generic_factories.insert(definition, factory);
        self.generation += 1;
    }

    pub fn find(&self, key: &RegistrationKey) -> Option<Arc<Registration>> {
        self.registrations.get(key).cloned()
    }

    pub fn metadata(&self, type_id: TypeId) -> Option<Arc<TypeMetadata>> {
        self.metadata.get(&type_id).cloned()
    }

    pub fn generic_factory(&self, definition: GenericDefinition) -> Option<SharedGenericFactory> {
        self.generic_factories.get(&definition).cloned()
    }

    /// Is the type registered under any name
    pub fn is_registered(&self, info: &TypeInfo) -> bool {
        self.order.iter().any(|key| key.info == *info)
    }

    pub fn is_generic_registered(&self, definition: GenericDefinition) -> bool {
        self.generic_factories.contains_key(&definition)
    }

    /// All registrations of a type, the unnamed one first, then named ones in registration order
    pub fn registrations_of(&self, info: &TypeInfo) -> Vec<Arc<Registration>> {
        let default = self.find(&RegistrationKey::new(*info, None));
        let named = self
            .order
            .iter()
            .filter(|key| key.info == *info && key.name.is_some())
            .filter_map(|key| self.registrations.get(key).cloned());

        default.into_iter().chain(named).collect()
    }

    pub fn registrations(&self) -> impl Iterator<Item = &Arc<Registration>> {
        self.order.iter().filter_map(|key| self.registrations.get(key))
    }

    pub fn described_types(&self) -> impl Iterator<Item = &Arc<TypeMetadata>> {
        self.metadata.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance_registration(name: Option<&str>, value: u32) -> Registration {
        Registration::new(
            TypeDescriptor::primitive::<u32>(),
            name,
            RegistrationSource::Instance(Instance::new(value)),
            Lifetime::Transient,
        )
    }

    #[test]
    fn every_change_bumps_the_generation() {
        let mut registry = Registry::new();
        let start = registry.generation();

        registry.register(instance_registration(None, 1));
        registry.describe(TypeMetadata::of::<String>());
        registry.register_generic(GenericDefinition("Repo"), Arc::new(LazyResolver));

        assert_eq!(registry.generation(), start + 3);
    }

    #[test]
    fn lazy_is_registered_out_of_the_box() {
        let registry = Registry::new();
        assert!(registry.is_generic_registered(GenericDefinition::LAZY));
        assert!(!registry.is_generic_registered(GenericDefinition::ENUMERABLE));
    }

    #[test]
    fn registrations_of_lists_default_first() {
        let mut registry = Registry::new();
        registry.register(instance_registration(Some("b"), 2));
        registry.register(instance_registration(None, 1));
        registry.register(instance_registration(Some("c"), 3));
        // Replacing keeps the first registration position
        registry.register(instance_registration(Some("b"), 4));

        let names: Vec<_> = registry
            .registrations_of(&TypeInfo::of::<u32>())
            .iter()
            .map(|r| r.key.name.clone())
            .collect();

        assert_eq!(names, vec![None, Some("b".to_string()), Some("c".to_string())]);
        assert!(registry.is_registered(&TypeInfo::of::<u32>()));
        assert!(!registry.is_registered(&TypeInfo::of::<u64>()));
    }
}
