use std::{any::TypeId, collections::HashMap, sync::Arc};

use crate::{
    container::Container,
    errors::ResolveError,
    lifetime::ActiveLifetime,
    registry::RegistrationKey,
    types::{Injectable, Instance, TypeDescriptor, TypeInfo},
};

/// Instances supplied by the caller of a resolve, used instead of building the type
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    dependencies: HashMap<TypeId, Instance>,
}
impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `value` wherever a `T` is needed during the resolve
    pub fn dependency<T: Injectable>(self, value: T) -> Self {
        self.dependency_instance(Instance::new(value))
    }

    pub fn dependency_instance(mut self, instance: Instance) -> Self {
        self.dependencies.insert(instance.info.type_id, instance);
        self
    }

    pub fn get(&self, info: &TypeInfo) -> Option<Instance> {
        self.dependencies.get(&info.type_id).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// State of the type currently being built
#[derive(Debug)]
pub(crate) struct Frame {
    pub key: RegistrationKey,
    pub existing: Option<Instance>,
    pub lifetime: ActiveLifetime,
}

/// Per-resolve state, threaded through every step of one top-level resolve
///
/// Never shared between top-level calls. Instances scoped to the resolve live
/// here, keyed by registration, and are dropped with the context.
pub struct ResolutionContext<'c> {
    container: &'c Container,
    /// Types being built, outermost first
    frames: Vec<Frame>,
    scoped: HashMap<RegistrationKey, Instance>,
    overrides: Overrides,
}

impl<'c> ResolutionContext<'c> {
    pub(crate) fn new(container: &'c Container, overrides: Overrides) -> Self {
        ResolutionContext {
            container,
            frames: Vec::new(),
            scoped: HashMap::new(),
            overrides,
        }
    }

    pub fn container(&self) -> &'c Container {
        self.container
    }

    /// Resolves a dependency within this context, sharing its per-resolve scope
    pub fn resolve(&mut self, descriptor: &TypeDescriptor) -> Result<Instance, ResolveError> {
        self.resolve_named(descriptor, None)
    }

    pub fn resolve_named(
        &mut self,
        descriptor: &TypeDescriptor,
        name: Option<&str>,
    ) -> Result<Instance, ResolveError> {
        let container = self.container;
        container.resolve_in(self, descriptor, name)
    }

    pub fn resolve_as<T: Injectable>(&mut self, descriptor: &TypeDescriptor) -> Result<Arc<T>, ResolveError> {
        self.resolve(descriptor)?.downcast()
    }

    /// The type currently being built
    pub fn type_info(&self) -> Option<TypeInfo> {
        self.frames.last().map(|frame| frame.key.info)
    }

    /// The registration name of the type currently being built
    pub fn name(&self) -> Option<&str> {
        self.frames.last().and_then(|frame| frame.key.name.as_deref())
    }

    /// The instance built so far, if any
    pub fn existing(&self) -> Option<&Instance> {
        self.frames.last().and_then(|frame| frame.existing.as_ref())
    }

    pub fn set_existing(&mut self, instance: Instance) {
        if let Some(frame) = self.frames.last_mut() {
            frame.existing = Some(instance);
        }
    }

    /// The lifetime policy of the type currently being built
    pub fn lifetime(&self) -> ActiveLifetime {
        self.frames
            .last()
            .map(|frame| frame.lifetime.clone())
            .unwrap_or(ActiveLifetime::Transient)
    }

    pub(crate) fn set_lifetime(&mut self, lifetime: ActiveLifetime) {
        if let Some(frame) = self.frames.last_mut() {
            frame.lifetime = lifetime;
        }
    }

    /// Scopes `instance` to this resolve under the key currently being built
    pub(crate) fn install_scoped(&mut self, instance: Instance) {
        if let Some(frame) = self.frames.last() {
            self.scoped.insert(frame.key.clone(), instance);
        }
    }

    pub(crate) fn scoped(&self, key: &RegistrationKey) -> Option<Instance> {
        self.scoped.get(key).cloned()
    }

    pub(crate) fn dependency_override(&self, info: &TypeInfo) -> Option<Instance> {
        self.overrides.get(info)
    }

    /// Number of types currently being built
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Starts building `frame.key`, failing if it is already being built further up
    pub(crate) fn enter(&mut self, frame: Frame) -> Result<(), ResolveError> {
        if self.frames.iter().any(|f| f.key == frame.key) {
            let mut chain: Vec<TypeInfo> = self.frames.iter().map(|f| f.key.info).collect();
            chain.push(frame.key.info);
            return Err(ResolveError::CircularDependency {
                type_info: frame.key.info,
                chain,
            });
        }

        self.frames.push(frame);
        Ok(())
    }

    pub(crate) fn leave(&mut self) -> Option<Frame> {
        self.frames.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifetime::Lifetime;

    fn frame<T: Injectable>(name: Option<&str>) -> Frame {
        Frame {
            key: RegistrationKey::new(TypeInfo::of::<T>(), name),
            existing: None,
            lifetime: Lifetime::Transient.into(),
        }
    }

    #[test]
    fn overrides_are_keyed_by_type() {
        let overrides = Overrides::new().dependency(5_u32).dependency("x".to_string());
        assert!(!overrides.is_empty());
        assert_eq!(*overrides.get(&TypeInfo::of::<u32>()).unwrap().downcast::<u32>().unwrap(), 5);
        assert!(overrides.get(&TypeInfo::of::<u64>()).is_none());
    }

    #[test]
    fn reentering_a_key_is_a_cycle() {
        let container = Container::new();
        let mut ctx = ResolutionContext::new(&container, Overrides::default());

        ctx.enter(frame::<u32>(None)).unwrap();
        ctx.enter(frame::<String>(None)).unwrap();
        // Same type under another name is a different registration
        ctx.enter(frame::<u32>(Some("other"))).unwrap();
        assert_eq!(ctx.depth(), 3);

        match ctx.enter(frame::<u32>(None)) {
            Err(ResolveError::CircularDependency { chain, .. }) => assert_eq!(chain.len(), 4),
            other => panic!("unexpected {other:?}"),
        }

        ctx.leave();
        assert_eq!(ctx.name(), None);
        assert_eq!(ctx.type_info(), Some(TypeInfo::of::<String>()));
    }

    #[test]
    fn existing_and_scoped_instances_follow_the_current_frame() {
        let container = Container::new();
        let mut ctx = ResolutionContext::new(&container, Overrides::default());
        assert!(ctx.existing().is_none());

        ctx.enter(frame::<u32>(None)).unwrap();
        ctx.set_existing(Instance::new(1_u32));
        ctx.install_scoped(Instance::new(2_u32));

        assert!(ctx.existing().is_some());
        let key = RegistrationKey::new(TypeInfo::of::<u32>(), None);
        assert_eq!(*ctx.scoped(&key).unwrap().downcast::<u32>().unwrap(), 2);
    }
}
