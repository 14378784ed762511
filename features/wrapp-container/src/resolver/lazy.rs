use std::{
    fmt::Debug,
    sync::{Arc, OnceLock},
    thread::ThreadId,
};

use parking_lot::Mutex;

use crate::{
    container::Container,
    context::ResolutionContext,
    errors::ResolveError,
    factories::GenericFactory,
    lifetime,
    types::{Adapter, Injectable, Instance, TypeDescriptor, TypeKind},
};

/// Lazily resolved dependency
///
/// Nothing is resolved until the first [Lazy::get]. That first access resolves
/// the target through the container it was created by, later accesses and all
/// clones observe the same result, including a failure.
///
/// Registrations added after the `Lazy` was created are visible to its first access.
pub struct Lazy<T: Injectable>(Arc<LazyInner<T>>);
struct LazyInner<T: Injectable> {
    container: Container,
    target: TypeDescriptor,
    name: Option<String>,
    once: OnceLock<Result<Arc<T>, ResolveError>>,
    /// Thread currently running the first resolve
    resolving: Mutex<Option<ThreadId>>,
    /// Returned to re-entrant accesses during the first resolve
    reentered: OnceLock<ResolveError>,
}
impl<T: Injectable> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Lazy(self.0.clone())
    }
}
impl<T: Injectable + Debug> Debug for Lazy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.once.get() {
            Some(result) => f.debug_tuple("Lazy").field(result).finish(),
            None => f.debug_tuple("Lazy").field(&"<not resolved>").finish(),
        }
    }
}

impl<T: Injectable> Lazy<T> {
    pub(crate) fn new(container: Container, target: TypeDescriptor, name: Option<String>) -> Self {
        Lazy(Arc::new(LazyInner {
            container,
            target,
            name,
            once: OnceLock::new(),
            resolving: Mutex::new(None),
            reentered: OnceLock::new(),
        }))
    }

    /// Accesses the lazy dependency, resolving it on first use
    ///
    /// The first access resolves in a fresh top-level resolve, so it does not
    /// share per-resolve instances with the resolve that created the `Lazy`.
    /// Accessing the same `Lazy` again while its first resolve is still running
    /// on this thread, e.g. from the constructor of its own target, returns
    /// [ResolveError::CircularDependency]. Other threads wait for the result.
    pub fn get(&self) -> Result<&Arc<T>, &ResolveError> {
        if let Some(result) = self.0.once.get() {
            return result.as_ref();
        }

        let current = std::thread::current().id();
        if *self.0.resolving.lock() == Some(current) {
            let info = self.0.target.info;
            return Err(self.0.reentered.get_or_init(|| ResolveError::CircularDependency {
                type_info: info,
                chain: vec![info, info],
            }));
        }

        self.0
            .once
            .get_or_init(|| {
                tracing::debug!("Resolving lazy {}", self.0.target.info);
                *self.0.resolving.lock() = Some(current);
                let result = self
                    .0
                    .container
                    .resolve_named(&self.0.target, self.0.name.as_deref())
                    .and_then(|instance| instance.downcast::<T>());
                *self.0.resolving.lock() = None;
                result
            })
            .as_ref()
    }

    /// Like [Lazy::get], with an owned error
    pub fn try_get(&self) -> Result<Arc<T>, ResolveError> {
        self.get().cloned().map_err(Clone::clone)
    }

    /// Has the dependency been resolved yet
    pub fn is_forced(&self) -> bool {
        self.0.once.get().is_some()
    }
}

/// Builds every `Lazy<T>`, registered for [crate::types::GenericDefinition::LAZY] by default
pub struct LazyResolver;
impl GenericFactory for LazyResolver {
    fn build(&self, ctx: &mut ResolutionContext<'_>, descriptor: &TypeDescriptor) -> Result<Instance, ResolveError> {
        let defer = match &descriptor.kind {
            TypeKind::Generic(shape) => match &shape.adapter {
                Some(Adapter::Defer(defer)) => Some(defer.clone()),
                _ => None,
            },
            _ => None,
        };

        let Some(defer) = defer else {
            return Err(ResolveError::TypeMissing {
                type_info: descriptor.info,
                name: ctx.name().map(str::to_owned),
            });
        };

        let lazy = defer(ctx.container().clone(), ctx.name().map(str::to_owned));

        // A per-resolve Lazy is shared by every consumer within this resolve
        ctx.set_existing(lazy.clone());
        lifetime::install_per_resolve(ctx);
        Ok(lazy)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        lifetime::Lifetime,
        types::{GenericDefinition, TypeInfo},
    };

    struct Engine(usize);

    #[test]
    fn resolves_exactly_once() {
        let container = Container::new();
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        container.register_fn(TypeDescriptor::class::<Engine>(), None, Lifetime::Transient, move |_| {
            Ok(Engine(counter.fetch_add(1, Ordering::SeqCst)))
        });

        let lazy: Lazy<Engine> = Lazy::new(container.clone(), TypeDescriptor::class::<Engine>(), None);
        let clone = lazy.clone();
        assert!(!lazy.is_forced());
        assert_eq!(built.load(Ordering::SeqCst), 0);

        let first = lazy.get().unwrap().clone();
        let second = clone.get().unwrap().clone();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(clone.is_forced());
    }

    #[test]
    fn observes_later_registrations() {
        let container = Container::new();
        let lazy: Lazy<Engine> = Lazy::new(container.clone(), TypeDescriptor::class::<Engine>(), None);

        container.register_instance(TypeDescriptor::class::<Engine>(), None, Instance::new(Engine(7)));
        assert_eq!(lazy.get().unwrap().0, 7);
    }

    #[test]
    fn failures_are_kept() {
        let container = Container::new();
        let lazy: Lazy<u32> = Lazy::new(container.clone(), TypeDescriptor::primitive::<u32>(), None);
        assert!(matches!(lazy.try_get(), Err(ResolveError::TypeMissing { .. })));

        // Registering afterwards does not change a forced result
        container.register_instance(TypeDescriptor::primitive::<u32>(), None, Instance::new(1_u32));
        assert!(lazy.get().is_err());
    }

    #[test]
    fn rejects_descriptors_without_adapter() {
        let container = Container::new();
        let descriptor = TypeDescriptor::generic::<Lazy<u32>>(GenericDefinition::LAZY, Vec::new());
        assert!(matches!(
            container.resolve(&descriptor),
            Err(ResolveError::TypeMissing { .. })
        ));
    }

    #[test]
    fn reentrant_access_is_a_cycle() {
        let container = Container::new();
        let lazy_engine = TypeDescriptor::lazy::<Engine>(TypeDescriptor::class::<Engine>());
        container.register_type(lazy_engine.clone(), None, Lifetime::Singleton);

        let inner = lazy_engine.clone();
        container.register_fn(TypeDescriptor::class::<Engine>(), None, Lifetime::Transient, move |ctx| {
            // Forces the Lazy that is currently resolving this very Engine
            let lazy = ctx.resolve_as::<Lazy<Engine>>(&inner)?;
            let engine = lazy.try_get()?;
            Ok(Engine(engine.0))
        });

        let lazy = container.resolve_as::<Lazy<Engine>>(&lazy_engine).unwrap();
        assert!(matches!(
            lazy.get(),
            Err(ResolveError::CircularDependency { type_info, .. }) if *type_info == TypeInfo::of::<Engine>()
        ));
    }

    #[test]
    fn per_resolve_wrappers_are_shared_within_a_resolve() {
        let container = Container::new();
        let lazy_engine = TypeDescriptor::lazy::<Engine>(TypeDescriptor::class::<Engine>());
        container.register_type(lazy_engine.clone(), None, Lifetime::PerResolve);
        container.register_instance(TypeDescriptor::class::<Engine>(), None, Instance::new(Engine(3)));

        let mut ctx = ResolutionContext::new(&container, Default::default());
        let first = ctx.resolve_as::<Lazy<Engine>>(&lazy_engine).unwrap();
        let second = ctx.resolve_as::<Lazy<Engine>>(&lazy_engine).unwrap();
        assert!(Arc::ptr_eq(&first.0, &second.0));

        let other = container.resolve_as::<Lazy<Engine>>(&lazy_engine).unwrap();
        assert!(!Arc::ptr_eq(&first.0, &other.0));
    }
}
