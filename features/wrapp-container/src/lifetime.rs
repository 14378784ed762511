use std::sync::OnceLock;

use crate::{context::ResolutionContext, types::Instance};

/// How long a resolved instance is reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifetime {
    /// A new instance on every resolve
    #[default]
    Transient,
    /// One instance for the lifetime of the container
    Singleton,
    /// One instance per top-level resolve call, shared across its dependency tree
    PerResolve,
}

/// Storage owned by a registration
#[derive(Debug)]
pub(crate) enum LifetimeManager {
    Transient,
    Singleton(OnceLock<Instance>),
    PerResolve,
}
impl LifetimeManager {
    pub(crate) fn new(lifetime: Lifetime) -> Self {
        match lifetime {
            Lifetime::Transient => LifetimeManager::Transient,
            Lifetime::Singleton => LifetimeManager::Singleton(OnceLock::new()),
            Lifetime::PerResolve => LifetimeManager::PerResolve,
        }
    }

    pub(crate) fn lifetime(&self) -> Lifetime {
        match self {
            LifetimeManager::Transient => Lifetime::Transient,
            LifetimeManager::Singleton(_) => Lifetime::Singleton,
            LifetimeManager::PerResolve => Lifetime::PerResolve,
        }
    }

    /// The stored instance, if this manager keeps one
    pub(crate) fn get(&self) -> Option<Instance> {
        match self {
            LifetimeManager::Singleton(slot) => slot.get().cloned(),
            _ => None,
        }
    }

    /// Stores a freshly built instance and returns the one every caller must observe
    ///
    /// Two threads may both build on first use, the first stored instance wins.
    pub(crate) fn store(&self, instance: Instance) -> Instance {
        match self {
            LifetimeManager::Singleton(slot) => slot.get_or_init(|| instance).clone(),
            _ => instance,
        }
    }
}

/// The lifetime policy visible through the resolution context while a type is built
#[derive(Debug, Clone)]
pub enum ActiveLifetime {
    Transient,
    Singleton,
    PerResolve,
    /// Installed after a per-resolve type was built, bound to that instance
    PerResolveInstance(Instance),
}
impl From<Lifetime> for ActiveLifetime {
    fn from(lifetime: Lifetime) -> Self {
        match lifetime {
            Lifetime::Transient => ActiveLifetime::Transient,
            Lifetime::Singleton => ActiveLifetime::Singleton,
            Lifetime::PerResolve => ActiveLifetime::PerResolve,
        }
    }
}

/// Swaps a per-resolve lifetime for one bound to the instance just built
///
/// Re-entrant resolves of the same key within the same context observe that
/// instance instead of building a second one. Returns true if an overlay was installed.
pub(crate) fn install_per_resolve(ctx: &mut ResolutionContext<'_>) -> bool {
    if !matches!(ctx.lifetime(), ActiveLifetime::PerResolve) {
        return false;
    }

    let Some(existing) = ctx.existing().cloned() else {
        return false;
    };

    tracing::trace!("Scoping {:?} to the current resolve", ctx.type_info());
    ctx.set_lifetime(ActiveLifetime::PerResolveInstance(existing.clone()));
    ctx.install_scoped(existing);
    true
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use super::*;

    #[test]
    fn singleton_keeps_first_stored_instance() {
        let manager = LifetimeManager::new(Lifetime::Singleton);
        assert!(manager.get().is_none());

        let first = manager.store(Instance::new(1_u8));
        let second = manager.store(Instance::new(2_u8));

        assert!(first.same_as(&second));
        assert_eq!(*second.downcast::<u8>().unwrap(), 1);
        assert!(manager.get().unwrap().same_as(&first));
    }

    #[test]
    fn transient_never_stores() {
        let manager = LifetimeManager::new(Lifetime::Transient);
        manager.store(Instance::new(1_u8));
        assert!(manager.get().is_none());
        assert_eq!(manager.lifetime(), Lifetime::Transient);
    }

    #[test]
    fn concurrent_first_use_has_one_winner() {
        let manager = LifetimeManager::new(Lifetime::Singleton);
        let barrier = Barrier::new(8);

        let observed: Vec<Instance> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8_u32)
                .map(|i| {
                    let manager = &manager;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        manager.store(Instance::new(i))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winner = manager.get().unwrap();
        assert!(observed.iter().all(|i| i.same_as(&winner)));
    }
}
