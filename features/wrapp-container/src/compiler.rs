//! Turns selection results into reusable build plans.
//!
//! A plan is compiled once per registration and registry generation, and then
//! executed for every resolve of that registration. Each step acts on the
//! current frame of the [ResolutionContext]: building steps only run while no
//! instance exists yet, so an instance supplied up front (override or build-up)
//! suppresses construction and any captured selection failure.

use std::{fmt::Debug, sync::Arc};

use crate::{
    context::ResolutionContext,
    errors::{InvalidRegistration, ResolveError},
    factories::{SharedFactory, SharedGenericFactory},
    lifetime::{self, Lifetime},
    metadata::ConstructorCandidate,
    planner::{plan_parameters, ParameterPlan},
    registry::{ConvertFn, Registration, RegistrationKey, RegistrationSource, Registry},
    selection::{select, SelectionOutcome, SelectionStrategy},
    types::{Adapter, CollectFn, GenericDefinition, Instance, KindTag, TypeDescriptor, TypeInfo, TypeKind},
};

/// A single step of a build plan
#[derive(Clone)]
pub enum BuildStep {
    /// Raise the captured error, unless an instance already exists
    Fail(ResolveError),
    /// Call the constructor with the planned arguments
    Construct {
        constructor: Arc<ConstructorCandidate>,
        parameters: ParameterPlan,
    },
    Supply(Instance),
    Factory(SharedFactory),
    /// Resolve `target` and convert the result
    Map {
        target: TypeDescriptor,
        convert: ConvertFn,
    },
    /// Resolve every registration of `element` into a collection
    Collect {
        element: TypeDescriptor,
        named_only: bool,
        collect: CollectFn,
    },
    Generic {
        factory: SharedGenericFactory,
        descriptor: TypeDescriptor,
    },
    /// Scope the built instance to the current resolve, for per-resolve lifetimes
    InstallPerResolve,
}
impl Debug for BuildStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStep::Fail(err) => f.debug_tuple("Fail").field(err).finish(),
            BuildStep::Construct { constructor, .. } => {
                f.debug_tuple("Construct").field(&constructor.signature()).finish()
            }
            BuildStep::Supply(instance) => f.debug_tuple("Supply").field(instance).finish(),
            BuildStep::Factory(factory) => f.debug_tuple("Factory").field(&factory.supplies()).finish(),
            BuildStep::Map { target, .. } => f.debug_tuple("Map").field(&target.info).finish(),
            BuildStep::Collect {
                element, named_only, ..
            } => f
                .debug_struct("Collect")
                .field("element", &element.info)
                .field("named_only", named_only)
                .finish(),
            BuildStep::Generic { descriptor, .. } => f.debug_tuple("Generic").field(&descriptor.kind).finish(),
            BuildStep::InstallPerResolve => f.write_str("InstallPerResolve"),
        }
    }
}

impl BuildStep {
    fn run(&self, product: TypeInfo, ctx: &mut ResolutionContext<'_>) -> Result<(), ResolveError> {
        if let BuildStep::InstallPerResolve = self {
            lifetime::install_per_resolve(ctx);
            return Ok(());
        }

        if ctx.existing().is_some() {
            return Ok(());
        }

        let instance = match self {
            BuildStep::Fail(err) => return Err(err.clone()),
            BuildStep::Construct {
                constructor,
                parameters,
            } => {
                let values = parameters.evaluate(ctx)?;
                let instance = constructor.invoke(product, values)?;
                tracing::debug!("Constructed instance of {product}");
                instance
            }
            BuildStep::Supply(instance) => instance.clone(),
            BuildStep::Factory(factory) => factory.construct(ctx)?,
            BuildStep::Map { target, convert } => {
                let resolved = ctx.resolve(target)?;
                convert(resolved)?
            }
            BuildStep::Collect {
                element,
                named_only,
                collect,
            } => {
                let names: Vec<Option<String>> = ctx
                    .container()
                    .registrations_of(&element.info)
                    .into_iter()
                    .map(|registration| registration.key.name.clone())
                    .filter(|name| !named_only || name.is_some())
                    .collect();

                let mut items = Vec::with_capacity(names.len());
                for name in names {
                    items.push(ctx.resolve_named(element, name.as_deref())?);
                }
                collect(items)?
            }
            BuildStep::Generic { factory, descriptor } => factory.build(ctx, descriptor)?,
            BuildStep::InstallPerResolve => return Ok(()),
        };

        ctx.set_existing(instance);
        Ok(())
    }
}

/// Compiled, reusable steps that build one registration
#[derive(Clone, Debug)]
pub struct BuildPlan {
    pub product: TypeInfo,
    pub generation: u64,
    /// Shape of the descriptor the plan was compiled from
    pub(crate) kind: KindTag,
    steps: Vec<BuildStep>,
}
impl BuildPlan {
    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }

    /// Runs every step against the current frame of `ctx`
    pub(crate) fn execute(&self, ctx: &mut ResolutionContext<'_>) -> Result<(), ResolveError> {
        for step in &self.steps {
            step.run(self.product, ctx)?;
        }
        Ok(())
    }
}

/// Compiles the constructor stage of a plan
///
/// Selection failures become a step that raises them, only if no instance exists
/// by the time the plan runs.
pub fn compile(type_info: TypeInfo, outcome: SelectionOutcome, lifetime: Lifetime) -> Vec<BuildStep> {
    let (constructor, parameters) = match outcome {
        SelectionOutcome::Constructor(constructor) => {
            let parameters = plan_parameters(&constructor, None);
            (constructor, parameters)
        }
        SelectionOutcome::InjectionMember { constructor, values } => {
            let parameters = plan_parameters(&constructor, Some(&values));
            (constructor, parameters)
        }
        SelectionOutcome::Failure(err) => return vec![BuildStep::Fail(err)],
        SelectionOutcome::NoConstructor => {
            return vec![BuildStep::Fail(ResolveError::NoAccessibleConstructor {
                type_info,
                cause: InvalidRegistration,
            })]
        }
    };

    with_lifetime_overlay(
        vec![BuildStep::Construct {
            constructor,
            parameters,
        }],
        lifetime,
    )
}

fn with_lifetime_overlay(mut steps: Vec<BuildStep>, lifetime: Lifetime) -> Vec<BuildStep> {
    if lifetime == Lifetime::PerResolve {
        steps.push(BuildStep::InstallPerResolve);
    }
    steps
}

/// Compiles the full plan for a key, registered or not
pub(crate) fn compile_plan(
    registry: &Registry,
    key: &RegistrationKey,
    descriptor: &TypeDescriptor,
    registration: Option<&Registration>,
    strategy: SelectionStrategy,
) -> BuildPlan {
    let lifetime = registration.map(Registration::lifetime).unwrap_or_default();
    let construct = || {
        let outcome = select(registry, descriptor, registration, strategy);
        compile(descriptor.info, outcome, lifetime)
    };

    let steps = match registration.map(|r| &r.source) {
        Some(RegistrationSource::Instance(instance)) => vec![BuildStep::Supply(instance.clone())],
        Some(RegistrationSource::Factory(factory)) => {
            with_lifetime_overlay(vec![BuildStep::Factory(factory.clone())], lifetime)
        }
        Some(RegistrationSource::Mapping { target, convert }) => with_lifetime_overlay(
            vec![BuildStep::Map {
                target: target.clone(),
                convert: convert.clone(),
            }],
            lifetime,
        ),
        // Collections and generics are built the same way whether registered or not
        Some(RegistrationSource::Type) | None => match &descriptor.kind {
            TypeKind::Array(shape) => with_lifetime_overlay(
                vec![BuildStep::Collect {
                    element: shape.element.clone(),
                    named_only: true,
                    collect: shape.collect.clone(),
                }],
                lifetime,
            ),
            TypeKind::Generic(shape) => match (&shape.adapter, registry.generic_factory(shape.definition)) {
                (Some(Adapter::Collect(collect)), _) if shape.definition == GenericDefinition::ENUMERABLE => {
                    match shape.arguments.first() {
                        Some(element) => with_lifetime_overlay(
                            vec![BuildStep::Collect {
                                element: element.clone(),
                                named_only: false,
                                collect: collect.clone(),
                            }],
                            lifetime,
                        ),
                        None => vec![missing(key)],
                    }
                }
                (_, Some(factory)) => with_lifetime_overlay(
                    vec![BuildStep::Generic {
                        factory,
                        descriptor: descriptor.clone(),
                    }],
                    lifetime,
                ),
                _ if registration.is_some() => construct(),
                _ => vec![missing(key)],
            },
            _ if registration.is_some() => construct(),
            TypeKind::Class => construct(),
            _ => vec![missing(key)],
        },
    };

    BuildPlan {
        product: descriptor.info,
        generation: registry.generation(),
        kind: descriptor.kind.tag(),
        steps,
    }
}

fn missing(key: &RegistrationKey) -> BuildStep {
    BuildStep::Fail(ResolveError::TypeMissing {
        type_info: key.info,
        name: key.name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ParameterDescriptor, TypeMetadata};

    struct Widget;
    trait Service: Send + Sync {}

    fn widget_ctor() -> Arc<ConstructorCandidate> {
        Arc::new(
            ConstructorCandidate::new(|_| Ok(Widget))
                .param(ParameterDescriptor::new("s", TypeDescriptor::interface::<Arc<dyn Service>>())),
        )
    }

    #[test]
    fn failures_compile_to_a_single_deferred_step() {
        let steps = compile(TypeInfo::of::<Widget>(), SelectionOutcome::NoConstructor, Lifetime::PerResolve);
        assert_eq!(steps.len(), 1);
        assert!(matches!(
            &steps[0],
            BuildStep::Fail(ResolveError::NoAccessibleConstructor { .. })
        ));
    }

    #[test]
    fn per_resolve_appends_the_overlay_step() {
        let steps = compile(
            TypeInfo::of::<Widget>(),
            SelectionOutcome::Constructor(widget_ctor()),
            Lifetime::PerResolve,
        );
        assert!(matches!(steps.as_slice(), [BuildStep::Construct { .. }, BuildStep::InstallPerResolve]));

        let steps = compile(
            TypeInfo::of::<Widget>(),
            SelectionOutcome::Constructor(widget_ctor()),
            Lifetime::Singleton,
        );
        assert!(matches!(steps.as_slice(), [BuildStep::Construct { parameters, .. }] if parameters.len() == 1));
    }

    #[test]
    fn unregistered_keys_compile_by_kind() {
        let mut registry = Registry::new();
        registry.describe(TypeMetadata::of::<Widget>().constructor(ConstructorCandidate::new(|_| Ok(Widget))));

        let plan_for = |descriptor: TypeDescriptor| {
            let key = RegistrationKey::new(descriptor.info, None);
            compile_plan(&registry, &key, &descriptor, None, SelectionStrategy::Smart)
        };

        let class = plan_for(TypeDescriptor::class::<Widget>());
        assert!(matches!(class.steps(), [BuildStep::Construct { .. }]));
        assert_eq!(class.generation, registry.generation());

        let array = plan_for(TypeDescriptor::array::<Widget>(TypeDescriptor::class::<Widget>()));
        assert!(matches!(array.steps(), [BuildStep::Collect { named_only: true, .. }]));

        let all = plan_for(TypeDescriptor::enumerable::<Widget>(TypeDescriptor::class::<Widget>()));
        assert!(matches!(all.steps(), [BuildStep::Collect { named_only: false, .. }]));

        let lazy = plan_for(TypeDescriptor::lazy::<Widget>(TypeDescriptor::class::<Widget>()));
        assert!(matches!(lazy.steps(), [BuildStep::Generic { .. }]));

        let service = plan_for(TypeDescriptor::interface::<Arc<dyn Service>>());
        assert!(matches!(service.steps(), [BuildStep::Fail(ResolveError::TypeMissing { .. })]));
    }
}
