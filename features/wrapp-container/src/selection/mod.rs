//! Picks the constructor the container calls to build a type.
//!
//! Precedence, first match wins:
//! 1. The registration's explicit injection constructor
//! 2. The only eligible constructor
//! 3. The first constructor marked as preferred, in declaration order
//! 4. The configured [SelectionStrategy]
//!
//! Selection never fails by returning an error. Problems are captured in
//! [SelectionOutcome::Failure] and only raised when a plan built from them runs
//! without an instance having been supplied some other way.

use std::{cmp::Ordering, sync::Arc};

use crate::{
    errors::{InvalidRegistration, ResolveError},
    metadata::ConstructorCandidate,
    registry::{InjectionValue, Registration, Registry},
    types::{TypeDescriptor, TypeInfo},
};

pub mod oracle;

pub use oracle::can_resolve;

/// Heuristic used when several constructors are eligible and none is preferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrategy {
    /// Most specific constructor whose parameters can all be satisfied
    #[default]
    Smart,
    /// Longest constructor, two of the same length are ambiguous
    Legacy,
}

/// The result of selecting a constructor
#[derive(Debug, Clone)]
pub enum SelectionOutcome {
    Constructor(Arc<ConstructorCandidate>),
    /// Explicitly configured constructor with its arguments
    InjectionMember {
        constructor: Arc<ConstructorCandidate>,
        values: Vec<InjectionValue>,
    },
    /// Deferred until a plan built from it runs
    Failure(ResolveError),
    NoConstructor,
}

/// Selects the constructor to build `descriptor` with
pub fn select(
    registry: &Registry,
    descriptor: &TypeDescriptor,
    registration: Option<&Registration>,
    strategy: SelectionStrategy,
) -> SelectionOutcome {
    let metadata = registry.metadata(descriptor.info.type_id);
    let candidates = metadata
        .as_ref()
        .map(|meta| meta.eligible_constructors())
        .unwrap_or_default();

    // Explicit configuration always wins
    if let Some(injection) = registration.and_then(Registration::explicit_constructor) {
        let signature = injection.signature();
        return match candidates.iter().find(|c| c.signature() == signature) {
            Some(constructor) => SelectionOutcome::InjectionMember {
                constructor: constructor.clone(),
                values: injection.values.clone(),
            },
            None => SelectionOutcome::Failure(ResolveError::InjectionConstructorMismatch {
                type_info: descriptor.info,
                signature: signature.iter().map(|info| info.type_name).collect(),
                cause: InvalidRegistration,
            }),
        };
    }

    match candidates.as_slice() {
        [] => return SelectionOutcome::NoConstructor,
        [only] => return SelectionOutcome::Constructor(only.clone()),
        _ => {}
    }

    if let Some(preferred) = candidates.iter().find(|c| c.preferred) {
        return SelectionOutcome::Constructor(preferred.clone());
    }

    match strategy {
        SelectionStrategy::Smart => smart_select(registry, descriptor.info, candidates),
        SelectionStrategy::Legacy => legacy_select(descriptor.info, candidates),
    }
}

/// Longest first, ties broken by the number of interface parameters
fn by_specificity(a: &Arc<ConstructorCandidate>, b: &Arc<ConstructorCandidate>) -> Ordering {
    b.parameters
        .len()
        .cmp(&a.parameters.len())
        .then_with(|| b.interface_count().cmp(&a.interface_count()))
}

fn smart_select(
    registry: &Registry,
    type_info: TypeInfo,
    mut candidates: Vec<Arc<ConstructorCandidate>>,
) -> SelectionOutcome {
    candidates.sort_by(by_specificity);

    let satisfiable = candidates.iter().find(|candidate| {
        candidate
            .parameters
            .iter()
            .all(|p| p.has_default() || can_resolve(registry, &p.ty))
    });

    match satisfiable {
        Some(constructor) => {
            tracing::debug!(
                "Selected constructor of {type_info} with {} parameters",
                constructor.parameters.len()
            );
            SelectionOutcome::Constructor(constructor.clone())
        }
        None => {
            tracing::warn!("No constructor of {type_info} can be satisfied");
            SelectionOutcome::Failure(ResolveError::NoSatisfiableConstructor {
                type_info,
                attempted: candidates.len(),
                cause: InvalidRegistration,
            })
        }
    }
}

// Longest first, two of the same length are ambiguous
fn legacy_select(type_info: TypeInfo, mut candidates: Vec<Arc<ConstructorCandidate>>) -> SelectionOutcome {
    candidates.sort_by(|a, b| b.parameters.len().cmp(&a.parameters.len()));

    match candidates.as_slice() {
        [] => SelectionOutcome::NoConstructor,
        [only] => SelectionOutcome::Constructor(only.clone()),
        [first, second, ..] => {
            let length = first.parameters.len();
            if second.parameters.len() == length {
                tracing::warn!("{type_info} has multiple constructors of length {length}");
                return SelectionOutcome::Failure(ResolveError::AmbiguousConstructor {
                    type_info,
                    length,
                    cause: InvalidRegistration,
                });
            }
            SelectionOutcome::Constructor(first.clone())
        }
    }
}
