use std::sync::Arc;

use thiserror::Error;

use crate::{
    dependency_graph::DependencyGraphErrors,
    types::{DynError, TypeInfo},
};

/// Marker cause attached to every error caused by how a type was registered or described
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("The type registration is invalid")]
pub struct InvalidRegistration;

/// Errors while resolving a type
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// The legacy selector found two constructors with the same, highest parameter count
    #[error("The type {type_info} has multiple constructors of length {length}. Unable to disambiguate.")]
    AmbiguousConstructor {
        type_info: TypeInfo,
        length: usize,
        #[source]
        cause: InvalidRegistration,
    },
    /// No candidate had every parameter resolvable or defaulted
    #[error("Failed to select a constructor for {type_info}, none of the {attempted} constructors could be satisfied")]
    NoSatisfiableConstructor {
        type_info: TypeInfo,
        attempted: usize,
        #[source]
        cause: InvalidRegistration,
    },
    /// The type declares no eligible constructor
    #[error("No public constructor is available for type {type_info}.")]
    NoAccessibleConstructor {
        type_info: TypeInfo,
        #[source]
        cause: InvalidRegistration,
    },
    /// The registered injection constructor does not match any declared constructor
    #[error("No constructor of {type_info} matches the injection signature {signature:?}")]
    InjectionConstructorMismatch {
        type_info: TypeInfo,
        signature: Vec<&'static str>,
        #[source]
        cause: InvalidRegistration,
    },
    /// The type is neither registered nor automatically constructible
    #[error("The requested type '{type_info}' (name: {name:?}) is not registered and cannot be constructed.")]
    TypeMissing {
        type_info: TypeInfo,
        name: Option<String>,
    },
    /// The type depends on itself through the chain
    #[error("A Circular Dependency exists while resolving '{type_info}' through {chain:?} - Consider using `Lazy`")]
    CircularDependency {
        type_info: TypeInfo,
        chain: Vec<TypeInfo>,
    },
    /// A constructor or factory returned an error
    #[error("Factory for '{product}' failed - error: {error:?}")]
    FactoryFailed {
        product: TypeInfo,
        error: Arc<DynError>,
    },
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
    /// A constructor asked for more arguments than were planned
    #[error("Constructor of '{product}' requested argument {index} but only {available} were supplied")]
    ArgumentMissing {
        product: TypeInfo,
        index: usize,
        available: usize,
    },
}

impl ResolveError {
    pub(crate) fn factory_failed(product: TypeInfo, error: DynError) -> Self {
        // Keep nested resolve failures as they are, callers should see the root cause
        match error.downcast::<ResolveError>() {
            Ok(inner) => *inner,
            Err(error) => ResolveError::FactoryFailed {
                product,
                error: Arc::new(error),
            },
        }
    }

    /// True if the failure stems from an invalid registration
    pub fn is_invalid_registration(&self) -> bool {
        matches!(
            self,
            ResolveError::AmbiguousConstructor { .. }
                | ResolveError::NoSatisfiableConstructor { .. }
                | ResolveError::NoAccessibleConstructor { .. }
                | ResolveError::InjectionConstructorMismatch { .. }
        )
    }
}

/// Errors while validating the registrations as a whole
#[derive(Error, Debug, Clone)]
pub enum ValidateError {
    /// There are issues with the dependency graph
    #[error(transparent)]
    DependencyGraphError(#[from] DependencyGraphErrors),
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn selection_errors_chain_to_invalid_registration() {
        let err = ResolveError::NoSatisfiableConstructor {
            type_info: TypeInfo::of::<String>(),
            attempted: 2,
            cause: InvalidRegistration,
        };

        assert!(err.is_invalid_registration());
        assert!(err.to_string().contains("alloc::string::String"));
        let source = err.source().expect("has a cause");
        assert!(source.downcast_ref::<InvalidRegistration>().is_some());
    }

    #[test]
    fn factory_failure_unwraps_nested_resolve_errors() {
        let nested = ResolveError::TypeMissing {
            type_info: TypeInfo::of::<u8>(),
            name: None,
        };
        let wrapped = ResolveError::factory_failed(TypeInfo::of::<String>(), Box::new(nested));
        assert!(matches!(wrapped, ResolveError::TypeMissing { .. }));

        let other = ResolveError::factory_failed(TypeInfo::of::<String>(), "boom".into());
        assert!(matches!(other, ResolveError::FactoryFailed { .. }));
    }
}
