use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::{
    metadata::ConstructorCandidate,
    registry::{InjectionValue, Registration, RegistrationKey, RegistrationSource, Registry},
    selection::{can_resolve, select, SelectionOutcome, SelectionStrategy},
    types::{GenericDefinition, TypeDescriptor, TypeInfo, TypeKind},
};

/// Information about a dependency
#[derive(Clone, Debug)]
pub struct DependencyInfo {
    /// The required Type
    pub descriptor: TypeDescriptor,
    /// Registration name it is resolved under
    pub name: Option<String>,
    /// If it is optional or required
    pub optional: bool,
    /// If the Dependency is injected lazily
    pub lazy: bool,
}
impl DependencyInfo {
    pub fn required(descriptor: TypeDescriptor) -> Self {
        DependencyInfo {
            descriptor,
            name: None,
            optional: false,
            lazy: false,
        }
    }

    pub fn optional(self) -> Self {
        DependencyInfo { optional: true, ..self }
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        DependencyInfo {
            name: Some(name.into()),
            ..self
        }
    }

    /// `Lazy<T>` dependencies are recorded as lazy dependencies on `T`
    fn of_parameter(descriptor: &TypeDescriptor, name: Option<&String>, optional: bool) -> Self {
        let (descriptor, lazy) = match &descriptor.kind {
            TypeKind::Generic(shape) if shape.definition == GenericDefinition::LAZY => {
                match shape.arguments.first() {
                    Some(element) => (element.clone(), true),
                    None => (descriptor.clone(), false),
                }
            }
            _ => (descriptor.clone(), false),
        };

        DependencyInfo {
            descriptor,
            name: name.cloned(),
            optional,
            lazy,
        }
    }

    fn key(&self) -> RegistrationKey {
        RegistrationKey::new(self.descriptor.info, self.name.as_deref())
    }
}

/// Graph of every registration and described type
///
/// Used to check for missing and circular dependencies without building anything
pub struct DependencyGraph<'r> {
    registry: &'r Registry,
    map: BTreeMap<RegistrationKey, DependencyGraphEntry>,
}
impl<'r> DependencyGraph<'r> {
    pub fn new(registry: &'r Registry, strategy: SelectionStrategy) -> Self {
        let mut graph = Self {
            registry,
            map: Default::default(),
        };

        for registration in registry.registrations() {
            let dependencies = registration_dependencies(registry, registration, strategy);
            graph.add(registration.key.clone(), dependencies);
        }

        // Described types are built implicitly when not registered
        for metadata in registry.described_types() {
            let key = RegistrationKey::new(metadata.info, None);
            if graph.map.contains_key(&key) {
                continue;
            }
            let descriptor = TypeDescriptor {
                info: metadata.info,
                kind: TypeKind::Class,
            };
            let outcome = select(registry, &descriptor, None, strategy);
            graph.add(key, outcome_dependencies(&outcome));
        }

        graph
    }

    fn add(&mut self, key: RegistrationKey, dependencies: Vec<DependencyInfo>) {
        self.map.insert(
            key.clone(),
            DependencyGraphEntry {
                key: key.clone(),
                dependencies,
            },
        );
    }

    fn entry(&self, dependency: &DependencyInfo) -> Option<&DependencyGraphEntry> {
        let exact = self.map.get(&dependency.key());
        match dependency.descriptor.kind {
            // A named class without registration is still built implicitly
            TypeKind::Class => {
                exact.or_else(|| self.map.get(&RegistrationKey::new(dependency.descriptor.info, None)))
            }
            _ => exact,
        }
    }

    /// Validate the graph
    ///
    /// Returns a list of all issues
    pub fn check(&self) -> Result<(), DependencyGraphErrors> {
        let mut checked = HashSet::new();
        let mut errors = Vec::new();
        for entry in self.map.values() {
            let mut dependency_chain = Vec::new();
            check_recurse(self, &mut checked, &mut errors, &mut dependency_chain, entry);
        }

        if !errors.is_empty() {
            return Err(DependencyGraphErrors { errors });
        }

        return Ok(());

        fn check_recurse(
            graph: &DependencyGraph<'_>,
            checked: &mut HashSet<RegistrationKey>,
            errors: &mut Vec<DependencyGraphError>,
            dependency_chain: &mut Vec<RegistrationKey>,
            entry: &DependencyGraphEntry,
        ) {
            // Circular Dependency Check
            if let Some(from) = dependency_chain.first().map(|key| key.info) {
                if dependency_chain.contains(&entry.key) {
                    let to = entry.key.info;
                    let mut chain: Vec<TypeInfo> = dependency_chain.iter().map(|key| key.info).collect();
                    chain.push(to); // Add current so chain is complete

                    errors.push(DependencyGraphError::CircularDependency { from, to, chain });
                    return;
                }
            }

            // Skip other checks if already checked
            if !checked.insert(entry.key.clone()) {
                return;
            };

            dependency_chain.push(entry.key.clone());

            for dependency in &entry.dependencies {
                let Some(next_entry) = graph.entry(dependency) else {
                    let resolvable = match (&dependency.name, &dependency.descriptor.kind) {
                        // Value-like types under a name must be registered under that name
                        (
                            Some(_),
                            TypeKind::Primitive
                            | TypeKind::String
                            | TypeKind::Enum
                            | TypeKind::Delegate
                            | TypeKind::AbstractClass
                            | TypeKind::Interface,
                        ) => false,
                        _ => can_resolve(graph.registry, &dependency.descriptor),
                    };
                    if !dependency.optional && !resolvable {
                        errors.push(DependencyGraphError::MissingDependency {
                            dependency: dependency.descriptor.info,
                            required_by: entry.key.info,
                        });
                    }

                    continue;
                };

                if dependency.lazy {
                    // Don't recurse, this will be checked by itself
                    continue;
                }

                check_recurse(graph, checked, errors, dependency_chain, next_entry);
            }

            dependency_chain.pop();
        }
    }
}

fn registration_dependencies(
    registry: &Registry,
    registration: &Registration,
    strategy: SelectionStrategy,
) -> Vec<DependencyInfo> {
    match &registration.source {
        RegistrationSource::Instance(_) => Vec::new(),
        RegistrationSource::Factory(factory) => factory.dependencies(),
        RegistrationSource::Mapping { target, .. } => vec![DependencyInfo::required(target.clone())],
        RegistrationSource::Type => {
            let outcome = select(registry, &registration.descriptor, Some(registration), strategy);
            outcome_dependencies(&outcome)
        }
    }
}

fn outcome_dependencies(outcome: &SelectionOutcome) -> Vec<DependencyInfo> {
    match outcome {
        SelectionOutcome::Constructor(constructor) => constructor_dependencies(constructor, &[]),
        SelectionOutcome::InjectionMember { constructor, values } => constructor_dependencies(constructor, values),
        // Reported when resolved, a failed selection has no edges
        SelectionOutcome::Failure(_) | SelectionOutcome::NoConstructor => Vec::new(),
    }
}

fn constructor_dependencies(constructor: &ConstructorCandidate, explicit: &[InjectionValue]) -> Vec<DependencyInfo> {
    constructor
        .parameters
        .iter()
        .enumerate()
        .filter_map(|(index, parameter)| match explicit.get(index) {
            Some(InjectionValue::Value(_)) => None,
            Some(InjectionValue::Resolve { ty, name }) => {
                Some(DependencyInfo::of_parameter(ty, name.as_ref(), false))
            }
            None => Some(DependencyInfo::of_parameter(
                &parameter.ty,
                parameter.resolve_name.as_ref(),
                parameter.has_default(),
            )),
        })
        .collect()
}

struct DependencyGraphEntry {
    key: RegistrationKey,
    dependencies: Vec<DependencyInfo>,
}

#[derive(Error, Debug, Clone)]
pub enum DependencyGraphError {
    #[error("'{required_by}' needs '{dependency}' but it is missing")]
    MissingDependency {
        dependency: TypeInfo,
        required_by: TypeInfo,
    },
    #[error("A Circular Dependency exists between '{from}' and '{to}' through {chain:?} - Consider using `Lazy`")]
    CircularDependency {
        from: TypeInfo,
        to: TypeInfo,
        chain: Vec<TypeInfo>,
    },
}
impl std::fmt::Display for DependencyGraphErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("The dependency graph had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}

#[derive(Error, Debug, Clone)]
pub struct DependencyGraphErrors {
    pub errors: Vec<DependencyGraphError>,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        factories::FnFactory,
        lifetime::Lifetime,
        metadata::{ParameterDescriptor, TypeMetadata},
        types::{DynError, Instance},
    };

    struct Alpha;
    struct Beta;
    trait Clock: Send + Sync {}

    fn alpha_needs(ty: TypeDescriptor) -> TypeMetadata {
        TypeMetadata::of::<Alpha>()
            .constructor(ConstructorCandidate::new(|_| Ok(Alpha)).param(ParameterDescriptor::new("dep", ty)))
    }

    fn beta_needs(ty: TypeDescriptor) -> TypeMetadata {
        TypeMetadata::of::<Beta>()
            .constructor(ConstructorCandidate::new(|_| Ok(Beta)).param(ParameterDescriptor::new("dep", ty)))
    }

    #[test]
    fn reports_missing_dependencies() {
        let mut registry = Registry::new();
        // A single constructor is selected even though its parameter cannot be resolved
        registry.describe(alpha_needs(TypeDescriptor::interface::<Arc<dyn Clock>>()));

        let errors = DependencyGraph::new(&registry, SelectionStrategy::Smart)
            .check()
            .unwrap_err();
        assert_eq!(errors.errors.len(), 1);
        assert!(matches!(
            errors.errors[0],
            DependencyGraphError::MissingDependency { required_by, .. } if required_by == TypeInfo::of::<Alpha>()
        ));
        assert!(errors.to_string().contains("one or more errors"));
    }

    #[test]
    fn reports_cycles_but_not_through_lazy() {
        let mut registry = Registry::new();
        registry.describe(alpha_needs(TypeDescriptor::class::<Beta>()));
        registry.describe(beta_needs(TypeDescriptor::class::<Alpha>()));

        let errors = DependencyGraph::new(&registry, SelectionStrategy::Smart)
            .check()
            .unwrap_err();
        assert!(errors
            .errors
            .iter()
            .any(|e| matches!(e, DependencyGraphError::CircularDependency { .. })));

        registry.describe(beta_needs(TypeDescriptor::lazy::<Alpha>(TypeDescriptor::class::<Alpha>())));
        assert!(DependencyGraph::new(&registry, SelectionStrategy::Smart).check().is_ok());
    }

    #[test]
    fn registered_dependencies_are_satisfied() {
        let mut registry = Registry::new();
        registry.describe(alpha_needs(TypeDescriptor::interface::<Arc<dyn Clock>>()));
        registry.register(Registration::new(
            TypeDescriptor::interface::<Arc<dyn Clock>>(),
            None,
            RegistrationSource::Type,
            Lifetime::Singleton,
        ));

        // The clock registration itself has no constructor, which only fails when resolved
        assert!(DependencyGraph::new(&registry, SelectionStrategy::Smart).check().is_ok());
    }

    #[test]
    fn named_registrations_are_checked_on_their_own() {
        let u64_ty = TypeDescriptor::primitive::<u64>();
        let mut registry = Registry::new();
        registry.register(Registration::new(
            u64_ty.clone(),
            None,
            RegistrationSource::Instance(Instance::new(1_u64)),
            Lifetime::Transient,
        ));
        registry.register(Registration::new(
            u64_ty.clone(),
            Some("needs_clock"),
            RegistrationSource::Factory(Arc::new(
                FnFactory::new(|_| Ok::<u64, DynError>(2))
                    .depends_on(DependencyInfo::required(TypeDescriptor::interface::<Arc<dyn Clock>>())),
            )),
            Lifetime::Transient,
        ));
        // Depending on the unnamed registration of the same type is no cycle
        registry.register(Registration::new(
            u64_ty.clone(),
            Some("derived"),
            RegistrationSource::Factory(Arc::new(
                FnFactory::new(|_| Ok::<u64, DynError>(3)).depends_on(DependencyInfo::required(u64_ty.clone())),
            )),
            Lifetime::Transient,
        ));

        let errors = DependencyGraph::new(&registry, SelectionStrategy::Smart)
            .check()
            .unwrap_err();
        assert_eq!(errors.errors.len(), 1, "{errors}");
        assert!(matches!(
            errors.errors[0],
            DependencyGraphError::MissingDependency { required_by, .. } if required_by == TypeInfo::of::<u64>()
        ));
    }

    #[test]
    fn named_value_dependencies_need_that_name() {
        let mut registry = Registry::new();
        registry.describe(TypeMetadata::of::<Alpha>().constructor(
            ConstructorCandidate::new(|_| Ok(Alpha))
                .param(ParameterDescriptor::new("dep", TypeDescriptor::string()).named("primary")),
        ));
        registry.register(Registration::new(
            TypeDescriptor::string(),
            None,
            RegistrationSource::Instance(Instance::new(String::new())),
            Lifetime::Transient,
        ));

        let errors = DependencyGraph::new(&registry, SelectionStrategy::Smart)
            .check()
            .unwrap_err();
        assert_eq!(errors.errors.len(), 1);

        registry.register(Registration::new(
            TypeDescriptor::string(),
            Some("primary"),
            RegistrationSource::Instance(Instance::new(String::new())),
            Lifetime::Transient,
        ));
        assert!(DependencyGraph::new(&registry, SelectionStrategy::Smart).check().is_ok());
    }
}
