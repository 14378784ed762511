use crate::{
    registry::Registry,
    types::{GenericDefinition, TypeDescriptor, TypeKind},
};

/// Can the container satisfy `descriptor` without it being registered explicitly
///
/// A pure function of the current registry, never cached across registry changes.
pub fn can_resolve(registry: &Registry, descriptor: &TypeDescriptor) -> bool {
    match &descriptor.kind {
        // Value-like types must be registered
        TypeKind::Primitive
        | TypeKind::String
        | TypeKind::Enum
        | TypeKind::Delegate
        | TypeKind::AbstractClass
        | TypeKind::Interface => registry.is_registered(&descriptor.info),

        // Array could be either registered or the element type can be resolved
        TypeKind::Array(shape) => {
            registry.is_registered(&descriptor.info) || can_resolve(registry, &shape.element)
        }

        // Classes are built on demand, as long as there is a constructor to call
        TypeKind::Class => {
            let constructible = registry
                .metadata(descriptor.info.type_id)
                .is_some_and(|meta| meta.has_accessible_constructor());

            constructible || registry.is_registered(&descriptor.info)
        }

        TypeKind::Generic(shape) => {
            shape.definition == GenericDefinition::ENUMERABLE
                || registry.is_generic_registered(shape.definition)
                || registry.is_registered(&descriptor.info)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        lifetime::Lifetime,
        metadata::{ConstructorCandidate, TypeMetadata, Visibility},
        registry::{Registration, RegistrationSource},
        types::Instance,
    };

    struct Engine;
    struct Hidden;
    trait Service: Send + Sync {}

    fn engine_meta() -> TypeMetadata {
        TypeMetadata::of::<Engine>().constructor(ConstructorCandidate::new(|_| Ok(Engine)))
    }

    fn register_instance(registry: &mut Registry, descriptor: TypeDescriptor, instance: Instance) {
        registry.register(Registration::new(
            descriptor,
            None,
            RegistrationSource::Instance(instance),
            Lifetime::Transient,
        ));
    }

    #[test]
    fn value_like_types_need_a_registration() {
        let mut registry = Registry::new();
        let int = TypeDescriptor::primitive::<i32>();
        let string = TypeDescriptor::string();
        let service = TypeDescriptor::interface::<Arc<dyn Service>>();

        assert!(!can_resolve(&registry, &int));
        assert!(!can_resolve(&registry, &string));
        assert!(!can_resolve(&registry, &service));

        register_instance(&mut registry, int.clone(), Instance::new(4_i32));
        assert!(can_resolve(&registry, &int));
        assert!(!can_resolve(&registry, &string));
    }

    #[test]
    fn classes_need_an_accessible_constructor() {
        let mut registry = Registry::new();
        let engine = TypeDescriptor::class::<Engine>();
        let hidden = TypeDescriptor::class::<Hidden>();

        assert!(!can_resolve(&registry, &engine), "undescribed class has no constructor");

        registry.describe(engine_meta());
        registry.describe(
            TypeMetadata::of::<Hidden>()
                .constructor(ConstructorCandidate::new(|_| Ok(Hidden)).visibility(Visibility::Private)),
        );

        assert!(can_resolve(&registry, &engine));
        assert!(!can_resolve(&registry, &hidden));

        register_instance(&mut registry, hidden.clone(), Instance::new(Hidden));
        assert!(can_resolve(&registry, &hidden));
    }

    #[test]
    fn arrays_follow_their_element_type() {
        let mut registry = Registry::new();
        let engines = TypeDescriptor::array::<Engine>(TypeDescriptor::class::<Engine>());
        let ints = TypeDescriptor::array::<i32>(TypeDescriptor::primitive::<i32>());

        assert!(!can_resolve(&registry, &engines));
        registry.describe(engine_meta());
        assert!(can_resolve(&registry, &engines));

        assert!(!can_resolve(&registry, &ints));
        register_instance(&mut registry, ints.clone(), Instance::new(Vec::<Arc<i32>>::new()));
        assert!(can_resolve(&registry, &ints), "registered array type");
    }

    #[test]
    fn enumerables_always_resolve_other_generics_need_a_factory() {
        let registry = Registry::new();
        let service = TypeDescriptor::interface::<Arc<dyn Service>>();

        assert!(can_resolve(&registry, &TypeDescriptor::enumerable::<Arc<dyn Service>>(service.clone())));
        assert!(can_resolve(&registry, &TypeDescriptor::lazy::<Arc<dyn Service>>(service.clone())));

        struct Repository;
        let repo = TypeDescriptor::generic::<Repository>(GenericDefinition("Repository"), vec![service]);
        assert!(!can_resolve(&registry, &repo));
    }
}
