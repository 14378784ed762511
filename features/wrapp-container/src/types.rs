use std::{
    any::{Any, TypeId},
    fmt::Debug,
    sync::Arc,
};

use crate::{
    container::Container,
    errors::ResolveError,
    resolver::{collection::Enumerable, lazy::Lazy},
};

/// All errors must be clone, so dyn errors are shared behind an Arc where stored
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Resolution may happen from any thread
/// So anything injectable needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// Instance of a resolved type
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    pub instance: Arc<dyn Any + Send + Sync + 'static>,
}
impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

impl Instance {
    pub fn new<ExistingInstance: Injectable>(instance: ExistingInstance) -> Self {
        Instance {
            info: TypeInfo::of::<ExistingInstance>(),
            instance: Arc::new(instance),
        }
    }

    /// Wraps an already shared value without re-allocating it
    pub fn from_arc<T: Injectable>(instance: Arc<T>) -> Self {
        Instance {
            info: TypeInfo::of::<T>(),
            instance,
        }
    }

    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, ResolveError> {
        match Arc::downcast::<T>(self.instance.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(ResolveError::DowncastFailed {
                required_type: std::any::type_name::<T>(),
                actual_type: self.info.type_name,
            }),
        }
    }

    /// True if both instances share the same allocation
    pub fn same_as(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// Identity of an open generic type, e.g. `Lazy<_>`
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct GenericDefinition(pub &'static str);
impl GenericDefinition {
    /// Enumerable of T - always resolvable, possibly empty
    pub const ENUMERABLE: GenericDefinition = GenericDefinition("Enumerable");
    /// Deferred resolution of T
    pub const LAZY: GenericDefinition = GenericDefinition("Lazy");
}
impl std::fmt::Display for GenericDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}<_>", self.0)
    }
}

pub(crate) type CollectFn = Arc<dyn Fn(Vec<Instance>) -> Result<Instance, ResolveError> + Send + Sync>;
pub(crate) type DeferFn = Arc<dyn Fn(Container, Option<String>) -> Instance + Send + Sync>;

/// Typed glue captured when a collection or wrapper descriptor is created
#[derive(Clone)]
pub(crate) enum Adapter {
    /// Assemble erased elements into the typed collection
    Collect(CollectFn),
    /// Create a deferred wrapper bound to a container
    Defer(DeferFn),
}

#[derive(Clone)]
pub struct ArrayShape {
    pub element: TypeDescriptor,
    pub(crate) collect: CollectFn,
}

#[derive(Clone)]
pub struct GenericShape {
    pub definition: GenericDefinition,
    pub arguments: Vec<TypeDescriptor>,
    pub(crate) adapter: Option<Adapter>,
}

/// The category of a type, as far as automatic construction is concerned
#[derive(Clone)]
pub enum TypeKind {
    Class,
    AbstractClass,
    Interface,
    Primitive,
    String,
    Enum,
    Delegate,
    Array(Box<ArrayShape>),
    Generic(Box<GenericShape>),
}
impl Debug for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeKind::Class => f.write_str("Class"),
            TypeKind::AbstractClass => f.write_str("AbstractClass"),
            TypeKind::Interface => f.write_str("Interface"),
            TypeKind::Primitive => f.write_str("Primitive"),
            TypeKind::String => f.write_str("String"),
            TypeKind::Enum => f.write_str("Enum"),
            TypeKind::Delegate => f.write_str("Delegate"),
            TypeKind::Array(shape) => f.debug_tuple("Array").field(&shape.element.info).finish(),
            TypeKind::Generic(shape) => f
                .debug_tuple("Generic")
                .field(&shape.definition)
                .field(&shape.arguments.iter().map(|a| a.info).collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// Identifies descriptors of one Rust type that compile to different plans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KindTag {
    Class,
    AbstractClass,
    Interface,
    Primitive,
    String,
    Enum,
    Delegate,
    Array,
    Generic {
        definition: GenericDefinition,
        adapted: bool,
    },
}
impl TypeKind {
    pub(crate) fn tag(&self) -> KindTag {
        match self {
            TypeKind::Class => KindTag::Class,
            TypeKind::AbstractClass => KindTag::AbstractClass,
            TypeKind::Interface => KindTag::Interface,
            TypeKind::Primitive => KindTag::Primitive,
            TypeKind::String => KindTag::String,
            TypeKind::Enum => KindTag::Enum,
            TypeKind::Delegate => KindTag::Delegate,
            TypeKind::Array(_) => KindTag::Array,
            TypeKind::Generic(shape) => KindTag::Generic {
                definition: shape.definition,
                adapted: shape.adapter.is_some(),
            },
        }
    }
}

/// Describes a type the container may be asked for
///
/// The key type is the value type stored in the container, so an interface is
/// usually described as `Arc<dyn Trait>`.
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    pub info: TypeInfo,
    pub kind: TypeKind,
}
impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info
    }
}
impl Eq for TypeDescriptor {}

impl TypeDescriptor {
    fn with_kind<T: 'static + ?Sized>(kind: TypeKind) -> Self {
        TypeDescriptor {
            info: TypeInfo::of::<T>(),
            kind,
        }
    }

    pub fn class<T: Injectable>() -> Self {
        Self::with_kind::<T>(TypeKind::Class)
    }

    pub fn abstract_class<T: Injectable>() -> Self {
        Self::with_kind::<T>(TypeKind::AbstractClass)
    }

    pub fn interface<T: Injectable>() -> Self {
        Self::with_kind::<T>(TypeKind::Interface)
    }

    pub fn primitive<T: Injectable>() -> Self {
        Self::with_kind::<T>(TypeKind::Primitive)
    }

    pub fn string() -> Self {
        Self::with_kind::<String>(TypeKind::String)
    }

    pub fn enumeration<T: Injectable>() -> Self {
        Self::with_kind::<T>(TypeKind::Enum)
    }

    pub fn delegate<T: Injectable>() -> Self {
        Self::with_kind::<T>(TypeKind::Delegate)
    }

    /// `T[]`, stored as `Vec<Arc<T>>`
    pub fn array<T: Injectable>(element: TypeDescriptor) -> Self {
        debug_assert_eq!(element.info, TypeInfo::of::<T>(), "element descriptor must describe T");
        Self::with_kind::<Vec<Arc<T>>>(TypeKind::Array(Box::new(ArrayShape {
            element,
            collect: Arc::new(collect_vec::<T>),
        })))
    }

    /// Enumerable of `T`, stored as [Enumerable]
    pub fn enumerable<T: Injectable>(element: TypeDescriptor) -> Self {
        debug_assert_eq!(element.info, TypeInfo::of::<T>(), "element descriptor must describe T");
        let collect: CollectFn = Arc::new(|items| {
            let items = collect_items::<T>(items)?;
            Ok(Instance::new(Enumerable::new(items)))
        });

        Self::with_kind::<Enumerable<T>>(TypeKind::Generic(Box::new(GenericShape {
            definition: GenericDefinition::ENUMERABLE,
            arguments: vec![element],
            adapter: Some(Adapter::Collect(collect)),
        })))
    }

    /// Deferred `T`, stored as [Lazy]
    pub fn lazy<T: Injectable>(element: TypeDescriptor) -> Self {
        debug_assert_eq!(element.info, TypeInfo::of::<T>(), "element descriptor must describe T");
        let target = element.clone();
        let defer: DeferFn = Arc::new(move |container, name| {
            Instance::new(Lazy::<T>::new(container, target.clone(), name))
        });

        Self::with_kind::<Lazy<T>>(TypeKind::Generic(Box::new(GenericShape {
            definition: GenericDefinition::LAZY,
            arguments: vec![element],
            adapter: Some(Adapter::Defer(defer)),
        })))
    }

    /// A closed generic type, built by whatever factory is registered for its definition
    pub fn generic<T: Injectable>(definition: GenericDefinition, arguments: Vec<TypeDescriptor>) -> Self {
        Self::with_kind::<T>(TypeKind::Generic(Box::new(GenericShape {
            definition,
            arguments,
            adapter: None,
        })))
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TypeKind::Interface)
    }

    pub fn generic_definition(&self) -> Option<GenericDefinition> {
        match &self.kind {
            TypeKind::Generic(shape) => Some(shape.definition),
            _ => None,
        }
    }
}

fn collect_items<T: Injectable>(items: Vec<Instance>) -> Result<Vec<Arc<T>>, ResolveError> {
    items.iter().map(Instance::downcast::<T>).collect()
}

fn collect_vec<T: Injectable>(items: Vec<Instance>) -> Result<Instance, ResolveError> {
    Ok(Instance::new(collect_items::<T>(items)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Widget;

    #[test]
    fn downcast_reports_both_type_names() {
        let instance = Instance::new(5_u32);
        let err = instance.downcast::<Widget>().unwrap_err();

        match err {
            ResolveError::DowncastFailed {
                required_type,
                actual_type,
            } => {
                assert!(required_type.ends_with("Widget"));
                assert_eq!(actual_type, "u32");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn array_descriptor_is_keyed_by_vec_of_arc() {
        let array = TypeDescriptor::array::<Widget>(TypeDescriptor::class::<Widget>());
        assert_eq!(array.info, TypeInfo::of::<Vec<Arc<Widget>>>());

        let TypeKind::Array(shape) = &array.kind else {
            panic!("expected array kind");
        };
        let collected = (shape.collect)(vec![Instance::new(Widget), Instance::new(Widget)]).unwrap();
        assert_eq!(collected.downcast::<Vec<Arc<Widget>>>().unwrap().len(), 2);
    }

    #[test]
    fn descriptors_compare_by_type_only() {
        assert_eq!(TypeDescriptor::class::<Widget>(), TypeDescriptor::abstract_class::<Widget>());
        assert_ne!(TypeDescriptor::class::<Widget>(), TypeDescriptor::primitive::<u8>());
        assert_eq!(
            TypeDescriptor::lazy::<Widget>(TypeDescriptor::class::<Widget>()).generic_definition(),
            Some(GenericDefinition::LAZY)
        );
    }
}
