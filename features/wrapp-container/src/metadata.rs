use std::{fmt::Debug, sync::Arc};

use crate::{
    errors::ResolveError,
    types::{DynError, Injectable, Instance, TypeDescriptor, TypeInfo},
};

/// Accessibility of a declared constructor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    /// Visible within the declaring crate
    Internal,
    /// Visible to subtypes only
    Family,
    Private,
}

/// A single constructor parameter
#[derive(Clone, Debug)]
pub struct ParameterDescriptor {
    pub name: &'static str,
    pub ty: TypeDescriptor,
    /// Used when nothing is registered for `ty`
    pub default: Option<Instance>,
    /// Resolve `ty` under this registration name
    pub resolve_name: Option<String>,
}
impl ParameterDescriptor {
    pub fn new(name: &'static str, ty: TypeDescriptor) -> Self {
        ParameterDescriptor {
            name,
            ty,
            default: None,
            resolve_name: None,
        }
    }

    pub fn with_default<T: Injectable>(mut self, default: T) -> Self {
        self.default = Some(Instance::new(default));
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.resolve_name = Some(name.into());
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

pub(crate) type InvokeFn = Arc<dyn Fn(&mut Arguments) -> Result<Instance, DynError> + Send + Sync>;

/// A declared constructor of a type
#[derive(Clone)]
pub struct ConstructorCandidate {
    pub visibility: Visibility,
    pub is_static: bool,
    /// Marked as the constructor to use when several are available
    pub preferred: bool,
    pub parameters: Vec<ParameterDescriptor>,
    invoke: InvokeFn,
}
impl Debug for ConstructorCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstructorCandidate")
            .field("visibility", &self.visibility)
            .field("preferred", &self.preferred)
            .field("signature", &self.signature())
            .finish()
    }
}

impl ConstructorCandidate {
    /// A public constructor without parameters, add them with [ConstructorCandidate::param]
    pub fn new<T, F>(construct: F) -> Self
    where
        T: Injectable,
        F: Fn(&mut Arguments) -> Result<T, DynError> + Send + Sync + 'static,
    {
        ConstructorCandidate {
            visibility: Visibility::Public,
            is_static: false,
            preferred: false,
            parameters: Vec::new(),
            invoke: Arc::new(move |args| construct(args).map(Instance::new)),
        }
    }

    pub fn param(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn static_ctor(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Marks this constructor for preferential selection
    pub fn preferred(mut self) -> Self {
        self.preferred = true;
        self
    }

    /// Can the container call this constructor
    pub fn is_eligible(&self) -> bool {
        !self.is_static && self.is_accessible()
    }

    /// Visible to the container, regardless of being static
    pub fn is_accessible(&self) -> bool {
        !matches!(self.visibility, Visibility::Family | Visibility::Private)
    }

    pub fn interface_count(&self) -> usize {
        self.parameters.iter().filter(|p| p.ty.is_interface()).count()
    }

    pub fn signature(&self) -> Vec<TypeInfo> {
        self.parameters.iter().map(|p| p.ty.info).collect()
    }

    pub(crate) fn invoke(&self, product: TypeInfo, values: Vec<Instance>) -> Result<Instance, ResolveError> {
        let mut args = Arguments::new(product, values);
        (self.invoke)(&mut args).map_err(|e| ResolveError::factory_failed(product, e))
    }
}

/// The constructor table of a type
#[derive(Clone, Debug)]
pub struct TypeMetadata {
    pub info: TypeInfo,
    /// In declaration order
    pub constructors: Vec<Arc<ConstructorCandidate>>,
}
impl TypeMetadata {
    pub fn of<T: Injectable>() -> Self {
        TypeMetadata {
            info: TypeInfo::of::<T>(),
            constructors: Vec::new(),
        }
    }

    pub fn constructor(mut self, constructor: ConstructorCandidate) -> Self {
        self.constructors.push(Arc::new(constructor));
        self
    }

    pub fn eligible_constructors(&self) -> Vec<Arc<ConstructorCandidate>> {
        self.constructors
            .iter()
            .filter(|c| c.is_eligible())
            .cloned()
            .collect()
    }

    pub fn has_accessible_constructor(&self) -> bool {
        self.constructors.iter().any(|c| c.is_accessible())
    }
}

/// Resolved constructor arguments, taken in declaration order
pub struct Arguments {
    product: TypeInfo,
    values: std::vec::IntoIter<Instance>,
    taken: usize,
    available: usize,
}
impl Arguments {
    fn new(product: TypeInfo, values: Vec<Instance>) -> Self {
        Arguments {
            product,
            available: values.len(),
            values: values.into_iter(),
            taken: 0,
        }
    }

    /// Takes the next argument
    pub fn next<T: Injectable>(&mut self) -> Result<Arc<T>, ResolveError> {
        self.next_instance()?.downcast()
    }

    /// Takes the next argument, cloning the value out of the container's Arc
    pub fn next_cloned<T: Injectable + Clone>(&mut self) -> Result<T, ResolveError> {
        self.next::<T>().map(|value| value.as_ref().clone())
    }

    pub fn next_instance(&mut self) -> Result<Instance, ResolveError> {
        let index = self.taken;
        self.taken += 1;
        self.values.next().ok_or(ResolveError::ArgumentMissing {
            product: self.product,
            index,
            available: self.available,
        })
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}
