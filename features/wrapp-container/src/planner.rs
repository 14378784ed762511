use crate::{
    context::ResolutionContext,
    errors::ResolveError,
    metadata::ConstructorCandidate,
    registry::{InjectionValue, RegistrationKey},
    types::{Instance, TypeDescriptor},
};

/// How one constructor argument is obtained
#[derive(Clone, Debug)]
pub enum ParameterSource {
    /// An explicitly injected value
    Value(Instance),
    /// Re-enter the pipeline for the parameter type
    Resolve {
        ty: TypeDescriptor,
        name: Option<String>,
    },
    /// Resolve if the type is registered under `name`, otherwise fall back to the declared default
    Default {
        ty: TypeDescriptor,
        name: Option<String>,
        default: Instance,
    },
}

/// One source per constructor parameter, in declaration order
#[derive(Clone, Debug, Default)]
pub struct ParameterPlan {
    pub sources: Vec<ParameterSource>,
}

/// Plans the arguments of `constructor`
///
/// `explicit` values are positionally aligned with the parameters and take
/// precedence over defaults and resolution.
pub fn plan_parameters(constructor: &ConstructorCandidate, explicit: Option<&[InjectionValue]>) -> ParameterPlan {
    let sources = constructor
        .parameters
        .iter()
        .enumerate()
        .map(|(index, parameter)| {
            match explicit.and_then(|values| values.get(index)) {
                Some(InjectionValue::Value(instance)) => return ParameterSource::Value(instance.clone()),
                Some(InjectionValue::Resolve { ty, name }) => {
                    return ParameterSource::Resolve {
                        ty: ty.clone(),
                        name: name.clone(),
                    }
                }
                None => {}
            }

            match &parameter.default {
                Some(default) => ParameterSource::Default {
                    ty: parameter.ty.clone(),
                    name: parameter.resolve_name.clone(),
                    default: default.clone(),
                },
                None => ParameterSource::Resolve {
                    ty: parameter.ty.clone(),
                    name: parameter.resolve_name.clone(),
                },
            }
        })
        .collect();

    ParameterPlan { sources }
}

impl ParameterPlan {
    /// Obtains every argument, left to right
    ///
    /// Each argument is resolved before the next one, so per-resolve instances
    /// created for an earlier argument are reused by later ones.
    pub(crate) fn evaluate(&self, ctx: &mut ResolutionContext<'_>) -> Result<Vec<Instance>, ResolveError> {
        let mut values = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let value = match source {
                ParameterSource::Value(instance) => instance.clone(),
                ParameterSource::Resolve { ty, name } => ctx.resolve_named(ty, name.as_deref())?,
                ParameterSource::Default { ty, name, default } => {
                    if ctx.container().is_registered_as(&RegistrationKey::new(ty.info, name.as_deref())) {
                        ctx.resolve_named(ty, name.as_deref())?
                    } else {
                        default.clone()
                    }
                }
            };
            values.push(value);
        }
        Ok(values)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
