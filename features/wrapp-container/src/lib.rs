//! Wrapp Container is a dependency injection container that builds object graphs
//! from explicitly described constructors.
//!
//! Resolving a type goes through three stages:
//! 1. Selection: pick the constructor to call (see [selection])
//! 2. Planning: decide where each argument comes from (see [planner])
//! 3. Compilation: turn both into a cached [compiler::BuildPlan], executed on every resolve
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use wrapp_container::{
//!     Container, ConstructorCandidate, Lifetime, ParameterDescriptor, TypeDescriptor, TypeMetadata,
//! };
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_string()
//!     }
//! }
//!
//! struct App {
//!     greeter: Arc<Arc<dyn Greeter>>,
//! }
//!
//! let greeter = TypeDescriptor::interface::<Arc<dyn Greeter>>();
//!
//! let container = Container::new();
//! container
//!     .describe(TypeMetadata::of::<English>().constructor(ConstructorCandidate::new(|_| Ok(English))))
//!     .describe(
//!         TypeMetadata::of::<App>().constructor(
//!             ConstructorCandidate::new(|args| Ok(App { greeter: args.next()? }))
//!                 .param(ParameterDescriptor::new("greeter", greeter.clone())),
//!         ),
//!     )
//!     .register_mapping(
//!         greeter,
//!         None,
//!         Lifetime::Singleton,
//!         TypeDescriptor::class::<English>(),
//!         |english: Arc<English>| english as Arc<dyn Greeter>,
//!     );
//!
//! let app = container.require::<App>().unwrap();
//! assert_eq!(app.greeter.greet(), "hello");
//! ```
//!
//! Wrapp Container consists of the following components:
//!
//! 1. Types and Metadata - describing types and their constructors
//! 2. Registry and Container - registering types, instances, factories and mappings
//! 3. Selection, Planner and Compiler - building instances
//! 4. Lifetimes - transient, singleton and per-resolve instances
//! 5. Resolvers - the built-in `Lazy<T>` and `Enumerable<T>` generics
//! 6. Dependency Graph - validating registrations without building anything

pub mod builder;
pub mod compiler;
pub mod container;
pub mod context;
pub mod dependency_graph;
pub mod errors;
pub mod factories;
pub mod lifetime;
pub mod metadata;
pub mod planner;
pub mod registry;
pub mod resolver;
pub mod selection;
pub mod types;

pub use builder::{ContainerBuilder, ContainerOptions};
pub use container::Container;
pub use context::{Overrides, ResolutionContext};
pub use dependency_graph::{DependencyGraphError, DependencyGraphErrors, DependencyInfo};
pub use errors::{InvalidRegistration, ResolveError, ValidateError};
pub use factories::{DynFactory, FnFactory, GenericFactory, InstanceFactory};
pub use lifetime::Lifetime;
pub use metadata::{Arguments, ConstructorCandidate, ParameterDescriptor, TypeMetadata, Visibility};
pub use registry::{InjectionConstructor, InjectionValue, Registration, RegistrationKey, RegistrationSource};
pub use resolver::{Enumerable, Lazy};
pub use selection::{SelectionOutcome, SelectionStrategy};
pub use types::{DynError, GenericDefinition, Injectable, Instance, TypeDescriptor, TypeInfo, TypeKind};
