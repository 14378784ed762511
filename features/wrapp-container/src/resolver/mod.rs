//! Built-in generic types the container knows how to build without registration.

pub mod collection;
pub mod lazy;

pub use collection::Enumerable;
pub use lazy::{Lazy, LazyResolver};
