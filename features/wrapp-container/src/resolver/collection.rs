use std::{ops::Deref, sync::Arc};

use crate::types::Injectable;

/// Every registration of `T`, the unnamed one first, then named ones in registration order
///
/// Resolved from a descriptor created with [crate::types::TypeDescriptor::enumerable].
#[derive(Debug)]
pub struct Enumerable<T: Injectable> {
    items: Vec<Arc<T>>,
}
impl<T: Injectable> Clone for Enumerable<T> {
    fn clone(&self) -> Self {
        Enumerable {
            items: self.items.clone(),
        }
    }
}

impl<T: Injectable> Enumerable<T> {
    pub fn new(items: Vec<Arc<T>>) -> Self {
        Enumerable { items }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<T>> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Arc<T>> {
        self.items
    }
}
impl<T: Injectable> Deref for Enumerable<T> {
    type Target = [Arc<T>];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}
impl<'a, T: Injectable> IntoIterator for &'a Enumerable<T> {
    type Item = &'a Arc<T>;
    type IntoIter = std::slice::Iter<'a, Arc<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
