use std::cmp::Ordering;

use super::AllocError;

/// Elements reserved each time a full list grows.
pub const DEFAULT_INCREMENT: usize = 16;

/// Ordered list that grows by a fixed number of slots.
///
/// The list owns its elements; they are dropped with it. Lists of borrowed
/// data (`DynamicList<&T>`) give the non-owning mode.
#[derive(Debug, Clone)]
pub struct DynamicList<T> {
    items: Vec<T>,
    increment: usize,
}

impl<T> DynamicList<T> {
    pub fn new() -> Self {
        Self::with_increment(DEFAULT_INCREMENT)
    }

    pub fn with_increment(increment: usize) -> Self {
        Self {
            items: Vec::new(),
            increment: increment.max(1),
        }
    }

    /// Appends an item, growing capacity by the list's increment when full.
    ///
    /// If growth fails the list is unchanged and the item is dropped.
    pub fn append(&mut self, item: T) -> Result<(), AllocError> {
        if self.items.len() == self.items.capacity() {
            self.items
                .try_reserve_exact(self.increment)
                .map_err(|e| AllocError::from_reserve(self.increment, e))?;
        }
        self.items.push(item);
        Ok(())
    }

    /// Index of the first element matching `pred`.
    pub fn find<F>(&self, pred: F) -> Option<usize>
    where
        F: FnMut(&T) -> bool,
    {
        self.items.iter().position(pred)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Stable sort.
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.items.sort_by(compare);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T> Default for DynamicList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> IntoIterator for &'a DynamicList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> IntoIterator for DynamicList<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
