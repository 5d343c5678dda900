//! Sorted, key-unique list backed by a contiguous vector.
//!
//! Lookups and replacement use binary search over the key projection and run
//! in O(log n). Insertion and removal anywhere but the tail still shift the
//! backing vector and cost O(n); tunnels are looked up far more often than
//! they are added or removed.

use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;
use std::slice;
use std::sync::Arc;

use super::error::{RegistryError, RegistryResult};

/// Objects that carry an identifying key.
pub trait Keyed {
    /// Key type used for ordering and lookup.
    type Key: ?Sized;

    /// Returns the identifying key.
    fn key(&self) -> &Self::Key;

    /// Whether `other` is the very same element as `self`.
    ///
    /// Shared handles compare by allocation; plain values by equality.
    fn is_same(&self, other: &Self) -> bool;
}

impl<T: Keyed + ?Sized> Keyed for Arc<T> {
    type Key = T::Key;

    fn key(&self) -> &T::Key {
        (**self).key()
    }

    fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

/// Comparator applied to element keys.
pub type Comparator<K> = Arc<dyn Fn(&K, &K) -> Ordering + Send + Sync>;

/// A keyed list that enforces uniqueness and sorted order across its keys.
pub struct SortedKeyedList<E: Keyed> {
    elements: Vec<E>,
    comparator: Comparator<E::Key>,
}

impl<E: Keyed> SortedKeyedList<E> {
    /// Create an empty list ordered by `comparator`.
    pub fn new<F>(comparator: F) -> Self
    where
        F: Fn(&E::Key, &E::Key) -> Ordering + Send + Sync + 'static,
    {
        Self {
            elements: Vec::new(),
            comparator: Arc::new(comparator),
        }
    }

    /// Create an empty list ordered by the keys' natural order.
    pub fn natural() -> Self
    where
        E: 'static,
        E::Key: Ord,
    {
        Self::new(|a: &E::Key, b: &E::Key| a.cmp(b))
    }

    /// The comparator this list is sorted by.
    pub fn comparator(&self) -> &Comparator<E::Key> {
        &self.comparator
    }

    /// `Ok(index)` of the matching key, or `Err(insertion_point)`.
    fn search(&self, key: &E::Key) -> Result<usize, usize> {
        self.elements
            .binary_search_by(|probe| (self.comparator)(probe.key(), key))
    }

    /// Insert `element` at its sorted position.
    ///
    /// Returns `Ok(false)` without modifying the list when the identical
    /// element is already stored.
    pub fn add(&mut self, element: E) -> RegistryResult<bool> {
        match self.search(element.key()) {
            Ok(index) if self.elements[index].is_same(&element) => Ok(false),
            Ok(index) => Err(RegistryError::DuplicateKey { index }),
            Err(insertion_point) => {
                self.elements.insert(insertion_point, element);
                Ok(true)
            }
        }
    }

    /// Insert `element` at `index`, which must be its sorted position.
    pub fn insert(&mut self, index: usize, element: E) -> RegistryResult<()> {
        match self.search(element.key()) {
            Ok(existing) => Err(RegistryError::DuplicateKey { index: existing }),
            Err(insertion_point) if insertion_point != index => {
                Err(RegistryError::InvalidIndex { index })
            }
            Err(insertion_point) => {
                self.elements.insert(insertion_point, element);
                Ok(())
            }
        }
    }

    /// Add every element in order, returning whether anything changed.
    pub fn add_all<I>(&mut self, elements: I) -> RegistryResult<bool>
    where
        I: IntoIterator<Item = E>,
    {
        let mut changed = false;
        for element in elements {
            changed |= self.add(element)?;
        }
        Ok(changed)
    }

    /// Replace the element at `index`, returning the previous one.
    ///
    /// A replacement with a different key is only accepted when the new key
    /// would sort adjacent to `index`.
    pub fn set(&mut self, index: usize, element: E) -> RegistryResult<E> {
        let current = self
            .elements
            .get(index)
            .ok_or(RegistryError::InvalidIndex { index })?;
        if (self.comparator)(element.key(), current.key()) != Ordering::Equal {
            match self.search(element.key()) {
                Ok(existing) => return Err(RegistryError::DuplicateKey { index: existing }),
                Err(insertion_point) if insertion_point < index || insertion_point > index + 1 => {
                    return Err(RegistryError::InvalidIndex { index });
                }
                Err(_) => {}
            }
        }
        Ok(std::mem::replace(&mut self.elements[index], element))
    }

    /// Remove and return the element at `index`.
    pub fn remove(&mut self, index: usize) -> RegistryResult<E> {
        if index >= self.elements.len() {
            return Err(RegistryError::InvalidIndex { index });
        }
        Ok(self.elements.remove(index))
    }

    /// Remove and return the element stored under `key`.
    pub fn remove_key(&mut self, key: &E::Key) -> Option<E> {
        let index = self.search(key).ok()?;
        Some(self.elements.remove(index))
    }

    /// Drop every element.
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn index_of_key(&self, key: &E::Key) -> Option<usize> {
        self.search(key).ok()
    }

    /// Keys are unique, so this always agrees with [`index_of_key`](Self::index_of_key).
    pub fn last_index_of_key(&self, key: &E::Key) -> Option<usize> {
        self.index_of_key(key)
    }

    pub fn contains_key(&self, key: &E::Key) -> bool {
        self.search(key).is_ok()
    }

    pub fn contains_all_keys<'k, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'k E::Key>,
        E::Key: 'k,
    {
        keys.into_iter().all(|key| self.contains_key(key))
    }

    /// Element stored under `key`.
    pub fn get(&self, key: &E::Key) -> Option<&E> {
        self.index_of_key(key).map(|index| &self.elements[index])
    }

    /// Element at `index`.
    pub fn get_index(&self, index: usize) -> Option<&E> {
        self.elements.get(index)
    }

    pub fn first_key(&self) -> RegistryResult<&E::Key> {
        self.elements
            .first()
            .map(Keyed::key)
            .ok_or(RegistryError::EmptyCollection)
    }

    pub fn last_key(&self) -> RegistryResult<&E::Key> {
        self.elements
            .last()
            .map(Keyed::key)
            .ok_or(RegistryError::EmptyCollection)
    }

    /// Live view over the keys in sorted order.
    pub fn key_set(&self) -> KeySet<'_, E> {
        KeySet { list: self }
    }

    pub fn values(&self) -> &[E] {
        &self.elements
    }

    pub fn iter(&self) -> slice::Iter<'_, E> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<E: Keyed + fmt::Debug> fmt::Debug for SortedKeyedList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.elements.iter()).finish()
    }
}

impl<E: Keyed + Clone> Clone for SortedKeyedList<E> {
    fn clone(&self) -> Self {
        Self {
            elements: self.elements.clone(),
            comparator: Arc::clone(&self.comparator),
        }
    }
}

impl<'a, E: Keyed> IntoIterator for &'a SortedKeyedList<E> {
    type Item = &'a E;
    type IntoIter = slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

/// Borrowed view over the keys of a [`SortedKeyedList`].
///
/// The view reads through to the backing list; it holds no copy of the keys.
pub struct KeySet<'a, E: Keyed> {
    list: &'a SortedKeyedList<E>,
}

impl<'a, E: Keyed> KeySet<'a, E> {
    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn contains(&self, key: &E::Key) -> bool {
        self.list.contains_key(key)
    }

    pub fn get(&self, index: usize) -> Option<&'a E::Key> {
        self.list.elements.get(index).map(Keyed::key)
    }

    pub fn iter(&self) -> Keys<'a, E> {
        Keys {
            inner: self.list.elements.iter(),
        }
    }
}

impl<'a, E: Keyed> IntoIterator for KeySet<'a, E> {
    type Item = &'a E::Key;
    type IntoIter = Keys<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the keys of a [`SortedKeyedList`], in sorted order.
pub struct Keys<'a, E: Keyed> {
    inner: slice::Iter<'a, E>,
}

impl<'a, E: Keyed> Iterator for Keys<'a, E> {
    type Item = &'a E::Key;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(Keyed::key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<E: Keyed> DoubleEndedIterator for Keys<'_, E> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(Keyed::key)
    }
}

impl<E: Keyed> ExactSizeIterator for Keys<'_, E> {}

impl<E: Keyed> FusedIterator for Keys<'_, E> {}
