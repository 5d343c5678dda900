//! Change notification layered over [`SortedKeyedList`].
//!
//! Mutations return their result exactly like the plain list and additionally
//! publish a [`ListChange`] to every subscriber. The list itself knows nothing
//! about who is listening.

use std::ops::Deref;

use tokio::sync::broadcast;

use super::error::RegistryResult;
use super::list::{Keyed, SortedKeyedList};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Describes a single successful mutation.
#[derive(Debug, Clone)]
pub enum ListChange<E> {
    Inserted { index: usize, element: E },
    Removed { index: usize, element: E },
    Replaced { index: usize, old: E, new: E },
}

/// A [`SortedKeyedList`] that broadcasts every change to its subscribers.
pub struct ObservableSortedKeyedList<E: Keyed + Clone> {
    inner: SortedKeyedList<E>,
    changes: broadcast::Sender<ListChange<E>>,
}

impl<E: Keyed + Clone> ObservableSortedKeyedList<E> {
    pub fn new(inner: SortedKeyedList<E>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { inner, changes }
    }

    /// Register a new observer. Only changes made after this call are delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<ListChange<E>> {
        self.changes.subscribe()
    }

    fn publish(&self, change: ListChange<E>) {
        // No receivers is not an error.
        let _ = self.changes.send(change);
    }

    pub fn add(&mut self, element: E) -> RegistryResult<bool> {
        let published = element.clone();
        let added = self.inner.add(element)?;
        if added {
            if let Some(index) = self.inner.index_of_key(published.key()) {
                self.publish(ListChange::Inserted {
                    index,
                    element: published,
                });
            }
        }
        Ok(added)
    }

    pub fn insert(&mut self, index: usize, element: E) -> RegistryResult<()> {
        let published = element.clone();
        self.inner.insert(index, element)?;
        self.publish(ListChange::Inserted {
            index,
            element: published,
        });
        Ok(())
    }

    pub fn set(&mut self, index: usize, element: E) -> RegistryResult<E> {
        let published = element.clone();
        let old = self.inner.set(index, element)?;
        self.publish(ListChange::Replaced {
            index,
            old: old.clone(),
            new: published,
        });
        Ok(old)
    }

    pub fn remove(&mut self, index: usize) -> RegistryResult<E> {
        let removed = self.inner.remove(index)?;
        self.publish(ListChange::Removed {
            index,
            element: removed.clone(),
        });
        Ok(removed)
    }

    pub fn remove_key(&mut self, key: &E::Key) -> Option<E> {
        let index = self.inner.index_of_key(key)?;
        self.remove(index).ok()
    }

    /// Remove `element` only if the stored element under its key is that same element.
    pub fn remove_element(&mut self, element: &E) -> Option<E> {
        let index = self.inner.index_of_key(element.key())?;
        if !self.inner.get_index(index)?.is_same(element) {
            return None;
        }
        self.remove(index).ok()
    }
}

impl<E: Keyed + Clone> Deref for ObservableSortedKeyedList<E> {
    type Target = SortedKeyedList<E>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
