//! Error types for the keyed collections.

use thiserror::Error;

/// Result type for keyed collection operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised by [`SortedKeyedList`](super::SortedKeyedList) mutations and queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A different element with the same key is already stored
    #[error("Element with same key already exists in list (index {index})")]
    DuplicateKey { index: usize },

    /// The caller-supplied index does not match the sorted position of the element
    #[error("Wrong index {index} given for element")]
    InvalidIndex { index: usize },

    /// First/last key requested from an empty collection
    #[error("Collection is empty")]
    EmptyCollection,
}
