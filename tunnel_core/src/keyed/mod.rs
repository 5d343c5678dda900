//! Key-unique, sorted collections.
//!
//! [`SortedKeyedList`] keeps elements ordered by a caller-supplied comparator
//! over their keys and rejects duplicate keys. [`ObservableSortedKeyedList`]
//! adds change notification for observers such as a tunnel list view.

mod error;
mod list;
mod observable;

pub use error::{RegistryError, RegistryResult};
pub use list::{Comparator, KeySet, Keyed, Keys, SortedKeyedList};
pub use observable::{ListChange, ObservableSortedKeyedList};
