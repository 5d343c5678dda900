use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use tunnel_core::keyed::{Keyed, RegistryError, SortedKeyedList};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
}

impl Keyed for Entry {
    type Key = str;

    fn key(&self) -> &str {
        &self.name
    }

    fn is_same(&self, other: &Self) -> bool {
        self == other
    }
}

fn entry(name: &str) -> Entry {
    Entry {
        name: name.to_string(),
    }
}

#[derive(Debug, Clone)]
enum Op {
    Add(String),
    RemoveKey(String),
    RemoveAt(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => "[a-z]{1,3}".prop_map(Op::Add),
        1 => "[a-z]{1,3}".prop_map(Op::RemoveKey),
        1 => (0usize..48).prop_map(Op::RemoveAt),
    ]
}

proptest! {
    #[test]
    fn keys_stay_sorted_and_unique(names in proptest::collection::vec("[a-z]{1,4}", 0..64)) {
        let mut list = SortedKeyedList::<Entry>::natural();
        for name in &names {
            let existed = list.contains_key(name.as_str());
            let added = list.add(entry(name)).unwrap();
            prop_assert_eq!(added, !existed);

            let keys: Vec<&str> = list.key_set().iter().collect();
            prop_assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn index_of_key_matches_linear_scan(
        ops in proptest::collection::vec(op(), 0..64),
        lookup in "[a-z]{1,3}",
    ) {
        let mut list = SortedKeyedList::<Entry>::natural();
        let mut model = BTreeSet::new();
        for op in ops {
            match op {
                Op::Add(name) => {
                    list.add(entry(&name)).unwrap();
                    model.insert(name);
                }
                Op::RemoveKey(name) => {
                    let removed = list.remove_key(name.as_str());
                    prop_assert_eq!(removed.is_some(), model.remove(&name));
                }
                Op::RemoveAt(index) => match list.remove(index) {
                    Ok(removed) => {
                        prop_assert!(model.remove(&removed.name));
                    }
                    Err(RegistryError::InvalidIndex { .. }) => {
                        prop_assert!(index >= model.len());
                    }
                    Err(other) => {
                        prop_assert!(false, "unexpected {:?}", other);
                    }
                },
            }

            let keys: Vec<&str> = list.key_set().iter().collect();
            let expected: Vec<&str> = model.iter().map(String::as_str).collect();
            prop_assert_eq!(keys, expected);

            let linear = list.iter().position(|e| e.name == lookup);
            prop_assert_eq!(list.index_of_key(lookup.as_str()), linear);
            prop_assert_eq!(list.last_index_of_key(lookup.as_str()), linear);
            prop_assert_eq!(list.contains_key(lookup.as_str()), linear.is_some());
        }
    }

    #[test]
    fn insert_only_accepts_the_insertion_point(
        names in proptest::collection::btree_set("[a-z]{1,3}", 0..32),
        candidate in "[a-z]{1,3}",
        index in 0usize..40,
    ) {
        let mut list = SortedKeyedList::<Entry>::natural();
        list.add_all(names.iter().map(|name| entry(name))).unwrap();
        let before = list.len();

        let expected = if names.contains(&candidate) {
            None
        } else {
            Some(names.iter().filter(|name| **name < candidate).count())
        };

        match (list.insert(index, entry(&candidate)), expected) {
            (Ok(()), Some(point)) => {
                prop_assert_eq!(index, point);
                prop_assert_eq!(list.len(), before + 1);
            }
            (Err(RegistryError::InvalidIndex { .. }), Some(point)) => {
                prop_assert_ne!(index, point);
                prop_assert_eq!(list.len(), before);
            }
            (Err(RegistryError::DuplicateKey { .. }), None) => {
                prop_assert_eq!(list.len(), before);
            }
            (result, expected) => {
                prop_assert!(false, "unexpected {:?} for insertion point {:?}", result, expected);
            }
        }
    }
}

#[test]
fn insert_between_existing_keys() {
    let mut list = SortedKeyedList::<Entry>::natural();
    list.add(entry("a")).unwrap();
    list.add(entry("c")).unwrap();

    assert!(matches!(
        list.insert(0, entry("b")),
        Err(RegistryError::InvalidIndex { .. })
    ));
    assert!(matches!(
        list.insert(2, entry("b")),
        Err(RegistryError::InvalidIndex { .. })
    ));
    list.insert(1, entry("b")).unwrap();
    assert_eq!(list.key_set().iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
}

#[test]
fn shared_handles_compare_by_allocation() {
    let mut list = SortedKeyedList::<Arc<Entry>>::natural();
    let wg0 = Arc::new(entry("wg0"));

    assert!(list.add(Arc::clone(&wg0)).unwrap());
    assert!(!list.add(Arc::clone(&wg0)).unwrap());
    assert!(matches!(
        list.add(Arc::new(entry("wg0"))),
        Err(RegistryError::DuplicateKey { index: 0 })
    ));
    assert_eq!(list.len(), 1);
}
