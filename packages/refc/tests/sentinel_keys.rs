//! Exercises handle hashing and the reserved sentinel keys against a real
//! hash map, the way external hash-table adapters consume them.

use foldhash::{HashMap, HashMapExt};
use refc::{Refc, refc_factory};

refc_factory! {
    /// Allocates the map-key payloads.
    struct KeyFactory(u32);
}

#[test]
fn live_handles_key_a_map_by_cell_identity() {
    let factory = KeyFactory::new();

    let first = factory.create(1_u32);
    let second = factory.create(2_u32);

    let mut map: HashMap<Refc<u32>, &str> = HashMap::new();
    map.insert(first.clone(), "first");
    map.insert(second.clone(), "second");

    assert_eq!(map.get(&first), Some(&"first"));
    assert_eq!(map.get(&second), Some(&"second"));

    // A distinct cell with an equal payload is a different key.
    let look_alike = factory.create(1_u32);
    assert_eq!(map.get(&look_alike), None);
}

#[test]
fn sentinels_are_usable_as_reserved_keys() {
    let factory = KeyFactory::new();
    let live = factory.create(3_u32);

    let mut map: HashMap<Refc<u32>, &str> = HashMap::new();
    map.insert(Refc::empty_key(), "empty");
    map.insert(Refc::tombstone_key(), "tombstone");
    map.insert(Refc::null(), "null");
    map.insert(live.clone(), "live");

    // Four distinct identities, four distinct slots.
    assert_eq!(map.len(), 4);
    assert_eq!(map.get(&Refc::empty_key()), Some(&"empty"));
    assert_eq!(map.get(&Refc::tombstone_key()), Some(&"tombstone"));
    assert_eq!(map.get(&Refc::null()), Some(&"null"));
    assert_eq!(map.get(&live), Some(&"live"));
}

#[test]
fn sentinel_protocol_invariants() {
    let factory = KeyFactory::new();
    let live = factory.create(4_u32);

    let empty = Refc::<u32>::empty_key();
    let tombstone = Refc::<u32>::tombstone_key();

    // Each sentinel equals itself and nothing else.
    assert!(empty == Refc::<u32>::empty_key());
    assert!(tombstone == Refc::<u32>::tombstone_key());
    assert!(empty != tombstone);
    assert!(empty != Refc::<u32>::null());
    assert!(tombstone != Refc::<u32>::null());
    assert!(empty != live);
    assert!(tombstone != live);

    // Sentinels and null all test not-live.
    assert!(!empty.is_live());
    assert!(!tombstone.is_live());
    assert!(!Refc::<u32>::null().is_live());
    assert!(live.is_live());
}

#[test]
fn clones_of_one_handle_hash_to_the_same_slot() {
    let factory = KeyFactory::new();

    let original = factory.create(5_u32);
    let clone = original.clone();

    let mut map: HashMap<Refc<u32>, u32> = HashMap::new();
    map.insert(original, 10);

    // The clone is the same key; inserting through it overwrites.
    assert_eq!(map.insert(clone.clone(), 20), Some(10));
    assert_eq!(map.get(&clone), Some(&20));
    assert_eq!(map.len(), 1);
}
