//! Property-based invariants for stored bindings.
//!
//! 1. Any written value reads back unchanged, from the same binding and from a
//!    fresh one.
//! 2. Any entry of the wrong store kind decodes to the default and is
//!    replaced by the encoded default.
//! 3. A sequence of writes notifies each listener once per write, and the
//!    store always matches the last write.
//! 4. A sequence of external writes leaves the cache equal to the decoded
//!    last entry, or the default if it did not decode.

use std::cell::Cell;
use std::rc::Rc;

use ftui_prefs::{Codec, JsonCodec, MemoryStore, RawValue, Store, StoredBinding};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Layout {
    name: String,
    columns: Vec<u16>,
    collapsed: bool,
}

// ── Strategies ────────────────────────────────────────────────────────────

fn layout_strategy() -> impl Strategy<Value = Layout> {
    (
        "[a-z]{0,12}",
        proptest::collection::vec(any::<u16>(), 0..8),
        any::<bool>(),
    )
        .prop_map(|(name, columns, collapsed)| Layout {
            name,
            columns,
            collapsed,
        })
}

/// Entries that can never decode as an `i64`.
fn non_int_raw() -> impl Strategy<Value = RawValue> {
    prop_oneof![
        any::<bool>().prop_map(RawValue::Bool),
        (-1e9f64..1e9).prop_map(RawValue::Float),
        ".*".prop_map(RawValue::String),
        proptest::collection::vec(any::<u8>(), 0..32).prop_map(RawValue::Data),
    ]
}

fn any_raw() -> impl Strategy<Value = RawValue> {
    prop_oneof![any::<i64>().prop_map(RawValue::Int), non_int_raw()]
}

// ── Properties ────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn string_round_trip(value in ".*", default in ".*") {
        let store = MemoryStore::new();
        let binding = StoredBinding::new("s", default.clone(), store.clone()).unwrap();
        binding.set(value.clone()).unwrap();
        prop_assert_eq!(binding.get(), value.clone());
        prop_assert_eq!(StoredBinding::new("s", default, store).unwrap().get(), value);
    }

    #[test]
    fn layout_round_trip(value in layout_strategy(), default in layout_strategy()) {
        let store = MemoryStore::new();
        let binding =
            StoredBinding::with_codec("layout", default.clone(), store.clone(), JsonCodec::new())
                .unwrap();
        binding.set(value.clone()).unwrap();
        prop_assert_eq!(binding.get(), value.clone());
        let fresh =
            StoredBinding::with_codec("layout", default, store, JsonCodec::new()).unwrap();
        prop_assert_eq!(fresh.get(), value);
    }

    #[test]
    fn wrong_kind_falls_back(raw in non_int_raw(), default in any::<i64>()) {
        let store = MemoryStore::with_entries([("n", raw)]);
        let binding = StoredBinding::new("n", default, store.clone()).unwrap();
        prop_assert_eq!(binding.get(), default);
        prop_assert_eq!(store.get("n"), Some(RawValue::Int(default)));
    }

    #[test]
    fn garbage_bytes_fall_back_for_structs(
        bytes in proptest::collection::vec(any::<u8>(), 0..64),
        default in layout_strategy(),
    ) {
        let codec = JsonCodec::<Layout>::new();
        prop_assume!(codec.decode(&RawValue::Data(bytes.clone())).is_none());

        let store = MemoryStore::with_entries([("layout", RawValue::Data(bytes))]);
        let binding =
            StoredBinding::with_codec("layout", default.clone(), store.clone(), JsonCodec::new())
                .unwrap();
        prop_assert_eq!(binding.get(), default.clone());
        prop_assert_eq!(store.get("layout"), Some(codec.encode(&default).unwrap()));
    }

    #[test]
    fn one_notification_per_write(writes in proptest::collection::vec(any::<i64>(), 1..20)) {
        let store = MemoryStore::new();
        let binding = StoredBinding::new("n", 0i64, store.clone()).unwrap();
        let hits = Rc::new(Cell::new(0usize));
        let hits_in = Rc::clone(&hits);
        let _sub = binding.subscribe(move |_| hits_in.set(hits_in.get() + 1));

        for w in &writes {
            binding.set(*w).unwrap();
        }
        let last = *writes.last().unwrap();
        prop_assert_eq!(hits.get(), writes.len());
        prop_assert_eq!(binding.get(), last);
        prop_assert_eq!(store.get("n"), Some(RawValue::Int(last)));
    }

    #[test]
    fn external_writes_converge(
        entries in proptest::collection::vec(any_raw(), 1..20),
        default in any::<i64>(),
    ) {
        let store = MemoryStore::new();
        let binding = StoredBinding::new("n", default, store.clone()).unwrap();
        for raw in &entries {
            store.set("n", raw.clone()).unwrap();
        }
        let expected = entries.last().and_then(RawValue::as_int).unwrap_or(default);
        prop_assert_eq!(binding.get(), expected);
    }
}
