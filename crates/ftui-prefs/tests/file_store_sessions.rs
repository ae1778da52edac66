//! File-backed bindings: values survive reopening the document, and
//! `reload()` carries another writer's changes into live bindings.

#![cfg(feature = "file-store")]

use ftui_prefs::{
    FileStore, IntTagCodec, IntTagged, JsonCodec, RawValue, Storable, Store, StoredBinding,
    StrTagCodec, StrTagged,
};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Density {
    Compact,
    Cozy,
}

impl IntTagged for Density {
    fn tag(&self) -> i64 {
        match self {
            Self::Compact => 0,
            Self::Cozy => 1,
        }
    }

    fn from_tag(tag: i64) -> Option<Self> {
        match tag {
            0 => Some(Self::Compact),
            1 => Some(Self::Cozy),
            _ => None,
        }
    }
}

impl Storable for Density {
    type Codec = IntTagCodec<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Theme {
    Light,
    Dark,
}

impl StrTagged for Theme {
    fn tag(&self) -> &str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }
}

impl Storable for Theme {
    type Codec = StrTagCodec<Self>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Point {
    x: i32,
    y: i32,
}

impl Storable for Point {
    type Codec = JsonCodec<Self>;
}

#[test]
fn file_store_round_trip_across_sessions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prefs.json");

    {
        let store = FileStore::open_path(&path).unwrap();
        let theme = StoredBinding::new("theme", Theme::Light, store.clone()).unwrap();
        let density = StoredBinding::new("density", Density::Compact, store.clone()).unwrap();
        let origin = StoredBinding::new("origin", Point { x: 0, y: 0 }, store).unwrap();
        theme.set(Theme::Dark).unwrap();
        density.set(Density::Cozy).unwrap();
        origin.set(Point { x: 7, y: 8 }).unwrap();
    }

    let store = FileStore::open_path(&path).unwrap();
    let theme = StoredBinding::new("theme", Theme::Light, store.clone()).unwrap();
    let density = StoredBinding::new("density", Density::Compact, store.clone()).unwrap();
    let origin = StoredBinding::new("origin", Point { x: 0, y: 0 }, store).unwrap();
    assert_eq!(theme.get(), Theme::Dark);
    assert_eq!(density.get(), Density::Cozy);
    assert_eq!(origin.get(), Point { x: 7, y: 8 });
}

#[test]
fn file_store_reload_propagates_other_writer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prefs.json");

    let ours = FileStore::open_path(&path).unwrap();
    let theme = StoredBinding::new("theme", Theme::Light, ours.clone()).unwrap();

    let theirs = FileStore::open_path(&path).unwrap();
    theirs.set("theme", RawValue::from("dark")).unwrap();
    assert_eq!(theme.get(), Theme::Light);

    assert_eq!(ours.reload().unwrap(), 1);
    assert_eq!(theme.get(), Theme::Dark);

    theirs.remove("theme").unwrap();
    ours.reload().unwrap();
    assert_eq!(theme.get(), Theme::Light);
}

#[test]
fn file_store_corrupt_entry_is_rewritten() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prefs.json");
    std::fs::write(
        &path,
        br#"{"format_version":1,"entries":{"density":{"type":"string","value":"wide"}}}"#,
    )
    .unwrap();

    let store = FileStore::open_path(&path).unwrap();
    let density = StoredBinding::new("density", Density::Compact, store).unwrap();
    assert_eq!(density.get(), Density::Compact);

    let reopened = FileStore::open_path(&path).unwrap();
    assert_eq!(reopened.get("density"), Some(RawValue::Int(0)));
}
