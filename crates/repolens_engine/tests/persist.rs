use pretty_assertions::assert_eq;
use tempfile::tempdir;

use repolens_core::{ContextItem, ContextMap};
use repolens_engine::{AtomicFileWriter, ContextStore};

fn item(filename: &str, content: &str) -> ContextItem {
    ContextItem {
        id: None,
        filename: filename.to_string(),
        content: content.to_string(),
        score: None,
    }
}

#[test]
fn missing_cache_reads_as_empty() {
    let dir = tempdir().expect("tempdir");
    let store = ContextStore::new(dir.path().to_path_buf());
    let map = store.load("conv-1").expect("load");
    assert!(map.is_empty());
}

#[test]
fn round_trip_through_the_store() {
    let dir = tempdir().expect("tempdir");
    let store = ContextStore::new(dir.path().to_path_buf());

    let mut map = ContextMap::new();
    map.insert("m-1".to_string(), vec![item("a.rs", "alpha")]);
    store.merge_write("conv-1", &map).expect("write");

    assert_eq!(store.load("conv-1").expect("load"), map);
}

#[test]
fn merge_preserves_entries_for_other_messages() {
    let dir = tempdir().expect("tempdir");
    let store = ContextStore::new(dir.path().to_path_buf());

    let mut first = ContextMap::new();
    first.insert("m-1".to_string(), vec![item("a.rs", "alpha")]);
    store.merge_write("conv-1", &first).expect("write");

    // A later writer that only knows about m-2 must not clobber m-1.
    let mut second = ContextMap::new();
    second.insert("m-2".to_string(), vec![item("b.rs", "beta")]);
    store.merge_write("conv-1", &second).expect("write");

    let merged = store.load("conv-1").expect("load");
    assert_eq!(merged.len(), 2);
    assert_eq!(merged["m-1"][0].content, "alpha");
    assert_eq!(merged["m-2"][0].content, "beta");
}

#[test]
fn rewrite_wins_per_message_id() {
    let dir = tempdir().expect("tempdir");
    let store = ContextStore::new(dir.path().to_path_buf());

    let mut map = ContextMap::new();
    map.insert("m-1".to_string(), vec![item("a.rs", "old")]);
    store.merge_write("conv-1", &map).expect("write");

    map.insert("m-1".to_string(), vec![item("a.rs", "new")]);
    store.merge_write("conv-1", &map).expect("write");

    let loaded = store.load("conv-1").expect("load");
    assert_eq!(loaded["m-1"][0].content, "new");
}

#[test]
fn conversations_get_separate_files() {
    let dir = tempdir().expect("tempdir");
    let store = ContextStore::new(dir.path().to_path_buf());

    let mut map = ContextMap::new();
    map.insert("m-1".to_string(), vec![item("a.rs", "alpha")]);
    store.merge_write("conv-1", &map).expect("write");

    assert!(store.load("conv-2").expect("load").is_empty());
}

#[test]
fn hostile_conversation_ids_stay_inside_the_cache_dir() {
    let dir = tempdir().expect("tempdir");
    let store = ContextStore::new(dir.path().to_path_buf());

    let mut map = ContextMap::new();
    map.insert("m-1".to_string(), vec![item("a.rs", "alpha")]);
    store.merge_write("../escape", &map).expect("write");

    // The write landed inside the cache dir under a defanged name.
    assert!(dir.path().join("___escape.json").exists());
    assert_eq!(store.load("../escape").expect("load"), map);
}

#[test]
fn atomic_writer_replaces_existing_content() {
    let dir = tempdir().expect("tempdir");
    let writer = AtomicFileWriter::new(dir.path().to_path_buf());

    writer.write("state.json", "first").expect("write");
    let path = writer.write("state.json", "second").expect("rewrite");

    assert_eq!(std::fs::read_to_string(path).expect("read"), "second");
    // No temp files left behind.
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read_dir")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("state.json")]);
}
