use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dialogue_builder::console::command_interface::{execute_command, tokenize};
use dialogue_builder::graph_utils::graph::{Conversation, HandlePosition, Npc, Position};
use dialogue_builder::graph_utils::seed::seed_npcs;
use dialogue_builder::ids::counter_store::{CounterStore, Counters};
use dialogue_builder::ids::scanner::{NPC_SNAPSHOT_KEY, scan_entity_ids, scan_node_ids};
use dialogue_builder::ids::{IdAllocator, IdGenerator, IdKind, SharedAllocator, spawn_periodic_rescan};
use dialogue_builder::persistence::database::{FileNpcDatabase, MemoryNpcDatabase, NpcTable};
use dialogue_builder::persistence::error::{ImportError, StoreError};
use dialogue_builder::persistence::kv_store::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
use dialogue_builder::persistence::persist::{PersistenceService, export_file_name};
use dialogue_builder::session::EditorSession;

struct UnreachableTable;

impl NpcTable for UnreachableTable {
    fn all(&self) -> Result<Vec<Npc>, StoreError> {
        Err(StoreError::Unavailable("database offline".into()))
    }
    fn replace_all(&self, _npcs: &[Npc]) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".into()))
    }
}

struct UnreachableKv;

impl KeyValueStore for UnreachableKv {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("storage disabled".into()))
    }
    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("storage disabled".into()))
    }
    fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("storage disabled".into()))
    }
}

fn memory_stores() -> (Arc<dyn KeyValueStore>, Arc<dyn NpcTable>) {
    (Arc::new(MemoryKeyValueStore::new()), Arc::new(MemoryNpcDatabase::new()))
}

fn npc_with_conversations(id: &str, conv_ids: &[&str]) -> Npc {
    let mut npc = Npc::new(id.to_string(), format!("NPC {}", id));
    for conv in conv_ids {
        npc.add_conversation(conv.to_string(), "Talk");
    }
    npc
}

fn service_over(db: Arc<dyn NpcTable>, kv: Arc<dyn KeyValueStore>) -> PersistenceService {
    PersistenceService::new(db, kv, std::env::temp_dir().join("dialogue-builder-test-backups"))
}

// ---- dialogue model ----

#[test]
fn conversation_remove_node_cascades_edges() {
    let mut conv = Conversation::new("conv-1".into(), "Greeting");
    conv.add_node("10".into(), "Hello", Position::default());
    conv.add_node("11".into(), "Hi", Position::default());
    conv.add_node("12".into(), "Bye", Position::default());
    assert_eq!(conv.connect("10", "11").as_deref(), Some("e10-11"));
    assert!(conv.connect("11", "12").is_some());

    assert!(conv.remove_node("11"));
    assert_eq!(conv.node_count(), 2);
    assert_eq!(conv.edge_count(), 0, "edges touching the removed node go too");
    assert!(!conv.remove_node("11"));
}

#[test]
fn conversation_connect_missing_endpoints_or_duplicate_fails() {
    let mut conv = Conversation::new("conv-1".into(), "Greeting");
    conv.add_node("10".into(), "Hello", Position::default());
    assert!(conv.connect("10", "99").is_none());
    conv.add_node("11".into(), "Hi", Position::default());
    assert!(conv.connect("10", "11").is_some());
    assert!(conv.connect("10", "11").is_none(), "duplicate edge");
    assert!(conv.disconnect("e10-11"));
    assert!(!conv.disconnect("e10-11"));
}

#[test]
fn node_json_is_camel_case_and_keeps_unknown_data() {
    let text = r#"{
        "id": "npc-3",
        "name": "Smith",
        "imageData": "data:image/png;base64,AAAA",
        "conversations": [{
            "id": "conv-5",
            "name": "Trade",
            "nodes": [{
                "id": "14",
                "type": "input",
                "data": { "label": "Need a blade?", "className": "npc-line", "speaker": "Smith" },
                "position": { "x": 10.0, "y": 20.5 },
                "sourcePosition": "bottom",
                "targetPosition": "top"
            }]
        }]
    }"#;
    let npc: Npc = serde_json::from_str(text).unwrap();
    let conv = npc.conversation("conv-5").unwrap();
    assert!(conv.edges.is_empty());
    let node = conv.node("14").unwrap();
    assert_eq!(node.kind.as_deref(), Some("input"));
    assert_eq!(node.label(), "Need a blade?");
    assert_eq!(node.data.class_name.as_deref(), Some("npc-line"));
    assert_eq!(node.source_position, HandlePosition::Bottom);
    assert_eq!(node.position, Position::new(10.0, 20.5));

    let back = serde_json::to_value(&npc).unwrap();
    assert_eq!(back["imageData"], "data:image/png;base64,AAAA");
    let node_json = &back["conversations"][0]["nodes"][0];
    assert_eq!(node_json["data"]["speaker"], "Smith");
    assert_eq!(node_json["targetPosition"], "top");
}

#[test]
fn node_and_edge_keep_editor_fields_they_dont_model() {
    let text = r#"{
        "id": "conv-2",
        "name": "Quest",
        "nodes": [
            { "id": "11", "data": { "label": "Hi" }, "width": 150, "height": 40, "style": { "border": "1px" } },
            { "id": "12", "data": { "label": "Bye" } }
        ],
        "edges": [{ "id": "e11-12", "source": "11", "target": "12", "type": "smoothstep", "sourceHandle": "a" }]
    }"#;
    let conv: Conversation = serde_json::from_str(text).unwrap();
    assert_eq!(conv.node("11").unwrap().extra["width"], 150);
    assert!(conv.node("12").unwrap().extra.is_empty());

    let back = serde_json::to_value(&conv).unwrap();
    assert_eq!(back["nodes"][0]["height"], 40);
    assert_eq!(back["nodes"][0]["style"]["border"], "1px");
    assert_eq!(back["edges"][0]["type"], "smoothstep");
    assert_eq!(back["edges"][0]["sourceHandle"], "a");
    assert!(back["nodes"][1].get("width").is_none());
}

#[test]
fn seed_node_ids_stay_below_node_counter_start() {
    let seed = seed_npcs();
    let found = scan_node_ids(&seed);
    assert!(!found.node.is_empty());
    for id in found.node {
        let n: u64 = id.parse().unwrap();
        assert!(n < IdKind::Node.default_counter());
    }
}

// ---- id allocation ----

#[test]
fn allocator_node_ids_are_distinct_and_avoid_known_ids() {
    let (kv, db) = memory_stores();
    let mut state = vec![npc_with_conversations("npc-1", &["conv-1"])];
    let conv = state[0].conversation_mut("conv-1").unwrap();
    for id in ["10", "25", "abc"] {
        conv.add_node(id.to_string(), "line", Position::default());
    }
    let before: HashSet<String> = ["10", "25", "abc"].iter().map(|s| s.to_string()).collect();

    let mut alloc = IdAllocator::new(kv, db);
    alloc.initialize(&state);
    assert_eq!(alloc.current_node_id(), 26);

    let issued: Vec<String> = (0..50).map(|_| alloc.generate_node_id()).collect();
    let unique: HashSet<&String> = issued.iter().collect();
    assert_eq!(unique.len(), issued.len());
    assert!(issued.iter().all(|id| !before.contains(id)));
    assert_eq!(issued[0], "26");
}

#[test]
fn allocator_npc_ids_match_format_and_never_go_backwards() {
    let (kv, db) = memory_stores();
    let mut alloc = IdAllocator::new(kv, db);
    alloc.initialize(&[]);
    let mut last = 0;
    for _ in 0..20 {
        let id = alloc.generate_npc_id();
        let n = IdKind::Npc.parse(&id).expect("npc-<n> format");
        assert!(id.starts_with("npc-") && id[4..].chars().all(|c| c.is_ascii_digit()));
        assert!(n >= last);
        last = n;
    }
}

#[test]
fn reset_counters_then_node_id_is_ten() {
    let (kv, db) = memory_stores();
    let mut alloc = IdAllocator::new(kv.clone(), db);
    alloc.initialize(&[]);
    alloc.reset_counters();
    assert_eq!(alloc.generate_node_id(), "10");
    assert_eq!(kv.get(IdKind::Node.storage_key()).unwrap().as_deref(), Some("11"));
}

#[test]
fn reset_counters_keeps_known_ids_for_this_process() {
    let (kv, db) = memory_stores();
    let mut alloc = IdAllocator::new(kv, db);
    let first: Vec<String> = (0..3).map(|_| alloc.generate_node_id()).collect();
    assert_eq!(first, vec!["10", "11", "12"]);

    alloc.reset_counters();
    assert_eq!(alloc.current_node_id(), 10);
    assert_eq!(alloc.generate_node_id(), "13");
}

#[test]
fn stored_npc_ids_push_counters_past_them() {
    let (kv, db) = memory_stores();
    db.replace_all(&[
        npc_with_conversations("npc-3", &["conv-2"]),
        npc_with_conversations("npc-7", &["conv-4", "conv-legacy"]),
    ])
    .unwrap();

    let mut alloc = IdAllocator::new(kv, db);
    alloc.initialize(&[]);
    assert_eq!(alloc.generate_npc_id(), "npc-8");
    assert_eq!(alloc.generate_conversation_id(), "conv-5");

    let stats = alloc.id_stats();
    assert!(stats.initialized);
    assert_eq!(stats.known_npc_ids, 3);
    // conv-legacy is known but never moved the counter
    assert_eq!(stats.known_conv_ids, 4);
}

#[test]
fn counters_survive_a_restart() {
    let (kv, db) = memory_stores();
    {
        let mut alloc = IdAllocator::new(kv.clone(), db.clone());
        alloc.generate_node_id();
        alloc.generate_node_id();
        alloc.generate_conversation_id();
    }
    let mut alloc = IdAllocator::new(kv, db);
    alloc.initialize(&[]);
    assert_eq!(alloc.current_node_id(), 12);
    assert_eq!(alloc.generate_conversation_id(), "conv-2");
}

#[test]
fn initialize_twice_rescans_without_reloading() {
    let (kv, db) = memory_stores();
    let mut alloc = IdAllocator::new(kv.clone(), db);
    alloc.initialize(&[]);
    // Written behind the allocator's back; a rescan must not reload it
    kv.set(IdKind::Npc.storage_key(), "40").unwrap();

    let mut state = vec![npc_with_conversations("npc-12", &[])];
    state[0].add_conversation("conv-3".into(), "Later");
    alloc.initialize(&state);
    assert_eq!(alloc.current_npc_id(), 13);
    assert_eq!(alloc.current_conv_id(), 4);
}

#[test]
fn entity_scan_falls_back_to_snapshot_cache() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
    kv.set(
        NPC_SNAPSHOT_KEY,
        r#"[{"id":"npc-4","conversations":[{"id":"conv-9"}]}, 17, {"name":"no id"}]"#,
    )
    .unwrap();
    let found = scan_entity_ids(&UnreachableTable, kv.as_ref()).unwrap();
    assert_eq!(found.npc, vec!["npc-4"]);
    assert_eq!(found.conv, vec!["conv-9"]);

    let mut alloc = IdAllocator::new(kv, Arc::new(UnreachableTable));
    assert_eq!(alloc.generate_npc_id(), "npc-5");
    assert_eq!(alloc.generate_conversation_id(), "conv-10");
}

#[test]
fn entity_scan_with_malformed_snapshot_is_an_error_not_a_panic() {
    let kv = MemoryKeyValueStore::new();
    kv.set(NPC_SNAPSHOT_KEY, "{ not json").unwrap();
    assert!(matches!(scan_entity_ids(&UnreachableTable, &kv), Err(StoreError::Malformed(_))));
}

#[test]
fn allocator_keeps_working_without_any_storage() {
    let mut alloc = IdAllocator::new(Arc::new(UnreachableKv), Arc::new(UnreachableTable));
    alloc.initialize(&[]);
    assert_eq!(alloc.generate_node_id(), "10");
    assert_eq!(alloc.generate_node_id(), "11");
    assert_eq!(alloc.generate_npc_id(), "npc-1");
    alloc.reset_counters();
    assert!(alloc.id_stats().initialized);
}

#[test]
fn exhausted_counter_issues_distinct_ids_without_panicking() {
    let (kv, db) = memory_stores();
    let mut state = vec![npc_with_conversations("npc-18446744073709551615", &["conv-1"])];
    state[0]
        .conversation_mut("conv-1")
        .unwrap()
        .add_node(u64::MAX.to_string(), "far away", Position::default());

    let mut alloc = IdAllocator::new(kv, db);
    alloc.initialize(&state);
    assert_eq!(alloc.current_node_id(), u64::MAX);

    let first = alloc.generate_node_id();
    let second = alloc.generate_node_id();
    assert_ne!(first, second);
    assert_ne!(first, u64::MAX.to_string());
    assert_eq!(alloc.current_node_id(), u64::MAX);

    let npc = alloc.generate_npc_id();
    assert!(npc.starts_with("npc-18446744073709551615-"));
}

#[tokio::test(start_paused = true)]
async fn periodic_rescan_picks_up_ids_written_elsewhere() {
    let (kv, db) = memory_stores();
    let shared = SharedAllocator::new(IdAllocator::new(kv, db.clone()));
    shared.initialize(&[]);
    assert_eq!(shared.lock().current_npc_id(), 1);

    let task = spawn_periodic_rescan(shared.clone(), Duration::from_secs(30), &tokio::runtime::Handle::current());
    db.replace_all(&[npc_with_conversations("npc-20", &["conv-4"])]).unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(shared.lock().current_npc_id(), 1, "no rescan before the interval");

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(shared.lock().current_npc_id(), 21);
    assert_eq!(shared.lock().current_conv_id(), 5);
    task.abort();
}

#[test]
fn shared_allocator_hands_out_ids_through_the_trait() {
    let (kv, db) = memory_stores();
    let shared = SharedAllocator::new(IdAllocator::new(kv, db));
    let generator: &dyn IdGenerator = &shared;
    assert_eq!(generator.next_node_id(), "10");
    assert_eq!(shared.clone().next_node_id(), "11");
    assert_eq!(shared.id_stats().known_node_ids, 2);
}

// ---- counter store ----

#[test]
fn counter_store_keeps_defaults_for_bad_values() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
    kv.set(IdKind::Node.storage_key(), "not-a-number").unwrap();
    kv.set(IdKind::Npc.storage_key(), " 5 ").unwrap();
    let counters = CounterStore::new(kv).load().unwrap();
    assert_eq!(counters, Counters { node: 10, npc: 5, conv: 1 });
}

#[test]
fn counter_store_save_never_lowers_stored_values() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
    kv.set(IdKind::Node.storage_key(), "50").unwrap();
    let store = CounterStore::new(kv.clone());

    let mut counters = Counters { node: 12, npc: 3, conv: 1 };
    store.save(&mut counters).unwrap();
    assert_eq!(counters.node, 50);
    assert_eq!(kv.get(IdKind::Node.storage_key()).unwrap().as_deref(), Some("50"));
    assert_eq!(kv.get(IdKind::Npc.storage_key()).unwrap().as_deref(), Some("3"));

    let reset = store.reset().unwrap();
    assert_eq!(reset, Counters::default());
    assert_eq!(kv.get(IdKind::Node.storage_key()).unwrap().as_deref(), Some("10"));
}

#[test]
fn file_kv_store_round_trips_and_reports_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local_storage.json");
    let kv = FileKeyValueStore::new(&path);
    assert_eq!(kv.get("missing").unwrap(), None);
    kv.set("a", "1").unwrap();
    kv.set("b", "2").unwrap();
    kv.remove("a").unwrap();
    assert_eq!(FileKeyValueStore::new(&path).get("b").unwrap().as_deref(), Some("2"));
    assert_eq!(kv.get("a").unwrap(), None);

    std::fs::write(&path, "[1, 2").unwrap();
    assert!(kv.get("b").is_err());
}

// ---- persistence service ----

#[test]
fn load_all_falls_back_to_seed_data() {
    let (kv, db) = memory_stores();
    assert_eq!(service_over(db, kv.clone()).load_all(), seed_npcs());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("npcs.json");
    std::fs::write(&path, "garbage").unwrap();
    let corrupt = service_over(Arc::new(FileNpcDatabase::new(&path)), kv);
    assert_eq!(corrupt.load_all(), seed_npcs());
}

#[test]
fn save_all_replaces_collection_and_refreshes_snapshot() {
    let (kv, db) = memory_stores();
    let service = service_over(db.clone(), kv.clone());
    service.save_all(&[npc_with_conversations("npc-1", &[]), npc_with_conversations("npc-2", &[])]).unwrap();
    service.save_all(&[npc_with_conversations("npc-5", &["conv-1"])]).unwrap();

    let stored = db.all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, "npc-5");
    let snapshot = kv.get(NPC_SNAPSHOT_KEY).unwrap().unwrap();
    assert!(snapshot.contains("npc-5") && !snapshot.contains("npc-2"));
}

#[test]
fn save_all_propagates_database_failure() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
    let service = service_over(Arc::new(UnreachableTable), kv);
    assert!(service.save_all(&seed_npcs()).is_err());
}

#[test]
fn file_database_collapses_duplicate_ids() {
    let dir = tempfile::tempdir().unwrap();
    let db = FileNpcDatabase::new(dir.path().join("npcs.json"));
    let mut replacement = npc_with_conversations("npc-1", &[]);
    replacement.name = "Second".into();
    db.replace_all(&[npc_with_conversations("npc-1", &[]), npc_with_conversations("npc-2", &[]), replacement])
        .unwrap();

    let stored = db.all().unwrap();
    let ids: Vec<&str> = stored.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["npc-1", "npc-2"]);
    assert_eq!(stored[0].name, "Second");
    assert!(!dir.path().join("npcs.json.tmp").exists());
}

#[test]
fn import_rejects_non_array_and_leaves_store_alone() {
    let (kv, db) = memory_stores();
    let service = service_over(db.clone(), kv);
    service.save_all(&[npc_with_conversations("npc-2", &[])]).unwrap();

    assert!(!service.import_from_text(r#"{"not":"an array"}"#));
    assert!(!service.import_from_text("not json at all"));
    assert!(!service.import_from_text(r#"[{"id":"npc-1","name":"A"}]"#));
    assert!(!service.import_from_text(r#"[{"id":1,"name":"A","conversations":[]}]"#));

    let stored = db.all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, "npc-2");
}

#[test]
fn import_reports_which_entry_is_wrong() {
    let (kv, db) = memory_stores();
    let service = service_over(db, kv);
    let err = service
        .try_import_from_text(r#"[{"id":"npc-1","name":"A","conversations":[]}, {"id":"npc-2","conversations":[]}]"#)
        .unwrap_err();
    assert!(matches!(err, ImportError::InvalidEntry { index: 1, .. }));
    assert!(matches!(service.try_import_from_text("{}").unwrap_err(), ImportError::NotAnArray));
}

#[test]
fn import_accepts_conversations_with_only_an_id() {
    let (kv, db) = memory_stores();
    let service = service_over(db.clone(), kv);
    let count = service
        .try_import_from_text(r#"[{"id":"npc-1","name":"A","conversations":[{"id":"conv-1","nodes":[]}]}]"#)
        .unwrap();
    assert_eq!(count, 1);
    let stored = db.all().unwrap();
    assert_eq!(stored[0].conversations[0].id, "conv-1");
    assert_eq!(stored[0].conversations[0].name, "");
}

#[test]
fn import_with_mistyped_nested_field_is_a_format_error() {
    let (kv, db) = memory_stores();
    let service = service_over(db.clone(), kv);
    let err = service
        .try_import_from_text(r#"[{"id":"npc-1","name":"A","conversations":[{"id":"conv-1","nodes":[5]}]}]"#)
        .unwrap_err();
    assert!(matches!(err, ImportError::Shape(_)));
    assert!(err.to_string().starts_with("invalid format"));
    assert!(db.all().unwrap().is_empty());
}

#[test]
fn import_single_npc_replaces_everything() {
    let (kv, db) = memory_stores();
    let service = service_over(db.clone(), kv);
    service.save_all(&seed_npcs()).unwrap();

    assert!(service.import_from_text(r#"[{"id":"npc-1","name":"A","conversations":[]}]"#));
    let stored = db.all().unwrap();
    assert_eq!(stored, vec![Npc::new("npc-1".into(), "A")]);
}

#[test]
fn export_then_import_leaves_collection_unchanged() {
    let (kv, db) = memory_stores();
    let service = service_over(db, kv);
    let mut npcs = seed_npcs();
    npcs.push(npc_with_conversations("npc-2", &["conv-2", "conv-3"]));
    service.save_all(&npcs).unwrap();

    let before = service.load_all();
    let text = service.export_as_text().unwrap();
    assert!(text.contains('\n'), "export is pretty-printed");
    assert!(service.import_from_text(&text));
    assert_eq!(service.load_all(), before);
}

#[test]
fn export_to_dir_and_import_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let (kv, db) = memory_stores();
    let service = service_over(db, kv);
    service.save_all(&[npc_with_conversations("npc-3", &["conv-1"])]).unwrap();

    let path = service.export_to_dir(dir.path()).unwrap();
    let name = path.file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("dialogue-builder-export-") && name.ends_with(".json"));
    assert_eq!(service.import_from_path(&path).unwrap(), 1);

    let txt = dir.path().join("notes.txt");
    std::fs::write(&txt, "[]").unwrap();
    assert!(matches!(service.import_from_path(&txt), Err(ImportError::NotJsonFile(_))));
    assert!(service.import_from_path(Path::new("/definitely/missing.json")).is_err());
}

#[test]
fn export_file_name_uses_iso_date() {
    let when = time::macros::datetime!(2024-03-05 10:30 UTC);
    assert_eq!(export_file_name(when), "dialogue-builder-export-2024-03-05.json");
}

// ---- editor session ----

#[test]
fn session_allocates_around_seed_data() {
    let (kv, db) = memory_stores();
    let mut session = EditorSession::with_stores(kv, db, std::env::temp_dir());
    assert_eq!(session.npcs().len(), 1);

    let npc = session.create_npc("Old Tom");
    assert_eq!(npc, "npc-2");
    let conv = session.create_conversation(&npc, "Rumours").unwrap();
    assert_eq!(conv, "conv-2");
    let a = session.add_node(&npc, &conv, "Heard about the mill?", None).unwrap();
    let b = session.add_node(&npc, &conv, "No, tell me.", Some(Position::new(5.0, 5.0))).unwrap();
    assert_eq!((a.as_str(), b.as_str()), ("10", "11"));
    assert_eq!(session.connect(&npc, &conv, &a, &b).unwrap(), "e10-11");

    assert!(session.create_conversation("npc-99", "Nope").is_err());
    assert_eq!(session.id_stats().conv_counter, 3, "failed create doesn't burn an id");
}

#[test]
fn session_reset_all_backs_up_and_clears() {
    let dir = tempfile::tempdir().unwrap();
    let kv: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(dir.path().join("local_storage.json")));
    let db_path = dir.path().join("npcs.json");
    let db: Arc<dyn NpcTable> = Arc::new(FileNpcDatabase::new(&db_path));
    let mut session = EditorSession::with_stores(kv.clone(), db, dir.path().join("backups"));

    let npc = session.create_npc("Guard");
    let conv = session.create_conversation(&npc, "Halt").unwrap();
    for _ in 0..5 {
        session.add_node(&npc, &conv, "Halt!", None).unwrap();
    }
    session.save().unwrap();

    let backup = session.reset_all().unwrap().expect("non-empty data is backed up");
    assert!(backup.exists());
    assert_eq!(session.service().list_versions().unwrap(), vec![backup]);
    assert!(FileNpcDatabase::new(&db_path).all().unwrap().is_empty());
    assert_eq!(kv.get(NPC_SNAPSHOT_KEY).unwrap(), None);
    assert_eq!(session.npcs(), seed_npcs().as_slice());
    assert_eq!(session.id_stats().node_counter, 10);
}

// ---- console ----

#[test]
fn tokenize_keeps_quoted_words_together() {
    assert_eq!(tokenize(r#"npc add "Old Tom""#).unwrap(), vec!["npc", "add", "Old Tom"]);
    assert_eq!(tokenize(r#"node label a b 1 "say \"hi\"""#).unwrap()[5], r#"say "hi""#);
    assert_eq!(tokenize(r#"x """#).unwrap(), vec!["x", ""]);
    assert!(tokenize(r#"npc add "Old"#).is_err());
}

#[test]
fn console_commands_edit_the_session() {
    let (kv, db) = memory_stores();
    let mut session = EditorSession::with_stores(kv, db, std::env::temp_dir());

    let out = execute_command(&mut session, r#"npc add "Old Tom""#).unwrap();
    assert!(out.mutated);
    assert_eq!(out.lines, vec!["created npc-2"]);
    execute_command(&mut session, "conv add npc-2 Rumours").unwrap();
    execute_command(&mut session, r#"node add npc-2 conv-2 "First line" 0 0"#).unwrap();
    execute_command(&mut session, r#"node add npc-2 conv-2 "Second line""#).unwrap();
    let linked = execute_command(&mut session, "link npc-2 conv-2 10 11").unwrap();
    assert_eq!(linked.lines, vec!["created edge e10-11"]);

    let shown = execute_command(&mut session, "show npc-2").unwrap();
    assert!(!shown.mutated);
    assert!(shown.lines.iter().any(|l| l.contains("e10-11: 10 -> 11")));

    assert!(execute_command(&mut session, "node add npc-2 conv-2 label 5").is_err());
    assert!(execute_command(&mut session, "frobnicate").is_err());
    assert!(execute_command(&mut session, "npc rm npc-42").is_err());
}
