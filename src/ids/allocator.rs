use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::counter_store::{CounterStore, Counters};
use super::kind::IdKind;
use super::scanner::{self, DiscoveredIds};
use crate::graph_utils::graph::Npc;
use crate::persistence::database::NpcTable;
use crate::persistence::kv_store::KeyValueStore;

/// Anything that can hand out fresh ids. Callers hold an explicit reference
/// instead of reaching for a process-wide generator.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, kind: IdKind) -> String;

    fn next_node_id(&self) -> String { self.next_id(IdKind::Node) }
    fn next_npc_id(&self) -> String { self.next_id(IdKind::Npc) }
    fn next_conversation_id(&self) -> String { self.next_id(IdKind::Conversation) }
}

/// Snapshot for the diagnostic panel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IdStats {
    pub node_counter: u64,
    pub npc_counter: u64,
    pub conv_counter: u64,
    pub known_node_ids: usize,
    pub known_npc_ids: usize,
    pub known_conv_ids: usize,
    pub initialized: bool,
}

#[derive(Default)]
struct KnownIds {
    node: HashSet<String>,
    npc: HashSet<String>,
    conv: HashSet<String>,
}

impl KnownIds {
    fn get_mut(&mut self, kind: IdKind) -> &mut HashSet<String> {
        match kind {
            IdKind::Node => &mut self.node,
            IdKind::Npc => &mut self.npc,
            IdKind::Conversation => &mut self.conv,
        }
    }
}

/// Issues node, NPC and conversation ids that don't collide with anything
/// already in use, keeping the counters in durable storage.
///
/// None of the public operations fail: storage and scan problems are logged
/// and the allocator carries on with what it has.
pub struct IdAllocator {
    store: CounterStore,
    db: Arc<dyn NpcTable>,
    cache: Arc<dyn KeyValueStore>,
    counters: Counters,
    known: KnownIds,
    initialized: bool,
}

impl IdAllocator {
    /// `kv` holds the counters and the cached NPC snapshot, `db` is the
    /// authoritative NPC table scanned for existing ids.
    pub fn new(kv: Arc<dyn KeyValueStore>, db: Arc<dyn NpcTable>) -> Self {
        Self {
            store: CounterStore::new(kv.clone()),
            db,
            cache: kv,
            counters: Counters::default(),
            known: KnownIds::default(),
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool { self.initialized }

    /// Load counters and scan `state` plus the stores for ids in use.
    ///
    /// On an already initialized allocator this only rescans, picking up ids
    /// created since the last call.
    pub fn initialize(&mut self, state: &[Npc]) {
        if self.initialized {
            self.rescan(state);
            return;
        }
        match self.store.load() {
            Ok(counters) => self.counters = counters,
            Err(e) => warn!("could not load id counters, using defaults: {}", e),
        }
        self.rescan(state);
        self.initialized = true;
        info!(
            "id allocator ready: next node={} npc={} conv={}",
            self.counters.node, self.counters.npc, self.counters.conv
        );
    }

    /// Scan the in-memory state and the entity stores.
    pub fn rescan(&mut self, state: &[Npc]) {
        let in_memory = scanner::scan_state_ids(state);
        self.apply(&in_memory);
        self.rescan_entities();
    }

    /// Scan only the entity stores (database, then snapshot cache).
    pub fn rescan_entities(&mut self) {
        match scanner::scan_entity_ids(self.db.as_ref(), self.cache.as_ref()) {
            Ok(found) => self.apply(&found),
            Err(e) => warn!("entity id scan found nothing usable: {}", e),
        }
    }

    fn apply(&mut self, found: &DiscoveredIds) {
        for id in &found.node {
            self.observe(IdKind::Node, id);
        }
        for id in &found.npc {
            self.observe(IdKind::Npc, id);
        }
        for id in &found.conv {
            self.observe(IdKind::Conversation, id);
        }
    }

    /// Record `id` as taken, raising the counter past it when it is numeric.
    pub fn observe(&mut self, kind: IdKind, id: &str) {
        self.known.get_mut(kind).insert(id.to_string());
        if let Some(n) = kind.parse(id) {
            let counter = self.counters.get_mut(kind);
            if n >= *counter {
                let next = n.saturating_add(1);
                debug!("{:?} id {} is in use, counter {} -> {}", kind, id, counter, next);
                *counter = next;
            }
        }
    }

    pub fn generate(&mut self, kind: IdKind) -> String {
        if !self.initialized {
            self.initialize(&[]);
        }
        let known = self.known.get_mut(kind);
        let counter = self.counters.get_mut(kind);
        let id = loop {
            let candidate = kind.format(*counter);
            let Some(next) = counter.checked_add(1) else {
                break exhausted_id(kind, known);
            };
            *counter = next;
            if known.insert(candidate.clone()) {
                break candidate;
            }
        };
        self.persist();
        id
    }

    pub fn generate_node_id(&mut self) -> String { self.generate(IdKind::Node) }
    pub fn generate_npc_id(&mut self) -> String { self.generate(IdKind::Npc) }
    pub fn generate_conversation_id(&mut self) -> String { self.generate(IdKind::Conversation) }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&mut self.counters) {
            warn!("could not persist id counters: {}", e);
        }
    }

    pub fn current(&self, kind: IdKind) -> u64 { self.counters.get(kind) }
    pub fn current_node_id(&self) -> u64 { self.counters.node }
    pub fn current_npc_id(&self) -> u64 { self.counters.npc }
    pub fn current_conv_id(&self) -> u64 { self.counters.conv }

    pub fn id_stats(&self) -> IdStats {
        IdStats {
            node_counter: self.counters.node,
            npc_counter: self.counters.npc,
            conv_counter: self.counters.conv,
            known_node_ids: self.known.node.len(),
            known_npc_ids: self.known.npc.len(),
            known_conv_ids: self.known.conv.len(),
            initialized: self.initialized,
        }
    }

    /// Back to the starting counters. Known ids are kept, so ids issued earlier
    /// in this process are still skipped.
    pub fn reset_counters(&mut self) {
        self.counters = Counters::default();
        if let Err(e) = self.store.reset() {
            warn!("could not persist reset id counters: {}", e);
        }
        info!("id counters reset to defaults");
    }
}

// The counter sits at u64::MAX, so hand out suffixed ids that can never parse
// back into a counter value.
fn exhausted_id(kind: IdKind, known: &mut HashSet<String>) -> String {
    warn!("{:?} id counter is exhausted, issuing suffixed ids", kind);
    let base = kind.format(u64::MAX);
    (1..)
        .map(|n: u64| format!("{}-{}", base, n))
        .find(|candidate| known.insert(candidate.clone()))
        .unwrap_or(base)
}

/// Cloneable handle to one allocator shared by everything that creates entities.
#[derive(Clone)]
pub struct SharedAllocator {
    inner: Arc<Mutex<IdAllocator>>,
}

impl SharedAllocator {
    pub fn new(allocator: IdAllocator) -> Self {
        Self { inner: Arc::new(Mutex::new(allocator)) }
    }

    pub fn lock(&self) -> MutexGuard<'_, IdAllocator> {
        // Counters stay consistent across a panic elsewhere, keep going
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn initialize(&self, state: &[Npc]) { self.lock().initialize(state) }
    pub fn id_stats(&self) -> IdStats { self.lock().id_stats() }
    pub fn reset_counters(&self) { self.lock().reset_counters() }
}

impl IdGenerator for SharedAllocator {
    fn next_id(&self, kind: IdKind) -> String {
        self.lock().generate(kind)
    }
}

/// Rescan the entity stores every `interval` on `handle`'s runtime.
pub fn spawn_periodic_rescan(allocator: SharedAllocator, interval: Duration, handle: &Handle) -> JoinHandle<()> {
    handle.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately; initialize() already scanned
        ticker.tick().await;
        loop {
            ticker.tick().await;
            allocator.lock().rescan_entities();
        }
    })
}
