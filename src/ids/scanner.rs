use log::{debug, warn};
use serde_json::Value;

use crate::graph_utils::graph::{Npc, all_node_ids};
use crate::persistence::database::NpcTable;
use crate::persistence::error::StoreError;
use crate::persistence::kv_store::KeyValueStore;

/// Key of the JSON snapshot of the NPC collection kept next to the counters.
pub const NPC_SNAPSHOT_KEY: &str = "dialogueBuilder_npcs";

/// Ids found by a scan. Scans only report; applying them is up to the allocator.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiscoveredIds {
    pub node: Vec<String>,
    pub npc: Vec<String>,
    pub conv: Vec<String>,
}

impl DiscoveredIds {
    pub fn is_empty(&self) -> bool {
        self.node.is_empty() && self.npc.is_empty() && self.conv.is_empty()
    }

    fn collect_entities(npcs: &[Npc]) -> Self {
        let mut out = Self::default();
        for npc in npcs {
            out.npc.push(npc.id.clone());
            out.conv.extend(npc.conversations.iter().map(|c| c.id.clone()));
        }
        out
    }
}

/// Every node id present in the in-memory application state.
pub fn scan_node_ids(state: &[Npc]) -> DiscoveredIds {
    DiscoveredIds {
        node: all_node_ids(state).map(str::to_string).collect(),
        ..Default::default()
    }
}

/// Node, NPC and conversation ids present in the in-memory state. Covers
/// entities that were loaded from seed data and never written to the database.
pub fn scan_state_ids(state: &[Npc]) -> DiscoveredIds {
    DiscoveredIds {
        node: scan_node_ids(state).node,
        ..DiscoveredIds::collect_entities(state)
    }
}

/// NPC and conversation ids from the database, falling back to the cached
/// snapshot when the database can't be read.
pub fn scan_entity_ids(db: &dyn NpcTable, cache: &dyn KeyValueStore) -> Result<DiscoveredIds, StoreError> {
    match db.all() {
        Ok(npcs) => Ok(DiscoveredIds::collect_entities(&npcs)),
        Err(db_err) => {
            warn!("npc database unreadable during id scan ({}), using cached snapshot", db_err);
            let found = snapshot_entity_ids(cache)?;
            debug!("id scan read {} npc ids from snapshot", found.npc.len());
            Ok(found)
        }
    }
}

// Walks the snapshot loosely: entries that aren't shaped like NPCs are skipped
// instead of failing the whole scan.
fn snapshot_entity_ids(cache: &dyn KeyValueStore) -> Result<DiscoveredIds, StoreError> {
    let mut out = DiscoveredIds::default();
    let Some(raw) = cache.get(NPC_SNAPSHOT_KEY)? else {
        return Ok(out);
    };
    let value: Value = serde_json::from_str(&raw)?;
    let Some(entries) = value.as_array() else {
        return Err(StoreError::Unavailable(format!("{} is not an array", NPC_SNAPSHOT_KEY)));
    };
    for npc in entries {
        if let Some(id) = npc.get("id").and_then(Value::as_str) {
            out.npc.push(id.to_string());
        }
        let conversations = npc.get("conversations").and_then(Value::as_array);
        for conv in conversations.into_iter().flatten() {
            if let Some(id) = conv.get("id").and_then(Value::as_str) {
                out.conv.push(id.to_string());
            }
        }
    }
    Ok(out)
}
