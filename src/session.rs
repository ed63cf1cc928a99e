use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use log::info;

use crate::graph_utils::graph::{Conversation, Npc, Position, find_npc, find_npc_mut};
use crate::ids::{IdAllocator, IdGenerator, IdStats, SharedAllocator};
use crate::persistence::database::{FileNpcDatabase, NpcTable};
use crate::persistence::kv_store::{FileKeyValueStore, KeyValueStore};
use crate::persistence::persist::PersistenceService;
use crate::persistence::settings::AppSettings;

// Horizontal spacing for nodes added without an explicit position
const NODE_SPACING: f64 = 250.0;

/// The in-memory NPC collection being edited, with the allocator and the
/// persistence service it depends on.
pub struct EditorSession {
    npcs: Vec<Npc>,
    allocator: SharedAllocator,
    service: Arc<PersistenceService>,
}

impl EditorSession {
    /// Open the file-backed stores under the settings' data directory.
    pub fn open(settings: &AppSettings) -> Self {
        let kv: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(settings.local_storage_path()));
        let db: Arc<dyn NpcTable> = Arc::new(FileNpcDatabase::new(settings.database_path()));
        Self::with_stores(kv, db, settings.backup_dir())
    }

    pub fn with_stores(kv: Arc<dyn KeyValueStore>, db: Arc<dyn NpcTable>, backup_dir: impl Into<PathBuf>) -> Self {
        let service = Arc::new(PersistenceService::new(db.clone(), kv.clone(), backup_dir));
        let allocator = SharedAllocator::new(IdAllocator::new(kv, db));
        let npcs = service.load_all();
        allocator.initialize(&npcs);
        Self { npcs, allocator, service }
    }

    pub fn npcs(&self) -> &[Npc] { &self.npcs }
    pub fn allocator(&self) -> &SharedAllocator { &self.allocator }
    pub fn service(&self) -> &Arc<PersistenceService> { &self.service }
    pub fn id_stats(&self) -> IdStats { self.allocator.id_stats() }

    pub fn npc(&self, npc_id: &str) -> Result<&Npc> {
        find_npc(&self.npcs, npc_id).ok_or_else(|| anyhow!("no npc with id {}", npc_id))
    }

    fn npc_mut(&mut self, npc_id: &str) -> Result<&mut Npc> {
        find_npc_mut(&mut self.npcs, npc_id).ok_or_else(|| anyhow!("no npc with id {}", npc_id))
    }

    pub fn create_npc(&mut self, name: &str) -> String {
        let id = self.allocator.next_npc_id();
        self.npcs.push(Npc::new(id.clone(), name));
        id
    }

    pub fn rename_npc(&mut self, npc_id: &str, name: &str) -> Result<()> {
        self.npc_mut(npc_id)?.name = name.to_string();
        Ok(())
    }

    pub fn set_npc_image(&mut self, npc_id: &str, image_data: Option<String>) -> Result<()> {
        self.npc_mut(npc_id)?.image_data = image_data;
        Ok(())
    }

    pub fn remove_npc(&mut self, npc_id: &str) -> bool {
        let before = self.npcs.len();
        self.npcs.retain(|n| n.id != npc_id);
        self.npcs.len() != before
    }

    pub fn create_conversation(&mut self, npc_id: &str, name: &str) -> Result<String> {
        // Check the owner first so a missing NPC doesn't burn an id
        self.npc(npc_id)?;
        let id = self.allocator.next_conversation_id();
        self.npc_mut(npc_id)?.add_conversation(id.clone(), name);
        Ok(id)
    }

    pub fn remove_conversation(&mut self, npc_id: &str, conv_id: &str) -> Result<bool> {
        Ok(self.npc_mut(npc_id)?.remove_conversation(conv_id))
    }

    pub fn add_node(&mut self, npc_id: &str, conv_id: &str, label: &str, position: Option<Position>) -> Result<String> {
        let count = self
            .npc(npc_id)?
            .conversation(conv_id)
            .ok_or_else(|| anyhow!("npc {} has no conversation {}", npc_id, conv_id))?
            .node_count();
        let id = self.allocator.next_node_id();
        let position = position.unwrap_or_else(|| Position::new(count as f64 * NODE_SPACING, 0.0));
        self.conversation_mut(npc_id, conv_id)?.add_node(id.clone(), label, position);
        Ok(id)
    }

    pub fn set_node_label(&mut self, npc_id: &str, conv_id: &str, node_id: &str, label: &str) -> Result<()> {
        if self.conversation_mut(npc_id, conv_id)?.update_node_label(node_id, label.to_string()) {
            Ok(())
        } else {
            Err(anyhow!("conversation {} has no node {}", conv_id, node_id))
        }
    }

    pub fn remove_node(&mut self, npc_id: &str, conv_id: &str, node_id: &str) -> Result<bool> {
        Ok(self.conversation_mut(npc_id, conv_id)?.remove_node(node_id))
    }

    pub fn connect(&mut self, npc_id: &str, conv_id: &str, source: &str, target: &str) -> Result<String> {
        self.conversation_mut(npc_id, conv_id)?
            .connect(source, target)
            .ok_or_else(|| anyhow!("cannot connect {} -> {}: missing node or edge already exists", source, target))
    }

    pub fn disconnect(&mut self, npc_id: &str, conv_id: &str, edge_id: &str) -> Result<bool> {
        Ok(self.conversation_mut(npc_id, conv_id)?.disconnect(edge_id))
    }

    fn conversation_mut(&mut self, npc_id: &str, conv_id: &str) -> Result<&mut Conversation> {
        self.npc_mut(npc_id)?
            .conversation_mut(conv_id)
            .ok_or_else(|| anyhow!("npc {} has no conversation {}", npc_id, conv_id))
    }

    pub fn save(&self) -> Result<()> {
        self.service.save_all(&self.npcs)?;
        Ok(())
    }

    /// Replace the in-memory collection with whatever is stored now, e.g. after an import.
    pub fn reload(&mut self) {
        self.npcs = self.service.load_all();
        self.allocator.initialize(&self.npcs);
    }

    /// Clear all stored data and counters, then start again from the seed data.
    pub fn reset_all(&mut self) -> Result<Option<PathBuf>> {
        let backup = self.service.reset_all_data(&self.allocator)?;
        self.reload();
        info!("session reset, {} npcs loaded", self.npcs.len());
        Ok(backup)
    }
}
