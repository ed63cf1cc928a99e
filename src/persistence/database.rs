use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::error::StoreError;
use super::kv_store::atomic_write;
use crate::graph_utils::graph::Npc;

pub const NPC_TABLE: &str = "npcs";
const TABLE_VERSION: u32 = 1;

/// The `npcs` document table, primary key `id`.
pub trait NpcTable: Send + Sync {
    fn all(&self) -> Result<Vec<Npc>, StoreError>;
    /// Clear the table and bulk-insert `npcs` as a single transaction.
    fn replace_all(&self, npcs: &[Npc]) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError> {
        self.replace_all(&[])
    }
}

// Primary key semantics: a later document with the same id replaces the earlier
// one but keeps its slot.
pub(crate) fn dedup_by_id(npcs: &[Npc]) -> Vec<Npc> {
    let mut out: Vec<Npc> = Vec::with_capacity(npcs.len());
    for npc in npcs {
        match out.iter_mut().find(|existing| existing.id == npc.id) {
            Some(existing) => *existing = npc.clone(),
            None => out.push(npc.clone()),
        }
    }
    out
}

#[derive(Debug, Serialize, Deserialize)]
struct TableFile {
    table: String,
    version: u32,
    npcs: Vec<Npc>,
}

/// Table stored as one JSON document; writes go through a temp file and a rename
/// so a crash never leaves a half-written table behind.
pub struct FileNpcDatabase {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileNpcDatabase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path { &self.path }
}

impl NpcTable for FileNpcDatabase {
    fn all(&self) -> Result<Vec<Npc>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut f = File::open(&self.path)?;
        let mut buf = String::new();
        f.read_to_string(&mut buf)?;
        let file: TableFile = serde_json::from_str(&buf)?;
        if file.table != NPC_TABLE {
            return Err(StoreError::Unavailable(format!(
                "{} holds table '{}', expected '{}'",
                self.path.display(),
                file.table,
                NPC_TABLE
            )));
        }
        Ok(file.npcs)
    }

    fn replace_all(&self, npcs: &[Npc]) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let file = TableFile {
            table: NPC_TABLE.to_string(),
            version: TABLE_VERSION,
            npcs: dedup_by_id(npcs),
        };
        let s = serde_json::to_string_pretty(&file)?;
        atomic_write(&self.path, s.as_bytes())?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryNpcDatabase {
    rows: Mutex<Vec<Npc>>,
}

impl MemoryNpcDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NpcTable for MemoryNpcDatabase {
    fn all(&self) -> Result<Vec<Npc>, StoreError> {
        Ok(self.rows.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn replace_all(&self, npcs: &[Npc]) -> Result<(), StoreError> {
        *self.rows.lock().unwrap_or_else(|e| e.into_inner()) = dedup_by_id(npcs);
        Ok(())
    }
}
