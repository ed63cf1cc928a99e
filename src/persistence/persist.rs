use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use serde_json::Value;
use time::OffsetDateTime;
use time::macros::format_description;

use super::database::NpcTable;
use super::error::{ImportError, StoreError};
use super::kv_store::{KeyValueStore, atomic_write};
use crate::graph_utils::graph::Npc;
use crate::graph_utils::seed::seed_npcs;
use crate::ids::SharedAllocator;
use crate::ids::scanner::NPC_SNAPSHOT_KEY;

/// Load/save of the whole NPC collection plus JSON import/export and backups.
pub struct PersistenceService {
    db: Arc<dyn NpcTable>,
    cache: Arc<dyn KeyValueStore>,
    backup_dir: PathBuf,
}

pub fn export_file_name(now: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day]");
    let date = now.format(fmt).unwrap_or_else(|_| "unknown".to_string());
    format!("dialogue-builder-export-{}.json", date)
}

fn versioned_file_name(now: OffsetDateTime) -> String {
    let fmt = format_description!("[year][month][day]_[hour][minute][second]");
    let stamp = now.format(fmt).unwrap_or_else(|_| "unknown".to_string());
    format!("npcs_{}.json", stamp)
}

/// Shape check for imported text: a JSON array whose entries all carry a string
/// `id`, a string `name` and a `conversations` array.
pub fn validate_import(text: &str) -> Result<Vec<Npc>, ImportError> {
    let value: Value = serde_json::from_str(text)?;
    let Some(entries) = value.as_array() else {
        return Err(ImportError::NotAnArray);
    };
    for (index, entry) in entries.iter().enumerate() {
        let problem = if !entry.is_object() {
            Some("is not an object")
        } else if !entry.get("id").is_some_and(Value::is_string) {
            Some("has no string `id`")
        } else if !entry.get("name").is_some_and(Value::is_string) {
            Some("has no string `name`")
        } else if !entry.get("conversations").is_some_and(Value::is_array) {
            Some("has no `conversations` array")
        } else {
            None
        };
        if let Some(problem) = problem {
            return Err(ImportError::InvalidEntry { index, problem });
        }
    }
    // Valid JSON from here on, so a failure means a nested field has the wrong type
    serde_json::from_value(value).map_err(ImportError::Shape)
}

impl PersistenceService {
    pub fn new(db: Arc<dyn NpcTable>, cache: Arc<dyn KeyValueStore>, backup_dir: impl Into<PathBuf>) -> Self {
        Self { db, cache, backup_dir: backup_dir.into() }
    }

    pub fn backup_dir(&self) -> &Path { &self.backup_dir }

    /// Everything in the database, or the bundled seed set when it is empty or unreadable.
    pub fn load_all(&self) -> Vec<Npc> {
        match self.db.all() {
            Ok(npcs) if !npcs.is_empty() => npcs,
            Ok(_) => {
                info!("npc database is empty, starting from seed data");
                seed_npcs()
            }
            Err(e) => {
                warn!("npc database unreadable ({}), starting from seed data", e);
                seed_npcs()
            }
        }
    }

    /// Replace the stored collection. Database failures propagate; the snapshot
    /// cache is refreshed on a best-effort basis afterwards.
    pub fn save_all(&self, npcs: &[Npc]) -> Result<(), StoreError> {
        self.db.replace_all(npcs)?;
        match serde_json::to_string(npcs) {
            Ok(snapshot) => {
                if let Err(e) = self.cache.set(NPC_SNAPSHOT_KEY, &snapshot) {
                    warn!("could not refresh npc snapshot cache: {}", e);
                }
            }
            Err(e) => warn!("could not serialize npc snapshot: {}", e),
        }
        Ok(())
    }

    pub fn export_as_text(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(&self.load_all())?)
    }

    /// Write an export file named after today's date into `dir`.
    pub fn export_to_dir(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(export_file_name(OffsetDateTime::now_utc()));
        let text = self.export_as_text()?;
        atomic_write(&path, text.as_bytes())?;
        info!("exported npcs to {}", path.display());
        Ok(path)
    }

    /// Validate and store `text`, returning how many NPCs were imported.
    pub fn try_import_from_text(&self, text: &str) -> Result<usize, ImportError> {
        let npcs = validate_import(text)?;
        self.save_all(&npcs)?;
        info!("imported {} npcs", npcs.len());
        Ok(npcs.len())
    }

    pub fn import_from_text(&self, text: &str) -> bool {
        match self.try_import_from_text(text) {
            Ok(_) => true,
            Err(e) => {
                warn!("import rejected: {}", e);
                false
            }
        }
    }

    pub fn import_from_path(&self, path: &Path) -> Result<usize, ImportError> {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if !is_json {
            return Err(ImportError::NotJsonFile(path.display().to_string()));
        }
        let mut f = File::open(path)?;
        let mut buf = String::new();
        f.read_to_string(&mut buf)?;
        self.try_import_from_text(&buf)
    }

    /// Timestamped copy of the current collection in the backup directory.
    pub fn save_versioned(&self) -> anyhow::Result<PathBuf> {
        let npcs = self.db.all()?;
        fs::create_dir_all(&self.backup_dir)?;
        let path = self.backup_dir.join(versioned_file_name(OffsetDateTime::now_utc()));
        let s = serde_json::to_string_pretty(&npcs)?;
        atomic_write(&path, s.as_bytes())?;
        Ok(path)
    }

    pub fn list_versions(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut entries: Vec<PathBuf> = Vec::new();
        if self.backup_dir.exists() {
            for e in fs::read_dir(&self.backup_dir)? {
                let p = e?.path();
                if let Some(name) = p.file_name().and_then(|s| s.to_str())
                    && name.starts_with("npcs_") && name.ends_with(".json")
                {
                    entries.push(p);
                }
            }
        }
        // sort descending by filename (timestamp)
        entries.sort();
        entries.reverse();
        Ok(entries)
    }

    pub fn load_version(&self, path: &Path) -> anyhow::Result<Vec<Npc>> {
        let mut f = File::open(path)?;
        let mut buf = String::new();
        f.read_to_string(&mut buf)?;
        Ok(serde_json::from_str(&buf)?)
    }

    /// Administrative reset: back up whatever is stored, empty the database and
    /// the snapshot cache, and put the id counters back to their defaults.
    pub fn reset_all_data(&self, allocator: &SharedAllocator) -> anyhow::Result<Option<PathBuf>> {
        let had_content = self.db.all().map(|npcs| !npcs.is_empty()).unwrap_or(false);
        let backup = if had_content { Some(self.save_versioned()?) } else { None };
        self.db.clear()?;
        if let Err(e) = self.cache.remove(NPC_SNAPSHOT_KEY) {
            warn!("could not clear npc snapshot cache: {}", e);
        }
        allocator.reset_counters();
        info!("all dialogue data cleared");
        Ok(backup)
    }
}
