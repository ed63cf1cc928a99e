use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;

use super::kind::IdKind;
use crate::persistence::error::StoreError;
use crate::persistence::kv_store::KeyValueStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub node: u64,
    pub npc: u64,
    pub conv: u64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            node: IdKind::Node.default_counter(),
            npc: IdKind::Npc.default_counter(),
            conv: IdKind::Conversation.default_counter(),
        }
    }
}

impl Counters {
    pub fn get(&self, kind: IdKind) -> u64 {
        match kind {
            IdKind::Node => self.node,
            IdKind::Npc => self.npc,
            IdKind::Conversation => self.conv,
        }
    }

    pub fn get_mut(&mut self, kind: IdKind) -> &mut u64 {
        match kind {
            IdKind::Node => &mut self.node,
            IdKind::Npc => &mut self.npc,
            IdKind::Conversation => &mut self.conv,
        }
    }
}

/// Durable home of the three id counters.
pub struct CounterStore {
    kv: Arc<dyn KeyValueStore>,
}

impl CounterStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn read(&self, kind: IdKind) -> Result<Option<u64>, StoreError> {
        let Some(raw) = self.kv.get(kind.storage_key())? else {
            return Ok(None);
        };
        match raw.trim().parse::<u64>() {
            Ok(v) => Ok(Some(v)),
            Err(_) => {
                warn!("ignoring unparsable {} value {:?}", kind.storage_key(), raw);
                Ok(None)
            }
        }
    }

    /// Stored counters, with defaults for anything missing or unparsable.
    pub fn load(&self) -> Result<Counters, StoreError> {
        let mut counters = Counters::default();
        for kind in IdKind::ALL {
            if let Some(v) = self.read(kind)? {
                *counters.get_mut(kind) = v;
            }
        }
        debug!("loaded id counters {:?}", counters);
        Ok(counters)
    }

    /// Persist `counters`, never lowering a value already in storage.
    ///
    /// Another session sharing the same store may have advanced a counter; in
    /// that case the in-memory counter is raised to match before writing.
    pub fn save(&self, counters: &mut Counters) -> Result<(), StoreError> {
        for kind in IdKind::ALL {
            let stored = self.read(kind)?;
            let current = counters.get_mut(kind);
            if let Some(stored) = stored
                && stored > *current
            {
                debug!("{} advanced elsewhere to {}, catching up from {}", kind.storage_key(), stored, current);
                *current = stored;
            }
            self.kv.set(kind.storage_key(), &current.to_string())?;
        }
        Ok(())
    }

    /// Write the defaults unconditionally. The only path that lowers stored counters.
    pub fn reset(&self) -> Result<Counters, StoreError> {
        let counters = Counters::default();
        for kind in IdKind::ALL {
            self.kv.set(kind.storage_key(), &counters.get(kind).to_string())?;
        }
        Ok(counters)
    }
}
