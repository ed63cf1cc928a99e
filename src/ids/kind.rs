use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static NPC_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^npc-(\d+)$").expect("static regex"));
static CONV_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^conv-(\d+)$").expect("static regex"));

/// The three entity kinds that get allocated ids. Each has its own counter,
/// known-id set and string format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    Node,
    Npc,
    Conversation,
}

impl IdKind {
    pub const ALL: [IdKind; 3] = [IdKind::Node, IdKind::Npc, IdKind::Conversation];

    /// Starting counter value. Node ids below 10 belong to the bundled seed data.
    pub fn default_counter(self) -> u64 {
        match self {
            IdKind::Node => 10,
            IdKind::Npc | IdKind::Conversation => 1,
        }
    }

    pub fn storage_key(self) -> &'static str {
        match self {
            IdKind::Node => "dialogueBuilder_nodeIdCounter",
            IdKind::Npc => "dialogueBuilder_npcIdCounter",
            IdKind::Conversation => "dialogueBuilder_convIdCounter",
        }
    }

    pub fn format(self, n: u64) -> String {
        match self {
            IdKind::Node => n.to_string(),
            IdKind::Npc => format!("npc-{}", n),
            IdKind::Conversation => format!("conv-{}", n),
        }
    }

    /// Numeric part of an id of this kind, or None when the id doesn't follow
    /// the allocator's format.
    pub fn parse(self, id: &str) -> Option<u64> {
        match self {
            IdKind::Node => id.parse().ok(),
            IdKind::Npc => capture_number(&NPC_ID_RE, id),
            IdKind::Conversation => capture_number(&CONV_ID_RE, id),
        }
    }
}

fn capture_number(re: &Regex, id: &str) -> Option<u64> {
    re.captures(id)?.get(1)?.as_str().parse().ok()
}
