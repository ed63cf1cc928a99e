use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Basic type aliases for clarity
pub type NodeId = String;
pub type NpcId = String;
pub type ConversationId = String;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Side of a node an edge attaches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlePosition {
    Left,
    Right,
    Top,
    Bottom,
}

impl HandlePosition {
    fn default_source() -> Self { HandlePosition::Right }
    fn default_target() -> Self { HandlePosition::Left }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    // Anything else the editor stored on the node survives a load/save cycle
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueNode {
    pub id: NodeId,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: NodeData,
    #[serde(default)]
    pub position: Position,
    #[serde(default = "HandlePosition::default_source")]
    pub source_position: HandlePosition,
    #[serde(default = "HandlePosition::default_target")]
    pub target_position: HandlePosition,
    // Size, style and other editor fields this crate doesn't interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DialogueNode {
    pub fn new(id: NodeId, label: impl Into<String>, position: Position) -> Self {
        Self {
            id,
            kind: None,
            data: NodeData { label: label.into(), ..Default::default() },
            position,
            source_position: HandlePosition::default_source(),
            target_position: HandlePosition::default_target(),
            extra: Map::new(),
        }
    }

    pub fn label(&self) -> &str { &self.data.label }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Edge {
    pub fn between(source: &str, target: &str) -> Self {
        Self {
            id: format!("e{}-{}", source, target),
            source: source.to_string(),
            target: target.to_string(),
            animated: None,
            extra: Map::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<DialogueNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Conversation {
    pub fn new(id: ConversationId, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), nodes: Vec::new(), edges: Vec::new() }
    }

    // Add a node and return a reference to it
    pub fn add_node(&mut self, id: NodeId, label: impl Into<String>, position: Position) -> &mut DialogueNode {
        self.nodes.push(DialogueNode::new(id, label, position));
        let last = self.nodes.len() - 1;
        &mut self.nodes[last]
    }

    pub fn node(&self, id: &str) -> Option<&DialogueNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut DialogueNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn update_node_label(&mut self, id: &str, new_label: String) -> bool {
        if let Some(node) = self.node_mut(id) {
            node.data.label = new_label;
            true
        } else {
            false
        }
    }

    // Connect two nodes if both ends exist and the edge is new; returns the edge id
    pub fn connect(&mut self, source: &str, target: &str) -> Option<String> {
        if self.node(source).is_none() || self.node(target).is_none() {
            return None;
        }
        if self.edges.iter().any(|e| e.source == source && e.target == target) {
            return None;
        }
        let edge = Edge::between(source, target);
        let id = edge.id.clone();
        self.edges.push(edge);
        Some(id)
    }

    pub fn disconnect(&mut self, edge_id: &str) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| e.id != edge_id);
        self.edges.len() != before
    }

    pub fn remove_node(&mut self, id: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != id);
        if self.nodes.len() == before {
            return false;
        }
        // Cascade delete edges touching this node
        self.edges.retain(|e| e.source != id && e.target != id);
        true
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.edges.len() }

    pub fn find_node_ids_by_label(&self, label: &str) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter_map(|n| if n.data.label == label { Some(n.id.clone()) } else { None })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Npc {
    pub id: NpcId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default)]
    pub conversations: Vec<Conversation>,
}

impl Npc {
    pub fn new(id: NpcId, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), image_data: None, conversations: Vec::new() }
    }

    pub fn add_conversation(&mut self, id: ConversationId, name: impl Into<String>) -> &mut Conversation {
        self.conversations.push(Conversation::new(id, name));
        let last = self.conversations.len() - 1;
        &mut self.conversations[last]
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn remove_conversation(&mut self, id: &str) -> bool {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        self.conversations.len() != before
    }
}

// Fetch helpers over a whole collection
pub fn find_npc<'a>(npcs: &'a [Npc], id: &str) -> Option<&'a Npc> {
    npcs.iter().find(|n| n.id == id)
}

pub fn find_npc_mut<'a>(npcs: &'a mut [Npc], id: &str) -> Option<&'a mut Npc> {
    npcs.iter_mut().find(|n| n.id == id)
}

pub fn all_node_ids(npcs: &[Npc]) -> impl Iterator<Item = &str> + '_ {
    npcs.iter()
        .flat_map(|npc| npc.conversations.iter())
        .flat_map(|conv| conv.nodes.iter())
        .map(|node| node.id.as_str())
}
