use anyhow::{Result, anyhow, bail};

use crate::graph_utils::graph::{Npc, Position};
use crate::session::EditorSession;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CommandOutcome {
    pub lines: Vec<String>,
    pub mutated: bool,
}

impl CommandOutcome {
    fn info(line: impl Into<String>) -> Self {
        Self { lines: vec![line.into()], mutated: false }
    }

    fn changed(line: impl Into<String>) -> Self {
        Self { lines: vec![line.into()], mutated: true }
    }
}

pub const HELP: &str = "\
Commands:
  list                                   List NPCs and their conversations
  show <npc>                             Show an NPC's conversations, nodes and edges
  npc add <name>                         Create an NPC
  npc rename <npc> <name>                Rename an NPC
  npc rm <npc>                           Delete an NPC and everything it owns
  conv add <npc> <name>                  Create a conversation
  conv rm <npc> <conv>                   Delete a conversation
  node add <npc> <conv> <label> [x y]    Add a dialogue node
  node label <npc> <conv> <node> <label> Change a node's text
  node rm <npc> <conv> <node>            Delete a node and its edges
  link <npc> <conv> <source> <target>    Connect two nodes
  unlink <npc> <conv> <edge>             Remove an edge
  stats                                  Show id allocator counters
Wrap arguments containing spaces in double quotes.";

/// Split a command line on whitespace, keeping double-quoted runs together.
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            '\\' if in_quotes => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    out.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if in_quotes {
        bail!("unterminated quote");
    }
    if has_token {
        out.push(current);
    }
    Ok(out)
}

fn arg<'a>(args: &'a [String], idx: usize, what: &str) -> Result<&'a str> {
    args.get(idx).map(String::as_str).ok_or_else(|| anyhow!("missing {}", what))
}

fn describe_npc(npc: &Npc) -> Vec<String> {
    let mut lines = vec![format!("{} {:?}", npc.id, npc.name)];
    for conv in &npc.conversations {
        lines.push(format!("  {} {:?} ({} nodes, {} edges)", conv.id, conv.name, conv.node_count(), conv.edge_count()));
        for node in &conv.nodes {
            lines.push(format!("    [{}] {}", node.id, node.label()));
        }
        for edge in &conv.edges {
            lines.push(format!("    {}: {} -> {}", edge.id, edge.source, edge.target));
        }
    }
    lines
}

pub fn execute_command(session: &mut EditorSession, line: &str) -> Result<CommandOutcome> {
    let tokens = tokenize(line)?;
    let Some((head, rest)) = tokens.split_first() else {
        return Err(anyhow!("empty command"));
    };
    let sub = rest.first().map(|s| s.to_ascii_lowercase());
    let args = rest.get(1..).unwrap_or(&[]);

    match (head.to_ascii_lowercase().as_str(), sub.as_deref()) {
        ("help", _) | ("?", _) => Ok(CommandOutcome::info(HELP)),
        ("list", _) => {
            let mut out = CommandOutcome::default();
            for npc in session.npcs() {
                let convs: Vec<&str> = npc.conversations.iter().map(|c| c.id.as_str()).collect();
                out.lines.push(format!("{} {:?} [{}]", npc.id, npc.name, convs.join(", ")));
            }
            if out.lines.is_empty() {
                out.lines.push("no npcs".into());
            }
            Ok(out)
        }
        ("show", _) => {
            let npc_id = arg(rest, 0, "npc id")?;
            Ok(CommandOutcome { lines: describe_npc(session.npc(npc_id)?), mutated: false })
        }
        ("stats", _) => Ok(CommandOutcome::info(serde_json::to_string_pretty(&session.id_stats())?)),
        ("npc", Some("add")) => {
            let name = arg(args, 0, "npc name")?;
            let id = session.create_npc(name);
            Ok(CommandOutcome::changed(format!("created {}", id)))
        }
        ("npc", Some("rename")) => {
            let npc_id = arg(args, 0, "npc id")?;
            session.rename_npc(npc_id, arg(args, 1, "npc name")?)?;
            Ok(CommandOutcome::changed(format!("renamed {}", npc_id)))
        }
        ("npc", Some("rm")) => {
            let npc_id = arg(args, 0, "npc id")?;
            if !session.remove_npc(npc_id) {
                bail!("no npc with id {}", npc_id);
            }
            Ok(CommandOutcome::changed(format!("deleted {}", npc_id)))
        }
        ("conv", Some("add")) => {
            let id = session.create_conversation(arg(args, 0, "npc id")?, arg(args, 1, "conversation name")?)?;
            Ok(CommandOutcome::changed(format!("created {}", id)))
        }
        ("conv", Some("rm")) => {
            let conv_id = arg(args, 1, "conversation id")?;
            if !session.remove_conversation(arg(args, 0, "npc id")?, conv_id)? {
                bail!("no conversation with id {}", conv_id);
            }
            Ok(CommandOutcome::changed(format!("deleted {}", conv_id)))
        }
        ("node", Some("add")) => {
            let position = match (args.get(3), args.get(4)) {
                (Some(x), Some(y)) => Some(Position::new(x.parse()?, y.parse()?)),
                (None, None) => None,
                _ => bail!("node position needs both x and y"),
            };
            let id = session.add_node(
                arg(args, 0, "npc id")?,
                arg(args, 1, "conversation id")?,
                arg(args, 2, "node label")?,
                position,
            )?;
            Ok(CommandOutcome::changed(format!("created node {}", id)))
        }
        ("node", Some("label")) => {
            let node_id = arg(args, 2, "node id")?;
            session.set_node_label(arg(args, 0, "npc id")?, arg(args, 1, "conversation id")?, node_id, arg(args, 3, "node label")?)?;
            Ok(CommandOutcome::changed(format!("relabeled node {}", node_id)))
        }
        ("node", Some("rm")) => {
            let node_id = arg(args, 2, "node id")?;
            if !session.remove_node(arg(args, 0, "npc id")?, arg(args, 1, "conversation id")?, node_id)? {
                bail!("no node with id {}", node_id);
            }
            Ok(CommandOutcome::changed(format!("deleted node {}", node_id)))
        }
        ("link", _) => {
            let edge = session.connect(
                arg(rest, 0, "npc id")?,
                arg(rest, 1, "conversation id")?,
                arg(rest, 2, "source node")?,
                arg(rest, 3, "target node")?,
            )?;
            Ok(CommandOutcome::changed(format!("created edge {}", edge)))
        }
        ("unlink", _) => {
            let edge_id = arg(rest, 2, "edge id")?;
            if !session.disconnect(arg(rest, 0, "npc id")?, arg(rest, 1, "conversation id")?, edge_id)? {
                bail!("no edge with id {}", edge_id);
            }
            Ok(CommandOutcome::changed(format!("deleted edge {}", edge_id)))
        }
        _ => Err(anyhow!("unrecognized command: {}", line.trim())),
    }
}
