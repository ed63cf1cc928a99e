use super::graph::{Conversation, Npc, Position};

/// Sample data handed out when the database is empty or unreadable.
///
/// Node ids stay below the node counter's starting value (10) so freshly
/// allocated ids never collide with the seed.
pub fn seed_npcs() -> Vec<Npc> {
    let mut greeting = Conversation::new("conv-1".to_string(), "Greeting");
    greeting.add_node("1".into(), "Welcome, traveler. What brings you to our village?", Position::new(0.0, 0.0));
    greeting.add_node("2".into(), "I'm looking for work.", Position::new(300.0, -100.0));
    greeting.add_node("3".into(), "Just passing through.", Position::new(300.0, 100.0));
    greeting.add_node("4".into(), "Speak to the blacksmith, he always needs hands.", Position::new(600.0, -100.0));
    for (source, target) in [("1", "2"), ("1", "3"), ("2", "4")] {
        greeting.connect(source, target);
    }

    let mut elder = Npc::new("npc-1".to_string(), "Village Elder");
    elder.conversations.push(greeting);
    vec![elder]
}
