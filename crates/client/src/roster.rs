use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub session_id: String,
    pub display_name: String,
}

#[derive(Debug, Default)]
pub struct Roster {
    players: HashMap<String, Player>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or renames a participant. Returns `true` if they were not present.
    pub fn join(&mut self, session_id: String, display_name: String) -> bool {
        let player = Player {
            session_id: session_id.clone(),
            display_name,
        };
        self.players.insert(session_id, player).is_none()
    }

    pub fn leave(&mut self, session_id: &str) -> Option<Player> {
        self.players.remove(session_id)
    }

    pub fn get(&self, session_id: &str) -> Option<&Player> {
        self.players.get(session_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }
}
