use crate::models::{ChatTurn, Role};

/// Ordered log of one session's turns.
///
/// Holds at most `max_turns` turns (never fewer than one exchange). Appends
/// beyond that drop the oldest turns first, and the log always starts at a
/// user turn so no reply is kept without its question.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    turns: Vec<ChatTurn>,
    max_turns: usize,
}

impl SessionHistory {
    pub fn new(max_turns: usize) -> Self {
        let max_turns = max_turns.max(2);
        Self {
            turns: Vec::with_capacity(max_turns.min(64)),
            max_turns,
        }
    }

    /// Records a user turn and, when present, the assistant's reply after it.
    pub fn update(&mut self, user_text: &str, assistant_text: Option<&str>) {
        self.push(ChatTurn::user(user_text));
        if let Some(reply) = assistant_text {
            self.push(ChatTurn::assistant(reply));
        }
    }

    fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
        if self.turns.len() > self.max_turns {
            let excess = self.turns.len() - self.max_turns;
            let start = self.turns[excess..]
                .iter()
                .position(|turn| turn.role == Role::User)
                .map_or(self.turns.len(), |offset| excess + offset);
            self.turns.drain(..start);
        }
    }

    /// Turns in chronological order.
    pub fn history(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
