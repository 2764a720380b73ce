//! Session state carried through the generate/execute/feedback loop.
//!
//! Only the workflow controller mutates it. The UI holds it between cycles and
//! drops it on "start new diagram".

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// The original architecture description.
    pub user_input: String,
    /// Every piece of code the model returned, oldest first. Only ever appended to.
    pub history: Vec<String>,
    /// Latest feedback text; empty until the user asks for a change.
    pub feedback: String,
    /// Number of generate steps taken in this session.
    pub iteration: u32,
}

impl SessionState {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            ..Self::default()
        }
    }

    pub fn latest_code(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }

    pub fn push_code(&mut self, code: String) {
        self.history.push(code);
        self.iteration += 1;
    }
}
