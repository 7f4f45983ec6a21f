//! Host-side transition rows for continuous-control replay data.

/// One continuous-action transition as stored by a replay buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Current state observation
    pub state: Vec<f32>,
    /// Action taken (already in the squashed [-1, 1] range)
    pub action: Vec<f32>,
    /// Reward received
    pub reward: f32,
    /// Next state observation
    pub next_state: Vec<f32>,
    /// Episode terminated (goal reached, failure, etc.)
    pub terminal: bool,
    /// Episode truncated (time limit, etc.)
    pub truncated: bool,
}

impl Transition {
    pub fn new(
        state: Vec<f32>,
        action: Vec<f32>,
        reward: f32,
        next_state: Vec<f32>,
        terminal: bool,
        truncated: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            terminal,
            truncated,
        }
    }

    /// Done flag used in the TD target.
    ///
    /// Only true termination stops bootstrapping. A time-limit truncation
    /// still bootstraps from `next_state`.
    pub fn done_flag(&self) -> f32 {
        if self.terminal {
            1.0
        } else {
            0.0
        }
    }
}
