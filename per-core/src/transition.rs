//! A single step of interaction stored in a replay memory.
use serde::{Deserialize, Serialize};

/// One recorded environment step, $(o_t, a_t, r_t, o_{t+1}, d_t)$.
///
/// [`PriorityMemory`](crate::PriorityMemory) is generic over the stored item;
/// this type is the usual choice for value-based agents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition<S, A> {
    /// Observation before the action.
    pub state: S,

    /// Action taken.
    pub action: A,

    /// Reward received.
    pub reward: f32,

    /// Observation after the action.
    pub next_state: S,

    /// Whether the episode terminated at this step.
    pub is_terminated: bool,
}

impl<S, A> Transition<S, A> {
    /// Creates a transition.
    pub fn new(state: S, action: A, reward: f32, next_state: S, is_terminated: bool) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            is_terminated,
        }
    }

    /// Returns the elements of the transition.
    pub fn unpack(self) -> (S, A, f32, S, bool) {
        (
            self.state,
            self.action,
            self.reward,
            self.next_state,
            self.is_terminated,
        )
    }
}
