//! Progress of training shared by workers.
use crate::error::lock;
use anyhow::Result;
use log::info;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct ControlState {
    episodes: usize,
    converged: bool,
}

/// Episode counter and convergence flag shared by workers.
///
/// Clones refer to the same state. Workers read it between steps; a change
/// made by one worker becomes visible to others at their next check.
#[derive(Clone, Debug)]
pub struct TrainingControl {
    max_episodes: usize,
    state: Arc<Mutex<ControlState>>,
}

impl TrainingControl {
    /// Creates a control finishing training after `max_episodes` episodes.
    pub fn new(max_episodes: usize) -> Self {
        Self {
            max_episodes,
            state: Arc::new(Mutex::new(ControlState::default())),
        }
    }

    /// Returns the maximum number of episodes.
    pub fn max_episodes(&self) -> usize {
        self.max_episodes
    }

    /// Counts a finished episode and returns the number of episodes so far.
    pub fn record_episode(&self) -> Result<usize> {
        let mut state = lock(&self.state, "training control")?;
        state.episodes += 1;
        Ok(state.episodes)
    }

    /// Returns the number of finished episodes.
    pub fn episodes(&self) -> Result<usize> {
        Ok(lock(&self.state, "training control")?.episodes)
    }

    /// Marks training as converged, which finishes all workers.
    pub fn mark_converged(&self) -> Result<()> {
        let mut state = lock(&self.state, "training control")?;
        if !state.converged {
            info!("Training converged after {} episodes", state.episodes);
        }
        state.converged = true;
        Ok(())
    }

    /// Returns `true` if training has been marked as converged.
    pub fn is_converged(&self) -> Result<bool> {
        Ok(lock(&self.state, "training control")?.converged)
    }

    /// Returns `true` if training converged or reached the maximum number of episodes.
    pub fn is_done(&self) -> Result<bool> {
        let state = lock(&self.state, "training control")?;
        Ok(state.converged || state.episodes >= self.max_episodes)
    }
}
