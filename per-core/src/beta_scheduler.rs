//! Scheduling the exponent of importance weight.
use serde::{Deserialize, Serialize};

/// Scheduler of the exponent of importance weight, $\beta$.
///
/// $\beta$ starts at `beta_0` and grows by `increment` every time a batch is
/// sampled, until it reaches 1, where the importance-sampling weights fully
/// compensate the non-uniform sampling.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct BetaScheduler {
    /// Initial value of $\beta$.
    pub beta_0: f64,

    /// Increment of $\beta$ per sampling.
    pub increment: f64,

    /// Current value of $\beta$.
    beta: f64,
}

impl BetaScheduler {
    /// Creates a scheduler.
    pub fn new(beta_0: f64, increment: f64) -> Self {
        Self {
            beta_0,
            increment,
            beta: beta_0.min(1.0),
        }
    }

    /// Gets the current exponent of importance sampling weight.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Anneals $\beta$ towards 1 by one increment.
    pub fn step(&mut self) {
        self.beta = (self.beta + self.increment).min(1.0);
    }
}
