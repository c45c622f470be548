//! Configuration of [`PriorityMemory`](crate::PriorityMemory).
use crate::PerError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`PriorityMemory`](crate::PriorityMemory).
///
/// # Examples
///
/// ```rust
/// use per_core::PriorityMemoryConfig;
///
/// let config = PriorityMemoryConfig::default()
///     .capacity(50_000)
///     .alpha(0.6)
///     .beta_start(0.4)
///     .beta_increment_per_sample(1e-4)
///     .seed(42);
/// assert!(config.check().is_ok());
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PriorityMemoryConfig {
    /// Maximum number of transitions. When the memory is full, new transitions
    /// replace the oldest ones.
    pub capacity: usize,

    /// Small amount added to absolute errors so that no transition has zero priority.
    /// It is also the floor of every priority written through an update.
    pub priority_epsilon: f64,

    /// Exponent converting absolute errors to priorities.
    /// A value of 0 results in uniform sampling.
    pub alpha: f64,

    /// Initial value of the importance sampling exponent.
    pub beta_start: f64,

    /// Increment of the importance sampling exponent per sampled batch.
    pub beta_increment_per_sample: f64,

    /// Ceiling of priorities, also the priority given to the first transition.
    pub absolute_error_clip: f64,

    /// Floor of the minimum sampling probability used to normalize weights.
    pub min_prob_floor: f64,

    /// Random seed used for sampling.
    pub seed: u64,
}

impl Default for PriorityMemoryConfig {
    fn default() -> Self {
        Self {
            capacity: 10000,
            priority_epsilon: 0.01,
            alpha: 0.6,
            beta_start: 0.4,
            beta_increment_per_sample: 0.001,
            absolute_error_clip: 1.0,
            min_prob_floor: 1e-5,
            seed: 42,
        }
    }
}

impl PriorityMemoryConfig {
    /// Sets the capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the priority floor.
    pub fn priority_epsilon(mut self, priority_epsilon: f64) -> Self {
        self.priority_epsilon = priority_epsilon;
        self
    }

    /// Sets the prioritization exponent `alpha`.
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the initial importance sampling exponent.
    pub fn beta_start(mut self, beta_start: f64) -> Self {
        self.beta_start = beta_start;
        self
    }

    /// Sets the increment of the importance sampling exponent per sampled batch.
    pub fn beta_increment_per_sample(mut self, v: f64) -> Self {
        self.beta_increment_per_sample = v;
        self
    }

    /// Sets the priority ceiling.
    pub fn absolute_error_clip(mut self, absolute_error_clip: f64) -> Self {
        self.absolute_error_clip = absolute_error_clip;
        self
    }

    /// Sets the floor of the minimum sampling probability.
    pub fn min_prob_floor(mut self, min_prob_floor: f64) -> Self {
        self.min_prob_floor = min_prob_floor;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Checks that every value is in its domain.
    pub fn check(&self) -> Result<(), PerError> {
        if self.capacity == 0 {
            return Err(PerError::InvalidCapacity);
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(invalid("alpha", self.alpha));
        }
        if !(self.priority_epsilon.is_finite() && self.priority_epsilon > 0.0) {
            return Err(invalid("priority_epsilon", self.priority_epsilon));
        }
        if !(self.absolute_error_clip.is_finite()
            && self.absolute_error_clip >= self.priority_epsilon)
        {
            return Err(invalid("absolute_error_clip", self.absolute_error_clip));
        }
        if !(self.beta_start.is_finite() && self.beta_start >= 0.0) {
            return Err(invalid("beta_start", self.beta_start));
        }
        if !(self.beta_increment_per_sample.is_finite() && self.beta_increment_per_sample >= 0.0) {
            return Err(invalid(
                "beta_increment_per_sample",
                self.beta_increment_per_sample,
            ));
        }
        if !(self.min_prob_floor.is_finite() && self.min_prob_floor > 0.0) {
            return Err(invalid("min_prob_floor", self.min_prob_floor));
        }
        Ok(())
    }

    /// Constructs [`PriorityMemoryConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`PriorityMemoryConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

fn invalid(name: &str, value: f64) -> PerError {
    PerError::InvalidConfig(format!("{} = {}", name, value))
}
