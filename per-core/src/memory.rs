//! Replay memory with prioritized sampling.
use crate::{
    BetaScheduler, ExperienceBufferBase, PerError, PriorityMemoryConfig, PriorityTree,
    ReplayBufferBase,
};
use anyhow::Result;
use log::{debug, info, trace, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// A batch sampled from [`PriorityMemory`].
///
/// The three vectors have the same length and order.
#[derive(Clone, Debug, PartialEq)]
pub struct SampledBatch<T> {
    /// Leaf indices of the sampled transitions, passed back to
    /// [`PriorityMemory::update`].
    pub indices: Vec<usize>,

    /// Sampled transitions.
    pub transitions: Vec<T>,

    /// Importance sampling weights.
    pub weights: Vec<f64>,
}

impl<T> SampledBatch<T> {
    /// Returns the number of samples in the batch.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` if the batch has no samples.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Replay memory sampling transitions in proportion to their priorities.
///
/// # Protocol
///
/// ```mermaid
/// graph LR
///     A[Agent]-->|store|B[PriorityMemory]
///     B -->|sample: indices, transitions, weights|A
///     A -->|update: indices, absolute errors|B
/// ```
///
/// * [`store`](Self::store) inserts a transition with the running maximum of
///   priorities, so that a new transition is at least as likely to be sampled as
///   any known one. The first transition gets `absolute_error_clip`.
/// * [`sample`](Self::sample) splits the total priority into `n` equal segments
///   and draws one transition from each. The importance sampling weight of a
///   transition with probability $P(i)$ is $w_i = (P(i) / \min_j P(j))^{-\beta}$.
///   $\beta$ is annealed towards 1 after every call.
/// * [`update`](Self::update) sets the priority of each sampled transition to
///   $\min((|\delta_i| + \epsilon)^\alpha, c)$, where $\delta_i$ is the error of the
///   transition and $c$ is `absolute_error_clip`.
///
/// The memory is not synchronized. Concurrent users must hold a lock over the
/// whole store/sample/update cycle.
pub struct PriorityMemory<T> {
    config: PriorityMemoryConfig,
    tree: PriorityTree<T>,
    beta_scheduler: BetaScheduler,

    /// Largest priority written so far, given to new transitions.
    max_priority: f64,
    rng: StdRng,
}

impl<T: Clone> PriorityMemory<T> {
    /// Builds an empty memory.
    pub fn build(config: &PriorityMemoryConfig) -> Result<Self> {
        config.check()?;
        info!(
            "Build PriorityMemory: capacity={}, alpha={}, beta_start={}",
            config.capacity, config.alpha, config.beta_start
        );

        Ok(Self {
            config: config.clone(),
            tree: PriorityTree::new(config.capacity)?,
            beta_scheduler: BetaScheduler::new(
                config.beta_start,
                config.beta_increment_per_sample,
            ),
            max_priority: 0.0,
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PriorityMemoryConfig {
        &self.config
    }

    /// Returns the number of stored transitions.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if no transition has been stored.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the maximum number of transitions.
    pub fn capacity(&self) -> usize {
        self.tree.capacity()
    }

    /// Returns the sum of priorities of all stored transitions.
    pub fn total_priority(&self) -> f64 {
        self.tree.total_priority()
    }

    /// Returns the exponent used for importance sampling weights of the next batch.
    pub fn beta(&self) -> f64 {
        self.beta_scheduler.beta()
    }

    /// Returns the running maximum of priorities.
    pub fn max_priority(&self) -> f64 {
        self.max_priority
    }

    /// Returns the underlying sum tree.
    pub fn tree(&self) -> &PriorityTree<T> {
        &self.tree
    }

    /// Stores a transition, overwriting the oldest one if the memory is full.
    pub fn store(&mut self, transition: T) -> Result<()> {
        let priority = if self.tree.total_priority() > 0.0 {
            self.max_priority
        } else {
            self.max_priority.max(self.config.absolute_error_clip)
        };

        let ix = self.tree.add(priority, transition)?;
        self.max_priority = self.max_priority.max(priority);
        trace!("Stored transition at leaf {} with priority {}", ix, priority);

        Ok(())
    }

    /// Samples `n` transitions with stratified sampling.
    ///
    /// # Errors
    ///
    /// Returns [`PerError::InvalidState`] if `n` exceeds the number of stored
    /// transitions or the total priority is zero.
    pub fn sample(&mut self, n: usize) -> Result<SampledBatch<T>> {
        if n == 0 {
            return Ok(SampledBatch {
                indices: vec![],
                transitions: vec![],
                weights: vec![],
            });
        }
        if n > self.tree.len() {
            return Err(PerError::InvalidState(format!(
                "batch size {} exceeds the number of stored transitions {}",
                n,
                self.tree.len()
            ))
            .into());
        }

        let total = self.tree.total_priority();
        if !(total > 0.0) {
            return Err(PerError::InvalidState("total priority is zero".to_string()).into());
        }

        let beta = self.beta_scheduler.beta();
        let min_prob = match self.tree.min_priority() {
            Some(p) => (p / total).max(self.config.min_prob_floor),
            None => self.config.min_prob_floor,
        };
        let segment = total / n as f64;

        let mut indices = Vec::with_capacity(n);
        let mut transitions = Vec::with_capacity(n);
        let mut weights = Vec::with_capacity(n);

        for i in 0..n {
            let (a, b) = (segment * i as f64, segment * (i + 1) as f64);
            let v = if b > a { self.rng.gen_range(a..b) } else { a };
            let leaf = self.tree.get_leaf(v)?;
            let prob = leaf.priority / total;

            indices.push(leaf.index);
            transitions.push(leaf.data.clone());
            weights.push((prob / min_prob).powf(-beta));
        }

        self.beta_scheduler.step();
        debug!(
            "Sampled {} transitions: total={}, beta={}, min_prob={}",
            n, total, beta, min_prob
        );

        Ok(SampledBatch {
            indices,
            transitions,
            weights,
        })
    }

    /// Updates priorities of sampled transitions with their absolute errors.
    ///
    /// The whole batch is validated before any priority is written.
    ///
    /// # Errors
    ///
    /// Returns [`PerError::LengthMismatch`] if the lengths differ and
    /// [`PerError::InvalidIndex`] if an index does not point to a stored transition.
    pub fn update(&mut self, indices: &[usize], absolute_errors: &[f64]) -> Result<()> {
        if indices.len() != absolute_errors.len() {
            return Err(PerError::LengthMismatch {
                indices: indices.len(),
                errors: absolute_errors.len(),
            }
            .into());
        }
        if let Some(&ix) = indices.iter().find(|&&ix| !self.is_stored(ix)) {
            return Err(PerError::InvalidIndex(ix).into());
        }

        for (&ix, &err) in indices.iter().zip(absolute_errors.iter()) {
            let p = self.priority_of(err);
            self.tree.update(ix, p)?;
            if p > self.max_priority {
                self.max_priority = p;
            }
        }
        debug!(
            "Updated {} priorities: total={}, max={}",
            indices.len(),
            self.tree.total_priority(),
            self.max_priority
        );

        Ok(())
    }

    fn is_stored(&self, leaf_index: usize) -> bool {
        self.tree.is_leaf(leaf_index)
            && self
                .tree
                .data(self.tree.data_index_of(leaf_index))
                .is_some()
    }

    /// Converts an absolute error to a priority.
    fn priority_of(&self, err: f64) -> f64 {
        let eps = self.config.priority_epsilon;
        let clip = self.config.absolute_error_clip;

        if !err.is_finite() {
            warn!("Non-finite error {} is replaced with the priority ceiling", err);
            return clip;
        }

        (err.abs() + eps)
            .powf(self.config.alpha)
            .min(clip)
            .max(eps)
    }
}

impl<T: Clone> ExperienceBufferBase for PriorityMemory<T> {
    type Item = T;

    fn push(&mut self, tr: T) -> Result<()> {
        self.store(tr)
    }

    fn len(&self) -> usize {
        self.tree.len()
    }
}

impl<T: Clone> ReplayBufferBase for PriorityMemory<T> {
    type Config = PriorityMemoryConfig;
    type Batch = SampledBatch<T>;

    fn build(config: &Self::Config) -> Result<Self> {
        PriorityMemory::build(config)
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        self.sample(size)
    }

    fn update_priority(&mut self, ixs: &[usize], td_errs: &[f64]) -> Result<()> {
        self.update(ixs, td_errs)
    }
}
