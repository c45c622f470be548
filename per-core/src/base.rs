//! Replay buffer interface.
//!
//! Agents interact with a replay memory through two traits. Experiences flow in
//! through [`ExperienceBufferBase`], while batches for optimization steps and the
//! feedback of their errors go through [`ReplayBufferBase`].
use anyhow::Result;

/// Interface for buffers that store experiences from environments.
///
/// # Examples
///
/// ```rust
/// use per_core::{ExperienceBufferBase, PriorityMemory, PriorityMemoryConfig};
///
/// fn fill<B: ExperienceBufferBase<Item = u32>>(buffer: &mut B, n: u32) -> anyhow::Result<()> {
///     (0..n).try_for_each(|i| buffer.push(i))
/// }
///
/// let config = PriorityMemoryConfig::default().capacity(4);
/// let mut memory = PriorityMemory::<u32>::build(&config).unwrap();
/// fill(&mut memory, 6).unwrap();
/// assert_eq!(ExperienceBufferBase::len(&memory), 4);
/// ```
pub trait ExperienceBufferBase {
    /// The type of items stored in the buffer.
    type Item;

    /// Pushes a new experience into the buffer.
    fn push(&mut self, tr: Self::Item) -> Result<()>;

    /// Returns the current number of experiences in the buffer.
    fn len(&self) -> usize;
}

/// Interface for replay buffers that generate batches for training.
pub trait ReplayBufferBase: Sized {
    /// Configuration parameters for the replay buffer.
    type Config: Clone;

    /// The type of batch generated for training.
    type Batch;

    /// Builds a new replay buffer from the given configuration.
    fn build(config: &Self::Config) -> Result<Self>;

    /// Samples a batch of `size` experiences.
    fn batch(&mut self, size: usize) -> Result<Self::Batch>;

    /// Updates the priorities of the experiences at `ixs` with their absolute errors.
    ///
    /// `ixs` are the indices returned in a batch sampled from this buffer.
    fn update_priority(&mut self, ixs: &[usize], td_errs: &[f64]) -> Result<()>;
}
