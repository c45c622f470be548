#![warn(missing_docs)]
//! Prioritized experience replay for reinforcement learning.
//!
//! The crate provides a fixed-capacity replay memory that samples transitions
//! in proportion to their priority, derived from the absolute prediction error
//! an agent reports for each sampled transition.
//!
//! # Key Components
//!
//! - [`PriorityTree`]: array-backed sum-tree indexing priorities of stored items
//! - [`PriorityMemory`]: replay memory implementing store, stratified sampling
//!   with importance-sampling weights, and priority update
//! - [`PriorityMemoryConfig`]: configuration, loadable from YAML
//! - [`ExperienceBufferBase`] and [`ReplayBufferBase`]: traits agents are written against
//!
//! # Examples
//!
//! ```rust
//! use per_core::{PriorityMemory, PriorityMemoryConfig};
//!
//! let config = PriorityMemoryConfig::default().capacity(8).seed(1);
//! let mut memory = PriorityMemory::<u32>::build(&config).unwrap();
//!
//! for i in 0..8 {
//!     memory.store(i).unwrap();
//! }
//!
//! let batch = memory.sample(4).unwrap();
//! assert_eq!(batch.len(), 4);
//!
//! // Errors are computed by the agent for the sampled transitions
//! let errors = vec![0.5; batch.len()];
//! memory.update(&batch.indices, &errors).unwrap();
//! ```
mod base;
mod beta_scheduler;
mod config;
mod error;
mod memory;
mod priority_tree;
mod transition;
pub use base::{ExperienceBufferBase, ReplayBufferBase};
pub use beta_scheduler::BetaScheduler;
pub use config::PriorityMemoryConfig;
pub use error::PerError;
pub use memory::{PriorityMemory, SampledBatch};
pub use priority_tree::{Leaf, PriorityTree};
pub use transition::Transition;
