//! Replay memory shared between threads.
use crate::error::lock;
use anyhow::Result;
use per_core::{PriorityMemory, PriorityMemoryConfig, SampledBatch};
use std::sync::{Arc, Mutex};

/// A [`PriorityMemory`] behind a mutex.
///
/// Each method locks the memory for its own duration. A learner that samples,
/// computes errors and updates priorities should run the whole cycle inside
/// [`with`](Self::with), otherwise another thread may overwrite the sampled
/// slots before their priorities are updated.
pub struct SharedMemory<T> {
    memory: Arc<Mutex<PriorityMemory<T>>>,
}

impl<T> Clone for SharedMemory<T> {
    fn clone(&self) -> Self {
        Self {
            memory: self.memory.clone(),
        }
    }
}

impl<T: Clone> SharedMemory<T> {
    /// Wraps a memory.
    pub fn new(memory: PriorityMemory<T>) -> Self {
        Self {
            memory: Arc::new(Mutex::new(memory)),
        }
    }

    /// Builds an empty shared memory.
    pub fn build(config: &PriorityMemoryConfig) -> Result<Self> {
        Ok(Self::new(PriorityMemory::build(config)?))
    }

    /// Runs `f` with exclusive access to the memory.
    pub fn with<R>(&self, f: impl FnOnce(&mut PriorityMemory<T>) -> R) -> Result<R> {
        let mut memory = lock(&self.memory, "replay memory")?;
        Ok(f(&mut memory))
    }

    /// Stores a transition.
    pub fn store(&self, transition: T) -> Result<()> {
        self.with(|m| m.store(transition))?
    }

    /// Samples `n` transitions.
    pub fn sample(&self, n: usize) -> Result<SampledBatch<T>> {
        self.with(|m| m.sample(n))?
    }

    /// Updates priorities with absolute errors.
    pub fn update(&self, indices: &[usize], absolute_errors: &[f64]) -> Result<()> {
        self.with(|m| m.update(indices, absolute_errors))?
    }

    /// Returns the total priority.
    pub fn total_priority(&self) -> Result<f64> {
        self.with(|m| m.total_priority())
    }

    /// Returns the number of stored transitions.
    pub fn len(&self) -> Result<usize> {
        self.with(|m| m.len())
    }
}

#[cfg(test)]
mod tests {
    use super::SharedMemory;
    use anyhow::Result;
    use per_core::PriorityMemoryConfig;
    use std::thread;

    #[test]
    fn test_concurrent_stores() -> Result<()> {
        let config = PriorityMemoryConfig::default().capacity(1000);
        let memory = SharedMemory::<usize>::build(&config)?;

        let handles = (0..4)
            .map(|id| {
                let memory = memory.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        memory.store(id * 100 + i).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(memory.len()?, 400);
        assert_eq!(memory.total_priority()?, 400.0);
        Ok(())
    }

    #[test]
    fn test_cycle_in_critical_section() -> Result<()> {
        let config = PriorityMemoryConfig::default().capacity(8);
        let memory = SharedMemory::<usize>::build(&config)?;
        (0..8).try_for_each(|i| memory.store(i))?;

        let total = memory.with(|m| -> Result<f64> {
            let batch = m.sample(4)?;
            m.update(&batch.indices, &vec![0.0; 4])?;
            Ok(m.total_priority())
        })??;
        assert!(total < 8.0);
        Ok(())
    }
}
