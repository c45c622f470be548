use anyhow::Result;
use per_core::{
    ExperienceBufferBase, PerError, PriorityMemory, PriorityMemoryConfig, PriorityTree,
    ReplayBufferBase, SampledBatch, Transition,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use test_log::test;

type Tr = Transition<Vec<f32>, usize>;

fn transition(i: usize) -> Tr {
    Transition::new(vec![i as f32; 4], i % 2, 1.0, vec![i as f32 + 1.0; 4], i % 10 == 9)
}

fn assert_root_is_sum<T>(tree: &PriorityTree<T>) {
    let sum: f64 = tree.leaf_priorities().iter().sum();
    assert!((tree.total_priority() - sum).abs() <= 1e-9 * sum.max(1.0));
}

#[test]
fn test_training_cycle_keeps_invariants() -> Result<()> {
    let config = PriorityMemoryConfig::default()
        .capacity(100)
        .alpha(0.6)
        .priority_epsilon(0.01)
        .absolute_error_clip(1.0)
        .beta_increment_per_sample(0.01)
        .seed(11);
    let mut memory = PriorityMemory::<Tr>::build(&config)?;
    let mut rng = StdRng::seed_from_u64(5);

    for step in 0..1000 {
        memory.store(transition(step))?;
        assert_root_is_sum(memory.tree());

        if memory.len() >= 32 && step % 4 == 0 {
            let batch = memory.sample(32)?;
            assert_eq!(batch.len(), 32);
            assert_eq!(batch.transitions.len(), 32);
            assert!(batch.weights.iter().all(|&w| w > 0.0 && w.is_finite()));

            let errors = (0..32).map(|_| rng.gen_range(-3.0..3.0)).collect::<Vec<f64>>();
            memory.update(&batch.indices, &errors)?;
            assert_root_is_sum(memory.tree());
        }
    }

    assert_eq!(memory.len(), 100);
    assert!(memory
        .tree()
        .leaf_priorities()
        .iter()
        .all(|&p| p >= config.priority_epsilon && p <= config.absolute_error_clip));
    assert_eq!(memory.beta(), 1.0);

    Ok(())
}

#[test]
fn test_most_recent_transitions_are_kept() -> Result<()> {
    let config = PriorityMemoryConfig::default().capacity(16);
    let mut memory = PriorityMemory::<Tr>::build(&config)?;
    (0..16 + 5).try_for_each(|i| memory.store(transition(i)))?;

    let mut kept = (0..16)
        .map(|ix| memory.tree().data(ix).unwrap().state[0] as usize)
        .collect::<Vec<_>>();
    kept.sort();
    assert_eq!(kept, (5..21).collect::<Vec<_>>());

    Ok(())
}

#[test]
fn test_high_priority_sampled_more_often() -> Result<()> {
    let config = PriorityMemoryConfig::default()
        .capacity(4)
        .alpha(1.0)
        .priority_epsilon(0.01)
        .absolute_error_clip(100.0)
        .seed(3);
    let mut memory = PriorityMemory::<usize>::build(&config)?;
    (0..4).try_for_each(|i| memory.store(i))?;
    memory.update(&[3, 4, 5, 6], &[0.99, 0.99, 0.99, 96.99])?;

    let mut counts = [0usize; 4];
    for _ in 0..500 {
        let batch = memory.sample(1)?;
        counts[batch.transitions[0]] += 1;
    }

    // The last transition holds 97 % of the mass
    assert!(counts[3] > 400);
    Ok(())
}

#[test]
fn test_buffer_traits() -> Result<()> {
    fn cycle<R>(buffer: &mut R) -> Result<()>
    where
        R: ExperienceBufferBase<Item = usize> + ReplayBufferBase<Batch = SampledBatch<usize>>,
    {
        for i in 0..10 {
            buffer.push(i)?;
        }
        assert_eq!(ExperienceBufferBase::len(buffer), 10);
        let batch = buffer.batch(5)?;
        buffer.update_priority(&batch.indices, &vec![0.2; 5])?;
        assert!(buffer.update_priority(&batch.indices, &[0.2]).is_err());
        Ok(())
    }

    let config = PriorityMemoryConfig::default().capacity(10);
    let mut memory = <PriorityMemory<usize> as ReplayBufferBase>::build(&config)?;
    cycle(&mut memory)
}

#[test]
fn test_lookup_scenario() -> Result<()> {
    let mut tree = PriorityTree::new(4)?;
    for (i, &p) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
        tree.add(p, i)?;
    }
    assert_eq!(tree.total_priority(), 10.0);

    // 3.0 is the sum of the left subtree of the root, the tie resolves left
    assert_eq!(tree.get_leaf(3.0)?.priority, 2.0);
    assert_eq!(tree.get_leaf(3.0 + 1e-12)?.priority, 3.0);
    assert_eq!(tree.get_leaf(4.5)?.priority, 3.0);

    Ok(())
}

#[test]
fn test_sample_from_empty_memory() -> Result<()> {
    let mut memory = PriorityMemory::<usize>::build(&PriorityMemoryConfig::default())?;
    let err = memory.sample(1).err().unwrap();
    assert!(matches!(
        err.downcast_ref::<PerError>(),
        Some(PerError::InvalidState(_))
    ));
    Ok(())
}
