use anyhow::Result;
use log::info;
use per_core::PriorityMemoryConfig;
use per_sync::{
    worker_stats_fmt, ParamServer, PerSyncError, SharedMemory, TrainingControl, WorkerContext,
    WorkerManager, WorkerManagerConfig,
};
use std::{thread, time::Duration};
use test_log::test;

fn sgd(params: &mut [f32], grads: &[f32]) -> Result<()> {
    params.iter_mut().zip(grads).for_each(|(p, g)| *p -= g);
    Ok(())
}

#[test]
fn test_workers_share_parameters() -> Result<()> {
    let config = WorkerManagerConfig::default().n_workers(4).max_episodes(200);
    let server = ParamServer::new(vec![0.0; 8]);
    let mut manager = WorkerManager::build(&config, server.clone());

    let workers = (0..config.n_workers)
        .map(|_| {
            |ctx: &mut WorkerContext| -> Result<()> {
                let grads = vec![-1.0; ctx.local.values.len()];
                ctx.push_pull(&grads, &mut sgd)?;
                ctx.record_episode()?;
                Ok(())
            }
        })
        .collect::<Vec<_>>();
    manager.run(workers)?;
    let control = manager.control().clone();
    let stats = manager.join()?;
    info!("\n{}", worker_stats_fmt(&stats));

    assert_eq!(stats.len(), 4);
    assert_eq!(stats.iter().map(|s| s.id).collect::<Vec<_>>(), vec![0, 1, 2, 3]);

    // Each push adds exactly one to every parameter
    let pushes: usize = stats.iter().map(|s| s.pushes).sum();
    let snapshot = server.snapshot()?;
    assert_eq!(snapshot.version, pushes);
    assert!(snapshot.values.iter().all(|&v| v == pushes as f32));

    // Workers may overshoot the budget by at most one episode each
    let episodes = control.episodes()?;
    assert!(episodes >= 200 && episodes <= 200 + 4);
    Ok(())
}

#[test]
fn test_convergence_stops_workers() -> Result<()> {
    let control = TrainingControl::new(usize::MAX);
    let mut manager = WorkerManager::with_control(ParamServer::new(vec![]), control.clone());

    let workers = (0..2)
        .map(|_| {
            |ctx: &mut WorkerContext| -> Result<()> {
                if ctx.record_episode()? >= 50 {
                    ctx.control().mark_converged()?;
                }
                Ok(())
            }
        })
        .collect::<Vec<_>>();
    manager.run(workers)?;
    let stats = manager.join()?;

    assert!(control.is_converged()?);
    assert!(stats.iter().map(|s| s.steps).sum::<usize>() >= 50);
    Ok(())
}

#[test]
fn test_stop_request() -> Result<()> {
    let mut manager = WorkerManager::build(
        &WorkerManagerConfig::default().max_episodes(usize::MAX),
        ParamServer::new(vec![1.0]),
    );
    manager.run(vec![|_: &mut WorkerContext| -> Result<()> {
        thread::sleep(Duration::from_millis(1));
        Ok(())
    }])?;

    thread::sleep(Duration::from_millis(20));
    manager.stop()?;
    let stats = manager.join()?;
    assert_eq!(stats.len(), 1);
    Ok(())
}

#[test]
fn test_failing_worker_stops_others() -> Result<()> {
    let mut manager = WorkerManager::build(
        &WorkerManagerConfig::default().max_episodes(usize::MAX),
        ParamServer::new(vec![1.0, 2.0]),
    );
    let workers = (0..3)
        .map(|i| {
            move |ctx: &mut WorkerContext| -> Result<()> {
                // Worker 2 pushes gradients of a wrong length
                let grads = vec![0.0; if i == 2 { 1 } else { 2 }];
                ctx.push_pull(&grads, &mut sgd)
            }
        })
        .collect::<Vec<_>>();
    manager.run(workers)?;

    let err = manager.join().unwrap_err();
    assert_eq!(
        err.downcast_ref::<PerSyncError>(),
        Some(&PerSyncError::LengthMismatch { params: 2, grads: 1 })
    );
    Ok(())
}

#[test]
fn test_panicking_worker_stops_others() -> Result<()> {
    let mut manager = WorkerManager::build(
        &WorkerManagerConfig::default().max_episodes(usize::MAX),
        ParamServer::new(vec![]),
    );
    let workers = (0..2)
        .map(|i| {
            move |_: &mut WorkerContext| -> Result<()> {
                if i == 1 {
                    panic!("worker {} failed", i);
                }
                thread::sleep(Duration::from_millis(1));
                Ok(())
            }
        })
        .collect::<Vec<_>>();
    manager.run(workers)?;

    // join returns only after worker 0 has seen the stop flag
    let err = manager.join().unwrap_err();
    assert_eq!(
        err.downcast_ref::<PerSyncError>(),
        Some(&PerSyncError::WorkerPanicked(1))
    );
    Ok(())
}

#[test]
fn test_actors_feed_shared_memory() -> Result<()> {
    let memory = SharedMemory::<(usize, usize)>::build(&PriorityMemoryConfig::default().capacity(256))?;
    let mut manager = WorkerManager::build(
        &WorkerManagerConfig::default().max_episodes(400),
        ParamServer::new(vec![]),
    );

    let workers = (0..4)
        .map(|_| {
            let memory = memory.clone();
            let mut t = 0;
            move |ctx: &mut WorkerContext| -> Result<()> {
                memory.store((ctx.id, t))?;
                t += 1;
                ctx.record_episode()?;
                Ok(())
            }
        })
        .collect::<Vec<_>>();
    manager.run(workers)?;

    // Learner cycles run as critical sections while actors store
    for _ in 0..20 {
        memory.with(|m| -> Result<()> {
            if m.len() >= 8 {
                let batch = m.sample(8)?;
                let errors = batch.transitions.iter().map(|&(id, _)| id as f64).collect::<Vec<_>>();
                m.update(&batch.indices, &errors)?;
            }
            Ok(())
        })??;
    }

    manager.join()?;
    assert!(memory.len()? >= 200);
    assert!(memory.total_priority()? > 0.0);
    Ok(())
}
