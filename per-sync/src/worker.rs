//! Workers running on threads until training finishes.
use crate::{error::lock, LocalParams, Optimizer, ParamServer, PerSyncError, TrainingControl};
use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    panic::{self, AssertUnwindSafe},
    path::Path,
    sync::{Arc, Mutex},
    thread::JoinHandle,
    time::{Duration, SystemTime},
};

/// Configuration of [`WorkerManager`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct WorkerManagerConfig {
    /// Number of workers.
    ///
    /// The default value is 3.
    pub n_workers: usize,

    /// Number of episodes, counted over all workers, after which training finishes.
    ///
    /// The default value is 3000.
    pub max_episodes: usize,
}

impl Default for WorkerManagerConfig {
    fn default() -> Self {
        Self {
            n_workers: 3,
            max_episodes: 3000,
        }
    }
}

impl WorkerManagerConfig {
    /// Sets the number of workers.
    pub fn n_workers(mut self, v: usize) -> Self {
        self.n_workers = v;
        self
    }

    /// Sets the number of episodes.
    pub fn max_episodes(mut self, v: usize) -> Self {
        self.max_episodes = v;
        self
    }

    /// Constructs [`WorkerManagerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`WorkerManagerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// State handed to [`Worker::step`].
pub struct WorkerContext {
    /// Worker id, from 0 to `n_workers - 1`.
    pub id: usize,

    /// Local copy of the shared parameters.
    pub local: LocalParams,

    server: ParamServer,
    control: TrainingControl,
    pushes: usize,
}

impl WorkerContext {
    /// Pushes gradients to the shared parameters and refreshes the local copy.
    pub fn push_pull<O: Optimizer + ?Sized>(
        &mut self,
        grads: &[f32],
        optimizer: &mut O,
    ) -> Result<()> {
        self.server.push_pull(grads, optimizer, &mut self.local)?;
        self.pushes += 1;
        Ok(())
    }

    /// Refreshes the local copy without pushing.
    pub fn pull(&mut self) -> Result<()> {
        self.server.pull(&mut self.local)
    }

    /// Counts a finished episode and returns the number of episodes over all workers.
    pub fn record_episode(&self) -> Result<usize> {
        self.control.record_episode()
    }

    /// Returns the shared training control.
    pub fn control(&self) -> &TrainingControl {
        &self.control
    }
}

/// A unit of work repeated by a worker thread.
///
/// Closures `FnMut(&mut WorkerContext) -> Result<()>` implement this trait.
pub trait Worker: Send + 'static {
    /// Runs one step, typically some environment steps followed by a push.
    fn step(&mut self, ctx: &mut WorkerContext) -> Result<()>;
}

impl<F> Worker for F
where
    F: FnMut(&mut WorkerContext) -> Result<()> + Send + 'static,
{
    fn step(&mut self, ctx: &mut WorkerContext) -> Result<()> {
        self(ctx)
    }
}

/// Stats of a worker.
#[derive(Clone, Debug)]
pub struct WorkerStat {
    /// Worker id.
    pub id: usize,

    /// Number of calls of [`Worker::step`].
    pub steps: usize,

    /// Number of pushes to the parameter server.
    pub pushes: usize,

    /// Duration of the worker loop.
    pub duration: Duration,
}

/// Returns a formatted string of the set of [`WorkerStat`] for reporting.
pub fn worker_stats_fmt(stats: &[WorkerStat]) -> String {
    let mut s = "worker id, steps, pushes, duration [sec], steps per sec\n".to_string();
    for stat in stats.iter() {
        let d = stat.duration.as_secs_f32();
        let p = (stat.steps as f32) / d;
        s += format!("{}, {}, {}, {}, {}\n", stat.id, stat.steps, stat.pushes, d, p).as_str();
    }
    s
}

type Report = (usize, Result<WorkerStat>);

/// Runs [`Worker`]s on threads.
///
/// Each worker starts from a copy of the shared parameters and repeats
/// [`Worker::step`] until [`TrainingControl::is_done`] returns `true`,
/// [`stop`](Self::stop) is called, or a step fails. A failing worker stops
/// the others, and so does a panicking one.
pub struct WorkerManager {
    server: ParamServer,
    control: TrainingControl,

    /// Flag to stop workers.
    stop: Arc<Mutex<bool>>,

    threads: Vec<(usize, JoinHandle<()>)>,
    report_sender: Sender<Report>,
    report_receiver: Receiver<Report>,
}

impl WorkerManager {
    /// Builds a manager with a fresh [`TrainingControl`].
    pub fn build(config: &WorkerManagerConfig, server: ParamServer) -> Self {
        Self::with_control(server, TrainingControl::new(config.max_episodes))
    }

    /// Builds a manager sharing an existing [`TrainingControl`].
    pub fn with_control(server: ParamServer, control: TrainingControl) -> Self {
        let (report_sender, report_receiver) = unbounded();
        Self {
            server,
            control,
            stop: Arc::new(Mutex::new(false)),
            threads: vec![],
            report_sender,
            report_receiver,
        }
    }

    /// Returns the training control shared with the workers.
    pub fn control(&self) -> &TrainingControl {
        &self.control
    }

    /// Spawns one thread per worker.
    pub fn run<W: Worker>(&mut self, workers: Vec<W>) -> Result<()> {
        for worker in workers.into_iter() {
            let id = self.threads.len();
            let ctx = WorkerContext {
                id,
                local: self.server.snapshot()?,
                server: self.server.clone(),
                control: self.control.clone(),
                pushes: 0,
            };
            let stop = self.stop.clone();
            let sender = self.report_sender.clone();

            let handle = std::thread::spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    Self::run_worker(worker, ctx, &stop)
                }))
                .unwrap_or_else(|_| {
                    warn!("Worker {} panicked", id);
                    Err(PerSyncError::WorkerPanicked(id).into())
                });
                if result.is_err() {
                    // Other workers finish at their next check
                    if let Ok(mut stop) = lock(&stop, "stop flag") {
                        *stop = true;
                    }
                }
                if sender.send((id, result)).is_err() {
                    warn!("Worker {} could not report its stats", id);
                }
            });
            self.threads.push((id, handle));
            info!("Starts worker {}", id);
        }

        Ok(())
    }

    fn run_worker<W: Worker>(
        mut worker: W,
        mut ctx: WorkerContext,
        stop: &Arc<Mutex<bool>>,
    ) -> Result<WorkerStat> {
        let time = SystemTime::now();
        let mut steps = 0;

        loop {
            if *lock(stop, "stop flag")? || ctx.control.is_done()? {
                break;
            }
            worker.step(&mut ctx)?;
            steps += 1;
        }

        let duration = time.elapsed().unwrap_or_default();
        info!("Worker {} finished after {} steps", ctx.id, steps);

        Ok(WorkerStat {
            id: ctx.id,
            steps,
            pushes: ctx.pushes,
            duration,
        })
    }

    /// Asks workers to finish after their current step.
    pub fn stop(&self) -> Result<()> {
        *lock(&self.stop, "stop flag")? = true;
        Ok(())
    }

    /// Waits until all workers finish and returns their stats, ordered by id.
    ///
    /// Returns the error of the failed worker with the smallest id, if any.
    /// A panicking worker fails with [`PerSyncError::WorkerPanicked`].
    pub fn join(self) -> Result<Vec<WorkerStat>> {
        let n = self.threads.len();
        let mut panicked = None;
        for (id, h) in self.threads {
            if h.join().is_err() && panicked.is_none() {
                panicked = Some(id);
            }
        }
        drop(self.report_sender);
        if let Some(id) = panicked {
            return Err(PerSyncError::WorkerPanicked(id).into());
        }

        let mut reports = self.report_receiver.iter().take(n).collect::<Vec<_>>();
        reports.sort_by_key(|(id, _)| *id);
        reports.into_iter().map(|(_, result)| result).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_worker_manager_config() -> Result<()> {
        let config = WorkerManagerConfig::default().n_workers(4).max_episodes(100);

        let dir = TempDir::new("worker_manager_config")?;
        let path = dir.path().join("worker_manager_config.yaml");
        config.save(&path)?;
        let config_ = WorkerManagerConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_stats_fmt() {
        let stats = vec![WorkerStat {
            id: 0,
            steps: 10,
            pushes: 5,
            duration: Duration::from_secs(2),
        }];
        let s = worker_stats_fmt(&stats);
        assert!(s.contains("0, 10, 5, 2, 5"));
    }
}
