//! Primitives for training with several workers.
//!
//! # Components
//!
//! * [`SharedMemory`]: a [`PriorityMemory`](per_core::PriorityMemory) shared between
//!   threads, where a whole store/sample/update cycle runs under one lock.
//! * [`ParamServer`]: a shared parameter set. Workers [`pull`](ParamServer::pull) a
//!   local copy and [`push`](ParamServer::push) gradients, applied by an [`Optimizer`].
//! * [`TrainingControl`]: the episode counter and convergence flag shared by workers.
//! * [`WorkerManager`]: runs [`Worker`]s on threads until training finishes.
mod control;
mod error;
mod param_server;
mod shared_memory;
mod worker;
pub use control::TrainingControl;
pub use error::PerSyncError;
pub use param_server::{LocalParams, Optimizer, ParamServer};
pub use shared_memory::SharedMemory;
pub use worker::{
    worker_stats_fmt, Worker, WorkerContext, WorkerManager, WorkerManagerConfig, WorkerStat,
};
