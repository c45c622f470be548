//! Shared parameter set updated by several workers.
use crate::{error::lock, PerSyncError};
use anyhow::Result;
use log::trace;
use std::sync::{Arc, Mutex};

/// Applies gradients to parameters.
///
/// Closures `FnMut(&mut [f32], &[f32]) -> Result<()>` implement this trait.
pub trait Optimizer {
    /// Updates `params` in place with `grads`, which have the same length.
    fn apply(&mut self, params: &mut [f32], grads: &[f32]) -> Result<()>;
}

impl<F> Optimizer for F
where
    F: FnMut(&mut [f32], &[f32]) -> Result<()>,
{
    fn apply(&mut self, params: &mut [f32], grads: &[f32]) -> Result<()> {
        self(params, grads)
    }
}

/// A worker's copy of the shared parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalParams {
    /// Parameter values.
    pub values: Vec<f32>,

    /// Version of the shared parameters the values were copied from.
    pub version: usize,
}

#[derive(Debug)]
struct Params {
    values: Vec<f32>,
    version: usize,
}

/// Parameter set shared by workers.
///
/// Every [`push`](Self::push) runs under the lock, so pushes of different workers
/// never interleave. Clones refer to the same parameters.
#[derive(Clone, Debug)]
pub struct ParamServer {
    len: usize,
    params: Arc<Mutex<Params>>,
}

impl ParamServer {
    /// Creates a server holding `values`, at version 0.
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            len: values.len(),
            params: Arc::new(Mutex::new(Params { values, version: 0 })),
        }
    }

    /// Returns the number of parameters.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the server holds no parameter.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of pushes committed so far.
    pub fn version(&self) -> Result<usize> {
        Ok(lock(&self.params, "parameter server")?.version)
    }

    /// Returns a copy of the shared parameters.
    pub fn snapshot(&self) -> Result<LocalParams> {
        let params = lock(&self.params, "parameter server")?;
        Ok(LocalParams {
            values: params.values.clone(),
            version: params.version,
        })
    }

    /// Overwrites `local` with the shared parameters.
    pub fn pull(&self, local: &mut LocalParams) -> Result<()> {
        let params = lock(&self.params, "parameter server")?;
        copy_into(&params, local);
        Ok(())
    }

    /// Applies `grads` to the shared parameters with `optimizer`.
    ///
    /// The optimizer works on a copy, which is committed only if it succeeds.
    /// Returns the version after the commit.
    pub fn push<O: Optimizer + ?Sized>(&self, grads: &[f32], optimizer: &mut O) -> Result<usize> {
        let mut params = lock(&self.params, "parameter server")?;
        commit(&mut params, grads, optimizer)
    }

    /// Pushes `grads` and pulls the result into `local` within one critical section.
    pub fn push_pull<O: Optimizer + ?Sized>(
        &self,
        grads: &[f32],
        optimizer: &mut O,
        local: &mut LocalParams,
    ) -> Result<usize> {
        let mut params = lock(&self.params, "parameter server")?;
        let version = commit(&mut params, grads, optimizer)?;
        copy_into(&params, local);
        Ok(version)
    }
}

fn copy_into(params: &Params, local: &mut LocalParams) {
    local.values.clear();
    local.values.extend_from_slice(&params.values);
    local.version = params.version;
}

fn commit<O: Optimizer + ?Sized>(
    params: &mut Params,
    grads: &[f32],
    optimizer: &mut O,
) -> Result<usize> {
    if grads.len() != params.values.len() {
        return Err(PerSyncError::LengthMismatch {
            params: params.values.len(),
            grads: grads.len(),
        }
        .into());
    }

    let mut values = params.values.clone();
    optimizer.apply(&mut values, grads)?;
    params.values = values;
    params.version += 1;
    trace!("Committed parameters, version {}", params.version);

    Ok(params.version)
}
