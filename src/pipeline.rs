//! Multi-stage optimization.
//!
//! A deep network is built up from subsystems: each layer pair is
//! pretrained as an independent two-layer model, its resulting parameters
//! parked in the checkpoint store under a per-stage key, and a final
//! assembly step consumes all stored stages (typically followed by a
//! global fine-tuning run).

use tracing::info;

use crate::{
    error::Result,
    store::{CheckpointStore, Slot},
};

/// One stage of a pipeline: a key to file the outcome under, and the work
/// producing that outcome. The closure sees the store so it can build on
/// earlier stages (e.g. transform its input through the previous layer).
pub struct Stage<R> {
    key: String,
    run: Box<dyn FnMut(&CheckpointStore<R>) -> Result<R>>,
}

impl<R> Stage<R> {
    pub fn new(
        key: impl Into<String>,
        run: impl FnMut(&CheckpointStore<R>) -> Result<R> + 'static,
    ) -> Self {
        Self { key: key.into(), run: Box::new(run) }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// An ordered list of stages sharing one checkpoint store.
pub struct Pipeline<R> {
    stages: Vec<Stage<R>>,
    store: CheckpointStore<R>,
}

impl<R: Clone + Default> Default for Pipeline<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Clone + Default> Pipeline<R> {
    pub fn new() -> Self {
        Self { stages: Vec::new(), store: CheckpointStore::new() }
    }

    pub fn stage(mut self, stage: Stage<R>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Run every stage in order, writing each outcome at the next
    /// contiguous index under the stage's key. A failing stage aborts the
    /// pipeline; earlier results stay in the store.
    pub fn run(&mut self) -> Result<()> {
        let total = self.stages.len();

        for (index, stage) in self.stages.iter_mut().enumerate() {
            info!("stage {}/{}: {}", index + 1, total, stage.key);
            let record = (stage.run)(&self.store)?;
            let next = self.store.len(&stage.key);
            self.store.write(&stage.key, Slot::At(next), false, record)?;
        }

        Ok(())
    }

    /// Consume the accumulated stage records, e.g. to assemble the full
    /// network before fine-tuning.
    pub fn assemble<T>(
        &self,
        assemble: impl FnOnce(&CheckpointStore<R>) -> Result<T>,
    ) -> Result<T> {
        assemble(&self.store)
    }

    pub fn store(&self) -> &CheckpointStore<R> {
        &self.store
    }

    pub fn into_store(self) -> CheckpointStore<R> {
        self.store
    }
}
