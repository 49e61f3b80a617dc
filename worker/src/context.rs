use log::{debug, info};
use mixture::Engine;
use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    Result,
    descriptor::RegisterParams,
    executor::{self, SubTask},
    registry::{Dataset, Registry},
    result::SubResult,
};

/// Everything a worker keeps between tasks.
///
/// The engine is bound to its device by the first registration and stays bound, the random
/// generator is reseeded by every registration.
pub struct WorkerContext<E: Engine> {
    engine: E,
    registry: Registry<E::Matrix>,
    rng: StdRng,
    engine_ready: bool,
}

impl<E: Engine> WorkerContext<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            registry: Registry::new(),
            rng: StdRng::seed_from_u64(0),
            engine_ready: false,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn registry(&self) -> &Registry<E::Matrix> {
        &self.registry
    }

    /// Applies the registration parameters, reseeding and binding the engine if needed.
    ///
    /// # Errors
    /// Engine initialization failures, which leave the context unbound.
    pub fn prepare(&mut self, params: &RegisterParams) -> Result<()> {
        self.rng = StdRng::seed_from_u64(params.seed);

        if !self.engine_ready {
            self.engine.init(params.device)?;
            self.engine_ready = true;
            info!(device = params.device; "engine bound to device");
        }

        Ok(())
    }

    /// Uploads a dataset and stores it.
    ///
    /// # Returns
    /// The index the coordinator must use to address it.
    pub fn register(&mut self, host: Array2<f64>) -> Result<usize> {
        let device = self.engine.upload(host.view())?;
        let (rows, cols) = host.dim();

        let index = self.registry.append(Dataset::new(host, device));
        info!(index = index, rows = rows, cols = cols; "dataset registered");

        Ok(index)
    }

    /// Runs the sub-tasks of a batch in order, stopping at the first failure.
    pub fn run_batch(&mut self, tasks: &[SubTask]) -> Result<Vec<SubResult>> {
        let Self {
            engine,
            registry,
            rng,
            ..
        } = self;

        tasks
            .iter()
            .enumerate()
            .map(|(i, task)| {
                debug!(subtask = i, dataset = task.descriptor.dataset; "running sub-task");
                executor::execute(&*engine, &*registry, &mut *rng, task)
            })
            .collect()
    }
}
