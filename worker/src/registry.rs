use ndarray::{Array2, ArrayView2};

use crate::{Result, WorkerErr};

/// A registered observation matrix, kept both on the host and on the engine's device.
#[derive(Debug)]
pub struct Dataset<M> {
    host: Array2<f64>,
    device: M,
}

impl<M> Dataset<M> {
    pub fn new(host: Array2<f64>, device: M) -> Self {
        Self { host, device }
    }

    pub fn host(&self) -> ArrayView2<'_, f64> {
        self.host.view()
    }

    pub fn device(&self) -> &M {
        &self.device
    }

    /// The amount of observations (rows).
    pub fn nobs(&self) -> usize {
        self.host.nrows()
    }

    /// The dimension of every observation (columns).
    pub fn ndim(&self) -> usize {
        self.host.ncols()
    }
}

/// Append only arena of datasets, a dataset's handle is its arrival index.
#[derive(Debug)]
pub struct Registry<M> {
    datasets: Vec<Dataset<M>>,
}

impl<M> Default for Registry<M> {
    fn default() -> Self {
        Self {
            datasets: Vec::new(),
        }
    }
}

impl<M> Registry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `dataset` for the rest of the process' lifetime.
    ///
    /// # Returns
    /// The index the dataset will be addressed by.
    pub fn append(&mut self, dataset: Dataset<M>) -> usize {
        self.datasets.push(dataset);
        self.datasets.len() - 1
    }

    /// Looks up a dataset by index.
    ///
    /// # Errors
    /// `WorkerErr::DatasetOutOfRange` if no dataset was registered under `index`.
    pub fn get(&self, index: usize) -> Result<&Dataset<M>> {
        self.datasets
            .get(index)
            .ok_or(WorkerErr::DatasetOutOfRange {
                index,
                len: self.datasets.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}
