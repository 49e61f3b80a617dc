use std::f64::consts::PI;

use log::info;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayView3, Axis, Zip};
use rand::{
    RngCore,
    distr::{Distribution, weighted::WeightedIndex},
};

use crate::{Engine, EngineErr, Result, linalg};

/// A matrix held by the `HostEngine`, single precision like a GPU resident copy.
#[derive(Debug, Clone)]
pub struct HostMatrix {
    data: Array2<f32>,
}

impl HostMatrix {
    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }
}

/// A precomputed mixture component, `offset` folds the weight and normalizing constant.
struct Component {
    chol: Array2<f64>,
    mean: Array1<f64>,
    offset: f64,
}

/// Reference engine running on the host's cores.
#[derive(Debug, Default)]
pub struct HostEngine {
    device: Option<usize>,
}

impl HostEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the device this engine was bound to, if any.
    pub fn device(&self) -> Option<usize> {
        self.device
    }

    fn components(
        weights: ArrayView1<f64>,
        means: ArrayView2<f64>,
        covs: ArrayView3<f64>,
    ) -> Result<Vec<Component>> {
        let dim = means.ncols();
        let norm = dim as f64 * (2. * PI).ln();

        means
            .rows()
            .into_iter()
            .zip(covs.outer_iter())
            .zip(weights)
            .enumerate()
            .map(|(component, ((mean, cov), &weight))| {
                let chol = linalg::cholesky(cov)
                    .ok_or(EngineErr::NotPositiveDefinite { component })?;
                let log_det = 2. * chol.diag().mapv(f64::ln).sum();

                Ok(Component {
                    chol,
                    mean: mean.to_owned(),
                    offset: weight.ln() - 0.5 * (norm + log_det),
                })
            })
            .collect()
    }
}

fn check_size(a: &'static str, b: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(EngineErr::SizeMismatch {
            a,
            b,
            got,
            expected,
        });
    }

    Ok(())
}

impl Engine for HostEngine {
    type Matrix = HostMatrix;

    fn init(&mut self, device: usize) -> Result<()> {
        if let Some(device) = self.device {
            return Err(EngineErr::AlreadyInitialized { device });
        }

        info!(device = device, threads = rayon::current_num_threads(); "host engine initialized");
        self.device = Some(device);
        Ok(())
    }

    fn upload(&self, data: ArrayView2<f64>) -> Result<HostMatrix> {
        if self.device.is_none() {
            return Err(EngineErr::NotInitialized);
        }

        let data = data.mapv(|x| x as f32);
        Ok(HostMatrix { data })
    }

    fn mvnpdf_multi(
        &self,
        data: &HostMatrix,
        weights: ArrayView1<f64>,
        means: ArrayView2<f64>,
        covs: ArrayView3<f64>,
    ) -> Result<HostMatrix> {
        let (nobs, dim) = data.data.dim();
        let ncomp = weights.len();

        check_size("means", "weights", means.nrows(), ncomp)?;
        check_size("means", "data", means.ncols(), dim)?;
        check_size("covariances", "weights", covs.len_of(Axis(0)), ncomp)?;
        check_size("covariances", "data", covs.len_of(Axis(1)), dim)?;
        check_size("covariances", "data", covs.len_of(Axis(2)), dim)?;

        let components = Self::components(weights, means, covs)?;
        let mut densities = Array2::<f32>::zeros((nobs, ncomp));

        Zip::from(densities.rows_mut())
            .and(data.data.rows())
            .par_for_each(|mut out, x| {
                let mut z = vec![0.; dim];

                for (dens, comp) in out.iter_mut().zip(&components) {
                    for ((zi, &xi), &mu) in z.iter_mut().zip(x.iter()).zip(comp.mean.iter()) {
                        *zi = f64::from(xi) - mu;
                    }

                    linalg::solve_lower_in_place(&comp.chol, &mut z);
                    let maha: f64 = z.iter().map(|z| z * z).sum();
                    *dens = (comp.offset - 0.5 * maha) as f32;
                }
            });

        Ok(HostMatrix { data: densities })
    }

    fn sample_discrete(&self, densities: &HostMatrix, rng: &mut dyn RngCore) -> Result<Vec<i32>> {
        densities
            .data
            .rows()
            .into_iter()
            .enumerate()
            .map(|(row, logs)| {
                // Shifting by the row max keeps the largest weight at exp(0).
                let max = logs.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                let weights = logs.iter().map(|&v| f64::from(v - max).exp());

                // A row with no finite entry yields NaN or all zero weights.
                let dist =
                    WeightedIndex::new(weights).map_err(|_| EngineErr::DegenerateRow { row })?;

                Ok(dist.sample(rng) as i32)
            })
            .collect()
    }

    fn row_argmax(&self, densities: &HostMatrix) -> Result<Vec<i32>> {
        let argmax = densities
            .data
            .rows()
            .into_iter()
            .map(|logs| {
                let mut best = 0;
                for (j, &v) in logs.iter().enumerate() {
                    if v > logs[best] {
                        best = j;
                    }
                }
                best as i32
            })
            .collect();

        Ok(argmax)
    }

    fn download(&self, matrix: &HostMatrix) -> Result<Array2<f64>> {
        Ok(matrix.data.mapv(f64::from))
    }
}
