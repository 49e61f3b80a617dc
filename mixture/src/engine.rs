use ndarray::{Array2, ArrayView1, ArrayView2, ArrayView3};
use rand::RngCore;

use crate::Result;

/// A device able to hold datasets and evaluate Gaussian mixtures over them.
///
/// Matrices returned by the engine live on its device and release their storage when dropped.
pub trait Engine {
    /// A device resident matrix of observations or log-densities.
    type Matrix;

    /// Binds the engine to `device`, must be called once before any upload.
    fn init(&mut self, device: usize) -> Result<()>;

    /// Copies a host matrix onto the device, possibly at a reduced precision.
    fn upload(&self, data: ArrayView2<f64>) -> Result<Self::Matrix>;

    /// Evaluates the weighted multivariate normal log-density of every observation in `data`
    /// under every component.
    ///
    /// # Arguments
    /// * `data` - An `n x d` device matrix.
    /// * `weights` - The `k` mixture weights.
    /// * `means` - The `k x d` component means.
    /// * `covs` - The `k x d x d` component covariances.
    ///
    /// # Returns
    /// An `n x k` device matrix where entry `(i, j)` is `ln w_j + ln N(x_i | mu_j, Sigma_j)`.
    fn mvnpdf_multi(
        &self,
        data: &Self::Matrix,
        weights: ArrayView1<f64>,
        means: ArrayView2<f64>,
        covs: ArrayView3<f64>,
    ) -> Result<Self::Matrix>;

    /// Draws one column index per row with probability proportional to `exp` of the row.
    fn sample_discrete(&self, densities: &Self::Matrix, rng: &mut dyn RngCore) -> Result<Vec<i32>>;

    /// Finds the index of the largest entry of every row, the first one on ties.
    fn row_argmax(&self, densities: &Self::Matrix) -> Result<Vec<i32>>;

    /// Copies a device matrix back to the host.
    fn download(&self, matrix: &Self::Matrix) -> Result<Array2<f64>>;
}
