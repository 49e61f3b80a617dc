use log::debug;
use mixture::{Engine, EngineErr};
use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use rand::RngCore;

use crate::{
    Result,
    descriptor::{Descriptor, Layout, SubTaskKind, expect_len},
    registry::Registry,
    result::SubResult,
};

/// A fully received sub-task, ready to run.
#[derive(Debug, Clone)]
pub struct SubTask {
    pub descriptor: Descriptor,
    pub weights: Array1<f64>,
    pub means: Array2<f64>,
    pub covs: Array3<f64>,
}

impl SubTask {
    /// Shapes the flat parameter buffers of a sub-task.
    ///
    /// # Errors
    /// `WorkerErr::LengthMismatch` if a buffer does not match `layout`.
    pub fn from_buffers(
        descriptor: Descriptor,
        layout: Layout,
        weights: Vec<f64>,
        means: Vec<f64>,
        covs: Vec<f64>,
    ) -> Result<Self> {
        expect_len("weights", weights.len(), layout.weights())?;
        expect_len("means", means.len(), layout.means_len())?;
        expect_len("covariances", covs.len(), layout.covariances_len())?;

        Ok(Self {
            descriptor,
            weights: Array1::from(weights),
            means: Array2::from_shape_vec(layout.means(), means)?,
            covs: Array3::from_shape_vec(layout.covariances(), covs)?,
        })
    }
}

/// Runs a sub-task against its dataset.
///
/// The log-density matrix lives on the engine's device only for the duration of this call.
pub fn execute<E: Engine>(
    engine: &E,
    registry: &Registry<E::Matrix>,
    rng: &mut dyn RngCore,
    task: &SubTask,
) -> Result<SubResult> {
    let Descriptor {
        dataset, kind, gid, ..
    } = task.descriptor;

    let dataset = registry.get(dataset)?;
    let nobs = dataset.nobs() as i32;

    let densities = engine.mvnpdf_multi(
        dataset.device(),
        task.weights.view(),
        task.means.view(),
        task.covs.view(),
    )?;

    let result = match kind {
        SubTaskKind::Labels => {
            let labels = engine.sample_discrete(&densities, rng)?;
            SubResult::Labels { nobs, labels, gid }
        }
        SubTaskKind::Relabel => {
            let hard = engine.row_argmax(&densities)?;
            let labels = engine.sample_discrete(&densities, rng)?;
            SubResult::Relabel {
                nobs,
                labels,
                gid,
                hard,
            }
        }
        SubTaskKind::Statistics => {
            let logs = engine.download(&densities)?;
            statistics(nobs, gid, logs, dataset.host())?
        }
    };

    drop(densities);
    debug!(gid = gid, nobs = nobs; "sub-task done");

    Ok(result)
}

/// Turns weighted log-densities into the sufficient statistics of an EM step.
///
/// # Errors
/// `EngineErr::DegenerateRow` if an observation has no finite density under any component.
fn statistics(
    nobs: i32,
    gid: i32,
    logs: Array2<f64>,
    data: ArrayView2<f64>,
) -> Result<SubResult> {
    let mut responsibilities = logs;
    let mut loglik = 0.;

    for (i, mut row) in responsibilities.rows_mut().into_iter().enumerate() {
        // Shifting by the row max keeps the largest term at exp(0).
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        if !max.is_finite() {
            return Err(EngineErr::DegenerateRow { row: i }.into());
        }

        row.mapv_inplace(|v| (v - max).exp());

        let total = row.sum();
        loglik += max + total.ln();
        row /= total;
    }

    let totals = responsibilities.sum_axis(Axis(0));
    let weighted_sums = responsibilities.t().dot(&data);

    Ok(SubResult::Statistics {
        nobs,
        totals,
        weighted_sums,
        responsibilities,
        loglik,
        gid,
    })
}
