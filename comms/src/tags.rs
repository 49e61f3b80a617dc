//! The tag numbers agreed upon by the coordinator and its workers.

use crate::Tag;

/// Task header, coordinator to worker.
pub const TASK: Tag = 11;
/// Registration parameters or the amount of sub-tasks of a batch.
pub const CONTROL: Tag = 12;
/// Dataset payload, sub-task descriptors and the amount of results of a batch.
pub const DATA: Tag = 13;
/// Index assigned to a newly registered dataset, worker to coordinator.
pub const DATASET_INDEX: Tag = 14;

pub const WEIGHTS: Tag = 21;
pub const MEANS: Tag = 22;
pub const COVARIANCES: Tag = 23;

/// First tag of the result element stream of a batch, worker to coordinator.
pub const RESULT_BASE: Tag = 21;

pub const HOST_NAME_LEN: Tag = 30;
pub const HOST_NAME: Tag = 31;
