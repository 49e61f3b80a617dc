//! Decoding of the integers that announce what the coordinator sends next.

use crate::{Result, WorkerErr, registry::Registry};

/// The task announced by a header message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskHeader {
    Kill,
    Register,
    Batch,
}

impl TaskHeader {
    pub const KILL: i32 = -1;
    pub const REGISTER: i32 = 0;
    pub const BATCH: i32 = 1;

    pub fn code(self) -> i32 {
        match self {
            TaskHeader::Kill => Self::KILL,
            TaskHeader::Register => Self::REGISTER,
            TaskHeader::Batch => Self::BATCH,
        }
    }
}

impl TryFrom<i32> for TaskHeader {
    type Error = WorkerErr;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            Self::KILL => Ok(TaskHeader::Kill),
            Self::REGISTER => Ok(TaskHeader::Register),
            Self::BATCH => Ok(TaskHeader::Batch),
            other => Err(WorkerErr::UnknownTask(other)),
        }
    }
}

/// What a sub-task must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubTaskKind {
    /// Sufficient statistics for an EM update.
    Statistics,
    /// Sampled labels.
    Labels,
    /// Sampled labels plus the most likely component of every observation.
    Relabel,
}

impl SubTaskKind {
    pub fn code(self) -> i32 {
        match self {
            SubTaskKind::Statistics => 0,
            SubTaskKind::Labels => 1,
            SubTaskKind::Relabel => 2,
        }
    }

    /// The amount of result messages a sub-task of this kind answers with.
    ///
    /// The coordinator needs it to split the result stream of a batch.
    pub fn element_count(self) -> usize {
        match self {
            SubTaskKind::Statistics => 6,
            SubTaskKind::Labels => 3,
            SubTaskKind::Relabel => 4,
        }
    }
}

impl TryFrom<i32> for SubTaskKind {
    type Error = WorkerErr;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(SubTaskKind::Statistics),
            1 => Ok(SubTaskKind::Labels),
            2 => Ok(SubTaskKind::Relabel),
            other => Err(WorkerErr::UnknownSubTaskKind(other)),
        }
    }
}

/// Converts a wire integer into a size, rejecting negative values.
pub(crate) fn non_negative(what: &'static str, value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| WorkerErr::NegativeValue { what, value })
}

/// Checks that a received buffer has the length its announcement implied.
pub(crate) fn expect_len(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(WorkerErr::LengthMismatch {
            what,
            got,
            expected,
        });
    }

    Ok(())
}

/// The four integers that open a dataset registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterParams {
    pub rows: usize,
    pub cols: usize,
    pub device: usize,
    pub seed: u64,
}

impl RegisterParams {
    pub const LEN: usize = 4;

    /// Parses `[rows, cols, device, seed]`.
    pub fn parse(raw: &[i32]) -> Result<Self> {
        let &[rows, cols, device, seed] = raw else {
            return Err(WorkerErr::LengthMismatch {
                what: "registration parameters",
                got: raw.len(),
                expected: Self::LEN,
            });
        };

        Ok(Self {
            rows: non_negative("row count", rows)?,
            cols: non_negative("column count", cols)?,
            device: non_negative("device", device)?,
            // Reinterpreted, any 32 bit pattern is a valid seed.
            seed: u64::from(seed as u32),
        })
    }

    /// The amount of doubles the dataset payload must hold.
    pub fn data_len(&self) -> usize {
        self.rows * self.cols
    }
}

/// The four integers that open every sub-task of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub dataset: usize,
    pub ncomp: usize,
    pub kind: SubTaskKind,
    pub gid: i32,
}

impl Descriptor {
    pub const LEN: usize = 4;

    /// Parses `[dataset index, component count, sub-task type, group id]`.
    pub fn parse(raw: &[i32]) -> Result<Self> {
        let &[dataset, ncomp, kind, gid] = raw else {
            return Err(WorkerErr::LengthMismatch {
                what: "sub-task descriptor",
                got: raw.len(),
                expected: Self::LEN,
            });
        };

        Ok(Self {
            dataset: non_negative("dataset index", dataset)?,
            ncomp: non_negative("component count", ncomp)?,
            kind: SubTaskKind::try_from(kind)?,
            gid,
        })
    }

    /// Resolves the shapes of the three parameter buffers following this descriptor.
    ///
    /// # Errors
    /// `WorkerErr::DatasetOutOfRange` if the dataset was never registered.
    pub fn layout<M>(&self, registry: &Registry<M>) -> Result<Layout> {
        let dataset = registry.get(self.dataset)?;

        Ok(Layout {
            nobs: dataset.nobs(),
            ndim: dataset.ndim(),
            ncomp: self.ncomp,
        })
    }
}

/// The shapes a sub-task's parameters must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub nobs: usize,
    pub ndim: usize,
    pub ncomp: usize,
}

impl Layout {
    pub fn weights(&self) -> usize {
        self.ncomp
    }

    pub fn means(&self) -> (usize, usize) {
        (self.ncomp, self.ndim)
    }

    pub fn covariances(&self) -> (usize, usize, usize) {
        (self.ncomp, self.ndim, self.ndim)
    }

    pub fn means_len(&self) -> usize {
        self.ncomp * self.ndim
    }

    pub fn covariances_len(&self) -> usize {
        self.ncomp * self.ndim * self.ndim
    }
}
