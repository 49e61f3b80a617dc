use std::{error::Error, fmt, io};

use mixture::EngineErr;
use ndarray::ShapeError;

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Worker runtime failures, none of them is recoverable.
#[derive(Debug)]
pub enum WorkerErr {
    Io(io::Error),
    Engine(EngineErr),
    Shape(ShapeError),
    UnknownTask(i32),
    UnknownSubTaskKind(i32),
    NegativeValue {
        what: &'static str,
        value: i32,
    },
    DatasetOutOfRange {
        index: usize,
        len: usize,
    },
    LengthMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerErr::Io(e) => write!(f, "io error: {e}"),
            WorkerErr::Engine(e) => write!(f, "engine error: {e}"),
            WorkerErr::Shape(e) => write!(f, "shape error: {e}"),
            WorkerErr::UnknownTask(code) => write!(f, "unknown task header {code}"),
            WorkerErr::UnknownSubTaskKind(kind) => write!(f, "unknown sub-task type {kind}"),
            WorkerErr::NegativeValue { what, value } => {
                write!(f, "{what} must not be negative, got {value}")
            }
            WorkerErr::DatasetOutOfRange { index, len } => write!(
                f,
                "dataset index {index} out of range, only {len} datasets are registered"
            ),
            WorkerErr::LengthMismatch {
                what,
                got,
                expected,
            } => write!(f, "{what} length mismatch: got {got}, expected {expected}"),
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::Io(e) => Some(e),
            WorkerErr::Engine(e) => Some(e),
            WorkerErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WorkerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EngineErr> for WorkerErr {
    fn from(value: EngineErr) -> Self {
        Self::Engine(value)
    }
}

impl From<ShapeError> for WorkerErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<WorkerErr> for io::Error {
    fn from(value: WorkerErr) -> Self {
        match value {
            WorkerErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
