use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire mixture module.
pub type Result<T> = std::result::Result<T, EngineErr>;

/// The compute engine's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineErr {
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    NotPositiveDefinite {
        component: usize,
    },
    DegenerateRow {
        row: usize,
    },
    NotInitialized,
    AlreadyInitialized {
        device: usize,
    },
}

impl Display for EngineErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineErr::SizeMismatch {
                a,
                b,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
            EngineErr::NotPositiveDefinite { component } => write!(
                f,
                "The covariance matrix of component {component} is not positive definite"
            ),
            EngineErr::DegenerateRow { row } => write!(
                f,
                "Every component has zero density at observation {row}, can't sample from it"
            ),
            EngineErr::NotInitialized => {
                write!(f, "The engine was used before being bound to a device")
            }
            EngineErr::AlreadyInitialized { device } => {
                write!(f, "The engine is already bound to device {device}")
            }
        }
    }
}

impl Error for EngineErr {}
