//! Gaussian mixture density evaluation and sampling behind a device-agnostic `Engine`.

pub mod engine;
pub mod error;
pub mod host;
mod linalg;

pub use engine::Engine;
pub use error::{EngineErr, Result};
pub use host::{HostEngine, HostMatrix};
