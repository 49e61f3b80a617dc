pub mod config;
pub mod context;
pub mod descriptor;
pub mod encoder;
pub mod error;
pub mod executor;
pub mod registry;
pub mod result;
pub mod worker;

pub use config::WorkerConfig;
pub use context::WorkerContext;
pub use error::{Result, WorkerErr};
pub use worker::Worker;
