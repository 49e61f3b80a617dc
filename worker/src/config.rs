use std::{env, fs, io, time::Duration};

const ADDR_VAR: &str = "GPUWORKER_ADDR";
const POLL_VAR: &str = "GPUWORKER_POLL_MICROS";
const HOST_VAR: &str = "HOSTNAME";
const HOST_FILE: &str = "/proc/sys/kernel/hostname";

/// How long to sleep between two checks for a new task header.
///
/// Shorter intervals answer sooner, longer ones keep an idle worker off the CPU.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Immutable settings of a worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    addr: Option<String>,
    poll_interval: Duration,
    host_name: String,
}

impl WorkerConfig {
    /// Creates a new worker configuration talking over the process' standard streams.
    ///
    /// # Args
    /// * `host_name` - The identity reported to the coordinator on every registration.
    ///
    /// # Returns
    /// A `WorkerConfig` instance.
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            addr: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            host_name: host_name.into(),
        }
    }

    /// Reads the configuration from the environment.
    ///
    /// * `GPUWORKER_ADDR` - The coordinator's `host:port`, standard streams are used if unset.
    /// * `GPUWORKER_POLL_MICROS` - The header poll interval in microseconds.
    /// * `HOSTNAME` - Overrides the host identity.
    ///
    /// # Errors
    /// Returns `io::Error` if the poll interval is not a number.
    pub fn from_env() -> io::Result<Self> {
        let mut cfg = Self::new(host_name());

        if let Ok(addr) = env::var(ADDR_VAR) {
            cfg = cfg.with_addr(addr);
        }

        if let Ok(micros) = env::var(POLL_VAR) {
            let micros = micros
                .trim()
                .parse()
                .map_err(|e| io::Error::other(format!("invalid {POLL_VAR}={micros}: {e}")))?;
            cfg = cfg.with_poll_interval(Duration::from_micros(micros));
        }

        Ok(cfg)
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The coordinator's address, `None` for the standard streams.
    pub fn addr(&self) -> Option<&str> {
        self.addr.as_deref()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }
}

fn host_name() -> String {
    env::var(HOST_VAR)
        .ok()
        .or_else(|| fs::read_to_string(HOST_FILE).ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
