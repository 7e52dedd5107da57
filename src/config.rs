//! Dispatcher configuration and environment loading.
//!
//! Values are read from `PREDICATED_LOADER_*` environment variables with
//! sensible defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `PREDICATED_LOADER_QUEUE_CAPACITY` | 16 | Max requests waiting for the worker |
//! | `PREDICATED_LOADER_WORKER_NAME` | predicated-loader | Worker thread name |
//! | `PREDICATED_LOADER_SHUTDOWN_TIMEOUT_MS` | 5000 | Await-termination budget (ms) |
//! | `PREDICATED_LOADER_LOG` | info | `EnvFilter` directive |
//! | `PREDICATED_LOADER_LOG_FORMAT` | json | `json` or `pretty` |

use std::time::Duration;

use serde::Serialize;

use crate::error::DispatcherError;
use crate::scheduler::DEFAULT_QUEUE_CAPACITY;
use crate::telemetry::{LogConfig, LogFormat};

const DEFAULT_WORKER_NAME: &str = "predicated-loader";
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

/// Settings fixed for the lifetime of one dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Requests that may wait for the worker before `load()` fails.
    pub queue_capacity: usize,
    pub worker_name: String,
    /// Budget for [`Dispatcher::shutdown_and_wait`](crate::Dispatcher::shutdown_and_wait).
    pub shutdown_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
            shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
        }
    }
}

impl DispatcherConfig {
    pub fn with_capacity(queue_capacity: usize) -> Self {
        Self { queue_capacity, ..Self::default() }
    }

    pub fn validate(&self) -> Result<(), DispatcherError> {
        if self.queue_capacity == 0 {
            return Err(DispatcherError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(DispatcherError::InvalidConfig(
                "shutdown_timeout must be non-zero".to_string(),
            ));
        }
        if self.worker_name.contains('\0') {
            return Err(DispatcherError::InvalidConfig(
                "worker_name must not contain NUL".to_string(),
            ));
        }
        Ok(())
    }
}

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub queue_capacity: usize,
    pub worker_name: String,
    pub shutdown_timeout_ms: u64,
    pub log_level: String,
    pub log_format: &'static str,
}

/// Everything loadable from the environment.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub dispatcher: DispatcherConfig,
    pub log: LogConfig,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

fn load_dispatcher_config() -> DispatcherConfig {
    let queue_capacity = parse_usize("PREDICATED_LOADER_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY);
    let queue_capacity = queue_capacity.max(1);
    let worker_name = std::env::var("PREDICATED_LOADER_WORKER_NAME")
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty() && !name.contains('\0'))
        .unwrap_or_else(|| DEFAULT_WORKER_NAME.to_string());
    let shutdown_ms = parse_u64("PREDICATED_LOADER_SHUTDOWN_TIMEOUT_MS", DEFAULT_SHUTDOWN_TIMEOUT_MS);
    let shutdown_timeout = Duration::from_millis(shutdown_ms.max(1));
    DispatcherConfig { queue_capacity, worker_name, shutdown_timeout }
}

fn load_log_config() -> LogConfig {
    let defaults = LogConfig::default();
    let level = std::env::var("PREDICATED_LOADER_LOG")
        .ok()
        .filter(|level| !level.trim().is_empty())
        .unwrap_or(defaults.level);
    let format = std::env::var("PREDICATED_LOADER_LOG_FORMAT")
        .ok()
        .and_then(|format| format.parse::<LogFormat>().ok())
        .unwrap_or(defaults.format);
    LogConfig { format, level, output_path: None }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    EnvConfig {
        dispatcher: load_dispatcher_config(),
        log: load_log_config(),
    }
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            queue_capacity: self.dispatcher.queue_capacity,
            worker_name: self.dispatcher.worker_name.clone(),
            shutdown_timeout_ms: self.dispatcher.shutdown_timeout.as_millis() as u64,
            log_level: self.log.level.clone(),
            log_format: match self.log.format {
                LogFormat::Json => "json",
                LogFormat::Pretty => "pretty",
            },
        }
    }
}
