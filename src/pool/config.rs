//! Configuration for the worker pool.
//!
//! [`WorkerPoolConfig`] is the builder-style configuration consumed by
//! [`WorkerPool::new`](crate::WorkerPool::new). [`WorkerPoolOptions`] is its
//! serializable counterpart using camelCase keys and millisecond durations,
//! suitable for loading from JSON.

use crate::core::{PoolError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default lower bound on live workers
pub const DEFAULT_MIN_WORKERS: usize = 1;
/// Default upper bound on live workers
pub const DEFAULT_MAX_WORKERS: usize = 10;
/// Default idle time before a worker may be retired
pub const DEFAULT_SCALE_DOWN_COOLDOWN: Duration = Duration::from_secs(30);
/// Default backlog that triggers spawning a worker
pub const DEFAULT_SCALE_UP_BACKLOG_THRESHOLD: usize = 1;

/// Configuration for a worker pool
///
/// # Example
///
/// ```rust
/// use rust_worker_pool::WorkerPoolConfig;
/// use std::time::Duration;
///
/// let config = WorkerPoolConfig::new(2, 16)
///     .with_scale_down_cooldown(Duration::from_secs(10))
///     .with_scale_up_backlog_threshold(4)
///     .with_pool_name("market-data");
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Workers kept alive even when idle (>= 1)
    pub min_workers: usize,
    /// Hard ceiling on live workers (>= min_workers)
    pub max_workers: usize,
    /// Idle time after which an excess worker may be retired; also the
    /// period of the scale-down tick
    pub scale_down_cooldown: Duration,
    /// Number of queued tasks without an idle worker that triggers a scale-up
    pub scale_up_backlog_threshold: usize,
    /// Maximum queue size (0 = unbounded)
    pub max_queue_size: usize,
    /// Pool name used in logs and errors
    pub pool_name: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            min_workers: DEFAULT_MIN_WORKERS,
            max_workers: DEFAULT_MAX_WORKERS,
            scale_down_cooldown: DEFAULT_SCALE_DOWN_COOLDOWN,
            scale_up_backlog_threshold: DEFAULT_SCALE_UP_BACKLOG_THRESHOLD,
            max_queue_size: 0,
            pool_name: "worker-pool".to_string(),
        }
    }
}

impl WorkerPoolConfig {
    /// Create a new configuration with the given worker bounds
    #[must_use]
    pub fn new(min_workers: usize, max_workers: usize) -> Self {
        Self {
            min_workers,
            max_workers,
            ..Default::default()
        }
    }

    /// Create a configuration for a pool that never scales
    #[must_use]
    pub fn fixed(workers: usize) -> Self {
        Self::new(workers, workers)
    }

    /// Set the scale-down cooldown
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_scale_down_cooldown(mut self, cooldown: Duration) -> Self {
        self.scale_down_cooldown = cooldown;
        self
    }

    /// Set the backlog that triggers spawning an additional worker
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_scale_up_backlog_threshold(mut self, threshold: usize) -> Self {
        self.scale_up_backlog_threshold = threshold;
        self
    }

    /// Set maximum queue size (0 = unbounded)
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    /// Set the pool name
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_pool_name<S: Into<String>>(mut self, name: S) -> Self {
        self.pool_name = name.into();
        self
    }

    /// Returns true when the bounds leave no room for scaling
    pub fn is_fixed_size(&self) -> bool {
        self.min_workers == self.max_workers
    }

    /// Parse a configuration from a JSON [`WorkerPoolOptions`] document
    ///
    /// ```rust
    /// use rust_worker_pool::WorkerPoolConfig;
    ///
    /// let config = WorkerPoolConfig::from_json(
    ///     r#"{ "minWorkers": 1, "maxWorkers": 4, "scaleDownCooldownMs": 500 }"#,
    /// )?;
    /// assert_eq!(config.max_workers, 4);
    /// # Ok::<(), rust_worker_pool::PoolError>(())
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let options: WorkerPoolOptions = serde_json::from_str(json)
            .map_err(|e| PoolError::invalid_config("options", e.to_string()))?;
        Self::try_from(options)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.min_workers == 0 {
            return Err(PoolError::invalid_config(
                "min_workers",
                "Minimum worker count must be at least 1",
            ));
        }
        if self.max_workers < self.min_workers {
            return Err(PoolError::invalid_config(
                "max_workers",
                format!(
                    "Maximum worker count ({}) must be >= minimum worker count ({})",
                    self.max_workers, self.min_workers
                ),
            ));
        }
        if self.scale_down_cooldown.is_zero() {
            return Err(PoolError::invalid_config(
                "scale_down_cooldown",
                "Scale-down cooldown must be non-zero",
            ));
        }
        if self.scale_up_backlog_threshold == 0 {
            return Err(PoolError::invalid_config(
                "scale_up_backlog_threshold",
                "Scale-up backlog threshold must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Serializable pool options
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerPoolOptions {
    /// Workers kept alive even when idle
    pub min_workers: usize,
    /// Ceiling on live workers
    pub max_workers: usize,
    /// Scale-down cooldown in milliseconds
    pub scale_down_cooldown_ms: u64,
    /// Backlog that triggers a scale-up
    pub scale_up_backlog_threshold: usize,
    /// Maximum queue size (0 = unbounded)
    pub max_queue_size: usize,
    /// Pool name used in logs
    pub pool_name: Option<String>,
}

impl Default for WorkerPoolOptions {
    fn default() -> Self {
        WorkerPoolConfig::default().into()
    }
}

impl From<WorkerPoolConfig> for WorkerPoolOptions {
    fn from(config: WorkerPoolConfig) -> Self {
        Self {
            min_workers: config.min_workers,
            max_workers: config.max_workers,
            scale_down_cooldown_ms: config.scale_down_cooldown.as_millis() as u64,
            scale_up_backlog_threshold: config.scale_up_backlog_threshold,
            max_queue_size: config.max_queue_size,
            pool_name: Some(config.pool_name),
        }
    }
}

impl TryFrom<WorkerPoolOptions> for WorkerPoolConfig {
    type Error = PoolError;

    fn try_from(options: WorkerPoolOptions) -> Result<Self> {
        let mut config = WorkerPoolConfig::new(options.min_workers, options.max_workers)
            .with_scale_down_cooldown(Duration::from_millis(options.scale_down_cooldown_ms))
            .with_scale_up_backlog_threshold(options.scale_up_backlog_threshold)
            .with_max_queue_size(options.max_queue_size);
        if let Some(name) = options.pool_name {
            config = config.with_pool_name(name);
        }
        config.validate()?;
        Ok(config)
    }
}
