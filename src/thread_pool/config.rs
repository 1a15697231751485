use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default job queue capacity.
const DEFAULT_POOL_SIZE: usize = 3000;
/// Default hard cap on concurrently live workers.
const DEFAULT_WORKER_MAX_OPEN: usize = 1000;
/// Default number of permanent workers.
const DEFAULT_WORKER_IDLE: usize = 100;
/// Default inactivity timeout for workers above the idle floor.
const DEFAULT_WORKER_LIFE_TIME: Duration = Duration::from_secs(60);

/// Sizing options for a [`Pool`](super::Pool).
///
/// Every setter ignores zero and keeps the current value, so options can be
/// passed straight through from user input:
///
/// ```
/// # use jobpool::PoolConfig;
/// # use std::time::Duration;
/// let config = PoolConfig::default()
///     .pool_size(10)
///     .worker_max_open(4)
///     .worker_idle(0)
///     .worker_life_time(Duration::from_millis(50));
/// assert_eq!(config.get_worker_idle(), 100);
/// assert_eq!(config.resolved().get_worker_idle(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pool_size: usize,
    worker_max_open: usize,
    worker_idle: usize,
    #[serde(rename = "worker_life_time_ms", with = "millis")]
    worker_life_time: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            worker_max_open: DEFAULT_WORKER_MAX_OPEN,
            worker_idle: DEFAULT_WORKER_IDLE,
            worker_life_time: DEFAULT_WORKER_LIFE_TIME,
        }
    }
}

impl PoolConfig {
    /// Sets the job queue capacity.
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        if pool_size > 0 {
            self.pool_size = pool_size;
        }
        self
    }

    /// Sets the maximum number of live workers.
    pub fn worker_max_open(mut self, worker_max_open: usize) -> Self {
        if worker_max_open > 0 {
            self.worker_max_open = worker_max_open;
        }
        self
    }

    /// Sets the number of permanent workers started with the pool.
    pub fn worker_idle(mut self, worker_idle: usize) -> Self {
        if worker_idle > 0 {
            self.worker_idle = worker_idle;
        }
        self
    }

    /// Sets how long a worker above the idle floor may wait for a job
    /// before it exits.
    pub fn worker_life_time(mut self, worker_life_time: Duration) -> Self {
        if !worker_life_time.is_zero() {
            self.worker_life_time = worker_life_time;
        }
        self
    }

    /// Job queue capacity.
    pub fn get_pool_size(&self) -> usize {
        self.pool_size
    }

    /// Maximum number of live workers.
    pub fn get_worker_max_open(&self) -> usize {
        self.worker_max_open
    }

    /// Number of permanent workers.
    pub fn get_worker_idle(&self) -> usize {
        self.worker_idle
    }

    /// Inactivity timeout of dynamic workers.
    pub fn get_worker_life_time(&self) -> Duration {
        self.worker_life_time
    }

    /// Returns the configuration the pool actually runs with.
    ///
    /// Values loaded through serde bypass the setters, so zeros are
    /// replaced by defaults here, and the idle floor is clamped to the
    /// worker cap.
    pub fn resolved(self) -> Self {
        let mut config = PoolConfig::default()
            .pool_size(self.pool_size)
            .worker_max_open(self.worker_max_open)
            .worker_idle(self.worker_idle)
            .worker_life_time(self.worker_life_time);
        config.worker_idle = config.worker_idle.min(config.worker_max_open);
        config
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.get_pool_size(), 3000);
        assert_eq!(config.get_worker_max_open(), 1000);
        assert_eq!(config.get_worker_idle(), 100);
        assert_eq!(config.get_worker_life_time(), Duration::from_secs(60));
    }

    #[test]
    fn zero_values_are_ignored() {
        let config = PoolConfig::default()
            .pool_size(0)
            .worker_max_open(0)
            .worker_idle(0)
            .worker_life_time(Duration::ZERO);
        assert_eq!(config, PoolConfig::default());
    }

    #[test]
    fn idle_is_clamped_to_max_open() {
        let config = PoolConfig::default()
            .worker_max_open(8)
            .worker_idle(20)
            .resolved();
        assert_eq!(config.get_worker_max_open(), 8);
        assert_eq!(config.get_worker_idle(), 8);

        let config = PoolConfig::default().worker_max_open(8).worker_idle(3);
        assert_eq!(config.resolved().get_worker_idle(), 3);
    }

    #[test]
    fn json_round_trip_uses_millis() {
        let config: PoolConfig = serde_json::from_str(
            r#"{"pool_size": 10, "worker_idle": 0, "worker_life_time_ms": 250}"#,
        )
        .unwrap();
        assert_eq!(config.get_pool_size(), 10);
        assert_eq!(config.get_worker_life_time(), Duration::from_millis(250));

        let resolved = config.resolved();
        assert_eq!(resolved.get_worker_idle(), DEFAULT_WORKER_IDLE);
        assert_eq!(resolved.get_worker_max_open(), DEFAULT_WORKER_MAX_OPEN);

        let json = serde_json::to_value(resolved).unwrap();
        assert_eq!(json["worker_life_time_ms"], 250);
    }

    #[test]
    fn oversized_life_time_saturates() {
        let config = PoolConfig::default().worker_life_time(Duration::MAX);
        let json = serde_json::to_value(config).unwrap();
        assert_eq!(json["worker_life_time_ms"], u64::MAX);

        let back: PoolConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.get_worker_life_time(), Duration::from_millis(u64::MAX));
    }
}
