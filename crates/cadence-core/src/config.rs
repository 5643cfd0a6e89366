//! Engine configuration that downstream crates can serialize/deserialize.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreaker;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard memory cap (in bytes) shared by every map the engine allocates.
    pub mem_cap_bytes: usize,

    /// Size of one key heap page.
    pub sql_map_page_size: usize,

    /// Default key capacity for operator maps.
    pub sql_map_key_capacity: usize,

    /// Fill ratio at which a map doubles its slot table.
    pub sql_map_load_factor: f64,

    /// How many times a map may double before inserts fail.
    pub sql_map_max_resizes: u32,

    /// Key capacity of the per-run map used by distinct-over-time.
    pub sql_distinct_timestamp_key_capacity: usize,
    pub sql_distinct_timestamp_load_factor: f64,

    /// Key capacity of the join-key map used by LT joins.
    pub sql_join_key_capacity: usize,

    /// Key capacity of the membership map used by intersect/except.
    pub sql_set_op_key_capacity: usize,

    /// Checks between clock reads when a query timeout is set.
    pub circuit_breaker_throttle: u32,

    /// Query timeout; `None` disables the deadline.
    pub query_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mem_cap_bytes: 512 * 1024 * 1024, // 512 MiB default
            sql_map_page_size: 4 * 1024 * 1024,
            sql_map_key_capacity: 2048,
            sql_map_load_factor: 0.7,
            sql_map_max_resizes: u32::MAX,
            sql_distinct_timestamp_key_capacity: 512,
            sql_distinct_timestamp_load_factor: 0.5,
            sql_join_key_capacity: 2048,
            sql_set_op_key_capacity: 2048,
            circuit_breaker_throttle: crate::circuit_breaker::DEFAULT_THROTTLE,
            query_timeout_ms: None,
        }
    }
}

/// Largest key heap page; entry offsets are stored as `u32`.
pub const MAX_MAP_PAGE_SIZE: usize = u32::MAX as usize;

/// Largest initial key capacity; entry indexes are stored as `u32`.
pub const MAX_MAP_KEY_CAPACITY: usize = 1 << 30;

/// Sizing of one map instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    pub page_size: usize,
    pub key_capacity: usize,
    pub load_factor: f64,
    pub max_resizes: u32,
}

impl MapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_MAP_PAGE_SIZE {
            return Err(Error::Config(format!(
                "map page size must be in 1..={MAX_MAP_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.key_capacity == 0 || self.key_capacity > MAX_MAP_KEY_CAPACITY {
            return Err(Error::Config(format!(
                "map key capacity must be in 1..={MAX_MAP_KEY_CAPACITY}, got {}",
                self.key_capacity
            )));
        }
        if !(self.load_factor > 0.0 && self.load_factor < 1.0) {
            return Err(Error::Config(format!(
                "map load factor must be in (0, 1), got {}",
                self.load_factor
            )));
        }
        Ok(())
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        EngineConfig::default().map_config(2048)
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `CADENCE_MEM_CAP_BYTES`: memory cap in bytes
    /// - `CADENCE_MAP_PAGE_SIZE`: key heap page size
    /// - `CADENCE_MAP_KEY_CAPACITY`: default map key capacity
    /// - `CADENCE_MAP_LOAD_FACTOR`: default map load factor
    /// - `CADENCE_MAP_MAX_RESIZES`: growth limit per map
    /// - `CADENCE_DISTINCT_KEY_CAPACITY`, `CADENCE_DISTINCT_LOAD_FACTOR`
    /// - `CADENCE_JOIN_KEY_CAPACITY`, `CADENCE_SET_OP_KEY_CAPACITY`
    /// - `CADENCE_CIRCUIT_BREAKER_THROTTLE`
    /// - `CADENCE_QUERY_TIMEOUT_MS`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_parse("CADENCE_MEM_CAP_BYTES") {
            cfg.mem_cap_bytes = v;
        }
        if let Some(v) = env_parse("CADENCE_MAP_PAGE_SIZE") {
            cfg.sql_map_page_size = v;
        }
        if let Some(v) = env_parse("CADENCE_MAP_KEY_CAPACITY") {
            cfg.sql_map_key_capacity = v;
        }
        if let Some(v) = env_parse("CADENCE_MAP_LOAD_FACTOR") {
            cfg.sql_map_load_factor = v;
        }
        if let Some(v) = env_parse("CADENCE_MAP_MAX_RESIZES") {
            cfg.sql_map_max_resizes = v;
        }
        if let Some(v) = env_parse("CADENCE_DISTINCT_KEY_CAPACITY") {
            cfg.sql_distinct_timestamp_key_capacity = v;
        }
        if let Some(v) = env_parse("CADENCE_DISTINCT_LOAD_FACTOR") {
            cfg.sql_distinct_timestamp_load_factor = v;
        }
        if let Some(v) = env_parse("CADENCE_JOIN_KEY_CAPACITY") {
            cfg.sql_join_key_capacity = v;
        }
        if let Some(v) = env_parse("CADENCE_SET_OP_KEY_CAPACITY") {
            cfg.sql_set_op_key_capacity = v;
        }
        if let Some(v) = env_parse("CADENCE_CIRCUIT_BREAKER_THROTTLE") {
            cfg.circuit_breaker_throttle = v;
        }
        if let Some(v) = env_parse("CADENCE_QUERY_TIMEOUT_MS") {
            cfg.query_timeout_ms = Some(v);
        }

        cfg
    }

    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.distinct_map_config().validate()?;
        self.join_map_config().validate()?;
        self.set_op_map_config().validate()?;
        if self.circuit_breaker_throttle == 0 {
            return Err(Error::Config("circuit breaker throttle must be positive".into()));
        }
        Ok(())
    }

    fn map_config(&self, key_capacity: usize) -> MapConfig {
        MapConfig {
            page_size: self.sql_map_page_size,
            key_capacity,
            load_factor: self.sql_map_load_factor,
            max_resizes: self.sql_map_max_resizes,
        }
    }

    pub fn distinct_map_config(&self) -> MapConfig {
        MapConfig {
            load_factor: self.sql_distinct_timestamp_load_factor,
            ..self.map_config(self.sql_distinct_timestamp_key_capacity)
        }
    }

    pub fn join_map_config(&self) -> MapConfig {
        self.map_config(self.sql_join_key_capacity)
    }

    pub fn set_op_map_config(&self) -> MapConfig {
        self.map_config(self.sql_set_op_key_capacity)
    }

    /// Fresh breaker for one execution.
    pub fn circuit_breaker(&self) -> CircuitBreaker {
        let cb = match self.query_timeout_ms {
            Some(ms) => CircuitBreaker::with_timeout(Duration::from_millis(ms)),
            None => CircuitBreaker::new(),
        };
        cb.with_throttle(self.circuit_breaker_throttle)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse::<T>().ok())
}
