use crate::config::ServerConfig;
use crate::error::ServerResult;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tmkb::{MemoryStack, TmkbConfig};

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<ServerConfig>,

    /// Rate limit tracking: API key -> (count, window_start)
    pub rate_limiter: Arc<DashMap<String, (u32, Instant)>>,

    /// Retrieval stack shared across requests
    pub stack: MemoryStack,
}

impl ServerState {
    /// Build state from an already-assembled stack.
    pub fn new(config: ServerConfig, stack: MemoryStack) -> Self {
        Self {
            config: Arc::new(config),
            rate_limiter: Arc::new(DashMap::new()),
            stack,
        }
    }

    /// Load the stack YAML named by `config.stack_config` (plus `TMKB_*`
    /// overrides) and build the stack from it.
    pub fn from_config(config: ServerConfig) -> ServerResult<Self> {
        let stack_config = TmkbConfig::load(config.stack_config.as_deref())
            .map_err(tmkb::StackError::from)?;
        let stack = MemoryStack::build(&stack_config)?;
        Ok(Self::new(config, stack))
    }

    pub fn is_valid_api_key(&self, key: &str) -> bool {
        self.config.api_keys.contains(key)
    }

    /// Fixed one-minute window per key.
    pub fn check_rate_limit(&self, key: &str) -> bool {
        let now = Instant::now();
        let window = Duration::from_secs(60);
        let limit = self.config.rate_limit_per_minute;

        let mut entry = self.rate_limiter.entry(key.to_string()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        if now.duration_since(*window_start) > window {
            *count = 0;
            *window_start = now;
        }

        if *count >= limit {
            return false;
        }

        *count += 1;
        true
    }
}
