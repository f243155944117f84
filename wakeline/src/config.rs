//! Pipeline configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

use wakeline_dispatch::RetryPolicy;
use wakeline_domain::EventType;
use wakeline_queue::OverflowPolicy;

use crate::error::{PipelineError, PipelineResult};

// =============================================================================
// Configuration
// =============================================================================

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default change-queue sizing and policy
    pub queue: QueueConfig,

    /// Per-event-type queue overrides (programmatic, not env)
    pub queue_overrides: Vec<QueueOverride>,

    /// Handler retry policy
    pub retry: RetryPolicy,

    /// How long the mutation coordinator waits for a marker
    pub confirm_timeout: Duration,

    /// Grace period for in-flight handlers at shutdown
    pub shutdown_grace: Duration,
}

/// Default queue configuration applied to every event type.
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Bounded capacity per event type
    pub capacity: usize,
    /// Overflow policy
    pub policy: OverflowPolicy,
}

/// Queue override for a single event type.
#[derive(Debug, Clone, Copy)]
pub struct QueueOverride {
    /// Event type the override applies to
    pub event_type: EventType,
    /// Capacity for this type
    pub capacity: usize,
    /// Policy for this type
    pub policy: OverflowPolicy,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> PipelineResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let capacity = load_usize_env("WAKELINE_QUEUE_CAPACITY", 256)?;
        let policy = load_policy_env("WAKELINE_QUEUE_POLICY", OverflowPolicy::Sliding)?;
        let max_retries = load_u32_env("WAKELINE_MAX_RETRIES", 3)?;
        let base_delay_ms = load_u64_env("WAKELINE_RETRY_BASE_DELAY_MS", 100)?;
        let confirm_timeout_ms = load_u64_env("WAKELINE_CONFIRM_TIMEOUT_MS", 5_000)?;
        let shutdown_grace_ms = load_u64_env("WAKELINE_SHUTDOWN_GRACE_MS", 2_000)?;

        Ok(Self {
            queue: QueueConfig { capacity, policy },
            queue_overrides: Vec::new(),
            retry: RetryPolicy::new(max_retries, Duration::from_millis(base_delay_ms)),
            confirm_timeout: Duration::from_millis(confirm_timeout_ms),
            shutdown_grace: Duration::from_millis(shutdown_grace_ms),
        })
    }

    /// Create test configuration: small queues, fast retries, short waits.
    pub fn test() -> Self {
        Self {
            queue: QueueConfig { capacity: 16, policy: OverflowPolicy::DropOldest },
            queue_overrides: Vec::new(),
            retry: RetryPolicy::new(1, Duration::from_millis(1)),
            confirm_timeout: Duration::from_millis(250),
            shutdown_grace: Duration::from_millis(100),
        }
    }

    /// Override queue sizing for one event type.
    pub fn with_queue_override(
        mut self,
        event_type: EventType,
        capacity: usize,
        policy: OverflowPolicy,
    ) -> Self {
        self.queue_overrides.push(QueueOverride { event_type, capacity, policy });
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue: QueueConfig { capacity: 256, policy: OverflowPolicy::Sliding },
            queue_overrides: Vec::new(),
            retry: RetryPolicy::default(),
            confirm_timeout: Duration::from_millis(5_000),
            shutdown_grace: Duration::from_millis(2_000),
        }
    }
}

fn load_usize_env(key: &str, default: usize) -> PipelineResult<usize> {
    match env::var(key) {
        Ok(val) => val
            .parse::<usize>()
            .map_err(|_| PipelineError::Config(format!("Invalid {} value: {}", key, val))),
        Err(_) => Ok(default),
    }
}

fn load_u32_env(key: &str, default: u32) -> PipelineResult<u32> {
    match env::var(key) {
        Ok(val) => val
            .parse::<u32>()
            .map_err(|_| PipelineError::Config(format!("Invalid {} value: {}", key, val))),
        Err(_) => Ok(default),
    }
}

fn load_u64_env(key: &str, default: u64) -> PipelineResult<u64> {
    match env::var(key) {
        Ok(val) => val
            .parse::<u64>()
            .map_err(|_| PipelineError::Config(format!("Invalid {} value: {}", key, val))),
        Err(_) => Ok(default),
    }
}

fn load_policy_env(key: &str, default: OverflowPolicy) -> PipelineResult<OverflowPolicy> {
    match env::var(key) {
        Ok(val) => match val.to_lowercase().as_str() {
            "drop_oldest" => Ok(OverflowPolicy::DropOldest),
            "drop_newest" => Ok(OverflowPolicy::DropNewest),
            "sliding" => Ok(OverflowPolicy::Sliding),
            other => Err(PipelineError::Config(format!(
                "Invalid {}: {}. Expected: drop_oldest, drop_newest, sliding",
                key, other
            ))),
        },
        Err(_) => Ok(default),
    }
}

// =============================================================================
// Tests
// =============================================================================
