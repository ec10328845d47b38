//! Environment-driven configuration.
//!
//! `dotenv().ok()` followed by a parsed env var with a fallback default
//! for every tunable.

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: Option<String>,

    pub compliance_threshold_minor_units: i64,

    pub selector_strategy: String,

    pub breaker_failure_threshold: u32,
    pub breaker_rate_threshold: f64,
    pub breaker_window_secs: u64,
    pub breaker_cooldown_secs: u64,
    pub breaker_half_open_max_requests: u32,

    pub latency_window_capacity: usize,
    pub score_update_period_secs: u64,

    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_jitter_factor: f64,

    pub shed_max_active: u64,
    pub shed_latency_threshold_ms: u64,
    pub shed_cpu_threshold_pct: f32,
    pub shed_circuit_open_threshold: usize,

    pub dispatch_deadline_secs: u64,
    pub affinity_ttl_secs: u64,
    pub result_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        fn var<T: std::str::FromStr>(key: &str, default: T) -> T {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        Ok(Self {
            port: var("PORT", 8080),
            redis_url: std::env::var("REDIS_URL").ok(),

            compliance_threshold_minor_units: var("COMPLIANCE_THRESHOLD_MINOR_UNITS", 1_000_000),

            selector_strategy: std::env::var("SELECTOR_STRATEGY")
                .unwrap_or_else(|_| "health_score".to_string()),

            breaker_failure_threshold: var("BREAKER_FAILURE_THRESHOLD", 5),
            breaker_rate_threshold: var("BREAKER_RATE_THRESHOLD", 0.5),
            breaker_window_secs: var("BREAKER_WINDOW_SECS", 60),
            breaker_cooldown_secs: var("BREAKER_COOLDOWN_SECS", 30),
            breaker_half_open_max_requests: var("BREAKER_HALF_OPEN_MAX_REQUESTS", 3),

            latency_window_capacity: var("LATENCY_WINDOW_CAPACITY", 1000),
            score_update_period_secs: var("SCORE_UPDATE_PERIOD_SECS", 10),

            retry_max_attempts: var("RETRY_MAX_ATTEMPTS", 4),
            retry_base_delay_ms: var("RETRY_BASE_DELAY_MS", 200),
            retry_max_delay_ms: var("RETRY_MAX_DELAY_MS", 5000),
            retry_jitter_factor: var("RETRY_JITTER_FACTOR", 0.2),

            shed_max_active: var("SHED_MAX_ACTIVE", 2000),
            shed_latency_threshold_ms: var("SHED_LATENCY_THRESHOLD_MS", 3000),
            shed_cpu_threshold_pct: var("SHED_CPU_THRESHOLD_PCT", 90.0),
            shed_circuit_open_threshold: var("SHED_CIRCUIT_OPEN_THRESHOLD", 3),

            dispatch_deadline_secs: var("DISPATCH_DEADLINE_SECS", 30),
            affinity_ttl_secs: var("AFFINITY_TTL_SECS", 24 * 3600),
            result_cache_ttl_secs: var("RESULT_CACHE_TTL_SECS", 24 * 3600),
        })
    }
}
