//! Process-wide configuration, loaded once at boot and held immutable
//! thereafter (the only process-wide singleton besides the worker runtime
//! handle).

use std::time::Duration;

/// Database pool tuning, mirroring the knobs of a production Postgres pool.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection string.
    pub url: String,
    /// Maximum pool connections.
    pub max_connections: u32,
    /// Minimum pool connections kept warm.
    pub min_connections: u32,
    /// Timeout for acquiring a new connection.
    pub connect_timeout: Duration,
    /// Idle connection eviction timeout.
    pub idle_timeout: Duration,
    /// Maximum lifetime of a pooled connection.
    pub max_lifetime: Duration,
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, String> {
        let url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL is required".to_string())?;
        Ok(Self {
            url,
            max_connections: env_u32("DB_MAX_CONNECTIONS", 10)?,
            min_connections: env_u32("DB_MIN_CONNECTIONS", 2)?,
            connect_timeout: Duration::from_secs(env_u64("DB_CONNECT_TIMEOUT_SECS", 10)?),
            idle_timeout: Duration::from_secs(env_u64("DB_IDLE_TIMEOUT_SECS", 300)?),
            max_lifetime: Duration::from_secs(env_u64("DB_MAX_LIFETIME_SECS", 1800)?),
        })
    }
}

/// Worker pool sizes, one per in-process queue. The HTTP sweep and
/// heartbeat scan are single ticker loops rather than pooled queues, so
/// they have no entry here; their fan-out is bounded instead by
/// [`Config::http_prober_concurrency`] and by their own tick cadence.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolSizes {
    /// `evaluate` queue pool size.
    pub evaluate: usize,
    /// `incident` queue pool size.
    pub incident: usize,
    /// `notify` queue pool size.
    pub notify: usize,
}

/// The fully resolved, immutable process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind host.
    pub host: String,
    /// HTTP bind port.
    pub port: u16,
    /// `json` or `pretty`.
    pub log_format: String,
    /// Database pool configuration.
    pub database: DatabaseConfig,
    /// Redis/queue backend URL, recorded but unused (queues are in-process).
    pub redis_url: Option<String>,
    /// Default reminder cooldown when a client has not overridden it.
    pub default_alert_reminder: Duration,
    /// Default grace period when a client has not overridden it.
    pub default_grace_period: Duration,
    /// Default heartbeat threshold when a client has not overridden it.
    pub default_heartbeat_threshold: Duration,
    /// Per-tick HTTP prober concurrency cap.
    pub http_prober_concurrency: usize,
    /// Maximum redirects the prober will follow.
    pub http_probe_max_redirects: usize,
    /// Global fallback Slack webhook, used when a client has none configured.
    pub slack_webhook_fallback: Option<String>,
    /// If set, the Slack provider short-circuits to success without a network call.
    pub stub_slack: bool,
    /// Maximum notification delivery attempts before giving up.
    pub notify_max_attempts: u32,
    /// Base delay before the first retry (jittered ±20%).
    pub notify_backoff_base: Duration,
    /// TTL for the in-process ApiKey validation cache.
    pub api_key_cache_ttl: Duration,
    /// Worker pool sizes.
    pub worker_pools: WorkerPoolSizes,
    /// Outbound SMTP configuration, if email delivery is enabled.
    pub smtp: Option<SmtpConfig>,
}

/// SMTP submission credentials.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server host.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Auth username.
    pub username: String,
    /// Auth password.
    pub password: String,
    /// Envelope from address.
    pub from: String,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Required variables missing or unparseable are fatal: the process
    /// must not start with a broken configuration.
    pub fn from_env() -> Result<Self, String> {
        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) if !host.is_empty() => Some(SmtpConfig {
                host,
                port: env_u32("SMTP_PORT", 587)? as u16,
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                from: std::env::var("SMTP_FROM").unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_u32("PORT", 8080)? as u16,
            log_format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            database: DatabaseConfig::from_env()?,
            redis_url: std::env::var("REDIS_URL").ok(),
            default_alert_reminder: Duration::from_secs(
                env_u64("DEFAULT_ALERT_REMINDER_MINUTES", 30)? * 60,
            ),
            default_grace_period: Duration::from_secs(env_u64("GRACE_PERIOD_SECONDS_DEFAULT", 0)?),
            default_heartbeat_threshold: Duration::from_secs(
                env_u64("HEARTBEAT_THRESHOLD_MINUTES_DEFAULT", 10)? * 60,
            ),
            http_prober_concurrency: env_u32("HTTP_PROBER_CONCURRENCY", 16)? as usize,
            http_probe_max_redirects: env_u32("HTTP_PROBE_MAX_REDIRECTS", 3)? as usize,
            slack_webhook_fallback: std::env::var("SLACK_WEBHOOK").ok(),
            stub_slack: env_bool("STUB_SLACK", false)?,
            notify_max_attempts: env_u32("NOTIFY_MAX_ATTEMPTS", 5)?,
            notify_backoff_base: Duration::from_secs(env_u64("NOTIFY_BACKOFF_BASE_SECS", 2)?),
            api_key_cache_ttl: Duration::from_secs(env_u64("API_KEY_CACHE_TTL_SECS", 5)?),
            worker_pools: WorkerPoolSizes {
                evaluate: env_u32("WORKER_POOL_EVALUATE", 4)? as usize,
                incident: env_u32("WORKER_POOL_INCIDENT", 4)? as usize,
                notify: env_u32("WORKER_POOL_NOTIFY", 4)? as usize,
            },
            smtp,
        })
    }

    /// Construct a minimal configuration suitable for tests, bypassing the
    /// environment entirely.
    pub fn for_test() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            log_format: "pretty".into(),
            database: DatabaseConfig {
                url: "postgres://localhost/test".into(),
                max_connections: 1,
                min_connections: 1,
                connect_timeout: Duration::from_secs(1),
                idle_timeout: Duration::from_secs(60),
                max_lifetime: Duration::from_secs(60),
            },
            redis_url: None,
            default_alert_reminder: Duration::from_secs(1800),
            default_grace_period: Duration::from_secs(0),
            default_heartbeat_threshold: Duration::from_secs(600),
            http_prober_concurrency: 4,
            http_probe_max_redirects: 3,
            slack_webhook_fallback: None,
            stub_slack: true,
            notify_max_attempts: 5,
            notify_backoff_base: Duration::from_millis(10),
            api_key_cache_ttl: Duration::from_secs(5),
            worker_pools: WorkerPoolSizes {
                evaluate: 2,
                incident: 2,
                notify: 2,
            },
            smtp: None,
        }
    }
}

fn env_u32(key: &str, default: u32) -> Result<u32, String> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| format!("{key} must be an integer, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64, String> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| format!("{key} must be an integer, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool, String> {
    match std::env::var(key) {
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(format!("{key} must be a boolean, got {raw:?}")),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_test_config_has_stub_slack_enabled() {
        let config = Config::for_test();
        assert!(config.stub_slack);
        assert!(config.smtp.is_none());
    }
}
