use std::fmt;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process configuration, read once at startup from the environment.
///
/// Unlike a file-backed config, every field here has an explicit
/// environment-variable source; `Config::from_env` is the only constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database_url: String,
    pub redis_url: String,
    pub docker_host: Option<String>,
    pub admin_api_token: String,
    pub bot_image: String,
    pub bot_network: Option<String>,
    pub exit_callback_base_url: String,
    pub bus: BusConfig,
    pub promoter: PromoterConfig,
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".into(),
            cors_allowed_origins: vec!["*".into()],
        }
    }
}

/// Message-bus constants: stream + consumer-group names and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub transcription_stream: String,
    pub speaker_stream: String,
    pub consumer_group: String,
    pub speaker_consumer_group: String,
    pub consumer_name: String,
    pub block_ms: u64,
    pub read_count: usize,
    pub stale_pending_idle_secs: i64,
    pub segment_hash_ttl_secs: i64,
    pub speaker_set_ttl_secs: i64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            transcription_stream: "transcription_segments".into(),
            speaker_stream: "speaker_events_relative".into(),
            consumer_group: "collector_group".into(),
            speaker_consumer_group: "speaker_collector_group".into(),
            consumer_name: format!("collector-{}", uuid::Uuid::new_v4()),
            block_ms: 5_000,
            read_count: 50,
            stale_pending_idle_secs: 60,
            segment_hash_ttl_secs: 3_600,
            speaker_set_ttl_secs: 3_600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoterConfig {
    pub interval_secs: u64,
    pub immutability_threshold_secs: i64,
}

impl Default for PromoterConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            immutability_threshold_secs: 30,
        }
    }
}

/// Text-filter defaults, reconciled against the original
/// `transcription-collector/filters.py` rather than spec prose: that file
/// ships `MIN_REAL_WORDS = 1`, not a higher figure, so that is the default
/// here too (see DESIGN.md Open Question resolution).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub min_chars: usize,
    pub min_real_words: usize,
    pub min_word_chars: usize,
    pub deny_patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_chars: 3,
            min_real_words: 1,
            min_word_chars: 3,
            deny_patterns: vec![
                r"^\s*$".into(),
                r"^<.*>$".into(),
                r"^>>+$".into(),
                r"^\[.*\]$".into(),
            ],
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Loading + validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Load configuration from the environment. Required variables
    /// (`DATABASE_URL`, `REDIS_URL`, `ADMIN_API_TOKEN`) fail fast with a
    /// clear message if unset, matching the original admin-api's
    /// `CRITICAL: ADMIN_API_TOKEN environment variable not set!` guard.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = require_env("DATABASE_URL")?;
        let redis_url = require_env("REDIS_URL")?;
        let admin_api_token = require_env("ADMIN_API_TOKEN")?;

        let server = ServerConfig {
            port: env_or("PORT", ServerConfig::default().port),
            host: std::env::var("HOST").unwrap_or_else(|_| ServerConfig::default().host),
            cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(str::to_string).collect())
                .unwrap_or_else(|| ServerConfig::default().cors_allowed_origins),
        };

        Ok(Self {
            server,
            database_url,
            redis_url,
            docker_host: std::env::var("DOCKER_HOST").ok(),
            admin_api_token,
            bot_image: std::env::var("BOT_IMAGE")
                .unwrap_or_else(|_| "vexa/vexa-bot:latest".into()),
            bot_network: std::env::var("BOT_NETWORK").ok(),
            exit_callback_base_url: std::env::var("EXIT_CALLBACK_BASE_URL")
                .unwrap_or_else(|_| "http://bot-manager:8000".into()),
            bus: BusConfig::default(),
            promoter: PromoterConfig::default(),
            filter: FilterConfig::default(),
        })
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.database_url.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "database_url".into(),
                message: "DATABASE_URL must not be empty".into(),
            });
        }
        if self.redis_url.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "redis_url".into(),
                message: "REDIS_URL must not be empty".into(),
            });
        }
        if self.admin_api_token.len() < 16 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "admin_api_token".into(),
                message: "admin token is shorter than 16 characters".into(),
            });
        }
        if self.server.cors_allowed_origins.len() == 1 && self.server.cors_allowed_origins[0] == "*"
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "server.cors_allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }
        for (i, pattern) in self.filter.deny_patterns.iter().enumerate() {
            if let Err(e) = regex::Regex::new(pattern) {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("filter.deny_patterns[{i}]"),
                    message: format!("invalid regex \"{pattern}\": {e}"),
                });
            }
        }

        issues
    }
}

fn require_env(key: &str) -> anyhow::Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("{key} environment variable not set"))
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            server: ServerConfig::default(),
            database_url: "postgres://localhost/vexa".into(),
            redis_url: "redis://localhost".into(),
            docker_host: None,
            admin_api_token: "a-very-long-admin-token-value".into(),
            bot_image: "vexa/vexa-bot:latest".into(),
            bot_network: None,
            exit_callback_base_url: "http://localhost:8000".into(),
            bus: BusConfig::default(),
            promoter: PromoterConfig::default(),
            filter: FilterConfig::default(),
        }
    }

    #[test]
    fn valid_config_has_no_errors() {
        let issues = base().validate();
        assert!(issues.iter().all(|i| i.severity != ConfigSeverity::Error));
    }

    #[test]
    fn zero_port_is_error() {
        let mut cfg = base();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "server.port" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn empty_database_url_is_error() {
        let mut cfg = base();
        cfg.database_url.clear();
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "database_url" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn short_admin_token_is_warning_not_error() {
        let mut cfg = base();
        cfg.admin_api_token = "short".into();
        let issues = cfg.validate();
        let issue = issues
            .iter()
            .find(|i| i.field == "admin_api_token")
            .expect("expected admin_api_token warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn invalid_deny_pattern_is_error() {
        let mut cfg = base();
        cfg.filter.deny_patterns = vec!["[unterminated".into()];
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.field.starts_with("filter.deny_patterns") && i.severity == ConfigSeverity::Error));
    }
}
