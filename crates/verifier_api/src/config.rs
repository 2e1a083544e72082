//! Configuration for the verification API.
//!
//! Loaded with figment: defaults, then an optional `Config.toml`, then
//! `VERIFIER_`-prefixed environment variables.

use serde::{Deserialize, Serialize};
use verifier_core::smtp::TransportPolicy;
use verifier_core::VerifyPolicy;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub verification: VerificationConfig,
    pub limits: LimitsConfig,
    pub observability: ObservabilityConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// DNS query timeout in milliseconds.
    pub dns_timeout_ms: u64,
    /// DNS retry attempts.
    pub dns_attempts: usize,
    /// TTL for cached MX verdicts, positive and negative, in seconds.
    pub mx_cache_ttl_secs: u64,
    /// `plaintext` (port 25) or `starttls` (port 587). Constant per
    /// deployment.
    pub smtp_transport: TransportPolicy,
    /// Total budget for one SMTP probe in seconds.
    pub smtp_timeout_secs: u64,
    /// Fixed EHLO identity.
    pub helo_domain: String,
    /// Constant, non-dereferenceable MAIL FROM sender.
    pub probe_sender: String,
    /// `lenient` or `strict` soft-fail policy.
    pub policy: VerifyPolicy,
    /// Score weight for a positively verified recipient.
    pub smtp_verified_weight: u8,
    /// Score weight for a non-blacklisted domain.
    pub not_blacklisted_weight: u8,
    /// Override for the bundled disposable-provider list.
    pub disposable_list_path: Option<String>,
    /// Override for the bundled blacklist.
    pub blacklist_path: Option<String>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            dns_timeout_ms: 5000,
            dns_attempts: 2,
            mx_cache_ttl_secs: 300,
            smtp_transport: TransportPolicy::Plaintext,
            smtp_timeout_secs: 10,
            helo_domain: "verifier.invalid".to_string(),
            probe_sender: "no-reply@verifier.invalid".to_string(),
            policy: VerifyPolicy::Lenient,
            smtp_verified_weight: 50,
            not_blacklisted_weight: 30,
            disposable_list_path: None,
            blacklist_path: None,
        }
    }
}

/// Batch and quota limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum addresses per request.
    pub max_batch_size: usize,
    /// Addresses per processing chunk.
    pub chunk_size: usize,
    /// Concurrent in-flight pipeline runs.
    pub max_concurrency: usize,
    /// Whole-batch deadline in seconds.
    pub batch_deadline_secs: u64,
    /// Daily verification quota per API key.
    pub daily_limit: u32,
    /// Optional key lifetime in days; `None` means keys never expire.
    pub key_ttl_days: Option<i64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 2000,
            chunk_size: 150,
            max_concurrency: 25,
            batch_deadline_secs: 120,
            daily_limit: 1000,
            key_ttl_days: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Emit JSON structured logs instead of the human-readable format.
    pub json_logs: bool,
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            log_level: "info".to_string(),
        }
    }
}
