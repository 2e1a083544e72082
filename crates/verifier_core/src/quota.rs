//! Quota admission interface.
//!
//! The batch orchestrator consumes this interface; key issuance, encoding
//! and persistence live with the implementation (see the API crate's
//! in-memory store).

use async_trait::async_trait;
use thiserror::Error;

/// Why a batch was denied admission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuotaError {
    #[error("invalid or missing API key")]
    UnknownKey,
    #[error("API key expired")]
    ExpiredKey,
    #[error("daily limit reached")]
    LimitExceeded { used: u32, limit: u32 },
}

/// Admits or denies a batch against a key's daily usage.
///
/// `admit` is called once before any per-address work; `charge` exactly
/// once after all workers complete, so accounting is atomic per request.
#[async_trait]
pub trait QuotaGuard: Send + Sync {
    async fn admit(&self, api_key: &str, count: usize) -> Result<(), QuotaError>;
    async fn charge(&self, api_key: &str, count: usize);
}
