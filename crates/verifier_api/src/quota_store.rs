//! In-memory API-key quota store.
//!
//! Owns the key records: created at issuance, incremented atomically after
//! each admitted batch, and reset on a rolling 24-hour window measured from
//! the first use inside the window. `admit` reserves the batch size against
//! the limit and `charge` converts the reservation into committed usage, so
//! two concurrent batches on one key cannot jointly exceed the daily limit.
//! Persistence is out of scope; a restart forgets issued keys.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;
use verifier_core::quota::{QuotaError, QuotaGuard};

/// Daily usage record for one API key.
#[derive(Debug, Clone)]
pub struct KeyRecord {
    pub used_today: u32,
    pub daily_limit: u32,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Admitted but not yet charged; counts against the limit so concurrent
    /// batches on the same key cannot overshoot it.
    reserved: u32,
    window_started_at: DateTime<Utc>,
}

impl KeyRecord {
    /// Reset the counter when the rolling 24h window has elapsed.
    fn roll_window(&mut self, now: DateTime<Utc>) {
        if now - self.window_started_at >= Duration::hours(24) {
            self.used_today = 0;
            self.window_started_at = now;
        }
    }
}

/// Thread-safe in-memory quota store keyed by API key.
pub struct InMemoryQuotaStore {
    records: Mutex<HashMap<String, KeyRecord>>,
    daily_limit: u32,
    key_ttl: Option<Duration>,
}

impl InMemoryQuotaStore {
    pub fn new(daily_limit: u32, key_ttl_days: Option<i64>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            daily_limit,
            key_ttl: key_ttl_days.map(Duration::days),
        }
    }

    /// Issue a fresh API key with the configured daily limit.
    pub fn issue_key(&self) -> String {
        let key = Uuid::new_v4().to_string();
        let now = Utc::now();
        let record = KeyRecord {
            used_today: 0,
            daily_limit: self.daily_limit,
            issued_at: now,
            expires_at: self.key_ttl.map(|ttl| now + ttl),
            reserved: 0,
            window_started_at: now,
        };
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone(), record);
        info!("issued new API key");
        key
    }

    pub fn key_count(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    #[cfg(test)]
    fn backdate_window(&self, api_key: &str, hours: i64) {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(api_key).expect("key exists");
        record.window_started_at -= Duration::hours(hours);
    }
}

#[async_trait]
impl QuotaGuard for InMemoryQuotaStore {
    async fn admit(&self, api_key: &str, count: usize) -> Result<(), QuotaError> {
        let now = Utc::now();
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let record = records.get_mut(api_key).ok_or(QuotaError::UnknownKey)?;

        if let Some(expires_at) = record.expires_at {
            if now >= expires_at {
                debug!("rejecting expired API key");
                return Err(QuotaError::ExpiredKey);
            }
        }

        record.roll_window(now);
        let committed = record.used_today.saturating_add(record.reserved);
        if committed.saturating_add(count as u32) > record.daily_limit {
            debug!(
                used = record.used_today,
                reserved = record.reserved,
                limit = record.daily_limit,
                requested = count,
                "daily limit reached"
            );
            return Err(QuotaError::LimitExceeded {
                used: record.used_today,
                limit: record.daily_limit,
            });
        }
        record.reserved = record.reserved.saturating_add(count as u32);
        Ok(())
    }

    async fn charge(&self, api_key: &str, count: usize) {
        let now = Utc::now();
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = records.get_mut(api_key) {
            record.roll_window(now);
            record.reserved = record.reserved.saturating_sub(count as u32);
            record.used_today = record.used_today.saturating_add(count as u32);
        }
    }
}
