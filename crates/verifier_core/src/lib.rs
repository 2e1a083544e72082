//! # verifier_core
//!
//! Email deliverability verification pipeline for bulk list hygiene.
//!
//! The pipeline estimates whether an address is likely deliverable without
//! ever sending mail: it checks syntax, classifies the domain against
//! disposable/blacklist sets, resolves MX records through a TTL cache with
//! request coalescing, probes the mail exchanger with a non-destructive
//! `EHLO`/`MAIL FROM`/`RCPT TO` handshake, and combines the signals into a
//! deterministic risk score.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use verifier_core::{
//!     classifier::DomainClassifier,
//!     mx::{HickoryMxResolver, MxCache},
//!     pipeline::Pipeline,
//!     score::ScoreWeights,
//!     smtp::{LettreProbe, ProbeConfig},
//!     VerifyPolicy,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let resolver = Arc::new(HickoryMxResolver::new(5000, 2));
//!     let cache = MxCache::new(resolver, std::time::Duration::from_secs(300));
//!     let probe = Arc::new(LettreProbe::new(ProbeConfig::default()));
//!     let pipeline = Pipeline::new(
//!         DomainClassifier::bundled(),
//!         cache,
//!         probe,
//!         ScoreWeights::default(),
//!         VerifyPolicy::Lenient,
//!     );
//!
//!     let result = pipeline.verify_one("user@example.com").await;
//!     println!("valid: {}", result.valid);
//! }
//! ```

pub mod batch;
pub mod classifier;
pub mod mx;
pub mod pipeline;
pub mod quota;
pub mod score;
pub mod smtp;
pub mod syntax;

use serde::{Deserialize, Serialize};

/// Terminal reason an address failed (or was skipped) during verification.
///
/// Per-address failures are data, never errors: one bad address must not
/// fail the batch. Every DNS/SMTP library error is classified into one of
/// these variants before it reaches a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Address does not match the structural grammar.
    SyntaxInvalid,
    /// Domain belongs to a disposable-mailbox provider.
    Disposable,
    /// Domain is on the configured blacklist.
    Blacklisted,
    /// Domain has no MX record (NXDOMAIN / NoAnswer included).
    NoMxRecord,
    /// MX resolution timed out.
    DnsTimeout,
    /// Mail exchanger unreachable or handshake broke down.
    SmtpUnreachable,
    /// RCPT TO rejected with a permanent 5xx.
    SmtpRejected,
    /// RCPT TO deferred with a temporary 4xx (greylisting etc.).
    SmtpTemporary,
    /// Batch deadline expired before this address was processed.
    NotProcessed,
}

/// Whether an unverified-but-resolvable address counts as valid.
///
/// `Lenient` mirrors the soft-fail policy of treating an unreachable or
/// greylisting mail server as "unverified" rather than "invalid"; `Strict`
/// requires a positive RCPT acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyPolicy {
    Strict,
    Lenient,
}

/// Outcome of verifying a single address. Produced once per address per
/// request and returned to the caller; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// The raw address as submitted.
    pub email: String,
    /// Overall verdict under the configured [`VerifyPolicy`].
    pub valid: bool,
    /// Selected mail exchanger, when MX resolution succeeded.
    pub mx_host: Option<String>,
    /// Whether the RCPT TO handshake positively accepted the recipient.
    pub smtp_verified: bool,
    /// Whether the domain is on the configured blacklist.
    pub blacklisted: bool,
    /// Deterministic score in `[0, sum-of-weights]`, higher is better.
    pub risk_score: u8,
    /// Terminal failure reason, when any stage failed.
    pub error_reason: Option<FailureReason>,
}

impl VerificationResult {
    /// Result for an address that failed before or during a pipeline stage.
    pub(crate) fn failed(
        email: &str,
        reason: FailureReason,
        blacklisted: bool,
        weights: &score::ScoreWeights,
    ) -> Self {
        Self {
            email: email.to_owned(),
            valid: false,
            mx_host: None,
            smtp_verified: false,
            blacklisted,
            risk_score: weights.score(false, blacklisted),
            error_reason: Some(reason),
        }
    }

    /// Result for an address the batch deadline left unprocessed.
    pub(crate) fn not_processed(email: &str) -> Self {
        Self {
            email: email.to_owned(),
            valid: false,
            mx_host: None,
            smtp_verified: false,
            blacklisted: false,
            risk_score: 0,
            error_reason: Some(FailureReason::NotProcessed),
        }
    }
}

pub use batch::{BatchLimits, BatchReport, BatchVerifier};
pub use pipeline::Pipeline;
pub use quota::{QuotaError, QuotaGuard};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn result_serializes_with_snake_case_reason() {
        let result = VerificationResult {
            email: "user@example.com".to_owned(),
            valid: false,
            mx_host: Some("mail.example.com".to_owned()),
            smtp_verified: false,
            blacklisted: false,
            risk_score: 30,
            error_reason: Some(FailureReason::SmtpTemporary),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "email": "user@example.com",
                "valid": false,
                "mx_host": "mail.example.com",
                "smtp_verified": false,
                "blacklisted": false,
                "risk_score": 30,
                "error_reason": "smtp_temporary",
            })
        );
    }

    #[test]
    fn policy_deserializes_from_lowercase() {
        let policy: VerifyPolicy = serde_json::from_str("\"lenient\"").unwrap();
        assert_eq!(policy, VerifyPolicy::Lenient);
        let policy: VerifyPolicy = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(policy, VerifyPolicy::Strict);
    }
}
