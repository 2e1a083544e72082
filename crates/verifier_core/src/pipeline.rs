//! Per-address verification pipeline.
//!
//! A fixed, short-circuiting sequence of stages: syntax check, disposable
//! check, blacklist check, MX resolution, SMTP probe, scoring. Failure at
//! any stage produces the terminal result immediately; no later stage runs,
//! which bounds network cost for clearly-invalid input.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::classifier::DomainClassifier;
use crate::mx::MxCache;
use crate::score::ScoreWeights;
use crate::smtp::{ProbeFailure, RecipientProbe};
use crate::syntax::Address;
use crate::{FailureReason, VerificationResult, VerifyPolicy};

/// Composes the pipeline stages into one per-address decision.
pub struct Pipeline {
    classifier: DomainClassifier,
    mx_cache: MxCache,
    probe: Arc<dyn RecipientProbe>,
    weights: ScoreWeights,
    policy: VerifyPolicy,
}

impl Pipeline {
    pub fn new(
        classifier: DomainClassifier,
        mx_cache: MxCache,
        probe: Arc<dyn RecipientProbe>,
        weights: ScoreWeights,
        policy: VerifyPolicy,
    ) -> Self {
        Self {
            classifier,
            mx_cache,
            probe,
            weights,
            policy,
        }
    }

    /// Run one address through the full pipeline.
    ///
    /// Never returns an error: every failure is captured as data in the
    /// result so one bad address cannot fail a batch.
    #[instrument(skip(self), fields(email = %raw))]
    pub async fn verify_one(&self, raw: &str) -> VerificationResult {
        let Some(address) = Address::parse(raw) else {
            debug!("syntax check failed");
            return VerificationResult::failed(
                raw,
                FailureReason::SyntaxInvalid,
                false,
                &self.weights,
            );
        };

        if self.classifier.is_disposable(address.domain()) {
            debug!(domain = address.domain(), "disposable domain");
            return VerificationResult::failed(
                raw,
                FailureReason::Disposable,
                false,
                &self.weights,
            );
        }

        if self.classifier.is_blacklisted(address.domain()) {
            debug!(domain = address.domain(), "blacklisted domain");
            return VerificationResult::failed(
                raw,
                FailureReason::Blacklisted,
                true,
                &self.weights,
            );
        }

        let verdict = self.mx_cache.resolve(address.domain()).await;
        let Some(mx_host) = verdict.mx_host.filter(|_| verdict.has_mx) else {
            return VerificationResult::failed(
                raw,
                verdict.reason.unwrap_or(FailureReason::NoMxRecord),
                false,
                &self.weights,
            );
        };

        let outcome = self.probe.probe(&mx_host, address.raw()).await;
        let smtp_verified = outcome.accepted_recipient;
        let error_reason = outcome.failure.map(|f| match f {
            ProbeFailure::Rejected => FailureReason::SmtpRejected,
            ProbeFailure::Temporary => FailureReason::SmtpTemporary,
            ProbeFailure::Unreachable | ProbeFailure::ProtocolError => {
                FailureReason::SmtpUnreachable
            }
        });

        // MX is confirmed at this point. Under the lenient policy only a
        // hard 5xx rejection flips the verdict; an unreachable or
        // greylisting server leaves the address valid-but-unverified.
        let valid = match self.policy {
            VerifyPolicy::Strict => smtp_verified,
            VerifyPolicy::Lenient => !matches!(outcome.failure, Some(ProbeFailure::Rejected)),
        };

        VerificationResult {
            email: raw.to_owned(),
            valid,
            mx_host: Some(mx_host),
            smtp_verified,
            blacklisted: false,
            risk_score: self.weights.score(smtp_verified, false),
            error_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mx::{MxLookupError, MxRecord, MxResolve};
    use crate::smtp::ProbeOutcome;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubResolver {
        calls: AtomicUsize,
        response: Result<Vec<MxRecord>, MxLookupError>,
    }

    impl StubResolver {
        fn new(response: Result<Vec<MxRecord>, MxLookupError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                response,
            })
        }
    }

    #[async_trait]
    impl MxResolve for StubResolver {
        async fn lookup_mx(&self, _domain: &str) -> Result<Vec<MxRecord>, MxLookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    struct StubProbe {
        calls: AtomicUsize,
        outcome: ProbeOutcome,
    }

    impl StubProbe {
        fn new(outcome: ProbeOutcome) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome,
            })
        }
    }

    #[async_trait]
    impl RecipientProbe for StubProbe {
        async fn probe(&self, _mx_host: &str, _email: &str) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome
        }
    }

    fn pipeline_with(
        resolver: Arc<StubResolver>,
        probe: Arc<StubProbe>,
        policy: VerifyPolicy,
    ) -> Pipeline {
        Pipeline::new(
            DomainClassifier::from_lists("mailinator.com\n", "known-spammer.example\n"),
            MxCache::new(resolver, Duration::from_secs(300)),
            probe,
            ScoreWeights::default(),
            policy,
        )
    }

    fn working_resolver() -> Arc<StubResolver> {
        StubResolver::new(Ok(vec![MxRecord {
            preference: 10,
            exchange: "mail.example.com".to_owned(),
        }]))
    }

    #[tokio::test]
    async fn syntax_failure_makes_no_network_calls() {
        let resolver = working_resolver();
        let probe = StubProbe::new(ProbeOutcome::accepted());
        let pipeline = pipeline_with(resolver.clone(), probe.clone(), VerifyPolicy::Lenient);

        let result = pipeline.verify_one("not-an-email").await;

        assert!(!result.valid);
        assert_eq!(result.error_reason, Some(FailureReason::SyntaxInvalid));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disposable_domain_short_circuits_before_network() {
        let resolver = working_resolver();
        let probe = StubProbe::new(ProbeOutcome::accepted());
        let pipeline = pipeline_with(resolver.clone(), probe.clone(), VerifyPolicy::Lenient);

        let result = pipeline.verify_one("user@mailinator.com").await;

        assert!(!result.valid);
        assert_eq!(result.error_reason, Some(FailureReason::Disposable));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blacklisted_domain_short_circuits_and_zeroes_score() {
        let resolver = working_resolver();
        let probe = StubProbe::new(ProbeOutcome::accepted());
        let pipeline = pipeline_with(resolver.clone(), probe.clone(), VerifyPolicy::Lenient);

        let result = pipeline.verify_one("user@known-spammer.example").await;

        assert!(!result.valid);
        assert!(result.blacklisted);
        assert_eq!(result.error_reason, Some(FailureReason::Blacklisted));
        assert_eq!(result.risk_score, 0);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_mx_record_skips_probe() {
        let resolver = StubResolver::new(Err(MxLookupError::NoRecords));
        let probe = StubProbe::new(ProbeOutcome::accepted());
        let pipeline = pipeline_with(resolver, probe.clone(), VerifyPolicy::Lenient);

        let result = pipeline
            .verify_one("x@nonexistent-domain-xyz123.test")
            .await;

        assert!(!result.valid);
        assert_eq!(result.error_reason, Some(FailureReason::NoMxRecord));
        assert_eq!(result.mx_host, None);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn accepted_recipient_is_valid_and_scored() {
        let pipeline = pipeline_with(
            working_resolver(),
            StubProbe::new(ProbeOutcome::accepted()),
            VerifyPolicy::Lenient,
        );

        let result = pipeline.verify_one("user@example.com").await;

        assert!(result.valid);
        assert!(result.smtp_verified);
        assert_eq!(result.mx_host.as_deref(), Some("mail.example.com"));
        assert_eq!(result.risk_score, 80);
        assert_eq!(result.error_reason, None);
    }

    #[tokio::test]
    async fn hard_rejection_is_invalid_under_both_policies() {
        for policy in [VerifyPolicy::Lenient, VerifyPolicy::Strict] {
            let pipeline = pipeline_with(
                working_resolver(),
                StubProbe::new(ProbeOutcome::refused(ProbeFailure::Rejected)),
                policy,
            );
            let result = pipeline.verify_one("user@example.com").await;
            assert!(!result.valid, "policy {policy:?}");
            assert_eq!(result.error_reason, Some(FailureReason::SmtpRejected));
        }
    }

    #[tokio::test]
    async fn greylisting_is_unverified_but_valid_under_lenient() {
        let pipeline = pipeline_with(
            working_resolver(),
            StubProbe::new(ProbeOutcome::refused(ProbeFailure::Temporary)),
            VerifyPolicy::Lenient,
        );

        let result = pipeline.verify_one("user@example.com").await;

        assert!(result.valid);
        assert!(!result.smtp_verified);
        assert_eq!(result.error_reason, Some(FailureReason::SmtpTemporary));
        assert_eq!(result.risk_score, 30);
    }

    #[tokio::test]
    async fn greylisting_is_invalid_under_strict() {
        let pipeline = pipeline_with(
            working_resolver(),
            StubProbe::new(ProbeOutcome::refused(ProbeFailure::Temporary)),
            VerifyPolicy::Strict,
        );

        let result = pipeline.verify_one("user@example.com").await;

        assert!(!result.valid);
        assert_eq!(result.error_reason, Some(FailureReason::SmtpTemporary));
    }

    #[tokio::test]
    async fn unreachable_exchanger_keeps_mx_host_in_result() {
        let pipeline = pipeline_with(
            working_resolver(),
            StubProbe::new(ProbeOutcome::unreachable()),
            VerifyPolicy::Lenient,
        );

        let result = pipeline.verify_one("user@example.com").await;

        assert!(result.valid);
        assert!(!result.smtp_verified);
        assert_eq!(result.mx_host.as_deref(), Some("mail.example.com"));
        assert_eq!(result.error_reason, Some(FailureReason::SmtpUnreachable));
    }

    #[tokio::test]
    async fn domain_lookups_are_case_insensitive() {
        let resolver = working_resolver();
        let probe = StubProbe::new(ProbeOutcome::accepted());
        let pipeline = pipeline_with(resolver.clone(), probe, VerifyPolicy::Lenient);

        let result = pipeline.verify_one("user@MAILINATOR.COM").await;

        assert_eq!(result.error_reason, Some(FailureReason::Disposable));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }
}
