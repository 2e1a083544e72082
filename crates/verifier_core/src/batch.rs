//! Batch orchestration.
//!
//! Fans a list of addresses out across a bounded set of tokio tasks and
//! collects per-address results. The SMTP probe is slow, blocking and
//! externally throttled, so bounding concurrency is mandatory; unbounded
//! fan-out risks resource exhaustion and remote rate limiting.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::pipeline::Pipeline;
use crate::quota::{QuotaError, QuotaGuard};
use crate::VerificationResult;

/// Batch-level failure: fatal to the whole request, reported before any
/// per-address work begins.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error("batch of {size} addresses exceeds the maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },
}

/// Orchestration tuning. Chunking bounds peak memory and gives the batch
/// deadline its cancellation granularity; none of these affect correctness.
#[derive(Debug, Clone)]
pub struct BatchLimits {
    /// Hard cap on addresses per request.
    pub max_batch_size: usize,
    pub chunk_size: usize,
    /// Concurrent in-flight pipeline runs.
    pub max_concurrency: usize,
    /// Whole-batch deadline; addresses left over are reported
    /// `not_processed`, never silently dropped.
    pub deadline: Duration,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_batch_size: 2000,
            chunk_size: 150,
            max_concurrency: 25,
            deadline: Duration::from_secs(120),
        }
    }
}

/// Per-batch outcome, partitioned by verdict. Input order is preserved
/// within each bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BatchReport {
    pub valid: Vec<VerificationResult>,
    pub invalid: Vec<VerificationResult>,
}

/// Applies the pipeline to a batch of addresses under quota admission.
pub struct BatchVerifier {
    pipeline: Arc<Pipeline>,
    quota: Arc<dyn QuotaGuard>,
    limits: BatchLimits,
}

impl BatchVerifier {
    pub fn new(pipeline: Arc<Pipeline>, quota: Arc<dyn QuotaGuard>, limits: BatchLimits) -> Self {
        Self {
            pipeline,
            quota,
            limits,
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Verify a batch under the given API key.
    ///
    /// The whole batch is rejected (no partial processing) when the quota
    /// guard denies it. On success every input address appears in exactly
    /// one of the report's buckets, and the quota is charged the full batch
    /// size exactly once, after all workers complete.
    #[instrument(skip(self, emails), fields(batch_size = emails.len()))]
    pub async fn verify(
        &self,
        emails: &[String],
        api_key: &str,
    ) -> Result<BatchReport, BatchError> {
        if emails.len() > self.limits.max_batch_size {
            return Err(BatchError::BatchTooLarge {
                size: emails.len(),
                max: self.limits.max_batch_size,
            });
        }

        self.quota.admit(api_key, emails.len()).await?;

        let deadline = Instant::now() + self.limits.deadline;
        let semaphore = Arc::new(Semaphore::new(self.limits.max_concurrency));
        let mut slots: Vec<Option<VerificationResult>> = vec![None; emails.len()];

        let indexed: Vec<(usize, String)> = emails.iter().cloned().enumerate().collect();
        for chunk in indexed.chunks(self.limits.chunk_size) {
            let mut handles = Vec::with_capacity(chunk.len());

            for (idx, email) in chunk.iter().cloned() {
                let permit =
                    match tokio::time::timeout_at(deadline, Arc::clone(&semaphore).acquire_owned())
                        .await
                    {
                        Ok(Ok(permit)) => permit,
                        Ok(Err(_)) | Err(_) => {
                            debug!(email, "batch deadline reached before dispatch");
                            slots[idx] = Some(VerificationResult::not_processed(&email));
                            continue;
                        }
                    };

                let pipeline = Arc::clone(&self.pipeline);
                handles.push((
                    idx,
                    email.clone(),
                    tokio::spawn(async move {
                        let _permit = permit;
                        tokio::time::timeout_at(deadline, pipeline.verify_one(&email)).await
                    }),
                ));
            }

            for (idx, email, handle) in handles {
                let result = match handle.await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_elapsed)) => {
                        debug!(email, "batch deadline reached mid-flight");
                        VerificationResult::not_processed(&email)
                    }
                    Err(join_err) => {
                        warn!(email, error = %join_err, "verification task failed");
                        VerificationResult::not_processed(&email)
                    }
                };
                slots[idx] = Some(result);
            }
        }

        self.quota.charge(api_key, emails.len()).await;

        let mut report = BatchReport::default();
        for result in slots.into_iter().flatten() {
            if result.valid {
                report.valid.push(result);
            } else {
                report.invalid.push(result);
            }
        }

        info!(
            valid = report.valid.len(),
            invalid = report.invalid.len(),
            "batch verified"
        );
        Ok(report)
    }
}
