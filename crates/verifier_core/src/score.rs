//! Deterministic risk scoring.
//!
//! A pure function of the probe and classification outcomes, no I/O. The
//! range is bounded by the sum of the configured weights, not hard-coded to
//! 100.

use serde::{Deserialize, Serialize};

/// Additive weights for the two scoring signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Added when the RCPT handshake positively accepted the recipient.
    pub smtp_verified: u8,
    /// Added when the domain is not on the blacklist.
    pub not_blacklisted: u8,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            smtp_verified: 50,
            not_blacklisted: 30,
        }
    }
}

impl ScoreWeights {
    /// Upper bound of the score under these weights.
    pub fn max_score(&self) -> u8 {
        self.smtp_verified.saturating_add(self.not_blacklisted)
    }

    pub fn score(&self, smtp_verified: bool, blacklisted: bool) -> u8 {
        let mut score = 0u8;
        if smtp_verified {
            score = score.saturating_add(self.smtp_verified);
        }
        if !blacklisted {
            score = score.saturating_add(self.not_blacklisted);
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reference_weights() {
        let weights = ScoreWeights::default();
        assert_eq!(weights.score(true, false), 80);
        assert_eq!(weights.score(false, true), 0);
        assert_eq!(weights.score(true, true), 50);
        assert_eq!(weights.score(false, false), 30);
    }

    #[test]
    fn range_follows_configured_weights() {
        let weights = ScoreWeights {
            smtp_verified: 60,
            not_blacklisted: 40,
        };
        assert_eq!(weights.max_score(), 100);
        assert_eq!(weights.score(true, false), 100);
        assert_eq!(weights.score(false, false), 40);
    }

    #[test]
    fn is_deterministic() {
        let weights = ScoreWeights::default();
        for _ in 0..3 {
            assert_eq!(weights.score(true, false), weights.score(true, false));
        }
    }
}
