use serde::{Deserialize, Serialize};

use concord_types::ReputationReason;

/// Base delta per outcome. Roles shape who sits in a signer set, not how an
/// outcome scores, so the table is keyed by reason alone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReputationPolicy {
    pub successful_signoff: i64,
    pub verified_insight: i64,
    pub missed_consensus: i64,
    pub flagged_content: i64,
    /// Per-pass step of the decay toward the directory baseline.
    pub decay_step: u64,
}

impl Default for ReputationPolicy {
    fn default() -> Self {
        Self {
            successful_signoff: 2,
            verified_insight: 3,
            missed_consensus: -3,
            flagged_content: -15,
            decay_step: 1,
        }
    }
}

impl ReputationPolicy {
    pub fn delta(&self, reason: ReputationReason) -> i64 {
        match reason {
            ReputationReason::SuccessfulSignoff => self.successful_signoff,
            ReputationReason::VerifiedInsight => self.verified_insight,
            ReputationReason::MissedConsensus => self.missed_consensus,
            ReputationReason::FlaggedContent => self.flagged_content,
        }
    }
}
