use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::{AgentId, AgentRole, AgentStatus};
use crate::record::RecordId;

/// Why a trust score changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationReason {
    /// Contributed a verified signature to a record that finalized.
    SuccessfulSignoff,
    /// Submitted an insight that reached consensus.
    VerifiedInsight,
    /// Named in a signer set but never signed before expiry.
    MissedConsensus,
    /// Submitted content that later failed tamper verification.
    FlaggedContent,
}

/// Immutable audit entry explaining a single trust-score change.
///
/// Current scores are the clamped running sum of these deltas from the
/// configured baseline; the log itself is never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationEvent {
    pub agent_id: AgentId,
    pub delta: i64,
    pub reason: ReputationReason,
    pub record_id: Option<RecordId>,
    pub timestamp: DateTime<Utc>,
}

/// Push notification published on state transitions, consumed by dashboards
/// over the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    AgentRegistered {
        agent_id: AgentId,
        role: AgentRole,
    },
    AgentStatusChanged {
        agent_id: AgentId,
        status: AgentStatus,
    },
    RecordOpened {
        record_id: RecordId,
        creator: AgentId,
    },
    RecordFinalized {
        record_id: RecordId,
    },
    RecordRejected {
        record_id: RecordId,
    },
    RecordExpired {
        record_id: RecordId,
    },
    ReputationChanged {
        agent_id: AgentId,
        new_score: u64,
        reason: Option<ReputationReason>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_serde_snake_case() {
        let json = serde_json::to_string(&ReputationReason::MissedConsensus).unwrap();
        assert_eq!(json, "\"missed_consensus\"");
    }

    #[test]
    fn test_domain_event_tagging() {
        let event = DomainEvent::RecordFinalized {
            record_id: RecordId([4u8; 32]),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "record_finalized");
    }

    #[test]
    fn test_reputation_event_roundtrip() {
        let event = ReputationEvent {
            agent_id: AgentId::from("echo"),
            delta: -3,
            reason: ReputationReason::MissedConsensus,
            record_id: Some(RecordId([1u8; 32])),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ReputationEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
