use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use concord_directory::AgentDirectory;
use concord_types::{AgentId, AgentStatus, RecordId, ReputationReason, Result};

use crate::policy::ReputationPolicy;

/// A single applied score adjustment, surfaced so callers can publish
/// notifications without the engine owning any channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreChange {
    pub agent_id: AgentId,
    pub delta: i64,
    /// `None` for decay adjustments, which carry no outcome reason.
    pub reason: Option<ReputationReason>,
    pub record_id: Option<RecordId>,
    pub new_score: u64,
}

/// Turns ledger outcomes into bounded trust-score deltas. The sole writer of
/// trust scores: every change flows through the directory's clamped
/// apply/decay operations and lands in the journal.
pub struct ReputationEngine {
    directory: Arc<AgentDirectory>,
    policy: ReputationPolicy,
}

impl ReputationEngine {
    pub fn new(directory: Arc<AgentDirectory>, policy: ReputationPolicy) -> Self {
        Self { directory, policy }
    }

    pub fn policy(&self) -> ReputationPolicy {
        self.policy
    }

    /// Apply the policy delta for a ledger outcome to one agent.
    pub async fn record_outcome(
        &self,
        agent_id: &AgentId,
        reason: ReputationReason,
        record_id: Option<RecordId>,
        now: DateTime<Utc>,
    ) -> Result<ScoreChange> {
        let delta = self.policy.delta(reason);
        let new_score = self
            .directory
            .apply_reputation_delta(agent_id, delta, reason, record_id, now)
            .await?;
        Ok(ScoreChange {
            agent_id: agent_id.clone(),
            delta,
            reason: Some(reason),
            record_id,
            new_score,
        })
    }

    /// Maintenance pass: move every non-retired agent one step toward the
    /// baseline. Safe to run on any schedule; agents already at the baseline
    /// are untouched. Retired scores stay frozen for history.
    pub async fn decay_pass(&self, now: DateTime<Utc>) -> Result<Vec<ScoreChange>> {
        let mut changes = Vec::new();
        for agent in self.directory.list() {
            if agent.status == AgentStatus::Retired {
                continue;
            }
            let before = agent.trust_score;
            if let Some(new_score) = self
                .directory
                .apply_decay_step(&agent.agent_id, self.policy.decay_step, now)
                .await?
            {
                changes.push(ScoreChange {
                    agent_id: agent.agent_id,
                    delta: new_score as i64 - before as i64,
                    reason: None,
                    record_id: None,
                    new_score,
                });
            }
        }
        debug!(adjusted = changes.len(), "decay pass complete");
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_directory::DirectoryConfig;
    use concord_journal::InMemoryJournal;
    use concord_types::AgentRole;

    async fn setup() -> (Arc<AgentDirectory>, ReputationEngine) {
        let directory = Arc::new(AgentDirectory::new(
            DirectoryConfig::default(),
            Arc::new(InMemoryJournal::new()),
        ));
        let engine = ReputationEngine::new(directory.clone(), ReputationPolicy::default());
        (directory, engine)
    }

    async fn register(directory: &AgentDirectory, id: &str) {
        directory
            .register(AgentId::from(id), [0u8; 32], AgentRole::Generic, Utc::now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_record_outcome_applies_policy_delta() {
        let (directory, engine) = setup().await;
        register(&directory, "lyra").await;

        let change = engine
            .record_outcome(
                &AgentId::from("lyra"),
                ReputationReason::SuccessfulSignoff,
                Some(RecordId([1u8; 32])),
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(change.delta, 2);
        assert_eq!(change.new_score, 52);
        assert_eq!(directory.trust_score(&AgentId::from("lyra")), 52);
    }

    #[tokio::test]
    async fn test_record_outcome_unknown_agent() {
        let (_directory, engine) = setup().await;
        let err = engine
            .record_outcome(
                &AgentId::from("ghost"),
                ReputationReason::MissedConsensus,
                None,
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, concord_types::ConcordError::UnknownAgent(_)));
    }

    #[tokio::test]
    async fn test_decay_pass_converges_and_skips_retired() {
        let (directory, engine) = setup().await;
        register(&directory, "high").await;
        register(&directory, "frozen").await;

        engine
            .record_outcome(
                &AgentId::from("high"),
                ReputationReason::VerifiedInsight,
                None,
                Utc::now(),
            )
            .await
            .unwrap();
        engine
            .record_outcome(
                &AgentId::from("frozen"),
                ReputationReason::VerifiedInsight,
                None,
                Utc::now(),
            )
            .await
            .unwrap();
        directory
            .set_status(&AgentId::from("frozen"), AgentStatus::Retired, Utc::now())
            .await
            .unwrap();

        // 53 -> 52 -> 51 -> 50, then a no-op pass.
        for expected in [52, 51, 50] {
            let changes = engine.decay_pass(Utc::now()).await.unwrap();
            assert_eq!(changes.len(), 1, "retired agent must not decay");
            assert_eq!(changes[0].new_score, expected);
        }
        assert!(engine.decay_pass(Utc::now()).await.unwrap().is_empty());
        assert_eq!(directory.trust_score(&AgentId::from("frozen")), 53);
    }
}
