use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tracing::info;

use concord_journal::{Journal, JournalEntryKind};
use concord_types::{
    Agent, AgentId, AgentRole, AgentStatus, ConcordError, RecordId, ReputationEvent,
    ReputationReason, Result,
};

/// Score bounds for the directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Upper bound for trust scores; the lower bound is always zero.
    pub max_score: u64,
    /// Score assigned at registration and the target of decay.
    pub baseline_score: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            max_score: 100,
            baseline_score: 50,
        }
    }
}

/// Apply a signed delta to a score, clamped to `[0, max_score]`. Saturating;
/// never fails on a bound violation.
pub fn clamp_delta(current: u64, delta: i64, max_score: u64) -> u64 {
    let shifted = if delta >= 0 {
        current.saturating_add(delta as u64)
    } else {
        current.saturating_sub(delta.unsigned_abs())
    };
    shifted.min(max_score)
}

/// Singleton store of agent identities. Owns every identity field except
/// `trust_score`, which only the reputation engine mutates (through
/// [`AgentDirectory::apply_reputation_delta`]).
pub struct AgentDirectory {
    agents: DashMap<AgentId, Agent>,
    config: DirectoryConfig,
    journal: Arc<dyn Journal>,
}

impl AgentDirectory {
    pub fn new(config: DirectoryConfig, journal: Arc<dyn Journal>) -> Self {
        Self {
            agents: DashMap::new(),
            config,
            journal,
        }
    }

    pub fn config(&self) -> DirectoryConfig {
        self.config
    }

    /// Register a new agent. The public key is immutable afterwards; key
    /// rotation means registering a fresh agent id.
    pub async fn register(
        &self,
        agent_id: AgentId,
        public_key: [u8; 32],
        role: AgentRole,
        now: DateTime<Utc>,
    ) -> Result<Agent> {
        let agent = match self.agents.entry(agent_id.clone()) {
            Entry::Occupied(_) => return Err(ConcordError::DuplicateAgent(agent_id)),
            Entry::Vacant(slot) => {
                let agent = Agent::new(agent_id, public_key, role, self.config.baseline_score, now);
                slot.insert(agent.clone());
                agent
            }
        };

        info!(agent_id = %agent.agent_id, ?role, "agent registered");
        self.journal
            .append(
                JournalEntryKind::AgentRegistered,
                Some(agent.agent_id.clone()),
                None,
                serde_json::json!({ "role": role, "baseline_score": agent.trust_score }),
                now,
            )
            .await?;
        Ok(agent)
    }

    /// Update an agent's liveness status.
    pub async fn set_status(
        &self,
        agent_id: &AgentId,
        status: AgentStatus,
        now: DateTime<Utc>,
    ) -> Result<Agent> {
        let agent = {
            let mut entry = self
                .agents
                .get_mut(agent_id)
                .ok_or_else(|| ConcordError::UnknownAgent(agent_id.clone()))?;
            entry.status = status;
            entry.clone()
        };

        self.journal
            .append(
                JournalEntryKind::AgentStatusChanged,
                Some(agent_id.clone()),
                None,
                serde_json::json!({ "status": status }),
                now,
            )
            .await?;
        Ok(agent)
    }

    /// Replace an agent's free-form metadata.
    pub async fn update_metadata(
        &self,
        agent_id: &AgentId,
        metadata: String,
        now: DateTime<Utc>,
    ) -> Result<Agent> {
        let agent = {
            let mut entry = self
                .agents
                .get_mut(agent_id)
                .ok_or_else(|| ConcordError::UnknownAgent(agent_id.clone()))?;
            entry.metadata = Some(metadata);
            entry.clone()
        };

        self.journal
            .append(
                JournalEntryKind::AgentMetadataUpdated,
                Some(agent_id.clone()),
                None,
                serde_json::json!({}),
                now,
            )
            .await?;
        Ok(agent)
    }

    /// Snapshot of a single agent.
    pub fn get(&self, agent_id: &AgentId) -> Result<Agent> {
        self.agents
            .get(agent_id)
            .map(|a| a.clone())
            .ok_or_else(|| ConcordError::UnknownAgent(agent_id.clone()))
    }

    /// Snapshot of every agent, unordered.
    pub fn list(&self) -> Vec<Agent> {
        self.agents.iter().map(|a| a.value().clone()).collect()
    }

    /// Current trust score of an agent, zero if unknown. Used by the weighted
    /// threshold evaluation, which must not fail mid-record.
    pub fn trust_score(&self, agent_id: &AgentId) -> u64 {
        self.agents.get(agent_id).map(|a| a.trust_score).unwrap_or(0)
    }

    /// Apply a reputation delta and append the corresponding
    /// [`ReputationEvent`] to the journal. Clamps to `[0, max_score]` and
    /// always succeeds for a known agent.
    ///
    /// Reserved for the reputation engine; other components must not call
    /// this directly.
    pub async fn apply_reputation_delta(
        &self,
        agent_id: &AgentId,
        delta: i64,
        reason: ReputationReason,
        record_id: Option<RecordId>,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let new_score = {
            let mut entry = self
                .agents
                .get_mut(agent_id)
                .ok_or_else(|| ConcordError::UnknownAgent(agent_id.clone()))?;
            entry.trust_score = clamp_delta(entry.trust_score, delta, self.config.max_score);
            entry.trust_score
        };

        let event = ReputationEvent {
            agent_id: agent_id.clone(),
            delta,
            reason,
            record_id,
            timestamp: now,
        };
        info!(agent_id = %agent_id, delta, ?reason, new_score, "reputation updated");
        self.journal
            .append(
                JournalEntryKind::ReputationChanged,
                Some(agent_id.clone()),
                record_id,
                serde_json::to_value(&event).map_err(|e| ConcordError::Journal(e.to_string()))?,
                now,
            )
            .await?;
        Ok(new_score)
    }

    /// Move an agent's score one step toward the configured baseline and
    /// journal the adjustment. Returns the new score, or `None` when the
    /// agent already sits at the baseline.
    ///
    /// Decay is bookkeeping, not an outcome: it carries no
    /// [`ReputationReason`] and therefore does not produce a
    /// [`ReputationEvent`].
    pub async fn apply_decay_step(
        &self,
        agent_id: &AgentId,
        step: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<u64>> {
        let adjusted = {
            let mut entry = self
                .agents
                .get_mut(agent_id)
                .ok_or_else(|| ConcordError::UnknownAgent(agent_id.clone()))?;
            let baseline = self.config.baseline_score;
            let current = entry.trust_score;
            if current == baseline {
                None
            } else {
                let magnitude = step.min(current.abs_diff(baseline));
                entry.trust_score = if current > baseline {
                    current - magnitude
                } else {
                    current + magnitude
                };
                Some((entry.trust_score, magnitude))
            }
        };

        match adjusted {
            None => Ok(None),
            Some((new_score, magnitude)) => {
                self.journal
                    .append(
                        JournalEntryKind::ReputationChanged,
                        Some(agent_id.clone()),
                        None,
                        serde_json::json!({ "decay": true, "step": magnitude, "new_score": new_score }),
                        now,
                    )
                    .await?;
                Ok(Some(new_score))
            }
        }
    }

    /// Reconstruct the [`ReputationEvent`] log for an agent from the journal,
    /// oldest first. Decay adjustments are journaled separately and do not
    /// appear here.
    pub async fn reputation_history(&self, agent_id: &AgentId) -> Result<Vec<ReputationEvent>> {
        let entries = self.journal.by_agent(agent_id).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.kind == JournalEntryKind::ReputationChanged)
            .filter_map(|e| serde_json::from_value::<ReputationEvent>(e.payload).ok())
            .collect())
    }
}
