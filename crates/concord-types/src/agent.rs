use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier for a registered agent.
///
/// Caller-supplied at registration time (e.g. "lyra", "verdict") and never
/// reused; retired agents keep their id for historical references.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Semantic role of an agent.
///
/// Roles inform default signer-set composition on the submission side; the
/// ledger itself treats all roles identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Orchestrator,
    Auditor,
    Compliance,
    Diagnostics,
    Generic,
}

/// Liveness status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Active and expected to participate in consensus.
    Online,
    /// Registered but currently unreachable; may still sign before a record
    /// expires.
    Offline,
    /// Decommissioned. Cannot sign new records; kept for history.
    Retired,
}

/// A registered participant identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: AgentId,
    /// Ed25519 verifying key bytes. Immutable after registration; key
    /// rotation requires a new agent id.
    pub public_key: [u8; 32],
    pub role: AgentRole,
    /// Bounded trust score in `[0, max_score]`, maintained exclusively by the
    /// reputation engine.
    pub trust_score: u64,
    pub status: AgentStatus,
    pub registered_at: DateTime<Utc>,
    /// Free-form operator metadata (version, deployment notes).
    pub metadata: Option<String>,
}

impl Agent {
    pub fn new(
        agent_id: AgentId,
        public_key: [u8; 32],
        role: AgentRole,
        baseline_score: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            agent_id,
            public_key,
            role,
            trust_score: baseline_score,
            status: AgentStatus::Online,
            registered_at: now,
            metadata: None,
        }
    }

    /// Whether this agent may contribute signatures to new records.
    pub fn can_sign(&self) -> bool {
        self.status != AgentStatus::Retired
    }
}
