use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use concord_types::{AgentId, RecordId};

/// Kinds of journal entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEntryKind {
    AgentRegistered,
    AgentStatusChanged,
    AgentMetadataUpdated,
    RecordOpened,
    SignatureAccepted,
    RecordFinalized,
    RecordRejected,
    RecordExpired,
    ReputationChanged,
    ContentFlagged,
}

/// An immutable, hash-chained audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub kind: JournalEntryKind,
    pub timestamp: DateTime<Utc>,
    /// The agent this entry concerns, when there is one.
    pub agent_id: Option<AgentId>,
    /// The consensus record this entry concerns, when there is one.
    pub record_id: Option<RecordId>,
    pub payload: serde_json::Value,
    pub previous_hash: Option<String>,
    pub hash: String,
}

impl JournalEntry {
    pub fn new(
        kind: JournalEntryKind,
        agent_id: Option<AgentId>,
        record_id: Option<RecordId>,
        payload: serde_json::Value,
        previous_hash: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self {
            id: Uuid::new_v4(),
            kind,
            timestamp,
            agent_id,
            record_id,
            payload,
            previous_hash,
            hash: String::new(),
        };
        entry.hash = entry.compute_hash();
        entry
    }

    /// SHA-256 over every field except the hash itself. Timestamps enter as
    /// fixed-width microseconds so the digest is encoding-independent.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.id.as_bytes());
        hasher.update(self.timestamp.timestamp_micros().to_le_bytes());
        hasher.update(serde_json::to_string(&self.kind).unwrap_or_default().as_bytes());
        match &self.agent_id {
            Some(agent) => hasher.update(agent.as_str().as_bytes()),
            None => hasher.update(b"-"),
        }
        match &self.record_id {
            Some(record) => hasher.update(record.as_bytes()),
            None => hasher.update(b"-"),
        }
        hasher.update(self.payload.to_string().as_bytes());
        hasher.update(self.previous_hash.as_deref().unwrap_or("genesis").as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}
