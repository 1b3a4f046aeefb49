use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use concord_types::{AgentId, ConcordError, RecordId};

use crate::entry::{JournalEntry, JournalEntryKind};

/// Append-only audit journal. Implementations chain entries internally so
/// concurrent appends can never fork the hash chain.
#[async_trait]
pub trait Journal: Send + Sync {
    /// Append a new entry, chained onto the current head. Returns the stored
    /// entry including its hash.
    async fn append(
        &self,
        kind: JournalEntryKind,
        agent_id: Option<AgentId>,
        record_id: Option<RecordId>,
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Result<JournalEntry, ConcordError>;

    /// Get an entry by its id.
    async fn get(&self, id: Uuid) -> Result<Option<JournalEntry>, ConcordError>;

    /// Hash of the newest entry, if any.
    async fn latest_hash(&self) -> Result<Option<String>, ConcordError>;

    /// Entries concerning a given agent, oldest first.
    async fn by_agent(&self, agent_id: &AgentId) -> Result<Vec<JournalEntry>, ConcordError>;

    /// Entries concerning a given consensus record, oldest first.
    async fn by_record(&self, record_id: RecordId) -> Result<Vec<JournalEntry>, ConcordError>;

    /// Entries of a given kind, oldest first.
    async fn by_kind(&self, kind: JournalEntryKind) -> Result<Vec<JournalEntry>, ConcordError>;

    /// All entries, oldest first (for auditing).
    async fn entries(&self) -> Result<Vec<JournalEntry>, ConcordError>;

    /// Verify the hash chain and each entry's own digest.
    async fn verify_integrity(&self) -> Result<bool, ConcordError>;
}
