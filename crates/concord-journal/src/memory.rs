use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use concord_types::{AgentId, ConcordError, RecordId};

use crate::entry::{JournalEntry, JournalEntryKind};
use crate::traits::Journal;

/// In-memory journal implementation (default).
#[derive(Debug, Clone, Default)]
pub struct InMemoryJournal {
    entries: Arc<RwLock<Vec<JournalEntry>>>,
    index_by_id: Arc<DashMap<Uuid, usize>>,
    index_by_agent: Arc<DashMap<AgentId, Vec<usize>>>,
    index_by_record: Arc<DashMap<RecordId, Vec<usize>>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Journal for InMemoryJournal {
    async fn append(
        &self,
        kind: JournalEntryKind,
        agent_id: Option<AgentId>,
        record_id: Option<RecordId>,
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Result<JournalEntry, ConcordError> {
        // Chain under the write lock so concurrent appends serialize.
        let mut entries = self.entries.write().await;
        let previous_hash = entries.last().map(|e| e.hash.clone());
        let entry = JournalEntry::new(kind, agent_id, record_id, payload, previous_hash, timestamp);

        let idx = entries.len();
        self.index_by_id.insert(entry.id, idx);
        if let Some(agent) = &entry.agent_id {
            self.index_by_agent.entry(agent.clone()).or_default().push(idx);
        }
        if let Some(record) = entry.record_id {
            self.index_by_record.entry(record).or_default().push(idx);
        }

        entries.push(entry.clone());
        Ok(entry)
    }

    async fn get(&self, id: Uuid) -> Result<Option<JournalEntry>, ConcordError> {
        let entries = self.entries.read().await;
        Ok(self
            .index_by_id
            .get(&id)
            .and_then(|idx| entries.get(*idx).cloned()))
    }

    async fn latest_hash(&self) -> Result<Option<String>, ConcordError> {
        let entries = self.entries.read().await;
        Ok(entries.last().map(|e| e.hash.clone()))
    }

    async fn by_agent(&self, agent_id: &AgentId) -> Result<Vec<JournalEntry>, ConcordError> {
        let entries = self.entries.read().await;
        Ok(self
            .index_by_agent
            .get(agent_id)
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|i| entries.get(*i).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn by_record(&self, record_id: RecordId) -> Result<Vec<JournalEntry>, ConcordError> {
        let entries = self.entries.read().await;
        Ok(self
            .index_by_record
            .get(&record_id)
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|i| entries.get(*i).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn by_kind(&self, kind: JournalEntryKind) -> Result<Vec<JournalEntry>, ConcordError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|e| e.kind == kind).cloned().collect())
    }

    async fn entries(&self) -> Result<Vec<JournalEntry>, ConcordError> {
        let entries = self.entries.read().await;
        Ok(entries.clone())
    }

    async fn verify_integrity(&self) -> Result<bool, ConcordError> {
        let entries = self.entries.read().await;
        for (i, entry) in entries.iter().enumerate() {
            if entry.hash != entry.compute_hash() {
                return Ok(false);
            }
            if i == 0 {
                if entry.previous_hash.is_some() {
                    return Ok(false);
                }
            } else if entry.previous_hash.as_ref() != Some(&entries[i - 1].hash) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn append_simple(
        journal: &InMemoryJournal,
        kind: JournalEntryKind,
        agent: &str,
    ) -> JournalEntry {
        journal
            .append(
                kind,
                Some(AgentId::from(agent)),
                None,
                serde_json::json!({}),
                Utc::now(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_append_and_get() {
        let journal = InMemoryJournal::new();
        let entry = append_simple(&journal, JournalEntryKind::AgentRegistered, "lyra").await;

        let retrieved = journal.get(entry.id).await.unwrap();
        assert_eq!(retrieved.unwrap().id, entry.id);
    }

    #[tokio::test]
    async fn test_chain_integrity() {
        let journal = InMemoryJournal::new();
        for agent in ["lyra", "echo", "verdict"] {
            append_simple(&journal, JournalEntryKind::AgentRegistered, agent).await;
        }

        assert!(journal.verify_integrity().await.unwrap());

        let entries = journal.entries().await.unwrap();
        assert!(entries[0].previous_hash.is_none());
        assert_eq!(entries[2].previous_hash.as_ref(), Some(&entries[1].hash));
    }

    #[tokio::test]
    async fn test_query_by_agent() {
        let journal = InMemoryJournal::new();
        for _ in 0..3 {
            append_simple(&journal, JournalEntryKind::ReputationChanged, "echo").await;
        }
        append_simple(&journal, JournalEntryKind::ReputationChanged, "lyra").await;

        let results = journal.by_agent(&AgentId::from("echo")).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_query_by_record() {
        let journal = InMemoryJournal::new();
        let record = RecordId([7u8; 32]);
        journal
            .append(
                JournalEntryKind::RecordOpened,
                Some(AgentId::from("lyra")),
                Some(record),
                serde_json::json!({}),
                Utc::now(),
            )
            .await
            .unwrap();
        append_simple(&journal, JournalEntryKind::AgentRegistered, "echo").await;

        let results = journal.by_record(record).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind, JournalEntryKind::RecordOpened);
    }

    #[tokio::test]
    async fn test_query_by_kind() {
        let journal = InMemoryJournal::new();
        append_simple(&journal, JournalEntryKind::AgentRegistered, "lyra").await;
        append_simple(&journal, JournalEntryKind::ReputationChanged, "lyra").await;

        let results = journal
            .by_kind(JournalEntryKind::ReputationChanged)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_chain() {
        let journal = Arc::new(InMemoryJournal::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let journal = journal.clone();
            handles.push(tokio::spawn(async move {
                journal
                    .append(
                        JournalEntryKind::SignatureAccepted,
                        Some(AgentId::new(format!("agent-{i}"))),
                        None,
                        serde_json::json!({}),
                        Utc::now(),
                    )
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(journal.entries().await.unwrap().len(), 16);
        assert!(journal.verify_integrity().await.unwrap());
    }
}
