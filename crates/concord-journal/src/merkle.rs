use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rs_merkle::{Hasher, MerkleTree, algorithms::Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use concord_types::{AgentId, ConcordError, RecordId};

use crate::entry::{JournalEntry, JournalEntryKind};
use crate::traits::Journal;

/// Merkle tree-backed journal for proof-carrying audit exports.
#[derive(Clone)]
pub struct MerkleJournal {
    entries: Arc<RwLock<Vec<JournalEntry>>>,
    tree: Arc<RwLock<MerkleTree<Sha256>>>,
}

impl Default for MerkleJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl MerkleJournal {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            tree: Arc::new(RwLock::new(MerkleTree::<Sha256>::new())),
        }
    }

    /// Current Merkle root hash.
    pub async fn root_hex(&self) -> Option<String> {
        let tree = self.tree.read().await;
        tree.root_hex()
    }

    /// Inclusion proof for the entry at the given index.
    pub async fn proof(&self, index: usize) -> Option<Vec<u8>> {
        let tree = self.tree.read().await;
        let entries = self.entries.read().await;
        if index >= entries.len() {
            return None;
        }
        Some(tree.proof(&[index]).to_bytes())
    }
}

fn entry_to_leaf(entry: &JournalEntry) -> [u8; 32] {
    let data = format!("{}:{}", entry.id, entry.hash);
    Sha256::hash(data.as_bytes())
}

#[async_trait]
impl Journal for MerkleJournal {
    async fn append(
        &self,
        kind: JournalEntryKind,
        agent_id: Option<AgentId>,
        record_id: Option<RecordId>,
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Result<JournalEntry, ConcordError> {
        let mut entries = self.entries.write().await;
        let mut tree = self.tree.write().await;

        let previous_hash = entries.last().map(|e| e.hash.clone());
        let entry = JournalEntry::new(kind, agent_id, record_id, payload, previous_hash, timestamp);

        tree.insert(entry_to_leaf(&entry));
        tree.commit();
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn get(&self, id: Uuid) -> Result<Option<JournalEntry>, ConcordError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().find(|e| e.id == id).cloned())
    }

    async fn latest_hash(&self) -> Result<Option<String>, ConcordError> {
        let entries = self.entries.read().await;
        Ok(entries.last().map(|e| e.hash.clone()))
    }

    async fn by_agent(&self, agent_id: &AgentId) -> Result<Vec<JournalEntry>, ConcordError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.agent_id.as_ref() == Some(agent_id))
            .cloned()
            .collect())
    }

    async fn by_record(&self, record_id: RecordId) -> Result<Vec<JournalEntry>, ConcordError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.record_id == Some(record_id))
            .cloned()
            .collect())
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
        let tree = self.tree.read().await;
        let entries = self.entries.read().await;

        for (i, entry) in entries.iter().enumerate() {
            if entry.hash != entry.compute_hash() {
                return Ok(false);
            }
            if i > 0 && entry.previous_hash.as_ref() != Some(&entries[i - 1].hash) {
                return Ok(false);
            }
        }

        if entries.is_empty() {
            return Ok(true);
        }

        let expected_leaves: Vec<[u8; 32]> = entries.iter().map(entry_to_leaf).collect();
        let indices: Vec<usize> = (0..entries.len()).collect();
        if let Some(root) = tree.root() {
            let proof = tree.proof(&indices);
            Ok(proof.verify(root, &indices, &expected_leaves, entries.len()))
        } else {
            Ok(false)
        }
    }
}
