use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{info, warn};

use concord_directory::AgentDirectory;
use concord_journal::{Journal, JournalEntryKind};
use concord_reputation::ReputationEngine;
use concord_types::{
    AgentId, ConcordError, ConsensusRecord, ContentHash, ContentRef, QuorumRule, RecordId,
    RecordStatus, ReputationReason, Result, SignatureRecord,
};

use crate::outcome::{SubmissionOutcome, SweepOutcome, TamperOutcome};

/// Singleton owner of all consensus records and their lifecycle.
///
/// Record mutations happen under the record's map entry guard and never span
/// an `.await`; journal appends and reputation deltas follow the mutation on
/// an already-committed snapshot.
pub struct ConsensusLedger {
    records: DashMap<RecordId, ConsensusRecord>,
    directory: Arc<AgentDirectory>,
    reputation: Arc<ReputationEngine>,
    journal: Arc<dyn Journal>,
}

impl ConsensusLedger {
    pub fn new(
        directory: Arc<AgentDirectory>,
        reputation: Arc<ReputationEngine>,
        journal: Arc<dyn Journal>,
    ) -> Self {
        Self {
            records: DashMap::new(),
            directory,
            reputation,
            journal,
        }
    }

    /// Open a pending record for a content-addressed insight.
    ///
    /// The creator and every named signer must be registered; the creator
    /// must not be retired. The record id is derived from the content hash,
    /// creator and timestamp, so resubmitting the same insight in the same
    /// instant is reported as a duplicate.
    pub async fn open(
        &self,
        creator: &AgentId,
        content_hash: ContentHash,
        content_ref: ContentRef,
        rule: QuorumRule,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<ConsensusRecord> {
        let creator_agent = self.directory.get(creator)?;
        if !creator_agent.can_sign() {
            return Err(ConcordError::AgentRetired(creator.clone()));
        }
        if let Some(signers) = rule.expected_signers() {
            for signer in signers {
                self.directory.get(signer)?;
            }
        }

        let record = ConsensusRecord::open(
            creator.clone(),
            content_hash,
            content_ref,
            rule,
            ttl,
            now,
        )?;
        let record_id = record.record_id;

        match self.records.entry(record_id) {
            Entry::Occupied(_) => return Err(ConcordError::DuplicateRecord(record_id)),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }

        info!(record_id = %record_id, creator = %creator, "consensus record opened");
        self.journal
            .append(
                JournalEntryKind::RecordOpened,
                Some(creator.clone()),
                Some(record_id),
                serde_json::json!({
                    "content_hash": record.content_hash,
                    "content_ref": record.content_ref,
                    "rule": record.rule,
                    "expires_at": record.expires_at,
                }),
                now,
            )
            .await?;
        Ok(record)
    }

    /// Submit one agent's signature for a pending record.
    ///
    /// Rejections leave the record untouched. An accepted signature is stored
    /// and the threshold re-evaluated; crossing it finalizes the record and
    /// credits every verified signer plus the submitting creator. Expected
    /// signers who stay silent are only ever penalized by the expiry sweep.
    pub async fn submit_signature(
        &self,
        record_id: RecordId,
        agent_id: &AgentId,
        signature: &[u8],
        now: DateTime<Utc>,
    ) -> Result<SubmissionOutcome> {
        let (snapshot, finalized) = {
            let mut entry = self
                .records
                .get_mut(&record_id)
                .ok_or(ConcordError::RecordNotFound(record_id))?;
            let record = entry.value_mut();

            if !record.is_pending() {
                return Err(ConcordError::RecordNotPending(record_id));
            }
            let agent = self.directory.get(agent_id)?;
            if !agent.can_sign() {
                return Err(ConcordError::AgentRetired(agent_id.clone()));
            }
            if !record.rule.admits(agent_id) {
                return Err(ConcordError::SignerNotExpected {
                    record_id,
                    agent_id: agent_id.clone(),
                });
            }
            if record.has_signed(agent_id) {
                return Err(ConcordError::DuplicateSignature {
                    record_id,
                    agent_id: agent_id.clone(),
                });
            }

            let digest = concord_crypto::signing_digest(&record.record_id, &record.content_hash);
            if !concord_crypto::verify_signature(&digest, signature, &agent.public_key) {
                // A malformed or mismatched signature is a client error, not
                // an offense: no reputation side effect.
                warn!(record_id = %record_id, agent_id = %agent_id, "signature failed verification");
                return Err(ConcordError::InvalidSignature {
                    record_id,
                    agent_id: agent_id.clone(),
                });
            }

            record.signatures.insert(
                agent_id.clone(),
                SignatureRecord {
                    signature: signature.to_vec(),
                    verified: true,
                    signed_at: now,
                },
            );

            let verified_weight: u64 = record
                .verified_signers()
                .map(|id| self.directory.trust_score(id))
                .sum();
            let finalized = record
                .rule
                .satisfied(record.verified_count(), verified_weight);
            if finalized {
                record.mark_finalized(now);
            }
            (record.clone(), finalized)
        };

        self.journal
            .append(
                JournalEntryKind::SignatureAccepted,
                Some(agent_id.clone()),
                Some(record_id),
                serde_json::json!({ "verified_count": snapshot.verified_count() }),
                now,
            )
            .await?;

        let mut reputation = Vec::new();
        if finalized {
            info!(record_id = %record_id, signers = snapshot.verified_count(), "record finalized");
            self.journal
                .append(
                    JournalEntryKind::RecordFinalized,
                    Some(snapshot.creator.clone()),
                    Some(record_id),
                    serde_json::json!({ "finalized_at": snapshot.finalized_at }),
                    now,
                )
                .await?;

            let signers: Vec<AgentId> = snapshot.verified_signers().cloned().collect();
            for signer in &signers {
                reputation.push(
                    self.reputation
                        .record_outcome(
                            signer,
                            ReputationReason::SuccessfulSignoff,
                            Some(record_id),
                            now,
                        )
                        .await?,
                );
            }
            reputation.push(
                self.reputation
                    .record_outcome(
                        &snapshot.creator,
                        ReputationReason::VerifiedInsight,
                        Some(record_id),
                        now,
                    )
                    .await?,
            );
        }

        Ok(SubmissionOutcome {
            record: snapshot,
            finalized,
            reputation,
        })
    }

    /// Expire every pending record whose TTL has lapsed and penalize the
    /// expected signers that never produced a verified signature.
    ///
    /// Maintenance operation driven by an injected clock; idempotent per
    /// record, so any sweep schedule is safe and terminal records are never
    /// revisited.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepOutcome> {
        let mut newly_expired = Vec::new();
        for mut entry in self.records.iter_mut() {
            let record = entry.value_mut();
            if record.is_pending() && record.is_expired(now) {
                record.mark_expired();
                newly_expired.push(record.clone());
            }
        }

        let mut outcome = SweepOutcome::default();
        for record in newly_expired {
            info!(record_id = %record.record_id, "record expired");
            self.journal
                .append(
                    JournalEntryKind::RecordExpired,
                    Some(record.creator.clone()),
                    Some(record.record_id),
                    serde_json::json!({ "expires_at": record.expires_at }),
                    now,
                )
                .await?;

            for signer in record.missing_signers() {
                outcome.reputation.push(
                    self.reputation
                        .record_outcome(
                            &signer,
                            ReputationReason::MissedConsensus,
                            Some(record.record_id),
                            now,
                        )
                        .await?,
                );
            }
            outcome.expired.push(record.record_id);
        }
        Ok(outcome)
    }

    /// Register a tamper finding from the audit path: content fetched for
    /// this record no longer matched its recorded hash.
    ///
    /// The submitting agent is penalized with a flagged-content event. A
    /// record caught while still pending is rejected; a terminal record keeps
    /// its status (finality stays monotonic) and only the flag is recorded.
    pub async fn report_tampered(
        &self,
        record_id: RecordId,
        now: DateTime<Utc>,
    ) -> Result<TamperOutcome> {
        let (snapshot, rejected) = {
            let mut entry = self
                .records
                .get_mut(&record_id)
                .ok_or(ConcordError::RecordNotFound(record_id))?;
            let record = entry.value_mut();
            let rejected = if record.is_pending() {
                record.mark_rejected();
                true
            } else {
                false
            };
            (record.clone(), rejected)
        };

        warn!(record_id = %record_id, creator = %snapshot.creator, rejected, "content flagged as tampered");
        self.journal
            .append(
                JournalEntryKind::ContentFlagged,
                Some(snapshot.creator.clone()),
                Some(record_id),
                serde_json::json!({ "content_ref": snapshot.content_ref }),
                now,
            )
            .await?;
        if rejected {
            self.journal
                .append(
                    JournalEntryKind::RecordRejected,
                    Some(snapshot.creator.clone()),
                    Some(record_id),
                    serde_json::json!({}),
                    now,
                )
                .await?;
        }

        let change = self
            .reputation
            .record_outcome(
                &snapshot.creator,
                ReputationReason::FlaggedContent,
                Some(record_id),
                now,
            )
            .await?;

        Ok(TamperOutcome {
            record_id,
            rejected,
            reputation: vec![change],
        })
    }

    /// Snapshot of a single record.
    pub fn get(&self, record_id: RecordId) -> Result<ConsensusRecord> {
        self.records
            .get(&record_id)
            .map(|r| r.clone())
            .ok_or(ConcordError::RecordNotFound(record_id))
    }

    /// Snapshot of every record, unordered.
    pub fn list(&self) -> Vec<ConsensusRecord> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }

    /// Snapshot of records in a given status, unordered.
    pub fn list_by_status(&self, status: RecordStatus) -> Vec<ConsensusRecord> {
        self.records
            .iter()
            .filter(|r| r.value().status == status)
            .map(|r| r.value().clone())
            .collect()
    }
}
