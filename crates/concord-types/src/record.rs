use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::agent::AgentId;
use crate::error::ConcordError;

fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_to_bytes32(s: &str) -> Option<[u8; 32]> {
    if s.len() != 64 {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let pair = std::str::from_utf8(chunk).ok()?;
        out[i] = u8::from_str_radix(pair, 16).ok()?;
    }
    Some(out)
}

/// Parse a 64-character hex string into 32 bytes (verifying keys, digests).
pub fn parse_hex32(s: &str) -> Result<[u8; 32], ConcordError> {
    hex_to_bytes32(s).ok_or_else(|| ConcordError::MalformedHash(s.to_string()))
}

/// SHA-256 digest of an insight payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bytes_to_hex(&self.0))
    }
}

impl FromStr for ContentHash {
    type Err = ConcordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex_to_bytes32(s)
            .map(Self)
            .ok_or_else(|| ConcordError::MalformedHash(s.to_string()))
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Globally unique consensus-record identifier, derived from the record's own
/// immutable fields so it cannot be chosen by the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub [u8; 32]);

impl RecordId {
    /// `sha256(content_hash || creator || created_at_micros_le)`.
    ///
    /// Fixed-width timestamp encoding keeps the derivation deterministic
    /// across serializations.
    pub fn derive(content_hash: &ContentHash, creator: &AgentId, created_at: DateTime<Utc>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content_hash.as_bytes());
        hasher.update(creator.as_str().as_bytes());
        hasher.update(created_at.timestamp_micros().to_le_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bytes_to_hex(&self.0))
    }
}

impl FromStr for RecordId {
    type Err = ConcordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex_to_bytes32(s)
            .map(Self)
            .ok_or_else(|| ConcordError::MalformedHash(s.to_string()))
    }
}

impl Serialize for RecordId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Opaque locator into the external content-addressed store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(String);

impl ContentRef {
    pub fn new(cid: impl Into<String>) -> Self {
        Self(cid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Finality condition for a consensus record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QuorumRule {
    /// A named signer set with a minimum count of verified signatures.
    Headcount {
        signers: BTreeSet<AgentId>,
        quorum: u32,
    },
    /// Any registered signer may contribute; finality once the summed trust
    /// of verified signers reaches the threshold.
    Weighted { threshold_weight: u64 },
}

impl QuorumRule {
    /// Headcount rule requiring every named signer.
    pub fn unanimous(signers: BTreeSet<AgentId>) -> Self {
        let quorum = signers.len() as u32;
        Self::Headcount { signers, quorum }
    }

    pub fn validate(&self) -> Result<(), ConcordError> {
        match self {
            Self::Headcount { signers, quorum } => {
                if signers.is_empty() || *quorum == 0 || *quorum as usize > signers.len() {
                    return Err(ConcordError::EmptySignerSet);
                }
            }
            Self::Weighted { threshold_weight } => {
                if *threshold_weight == 0 {
                    return Err(ConcordError::EmptySignerSet);
                }
            }
        }
        Ok(())
    }

    /// The named signer set, when one exists. Weighted rules are open.
    pub fn expected_signers(&self) -> Option<&BTreeSet<AgentId>> {
        match self {
            Self::Headcount { signers, .. } => Some(signers),
            Self::Weighted { .. } => None,
        }
    }

    /// Whether the rule permits this agent to sign at all.
    pub fn admits(&self, agent_id: &AgentId) -> bool {
        match self {
            Self::Headcount { signers, .. } => signers.contains(agent_id),
            Self::Weighted { .. } => true,
        }
    }

    /// Threshold evaluation over the current verified signature set.
    pub fn satisfied(&self, verified_count: usize, verified_weight: u64) -> bool {
        match self {
            Self::Headcount { quorum, .. } => verified_count >= *quorum as usize,
            Self::Weighted { threshold_weight } => verified_weight >= *threshold_weight,
        }
    }
}

/// Lifecycle of a consensus record. All states other than `Pending` are
/// terminal and absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Finalized,
    Rejected,
    Expired,
}

impl RecordStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A single agent's verified signature on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub signature: Vec<u8>,
    pub verified: bool,
    pub signed_at: DateTime<Utc>,
}

/// The unit of agreement: a content-addressed insight plus its accumulating
/// signatures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusRecord {
    pub record_id: RecordId,
    pub content_hash: ContentHash,
    pub content_ref: ContentRef,
    pub rule: QuorumRule,
    /// At most one signature per agent, keyed by signer id.
    pub signatures: BTreeMap<AgentId, SignatureRecord>,
    pub status: RecordStatus,
    pub creator: AgentId,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl ConsensusRecord {
    /// Create a new pending record. Fails if the quorum rule admits no one.
    pub fn open(
        creator: AgentId,
        content_hash: ContentHash,
        content_ref: ContentRef,
        rule: QuorumRule,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, ConcordError> {
        rule.validate()?;
        let record_id = RecordId::derive(&content_hash, &creator, now);
        Ok(Self {
            record_id,
            content_hash,
            content_ref,
            rule,
            signatures: BTreeMap::new(),
            status: RecordStatus::Pending,
            creator,
            created_at: now,
            finalized_at: None,
            expires_at: now + ttl,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == RecordStatus::Pending
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn has_signed(&self, agent_id: &AgentId) -> bool {
        self.signatures.contains_key(agent_id)
    }

    pub fn verified_signers(&self) -> impl Iterator<Item = &AgentId> {
        self.signatures
            .iter()
            .filter(|(_, sig)| sig.verified)
            .map(|(id, _)| id)
    }

    pub fn verified_count(&self) -> usize {
        self.signatures.values().filter(|s| s.verified).count()
    }

    /// Expected signers that have not produced a verified signature.
    /// Empty for weighted rules, which name no expected set.
    pub fn missing_signers(&self) -> Vec<AgentId> {
        self.rule
            .expected_signers()
            .map(|signers| {
                signers
                    .iter()
                    .filter(|id| {
                        self.signatures
                            .get(*id)
                            .map_or(true, |sig| !sig.verified)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Caller must hold the record's write guard and have checked `is_pending`.
    pub fn mark_finalized(&mut self, now: DateTime<Utc>) {
        self.status = RecordStatus::Finalized;
        self.finalized_at = Some(now);
    }

    /// Caller must hold the record's write guard and have checked `is_pending`.
    pub fn mark_expired(&mut self) {
        self.status = RecordStatus::Expired;
    }

    /// Caller must hold the record's write guard and have checked `is_pending`.
    pub fn mark_rejected(&mut self) {
        self.status = RecordStatus::Rejected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(byte: u8) -> ContentHash {
        ContentHash([byte; 32])
    }

    fn signers(names: &[&str]) -> BTreeSet<AgentId> {
        names.iter().map(|n| AgentId::from(*n)).collect()
    }

    #[test]
    fn test_record_id_deterministic() {
        let now = Utc::now();
        let a = RecordId::derive(&hash_of(1), &AgentId::from("lyra"), now);
        let b = RecordId::derive(&hash_of(1), &AgentId::from("lyra"), now);
        assert_eq!(a, b);
    }

    #[test]
    fn test_record_id_distinguishes_creator_and_time() {
        let now = Utc::now();
        let base = RecordId::derive(&hash_of(1), &AgentId::from("lyra"), now);
        let other_creator = RecordId::derive(&hash_of(1), &AgentId::from("echo"), now);
        let other_time =
            RecordId::derive(&hash_of(1), &AgentId::from("lyra"), now + Duration::microseconds(1));
        assert_ne!(base, other_creator);
        assert_ne!(base, other_time);
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let hash = hash_of(0xab);
        let hex = hash.to_string();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex.parse::<ContentHash>().unwrap(), hash);
    }

    #[test]
    fn test_hash_rejects_malformed_hex() {
        assert!("zz".repeat(32).parse::<ContentHash>().is_err());
        assert!("abcd".parse::<ContentHash>().is_err());
    }

    #[test]
    fn test_quorum_rule_validation() {
        assert!(QuorumRule::unanimous(signers(&["a", "b"])).validate().is_ok());
        assert!(matches!(
            QuorumRule::unanimous(BTreeSet::new()).validate(),
            Err(ConcordError::EmptySignerSet)
        ));
        assert!(matches!(
            QuorumRule::Headcount {
                signers: signers(&["a"]),
                quorum: 0,
            }
            .validate(),
            Err(ConcordError::EmptySignerSet)
        ));
        assert!(matches!(
            QuorumRule::Headcount {
                signers: signers(&["a"]),
                quorum: 2,
            }
            .validate(),
            Err(ConcordError::EmptySignerSet)
        ));
        assert!(matches!(
            QuorumRule::Weighted { threshold_weight: 0 }.validate(),
            Err(ConcordError::EmptySignerSet)
        ));
    }

    #[test]
    fn test_headcount_satisfaction_ignores_weight() {
        let rule = QuorumRule::Headcount {
            signers: signers(&["a", "b", "c"]),
            quorum: 2,
        };
        assert!(!rule.satisfied(1, u64::MAX));
        assert!(rule.satisfied(2, 0));
    }

    #[test]
    fn test_weighted_satisfaction_ignores_count() {
        let rule = QuorumRule::Weighted { threshold_weight: 100 };
        assert!(!rule.satisfied(50, 99));
        assert!(rule.satisfied(1, 100));
    }

    #[test]
    fn test_open_record_expiry_window() {
        let now = Utc::now();
        let record = ConsensusRecord::open(
            AgentId::from("lyra"),
            hash_of(9),
            ContentRef::new("bafy-demo"),
            QuorumRule::unanimous(signers(&["echo", "verdict"])),
            Duration::seconds(60),
            now,
        )
        .unwrap();

        assert!(record.is_pending());
        assert!(!record.is_expired(now));
        assert!(!record.is_expired(now + Duration::seconds(60)));
        assert!(record.is_expired(now + Duration::seconds(61)));
    }

    #[test]
    fn test_missing_signers_tracks_verified_only() {
        let now = Utc::now();
        let mut record = ConsensusRecord::open(
            AgentId::from("lyra"),
            hash_of(3),
            ContentRef::new("bafy-demo"),
            QuorumRule::unanimous(signers(&["echo", "verdict"])),
            Duration::seconds(60),
            now,
        )
        .unwrap();

        assert_eq!(record.missing_signers().len(), 2);

        record.signatures.insert(
            AgentId::from("echo"),
            SignatureRecord {
                signature: vec![0u8; 64],
                verified: true,
                signed_at: now,
            },
        );
        let missing = record.missing_signers();
        assert_eq!(missing, vec![AgentId::from("verdict")]);
    }

    #[test]
    fn test_terminal_states_are_not_pending() {
        assert!(!RecordStatus::Pending.is_terminal());
        assert!(RecordStatus::Finalized.is_terminal());
        assert!(RecordStatus::Rejected.is_terminal());
        assert!(RecordStatus::Expired.is_terminal());
    }
}
