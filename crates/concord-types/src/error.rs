use thiserror::Error;

use crate::agent::AgentId;
use crate::record::{ContentHash, ContentRef, RecordId};

/// Caller-visible, non-fatal error taxonomy. A rejected operation leaves all
/// state unchanged; nothing here aborts the process.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConcordError {
    #[error("agent already registered: {0}")]
    DuplicateAgent(AgentId),

    #[error("unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("agent is retired and cannot sign: {0}")]
    AgentRetired(AgentId),

    #[error("quorum rule admits no signers")]
    EmptySignerSet,

    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("record already exists: {0}")]
    DuplicateRecord(RecordId),

    #[error("record is no longer pending: {0}")]
    RecordNotPending(RecordId),

    #[error("agent {agent_id} is not in the signer set of record {record_id}")]
    SignerNotExpected {
        record_id: RecordId,
        agent_id: AgentId,
    },

    #[error("agent {agent_id} already signed record {record_id}")]
    DuplicateSignature {
        record_id: RecordId,
        agent_id: AgentId,
    },

    #[error("signature from {agent_id} failed verification for record {record_id}")]
    InvalidSignature {
        record_id: RecordId,
        agent_id: AgentId,
    },

    #[error("content for record {record_id} does not match its recorded hash")]
    ContentTampered {
        record_id: RecordId,
        expected: ContentHash,
        actual: ContentHash,
    },

    #[error("content ref not found in store: {0}")]
    ContentRefNotFound(ContentRef),

    #[error("not a valid 32-byte hex digest: {0:?}")]
    MalformedHash(String),

    #[error("journal error: {0}")]
    Journal(String),
}

pub type Result<T> = std::result::Result<T, ConcordError>;
