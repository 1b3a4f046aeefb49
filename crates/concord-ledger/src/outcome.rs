use serde::{Deserialize, Serialize};

use concord_reputation::ScoreChange;
use concord_types::{ConsensusRecord, RecordId};

/// Result of an accepted signature submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// Snapshot of the record after the mutation.
    pub record: ConsensusRecord,
    /// Whether this submission crossed the threshold.
    pub finalized: bool,
    /// Reputation changes applied as a consequence (empty unless finalized).
    pub reputation: Vec<ScoreChange>,
}

/// Result of an expiry sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepOutcome {
    /// Records transitioned to Expired by this sweep.
    pub expired: Vec<RecordId>,
    /// Missed-consensus penalties applied.
    pub reputation: Vec<ScoreChange>,
}

/// Result of a tamper report against a record's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TamperOutcome {
    pub record_id: RecordId,
    /// True when the record was still pending and moved to Rejected.
    pub rejected: bool,
    /// The flagged-content penalty applied to the submitter.
    pub reputation: Vec<ScoreChange>,
}
