use std::collections::BTreeSet;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{Duration, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use concord_journal::JournalEntry;
use concord_ledger::{SubmissionOutcome, SweepOutcome};
use concord_reputation::ScoreChange;
use concord_types::{
    Agent, AgentId, AgentRole, AgentStatus, ConcordError, ConsensusRecord, DomainEvent,
    QuorumRule, RecordId, RecordStatus, ReputationEvent, parse_hex32,
};

use crate::error::ApiError;
use crate::events;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/agents", post(register_agent).get(list_agents))
        .route("/api/v1/agents/{agent_id}", get(get_agent))
        .route("/api/v1/agents/{agent_id}/status", post(set_agent_status))
        .route(
            "/api/v1/agents/{agent_id}/metadata",
            post(update_agent_metadata),
        )
        .route(
            "/api/v1/agents/{agent_id}/reputation",
            get(agent_reputation),
        )
        .route("/api/v1/records", post(open_record).get(list_records))
        .route("/api/v1/records/{record_id}", get(get_record))
        .route("/api/v1/records/{record_id}/signatures", post(sign_record))
        .route("/api/v1/records/{record_id}/audit", post(audit_record))
        .route("/api/v1/maintenance/sweep", post(sweep_expired))
        .route("/api/v1/maintenance/decay", post(decay_pass))
        .route("/api/v1/journal", get(journal_entries))
        .route("/api/v1/events/ws", get(events::events_ws))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn parse_hex(s: &str) -> Result<Vec<u8>, ApiError> {
    if !s.is_ascii() || s.len() % 2 != 0 {
        return Err(ConcordError::MalformedHash(s.to_string()).into());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| ConcordError::MalformedHash(s.to_string()).into())
}

#[derive(serde::Deserialize)]
struct RegisterAgentRequest {
    agent_id: AgentId,
    /// 64-character hex encoding of the Ed25519 verifying key.
    public_key: String,
    role: AgentRole,
}

async fn register_agent(
    State(state): State<AppState>,
    Json(req): Json<RegisterAgentRequest>,
) -> Result<(StatusCode, Json<Agent>), ApiError> {
    let public_key = parse_hex32(&req.public_key)?;
    let agent = state
        .directory
        .register(req.agent_id, public_key, req.role, Utc::now())
        .await?;
    state.publish(DomainEvent::AgentRegistered {
        agent_id: agent.agent_id.clone(),
        role: agent.role,
    });
    Ok((StatusCode::CREATED, Json(agent)))
}

async fn list_agents(State(state): State<AppState>) -> Json<Vec<Agent>> {
    Json(state.directory.list())
}

async fn get_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<AgentId>,
) -> Result<Json<Agent>, ApiError> {
    Ok(Json(state.directory.get(&agent_id)?))
}

#[derive(serde::Deserialize)]
struct SetStatusRequest {
    status: AgentStatus,
}

async fn set_agent_status(
    State(state): State<AppState>,
    Path(agent_id): Path<AgentId>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<Agent>, ApiError> {
    let agent = state
        .directory
        .set_status(&agent_id, req.status, Utc::now())
        .await?;
    state.publish(DomainEvent::AgentStatusChanged {
        agent_id,
        status: req.status,
    });
    Ok(Json(agent))
}

#[derive(serde::Deserialize)]
struct UpdateMetadataRequest {
    metadata: String,
}

async fn update_agent_metadata(
    State(state): State<AppState>,
    Path(agent_id): Path<AgentId>,
    Json(req): Json<UpdateMetadataRequest>,
) -> Result<Json<Agent>, ApiError> {
    let agent = state
        .directory
        .update_metadata(&agent_id, req.metadata, Utc::now())
        .await?;
    Ok(Json(agent))
}

#[derive(serde::Serialize)]
struct ReputationResponse {
    agent_id: AgentId,
    trust_score: u64,
    status: AgentStatus,
    history: Vec<ReputationEvent>,
}

async fn agent_reputation(
    State(state): State<AppState>,
    Path(agent_id): Path<AgentId>,
) -> Result<Json<ReputationResponse>, ApiError> {
    let agent = state.directory.get(&agent_id)?;
    let history = state.directory.reputation_history(&agent_id).await?;
    Ok(Json(ReputationResponse {
        agent_id,
        trust_score: agent.trust_score,
        status: agent.status,
        history,
    }))
}

#[derive(serde::Deserialize)]
struct OpenRecordRequest {
    creator: AgentId,
    /// Insight body. Stored off-ledger; only its hash and locator go on the
    /// record.
    payload: String,
    #[serde(default)]
    required_signers: Vec<AgentId>,
    /// Minimum verified-signature count; defaults to the full signer set.
    #[serde(default)]
    quorum: Option<u32>,
    /// Switches the record to reputation-weighted consensus.
    #[serde(default)]
    threshold_weight: Option<u64>,
    #[serde(default)]
    ttl_secs: Option<i64>,
}

async fn open_record(
    State(state): State<AppState>,
    Json(req): Json<OpenRecordRequest>,
) -> Result<(StatusCode, Json<ConsensusRecord>), ApiError> {
    let now = Utc::now();
    let payload = req.payload.into_bytes();
    let content_hash = concord_content::hash(&payload);
    let content_ref = state.content_store.put(payload).await?;

    let rule = match req.threshold_weight {
        Some(threshold_weight) => QuorumRule::Weighted { threshold_weight },
        None => {
            let signers: BTreeSet<AgentId> = req.required_signers.into_iter().collect();
            let quorum = req.quorum.unwrap_or(signers.len() as u32);
            QuorumRule::Headcount { signers, quorum }
        }
    };
    let ttl = Duration::seconds(req.ttl_secs.unwrap_or(state.config.default_ttl_secs));

    let record = state
        .ledger
        .open(&req.creator, content_hash, content_ref, rule, ttl, now)
        .await?;
    state.publish(DomainEvent::RecordOpened {
        record_id: record.record_id,
        creator: record.creator.clone(),
    });
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(serde::Deserialize)]
struct ListRecordsQuery {
    status: Option<RecordStatus>,
}

async fn list_records(
    State(state): State<AppState>,
    Query(query): Query<ListRecordsQuery>,
) -> Json<Vec<ConsensusRecord>> {
    let records = match query.status {
        Some(status) => state.ledger.list_by_status(status),
        None => state.ledger.list(),
    };
    Json(records)
}

async fn get_record(
    State(state): State<AppState>,
    Path(record_id): Path<RecordId>,
) -> Result<Json<ConsensusRecord>, ApiError> {
    Ok(Json(state.ledger.get(record_id)?))
}

#[derive(serde::Deserialize)]
struct SignRecordRequest {
    agent_id: AgentId,
    /// 128-character hex encoding of the Ed25519 signature over
    /// `sha256(record_id || content_hash)`.
    signature: String,
}

async fn sign_record(
    State(state): State<AppState>,
    Path(record_id): Path<RecordId>,
    Json(req): Json<SignRecordRequest>,
) -> Result<Json<SubmissionOutcome>, ApiError> {
    let signature = parse_hex(&req.signature)?;
    let outcome = state
        .ledger
        .submit_signature(record_id, &req.agent_id, &signature, Utc::now())
        .await?;

    if outcome.finalized {
        state.publish(DomainEvent::RecordFinalized { record_id });
    }
    state.publish_score_changes(&outcome.reputation);
    Ok(Json(outcome))
}

#[derive(serde::Serialize)]
struct AuditResponse {
    record_id: RecordId,
    verified: bool,
    payload_bytes: usize,
}

/// Fetch a record's content from the store and re-verify it against the
/// on-ledger hash. A mismatch flags the submitter and, for a pending record,
/// rejects it; the tamper error is returned to the caller either way.
async fn audit_record(
    State(state): State<AppState>,
    Path(record_id): Path<RecordId>,
) -> Result<Json<AuditResponse>, ApiError> {
    let record = state.ledger.get(record_id)?;
    let fetched = concord_content::fetch_verified(
        state.content_store.as_ref(),
        record_id,
        &record.content_ref,
        &record.content_hash,
    )
    .await;

    match fetched {
        Ok(payload) => Ok(Json(AuditResponse {
            record_id,
            verified: true,
            payload_bytes: payload.len(),
        })),
        Err(err @ ConcordError::ContentTampered { .. }) => {
            let outcome = state.ledger.report_tampered(record_id, Utc::now()).await?;
            if outcome.rejected {
                state.publish(DomainEvent::RecordRejected { record_id });
            }
            state.publish_score_changes(&outcome.reputation);
            Err(err.into())
        }
        Err(other) => Err(other.into()),
    }
}

async fn sweep_expired(State(state): State<AppState>) -> Result<Json<SweepOutcome>, ApiError> {
    let outcome = state.ledger.sweep_expired(Utc::now()).await?;
    for record_id in &outcome.expired {
        state.publish(DomainEvent::RecordExpired {
            record_id: *record_id,
        });
    }
    state.publish_score_changes(&outcome.reputation);
    Ok(Json(outcome))
}

#[derive(serde::Serialize)]
struct DecayResponse {
    adjusted: Vec<ScoreChange>,
}

async fn decay_pass(State(state): State<AppState>) -> Result<Json<DecayResponse>, ApiError> {
    let adjusted = state.reputation.decay_pass(Utc::now()).await?;
    state.publish_score_changes(&adjusted);
    Ok(Json(DecayResponse { adjusted }))
}

#[derive(serde::Serialize)]
struct JournalResponse {
    entries: Vec<JournalEntry>,
    chain_intact: bool,
}

async fn journal_entries(State(state): State<AppState>) -> Result<Json<JournalResponse>, ApiError> {
    let entries = state.journal.entries().await?;
    let chain_intact = state.journal.verify_integrity().await?;
    Ok(Json(JournalResponse {
        entries,
        chain_intact,
    }))
}
