use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use concord_types::ConcordError;

/// Wrapper mapping the domain error taxonomy onto HTTP responses, so callers
/// can distinguish error kinds without parsing messages.
#[derive(Debug)]
pub struct ApiError(pub ConcordError);

impl From<ConcordError> for ApiError {
    fn from(err: ConcordError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn error_kind(err: &ConcordError) -> &'static str {
    match err {
        ConcordError::DuplicateAgent(_) => "duplicate_agent",
        ConcordError::UnknownAgent(_) => "unknown_agent",
        ConcordError::AgentRetired(_) => "agent_retired",
        ConcordError::EmptySignerSet => "empty_signer_set",
        ConcordError::RecordNotFound(_) => "record_not_found",
        ConcordError::DuplicateRecord(_) => "duplicate_record",
        ConcordError::RecordNotPending(_) => "record_not_pending",
        ConcordError::SignerNotExpected { .. } => "signer_not_expected",
        ConcordError::DuplicateSignature { .. } => "duplicate_signature",
        ConcordError::InvalidSignature { .. } => "invalid_signature",
        ConcordError::ContentTampered { .. } => "content_tampered",
        ConcordError::ContentRefNotFound(_) => "content_ref_not_found",
        ConcordError::MalformedHash(_) => "malformed_hash",
        ConcordError::Journal(_) => "journal_error",
    }
}

fn status_for(err: &ConcordError) -> StatusCode {
    match err {
        ConcordError::UnknownAgent(_)
        | ConcordError::RecordNotFound(_)
        | ConcordError::ContentRefNotFound(_) => StatusCode::NOT_FOUND,
        ConcordError::DuplicateAgent(_)
        | ConcordError::DuplicateRecord(_)
        | ConcordError::DuplicateSignature { .. }
        | ConcordError::RecordNotPending(_)
        | ConcordError::ContentTampered { .. } => StatusCode::CONFLICT,
        ConcordError::AgentRetired(_) | ConcordError::SignerNotExpected { .. } => {
            StatusCode::FORBIDDEN
        }
        ConcordError::InvalidSignature { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ConcordError::EmptySignerSet | ConcordError::MalformedHash(_) => StatusCode::BAD_REQUEST,
        ConcordError::Journal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: error_kind(&self.0),
            message: self.0.to_string(),
        };
        (status_for(&self.0), Json(body)).into_response()
    }
}
