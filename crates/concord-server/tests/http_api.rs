use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use concord_server::{AppState, handlers};
use concord_types::{ContentHash, RecordId};

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

async fn send(
    router: Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_agent_registration_over_http() {
    let state = AppState::default();
    let router = handlers::router(state);

    let key = concord_crypto::generate_signing_key();
    let body = json!({
        "agent_id": "lyra",
        "public_key": hex(&concord_crypto::public_key_bytes(&key)),
        "role": "orchestrator",
    });

    let (status, agent) = send(router.clone(), "POST", "/api/v1/agents", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(agent["agent_id"], "lyra");
    assert_eq!(agent["trust_score"], 50);
    assert_eq!(agent["status"], "online");

    // Same id again: structured conflict, not a silent overwrite.
    let (status, error) = send(router.clone(), "POST", "/api/v1/agents", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "duplicate_agent");

    let (status, error) = send(
        router,
        "POST",
        "/api/v1/agents",
        Some(json!({"agent_id": "echo", "public_key": "not-hex", "role": "auditor"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], "malformed_hash");
}

#[tokio::test]
async fn test_consensus_round_over_http() {
    let state = AppState::default();
    let router = handlers::router(state);

    let mut keys = std::collections::HashMap::new();
    for (agent, role) in [("lyra", "orchestrator"), ("echo", "auditor"), ("verdict", "compliance")] {
        let key = concord_crypto::generate_signing_key();
        let (status, _) = send(
            router.clone(),
            "POST",
            "/api/v1/agents",
            Some(json!({
                "agent_id": agent,
                "public_key": hex(&concord_crypto::public_key_bytes(&key)),
                "role": role,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        keys.insert(agent, key);
    }

    let (status, record) = send(
        router.clone(),
        "POST",
        "/api/v1/records",
        Some(json!({
            "creator": "lyra",
            "payload": "joint insight: release approved",
            "required_signers": ["echo", "verdict"],
            "quorum": 2,
            "ttl_secs": 60,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["status"], "pending");

    let record_id: RecordId = record["record_id"].as_str().unwrap().parse().unwrap();
    let content_hash: ContentHash = record["content_hash"].as_str().unwrap().parse().unwrap();
    let digest = concord_crypto::signing_digest(&record_id, &content_hash);

    let (status, outcome) = send(
        router.clone(),
        "POST",
        &format!("/api/v1/records/{record_id}/signatures"),
        Some(json!({
            "agent_id": "echo",
            "signature": hex(&concord_crypto::sign_digest(&digest, &keys["echo"])),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["finalized"], false);

    let (status, outcome) = send(
        router.clone(),
        "POST",
        &format!("/api/v1/records/{record_id}/signatures"),
        Some(json!({
            "agent_id": "verdict",
            "signature": hex(&concord_crypto::sign_digest(&digest, &keys["verdict"])),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["finalized"], true);
    assert_eq!(outcome["record"]["status"], "finalized");

    // A replayed signature is rejected against the terminal record.
    let (status, error) = send(
        router.clone(),
        "POST",
        &format!("/api/v1/records/{record_id}/signatures"),
        Some(json!({
            "agent_id": "echo",
            "signature": hex(&concord_crypto::sign_digest(&digest, &keys["echo"])),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "record_not_pending");

    let (status, reputation) = send(
        router.clone(),
        "GET",
        "/api/v1/agents/echo/reputation",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reputation["trust_score"], 52);
    assert_eq!(reputation["history"][0]["reason"], "successful_signoff");

    // The audit pass confirms stored content still matches the record hash.
    let (status, audit) = send(
        router.clone(),
        "POST",
        &format!("/api/v1/records/{record_id}/audit"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit["verified"], true);

    let (status, journal) = send(router, "GET", "/api/v1/journal", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(journal["chain_intact"], true);
}
