use async_trait::async_trait;
use dashmap::DashMap;
use tracing::warn;

use concord_types::{ConcordError, ContentHash, ContentRef, RecordId};

use crate::addressing;

/// Boundary to off-ledger payload storage. The core only ever persists
/// `content_hash` + `content_ref`; payload bytes live behind this trait.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a payload, returning its locator.
    async fn put(&self, payload: Vec<u8>) -> Result<ContentRef, ConcordError>;

    /// Fetch a payload by locator.
    async fn get(&self, content_ref: &ContentRef) -> Result<Vec<u8>, ConcordError>;
}

/// In-memory content store keyed by payload digest, so identical payloads
/// share a locator the way a CID-addressed store would.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    blobs: DashMap<ContentRef, Vec<u8>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn put(&self, payload: Vec<u8>) -> Result<ContentRef, ConcordError> {
        let content_ref = ContentRef::new(format!("mem-{}", addressing::hash(&payload)));
        self.blobs.insert(content_ref.clone(), payload);
        Ok(content_ref)
    }

    async fn get(&self, content_ref: &ContentRef) -> Result<Vec<u8>, ConcordError> {
        self.blobs
            .get(content_ref)
            .map(|blob| blob.clone())
            .ok_or_else(|| ConcordError::ContentRefNotFound(content_ref.clone()))
    }
}

/// Fetch a payload and prove it still matches the hash recorded on-ledger.
///
/// Runs in the caller's context (audit/replay paths), never on the ledger's
/// critical path. A mismatch is reported as `ContentTampered`; the caller is
/// responsible for routing the flag back to the ledger.
pub async fn fetch_verified(
    store: &dyn ContentStore,
    record_id: RecordId,
    content_ref: &ContentRef,
    expected: &ContentHash,
) -> Result<Vec<u8>, ConcordError> {
    let payload = store.get(content_ref).await?;
    let actual = addressing::hash(&payload);
    if !addressing::verify(&payload, expected) {
        warn!(
            record_id = %record_id,
            content_ref = %content_ref,
            "fetched content does not match recorded hash"
        );
        return Err(ConcordError::ContentTampered {
            record_id,
            expected: *expected,
            actual,
        });
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = InMemoryContentStore::new();
        let payload = b"diagnostics snapshot".to_vec();
        let content_ref = store.put(payload.clone()).await.unwrap();
        assert_eq!(store.get(&content_ref).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_identical_payloads_share_a_ref() {
        let store = InMemoryContentStore::new();
        let a = store.put(b"same".to_vec()).await.unwrap();
        let b = store.put(b"same".to_vec()).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_missing_ref_is_reported() {
        let store = InMemoryContentStore::new();
        let missing = ContentRef::new("mem-nope");
        assert!(matches!(
            store.get(&missing).await,
            Err(ConcordError::ContentRefNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_verified_accepts_untampered_content() {
        let store = InMemoryContentStore::new();
        let payload = b"signed insight".to_vec();
        let digest = addressing::hash(&payload);
        let content_ref = store.put(payload.clone()).await.unwrap();

        let fetched = fetch_verified(&store, RecordId([1u8; 32]), &content_ref, &digest)
            .await
            .unwrap();
        assert_eq!(fetched, payload);
    }

    #[tokio::test]
    async fn test_fetch_verified_detects_tamper() {
        let store = InMemoryContentStore::new();
        let payload = b"original bytes".to_vec();
        let digest = addressing::hash(&payload);

        // Store something different under the ref the auditor will fetch.
        let content_ref = store.put(b"swapped bytes".to_vec()).await.unwrap();

        let record_id = RecordId([2u8; 32]);
        let err = fetch_verified(&store, record_id, &content_ref, &digest)
            .await
            .unwrap_err();
        match err {
            ConcordError::ContentTampered {
                record_id: got,
                expected,
                actual,
            } => {
                assert_eq!(got, record_id);
                assert_eq!(expected, digest);
                assert_ne!(actual, digest);
            }
            other => panic!("expected ContentTampered, got {other:?}"),
        }
    }
}
