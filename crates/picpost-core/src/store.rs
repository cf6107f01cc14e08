use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Field of a [`Document`] that carries its identifier.
pub const ID_FIELD: &str = "id";

/// A stored record: a JSON object whose `id` field is its key.
pub type Document = Map<String, Value>;

/// The two independent collections the service writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Posts,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Users, Collection::Posts];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Posts => "posts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors produced by record store implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No document with the requested identifier exists.
    #[error("no documents in result: {collection} has no record with id {id:?}")]
    NotFound { collection: Collection, id: String },
    /// An insert named an identifier that is already taken.
    #[error("duplicate key: {collection} already has a record with id {id:?}")]
    DuplicateId { collection: Collection, id: String },
    /// Underlying storage cannot serve the call.
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },
    /// The call did not complete within the store wait ceiling.
    #[error("store call exceeded {after:?}")]
    Timeout { after: Duration },
    /// A document could not be read or carries an invalid identifier.
    #[error("malformed document: {reason}")]
    Malformed { reason: String },
}

/// Keyed insert/find contract over the `users` and `posts` collections.
///
/// No updates, deletes, or queries beyond identifier equality.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Check that the store can accept calls.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Persist a document and return its effective identifier.
    /// An empty or missing `id` field is replaced by a store-assigned one.
    async fn insert(&self, collection: Collection, document: Document)
        -> Result<String, StoreError>;

    /// Fetch the single document whose identifier equals `id`.
    async fn find_by_id(&self, collection: Collection, id: &str)
        -> Result<Document, StoreError>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn ping(&self) -> Result<(), StoreError> {
        (**self).ping().await
    }

    async fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<String, StoreError> {
        (**self).insert(collection, document).await
    }

    async fn find_by_id(&self, collection: Collection, id: &str) -> Result<Document, StoreError> {
        (**self).find_by_id(collection, id).await
    }
}

/// Fresh store-assigned identifier (32 lowercase hex characters).
pub fn assign_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Read the identifier of a document; `None` when it is missing or empty.
pub fn document_id(document: &Document) -> Result<Option<String>, StoreError> {
    match document.get(ID_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) if id.is_empty() => Ok(None),
        Some(Value::String(id)) => Ok(Some(id.clone())),
        Some(other) => Err(StoreError::Malformed {
            reason: format!("`{ID_FIELD}` must be a string, got {other}"),
        }),
    }
}

/// Resolve the effective identifier of a document about to be inserted,
/// writing a store-assigned one back into it when needed.
pub fn ensure_id(document: &mut Document) -> Result<String, StoreError> {
    let id = match document_id(document)? {
        Some(id) => id,
        None => assign_id(),
    };
    document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
    Ok(id)
}

/// In-memory record store for tests and ephemeral runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRecordStore {
    inner: Arc<Mutex<HashMap<Collection, HashMap<String, Document>>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.lock().map(|_| ()).map_err(|err| StoreError::Unavailable {
            reason: format!("lock poisoned: {err}"),
        })
    }

    #[instrument(skip(self, document))]
    async fn insert(
        &self,
        collection: Collection,
        mut document: Document,
    ) -> Result<String, StoreError> {
        let mut map = self.inner.lock().map_err(|err| StoreError::Unavailable {
            reason: format!("lock poisoned: {err}"),
        })?;

        let id = ensure_id(&mut document)?;
        let records = map.entry(collection).or_default();
        if records.contains_key(&id) {
            return Err(StoreError::DuplicateId { collection, id });
        }
        records.insert(id.clone(), document);
        debug!(%id, "stored document");
        Ok(id)
    }

    async fn find_by_id(&self, collection: Collection, id: &str) -> Result<Document, StoreError> {
        let map = self.inner.lock().map_err(|err| StoreError::Unavailable {
            reason: format!("lock poisoned: {err}"),
        })?;

        map.get(&collection)
            .and_then(|records| records.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })
    }
}

/// Applies one fixed wait ceiling to every call on the wrapped store.
#[derive(Debug, Clone)]
pub struct BoundedStore<S> {
    inner: S,
    ceiling: Duration,
}

impl<S: RecordStore> BoundedStore<S> {
    pub const DEFAULT_CEILING: Duration = Duration::from_secs(30);

    pub fn new(inner: S, ceiling: Duration) -> Self {
        Self { inner, ceiling }
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.ceiling, call)
            .await
            .map_err(|_| StoreError::Timeout {
                after: self.ceiling,
            })?
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for BoundedStore<S> {
    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded(self.inner.ping()).await
    }

    async fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<String, StoreError> {
        self.bounded(self.inner.insert(collection, document)).await
    }

    async fn find_by_id(&self, collection: Collection, id: &str) -> Result<Document, StoreError> {
        self.bounded(self.inner.find_by_id(collection, id)).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_when_missing_or_empty() {
        let store = InMemoryRecordStore::new();

        let first = store
            .insert(Collection::Users, doc(json!({"name": "ann"})))
            .await
            .expect("insert without id");
        let second = store
            .insert(Collection::Users, doc(json!({"id": "", "name": "bob"})))
            .await
            .expect("insert with empty id");

        assert_eq!(first.len(), 32);
        assert!(!second.is_empty());
        assert_ne!(first, second);

        let found = store
            .find_by_id(Collection::Users, &first)
            .await
            .expect("find");
        assert_eq!(found.get("id"), Some(&json!(first)));
        assert_eq!(found.get("name"), Some(&json!("ann")));
    }

    #[tokio::test]
    async fn insert_preserves_explicit_id_and_rejects_duplicates() {
        let store = InMemoryRecordStore::new();
        let id = store
            .insert(Collection::Posts, doc(json!({"id": "p-1"})))
            .await
            .expect("insert");
        assert_eq!(id, "p-1");

        let err = store
            .insert(Collection::Posts, doc(json!({"id": "p-1", "caption": "again"})))
            .await
            .expect_err("duplicate should fail");
        assert!(matches!(err, StoreError::DuplicateId { .. }));

        let kept = store.find_by_id(Collection::Posts, "p-1").await.expect("find");
        assert_eq!(kept.get("caption"), None);
    }

    #[tokio::test]
    async fn collections_are_independent() {
        let store = InMemoryRecordStore::new();
        store
            .insert(Collection::Users, doc(json!({"id": "shared"})))
            .await
            .expect("insert user");

        let err = store
            .find_by_id(Collection::Posts, "shared")
            .await
            .expect_err("posts should not see users");
        assert_eq!(
            err,
            StoreError::NotFound {
                collection: Collection::Posts,
                id: "shared".into()
            }
        );
    }

    #[tokio::test]
    async fn non_string_id_is_malformed() {
        let store = InMemoryRecordStore::new();
        let err = store
            .insert(Collection::Users, doc(json!({"id": 7})))
            .await
            .expect_err("numeric id");
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    struct StalledStore;

    #[async_trait]
    impl RecordStore for StalledStore {
        async fn ping(&self) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }

        async fn insert(&self, _: Collection, _: Document) -> Result<String, StoreError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }

        async fn find_by_id(&self, _: Collection, _: &str) -> Result<Document, StoreError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Document::new())
        }
    }

    #[tokio::test]
    async fn bounded_store_times_out_every_call() {
        let ceiling = Duration::from_millis(20);
        let store = BoundedStore::new(StalledStore, ceiling);

        let expected = StoreError::Timeout { after: ceiling };
        assert_eq!(store.ping().await, Err(expected.clone()));
        assert_eq!(
            store.insert(Collection::Users, Document::new()).await,
            Err(expected.clone())
        );
        assert_eq!(
            store.find_by_id(Collection::Posts, "x").await,
            Err(expected)
        );
    }

    #[tokio::test]
    async fn bounded_store_passes_results_through() {
        let store = BoundedStore::new(
            InMemoryRecordStore::new(),
            BoundedStore::<InMemoryRecordStore>::DEFAULT_CEILING,
        );
        let id = store
            .insert(Collection::Users, doc(json!({"id": "u-1"})))
            .await
            .expect("insert");
        assert_eq!(id, "u-1");
        assert!(store.find_by_id(Collection::Users, "u-1").await.is_ok());
    }
}
