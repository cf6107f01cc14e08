//! Record service: the create/fetch workflows for users and posts.
//! Framework-neutral; an HTTP dispatcher maps routes onto these calls.

use std::sync::Arc;

use chrono::Utc;
use picpost_core::{
    records::{PasswordRedaction, Post, Record, User},
    store::{Collection, RecordStore, StoreError},
    validation::{validate_write, ValidationError},
};
use picpost_storage::{
    credential_cipher::{CipherError, CredentialCipher},
    key_derivation::derive_key,
};
use thiserror::Error;
use tracing::{info, instrument};

/// Settings fixed at startup and shared by every request.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Operator passphrase the credential key is derived from.
    pub passphrase: String,
    /// Rule applied to the password of every outbound user.
    pub redaction: PasswordRedaction,
}

impl std::fmt::Debug for ServiceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceSettings")
            .field("passphrase", &"<redacted>")
            .field("redaction", &self.redaction)
            .finish()
    }
}

/// The parts of an inbound write the service needs.
#[derive(Debug, Clone, Copy)]
pub struct WriteRequest<'a> {
    pub method: &'a str,
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

/// Request-scoped failures. None of them should end the process.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid {collection} payload: {reason}")]
    Decode {
        collection: Collection,
        reason: String,
    },
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error(transparent)]
    StoreWrite(StoreError),
    #[error(transparent)]
    StoreRead(StoreError),
}

pub struct RecordService<S: RecordStore> {
    store: Arc<S>,
    cipher: CredentialCipher,
    redaction: PasswordRedaction,
}

impl<S: RecordStore> RecordService<S> {
    pub fn new(store: S, settings: &ServiceSettings) -> Result<Self, ServiceError> {
        let cipher = CredentialCipher::new(&derive_key(&settings.passphrase))?;
        Ok(Self {
            store: Arc::new(store),
            cipher,
            redaction: settings.redaction,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate, decode, seal the password, and insert into `users`.
    #[instrument(skip_all, fields(method = request.method))]
    pub async fn create_user(&self, request: WriteRequest<'_>) -> Result<String, ServiceError> {
        validate_write(request.method, request.content_type)?;
        let mut user: User = decode(request.body)?;

        user.password = self.cipher.seal_password(&user.password)?;
        let id = self.insert(&user).await?;
        info!(%id, "inserted user");
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn fetch_user(&self, id: &str) -> Result<User, ServiceError> {
        let user: User = self.find(id).await?;
        Ok(user.redacted(self.redaction))
    }

    /// Validate, decode, stamp with the server clock, and insert into `posts`.
    /// Returns the stored post with its effective id.
    #[instrument(skip_all, fields(method = request.method))]
    pub async fn create_post(&self, request: WriteRequest<'_>) -> Result<Post, ServiceError> {
        validate_write(request.method, request.content_type)?;
        let mut post: Post = decode(request.body)?;

        post.post_timestamp = Some(Utc::now());
        let id = self.insert(&post).await?;
        info!(%id, "inserted post");
        post.set_id(id);
        Ok(post)
    }

    #[instrument(skip(self))]
    pub async fn fetch_post(&self, id: &str) -> Result<Post, ServiceError> {
        self.find(id).await
    }

    async fn insert<R: Record>(&self, record: &R) -> Result<String, ServiceError> {
        let document = record.to_document().map_err(ServiceError::StoreWrite)?;
        self.store
            .insert(R::COLLECTION, document)
            .await
            .map_err(ServiceError::StoreWrite)
    }

    async fn find<R: Record>(&self, id: &str) -> Result<R, ServiceError> {
        let document = self
            .store
            .find_by_id(R::COLLECTION, id)
            .await
            .map_err(ServiceError::StoreRead)?;
        R::from_document(document).map_err(ServiceError::StoreRead)
    }
}

fn decode<R: Record>(body: &[u8]) -> Result<R, ServiceError> {
    serde_json::from_slice(body).map_err(|e| ServiceError::Decode {
        collection: R::COLLECTION,
        reason: e.to_string(),
    })
}
