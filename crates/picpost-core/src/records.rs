use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::store::{Collection, Document, StoreError};

/// Placeholder written in place of a password under [`PasswordRedaction::Mask`].
pub const MASKED_PASSWORD: &str = "********";

/// A record type that lives in exactly one store collection.
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn set_id(&mut self, id: String);

    fn to_document(&self) -> Result<Document, StoreError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(document)) => Ok(document),
            Ok(other) => Err(StoreError::Malformed {
                reason: format!("{} record encoded as {other}", Self::COLLECTION),
            }),
            Err(err) => Err(StoreError::Malformed {
                reason: err.to_string(),
            }),
        }
    }

    fn from_document(document: Document) -> Result<Self, StoreError> {
        serde_json::from_value(Value::Object(document)).map_err(|err| StoreError::Malformed {
            reason: format!("{} record: {err}", Self::COLLECTION),
        })
    }
}

/// User account. `password` holds cipher output once persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl User {
    /// Shape a user for an outbound response.
    pub fn redacted(mut self, policy: PasswordRedaction) -> Self {
        match policy {
            PasswordRedaction::Strip => self.password.clear(),
            PasswordRedaction::Mask => self.password = MASKED_PASSWORD.to_string(),
        }
        self
    }
}

impl Record for User {
    const COLLECTION: Collection = Collection::Users;

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// Media post. The image itself lives elsewhere; only its URL is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Post {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub caption: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub img_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_timestamp: Option<DateTime<Utc>>,
}

impl Record for Post {
    const COLLECTION: Collection = Collection::Posts;

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// How the password field of an outbound user is rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordRedaction {
    /// Drop the field entirely.
    #[default]
    Strip,
    /// Replace the value with [`MASKED_PASSWORD`].
    Mask,
}
