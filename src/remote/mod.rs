//! Boundary to the backend's custom exercise collection.
//!
//! The backend owns the authoritative set of custom exercise names for the
//! signed-in user. Each operation is atomic per record; there are no batch
//! semantics.

mod http;

#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpRemote;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// A custom exercise as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteExercise {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
}

impl RemoteExercise {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Accepts identifiers sent as JSON numbers or strings.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote not configured. Add remote.api_url and remote.access_token to config.")]
    NotConfigured,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Server returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid response: {0}")]
    Decode(String),
}

/// Record-oriented access to the backend's custom exercise names.
///
/// `delete` must treat an already-missing record as success.
#[allow(async_fn_in_trait)]
pub trait CustomExerciseRemote {
    async fn list(&self) -> Result<Vec<RemoteExercise>, RemoteError>;

    async fn create(&self, name: &str) -> Result<RemoteExercise, RemoteError>;

    async fn update(&self, id: &str, name: &str) -> Result<(), RemoteError>;

    async fn delete(&self, id: &str) -> Result<(), RemoteError>;
}
