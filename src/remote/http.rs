//! HTTP client for the `/custom-exercise-names/` REST resource.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};

use super::{CustomExerciseRemote, RemoteError, RemoteExercise};
use crate::config::RemoteConfig;

const RESOURCE: &str = "custom-exercise-names";

#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    api_url: String,
    access_token: String,
}

impl HttpRemote {
    /// Creates a remote from config.
    ///
    /// Returns an error if the remote is not configured.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let api_url = config.api_url.clone().ok_or(RemoteError::NotConfigured)?;
        let access_token = config
            .access_token
            .clone()
            .ok_or(RemoteError::NotConfigured)?;
        Self::new(
            api_url,
            access_token,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn new(
        api_url: String,
        access_token: String,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/{}/", self.api_url, RESOURCE)
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/{}/{}/", self.api_url, RESOURCE, urlencoding::encode(id))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    async fn check(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl CustomExerciseRemote for HttpRemote {
    async fn list(&self) -> Result<Vec<RemoteExercise>, RemoteError> {
        let response = self
            .client
            .get(self.collection_url())
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn create(&self, name: &str) -> Result<RemoteExercise, RemoteError> {
        let response = self
            .client
            .post(self.collection_url())
            .header("Authorization", self.bearer())
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn update(&self, id: &str, name: &str) -> Result<(), RemoteError> {
        let response = self
            .client
            .put(self.record_url(id))
            .header("Authorization", self.bearer())
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let response = self
            .client
            .delete(self.record_url(id))
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Custom exercise {} already gone on server", id);
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }
}
