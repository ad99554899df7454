//! Secret store access.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use crate::error::SecretError;

const SECRET_MANAGER_API: &str = "https://secretmanager.googleapis.com/v1";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// A remote store of named, versioned secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the latest version of `name` in `project_id`, decoded as text.
    async fn access_latest(&self, project_id: &str, name: &str) -> Result<String, SecretError>;
}

/// Google Secret Manager over REST, authenticated via the GCE metadata
/// server. Only usable on GCP; callers gate on the project id being set.
pub struct SecretManagerClient {
    http: reqwest::Client,
}

impl SecretManagerClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    async fn access_token(&self) -> Result<String, SecretError> {
        let response = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SecretError::Token(format!(
                "metadata server returned {}",
                response.status()
            )));
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

impl Default for SecretManagerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for SecretManagerClient {
    async fn access_latest(&self, project_id: &str, name: &str) -> Result<String, SecretError> {
        let token = self.access_token().await?;
        let url = format!(
            "{SECRET_MANAGER_API}/projects/{project_id}/secrets/{name}/versions/latest:access"
        );
        debug!(%name, "requesting secret version");
        let response = self.http.get(&url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(SecretError::Status {
                name: name.to_string(),
                status: response.status(),
            });
        }
        let body: AccessSecretVersionResponse = response.json().await?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(body.payload.data)
            .map_err(|source| SecretError::Decode {
                name: name.to_string(),
                source,
            })?;
        String::from_utf8(bytes).map_err(|_| SecretError::Utf8 {
            name: name.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Deserialize)]
struct SecretPayload {
    /// Base64-encoded secret bytes.
    data: String,
}
