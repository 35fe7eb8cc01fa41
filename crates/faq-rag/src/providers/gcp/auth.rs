//! GCP authentication using a service account or a pre-issued token
//!
//! Handles OAuth2 token generation for the BigQuery and Vertex AI APIs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::error::{Error, Result};

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Where access tokens come from
enum TokenSource {
    /// Service account JSON key, exchanged for tokens via a signed JWT
    ServiceAccount(PathBuf),
    /// Token supplied by the caller (e.g. `gcloud auth print-access-token`)
    Static(String),
}

/// GCP authentication manager
pub struct GcpAuth {
    source: TokenSource,
    project_id: String,
    http: reqwest::Client,
    /// Cached access token
    token: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(serde::Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl GcpAuth {
    /// Create from service account JSON key file
    pub fn from_service_account(
        key_path: impl AsRef<Path>,
        project_id: String,
        http: reqwest::Client,
    ) -> Result<Self> {
        let key_path = key_path.as_ref().to_path_buf();
        if !key_path.exists() {
            return Err(Error::client_init(format!(
                "Service account key not found: {}",
                key_path.display()
            )));
        }

        Ok(Self {
            source: TokenSource::ServiceAccount(key_path),
            project_id,
            http,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Use a fixed access token
    pub fn from_access_token(token: String, project_id: String, http: reqwest::Client) -> Self {
        Self {
            source: TokenSource::Static(token),
            project_id,
            http,
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Get project ID
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Get a valid access token (refreshing if needed)
    pub async fn get_token(&self) -> Result<String> {
        let key_path = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount(path) => path,
        };

        {
            let token = self.token.read().await;
            if let Some(ref cached) = *token {
                // Token valid for at least 60 more seconds
                if cached.expires_at > Instant::now() + Duration::from_secs(60) {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let (access_token, lifetime) = self.refresh_token(key_path).await?;

        {
            let mut token = self.token.write().await;
            *token = Some(CachedToken {
                access_token: access_token.clone(),
                expires_at: Instant::now() + lifetime,
            });
        }

        tracing::debug!("Refreshed GCP access token for {}", self.project_id);
        Ok(access_token)
    }

    /// Exchange a signed JWT for an access token
    async fn refresh_token(&self, key_path: &Path) -> Result<(String, Duration)> {
        let key_content = tokio::fs::read_to_string(key_path).await.map_err(|e| {
            Error::config(format!(
                "Failed to read service account key {}: {}",
                key_path.display(),
                e
            ))
        })?;

        let key: ServiceAccountKey = serde_json::from_str(&key_content)
            .map_err(|e| Error::config(format!("Invalid service account key format: {}", e)))?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::internal(format!("System clock before epoch: {}", e)))?
            .as_secs();

        let jwt = sign_jwt(&key, now)?;

        let response = self
            .http
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::config(format!("Token exchange request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::config(format!(
                "Token exchange failed ({}): {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::config(format!("Failed to parse token response: {}", e)))?;

        // Tokens are typically valid for an hour; assume 55 minutes when unstated
        let lifetime = Duration::from_secs(token_response.expires_in.unwrap_or(55 * 60));
        Ok((token_response.access_token, lifetime))
    }
}

/// Build and RS256-sign the JWT assertion for a service account
fn sign_jwt(key: &ServiceAccountKey, now: u64) -> Result<String> {
    use base64::Engine;
    let b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let claims = serde_json::json!({
        "iss": key.client_email,
        "scope": CLOUD_PLATFORM_SCOPE,
        "aud": key.token_uri,
        "iat": now,
        "exp": now + 3600,
    });

    let header = b64.encode(r#"{"alg":"RS256","typ":"JWT"}"#.as_bytes());
    let payload = b64.encode(claims.to_string().as_bytes());
    let signing_input = format!("{}.{}", header, payload);

    let private_key = key.private_key.replace("\\n", "\n");
    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(
        pem::parse(&private_key)
            .map_err(|e| Error::config(format!("Failed to parse private key PEM: {}", e)))?
            .contents(),
    )
    .map_err(|e| Error::config(format!("Failed to parse private key: {:?}", e)))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            signing_input.as_bytes(),
            &mut signature,
        )
        .map_err(|e| Error::config(format!("Failed to sign JWT: {:?}", e)))?;

    Ok(format!("{}.{}", signing_input, b64.encode(&signature)))
}
