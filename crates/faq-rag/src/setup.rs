//! Client construction from configuration
//!
//! Every failure here is terminal for the session.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ChatConfig, GenerationBackend, HttpConfig, WarehouseConfig};
use crate::error::{Error, Result};
use crate::providers::gcp::{BigQueryClient, GcpAuth, GeminiAuth, GeminiClient, SamplingConfig};
use crate::providers::llm::safety_settings;
use crate::providers::{LlmProvider, WarehouseProvider};

/// Clients needed by the engine
pub struct Clients {
    pub llm: Arc<dyn LlmProvider>,
    /// Present in RAG mode only
    pub warehouse: Option<Arc<dyn WarehouseProvider>>,
}

/// Shared HTTP client with the configured per-request timeout
pub fn http_client(config: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(concat!("faq-rag/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::client_init(format!("Failed to build HTTP client: {}", e)))
}

/// GCP credentials: a pre-issued access token wins over a service-account key
pub fn gcp_auth(config: &WarehouseConfig, http: reqwest::Client) -> Result<Arc<GcpAuth>> {
    let project_id = config.require_project_id()?.to_string();

    let auth = if let Some(token) = config.access_token.as_ref().filter(|t| !t.trim().is_empty()) {
        tracing::debug!("Using static access token for project {}", project_id);
        GcpAuth::from_access_token(token.trim().to_string(), project_id, http)
    } else if let Some(path) = &config.service_account_key_path {
        tracing::debug!("Using service account key {}", path.display());
        GcpAuth::from_service_account(path, project_id, http)?
    } else {
        return Err(Error::client_init(
            "No GCP credentials: set GOOGLE_APPLICATION_CREDENTIALS or BIGQUERY_ACCESS_TOKEN",
        ));
    };

    Ok(Arc::new(auth))
}

/// Gemini client for the configured backend
pub fn generation_client(
    config: &ChatConfig,
    http: reqwest::Client,
    auth: Option<Arc<GcpAuth>>,
) -> Result<GeminiClient> {
    let generation = &config.generation;

    let gemini_auth = match generation.backend {
        GenerationBackend::Gemini => {
            let key = generation
                .api_key
                .clone()
                .ok_or_else(|| Error::config("Gemini API key is not set"))?;
            GeminiAuth::ApiKey(key)
        }
        GenerationBackend::Vertex => GeminiAuth::Vertex {
            auth: auth.ok_or_else(|| {
                Error::client_init("Vertex AI backend requires GCP credentials")
            })?,
            location: generation.location.clone(),
        },
    };

    GeminiClient::new(
        http,
        gemini_auth,
        generation.model.clone(),
        safety_settings(config.safety.threshold),
        SamplingConfig {
            temperature: generation.temperature,
            top_p: generation.top_p,
            max_output_tokens: generation.max_output_tokens,
        },
    )
}

/// Build every client the configured mode needs
pub fn build_clients(config: &ChatConfig) -> Result<Clients> {
    let http = http_client(&config.http)?;

    let needs_gcp =
        config.needs_warehouse() || config.generation.backend == GenerationBackend::Vertex;
    let auth = if needs_gcp {
        Some(gcp_auth(&config.warehouse, http.clone())?)
    } else {
        None
    };

    let llm = generation_client(config, http.clone(), auth.clone())?;
    tracing::info!(
        "Generation client ready: {} ({:?} backend)",
        config.generation.model,
        config.generation.backend
    );

    let warehouse: Option<Arc<dyn WarehouseProvider>> = match (&auth, config.needs_warehouse()) {
        (Some(auth), true) => {
            tracing::info!("Warehouse client ready for project {}", auth.project_id());
            Some(Arc::new(BigQueryClient::new(
                http,
                Arc::clone(auth),
                config.warehouse.location.clone(),
                config.warehouse.query_timeout_ms,
            )))
        }
        _ => None,
    };

    Ok(Clients {
        llm: Arc::new(llm),
        warehouse,
    })
}
