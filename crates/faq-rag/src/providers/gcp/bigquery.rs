//! BigQuery warehouse provider
//!
//! Runs parameterized VECTOR_SEARCH queries through the synchronous
//! `jobs.query` REST endpoint.

use async_trait::async_trait;
use std::sync::Arc;

use super::auth::GcpAuth;
use crate::error::{Error, Result};
use crate::providers::warehouse::{WarehouseProvider, WarehouseRow};
use crate::retrieval::VectorSearchQuery;

const BIGQUERY_API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// BigQuery client
pub struct BigQueryClient {
    http: reqwest::Client,
    auth: Arc<GcpAuth>,
    location: Option<String>,
    timeout_ms: u64,
}

impl BigQueryClient {
    /// Create a new BigQuery client
    ///
    /// # Arguments
    /// * `http` - shared HTTP client
    /// * `auth` - GCP authentication (its project is billed for queries)
    /// * `location` - dataset location, e.g. "US" (optional)
    /// * `timeout_ms` - how long the server waits for the job to finish
    pub fn new(
        http: reqwest::Client,
        auth: Arc<GcpAuth>,
        location: Option<String>,
        timeout_ms: u64,
    ) -> Self {
        Self {
            http,
            auth,
            location,
            timeout_ms,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/projects/{}/queries",
            BIGQUERY_API_BASE,
            self.auth.project_id()
        )
    }

    fn build_request(&self, query: &VectorSearchQuery) -> QueryRequest {
        QueryRequest {
            query: query.sql.clone(),
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            query_parameters: query
                .parameters
                .iter()
                .map(|p| QueryParameterBody {
                    name: p.name.clone(),
                    parameter_type: ParameterType { kind: "STRING" },
                    parameter_value: ParameterValue {
                        value: p.value.clone(),
                    },
                })
                .collect(),
            timeout_ms: self.timeout_ms,
            location: self.location.clone(),
        }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    query: String,
    use_legacy_sql: bool,
    parameter_mode: &'static str,
    query_parameters: Vec<QueryParameterBody>,
    timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryParameterBody {
    name: String,
    parameter_type: ParameterType,
    parameter_value: ParameterValue,
}

#[derive(serde::Serialize)]
struct ParameterType {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(serde::Serialize)]
struct ParameterValue {
    value: String,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(serde::Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(serde::Deserialize)]
struct FieldSchema {
    name: String,
}

#[derive(serde::Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(serde::Deserialize)]
struct TableCell {
    #[serde(default)]
    v: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct ErrorProto {
    #[serde(default)]
    message: String,
}

/// Turn a `jobs.query` response into rows, nearest first
fn parse_rows(response: QueryResponse) -> Result<Vec<WarehouseRow>> {
    if let Some(error) = response.errors.first() {
        return Err(Error::retrieval(format!("BigQuery error: {}", error.message)));
    }
    if !response.job_complete {
        return Err(Error::retrieval(
            "BigQuery job did not complete within the query timeout",
        ));
    }

    let fields = match response.schema {
        Some(schema) => schema.fields,
        // A complete job with no schema has no rows either
        None => return Ok(Vec::new()),
    };

    let content_idx = fields
        .iter()
        .position(|f| f.name == "content")
        .ok_or_else(|| Error::retrieval("Query result has no 'content' column"))?;
    let distance_idx = fields.iter().position(|f| f.name == "distance");

    let rows = response
        .rows
        .into_iter()
        // NULL content stays as an empty row so row positions match the ranking
        .map(|row| {
            let content = row
                .f
                .get(content_idx)
                .and_then(|cell| cell.v.as_str())
                .unwrap_or_default()
                .to_string();
            let distance = distance_idx
                .and_then(|i| row.f.get(i))
                .and_then(|cell| cell_as_f64(&cell.v));
            WarehouseRow { content, distance }
        })
        .collect();

    Ok(rows)
}

/// BigQuery encodes FLOAT64 cells as strings
fn cell_as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

#[async_trait]
impl WarehouseProvider for BigQueryClient {
    async fn vector_search(&self, query: &VectorSearchQuery) -> Result<Vec<WarehouseRow>> {
        let token = self.auth.get_token().await?;
        let request = self.build_request(query);

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::retrieval(format!("BigQuery request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::retrieval(format!(
                "BigQuery query failed ({}): {}",
                status, body
            )));
        }

        let query_response: QueryResponse = response
            .json()
            .await
            .map_err(|e| Error::retrieval(format!("Failed to parse BigQuery response: {}", e)))?;

        let rows = parse_rows(query_response)?;
        tracing::debug!("BigQuery returned {} row(s)", rows.len());
        Ok(rows)
    }

    async fn health_check(&self) -> Result<bool> {
        self.auth.get_token().await.map(|_| true)
    }

    fn name(&self) -> &str {
        "bigquery"
    }
}
