//! Strigo REST API client implementation.
//!
//! Every response is wrapped in an envelope
//! `{"result": "success" | "failure", "data": ..., "error": ...}`. A failure
//! envelope on HTTP 422 is a validation error, any other failure envelope is
//! reported as is, and a non-success status without envelope is a transport
//! error. Requests are never retried.

use reqwest::{header, multipart, Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{ApiError, Result, SyncError};

/// Default Strigo API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://app.strigo.io/api/v1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Strigo API client.
#[derive(Debug, Clone)]
pub struct StrigoClient {
    /// HTTP client.
    client: Client,
    /// API base URL, without trailing slash.
    endpoint: String,
    /// Bearer token (`org_id:api_key`).
    token: String,
}

/// Response envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    result: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

/// Error payload of a failure envelope.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

impl StrigoClient {
    /// Creates a client for the default endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(organization_id: &str, api_key: &str) -> Result<Self> {
        Self::with_endpoint(organization_id, api_key, DEFAULT_ENDPOINT)
    }

    /// Creates a client for a custom endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_endpoint(organization_id: &str, api_key: &str, endpoint: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: format!("{organization_id}:{api_key}"),
        })
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.endpoint))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(header::ACCEPT, "application/json")
    }

    /// Performs a GET request and decodes the envelope payload.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let builder = self.request(Method::GET, path);
        let envelope = self.send(Method::GET, path, builder).await?;
        Self::decode(envelope)
    }

    /// Performs a POST request with a JSON body.
    pub(crate) async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let builder = self.request(Method::POST, path).json(body);
        let envelope = self.send(Method::POST, path, builder).await?;
        Self::decode(envelope)
    }

    /// Performs a PATCH request with a JSON body.
    pub(crate) async fn patch<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let builder = self.request(Method::PATCH, path).json(body);
        let envelope = self.send(Method::PATCH, path, builder).await?;
        Self::decode(envelope)
    }

    /// Uploads a file as a multipart form with a single part named `field`.
    pub(crate) async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        field: &str,
        file: &Path,
    ) -> Result<T> {
        let filename = file
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let bytes = tokio::fs::read(file).await?;
        debug!("Uploading {} ({} bytes) to {path}", file.display(), bytes.len());

        let part = multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str("application/octet-stream")
            .map_err(|e| ApiError::network(format!("Invalid multipart part: {e}")))?;
        let form = multipart::Form::new().part(field.to_string(), part);

        let builder = self.request(Method::POST, path).multipart(form);
        let envelope = self.send(Method::POST, path, builder).await?;
        Self::decode(envelope)
    }

    /// Performs a DELETE request, expecting `204 No Content`.
    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, path);
        self.send(Method::DELETE, path, builder).await?;
        Ok(())
    }

    /// Sends a request and checks the status and envelope.
    async fn send(
        &self,
        method: Method,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<Option<Envelope>> {
        trace!("{method} {}{path}", self.endpoint);

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("Failed to read response: {e}")))?;
        trace!("{method} {path} -> {status}: {body}");

        let envelope = serde_json::from_str::<Envelope>(&body).ok();

        if let Some(env) = &envelope {
            if env.result == "failure" {
                return Err(Self::failure(status, env.error.as_ref()));
            }
        }

        if !status.is_success() {
            return Err(SyncError::Api(ApiError::Transport {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body,
            }));
        }

        Ok(envelope)
    }

    /// Converts a failure envelope into an error.
    fn failure(status: StatusCode, error: Option<&ErrorBody>) -> SyncError {
        let (kind, message, errors) = error.map_or_else(
            || (String::from("Unknown"), String::from("no error details"), Vec::new()),
            |e| (e.kind.clone(), e.message.clone(), e.errors.clone()),
        );

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            SyncError::Api(ApiError::Validation { message, errors })
        } else {
            SyncError::Api(ApiError::Failure {
                status: status.as_u16(),
                kind,
                message,
            })
        }
    }

    /// Extracts the `data` payload of a success envelope.
    fn decode<T: DeserializeOwned>(envelope: Option<Envelope>) -> Result<T> {
        let envelope =
            envelope.ok_or_else(|| ApiError::invalid_response("Response is not an API envelope"))?;

        if envelope.result != "success" {
            return Err(SyncError::Api(ApiError::invalid_response(format!(
                "Unexpected result '{}'",
                envelope.result
            ))));
        }

        let data = envelope.data.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(data).map_err(|e| {
            SyncError::Api(ApiError::invalid_response(format!(
                "Failed to parse response data: {e}"
            )))
        })
    }
}
