use crate::models::{
    Ack, CombineColumnsRequest, CombineColumnsResponse, ErrorResponse, JobHandle, JobProgress,
    MatchCandidate, MatchResults, RecommendColumnsRequest, RecommendColumnsResponse,
    StartMatchResponse, UploadResponse, ValidateRequest, ValidationLabel,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

/// Spreadsheet extensions the service knows how to read
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "csv"];

const UPLOAD_PATH: &str = "/upload";
const RECOMMEND_PATH: &str = "/recommend-columns";
const COMBINE_PATH: &str = "/process_columns";
const MATCH_PATH: &str = "/match";
const PROGRESS_PATH: &str = "/progress";
const RESULTS_PATH: &str = "/results";
const VALIDATE_PATH: &str = "/validate";
const UNDO_PATH: &str = "/undo_validation";
const EXPORT_PATH: &str = "/export";

/// Errors that can occur when talking to the matching service
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether the service could not be reached at all
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

/// Operations the review workflow needs from the matching service
///
/// `RemoteMatchingClient` is the production implementation. The workflow
/// components are generic over this trait so they never depend on HTTP.
pub trait MatchingService: Send + Sync + 'static {
    fn upload_spreadsheet(
        &self,
        file: &Path,
        table_name: &str,
    ) -> impl Future<Output = Result<UploadResponse, ClientError>> + Send;

    fn recommend_columns(
        &self,
        table_name: &str,
    ) -> impl Future<Output = Result<Vec<String>, ClientError>> + Send;

    fn combine_columns(
        &self,
        columns: &[String],
    ) -> impl Future<Output = Result<Vec<String>, ClientError>> + Send;

    fn start_match(&self) -> impl Future<Output = Result<JobHandle, ClientError>> + Send;

    fn get_progress(&self) -> impl Future<Output = Result<JobProgress, ClientError>> + Send;

    fn get_match_results(&self) -> impl Future<Output = Result<MatchResults, ClientError>> + Send;

    fn submit_validation(
        &self,
        candidate: &MatchCandidate,
        label: ValidationLabel,
    ) -> impl Future<Output = Result<Ack, ClientError>> + Send;

    fn undo_validation(
        &self,
        candidate: &MatchCandidate,
    ) -> impl Future<Output = Result<Ack, ClientError>> + Send;

    fn export_results(&self) -> impl Future<Output = Result<Vec<u8>, ClientError>> + Send;
}

/// HTTP client for the matching service
///
/// Each call is a single request/response. Nothing is retried here; the
/// caller decides what a failure means for its own state.
#[derive(Debug, Clone)]
pub struct RemoteMatchingClient {
    base_url: String,
    client: Client,
}

impl RemoteMatchingClient {
    /// Create a new client for the service at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .user_agent(format!("match-review/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Read a readable message out of a failed response
async fn error_message(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(|e| e.describe())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body
            }
        });
    (status, message)
}

/// Map non-success statuses onto the error taxonomy
async fn ensure_success(response: Response, context: &str) -> Result<Response, ClientError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let (status, message) = error_message(response).await;
    tracing::error!("{} failed: {} - {}", context, status, message);

    Err(match status {
        StatusCode::CONFLICT => ClientError::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation(message),
        _ => ClientError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response, context: &str) -> Result<T, ClientError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ClientError::InvalidResponse(format!("Failed to parse {} response: {}", context, e)))
}

/// Acks may come back with an empty body
async fn read_ack(response: Response) -> Result<Ack, ClientError> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Ack::default());
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| ClientError::InvalidResponse(format!("Failed to parse acknowledgement: {}", e)))
}

fn spreadsheet_mime(extension: &str) -> &'static str {
    match extension {
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        _ => "text/csv",
    }
}

impl MatchingService for RemoteMatchingClient {
    /// Upload a spreadsheet and return its column names
    ///
    /// Every failure, local or remote, is reported as `ClientError::Upload`.
    async fn upload_spreadsheet(&self, file: &Path, table_name: &str) -> Result<UploadResponse, ClientError> {
        let extension = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ClientError::Upload(format!(
                "unsupported file type '{}', expected one of {:?}",
                file.display(),
                ACCEPTED_EXTENSIONS
            )));
        }

        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| ClientError::Upload(format!("cannot read {}: {}", file.display(), e)))?;

        tracing::debug!("Uploading {} ({} bytes) as table {}", file_name, bytes.len(), table_name);

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(spreadsheet_mime(&extension))?;
        let form = Form::new()
            .part("file", part)
            .text("table_name", table_name.to_string());

        let response = self
            .client
            .post(self.endpoint(UPLOAD_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Upload(format!("could not reach the matching service: {}", e)))?;

        if !response.status().is_success() {
            let (status, message) = error_message(response).await;
            tracing::error!("Upload of table {} failed: {} - {}", table_name, status, message);
            return Err(ClientError::Upload(message));
        }

        let upload: UploadResponse = read_json(response, "upload").await?;
        tracing::debug!("Upload returned {} columns", upload.columns.len());
        Ok(upload)
    }

    async fn recommend_columns(&self, table_name: &str) -> Result<Vec<String>, ClientError> {
        let request = RecommendColumnsRequest {
            table_name: table_name.to_string(),
        };
        request
            .validate()
            .map_err(|e| ClientError::Validation(e.to_string()))?;

        let response = self
            .client
            .post(self.endpoint(RECOMMEND_PATH))
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response, "Column recommendation").await?;

        let body: RecommendColumnsResponse = read_json(response, "recommendation").await?;
        let columns = body.into_columns();
        tracing::debug!("Service recommended {} columns for {}", columns.len(), table_name);
        Ok(columns)
    }

    /// Combine the selected columns; fails without a request if none are selected
    async fn combine_columns(&self, columns: &[String]) -> Result<Vec<String>, ClientError> {
        let request = CombineColumnsRequest {
            columns: columns.to_vec(),
        };
        request
            .validate()
            .map_err(|e| ClientError::Validation(e.to_string()))?;

        let response = self
            .client
            .post(self.endpoint(COMBINE_PATH))
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response, "Combine columns").await?;

        let body: CombineColumnsResponse = read_json(response, "combine").await?;
        Ok(body.combined_sample)
    }

    async fn start_match(&self) -> Result<JobHandle, ClientError> {
        let started_at = chrono::Utc::now();
        let response = self.client.post(self.endpoint(MATCH_PATH)).send().await?;
        let response = ensure_success(response, "Start match").await?;

        // The trigger body is informational; some deployments send nothing useful.
        let body = response.bytes().await?;
        let start = serde_json::from_slice::<StartMatchResponse>(&body).unwrap_or_default();

        tracing::info!("Match job started (job id: {:?})", start.job_id);
        Ok(JobHandle {
            job_id: start.job_id,
            started_at,
        })
    }

    async fn get_progress(&self) -> Result<JobProgress, ClientError> {
        let response = self.client.get(self.endpoint(PROGRESS_PATH)).send().await?;
        let response = ensure_success(response, "Progress").await?;
        read_json(response, "progress").await
    }

    async fn get_match_results(&self) -> Result<MatchResults, ClientError> {
        let response = self.client.get(self.endpoint(RESULTS_PATH)).send().await?;
        let response = ensure_success(response, "Match results").await?;
        let results: MatchResults = read_json(response, "match results").await?;

        tracing::debug!(
            "Fetched {} ambiguous and {} confident candidates",
            results.ambiguous.len(),
            results.confident.len()
        );
        Ok(results)
    }

    async fn submit_validation(&self, candidate: &MatchCandidate, label: ValidationLabel) -> Result<Ack, ClientError> {
        let request = ValidateRequest::new(candidate, label);
        let response = self
            .client
            .post(self.endpoint(VALIDATE_PATH))
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response, "Validation").await?;
        read_ack(response).await
    }

    async fn undo_validation(&self, candidate: &MatchCandidate) -> Result<Ack, ClientError> {
        let response = self
            .client
            .post(self.endpoint(UNDO_PATH))
            .json(candidate)
            .send()
            .await?;
        let response = ensure_success(response, "Undo validation").await?;
        read_ack(response).await
    }

    async fn export_results(&self) -> Result<Vec<u8>, ClientError> {
        let response = self.client.get(self.endpoint(EXPORT_PATH)).send().await?;
        let response = ensure_success(response, "Export").await?;
        let bytes = response.bytes().await?;
        tracing::debug!("Downloaded export ({} bytes)", bytes.len());
        Ok(bytes.to_vec())
    }
}
