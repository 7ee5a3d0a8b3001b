//! OpenAI-style video jobs (`/v1/videos`).

use async_trait::async_trait;
use bcast_models::{decode_data_url, AssetRef, JobId, JobState};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::http::{content_type, download, ensure_created, ensure_success};
use crate::job::{JobHandle, JobProvider, JobStatus};
use crate::requests::VideoRequest;

const NAME: &str = "openai-video";

#[derive(Debug, Deserialize)]
struct VideoJob {
    id: Option<String>,
    status: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    error: Option<VideoJobError>,
}

#[derive(Debug, Deserialize)]
struct VideoJobError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl VideoJobError {
    fn describe(&self) -> Option<String> {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => Some(format!("{code}: {message}")),
            (None, Some(message)) => Some(message.clone()),
            (Some(code), None) => Some(code.clone()),
            (None, None) => None,
        }
    }
}

/// Text/image-to-video provider with create, status and content endpoints.
pub struct OpenAiVideoProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiVideoProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or(ProviderError::MissingCredentials("OPENAI_API_KEY"))?;
        Ok(Self::new(config.http_client()?, &config.openai_base_url, api_key))
    }

    async fn reference_part(&self, reference: &str) -> ProviderResult<Option<Part>> {
        let (mime, bytes) = if let Some(decoded) = decode_data_url(reference) {
            decoded
        } else if reference.starts_with("http://") || reference.starts_with("https://") {
            download(&self.client, NAME, reference, "image/png").await?
        } else {
            warn!(reference, "Skipping reference image the provider cannot reach");
            return Ok(None);
        };

        let ext = match mime.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        };
        let part = Part::bytes(bytes)
            .file_name(format!("reference.{ext}"))
            .mime_str(&mime)?;
        Ok(Some(part))
    }
}

#[async_trait]
impl JobProvider for OpenAiVideoProvider {
    type Request = VideoRequest;

    fn name(&self) -> &str {
        NAME
    }

    async fn create_job(&self, request: &VideoRequest) -> ProviderResult<JobHandle> {
        let mut form = Form::new()
            .text("prompt", request.prompt.clone())
            .text("model", request.model.clone())
            .text("seconds", request.seconds.to_string())
            .text("size", request.size.clone());

        if let Some(reference) = request.input_reference() {
            if let Some(part) = self.reference_part(reference).await? {
                form = form.part("input_reference", part);
            }
        }

        let response = self
            .client
            .post(format!("{}/v1/videos", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let job: VideoJob = ensure_created(NAME, response).await?.json().await?;

        let id = job
            .id
            .ok_or_else(|| ProviderError::invalid_response(NAME, "job id missing"))?;
        let state = job
            .status
            .as_deref()
            .map(JobState::from_provider)
            .unwrap_or(JobState::Queued);
        Ok(JobHandle {
            id: JobId::from(id),
            state,
        })
    }

    async fn poll_job(&self, id: &JobId) -> ProviderResult<JobStatus> {
        let response = self
            .client
            .get(format!("{}/v1/videos/{}", self.base_url, id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let job: VideoJob = ensure_success(NAME, response).await?.json().await?;

        let status = job
            .status
            .as_deref()
            .ok_or_else(|| ProviderError::invalid_response(NAME, "status missing"))?;
        if let Some(progress) = job.progress {
            debug!(job_id = %id, progress, "Video job progress");
        }

        let state = JobState::from_provider(status);
        let detail = match state {
            JobState::Failed => Some(
                job.error
                    .as_ref()
                    .and_then(VideoJobError::describe)
                    .unwrap_or_else(|| format!("status={status}")),
            ),
            _ => None,
        };
        Ok(JobStatus {
            state,
            detail,
            output: None,
        })
    }

    async fn fetch_result(&self, id: &JobId, _status: &JobStatus) -> ProviderResult<AssetRef> {
        let response = self
            .client
            .get(format!("{}/v1/videos/{}/content", self.base_url, id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let response = ensure_success(NAME, response).await?;
        let mime = content_type(&response, "video/mp4");
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ProviderError::invalid_response(NAME, "empty video content"));
        }
        Ok(AssetRef::bytes(bytes.to_vec(), mime))
    }
}
