//! Replicate-style predictions (`/v1/models/{owner}/{name}/predictions`).

use std::marker::PhantomData;

use async_trait::async_trait;
use bcast_models::{AssetRef, JobId, JobState};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::http::{ensure_created, ensure_success};
use crate::job::{JobHandle, JobProvider, JobStatus};
use crate::requests::{BackgroundRemovalRequest, ImageRequest};

pub const LOWER_THIRD_MODEL: &str = "ideogram-ai/ideogram-v2";
pub const BACKGROUND_REMOVAL_MODEL: &str = "cjwbw/rembg";

/// Request types a Replicate model accepts as its `input` object.
pub trait ReplicateInput: Send + Sync {
    fn to_input(&self) -> Value;
}

impl ReplicateInput for ImageRequest {
    fn to_input(&self) -> Value {
        let mut input = json!({
            "prompt": self.prompt,
            "aspect_ratio": self.aspect_ratio,
        });
        if let Some(style) = &self.style_type {
            input["style_type"] = json!(style);
        }
        if let Some(reference) = self.reference_images.first() {
            input["image"] = json!(reference);
        }
        input
    }
}

impl ReplicateInput for BackgroundRemovalRequest {
    fn to_input(&self) -> Value {
        json!({ "image": self.image_url })
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: Option<String>,
    status: Option<String>,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Value,
}

/// First URL in a prediction output: a string, or the first string of an array.
fn output_url(output: &Value) -> Option<String> {
    match output {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(output_url),
        Value::Object(map) => map.values().find_map(output_url),
        _ => None,
    }
}

fn error_text(error: &Value) -> Option<String> {
    match error {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// One Replicate model, typed by the request it accepts.
pub struct ReplicateProvider<R> {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    model: String,
    name: String,
    _request: PhantomData<fn() -> R>,
}

impl<R: ReplicateInput> ReplicateProvider<R> {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let model = model.into();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            name: format!("replicate:{model}"),
            model,
            _request: PhantomData,
        }
    }

    pub fn from_config(config: &ProviderConfig, model: &str) -> ProviderResult<Self> {
        let token = config
            .replicate_api_token
            .clone()
            .ok_or(ProviderError::MissingCredentials("REPLICATE_API_TOKEN"))?;
        Ok(Self::new(
            config.http_client()?,
            &config.replicate_base_url,
            token,
            model,
        ))
    }

    fn auth(&self) -> String {
        format!("Token {}", self.api_token)
    }

    fn status_of(&self, prediction: &Prediction) -> JobStatus {
        let state = prediction
            .status
            .as_deref()
            .map(JobState::from_provider)
            .unwrap_or(JobState::Queued);
        let detail = match state {
            JobState::Failed => Some(
                error_text(&prediction.error)
                    .unwrap_or_else(|| format!("status={}", prediction.status.as_deref().unwrap_or("unknown"))),
            ),
            _ => None,
        };
        JobStatus {
            state,
            detail,
            output: output_url(&prediction.output).map(AssetRef::Url),
        }
    }
}

impl ReplicateProvider<ImageRequest> {
    pub fn lower_thirds(config: &ProviderConfig) -> ProviderResult<Self> {
        Self::from_config(config, LOWER_THIRD_MODEL)
    }
}

impl ReplicateProvider<BackgroundRemovalRequest> {
    pub fn background_remover(config: &ProviderConfig) -> ProviderResult<Self> {
        Self::from_config(config, BACKGROUND_REMOVAL_MODEL)
    }
}

#[async_trait]
impl<R: ReplicateInput> JobProvider for ReplicateProvider<R> {
    type Request = R;

    fn name(&self) -> &str {
        &self.name
    }

    async fn create_job(&self, request: &R) -> ProviderResult<JobHandle> {
        let response = self
            .client
            .post(format!("{}/v1/models/{}/predictions", self.base_url, self.model))
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .json(&json!({ "input": request.to_input() }))
            .send()
            .await?;
        let prediction: Prediction = ensure_created(&self.name, response).await?.json().await?;

        let id = prediction
            .id
            .clone()
            .ok_or_else(|| ProviderError::invalid_response(&self.name, "prediction id missing"))?;
        Ok(JobHandle {
            id: JobId::from(id),
            state: self.status_of(&prediction).state,
        })
    }

    async fn poll_job(&self, id: &JobId) -> ProviderResult<JobStatus> {
        let response = self
            .client
            .get(format!("{}/v1/predictions/{}", self.base_url, id))
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .send()
            .await?;
        let prediction: Prediction = ensure_success(&self.name, response).await?.json().await?;
        Ok(self.status_of(&prediction))
    }

    async fn fetch_result(&self, id: &JobId, status: &JobStatus) -> ProviderResult<AssetRef> {
        match &status.output {
            Some(asset) => Ok(asset.clone()),
            None => Err(ProviderError::invalid_response(
                &self.name,
                format!("prediction {id} succeeded without output"),
            )),
        }
    }
}
