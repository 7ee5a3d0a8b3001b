//! Synchronous reference-voice text-to-speech.

use async_trait::async_trait;
use bcast_models::AssetRef;
use serde::Serialize;
use tracing::debug;

use crate::cancel::CancelSignal;
use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::http::{content_type, ensure_created};
use crate::job::AssetGenerator;
use crate::requests::SpeechRequest;

const NAME: &str = "segmind-tts";

#[derive(Debug, Serialize)]
struct ChatterboxBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_audio: Option<&'a str>,
    exaggeration: f32,
    temperature: f32,
    seed: u64,
    cfg_weight: f32,
    min_p: f32,
    top_p: f32,
    repetition_penalty: f32,
}

/// Speech provider answering the creation call with the audio itself.
pub struct SegmindTts {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SegmindTts {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        let api_key = config
            .segmind_api_key
            .clone()
            .ok_or(ProviderError::MissingCredentials("SEGMIND_API_KEY"))?;
        Ok(Self::new(config.http_client()?, &config.segmind_base_url, api_key))
    }

    async fn synthesize(&self, request: &SpeechRequest) -> ProviderResult<AssetRef> {
        if request.text.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("speech text is empty".into()));
        }
        let body = ChatterboxBody {
            text: &request.text,
            reference_audio: request.reference_audio.as_deref(),
            exaggeration: request.exaggeration,
            temperature: request.temperature,
            seed: request.seed.unwrap_or_else(|| rand::random_range(0..1_000_000)),
            cfg_weight: request.cfg_weight,
            min_p: request.min_p,
            top_p: request.top_p,
            repetition_penalty: request.repetition_penalty,
        };

        let response = self
            .client
            .post(format!("{}/v1/chatterbox-tts", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_created(NAME, response).await?;
        let mime = content_type(&response, "audio/wav");
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ProviderError::invalid_response(NAME, "empty audio body"));
        }
        debug!(bytes = bytes.len(), mime = %mime, "Speech synthesized");
        Ok(AssetRef::bytes(bytes.to_vec(), mime))
    }
}

#[async_trait]
impl AssetGenerator<SpeechRequest> for SegmindTts {
    fn provider_name(&self) -> &str {
        NAME
    }

    async fn generate(&self, request: &SpeechRequest, cancel: &CancelSignal) -> ProviderResult<AssetRef> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        let started = std::time::Instant::now();
        let result = tokio::select! {
            result = self.synthesize(request) => result,
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        };
        metrics::histogram!(
            "bcast_provider_job_duration_seconds",
            "provider" => NAME,
            "outcome" => if result.is_ok() { "completed" } else { "failed" }
        )
        .record(started.elapsed().as_secs_f64());
        result
    }
}
