//! Provider-neutral generation requests.

use serde::{Deserialize, Serialize};

/// Text (and optional reference image) to video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRequest {
    pub prompt: String,
    pub model: String,
    pub seconds: u32,
    /// `WIDTHxHEIGHT`
    pub size: String,
    /// Identity references in first-mention order. Providers that accept a
    /// single reference use the first.
    #[serde(default)]
    pub reference_images: Vec<String>,
}

impl VideoRequest {
    pub fn input_reference(&self) -> Option<&str> {
        self.reference_images.first().map(String::as_str)
    }
}

/// Text to speech with a reference voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_audio: Option<String>,
    pub exaggeration: f32,
    pub temperature: f32,
    pub cfg_weight: f32,
    pub min_p: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    /// Random when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reference_audio: None,
            exaggeration: 0.5,
            temperature: 0.8,
            cfg_weight: 0.5,
            min_p: 0.05,
            top_p: 1.0,
            repetition_penalty: 1.2,
            seed: None,
        }
    }

    pub fn with_reference_audio(mut self, url: impl Into<String>) -> Self {
        self.reference_audio = Some(url.into());
        self
    }
}

/// Text (and optional references) to image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(default)]
    pub reference_images: Vec<String>,
    pub aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_type: Option<String>,
}

/// Strip the background from an image, leaving transparency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundRemovalRequest {
    pub image_url: String,
}
