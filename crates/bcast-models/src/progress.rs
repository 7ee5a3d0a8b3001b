//! Coarse progress updates pushed to observers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Starting,
    GeneratingVideos,
    GeneratingGraphics,
    RemovingBackgrounds,
    GeneratingVoiceovers,
    Composing,
    Completed,
}

impl PipelineStage {
    pub const TOTAL_STEPS: u32 = 4;

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Starting => "starting",
            PipelineStage::GeneratingVideos => "generating_videos",
            PipelineStage::GeneratingGraphics => "generating_graphics",
            PipelineStage::RemovingBackgrounds => "removing_backgrounds",
            PipelineStage::GeneratingVoiceovers => "generating_voiceovers",
            PipelineStage::Composing => "composing",
            PipelineStage::Completed => "completed",
        }
    }

    /// Human-readable step label shown by UIs.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::Starting => "Preparing segments",
            PipelineStage::GeneratingVideos => "Generating segment videos",
            PipelineStage::GeneratingGraphics => "Generating lower third graphics",
            PipelineStage::RemovingBackgrounds => "Removing lower third backgrounds",
            PipelineStage::GeneratingVoiceovers => "Generating voiceover audio",
            PipelineStage::Composing => "Composing final video",
            PipelineStage::Completed => "Complete",
        }
    }

    /// Percentage reported on entering the stage.
    pub fn percent(&self) -> u8 {
        match self {
            PipelineStage::Starting => 0,
            PipelineStage::GeneratingVideos => 15,
            PipelineStage::GeneratingGraphics => 60,
            PipelineStage::RemovingBackgrounds => 75,
            PipelineStage::GeneratingVoiceovers => 85,
            PipelineStage::Composing => 95,
            PipelineStage::Completed => 100,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot handed to progress observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationProgress {
    pub current_step: String,
    pub progress: u8,
    pub total_steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_segment: Option<String>,
}

impl GenerationProgress {
    pub fn at(stage: PipelineStage) -> Self {
        Self {
            current_step: stage.label().to_string(),
            progress: stage.percent(),
            total_steps: PipelineStage::TOTAL_STEPS,
            current_segment: None,
        }
    }

    pub fn with_segment(mut self, segment_id: impl Into<String>) -> Self {
        self.current_segment = Some(segment_id.into());
        self
    }
}

impl Default for GenerationProgress {
    fn default() -> Self {
        Self::at(PipelineStage::Starting)
    }
}
