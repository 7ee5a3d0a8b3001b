//! Story input model.
//!
//! A [`Story`] is authored upstream (story generator, UI) and is immutable
//! once handed to the pipeline.

use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Kind of segment, which decides the primary asset that gets generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Speaking character; video with synchronized speech.
    #[serde(alias = "veo3")]
    OnCamera,
    /// Silent illustrative footage.
    #[serde(alias = "runway")]
    BRoll,
    /// Narration generated with text-to-speech.
    #[serde(alias = "tts_voiceover")]
    Voiceover,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::OnCamera => "on_camera",
            SegmentKind::BRoll => "b_roll",
            SegmentKind::Voiceover => "voiceover",
        }
    }
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broadcast-style text overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LowerThird {
    pub header: String,
    pub subheader: String,
}

/// One narrative beat of a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct Segment {
    /// Stable identifier. Substrings such as `studio` or `witness` carry meaning.
    #[validate(length(min = 1))]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    /// Advisory duration in seconds.
    #[serde(default)]
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voiceover_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_third: Option<LowerThird>,
}

impl Segment {
    /// Dialog with surrounding whitespace removed, if any is left.
    pub fn spoken_dialog(&self) -> Option<&str> {
        non_blank(self.dialog.as_deref())
    }

    pub fn visual(&self) -> Option<&str> {
        non_blank(self.visual_description.as_deref())
    }

    pub fn script(&self) -> Option<&str> {
        non_blank(self.voiceover_script.as_deref())
    }

    /// Whether stage one renders silent footage for this segment.
    ///
    /// B-roll always does. Voiceover segments get footage when they describe
    /// a visual and carry no dialog of their own; the narration is muxed on
    /// top during composition.
    pub fn wants_broll_footage(&self) -> bool {
        match self.kind {
            SegmentKind::BRoll => true,
            SegmentKind::Voiceover => self.visual().is_some() && self.spoken_dialog().is_none(),
            SegmentKind::OnCamera => false,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A generated news story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[validate(schema(function = "validate_unique_segment_ids"))]
pub struct Story {
    #[validate(length(min = 1))]
    pub story_id: String,
    pub title: String,
    #[serde(default)]
    pub duration_seconds: f64,
    #[validate(length(min = 1), nested)]
    pub segments: Vec<Segment>,
}

fn validate_unique_segment_ids(story: &Story) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(story.segments.len());
    for segment in &story.segments {
        if !seen.insert(segment.id.as_str()) {
            let mut err = ValidationError::new("duplicate_segment_id");
            err.message = Some(format!("segment id '{}' appears more than once", segment.id).into());
            return Err(err);
        }
    }
    Ok(())
}
