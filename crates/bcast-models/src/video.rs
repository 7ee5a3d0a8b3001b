//! Generated video state.
//!
//! One [`GeneratedVideo`] is built per story run and owns one [`VideoSegment`]
//! per story segment, in story order.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::story::{Segment, Story};

/// Lifecycle of a single segment.
///
/// Advances `pending -> generating -> {completed | error}` and never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    #[default]
    Pending,
    Generating,
    Completed,
    Error,
}

impl SegmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentStatus::Pending => "pending",
            SegmentStatus::Generating => "generating",
            SegmentStatus::Completed => "completed",
            SegmentStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SegmentStatus::Completed | SegmentStatus::Error)
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// `generating -> generating` is allowed: a segment that needs two
    /// stages (footage, then narration) stays in flight between them.
    pub fn can_transition_to(&self, next: SegmentStatus) -> bool {
        use SegmentStatus::*;
        matches!(
            (self, next),
            (Pending, Generating)
                | (Generating, Generating)
                | (Generating, Completed)
                | (Generating, Error)
        )
    }
}

impl fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected segment status change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("segment {segment_id}: illegal status transition {from} -> {to}")]
pub struct StatusTransitionError {
    pub segment_id: String,
    pub from: SegmentStatus,
    pub to: SegmentStatus,
}

/// Mutable per-segment generation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoSegment {
    /// Index of the segment in the story.
    pub position: usize,

    #[serde(flatten)]
    pub segment: Segment,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_frame_image_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_third_url: Option<String>,

    #[serde(default)]
    pub status: SegmentStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub updated_at: DateTime<Utc>,
}

impl VideoSegment {
    pub fn new(position: usize, segment: Segment) -> Self {
        Self {
            position,
            segment,
            video_url: None,
            audio_url: None,
            first_frame_image_url: None,
            lower_third_url: None,
            status: SegmentStatus::Pending,
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.segment.id
    }

    /// Move to `next`, rejecting regressions.
    pub fn transition(&mut self, next: SegmentStatus) -> Result<(), StatusTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(StatusTransitionError {
                segment_id: self.segment.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_generating(&mut self) -> Result<(), StatusTransitionError> {
        self.transition(SegmentStatus::Generating)
    }

    pub fn complete(&mut self) -> Result<(), StatusTransitionError> {
        self.transition(SegmentStatus::Completed)?;
        self.error = None;
        Ok(())
    }

    /// Terminal failure with a human-readable reason.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), StatusTransitionError> {
        self.transition(SegmentStatus::Error)?;
        self.error = Some(message.into());
        Ok(())
    }

    pub fn has_video(&self) -> bool {
        self.video_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    pub fn has_audio(&self) -> bool {
        self.audio_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    #[default]
    Generating,
    Completed,
    Error,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Generating => "generating",
            VideoStatus::Completed => "completed",
            VideoStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, VideoStatus::Generating)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Video-level fields of a run, without the segments.
///
/// Persistence sinks receive this after each stage and merge it with the
/// per-segment snapshots they already hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoProgressUpdate {
    pub story_id: String,
    pub title: String,
    pub status: VideoStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub segment_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Output of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedVideo {
    pub story_id: String,
    pub title: String,
    /// Story order. Never reordered.
    pub segments: Vec<VideoSegment>,
    #[serde(default)]
    pub status: VideoStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GeneratedVideo {
    /// Fresh run state: every segment `pending`, video `generating`.
    pub fn from_story(story: &Story) -> Self {
        let now = Utc::now();
        Self {
            story_id: story.story_id.clone(),
            title: story.title.clone(),
            segments: story
                .segments
                .iter()
                .cloned()
                .enumerate()
                .map(|(position, segment)| VideoSegment::new(position, segment))
                .collect(),
            status: VideoStatus::Generating,
            progress: 0,
            final_video_url: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a video from its header and whatever segment snapshots exist.
    pub fn from_parts(update: VideoProgressUpdate, mut segments: Vec<VideoSegment>) -> Self {
        segments.sort_by_key(|s| s.position);
        Self {
            story_id: update.story_id,
            title: update.title,
            segments,
            status: update.status,
            progress: update.progress,
            final_video_url: update.final_video_url,
            error: update.error,
            created_at: update.updated_at,
            updated_at: update.updated_at,
        }
    }

    pub fn segment(&self, id: &str) -> Option<&VideoSegment> {
        self.segments.iter().find(|s| s.id() == id)
    }

    pub fn segment_mut(&mut self, id: &str) -> Option<&mut VideoSegment> {
        self.segments.iter_mut().find(|s| s.id() == id)
    }

    /// Video URLs to concatenate, in story order, skipping segments without
    /// one and segments that ended in `error`.
    ///
    /// Sorts by original position, so the result does not depend on the
    /// order in which segments finished generating. An errored narrated
    /// segment may still hold its silent footage; it is never used.
    pub fn concat_inputs(&self) -> Vec<String> {
        let mut with_video: Vec<&VideoSegment> = self
            .segments
            .iter()
            .filter(|s| s.status != SegmentStatus::Error && s.has_video())
            .collect();
        with_video.sort_by_key(|s| s.position);
        with_video
            .into_iter()
            .filter_map(|s| s.video_url.clone())
            .collect()
    }

    /// Stand-in final video when concatenation fails.
    pub fn last_video_url(&self) -> Option<String> {
        self.concat_inputs().pop()
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(100);
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self, final_video_url: Option<String>) {
        self.final_video_url = final_video_url;
        self.status = VideoStatus::Completed;
        self.progress = 100;
        self.error = None;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = VideoStatus::Error;
        self.error = Some(message.into());
        self.updated_at = Utc::now();
    }

    pub fn progress_update(&self) -> VideoProgressUpdate {
        VideoProgressUpdate {
            story_id: self.story_id.clone(),
            title: self.title.clone(),
            status: self.status,
            progress: self.progress,
            final_video_url: self.final_video_url.clone(),
            error: self.error.clone(),
            segment_count: self.segments.len(),
            updated_at: self.updated_at,
        }
    }

    /// Count of segments per status: (completed, error, other).
    pub fn tally(&self) -> (usize, usize, usize) {
        self.segments
            .iter()
            .fold((0, 0, 0), |(ok, err, other), s| match s.status {
                SegmentStatus::Completed => (ok + 1, err, other),
                SegmentStatus::Error => (ok, err + 1, other),
                _ => (ok, err, other + 1),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::SegmentKind;

    fn story(ids: &[(&str, SegmentKind)]) -> Story {
        Story {
            story_id: "story-1".into(),
            title: "Local Man Wins Argument".into(),
            duration_seconds: 30.0,
            segments: ids
                .iter()
                .map(|(id, kind)| Segment {
                    id: id.to_string(),
                    kind: *kind,
                    duration: 5.0,
                    character: None,
                    role: None,
                    camera_description: None,
                    dialog: None,
                    visual_description: None,
                    voiceover_script: None,
                    lower_third: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_status_never_regresses() {
        use SegmentStatus::*;
        let all = [Pending, Generating, Completed, Error];
        for from in [Completed, Error] {
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
        assert!(!Generating.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Generating));
        assert!(Generating.can_transition_to(Generating));
    }

    #[test]
    fn test_segment_transitions() {
        let video = GeneratedVideo::from_story(&story(&[("studio_intro", SegmentKind::OnCamera)]));
        let mut seg = video.segments[0].clone();

        assert_eq!(seg.status, SegmentStatus::Pending);
        seg.mark_generating().unwrap();
        seg.fail("provider returned 500").unwrap();
        assert_eq!(seg.error.as_deref(), Some("provider returned 500"));

        let err = seg.mark_generating().unwrap_err();
        assert_eq!(err.from, SegmentStatus::Error);
        assert_eq!(err.to, SegmentStatus::Generating);
        assert_eq!(seg.status, SegmentStatus::Error);
    }

    #[test]
    fn test_concat_inputs_follow_story_order() {
        let mut video = GeneratedVideo::from_story(&story(&[
            ("studio_intro", SegmentKind::OnCamera),
            ("broll_1", SegmentKind::BRoll),
            ("field_reporter_1", SegmentKind::OnCamera),
            ("vo_1", SegmentKind::Voiceover),
            ("studio_outro", SegmentKind::OnCamera),
        ]));

        // b-roll finished last and the voiceover has no footage
        video.segments[0].video_url = Some("a.mp4".into());
        video.segments[2].video_url = Some("c.mp4".into());
        video.segments[4].video_url = Some("e.mp4".into());
        video.segments[1].video_url = Some("b.mp4".into());
        video.segments.swap(1, 4);

        assert_eq!(video.concat_inputs(), vec!["a.mp4", "b.mp4", "c.mp4", "e.mp4"]);
        assert_eq!(video.last_video_url().as_deref(), Some("e.mp4"));
    }

    #[test]
    fn test_errored_segment_footage_is_never_used() {
        let mut video = GeneratedVideo::from_story(&story(&[
            ("studio_intro", SegmentKind::OnCamera),
            ("vo_1", SegmentKind::Voiceover),
        ]));
        video.segments[0].video_url = Some("a.mp4".into());
        video.segments[1].video_url = Some("b.mp4".into());
        video.segments[1].mark_generating().unwrap();
        video.segments[1].fail("tts returned 500").unwrap();

        assert_eq!(video.concat_inputs(), vec!["a.mp4"]);
        assert_eq!(video.last_video_url().as_deref(), Some("a.mp4"));
    }

    #[test]
    fn test_empty_video_url_is_skipped() {
        let mut video = GeneratedVideo::from_story(&story(&[
            ("studio_intro", SegmentKind::OnCamera),
            ("broll_1", SegmentKind::BRoll),
        ]));
        video.segments[0].video_url = Some(String::new());
        assert!(video.concat_inputs().is_empty());
        assert!(video.last_video_url().is_none());
    }

    #[test]
    fn test_from_parts_restores_order() {
        let video = GeneratedVideo::from_story(&story(&[
            ("studio_intro", SegmentKind::OnCamera),
            ("broll_1", SegmentKind::BRoll),
        ]));
        let mut segments = video.segments.clone();
        segments.reverse();

        let rebuilt = GeneratedVideo::from_parts(video.progress_update(), segments);
        assert_eq!(rebuilt.segments[0].id(), "studio_intro");
        assert_eq!(rebuilt.segments[1].id(), "broll_1");
    }

    #[test]
    fn test_video_segment_serializes_flat() {
        let video = GeneratedVideo::from_story(&story(&[("broll_1", SegmentKind::BRoll)]));
        let json = serde_json::to_value(&video.segments[0]).unwrap();
        assert_eq!(json["id"], "broll_1");
        assert_eq!(json["type"], "b_roll");
        assert_eq!(json["status"], "pending");

        let back: VideoSegment = serde_json::from_value(json).unwrap();
        assert_eq!(back, video.segments[0]);
    }
}
