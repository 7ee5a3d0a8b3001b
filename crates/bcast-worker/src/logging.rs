//! Structured story logging utilities.

use bcast_models::{PipelineStage, SegmentStatus};
use tracing::{error, info, warn, Span};

/// Story logger for structured logging with consistent formatting.
///
/// Carries the story ID and operation so every lifecycle line of a run can
/// be filtered on them.
#[derive(Debug, Clone)]
pub struct StoryLogger {
    story_id: String,
    operation: String,
}

impl StoryLogger {
    pub fn new(story_id: &str, operation: &str) -> Self {
        Self {
            story_id: story_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            story_id = %self.story_id,
            operation = %self.operation,
            "Story started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            story_id = %self.story_id,
            operation = %self.operation,
            "Story progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            story_id = %self.story_id,
            operation = %self.operation,
            "Story warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            story_id = %self.story_id,
            operation = %self.operation,
            "Story error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            story_id = %self.story_id,
            operation = %self.operation,
            "Story completed: {}", message
        );
    }

    /// Stage boundary, with the percentage reported to observers.
    pub fn log_stage(&self, stage: PipelineStage) {
        info!(
            story_id = %self.story_id,
            stage = %stage,
            percent = stage.percent(),
            "{}", stage.label()
        );
    }

    /// A segment changed status; failures are logged at warn with the reason.
    pub fn log_segment(&self, segment_id: &str, status: SegmentStatus, detail: Option<&str>) {
        match status {
            SegmentStatus::Error => warn!(
                story_id = %self.story_id,
                segment_id,
                error = detail.unwrap_or("unknown error"),
                "Segment failed"
            ),
            _ => info!(
                story_id = %self.story_id,
                segment_id,
                status = %status,
                "Segment {}", status
            ),
        }
    }

    pub fn story_id(&self) -> &str {
        &self.story_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span wrapping a whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "story",
            story_id = %self.story_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_logger_creation() {
        let logger = StoryLogger::new("story-123", "generate_video");

        assert_eq!(logger.story_id(), "story-123");
        assert_eq!(logger.operation(), "generate_video");
    }
}
