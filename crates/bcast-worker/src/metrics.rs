//! Pipeline metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const SEGMENTS_TOTAL: &str = "bcast_segments_total";
    pub const STAGE_DURATION_SECONDS: &str = "bcast_stage_duration_seconds";
    pub const COMPOSITION_TOTAL: &str = "bcast_composition_total";
    pub const GRAPHICS_TOTAL: &str = "bcast_graphics_total";
    pub const PERSIST_FAILURES_TOTAL: &str = "bcast_persist_failures_total";
    pub const RUNS_TOTAL: &str = "bcast_runs_total";
}

/// Record a segment reaching an outcome in a stage.
pub fn record_segment(stage: &str, kind: &str, outcome: &str) {
    let labels = [
        ("stage", stage.to_string()),
        ("kind", kind.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::SEGMENTS_TOTAL, &labels).increment(1);
}

pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage.to_string()).record(duration_secs);
}

/// Record a mux, snapshot or concat attempt.
pub fn record_composition(step: &str, outcome: &str) {
    let labels = [("step", step.to_string()), ("outcome", outcome.to_string())];
    counter!(names::COMPOSITION_TOTAL, &labels).increment(1);
}

pub fn record_graphic(step: &str, outcome: &str) {
    let labels = [("step", step.to_string()), ("outcome", outcome.to_string())];
    counter!(names::GRAPHICS_TOTAL, &labels).increment(1);
}

pub fn record_persist_failure(target: &str) {
    counter!(names::PERSIST_FAILURES_TOTAL, "target" => target.to_string()).increment(1);
}

/// Record the end state of a whole run.
pub fn record_run(status: &str) {
    counter!(names::RUNS_TOTAL, "status" => status.to_string()).increment(1);
}
