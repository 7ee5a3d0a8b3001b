//! Progress reporting to observers.
//!
//! Reporting is fire-and-forget: implementations must not block and never
//! fail the pipeline.

use bcast_models::GenerationProgress;
use tokio::sync::watch;
use tracing::trace;

pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: &GenerationProgress);
}

/// Drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _progress: &GenerationProgress) {}
}

/// Calls a closure with each update.
pub struct FnReporter<F>(F);

impl<F> FnReporter<F>
where
    F: Fn(&GenerationProgress) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ProgressReporter for FnReporter<F>
where
    F: Fn(&GenerationProgress) + Send + Sync,
{
    fn report(&self, progress: &GenerationProgress) {
        (self.0)(progress)
    }
}

/// Publishes the latest update on a watch channel.
///
/// Slow observers only ever see the newest value; with no receivers left the
/// update is dropped.
#[derive(Debug, Clone)]
pub struct WatchReporter {
    tx: watch::Sender<GenerationProgress>,
}

impl WatchReporter {
    pub fn new() -> (Self, watch::Receiver<GenerationProgress>) {
        let (tx, rx) = watch::channel(GenerationProgress::default());
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationProgress> {
        self.tx.subscribe()
    }
}

impl ProgressReporter for WatchReporter {
    fn report(&self, progress: &GenerationProgress) {
        if self.tx.send(progress.clone()).is_err() {
            trace!(step = %progress.current_step, "No progress subscribers");
        }
    }
}
