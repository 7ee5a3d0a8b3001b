//! Application state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bcast_providers::{CancelSignal, ProviderConfig};
use bcast_storage::{BucketConfig, LocalAssetStore, MemorySink, PersistenceSink};
use bcast_worker::{Compositor, LocalCompositor, PipelineConfig, VideoPipeline};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub compositor: Arc<dyn Compositor>,
    /// `None` when provider credentials are missing; story routes answer 503.
    pub pipeline: Option<VideoPipeline>,
    pub sink: Arc<dyn PersistenceSink>,
    pub runs: Arc<RunRegistry>,
}

impl AppState {
    /// Build state from the environment: local FFmpeg composition over the
    /// served asset directory, plus the pipeline when its providers are
    /// configured.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let providers = ProviderConfig::from_env();
        let client = providers.http_client()?;

        let mut pipeline_config = PipelineConfig::from_env();
        pipeline_config.asset_dir = config.asset_dir.clone();
        pipeline_config.public_base_url = config.public_base_url.clone();

        let store = Arc::new(LocalAssetStore::new(
            &config.asset_dir,
            &config.public_base_url,
            client,
        ));
        store.ensure_dirs().await?;
        let compositor = LocalCompositor::new(
            store,
            &pipeline_config.work_dir,
            pipeline_config.encoding.clone(),
        )
        .with_timeout(pipeline_config.ffmpeg_timeout);

        let pipeline = match VideoPipeline::from_config(pipeline_config, &providers, BucketConfig::from_env()?).await {
            Ok(pipeline) => {
                info!("Story generation enabled");
                Some(pipeline)
            }
            Err(e) => {
                warn!(error = %e, "Story generation disabled");
                None
            }
        };
        let sink = match &pipeline {
            Some(pipeline) => pipeline.sink(),
            None => Arc::new(MemorySink::new()) as Arc<dyn PersistenceSink>,
        };

        Ok(Self::from_parts(config, Arc::new(compositor), pipeline, sink))
    }

    pub fn from_parts(
        config: ApiConfig,
        compositor: Arc<dyn Compositor>,
        pipeline: Option<VideoPipeline>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Self {
        Self {
            config,
            compositor,
            pipeline,
            sink,
            runs: Arc::new(RunRegistry::default()),
        }
    }
}

/// Story runs in flight, keyed by story ID, with their cancel switches.
#[derive(Default)]
pub struct RunRegistry {
    active: Mutex<HashMap<String, watch::Sender<bool>>>,
}

impl RunRegistry {
    /// Register a run. `None` when the story is already running.
    pub fn start(&self, story_id: &str) -> Option<CancelSignal> {
        let mut active = self.active.lock().ok()?;
        if active.contains_key(story_id) {
            return None;
        }
        let (tx, signal) = CancelSignal::channel();
        active.insert(story_id.to_string(), tx);
        Some(signal)
    }

    pub fn finish(&self, story_id: &str) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(story_id);
        }
    }

    /// Ask a running story to stop. Returns whether it was running.
    pub fn cancel(&self, story_id: &str) -> bool {
        let Ok(active) = self.active.lock() else {
            return false;
        };
        match active.get(story_id) {
            Some(tx) => {
                let _ = tx.send(true);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, story_id: &str) -> bool {
        self.active
            .lock()
            .map(|active| active.contains_key(story_id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.active.lock().map(|active| active.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
