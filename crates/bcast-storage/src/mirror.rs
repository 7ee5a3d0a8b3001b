//! Copies a finished run's local assets into a bucket.

use std::path::PathBuf;
use std::sync::Arc;

use bcast_models::GeneratedVideo;
use futures::future::join_all;
use tracing::{info, warn};

use crate::assets::{mime_for_path, LocalAssetStore};
use crate::client::ObjectSink;
use crate::transfer::TransferQueue;

/// Outcome counts of a mirror pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Uploads every locally stored asset of a run through a [`TransferQueue`].
#[derive(Clone)]
pub struct AssetMirror {
    sink: Arc<dyn ObjectSink>,
    store: Arc<LocalAssetStore>,
    queue: TransferQueue,
}

impl AssetMirror {
    pub fn new(sink: Arc<dyn ObjectSink>, store: Arc<LocalAssetStore>, queue: TransferQueue) -> Self {
        Self { sink, store, queue }
    }

    /// Local files referenced by a run, deduplicated, segments first.
    fn local_files(&self, video: &GeneratedVideo) -> (Vec<PathBuf>, usize) {
        let urls = video
            .segments
            .iter()
            .flat_map(|s| {
                [
                    s.video_url.as_deref(),
                    s.audio_url.as_deref(),
                    s.first_frame_image_url.as_deref(),
                    s.lower_third_url.as_deref(),
                ]
            })
            .chain(std::iter::once(video.final_video_url.as_deref()))
            .flatten();

        let mut files: Vec<PathBuf> = Vec::new();
        let mut skipped = 0;
        for url in urls {
            match self.store.resolve(url) {
                Ok(path) if !files.contains(&path) => files.push(path),
                Ok(_) => {}
                Err(_) => skipped += 1,
            }
        }
        (files, skipped)
    }

    /// Upload everything; failures are counted, never returned.
    pub async fn mirror_video(&self, video: &GeneratedVideo) -> MirrorReport {
        let (files, skipped) = self.local_files(video);
        let mut report = MirrorReport {
            skipped,
            ..MirrorReport::default()
        };

        let uploads = files.into_iter().map(|path| {
            let sink = self.sink.clone();
            let story_id = video.story_id.clone();
            self.queue.run(async move {
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("asset")
                    .to_string();
                let key = sink.object_key(&story_id, &file_name);
                let result = sink.put_file(&path, &key, mime_for_path(&path)).await;
                (key, result)
            })
        });

        for outcome in join_all(uploads).await {
            match outcome {
                Ok((_, Ok(()))) => report.uploaded += 1,
                Ok((key, Err(e))) => {
                    warn!(story_id = %video.story_id, key = %key, error = %e, "Asset mirror upload failed");
                    report.failed += 1;
                }
                Err(e) => {
                    warn!(story_id = %video.story_id, error = %e, "Asset mirror queue unavailable");
                    report.failed += 1;
                }
            }
        }

        info!(
            story_id = %video.story_id,
            uploaded = report.uploaded,
            skipped = report.skipped,
            failed = report.failed,
            "Asset mirror finished"
        );
        report
    }
}
