//! End-to-end pipeline runs against in-process fakes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bcast_models::{
    AssetRef, GeneratedVideo, GenerationProgress, LowerThird, Segment, SegmentKind, SegmentStatus,
    Story, VideoStatus,
};
use bcast_providers::{
    AssetGenerator, BackgroundRemovalRequest, CancelSignal, ImageRequest, ProviderError,
    ProviderResult, SpeechRequest, VideoRequest,
};
use bcast_storage::{MemorySink, PassthroughAssetStore, PersistenceSink};
use bcast_worker::{
    Compositor, FnReporter, PipelineConfig, PipelineError, PipelineResult, Providers,
    VideoPipeline,
};
use tokio::sync::watch;

#[derive(Default)]
struct FakeVideo {
    prompts: Mutex<Vec<String>>,
    fail_when: Option<&'static str>,
    cancel_after_first: Mutex<Option<watch::Sender<bool>>>,
}

#[async_trait]
impl AssetGenerator<VideoRequest> for FakeVideo {
    fn provider_name(&self) -> &str {
        "fake-video"
    }

    async fn generate(&self, request: &VideoRequest, _cancel: &CancelSignal) -> ProviderResult<AssetRef> {
        let n = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(request.prompt.clone());
            prompts.len()
        };
        if let Some(tx) = self.cancel_after_first.lock().unwrap().take() {
            tx.send(true).unwrap();
        }
        if self.fail_when.is_some_and(|marker| request.prompt.contains(marker)) {
            return Err(ProviderError::creation_rejected("fake-video", 500, "internal error"));
        }
        Ok(AssetRef::url(format!("https://cdn.test/videos/{n}.mp4")))
    }
}

#[derive(Default)]
struct FakeSpeech {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl AssetGenerator<SpeechRequest> for FakeSpeech {
    fn provider_name(&self) -> &str {
        "fake-speech"
    }

    async fn generate(&self, _request: &SpeechRequest, _cancel: &CancelSignal) -> ProviderResult<AssetRef> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            return Err(ProviderError::creation_rejected("fake-speech", 500, "voice unavailable"));
        }
        Ok(AssetRef::url(format!("https://cdn.test/audio/{n}.wav")))
    }
}

struct FakeImages;

#[async_trait]
impl AssetGenerator<ImageRequest> for FakeImages {
    fn provider_name(&self) -> &str {
        "fake-images"
    }

    async fn generate(&self, request: &ImageRequest, _cancel: &CancelSignal) -> ProviderResult<AssetRef> {
        assert!(request.prompt.starts_with("News lower third graphic: "));
        Ok(AssetRef::url("https://cdn.test/images/lt.png"))
    }
}

#[derive(Default)]
struct FakeRemover {
    calls: AtomicUsize,
}

#[async_trait]
impl AssetGenerator<BackgroundRemovalRequest> for FakeRemover {
    fn provider_name(&self) -> &str {
        "fake-remover"
    }

    async fn generate(
        &self,
        request: &BackgroundRemovalRequest,
        _cancel: &CancelSignal,
    ) -> ProviderResult<AssetRef> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(!request.image_url.contains("clean"), "{}", request.image_url);
        Ok(AssetRef::url("https://cdn.test/images/lt_clean.png"))
    }
}

#[derive(Default)]
struct FakeCompositor {
    muxed: Mutex<Vec<String>>,
    concatenated: Mutex<Vec<Vec<String>>>,
    fail_concat: bool,
}

#[async_trait]
impl Compositor for FakeCompositor {
    async fn mux(&self, _video_url: &str, _audio_url: &str, out_name: &str) -> PipelineResult<String> {
        self.muxed.lock().unwrap().push(out_name.to_string());
        Ok(format!("https://cdn.test/videos/{out_name}.mp4"))
    }

    async fn snapshot(&self, _video_url: &str, out_name: &str) -> PipelineResult<String> {
        Ok(format!("https://cdn.test/thumbnails/{out_name}.png"))
    }

    async fn concat(&self, video_urls: &[String], out_name: &str) -> PipelineResult<String> {
        self.concatenated.lock().unwrap().push(video_urls.to_vec());
        if self.fail_concat {
            return Err(PipelineError::concat_failed("exit status 1"));
        }
        Ok(format!("https://cdn.test/videos/{out_name}.mp4"))
    }
}

fn segment(id: &str, kind: SegmentKind) -> Segment {
    Segment {
        id: id.to_string(),
        kind,
        duration: 8.0,
        character: None,
        role: None,
        camera_description: None,
        dialog: None,
        visual_description: None,
        voiceover_script: None,
        lower_third: None,
    }
}

/// Studio anchor, b-roll, narrated footage, field reporter.
fn newscast() -> Story {
    let mut studio = segment("studio_intro", SegmentKind::OnCamera);
    studio.character = Some("Dana Kingsley".into());
    studio.dialog = Some("Good evening. Geese have seized city hall.".into());
    studio.lower_third = Some(LowerThird {
        header: "BREAKING".into(),
        subheader: "Geese occupy city hall".into(),
    });

    let mut broll = segment("broll_1", SegmentKind::BRoll);
    broll.visual_description = Some("A flock of geese marches up the city hall steps".into());

    let mut narrated = segment("vo_1", SegmentKind::Voiceover);
    narrated.visual_description = Some("Geese honking from the mayor's balcony".into());
    narrated.voiceover_script = Some("Officials say negotiations are ongoing.".into());

    let mut field = segment("field_reporter_1", SegmentKind::OnCamera);
    field.character = Some("Max Fields".into());
    field.dialog = Some("I'm live outside, where the situation remains tense.".into());

    Story {
        story_id: "geese".into(),
        title: "Geese Take Over City Hall".into(),
        duration_seconds: 32.0,
        segments: vec![studio, broll, narrated, field],
    }
}

struct Harness {
    video: Arc<FakeVideo>,
    speech: Arc<FakeSpeech>,
    compositor: Arc<FakeCompositor>,
    sink: Arc<MemorySink>,
    pipeline: VideoPipeline,
}

fn harness(video: FakeVideo, compositor: FakeCompositor) -> Harness {
    harness_with_speech(video, FakeSpeech::default(), compositor)
}

fn harness_with_speech(video: FakeVideo, speech: FakeSpeech, compositor: FakeCompositor) -> Harness {
    harness_with(video, speech, compositor, None)
}

fn harness_with(
    video: FakeVideo,
    speech: FakeSpeech,
    compositor: FakeCompositor,
    remover: Option<Arc<FakeRemover>>,
) -> Harness {
    let video = Arc::new(video);
    let speech = Arc::new(speech);
    let compositor = Arc::new(compositor);
    let sink = Arc::new(MemorySink::new());

    let providers = Providers {
        video: video.clone(),
        speech: speech.clone(),
        lower_thirds: Arc::new(FakeImages),
        background_remover: remover.map(|r| r as Arc<dyn AssetGenerator<BackgroundRemovalRequest>>),
    };
    let config = PipelineConfig {
        snapshots: false,
        ..PipelineConfig::default()
    };
    let pipeline = VideoPipeline::new(config, providers, Arc::new(PassthroughAssetStore), compositor.clone())
        .with_sink(sink.clone());

    Harness {
        video,
        speech,
        compositor,
        sink,
        pipeline,
    }
}

fn status_of(video: &GeneratedVideo, id: &str) -> SegmentStatus {
    video.segment(id).map(|s| s.status).unwrap()
}

#[tokio::test]
async fn test_full_run_completes_every_segment() {
    let h = harness(FakeVideo::default(), FakeCompositor::default());

    let video = h.pipeline.generate_video(&newscast()).await.unwrap();

    assert_eq!(video.status, VideoStatus::Completed);
    assert_eq!(video.progress, 100);
    for segment in &video.segments {
        assert_eq!(segment.status, SegmentStatus::Completed, "{}", segment.id());
    }
    assert_eq!(
        video.final_video_url.as_deref(),
        Some("https://cdn.test/videos/final_geese.mp4")
    );

    let studio = video.segment("studio_intro").unwrap();
    assert_eq!(studio.lower_third_url.as_deref(), Some("https://cdn.test/images/lt.png"));
    assert!(studio.audio_url.is_none());

    // only the narrated segment has separate audio to mux
    assert_eq!(*h.compositor.muxed.lock().unwrap(), vec!["geese_vo_1".to_string()]);
    assert_eq!(h.speech.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_on_camera_footage_is_generated_first() {
    let h = harness(FakeVideo::default(), FakeCompositor::default());

    h.pipeline.generate_video(&newscast()).await.unwrap();

    let prompts = h.video.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 4);
    assert!(prompts[0].contains("welcomes viewers to tonight's broadcast"));
    assert!(prompts[0].contains("Geese have seized city hall."));
    assert!(prompts[1].contains("on the scene of a breaking news story"));
    assert_eq!(prompts[2], "A flock of geese marches up the city hall steps");
    assert_eq!(prompts[3], "Geese honking from the mayor's balcony");
}

#[tokio::test]
async fn test_concat_follows_story_order() {
    let h = harness(FakeVideo::default(), FakeCompositor::default());

    let video = h.pipeline.generate_video(&newscast()).await.unwrap();

    let concatenated = h.compositor.concatenated.lock().unwrap().clone();
    assert_eq!(concatenated.len(), 1);
    assert_eq!(
        concatenated[0],
        vec![
            "https://cdn.test/videos/1.mp4".to_string(),
            "https://cdn.test/videos/3.mp4".to_string(),
            "https://cdn.test/videos/geese_vo_1.mp4".to_string(),
            "https://cdn.test/videos/2.mp4".to_string(),
        ]
    );
    assert_eq!(concatenated[0], video.concat_inputs());
}

#[tokio::test]
async fn test_failed_broll_creation_only_fails_its_segment() {
    let h = harness(
        FakeVideo {
            fail_when: Some("marches up"),
            ..FakeVideo::default()
        },
        FakeCompositor::default(),
    );

    let video = h.pipeline.generate_video(&newscast()).await.unwrap();

    assert_eq!(video.status, VideoStatus::Completed);
    assert_eq!(status_of(&video, "broll_1"), SegmentStatus::Error);
    let error = video.segment("broll_1").and_then(|s| s.error.clone()).unwrap();
    assert!(error.contains("500"), "{error}");

    assert_eq!(status_of(&video, "studio_intro"), SegmentStatus::Completed);
    assert_eq!(status_of(&video, "vo_1"), SegmentStatus::Completed);
    assert_eq!(status_of(&video, "field_reporter_1"), SegmentStatus::Completed);

    let concatenated = h.compositor.concatenated.lock().unwrap().clone();
    assert_eq!(concatenated[0].len(), 3);
}

#[tokio::test]
async fn test_concat_failure_falls_back_to_last_video() {
    let h = harness(
        FakeVideo::default(),
        FakeCompositor {
            fail_concat: true,
            ..FakeCompositor::default()
        },
    );

    let video = h.pipeline.generate_video(&newscast()).await.unwrap();

    assert_eq!(video.status, VideoStatus::Completed);
    assert_eq!(video.final_video_url.as_deref(), Some("https://cdn.test/videos/2.mp4"));
}

#[tokio::test]
async fn test_failed_narration_footage_is_left_out_of_the_final_video() {
    let h = harness_with_speech(
        FakeVideo::default(),
        FakeSpeech {
            fail: true,
            ..FakeSpeech::default()
        },
        FakeCompositor {
            fail_concat: true,
            ..FakeCompositor::default()
        },
    );
    let mut story = newscast();
    story.segments.retain(|s| s.id == "studio_intro" || s.id == "vo_1");

    let video = h.pipeline.generate_video(&story).await.unwrap();

    let narrated = video.segment("vo_1").unwrap();
    assert_eq!(narrated.status, SegmentStatus::Error);
    assert_eq!(narrated.video_url.as_deref(), Some("https://cdn.test/videos/2.mp4"));
    assert!(h.compositor.muxed.lock().unwrap().is_empty());

    let concatenated = h.compositor.concatenated.lock().unwrap().clone();
    assert_eq!(concatenated, vec![vec!["https://cdn.test/videos/1.mp4".to_string()]]);
    assert_eq!(video.final_video_url.as_deref(), Some("https://cdn.test/videos/1.mp4"));
}

#[tokio::test]
async fn test_story_without_footage_has_no_final_video() {
    let h = harness(FakeVideo::default(), FakeCompositor::default());
    let mut narration = segment("vo_only", SegmentKind::Voiceover);
    narration.voiceover_script = Some("In other news, nothing happened.".into());
    let story = Story {
        story_id: "quiet".into(),
        title: "Slow News Day".into(),
        duration_seconds: 5.0,
        segments: vec![narration],
    };

    let video = h.pipeline.generate_video(&story).await.unwrap();

    assert_eq!(video.status, VideoStatus::Completed);
    assert!(video.final_video_url.is_none());
    assert_eq!(status_of(&video, "vo_only"), SegmentStatus::Completed);
    assert!(h.compositor.concatenated.lock().unwrap().is_empty());
    assert!(h.video.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_story_is_rejected_before_any_work() {
    let h = harness(FakeVideo::default(), FakeCompositor::default());
    let story = Story {
        story_id: "empty".into(),
        title: "Nothing".into(),
        duration_seconds: 0.0,
        segments: vec![],
    };

    let err = h.pipeline.generate_video(&story).await.unwrap_err();

    assert!(matches!(err, PipelineError::InvalidStory(_)));
    assert_eq!(h.sink.segment_writes("empty"), 0);
    assert!(h.video.prompts.lock().unwrap().is_empty());

    let saved = h.sink.load_video("empty").await.unwrap().unwrap();
    assert_eq!(saved.status, VideoStatus::Error);
    assert!(saved.segments.is_empty());
    assert!(saved.error.unwrap().starts_with("Invalid story"));
}

#[tokio::test]
async fn test_rerun_with_fewer_segments_drops_stale_snapshots() {
    let h = harness(FakeVideo::default(), FakeCompositor::default());
    let mut story = newscast();
    story.segments.retain(|s| s.id == "studio_intro" || s.id == "vo_1");
    h.pipeline.generate_video(&story).await.unwrap();

    story.segments.retain(|s| s.id == "studio_intro");
    h.pipeline.generate_video(&story).await.unwrap();

    let saved = h.sink.load_video("geese").await.unwrap().unwrap();
    let ids: Vec<_> = saved.segments.iter().map(|s| s.id().to_string()).collect();
    assert_eq!(ids, vec!["studio_intro"]);
    assert_eq!(saved.status, VideoStatus::Completed);
    assert!(h.sink.segment("geese", "vo_1").is_none());
}

#[tokio::test]
async fn test_every_transition_is_persisted() {
    let h = harness(FakeVideo::default(), FakeCompositor::default());

    let video = h.pipeline.generate_video(&newscast()).await.unwrap();

    // initial pending snapshot, generating and completed for each segment
    assert!(h.sink.segment_writes("geese") >= 3 * video.segments.len());

    let saved = h.sink.load_video("geese").await.unwrap().unwrap();
    assert_eq!(saved.status, VideoStatus::Completed);
    assert_eq!(saved.final_video_url, video.final_video_url);
    assert_eq!(saved.segments.len(), 4);
    assert_eq!(
        saved.segments.iter().map(|s| s.id().to_string()).collect::<Vec<_>>(),
        vec!["studio_intro", "broll_1", "vo_1", "field_reporter_1"]
    );

    let narrated = h.sink.segment("geese", "vo_1").unwrap();
    assert_eq!(narrated.status, SegmentStatus::Completed);
    assert_eq!(
        narrated.video_url.as_deref(),
        Some("https://cdn.test/videos/geese_vo_1.mp4")
    );
}

#[tokio::test]
async fn test_progress_is_reported_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let h = harness(FakeVideo::default(), FakeCompositor::default());
    let pipeline = h.pipeline.with_reporter(Arc::new(FnReporter::new(move |p: &GenerationProgress| {
        recorder.lock().unwrap().push(p.progress);
    })));

    pipeline.generate_video(&newscast()).await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.first(), Some(&0));
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn test_cancellation_stops_the_run() {
    let (tx, cancel) = CancelSignal::channel();
    let h = harness(
        FakeVideo {
            cancel_after_first: Mutex::new(Some(tx)),
            ..FakeVideo::default()
        },
        FakeCompositor::default(),
    );

    let err = h
        .pipeline
        .generate_video_with_cancel(&newscast(), cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(h.video.prompts.lock().unwrap().len(), 1);
    assert!(h.compositor.concatenated.lock().unwrap().is_empty());

    let saved = h.sink.load_video("geese").await.unwrap().unwrap();
    assert_eq!(saved.status, VideoStatus::Error);
    assert_eq!(
        h.sink.segment("geese", "broll_1").map(|s| s.status),
        Some(SegmentStatus::Pending)
    );
}

#[tokio::test]
async fn test_resume_regenerates_only_unfinished_segments() {
    let first = harness(
        FakeVideo {
            fail_when: Some("marches up"),
            ..FakeVideo::default()
        },
        FakeCompositor::default(),
    );
    let previous = first.pipeline.generate_video(&newscast()).await.unwrap();
    assert_eq!(status_of(&previous, "broll_1"), SegmentStatus::Error);

    let second = harness(FakeVideo::default(), FakeCompositor::default());
    let video = second
        .pipeline
        .resume_video(&newscast(), &previous, CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(video.status, VideoStatus::Completed);
    assert_eq!(status_of(&video, "broll_1"), SegmentStatus::Completed);
    assert_eq!(
        *second.video.prompts.lock().unwrap(),
        vec!["A flock of geese marches up the city hall steps".to_string()]
    );
    assert_eq!(second.speech.calls.load(Ordering::SeqCst), 0);
    assert!(second.compositor.muxed.lock().unwrap().is_empty());
    assert_eq!(
        video.segment("studio_intro").and_then(|s| s.video_url.clone()),
        previous.segment("studio_intro").and_then(|s| s.video_url.clone())
    );
}

#[tokio::test]
async fn test_resume_does_not_clean_carried_over_lower_thirds_again() {
    let remover = Arc::new(FakeRemover::default());
    let first = harness_with(
        FakeVideo {
            fail_when: Some("marches up"),
            ..FakeVideo::default()
        },
        FakeSpeech::default(),
        FakeCompositor::default(),
        Some(remover.clone()),
    );
    let previous = first.pipeline.generate_video(&newscast()).await.unwrap();
    assert_eq!(remover.calls.load(Ordering::SeqCst), 1);

    let again = Arc::new(FakeRemover::default());
    let second = harness_with(
        FakeVideo::default(),
        FakeSpeech::default(),
        FakeCompositor::default(),
        Some(again.clone()),
    );
    let video = second
        .pipeline
        .resume_video(&newscast(), &previous, CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(again.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        video.segment("studio_intro").and_then(|s| s.lower_third_url.clone()).as_deref(),
        Some("https://cdn.test/images/lt_clean.png")
    );
}
