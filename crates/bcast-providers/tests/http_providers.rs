//! Provider adapters against a mock HTTP server.

use std::time::Duration;

use bcast_models::AssetRef;
use bcast_providers::{
    AssetGenerator, BackgroundRemovalRequest, CancelSignal, ImageRequest, JobClient,
    OpenAiVideoProvider, PollConfig, ProviderError, ReplicateProvider, SegmindTts, SpeechRequest,
    VideoRequest,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_poll() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(20),
        timeout: Duration::from_secs(5),
        status_retries: 0,
    }
}

fn video_request() -> VideoRequest {
    VideoRequest {
        prompt: "@anchor welcomes viewers to tonight's broadcast.".into(),
        model: "sora-2".into(),
        seconds: 10,
        size: "1280x720".into(),
        reference_images: vec![],
    }
}

fn video_client(server: &MockServer) -> JobClient<OpenAiVideoProvider> {
    let provider = OpenAiVideoProvider::new(reqwest::Client::new(), server.uri(), "sk-test");
    JobClient::new(provider, fast_poll())
}

#[tokio::test]
async fn test_video_job_queued_then_completed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/videos"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "vid_1", "status": "queued"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/vid_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "vid_1", "status": "in_progress", "progress": 40})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/vid_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "vid_1", "status": "completed"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/vid_1/content"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(b"fake-mp4".to_vec()),
        )
        .mount(&server)
        .await;

    let asset = video_client(&server)
        .generate(&video_request(), &CancelSignal::never())
        .await
        .unwrap();

    match asset {
        AssetRef::Bytes { data, mime } => {
            assert_eq!(data, b"fake-mp4");
            assert_eq!(mime, "video/mp4");
        }
        other => panic!("expected bytes, got {other:?}"),
    }
}

#[tokio::test]
async fn test_video_creation_error_is_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/videos"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let err = video_client(&server)
        .generate(&video_request(), &CancelSignal::never())
        .await
        .unwrap_err();

    match err {
        ProviderError::CreationRejected { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_video_failed_job_reports_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "vid_2", "status": "queued"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/vid_2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "vid_2",
            "status": "failed",
            "error": {"code": "moderation_blocked", "message": "prompt rejected"}
        })))
        .mount(&server)
        .await;

    let err = video_client(&server)
        .generate(&video_request(), &CancelSignal::never())
        .await
        .unwrap_err();

    match err {
        ProviderError::JobFailed { job_id, detail, .. } => {
            assert_eq!(job_id, "vid_2");
            assert_eq!(detail, "moderation_blocked: prompt rejected");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_video_never_terminal_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "vid_3", "status": "queued"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/vid_3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "vid_3", "status": "in_progress"})))
        .mount(&server)
        .await;

    let provider = OpenAiVideoProvider::new(reqwest::Client::new(), server.uri(), "sk-test");
    let client = JobClient::new(
        provider,
        PollConfig {
            interval: Duration::from_millis(20),
            timeout: Duration::from_millis(200),
            status_retries: 0,
        },
    );

    let err = client
        .generate(&video_request(), &CancelSignal::never())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Timeout { .. }));
}

#[tokio::test]
async fn test_lower_third_prediction_output_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/models/ideogram-ai/ideogram-v2/predictions"))
        .and(header("authorization", "Token r8-test"))
        .and(body_partial_json(json!({"input": {"style_type": "design"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "p1", "status": "starting"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/predictions/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p1",
            "status": "succeeded",
            "output": ["https://replicate.delivery/p1/out.png"]
        })))
        .mount(&server)
        .await;

    let provider = ReplicateProvider::<ImageRequest>::new(
        reqwest::Client::new(),
        server.uri(),
        "r8-test",
        bcast_providers::LOWER_THIRD_MODEL,
    );
    let request = ImageRequest {
        prompt: "News lower third graphic: BREAKING - Geese annex pond".into(),
        reference_images: vec![],
        aspect_ratio: "16:9".into(),
        style_type: Some("design".into()),
    };

    let asset = JobClient::new(provider, fast_poll())
        .generate(&request, &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(asset.as_url(), Some("https://replicate.delivery/p1/out.png"));
}

#[tokio::test]
async fn test_background_removal_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/models/cjwbw/rembg/predictions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "p2", "status": "processing"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/predictions/p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p2",
            "status": "failed",
            "error": "CUDA out of memory"
        })))
        .mount(&server)
        .await;

    let provider = ReplicateProvider::<BackgroundRemovalRequest>::new(
        reqwest::Client::new(),
        server.uri(),
        "r8-test",
        bcast_providers::BACKGROUND_REMOVAL_MODEL,
    );
    let err = JobClient::new(provider, fast_poll())
        .generate(
            &BackgroundRemovalRequest {
                image_url: "https://replicate.delivery/p1/out.png".into(),
            },
            &CancelSignal::never(),
        )
        .await
        .unwrap_err();

    match err {
        ProviderError::JobFailed { detail, .. } => assert_eq!(detail, "CUDA out of memory"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_segmind_returns_audio_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chatterbox-tts"))
        .and(header("x-api-key", "sg-test"))
        .and(body_partial_json(json!({
            "text": "Back to you in the studio.",
            "reference_audio": "https://voices.example/anchor.wav",
            "seed": 42
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/wav")
                .set_body_bytes(b"RIFF0000WAVE".to_vec()),
        )
        .mount(&server)
        .await;

    let tts = SegmindTts::new(reqwest::Client::new(), server.uri(), "sg-test");
    let mut request = SpeechRequest::new("Back to you in the studio.")
        .with_reference_audio("https://voices.example/anchor.wav");
    request.seed = Some(42);

    let asset = tts.generate(&request, &CancelSignal::never()).await.unwrap();
    assert!(matches!(asset, AssetRef::Bytes { ref mime, ref data } if mime == "audio/wav" && data == b"RIFF0000WAVE"));
}

#[tokio::test]
async fn test_segmind_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chatterbox-tts"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&server)
        .await;

    let tts = SegmindTts::new(reqwest::Client::new(), server.uri(), "nope");
    let err = tts
        .generate(&SpeechRequest::new("Hello"), &CancelSignal::never())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::CreationRejected { status: 401, .. }));
}
