//! Composition against a real FFmpeg binary.
//!
//! Every test returns early when `ffmpeg`/`ffprobe` are not on PATH.

use std::path::{Path, PathBuf};

use bcast_media::{
    check_ffmpeg, check_ffprobe, concat_videos, extract_poster_frame, mux_audio_video,
    probe_media, FfmpegCommand, FfmpegRunner,
};
use bcast_models::EncodingConfig;

fn toolchain_available() -> bool {
    check_ffmpeg().is_ok() && check_ffprobe().is_ok()
}

async fn has_encoder(name: &str) -> bool {
    let output = tokio::process::Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output()
        .await;
    match output {
        Ok(out) => String::from_utf8_lossy(&out.stdout).contains(name),
        Err(_) => false,
    }
}

/// Silent test pattern clip.
async fn test_video(dir: &Path, name: &str, secs: f64, size: &str) -> PathBuf {
    let out = dir.join(name);
    let cmd = FfmpegCommand::new(format!("testsrc=size={size}:rate=25:duration={secs}"), &out)
        .format("lavfi")
        .video_codec("mpeg4")
        .pixel_format("yuv420p");
    FfmpegRunner::new().run(&cmd).await.unwrap();
    out
}

async fn test_tone(dir: &Path, name: &str, secs: f64) -> PathBuf {
    let out = dir.join(name);
    let cmd = FfmpegCommand::new(format!("sine=frequency=440:duration={secs}"), &out)
        .format("lavfi");
    FfmpegRunner::new().run(&cmd).await.unwrap();
    out
}

#[tokio::test]
async fn test_mux_is_bounded_by_shorter_audio() {
    if !toolchain_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let video = test_video(dir.path(), "v.mp4", 8.0, "320x240").await;
    let audio = test_tone(dir.path(), "a.wav", 5.2).await;
    let out = dir.path().join("muxed.mp4");

    mux_audio_video(&FfmpegRunner::new(), &video, &audio, &out)
        .await
        .unwrap();

    let info = probe_media(&out).await.unwrap();
    assert!(info.has_video && info.has_audio);
    assert!(info.duration < 6.0, "muxed duration {} exceeds audio", info.duration);
    assert!(info.duration > 4.5, "muxed duration {} too short", info.duration);
}

#[tokio::test]
async fn test_mux_is_bounded_by_shorter_video() {
    if !toolchain_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let video = test_video(dir.path(), "v.mp4", 3.0, "320x240").await;
    let audio = test_tone(dir.path(), "a.wav", 6.0).await;
    let out = dir.path().join("muxed.mp4");

    mux_audio_video(&FfmpegRunner::new(), &video, &audio, &out)
        .await
        .unwrap();

    let info = probe_media(&out).await.unwrap();
    assert!(info.duration < 4.0, "muxed duration {} exceeds video", info.duration);
}

#[tokio::test]
async fn test_snapshot_writes_png() {
    if !toolchain_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let video = test_video(dir.path(), "v.mp4", 1.0, "320x240").await;
    let out = dir.path().join("poster.png");

    extract_poster_frame(&FfmpegRunner::new(), &video, &out)
        .await
        .unwrap();

    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
}

#[tokio::test]
async fn test_concat_mixed_parts() {
    if !toolchain_available() || !has_encoder("libx264").await {
        return;
    }
    let dir = tempfile::tempdir().unwrap();

    // On-camera style clip with sound, then a silent b-roll of another size.
    let talking = test_video(dir.path(), "talk_src.mp4", 2.0, "640x360").await;
    let tone = test_tone(dir.path(), "tone.wav", 2.0).await;
    let talking_muxed = dir.path().join("talk.mp4");
    mux_audio_video(&FfmpegRunner::new(), &talking, &tone, &talking_muxed)
        .await
        .unwrap();
    let broll = test_video(dir.path(), "broll.mp4", 1.5, "320x240").await;

    let out = dir.path().join("final.mp4");
    concat_videos(
        &FfmpegRunner::new(),
        &[talking_muxed, broll],
        &out,
        &EncodingConfig::for_concat().with_resolution(320, 180),
    )
    .await
    .unwrap();

    let info = probe_media(&out).await.unwrap();
    assert!(info.has_video && info.has_audio);
    assert_eq!((info.width, info.height), (320, 180));
    assert!((info.duration - 3.5).abs() < 0.5, "final duration {}", info.duration);
}
