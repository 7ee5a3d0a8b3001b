//! Video + separate audio track muxing.

use std::path::Path;

use bcast_models::encoding::DEFAULT_AUDIO_CODEC;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Video stream copied untouched, audio re-encoded, output cut to the shorter stream.
pub fn mux_command(video_path: &Path, audio_path: &Path, output_path: &Path) -> FfmpegCommand {
    FfmpegCommand::new(video_path, output_path)
        .add_input(audio_path)
        .map("0:v:0")
        .map("1:a:0")
        .video_codec("copy")
        .audio_codec(DEFAULT_AUDIO_CODEC)
        .shortest()
}

/// Combine `video_path`'s picture with `audio_path`'s sound.
pub async fn mux_audio_video(
    runner: &FfmpegRunner,
    video_path: impl AsRef<Path>,
    audio_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let (video_path, audio_path, output_path) =
        (video_path.as_ref(), audio_path.as_ref(), output_path.as_ref());

    for input in [video_path, audio_path] {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
    }

    debug!(
        video = %video_path.display(),
        audio = %audio_path.display(),
        "Muxing audio onto video"
    );
    runner
        .run(&mux_command(video_path, audio_path, output_path))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mux_command_shortest_semantics() {
        let args = mux_command(
            Path::new("v.mp4"),
            Path::new("a.wav"),
            Path::new("out.mp4"),
        )
        .build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-i v.mp4 -i a.wav -map 0:v:0 -map 1:a:0 -c:v copy -c:a aac -shortest out.mp4"));
    }

    #[tokio::test]
    async fn test_missing_audio_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("v.mp4");
        std::fs::write(&video, b"not really a video").unwrap();

        let err = mux_audio_video(
            &FfmpegRunner::new(),
            &video,
            dir.path().join("missing.wav"),
            dir.path().join("out.mp4"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(p) if p.ends_with("missing.wav")));
    }
}
