//! Poster frame extraction.

use std::path::Path;

use bcast_models::encoding::SNAPSHOT_OFFSET_SECS;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

pub fn snapshot_command(video_path: &Path, output_path: &Path) -> FfmpegCommand {
    FfmpegCommand::new(video_path, output_path)
        .seek(SNAPSHOT_OFFSET_SECS)
        .single_frame()
        .quality(2)
}

/// Write the first meaningful frame of `video_path` to `output_path` (PNG or JPEG by extension).
pub async fn extract_poster_frame(
    runner: &FfmpegRunner,
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let video_path = video_path.as_ref();
    let output_path = output_path.as_ref();

    if !video_path.exists() {
        return Err(MediaError::FileNotFound(video_path.to_path_buf()));
    }

    runner.run(&snapshot_command(video_path, output_path)).await?;

    // A seek past the end exits 0 without writing a frame.
    if !output_path.exists() {
        return Err(MediaError::invalid_media(format!(
            "no frame could be extracted from {}",
            video_path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_command() {
        let args = snapshot_command(Path::new("clip.mp4"), Path::new("clip.png")).build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-ss 0.050 -i clip.mp4 -frames:v 1 -q:v 2 clip.png"));
    }
}
