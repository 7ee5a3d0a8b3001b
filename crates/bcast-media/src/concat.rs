//! Re-encoding concatenation of story clips.
//!
//! Clips come from different providers with different sizes, frame rates and
//! audio layouts, so stream-copy concat is not an option. Every part is
//! normalized inside one `filter_complex` and joined with the `concat` filter.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use bcast_models::encoding::{EncodingConfig, DEFAULT_AUDIO_SAMPLE_RATE};
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_media, MediaInfo};

/// One clip to join, with the stream facts the filter graph depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatPart {
    pub path: PathBuf,
    pub duration: f64,
    pub has_audio: bool,
}

impl ConcatPart {
    pub fn from_info(path: impl Into<PathBuf>, info: &MediaInfo) -> MediaResult<Self> {
        let path = path.into();
        if !info.has_video {
            return Err(MediaError::invalid_media(format!(
                "{} has no video stream",
                path.display()
            )));
        }
        if !info.has_audio && info.duration <= 0.0 {
            return Err(MediaError::invalid_media(format!(
                "{} has no audio and an unknown duration",
                path.display()
            )));
        }
        Ok(Self {
            path,
            duration: info.duration,
            has_audio: info.has_audio,
        })
    }
}

/// Filter graph producing `[v]` and `[a]` from `parts`.
///
/// Silent parts read generated silence from extra inputs appended after the
/// clips, in the order the silent parts appear.
pub fn concat_filter(parts: &[ConcatPart], enc: &EncodingConfig) -> String {
    let (w, h) = (enc.width, enc.height);
    let audio_format = format!(
        "aresample={DEFAULT_AUDIO_SAMPLE_RATE},aformat=sample_fmts=fltp:channel_layouts=stereo"
    );

    let mut graph = String::new();
    let mut silence_input = parts.len();

    for (i, part) in parts.iter().enumerate() {
        let _ = write!(
            graph,
            "[{i}:v:0]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format=yuv420p,\
             setpts=PTS-STARTPTS[v{i}];",
            fps = enc.fps,
        );
        if part.has_audio {
            let _ = write!(
                graph,
                "[{i}:a:0]{audio_format},apad,atrim=0:{dur:.3},asetpts=PTS-STARTPTS[a{i}];",
                dur = part.duration,
            );
        } else {
            let _ = write!(
                graph,
                "[{silence_input}:a:0]{audio_format},asetpts=PTS-STARTPTS[a{i}];"
            );
            silence_input += 1;
        }
    }

    for i in 0..parts.len() {
        let _ = write!(graph, "[v{i}][a{i}]");
    }
    let _ = write!(graph, "concat=n={}:v=1:a=1[v][a]", parts.len());
    graph
}

/// Full concat command for already-probed parts.
pub fn concat_command(
    parts: &[ConcatPart],
    output_path: &Path,
    enc: &EncodingConfig,
) -> MediaResult<FfmpegCommand> {
    let (first, rest) = parts.split_first().ok_or(MediaError::NoInputs)?;

    let mut cmd = FfmpegCommand::new(&first.path, output_path);
    for part in rest {
        cmd = cmd.add_input(&part.path);
    }
    for part in parts.iter().filter(|p| !p.has_audio) {
        cmd = cmd
            .add_input(format!(
                "anullsrc=r={DEFAULT_AUDIO_SAMPLE_RATE}:cl=stereo"
            ))
            .format("lavfi")
            .duration(part.duration);
    }

    let mut cmd = cmd
        .filter_complex(concat_filter(parts, enc))
        .map("[v]")
        .map("[a]")
        .video_codec(&enc.codec)
        .preset(&enc.preset)
        .crf(enc.crf)
        .audio_codec(&enc.audio_codec)
        .audio_bitrate(&enc.audio_bitrate);
    if enc.faststart {
        cmd = cmd.faststart();
    }
    Ok(cmd)
}

/// Probe, normalize and join `inputs` in the given order.
pub async fn concat_videos(
    runner: &FfmpegRunner,
    inputs: &[PathBuf],
    output_path: impl AsRef<Path>,
    enc: &EncodingConfig,
) -> MediaResult<()> {
    if inputs.is_empty() {
        return Err(MediaError::NoInputs);
    }

    let mut parts = Vec::with_capacity(inputs.len());
    for input in inputs {
        let info = probe_media(input).await?;
        parts.push(ConcatPart::from_info(input, &info)?);
    }

    let total: f64 = parts.iter().map(|p| p.duration).sum();
    info!(parts = parts.len(), total_secs = total, "Concatenating clips");

    let cmd = concat_command(&parts, output_path.as_ref(), enc)?;
    runner
        .run_with_progress(&cmd, move |p| {
            debug!(
                percent = (p.fraction_of(total) * 100.0).round(),
                speed = p.speed,
                "Concat progress"
            );
        })
        .await
}
