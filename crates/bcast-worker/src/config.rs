//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use bcast_models::EncodingConfig;

/// Provider-supported duration range for one segment category, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationWindow {
    pub min: u32,
    pub max: u32,
    /// Used when the segment gives no positive duration.
    pub default: u32,
}

impl DurationWindow {
    pub const fn new(min: u32, max: u32, default: u32) -> Self {
        Self { min, max, default }
    }

    /// Whole seconds within the window.
    pub fn clamp(&self, requested: f64) -> u32 {
        let seconds = if requested.is_finite() && requested > 0.0 {
            requested.round() as u32
        } else {
            self.default
        };
        seconds.clamp(self.min, self.max.max(self.min))
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// On-camera clips
    pub on_camera: DurationWindow,
    /// B-roll clips
    pub b_roll: DurationWindow,
    pub video_model: String,
    /// `WIDTHxHEIGHT` requested from the video provider
    pub video_size: String,
    pub lower_third_aspect_ratio: String,
    pub lower_third_style: String,
    /// Strip lower-third backgrounds after generation
    pub remove_lower_third_backgrounds: bool,
    /// Take a poster frame of every generated clip
    pub snapshots: bool,
    /// Base URL the reference voice files are served from
    pub voice_base_url: String,
    /// Scratch space for composition inputs
    pub work_dir: PathBuf,
    /// Root of the local asset store
    pub asset_dir: PathBuf,
    /// Public prefix stored assets are served under
    pub public_base_url: String,
    /// Where run snapshots are written; `None` keeps them in memory
    pub persistence_dir: Option<PathBuf>,
    /// Remote composition service; `None` runs FFmpeg locally
    pub compositor_url: Option<String>,
    /// JSON roster overriding the built-in characters
    pub characters_file: Option<PathBuf>,
    /// Upper bound for a single FFmpeg invocation
    pub ffmpeg_timeout: Duration,
    pub encoding: EncodingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            on_camera: DurationWindow::new(6, 12, 10),
            b_roll: DurationWindow::new(5, 10, 5),
            video_model: "sora-2".to_string(),
            video_size: "1280x720".to_string(),
            lower_third_aspect_ratio: "16:9".to_string(),
            lower_third_style: "design".to_string(),
            remove_lower_third_backgrounds: true,
            snapshots: true,
            voice_base_url: "http://localhost:8080/audio".to_string(),
            work_dir: PathBuf::from("/tmp/bcast"),
            asset_dir: PathBuf::from("./generated"),
            public_base_url: "http://localhost:8080/generated".to_string(),
            persistence_dir: None,
            compositor_url: None,
            characters_file: None,
            ffmpeg_timeout: Duration::from_secs(600),
            encoding: EncodingConfig::for_concat(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_window(prefix: &str, fallback: DurationWindow) -> DurationWindow {
    DurationWindow {
        min: env_parse(&format!("{prefix}_MIN_SECS")).unwrap_or(fallback.min),
        max: env_parse(&format!("{prefix}_MAX_SECS")).unwrap_or(fallback.max),
        default: env_parse(&format!("{prefix}_DEFAULT_SECS")).unwrap_or(fallback.default),
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            on_camera: env_window("ON_CAMERA", defaults.on_camera),
            b_roll: env_window("B_ROLL", defaults.b_roll),
            video_model: env_string("VIDEO_MODEL").unwrap_or(defaults.video_model),
            video_size: env_string("VIDEO_SIZE").unwrap_or(defaults.video_size),
            lower_third_aspect_ratio: env_string("LOWER_THIRD_ASPECT_RATIO")
                .unwrap_or(defaults.lower_third_aspect_ratio),
            lower_third_style: env_string("LOWER_THIRD_STYLE").unwrap_or(defaults.lower_third_style),
            remove_lower_third_backgrounds: env_parse("REMOVE_LOWER_THIRD_BACKGROUNDS")
                .unwrap_or(defaults.remove_lower_third_backgrounds),
            snapshots: env_parse("PIPELINE_SNAPSHOTS").unwrap_or(defaults.snapshots),
            voice_base_url: env_string("VOICE_BASE_URL").unwrap_or(defaults.voice_base_url),
            work_dir: env_string("WORK_DIR").map(PathBuf::from).unwrap_or(defaults.work_dir),
            asset_dir: env_string("ASSET_DIR").map(PathBuf::from).unwrap_or(defaults.asset_dir),
            public_base_url: env_string("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
            persistence_dir: env_string("PERSISTENCE_DIR").map(PathBuf::from),
            compositor_url: env_string("COMPOSITOR_URL"),
            characters_file: env_string("CHARACTERS_FILE").map(PathBuf::from),
            ffmpeg_timeout: Duration::from_secs(
                env_parse("FFMPEG_TIMEOUT_SECS").unwrap_or(defaults.ffmpeg_timeout.as_secs()),
            ),
            encoding: defaults.encoding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_camera_window() {
        let w = PipelineConfig::default().on_camera;
        assert_eq!(w.clamp(0.0), 10);
        assert_eq!(w.clamp(3.0), 6);
        assert_eq!(w.clamp(8.4), 8);
        assert_eq!(w.clamp(30.0), 12);
        assert_eq!(w.clamp(f64::NAN), 10);
    }

    #[test]
    fn test_b_roll_window() {
        let w = PipelineConfig::default().b_roll;
        assert_eq!(w.clamp(0.0), 5);
        assert_eq!(w.clamp(-2.0), 5);
        assert_eq!(w.clamp(7.0), 7);
        assert_eq!(w.clamp(15.0), 10);
    }

    #[test]
    fn test_inverted_window_does_not_panic() {
        let w = DurationWindow::new(10, 4, 6);
        assert_eq!(w.clamp(1.0), 10);
    }
}
