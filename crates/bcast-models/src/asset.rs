//! References to generated media assets.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of generated asset; decides storage directory and file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Video,
    Audio,
    Image,
    Thumbnail,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Video => "video",
            AssetKind::Audio => "audio",
            AssetKind::Image => "image",
            AssetKind::Thumbnail => "thumbnail",
        }
    }

    /// Subdirectory under the asset root.
    pub fn dir(&self) -> &'static str {
        match self {
            AssetKind::Video => "videos",
            AssetKind::Audio => "audio",
            AssetKind::Image => "images",
            AssetKind::Thumbnail => "thumbnails",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AssetKind::Video => "mp4",
            AssetKind::Audio => "wav",
            AssetKind::Image => "jpg",
            AssetKind::Thumbnail => "png",
        }
    }

    pub fn default_mime(&self) -> &'static str {
        match self {
            AssetKind::Video => "video/mp4",
            AssetKind::Audio => "audio/wav",
            AssetKind::Image => "image/jpeg",
            AssetKind::Thumbnail => "image/png",
        }
    }

    /// Extension for a MIME type, falling back to the kind's default.
    pub fn extension_for_mime(&self, mime: &str) -> &'static str {
        match mime.split(';').next().unwrap_or("").trim() {
            "video/mp4" => "mp4",
            "video/webm" => "webm",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/mpeg" | "audio/mp3" => "mp3",
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            _ => self.extension(),
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A generated asset as returned by a provider.
#[derive(Clone, PartialEq, Eq)]
pub enum AssetRef {
    /// Remote, `data:` or locally served URL.
    Url(String),
    /// Raw bytes from a synchronous provider.
    Bytes { data: Vec<u8>, mime: String },
}

impl AssetRef {
    pub fn url(url: impl Into<String>) -> Self {
        AssetRef::Url(url.into())
    }

    pub fn bytes(data: impl Into<Vec<u8>>, mime: impl Into<String>) -> Self {
        AssetRef::Bytes {
            data: data.into(),
            mime: mime.into(),
        }
    }

    pub fn as_url(&self) -> Option<&str> {
        match self {
            AssetRef::Url(u) => Some(u),
            AssetRef::Bytes { .. } => None,
        }
    }

    /// Decode a base64 `data:` URL into bytes; other URLs are returned as is.
    pub fn decode_inline(self) -> Self {
        if let AssetRef::Url(u) = &self {
            if let Some((mime, data)) = decode_data_url(u) {
                return AssetRef::Bytes { data, mime };
            }
        }
        self
    }

    /// Inline representation: URLs unchanged, bytes as a `data:` URL.
    pub fn into_url(self) -> String {
        match self {
            AssetRef::Url(u) => u,
            AssetRef::Bytes { data, mime } => encode_data_url(&mime, &data),
        }
    }
}

/// Split `data:<mime>;base64,<payload>` into MIME type and bytes.
pub fn decode_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let data = BASE64.decode(payload.trim()).ok()?;
    let mime = if mime.is_empty() {
        "application/octet-stream".to_string()
    } else {
        mime.to_string()
    };
    Some((mime, data))
}

pub fn encode_data_url(mime: &str, data: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(data))
}

impl fmt::Debug for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetRef::Url(u) if u.starts_with("data:") => {
                write!(f, "Url(data:… {} chars)", u.len())
            }
            AssetRef::Url(u) => f.debug_tuple("Url").field(u).finish(),
            AssetRef::Bytes { data, mime } => f
                .debug_struct("Bytes")
                .field("len", &data.len())
                .field("mime", mime)
                .finish(),
        }
    }
}

/// Naming for stored assets: custom name, else story and segment, else story and kind.
pub fn asset_file_stem(
    custom: Option<&str>,
    story_id: Option<&str>,
    segment_id: Option<&str>,
    kind: AssetKind,
) -> String {
    if let Some(name) = custom.map(str::trim).filter(|n| !n.is_empty()) {
        return sanitize_file_stem(name);
    }
    let stem = match (story_id, segment_id) {
        (Some(story), Some(segment)) => format!("story-{story}-segment-{segment}"),
        (Some(story), None) => format!("story-{story}-{}", kind.as_str()),
        (None, Some(segment)) => format!("segment-{segment}-{}", kind.as_str()),
        (None, None) => kind.as_str().to_string(),
    };
    sanitize_file_stem(&stem)
}

/// Keep file names to `[A-Za-z0-9._-]`.
pub fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_file_stem() {
        assert_eq!(
            asset_file_stem(Some("final cut"), Some("s1"), None, AssetKind::Video),
            "final_cut"
        );
        assert_eq!(
            asset_file_stem(None, Some("s1"), Some("broll_1"), AssetKind::Video),
            "story-s1-segment-broll_1"
        );
        assert_eq!(
            asset_file_stem(None, Some("s1"), None, AssetKind::Audio),
            "story-s1-audio"
        );
        assert_eq!(
            asset_file_stem(Some("   "), None, None, AssetKind::Image),
            "image"
        );
    }

    #[test]
    fn test_sanitize_strips_traversal() {
        assert_eq!(sanitize_file_stem("../../etc/passwd"), "_.._etc_passwd");
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(AssetKind::Audio.extension_for_mime("audio/mpeg"), "mp3");
        assert_eq!(AssetKind::Image.extension_for_mime("image/png; q=1"), "png");
        assert_eq!(AssetKind::Video.extension_for_mime("application/octet-stream"), "mp4");
    }

    #[test]
    fn test_data_url_decoding() {
        let url = encode_data_url("audio/wav", b"RIFF....WAVE");
        assert!(url.starts_with("data:audio/wav;base64,"));

        let (mime, data) = decode_data_url(&url).unwrap();
        assert_eq!(mime, "audio/wav");
        assert_eq!(data, b"RIFF....WAVE");

        assert!(decode_data_url("data:text/plain,hello").is_none());
        assert!(decode_data_url("https://example.com/a.png").is_none());

        let inline = AssetRef::url(url).decode_inline();
        assert!(matches!(inline, AssetRef::Bytes { ref mime, .. } if mime == "audio/wav"));
    }

    #[test]
    fn test_debug_hides_payloads() {
        let asset = AssetRef::bytes(vec![0u8; 1024], "audio/wav");
        let dbg = format!("{asset:?}");
        assert!(dbg.contains("1024"));
        assert!(!dbg.contains("0, 0"));
    }
}
