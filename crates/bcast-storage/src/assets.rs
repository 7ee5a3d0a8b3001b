//! Durable storage for generated assets.
//!
//! Providers hand back short-lived URLs, `data:` URLs or raw bytes. The
//! pipeline stores each one before marking a segment complete so later
//! stages, and the caller, get a URL that stays valid.

use std::collections::{HashMap, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use bcast_models::{asset_file_stem, decode_data_url, AssetKind, AssetRef};
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// How a stored asset is named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetName {
    pub kind: AssetKind,
    pub custom: Option<String>,
    pub story_id: Option<String>,
    pub segment_id: Option<String>,
}

impl AssetName {
    pub fn segment(kind: AssetKind, story_id: &str, segment_id: &str) -> Self {
        Self {
            kind,
            custom: None,
            story_id: Some(story_id.to_string()),
            segment_id: Some(segment_id.to_string()),
        }
    }

    pub fn story(kind: AssetKind, story_id: &str) -> Self {
        Self {
            kind,
            custom: None,
            story_id: Some(story_id.to_string()),
            segment_id: None,
        }
    }

    pub fn custom(kind: AssetKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            custom: Some(name.into()),
            story_id: None,
            segment_id: None,
        }
    }

    /// Anonymous name for ad-hoc outputs.
    pub fn unique(kind: AssetKind) -> Self {
        Self::custom(kind, format!("{}-{}", kind.as_str(), Uuid::new_v4().simple()))
    }

    /// Override with a caller-supplied name when present.
    pub fn or_custom(mut self, name: Option<&str>) -> Self {
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            self.custom = Some(name.to_string());
        }
        self
    }

    pub fn stem(&self) -> String {
        asset_file_stem(
            self.custom.as_deref(),
            self.story_id.as_deref(),
            self.segment_id.as_deref(),
            self.kind,
        )
    }

    /// Stem with the kind's default extension unless it already has one.
    pub fn file_name(&self, extension: &str) -> String {
        let stem = self.stem();
        if extension_from_url(&stem).is_some() {
            stem
        } else {
            format!("{stem}.{extension}")
        }
    }
}

/// Turns provider output into a URL that stays valid.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn store(&self, asset: AssetRef, name: &AssetName) -> StorageResult<String>;
}

/// Keeps remote URLs as they are and inlines bytes as `data:` URLs.
#[derive(Debug, Default, Clone)]
pub struct PassthroughAssetStore;

#[async_trait]
impl AssetStore for PassthroughAssetStore {
    async fn store(&self, asset: AssetRef, _name: &AssetName) -> StorageResult<String> {
        Ok(asset.into_url())
    }
}

/// Writes assets under `<root>/{videos,audio,images,thumbnails}` and serves
/// them as `<public_base>/<dir>/<file>`.
pub struct LocalAssetStore {
    root: PathBuf,
    public_base: String,
    client: reqwest::Client,
    stored: Mutex<Remembered>,
}

/// Downloads already written, keyed by source URL and destination stem.
/// Oldest entries are evicted past [`REMEMBERED_CAPACITY`].
#[derive(Default)]
struct Remembered {
    urls: HashMap<(String, String), String>,
    order: VecDeque<(String, String)>,
}

const REMEMBERED_CAPACITY: usize = 512;

impl Remembered {
    fn get(&self, key: &(String, String)) -> Option<String> {
        self.urls.get(key).cloned()
    }

    fn insert(&mut self, key: (String, String), url: String) {
        if self.urls.insert(key.clone(), url).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > REMEMBERED_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.urls.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, key: &(String, String)) {
        if self.urls.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}

const ALL_KINDS: [AssetKind; 4] = [
    AssetKind::Video,
    AssetKind::Audio,
    AssetKind::Image,
    AssetKind::Thumbnail,
];

impl LocalAssetStore {
    /// `public_base` is either a path (`/generated`) or an absolute URL
    /// (`http://localhost:8080/generated`).
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
            client,
            stored: Mutex::new(Remembered::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_base(&self) -> &str {
        &self.public_base
    }

    pub async fn ensure_dirs(&self) -> StorageResult<()> {
        for kind in ALL_KINDS {
            tokio::fs::create_dir_all(self.root.join(kind.dir())).await?;
        }
        Ok(())
    }

    pub fn url_for(&self, kind: AssetKind, file_name: &str) -> String {
        format!("{}/{}/{}", self.public_base, kind.dir(), file_name)
    }

    /// Destination path and public URL for an output written in place.
    pub fn output(&self, name: &AssetName, extension: &str) -> (PathBuf, String) {
        let file_name = name.file_name(extension);
        (
            self.root.join(name.kind.dir()).join(&file_name),
            self.url_for(name.kind, &file_name),
        )
    }

    /// Path component of `public_base`, so both absolute and path-only
    /// URLs resolve.
    fn public_path(&self) -> &str {
        match self.public_base.split_once("://") {
            Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or(""),
            None => &self.public_base,
        }
    }

    /// Map a stored URL back to its file. Fails for URLs outside the store.
    pub fn resolve(&self, url: &str) -> StorageResult<PathBuf> {
        let url = url.split(['?', '#']).next().unwrap_or(url);
        let relative = url
            .strip_prefix(self.public_base.as_str())
            .or_else(|| {
                let path = self.public_path();
                (!path.is_empty()).then(|| url.strip_prefix(path)).flatten()
            })
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| StorageError::unsupported(url))?;

        let relative = Path::new(relative);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || relative.as_os_str().is_empty() {
            return Err(StorageError::InvalidPath(relative.display().to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Local file for any input URL: stored assets resolve in place, `data:`
    /// and remote URLs are written into `scratch_dir`.
    pub async fn materialize(&self, url: &str, scratch_dir: &Path) -> StorageResult<PathBuf> {
        if let Ok(path) = self.resolve(url) {
            if tokio::fs::try_exists(&path).await? {
                return Ok(path);
            }
            return Err(StorageError::not_found(url));
        }

        let (mime, bytes) = if let Some(decoded) = decode_data_url(url) {
            decoded
        } else if is_remote(url) {
            self.download(url, "application/octet-stream").await?
        } else {
            return Err(StorageError::unsupported(url));
        };

        tokio::fs::create_dir_all(scratch_dir).await?;
        let ext = extension_from_url(url).unwrap_or_else(|| AssetKind::Video.extension_for_mime(&mime));
        let path = scratch_dir.join(format!("input-{}.{ext}", Uuid::new_v4().simple()));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    async fn download(&self, url: &str, fallback_mime: &str) -> StorageResult<(String, Vec<u8>)> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::download_failed(format!("{url} returned {status}")));
        }
        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty() && v != "application/octet-stream")
            .unwrap_or_else(|| fallback_mime.to_string());
        let bytes = response.bytes().await?;
        Ok((mime, bytes.to_vec()))
    }

    async fn write_asset(&self, name: &AssetName, data: &[u8], mime: &str) -> StorageResult<String> {
        let ext = name.kind.extension_for_mime(mime);
        let (path, url) = self.output(name, ext);
        write_atomic(&path, data).await?;
        debug!(path = %path.display(), bytes = data.len(), "Stored asset");
        metrics::counter!("bcast_assets_stored_total", "kind" => name.kind.as_str()).increment(1);
        Ok(url)
    }

    /// Earlier download of `source` into `name`, if its file is still there.
    async fn remembered(&self, source: &str, name: &AssetName) -> StorageResult<Option<String>> {
        let key = (source.to_string(), name.stem());
        let Some(url) = self.stored.lock().ok().and_then(|map| map.get(&key)) else {
            return Ok(None);
        };
        let present = match self.resolve(&url) {
            Ok(path) => tokio::fs::try_exists(&path).await?,
            Err(_) => false,
        };
        if present {
            return Ok(Some(url));
        }
        debug!(source, stored = %url, "Remembered asset is gone");
        if let Ok(mut map) = self.stored.lock() {
            map.remove(&key);
        }
        Ok(None)
    }

    fn remember(&self, source: &str, name: &AssetName, url: &str) {
        if let Ok(mut map) = self.stored.lock() {
            map.insert((source.to_string(), name.stem()), url.to_string());
        }
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn store(&self, asset: AssetRef, name: &AssetName) -> StorageResult<String> {
        match asset.decode_inline() {
            AssetRef::Bytes { data, mime } => self.write_asset(name, &data, &mime).await,
            AssetRef::Url(url) => {
                if let Ok(path) = self.resolve(&url) {
                    if tokio::fs::try_exists(&path).await? {
                        return Ok(url);
                    }
                }
                if !is_remote(&url) {
                    return Err(StorageError::unsupported(&url));
                }
                if let Some(stored) = self.remembered(&url, name).await? {
                    debug!(source = %url, stored = %stored, "Asset already stored");
                    return Ok(stored);
                }

                let (mime, bytes) = self.download(&url, name.kind.default_mime()).await?;
                let stored = self.write_asset(name, &bytes, &mime).await?;
                info!(kind = %name.kind, url = %stored, "Downloaded asset into storage");
                self.remember(&url, name, &stored);
                Ok(stored)
            }
        }
    }
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn extension_from_url(url: &str) -> Option<&'static str> {
    if url.starts_with("data:") {
        return None;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "mp4" => Some("mp4"),
        "mov" => Some("mov"),
        "webm" => Some("webm"),
        "wav" => Some("wav"),
        "mp3" => Some("mp3"),
        "png" => Some("png"),
        "jpg" | "jpeg" => Some("jpg"),
        "webp" => Some("webp"),
        _ => None,
    }
}

/// MIME type for a stored file, by extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Write to a sibling temp file, then rename over the target.
pub async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, data).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
