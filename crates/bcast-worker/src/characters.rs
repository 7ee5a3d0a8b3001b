//! Read-only character directory and `@tag` expansion.

use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\w+").unwrap());

/// A recurring on-air persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub id: String,
    pub name: String,
    /// Prompt handle including the `@`, e.g. `@anchor1`.
    pub tag: String,
    #[serde(default)]
    pub role: Option<String>,
    /// Identity reference for image-to-video providers.
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Lookup of characters by name and by tag. Injected into prompt building.
pub trait CharacterDirectory: Send + Sync {
    fn by_name(&self, name: &str) -> Option<&CharacterProfile>;

    fn by_tag(&self, tag: &str) -> Option<&CharacterProfile>;

    fn reference_image(&self, name: &str) -> Option<&str> {
        self.by_name(name).and_then(|c| c.image_url.as_deref())
    }
}

/// Fixed in-memory roster.
#[derive(Debug, Clone, Default)]
pub struct StaticCharacterDirectory {
    characters: Vec<CharacterProfile>,
}

impl StaticCharacterDirectory {
    pub fn new(characters: Vec<CharacterProfile>) -> Self {
        Self { characters }
    }

    /// The station's regular cast, without reference images.
    pub fn default_roster() -> Self {
        let profile = |id: &str, name: &str, tag: &str, role: &str| CharacterProfile {
            id: id.to_string(),
            name: name.to_string(),
            tag: tag.to_string(),
            role: Some(role.to_string()),
            image_url: None,
        };
        Self::new(vec![
            profile("anchor1", "Dana Kingsley", "@anchor1", "Lead News Anchor"),
            profile("anchor2", "Ron Tate", "@anchor2", "Co-Anchor"),
            profile("reporter", "Max Fields", "@reporter", "Field Reporter"),
        ])
    }

    /// Load a JSON array of [`CharacterProfile`].
    pub fn from_json_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let characters: Vec<CharacterProfile> = serde_json::from_slice(&bytes).map_err(|e| {
            PipelineError::config_error(format!("invalid character file {}: {e}", path.display()))
        })?;
        debug!(count = characters.len(), path = %path.display(), "Loaded character roster");
        Ok(Self::new(characters))
    }

    pub fn characters(&self) -> &[CharacterProfile] {
        &self.characters
    }
}

impl CharacterDirectory for StaticCharacterDirectory {
    fn by_name(&self, name: &str) -> Option<&CharacterProfile> {
        let name = name.trim();
        self.characters
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn by_tag(&self, tag: &str) -> Option<&CharacterProfile> {
        self.characters.iter().find(|c| c.tag == tag)
    }
}

/// Prompt with tags annotated and the identity references they pulled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedPrompt {
    pub prompt: String,
    /// Distinct reference images in first-mention order.
    pub reference_images: Vec<String>,
}

/// Rewrite every known `@tag` as `@tag (Name)` and collect reference images.
///
/// Unknown tags are left as written.
pub fn expand_character_tags(prompt: &str, directory: &dyn CharacterDirectory) -> ExpandedPrompt {
    let mut reference_images: Vec<String> = Vec::new();
    let expanded = TAG_PATTERN.replace_all(prompt, |caps: &Captures| {
        let tag = &caps[0];
        match directory.by_tag(tag) {
            Some(character) => {
                match character.image_url.as_deref() {
                    Some(url) if !reference_images.iter().any(|u| u == url) => {
                        reference_images.push(url.to_string());
                    }
                    Some(_) => {}
                    None => warn!(tag, name = %character.name, "No reference image for character"),
                }
                format!("{tag} ({})", character.name)
            }
            None => {
                debug!(tag, "Unknown character tag");
                tag.to_string()
            }
        }
    });

    ExpandedPrompt {
        prompt: expanded.into_owned(),
        reference_images,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> StaticCharacterDirectory {
        let mut dir = StaticCharacterDirectory::default_roster();
        dir.characters[0].image_url = Some("https://img.example/dana.png".into());
        dir.characters[2].image_url = Some("https://img.example/max.png".into());
        dir
    }

    #[test]
    fn test_expands_known_tags_once_each() {
        let out = expand_character_tags(
            "@anchor1 hands over to @reporter, then @anchor1 nods at @intern.",
            &roster(),
        );
        assert_eq!(
            out.prompt,
            "@anchor1 (Dana Kingsley) hands over to @reporter (Max Fields), then @anchor1 (Dana Kingsley) nods at @intern."
        );
        assert_eq!(
            out.reference_images,
            vec!["https://img.example/dana.png", "https://img.example/max.png"]
        );
    }

    #[test]
    fn test_character_without_image_adds_no_reference() {
        let out = expand_character_tags("@anchor2 reads the weather", &roster());
        assert_eq!(out.prompt, "@anchor2 (Ron Tate) reads the weather");
        assert!(out.reference_images.is_empty());
    }

    #[test]
    fn test_lookup_by_name_is_case_insensitive() {
        let dir = roster();
        assert_eq!(dir.by_name("dana kingsley").map(|c| c.tag.as_str()), Some("@anchor1"));
        assert_eq!(dir.reference_image("Max Fields"), Some("https://img.example/max.png"));
        assert!(dir.reference_image("Nobody").is_none());
    }

    #[test]
    fn test_from_json_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"[{"id":"w","name":"Gus","tag":"@gus","image_url":"https://img.example/gus.png"}]"#,
        )
        .unwrap();
        let dir = StaticCharacterDirectory::from_json_file(file.path()).unwrap();
        assert_eq!(dir.by_tag("@gus").map(|c| c.name.as_str()), Some("Gus"));
        assert!(dir.by_tag("@gus").unwrap().role.is_none());
    }
}
