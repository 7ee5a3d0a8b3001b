//! Segment prompt building.
//!
//! Every function here is pure: the character directory is passed in, and
//! identical inputs give identical requests.

use bcast_models::{LowerThird, Segment, SegmentKind};
use bcast_providers::{ImageRequest, SpeechRequest, VideoRequest};

use crate::characters::{expand_character_tags, CharacterDirectory};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

const DEFAULT_CAMERA: &str = "medium shot";
const UNNAMED_PRESENTER: &str = "A news presenter";
const DEFAULT_VOICE: &str = "female-reporter.wav";

/// Scene template picked from the segment id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentCategory {
    Studio,
    FieldReporter,
    Witness,
    Generic,
}

impl SegmentCategory {
    /// First matching substring wins: `studio`, `field_reporter`, `witness`.
    pub fn from_id(id: &str) -> Self {
        if id.contains("studio") {
            SegmentCategory::Studio
        } else if id.contains("field_reporter") {
            SegmentCategory::FieldReporter
        } else if id.contains("witness") {
            SegmentCategory::Witness
        } else {
            SegmentCategory::Generic
        }
    }

    fn scene(&self, mention: &str, camera: &str) -> String {
        match self {
            SegmentCategory::Studio => format!(
                "{mention} welcomes viewers to tonight's broadcast. He sits at an over the top local TV news studio desk, \
                 with extravagant city skyline miniature model in a cyclorama background behind him. \
                 There are blue and red lights lighting the background from different angles creating an interesting background effect. \
                 {mention} is well lit with studio lights and has minimal shadows on his face. \
                 He occasionally makes gestures with his hands while telling the top headline. \
                 He looks directly into the camera, addressing the viewer. The camera is static, with a slight zoom in."
            ),
            SegmentCategory::FieldReporter => format!(
                "{mention} is on the scene of a breaking news story. Outdoor location with natural lighting, {camera}, \
                 speaking confidently to camera with professional demeanor, holding microphone, \
                 professional field reporter setup, high definition"
            ),
            SegmentCategory::Witness => format!(
                "{mention} is being interviewed about the incident. Indoor interview setting with soft lighting, {camera}, \
                 speaking earnestly to off-camera interviewer, high definition"
            ),
            SegmentCategory::Generic => {
                format!("{mention} appears in frame, {camera}, professional video quality")
            }
        }
    }

    fn motion(&self) -> &'static str {
        match self {
            SegmentCategory::Studio => {
                "The news anchor speaks to camera, making subtle hand gestures, slight head movements, \
                 professional broadcast delivery, static camera with slight zoom in"
            }
            SegmentCategory::FieldReporter => {
                "Field reporter speaks confidently to camera, slight body movement, \
                 professional reporting stance, outdoor lighting"
            }
            SegmentCategory::Witness => {
                "Person speaks earnestly during interview, natural conversational movements, soft indoor lighting"
            }
            SegmentCategory::Generic => {
                "Person speaks to camera, natural movements, professional video quality"
            }
        }
    }
}

/// Tag when the character is known, else the plain name.
fn character_mention(segment: &Segment, characters: &dyn CharacterDirectory) -> String {
    let Some(name) = segment.character.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
        return UNNAMED_PRESENTER.to_string();
    };
    characters
        .by_name(name)
        .map(|c| c.tag.clone())
        .unwrap_or_else(|| name.to_string())
}

/// Instruction that makes speech-in-video providers read `dialog` verbatim.
pub fn speak_instruction(dialog: &str) -> String {
    format!(
        " Include clearly spoken anchor audio reading this script verbatim with natural pacing and broadcast delivery: \"{dialog}\"."
    )
}

/// Video request for a segment's primary footage.
///
/// On-camera segments get a scene, a motion sentence and their dialog;
/// b-roll and narrated footage use the visual description as is.
pub fn build_video_request(
    segment: &Segment,
    config: &PipelineConfig,
    characters: &dyn CharacterDirectory,
) -> PipelineResult<VideoRequest> {
    let (prompt, seconds, reference_images) = match segment.kind {
        SegmentKind::OnCamera => {
            let category = SegmentCategory::from_id(&segment.id);
            let camera = segment
                .camera_description
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(DEFAULT_CAMERA);
            let scene = category.scene(&character_mention(segment, characters), camera);
            let expanded = expand_character_tags(&scene, characters);

            let mut references = Vec::new();
            if let Some(url) = segment
                .character
                .as_deref()
                .and_then(|name| characters.reference_image(name))
            {
                references.push(url.to_string());
            }
            for url in expanded.reference_images {
                if !references.contains(&url) {
                    references.push(url);
                }
            }

            let speak = segment.spoken_dialog().map(speak_instruction).unwrap_or_default();
            let prompt = format!(
                "{}. {}.{}",
                expanded.prompt.trim_end_matches('.'),
                category.motion(),
                speak
            );
            (prompt, config.on_camera.clamp(segment.duration), references)
        }
        SegmentKind::BRoll | SegmentKind::Voiceover => {
            let visual = segment
                .visual()
                .ok_or_else(|| PipelineError::missing(&segment.id, "visual description"))?;
            (visual.to_string(), config.b_roll.clamp(segment.duration), Vec::new())
        }
    };

    Ok(VideoRequest {
        prompt,
        model: config.video_model.clone(),
        seconds,
        size: config.video_size.clone(),
        reference_images,
    })
}

pub fn build_lower_third_request(lower_third: &LowerThird, config: &PipelineConfig) -> ImageRequest {
    ImageRequest {
        prompt: format!(
            "News lower third graphic: {} - {}",
            lower_third.header.trim(),
            lower_third.subheader.trim()
        ),
        reference_images: Vec::new(),
        aspect_ratio: config.lower_third_aspect_ratio.clone(),
        style_type: Some(config.lower_third_style.clone()).filter(|s| !s.is_empty()),
    }
}

/// Reference voice file for a character.
pub fn voice_file_for(character: Option<&str>) -> &'static str {
    match character.map(str::trim) {
        Some("Dana Kingsley") => "female-anchor.wav",
        Some("Ron Tate") => "male-anchor.wav",
        Some("Max Fields") => "male-reporter.wav",
        _ => DEFAULT_VOICE,
    }
}

/// Speech request for a narrated segment: the script, else its dialog.
pub fn build_speech_request(segment: &Segment, config: &PipelineConfig) -> PipelineResult<SpeechRequest> {
    let text = segment
        .script()
        .or_else(|| segment.spoken_dialog())
        .ok_or_else(|| PipelineError::missing(&segment.id, "voiceover script"))?;
    let voice = format!(
        "{}/{}",
        config.voice_base_url.trim_end_matches('/'),
        voice_file_for(segment.character.as_deref())
    );
    Ok(SpeechRequest::new(text).with_reference_audio(voice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characters::StaticCharacterDirectory;

    fn segment(id: &str, kind: SegmentKind) -> Segment {
        Segment {
            id: id.to_string(),
            kind,
            duration: 0.0,
            character: None,
            role: None,
            camera_description: None,
            dialog: None,
            visual_description: None,
            voiceover_script: None,
            lower_third: None,
        }
    }

    fn roster() -> StaticCharacterDirectory {
        let mut characters = StaticCharacterDirectory::default_roster().characters().to_vec();
        characters[0].image_url = Some("https://img.example/dana.png".into());
        StaticCharacterDirectory::new(characters)
    }

    #[test]
    fn test_category_from_id() {
        assert_eq!(SegmentCategory::from_id("studio_intro"), SegmentCategory::Studio);
        assert_eq!(SegmentCategory::from_id("field_reporter_1"), SegmentCategory::FieldReporter);
        assert_eq!(SegmentCategory::from_id("witness_interview"), SegmentCategory::Witness);
        assert_eq!(SegmentCategory::from_id("expert_take"), SegmentCategory::Generic);
        // studio takes precedence
        assert_eq!(SegmentCategory::from_id("studio_witness"), SegmentCategory::Studio);
    }

    #[test]
    fn test_studio_request_embeds_dialog_and_reference() {
        let mut seg = segment("studio_intro", SegmentKind::OnCamera);
        seg.character = Some("Dana Kingsley".into());
        seg.dialog = Some("  Good evening, pigeons have unionized.  ".into());
        seg.duration = 30.0;

        let req = build_video_request(&seg, &PipelineConfig::default(), &roster()).unwrap();

        assert!(req.prompt.starts_with("@anchor1 (Dana Kingsley) welcomes viewers"));
        assert!(req.prompt.contains("slight zoom in. The news anchor speaks to camera"));
        assert!(req.prompt.ends_with(
            "broadcast delivery: \"Good evening, pigeons have unionized.\"."
        ));
        assert_eq!(req.seconds, 12);
        assert_eq!(req.model, "sora-2");
        assert_eq!(req.size, "1280x720");
        assert_eq!(req.reference_images, vec!["https://img.example/dana.png"]);
    }

    #[test]
    fn test_unknown_character_uses_plain_name_without_reference() {
        let mut seg = segment("witness_interview", SegmentKind::OnCamera);
        seg.character = Some("Gus Pringle".into());
        seg.camera_description = Some("close-up".into());

        let req = build_video_request(&seg, &PipelineConfig::default(), &roster()).unwrap();

        assert!(req.prompt.starts_with("Gus Pringle is being interviewed"));
        assert!(req.prompt.contains("soft lighting, close-up, speaking earnestly"));
        assert!(!req.prompt.contains("Include clearly spoken"));
        assert!(req.reference_images.is_empty());
        assert_eq!(req.seconds, 10);
    }

    #[test]
    fn test_generic_request_is_deterministic() {
        let mut seg = segment("expert_take", SegmentKind::OnCamera);
        seg.character = Some("Ron Tate".into());
        let config = PipelineConfig::default();
        let a = build_video_request(&seg, &config, &roster()).unwrap();
        let b = build_video_request(&seg, &config, &roster()).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.prompt,
            "@anchor2 (Ron Tate) appears in frame, medium shot, professional video quality. \
             Person speaks to camera, natural movements, professional video quality."
        );
    }

    #[test]
    fn test_broll_uses_visual_and_b_roll_window() {
        let mut seg = segment("broll_1", SegmentKind::BRoll);
        seg.visual_description = Some("Pigeons on a picket line".into());
        seg.duration = 7.4;

        let req = build_video_request(&seg, &PipelineConfig::default(), &roster()).unwrap();
        assert_eq!(req.prompt, "Pigeons on a picket line");
        assert_eq!(req.seconds, 7);
        assert!(req.reference_images.is_empty());
    }

    #[test]
    fn test_broll_without_visual_is_missing_input() {
        let seg = segment("broll_2", SegmentKind::BRoll);
        let err = build_video_request(&seg, &PipelineConfig::default(), &roster()).unwrap_err();
        assert_eq!(err.to_string(), "Segment broll_2 is missing visual description");
    }

    #[test]
    fn test_lower_third_request() {
        let lt = LowerThird {
            header: "BREAKING".into(),
            subheader: "Pigeons strike downtown".into(),
        };
        let req = build_lower_third_request(&lt, &PipelineConfig::default());
        assert_eq!(req.prompt, "News lower third graphic: BREAKING - Pigeons strike downtown");
        assert_eq!(req.aspect_ratio, "16:9");
        assert_eq!(req.style_type.as_deref(), Some("design"));
    }

    #[test]
    fn test_speech_request_voice_mapping() {
        let config = PipelineConfig::default();
        let mut seg = segment("vo_1", SegmentKind::Voiceover);
        seg.voiceover_script = Some("Back to you.".into());
        seg.character = Some("Max Fields".into());

        let req = build_speech_request(&seg, &config).unwrap();
        assert_eq!(req.text, "Back to you.");
        assert_eq!(
            req.reference_audio.as_deref(),
            Some("http://localhost:8080/audio/male-reporter.wav")
        );

        seg.character = None;
        seg.voiceover_script = None;
        seg.dialog = Some("Dialog fallback".into());
        let req = build_speech_request(&seg, &config).unwrap();
        assert_eq!(req.text, "Dialog fallback");
        assert!(req.reference_audio.unwrap().ends_with("/female-reporter.wav"));

        seg.dialog = None;
        assert!(build_speech_request(&seg, &config).is_err());
    }
}
