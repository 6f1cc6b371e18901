//! Visual blueprint for image prompt construction
//!
//! The text model is asked once per article for a structured visual plan
//! (subject, scene, mood, ...). The blueprint plus a template preset yields
//! the positive/negative prompt pair used by generative image sources, and a
//! search keyword for the stock-photo sources.

use serde::{Deserialize, Serialize};

/// Structured visual plan produced by the text model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualBlueprint {
    pub template: String,
    pub subject: String,
    pub scene: String,
    pub mood: String,
    pub style: String,
    pub lighting: String,
    pub composition: String,
    pub details: String,
    pub negative: String,
}

/// Prompt preset keyed by blueprint template.
pub struct TemplatePreset {
    pub positive_prefix: &'static str,
    pub positive_suffix: &'static str,
    pub negative: &'static str,
}

const TEMPLATE_NAMES: &[&str] = &[
    "portrait",
    "urban_story",
    "technology",
    "nature",
    "editorial",
    "abstract",
];

pub fn preset_for(template: &str) -> TemplatePreset {
    match template {
        "portrait" => TemplatePreset {
            positive_prefix: "professional portrait photography",
            positive_suffix: "85mm lens, shallow depth of field, high detail",
            negative: "lowres, blurry, deformed face, watermark",
        },
        "urban_story" => TemplatePreset {
            positive_prefix: "cinematic street photography",
            positive_suffix: "dynamic angle, rich urban texture, photorealistic",
            negative: "lowres, blurry, distorted, watermark",
        },
        "technology" => TemplatePreset {
            positive_prefix: "sleek technology concept art",
            positive_suffix: "clean lines, futuristic atmosphere, ultra detailed",
            negative: "lowres, blurry, cluttered, watermark, text",
        },
        "nature" => TemplatePreset {
            positive_prefix: "breathtaking nature photography",
            positive_suffix: "golden hour, wide dynamic range, national geographic style",
            negative: "lowres, blurry, oversaturated, watermark",
        },
        "abstract" => TemplatePreset {
            positive_prefix: "elegant abstract illustration",
            positive_suffix: "harmonious palette, flowing shapes, high resolution",
            negative: "lowres, muddy colors, watermark, text",
        },
        // "editorial" and anything unrecognized
        _ => TemplatePreset {
            positive_prefix: "editorial magazine illustration",
            positive_suffix: "balanced composition, cinematic lighting, highly detailed",
            negative: "lowres, blurry, distorted, watermark",
        },
    }
}

/// Clamp an arbitrary template string to a known preset name.
pub fn normalize_template(template: &str) -> String {
    if TEMPLATE_NAMES.contains(&template) {
        template.to_string()
    } else {
        "editorial".to_string()
    }
}

/// Positive/negative prompt pair assembled from a blueprint.
#[derive(Debug, Clone)]
pub struct VisualPrompts {
    pub positive: String,
    pub negative: String,
}

impl VisualPrompts {
    pub fn from_blueprint(bp: &VisualBlueprint) -> Self {
        let preset = preset_for(&bp.template);
        let parts = [
            preset.positive_prefix,
            &bp.subject,
            &bp.scene,
            &bp.composition,
            &bp.details,
            &bp.style,
            &bp.mood,
            &bp.lighting,
            preset.positive_suffix,
        ];
        let positive = parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        let negative_parts = [preset.negative, &bp.negative];
        let negative = negative_parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        Self { positive, negative }
    }
}

/// Derive a stock-photo search keyword from the blueprint subject.
///
/// Takes the first few words of the subject, lowercased and stripped of
/// punctuation, so "A lone astronaut, drifting" becomes "a lone astronaut".
pub fn derive_keyword(bp: &VisualBlueprint) -> String {
    bp.subject
        .split_whitespace()
        .take(3)
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blueprint() -> VisualBlueprint {
        VisualBlueprint {
            template: "nature".to_string(),
            subject: "Misty mountain ridge".to_string(),
            scene: "dawn over a pine valley".to_string(),
            mood: "serene".to_string(),
            style: "photorealistic".to_string(),
            lighting: "soft morning light".to_string(),
            composition: "rule of thirds".to_string(),
            details: "drifting fog layers".to_string(),
            negative: "people, buildings".to_string(),
        }
    }

    #[test]
    fn prompts_join_nonempty_fields() {
        let prompts = VisualPrompts::from_blueprint(&blueprint());
        assert!(prompts.positive.starts_with("breathtaking nature photography"));
        assert!(prompts.positive.contains("Misty mountain ridge"));
        assert!(prompts.negative.contains("people, buildings"));
        assert!(prompts.negative.contains("watermark"));
    }

    #[test]
    fn empty_fields_do_not_leave_double_commas() {
        let mut bp = blueprint();
        bp.scene = String::new();
        bp.details = "  ".to_string();
        let prompts = VisualPrompts::from_blueprint(&bp);
        assert!(!prompts.positive.contains(", ,"));
    }

    #[test]
    fn unknown_template_falls_back_to_editorial() {
        assert_eq!(normalize_template("cyberpunk"), "editorial");
        assert_eq!(normalize_template("portrait"), "portrait");
    }

    #[test]
    fn keyword_is_lowercased_prefix_of_subject() {
        assert_eq!(derive_keyword(&blueprint()), "misty mountain ridge");
        let mut bp = blueprint();
        bp.subject = "A, lone! astronaut drifting far".to_string();
        assert_eq!(derive_keyword(&bp), "a lone astronaut");
    }
}
