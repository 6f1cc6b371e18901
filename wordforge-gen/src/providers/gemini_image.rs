//! Gemini generative image source
//!
//! Posts a `generateContent` request whose reply may carry the image either
//! as an `inlineData` part or as a base64 data URI inside a text part;
//! both shapes occur in the wild depending on the proxy in front of the
//! API. The decoded bytes land in the uploads directory as a `temp_` file
//! so render cleanup removes them.

use crate::providers::{Attempt, ImageProvider, ImageRequest, ProviderKind, ResolvedImage, SourceId};
use async_trait::async_trait;
use base64::Engine;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;
use wordforge_common::config::GeminiImageSettings;

pub struct GeminiImageProvider {
    client: reqwest::Client,
    settings: GeminiImageSettings,
    uploads_dir: PathBuf,
}

/// Prompt hints matched to the supported aspect ratios, used when the
/// endpoint rejects the `imageConfig` parameter.
fn aspect_ratio_hint(ratio: &str) -> Option<&'static str> {
    match ratio {
        "21:9" => Some("ultra-widescreen composition, 21:9 aspect ratio, cinematic panorama"),
        "16:9" => Some("widescreen composition, 16:9 aspect ratio, cinematic"),
        "4:3" => Some("standard horizontal composition, 4:3 aspect ratio"),
        "3:2" => Some("classic camera composition, 3:2 aspect ratio, landscape"),
        "1:1" => Some("square composition, 1:1 aspect ratio, balanced"),
        "9:16" => Some("vertical composition, 9:16 aspect ratio, portrait orientation"),
        "3:4" => Some("standard vertical composition, 3:4 aspect ratio"),
        "2:3" => Some("classic camera composition, 2:3 aspect ratio, portrait"),
        "5:4" => Some("flexible horizontal composition, 5:4 aspect ratio"),
        "4:5" => Some("flexible vertical composition, 4:5 aspect ratio"),
        _ => None,
    }
}

fn style_wrapping(style: &str) -> (&'static str, &'static str) {
    match style {
        "illustration" => (
            "Beautiful illustration art, detailed artwork, artistic style",
            "digital painting, vibrant colors, high quality, no text or letters",
        ),
        "anime" => (
            "Anime style artwork, detailed anime art, Japanese animation style",
            "vibrant colors, clean lines, high quality anime, no text or words",
        ),
        "cyberpunk" => (
            "Cyberpunk style, neon lights, futuristic cityscape, high-tech atmosphere",
            "dramatic lighting, neon colors, dystopian future, 8k, no text or signs",
        ),
        "business" => (
            "Professional business illustration, clean design, corporate style",
            "modern aesthetic, professional quality, no text or words",
        ),
        "watercolor" => (
            "Watercolor painting style, soft colors, artistic brushstrokes",
            "delicate details, flowing colors, artistic quality, no text or letters",
        ),
        "minimalist" => (
            "Minimalist design, clean composition, simple shapes",
            "modern aesthetics, negative space, elegant simplicity, no text or words",
        ),
        "fantasy" => (
            "Fantasy art, magical atmosphere, imaginative scene",
            "epic scale, mystical lighting, highly detailed, cinematic, no text or words",
        ),
        // "realistic" and anything unrecognized
        _ => (
            "Highly detailed realistic photography, natural lighting, sharp focus",
            "photorealistic, 8k resolution, high quality, no text or words",
        ),
    }
}

impl GeminiImageProvider {
    pub fn new(settings: GeminiImageSettings, uploads_dir: PathBuf) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            settings,
            uploads_dir,
        }
    }

    fn styled_prompt(&self, prompt: &str) -> String {
        let (prefix, suffix) = style_wrapping(&self.settings.style);
        let mut parts = vec![prefix, suffix];
        let hint = aspect_ratio_hint(&self.settings.aspect_ratio);
        if let Some(hint) = hint {
            parts.push(hint);
        }
        parts.push(prompt);
        parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    async fn request_image(&self, prompt: &str) -> Result<Vec<u8>, String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model,
            self.settings.api_key
        );

        let mut generation_config = json!({
            "temperature": 0.4,
            "topK": 32,
            "topP": 1,
            "maxOutputTokens": 4096,
        });
        if aspect_ratio_hint(&self.settings.aspect_ratio).is_some() {
            generation_config["imageConfig"] = json!({ "aspectRatio": self.settings.aspect_ratio });
        }
        let body = json!({
            "contents": [{ "parts": [{ "text": format!("Generate an image: {prompt}") }] }],
            "generationConfig": generation_config,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(300).collect();
            return Err(format!("HTTP {status}: {body}"));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("malformed response: {e}"))?;
        extract_image_bytes(&value).ok_or_else(|| "no image data in response".to_string())
    }
}

#[async_trait]
impl ImageProvider for GeminiImageProvider {
    fn id(&self) -> SourceId {
        SourceId::GeminiImage
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Generative
    }

    async fn generate(&self, request: &ImageRequest) -> Attempt {
        let prompt = self.styled_prompt(&request.prompt);
        tracing::debug!(model = %self.settings.model, ordinal = request.ordinal, "Requesting generated image");

        let bytes = match self.request_image(&prompt).await {
            Ok(bytes) => bytes,
            Err(e) => return Attempt::Failed(e),
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.uploads_dir).await {
            return Attempt::Failed(format!("uploads dir unavailable: {e}"));
        }
        let path = self
            .uploads_dir
            .join(format!("temp_{}.png", Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            return Attempt::Failed(format!("image write failed: {e}"));
        }

        Attempt::Fetched(ResolvedImage {
            path: path.to_string_lossy().into_owned(),
            source: SourceId::GeminiImage,
        })
    }
}

/// Pull base64 image bytes out of a `generateContent` reply.
fn extract_image_bytes(value: &serde_json::Value) -> Option<Vec<u8>> {
    let parts = value
        .get("candidates")?
        .as_array()?
        .iter()
        .filter_map(|c| c.get("content")?.get("parts")?.as_array())
        .flatten();

    for part in parts {
        if let Some(data) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(|d| d.get("data"))
            .and_then(|d| d.as_str())
        {
            if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(data) {
                return Some(bytes);
            }
        }
        if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
            if let Some(bytes) = decode_data_uri(text) {
                return Some(bytes);
            }
        }
    }
    None
}

/// Decode the first `data:image/...;base64,` payload embedded in text.
fn decode_data_uri(text: &str) -> Option<Vec<u8>> {
    let start = text.find("data:image/")?;
    let after = &text[start..];
    let b64_start = after.find("base64,")? + "base64,".len();
    let payload = &after[b64_start..];
    let end = payload
        .find(|c: char| c == ')' || c == '"' || c.is_whitespace())
        .unwrap_or(payload.len());
    base64::engine::general_purpose::STANDARD
        .decode(&payload[..end])
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_inline_data_part() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"img-bytes");
        let value = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "here you go" },
                    { "inlineData": { "mimeType": "image/png", "data": encoded } }
                ]}
            }]
        });
        assert_eq!(extract_image_bytes(&value).unwrap(), b"img-bytes");
    }

    #[test]
    fn extracts_markdown_data_uri() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"px");
        let text = format!("![image](data:image/png;base64,{encoded})");
        let value = json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        });
        assert_eq!(extract_image_bytes(&value).unwrap(), b"px");
    }

    #[test]
    fn text_only_reply_yields_nothing() {
        let value = json!({
            "candidates": [{ "content": { "parts": [{ "text": "I cannot draw that" }] } }]
        });
        assert!(extract_image_bytes(&value).is_none());
    }

    #[test]
    fn styled_prompt_places_summary_last() {
        let provider = GeminiImageProvider::new(
            GeminiImageSettings::default(),
            PathBuf::from("uploads"),
        );
        let styled = provider.styled_prompt("a red bridge at dawn");
        assert!(styled.starts_with("Highly detailed realistic photography"));
        assert!(styled.ends_with("a red bridge at dawn"));
        assert!(styled.contains("16:9"));
    }
}
