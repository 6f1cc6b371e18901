//! Text-generation collaborator
//!
//! Wraps a Gemini-style `generateContent` endpoint. All calls carry the
//! client timeout; a non-2xx status or a body without candidates surfaces as
//! [`UpstreamError`], which is fatal for the topic's current attempt.

use crate::services::blueprint::{normalize_template, VisualBlueprint};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use wordforge_common::config::TextSettings;

const USER_AGENT: &str = concat!("WordForge/", env!("CARGO_PKG_VERSION"));

/// Text collaborator errors
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("text API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("text API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed text API response: {0}")]
    Malformed(String),
}

/// One generated article.
#[derive(Debug, Clone)]
pub struct Article {
    pub markdown: String,
    /// External links referenced by the article body.
    pub citations: Vec<String>,
}

/// Text-generation collaborator contract.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate the full article body for a topic.
    async fn generate_article(&self, topic: &str) -> Result<Article, UpstreamError>;

    /// Produce a structured visual plan for the article.
    async fn visual_blueprint(
        &self,
        topic: &str,
        article: &str,
    ) -> Result<VisualBlueprint, UpstreamError>;

    /// Summarize one paragraph into a short visual description for image
    /// prompting. Callers degrade to a text snippet on failure.
    async fn summarize_paragraph(
        &self,
        paragraph: &str,
        topic: &str,
    ) -> Result<String, UpstreamError>;
}

const DEFAULT_ARTICLE_TEMPLATE: &str = "\
Write a detailed article about the following topic:

{topic}

Requirements:
1. The first line must be the article title marked with # (Markdown).
2. Structure the article with ## section headings.
3. The content should be substantial and well researched, 800-1200 words.
4. Use fluent, natural language.
5. Markdown formatting (#, ##, **) is allowed for structure.

Start writing the article directly, without any preamble.";

/// Gemini `generateContent` client.
pub struct GeminiTextGenerator {
    client: reqwest::Client,
    settings: TextSettings,
}

impl GeminiTextGenerator {
    pub fn new(settings: TextSettings) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, settings }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.settings.base_url.trim_end_matches('/'),
            model,
            self.settings.api_key
        )
    }

    /// POST one prompt and extract the first candidate's text.
    async fn generate_text(
        &self,
        model: &str,
        prompt: String,
        with_generation_config: bool,
    ) -> Result<String, UpstreamError> {
        let mut body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        if with_generation_config {
            body["generationConfig"] = json!({
                "temperature": self.settings.temperature,
                "topP": self.settings.top_p,
            });
        }

        let response = self
            .client
            .post(self.endpoint(model))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;
        parsed
            .first_text()
            .ok_or_else(|| UpstreamError::Malformed("no candidate text in response".to_string()))
    }
}

#[async_trait]
impl TextGenerator for GeminiTextGenerator {
    async fn generate_article(&self, topic: &str) -> Result<Article, UpstreamError> {
        let template = if self.settings.prompt_template.is_empty() {
            DEFAULT_ARTICLE_TEMPLATE
        } else {
            &self.settings.prompt_template
        };
        let prompt = template.replace("{topic}", topic);

        tracing::debug!(
            model = %self.settings.model,
            temperature = self.settings.temperature,
            top_p = self.settings.top_p,
            "Requesting article generation"
        );

        let markdown = self
            .generate_text(&self.settings.model, prompt, true)
            .await?;
        let citations = extract_citations(&markdown);
        Ok(Article { markdown, citations })
    }

    async fn visual_blueprint(
        &self,
        topic: &str,
        article: &str,
    ) -> Result<VisualBlueprint, UpstreamError> {
        let excerpt = truncate(article, 2000);
        let prompt = format!(
            "You are a senior visual director. Read the following article and \
             produce a visual plan for an image generation pipeline.\n\
             Title: {topic}\nBody excerpt: {excerpt}\n\n\
             Reply with exactly this JSON structure, all values as English \
             phrases of 4-15 words:\n\
             {{\n  \"template\": \"portrait|urban_story|technology|nature|editorial|abstract\",\n\
             \x20 \"subject\": \"...\",\n  \"scene\": \"...\",\n  \"mood\": \"...\",\n\
             \x20 \"style\": \"...\",\n  \"lighting\": \"...\",\n  \"composition\": \"...\",\n\
             \x20 \"details\": \"...\",\n  \"negative\": \"...\"\n}}\n\n\
             Output only the JSON, no explanation or Markdown fences."
        );

        let raw = self
            .generate_text(&self.settings.model, prompt, false)
            .await?;
        let value = parse_json_block(&raw)
            .ok_or_else(|| UpstreamError::Malformed("blueprint reply is not JSON".to_string()))?;

        let field = |key: &str, fallback: String| -> String {
            match value.get(key).and_then(|v| v.as_str()) {
                Some(s) if !s.trim().is_empty() => s.trim().to_string(),
                _ => fallback,
            }
        };

        Ok(VisualBlueprint {
            template: normalize_template(
                value
                    .get("template")
                    .and_then(|v| v.as_str())
                    .unwrap_or("editorial"),
            ),
            subject: field("subject", topic.to_string()),
            scene: field("scene", format!("story about {topic}")),
            mood: field("mood", "dramatic and inspiring".to_string()),
            style: field("style", "cinematic, highly detailed".to_string()),
            lighting: field("lighting", "soft cinematic lighting".to_string()),
            composition: field("composition", "balanced composition".to_string()),
            details: field("details", "intricate storytelling details".to_string()),
            negative: field(
                "negative",
                "lowres, blurry, distorted, watermark".to_string(),
            ),
        })
    }

    async fn summarize_paragraph(
        &self,
        paragraph: &str,
        topic: &str,
    ) -> Result<String, UpstreamError> {
        let excerpt = truncate(paragraph, 500);
        let prompt = format!(
            "Read this paragraph from an article about \"{topic}\" and write one \
             short visual description (10-25 words) suitable as an image \
             generation prompt. Describe concrete visible things: objects, \
             people, places, action, light. Never describe items that carry \
             text (books, posters, signs, screens, charts). Output only the \
             description, no quotes or commentary.\n\nParagraph:\n{excerpt}"
        );

        let summary = self
            .generate_text(self.settings.summary_model(), prompt, false)
            .await?;
        let summary = summary
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string();
        // Belt and braces: the image models love sneaking text into charts.
        Ok(format!("{summary}, pure visual scene, no text or symbols"))
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn first_text(&self) -> Option<String> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|p| p.text.clone())
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Extract the article title: first `#` heading, else first non-empty line.
pub fn extract_title(markdown: &str, fallback: &str) -> String {
    for line in markdown.lines() {
        let trimmed = line.trim();
        if let Some(title) = trimmed.strip_prefix('#') {
            let title = title.trim_start_matches('#').trim();
            if !title.is_empty() {
                return title.to_string();
            }
        }
    }
    markdown
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Collect external links referenced in the markdown body.
pub fn extract_citations(markdown: &str) -> Vec<String> {
    let mut citations = Vec::new();
    let mut remainder = markdown;
    while let Some(idx) = remainder.find("](http") {
        let after = &remainder[idx + 2..];
        if let Some(end) = after.find(')') {
            let url = after[..end].trim();
            if !url.is_empty() && !citations.iter().any(|c| c == url) {
                citations.push(url.to_string());
            }
            remainder = &after[end..];
        } else {
            break;
        }
    }
    citations
}

/// Pull the first JSON object out of a model reply, tolerating code fences
/// and surrounding prose.
pub fn parse_json_block(raw: &str) -> Option<serde_json::Value> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}
