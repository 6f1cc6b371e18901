//! Single-article generation pipeline
//!
//! One worker invocation takes a topic to a rendered document: article text,
//! image slot layout, per-slot image resolution through the provider chain,
//! then conversion. Only the text API and the renderer can fail the topic;
//! every image problem degrades to a document with fewer images.

use crate::document::structure::{compute_image_slots, extract_paragraphs};
use crate::document::{DocumentRenderer, PlacedImage};
use crate::providers::{CandidatePool, FallbackResolver, ImageRequest};
use crate::services::blueprint::{derive_keyword, VisualPrompts};
use crate::services::text_generator::{extract_title, TextGenerator};
use crate::tasks::{GenerateError, ImageInfo, TopicResult};
use std::sync::Arc;

const PRESET_SOURCE: &str = "user_uploaded";
const FALLBACK_NEGATIVE: &str = "lowres, blurry, watermark";

pub struct ArticleWorker {
    text: Arc<dyn TextGenerator>,
    renderer: Arc<dyn DocumentRenderer>,
    resolver: FallbackResolver,
    image_count: usize,
    images_enabled: bool,
}

impl ArticleWorker {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        renderer: Arc<dyn DocumentRenderer>,
        resolver: FallbackResolver,
        image_count: usize,
        images_enabled: bool,
    ) -> Self {
        Self {
            text,
            renderer,
            resolver,
            image_count,
            images_enabled,
        }
    }

    /// Generate one document. `preset_images` are caller-supplied local
    /// paths that fill the leading image slots without touching the chain.
    pub async fn generate(
        &self,
        topic: &str,
        preset_images: &[String],
    ) -> Result<TopicResult, GenerateError> {
        tracing::info!(topic = %topic, "Generating article");
        let article = self.text.generate_article(topic).await?;
        let title = extract_title(&article.markdown, topic);
        tracing::info!(topic = %topic, title = %title, "Article text ready");

        let paragraphs = extract_paragraphs(&article.markdown);
        let target = if self.images_enabled { self.image_count } else { 0 };
        let slots = compute_image_slots(paragraphs.len(), target);

        let mut placed: Vec<PlacedImage> = Vec::new();
        let mut images: Vec<ImageInfo> = Vec::new();
        let mut pool = CandidatePool::new();

        for (ordinal, preset) in preset_images.iter().take(slots.len()).enumerate() {
            pool.mark_consumed(preset);
            placed.push(PlacedImage {
                path: preset.clone(),
                paragraph_index: slots[ordinal],
            });
            images.push(ImageInfo {
                source: PRESET_SOURCE.to_string(),
                path: preset.clone(),
                summary: "caller-supplied image".to_string(),
                paragraph_index: slots[ordinal],
                order: ordinal,
            });
        }

        let start = preset_images.len().min(slots.len());
        if start < slots.len() && !self.resolver.is_empty() {
            let (prompts, keyword) = self.visual_plan(topic, &article.markdown).await;

            for (ordinal, slot) in slots.iter().enumerate().skip(start) {
                let prompt = self
                    .slot_prompt(ordinal, *slot, &paragraphs, topic, &prompts)
                    .await;
                let request = ImageRequest {
                    ordinal,
                    paragraph_index: *slot,
                    prompt: prompt.clone(),
                    negative_prompt: prompts.negative.clone(),
                    keyword: keyword.clone(),
                };
                match self.resolver.resolve(&request, &mut pool).await {
                    Some(image) => {
                        images.push(ImageInfo {
                            source: image.source.as_str().to_string(),
                            path: image.path.clone(),
                            summary: prompt,
                            paragraph_index: *slot,
                            order: ordinal,
                        });
                        placed.push(PlacedImage {
                            path: image.path,
                            paragraph_index: *slot,
                        });
                    }
                    None => {
                        tracing::warn!(topic = %topic, ordinal, "Image slot left empty");
                    }
                }
            }
        }

        let filename = self.renderer.render(&title, &article.markdown, &placed).await?;
        tracing::info!(topic = %topic, filename = %filename, images = placed.len(), "Document ready");

        Ok(TopicResult {
            topic: topic.to_string(),
            article_title: title,
            filename,
            image_count: placed.len(),
            has_image: !placed.is_empty(),
            images,
        })
    }

    /// Build the prompt pair and search keyword, degrading to generic
    /// defaults when the blueprint call fails.
    async fn visual_plan(&self, topic: &str, markdown: &str) -> (VisualPrompts, String) {
        match self.text.visual_blueprint(topic, markdown).await {
            Ok(blueprint) => {
                let keyword = derive_keyword(&blueprint);
                (VisualPrompts::from_blueprint(&blueprint), keyword)
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Blueprint failed, using generic prompts");
                (
                    VisualPrompts {
                        positive: format!("visual representation of {topic}"),
                        negative: FALLBACK_NEGATIVE.to_string(),
                    },
                    String::new(),
                )
            }
        }
    }

    /// The showcase slot reuses the whole-topic prompt; later slots get a
    /// summary of their anchor paragraph.
    async fn slot_prompt(
        &self,
        ordinal: usize,
        slot: Option<usize>,
        paragraphs: &[crate::document::Paragraph],
        topic: &str,
        prompts: &VisualPrompts,
    ) -> String {
        if ordinal == 0 {
            return prompts.positive.clone();
        }
        if let Some(idx) = slot {
            if let Some(paragraph) = paragraphs.get(idx) {
                match self.text.summarize_paragraph(&paragraph.text, topic).await {
                    Ok(summary) => return summary,
                    Err(e) => {
                        tracing::debug!(topic = %topic, error = %e, "Paragraph summary failed");
                    }
                }
            }
        }
        format!("visual representation of {topic}")
    }
}
