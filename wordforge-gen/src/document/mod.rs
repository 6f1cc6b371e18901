//! Document assembly
//!
//! Markdown structure analysis, image slot placement, and conversion to a
//! word-processor document through an external pandoc binary.

pub mod renderer;
pub mod structure;

pub use renderer::{
    list_documents, DocumentEntry, DocumentRenderer, PandocRenderer, PlacedImage, RenderError,
};
pub use structure::{compute_image_slots, extract_paragraphs, Paragraph};
