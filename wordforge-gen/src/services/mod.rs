//! Collaborator clients for external services
//!
//! Each client wraps one third-party API behind a trait so the task engine
//! can be exercised against mocks.

pub mod blueprint;
pub mod text_generator;

pub use blueprint::{derive_keyword, VisualBlueprint, VisualPrompts};
pub use text_generator::{
    extract_citations, extract_title, Article, GeminiTextGenerator, TextGenerator, UpstreamError,
};
