//! HTTP API
//!
//! Route builders per concern, merged into the application router.

pub mod documents;
pub mod generate;
pub mod health;

pub use documents::document_routes;
pub use generate::generate_routes;
pub use health::health_routes;
