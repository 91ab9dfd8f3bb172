//! Services over the Feishu REST API.

pub mod documents;

pub use documents::DocumentService;
