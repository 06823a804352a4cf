/// File utilities
pub mod files;

/// Hugging Face utilities
pub mod hugging_face;

/// Renderer Utilities
pub mod renderer;
