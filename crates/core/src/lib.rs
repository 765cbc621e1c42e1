//! Restyle Core Library
//!
//! This library provides the core functionality for the restyle tool: pick
//! an image, pick or type a style prompt, send both to a Gemini image model,
//! and view or download the restyled result.
//!
//! # Overview
//!
//! - **Image Handling**: file selection, previews and base64 payloads via
//!   [`image_processing`]
//! - **Generation**: one-shot Gemini image edits via [`gemini`]
//! - **Lifecycle**: the request state machine via [`controller`]
//! - **User Interface**: the studio window via [`ui`]
//!
//! # Quick Start
//!
//! ```ignore
//! use restyle_core::{Config, Controller, GenerationClient, SelectedImage};
//! use std::time::Duration;
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! let client = GenerationClient::new(Config::load());
//! let mut controller = Controller::new(client, runtime.handle().clone());
//!
//! controller.select_image(SelectedImage::from_path("photo.jpg")?);
//! controller.set_prompt("Watercolor");
//! controller.generate();
//!
//! while controller.is_loading() {
//!     controller.wait_for_completion(Duration::from_millis(200));
//! }
//! controller.download(".")?;
//! ```
//!
//! # Module Structure
//!
//! - [`config`]: Configuration loading and management
//! - [`controller`]: Interaction controller and lifecycle states
//! - [`error`]: Error types and result aliases
//! - [`gemini`]: Generation client and backends
//! - [`image_processing`]: Image payload utilities
//! - [`presets`]: Preset style prompts
//! - [`ui`]: User interface components

pub mod config;
pub mod controller;
pub mod error;
pub mod gemini;
pub mod image_processing;
pub mod presets;
pub mod ui;

// Re-export primary types for convenience
pub use config::Config;
pub use controller::{Controller, LifecycleState, ViewState};
pub use error::{AppError, Result};
pub use gemini::{GeminiBackend, GenerationBackend, GenerationClient};
pub use image_processing::{MediaType, ResultImage, SelectedImage};

/// Initializes the library by loading environment variables.
///
/// Call this once at application startup, before [`Config::load`] or any
/// other function that reads the environment.
pub fn init() {
    let _ = dotenvy::dotenv();
}
