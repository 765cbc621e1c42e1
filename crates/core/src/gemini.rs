//! Generation client for Gemini image models.
//!
//! [`GenerationClient`] turns one image plus one style prompt into one result
//! image through exactly one backend call. The call itself sits behind the
//! [`GenerationBackend`] trait; [`GeminiBackend`] is the live implementation.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::image_processing::{encode_payload, MediaType, ResultImage, SelectedImage};
use async_trait::async_trait;
use gemini_rust::{
    Blob, Content, Gemini, GenerationConfig, GenerationResponse, Message, Part, Role,
};
use std::sync::Arc;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Shown for any backend or transport failure. The diagnostic is logged.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate the image. Please try again.";

/// Shown when the backend answered without any image part.
pub const NO_IMAGE_MESSAGE: &str =
    "No image data was returned. The prompt may have been blocked by safety filters or generation failed.";

/// Builds the instruction sent alongside the image.
pub fn build_instruction(prompt: &str) -> String {
    format!("Apply the following edit to the image: {}", prompt)
}

/// Snapshot of the image and prompt taken when generation is triggered.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub media_type: MediaType,
    pub image: Arc<[u8]>,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(image: &SelectedImage, prompt: impl Into<String>) -> Self {
        Self {
            media_type: image.media_type(),
            image: image.shared_bytes(),
            prompt: prompt.into(),
        }
    }
}

/// Everything a backend needs for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub api_key: String,
    pub model: String,
    pub image_base64: String,
    pub mime_type: String,
    pub instruction: String,
    /// The response must be able to carry image content.
    pub require_image: bool,
}

/// One part of a backend response, in the order the backend returned them.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    InlineImage { mime_type: String, data: String },
    Other,
}

impl From<&Part> for ContentPart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text { text, .. } => ContentPart::Text(text.clone()),
            Part::InlineData { inline_data, .. } => ContentPart::InlineImage {
                mime_type: inline_data.mime_type.clone(),
                data: inline_data.data.clone(),
            },
            _ => ContentPart::Other,
        }
    }
}

/// A single-shot image generation backend.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Performs exactly one call and returns the response parts in order.
    async fn generate(&self, request: BackendRequest) -> Result<Vec<ContentPart>>;
}

/// Backend that talks to the Gemini API through `gemini-rust`.
///
/// A client is created per call so the API key is always the one read at
/// call time.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeminiBackend;

impl GeminiBackend {
    fn client(api_key: &str, model_name: &str) -> Result<Gemini> {
        // Explicit base URL avoids the BadScheme error from the default one
        let base_url = url::Url::parse(GEMINI_BASE_URL)
            .map_err(|e| AppError::config(format!("Invalid base URL: {}", e)))?;

        let model_name = if model_name.starts_with("models/") {
            model_name.to_string()
        } else {
            format!("models/{}", model_name)
        };
        let model_url = format!("{}{}", GEMINI_BASE_URL, model_name);

        Gemini::with_model_and_base_url(api_key, model_url, base_url)
            .map_err(|e| AppError::config(format!("Failed to create Gemini client: {}", e)))
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(&self, request: BackendRequest) -> Result<Vec<ContentPart>> {
        let client = Self::client(&request.api_key, &request.model)?;

        let text_part = Part::Text {
            text: request.instruction,
            thought: None,
            thought_signature: None,
        };
        let image_part = Part::InlineData {
            inline_data: Blob {
                mime_type: request.mime_type,
                data: request.image_base64,
            },
            media_resolution: None,
        };

        let message = Message {
            role: Role::User,
            content: Content {
                role: Some(Role::User),
                parts: Some(vec![text_part, image_part]),
            },
        };

        let mut builder = client.generate_content().with_messages(vec![message]);
        if request.require_image {
            builder = builder.with_generation_config(GenerationConfig {
                response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
                ..Default::default()
            });
        }

        let response = builder
            .execute()
            .await
            .map_err(|e| AppError::backend(format!("API request failed: {:?}", e)))?;

        Ok(response_parts(&response))
    }
}

/// Flattens the first candidate of a Gemini response into content parts.
fn response_parts(response: &GenerationResponse) -> Vec<ContentPart> {
    response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.parts.as_ref())
        .map(|parts| parts.iter().map(ContentPart::from).collect())
        .unwrap_or_default()
}

/// Returns the first inline image among `parts`.
///
/// # Errors
///
/// [`AppError::Generation`] with [`NO_IMAGE_MESSAGE`] when no part carries
/// image data, [`AppError::Encoding`] when that data is not valid base64.
pub fn extract_image(parts: &[ContentPart]) -> Result<ResultImage> {
    let (mime_type, data) = parts
        .iter()
        .find_map(|part| match part {
            ContentPart::InlineImage { mime_type, data } => Some((mime_type, data)),
            _ => None,
        })
        .ok_or_else(|| AppError::generation(NO_IMAGE_MESSAGE))?;

    ResultImage::from_base64(mime_type.as_str(), data)
}

/// Encodes, authorizes, invokes and extracts, in that order.
pub struct GenerationClient {
    config: Config,
    backend: Arc<dyn GenerationBackend>,
}

impl GenerationClient {
    /// Creates a client backed by the live Gemini API.
    pub fn new(config: Config) -> Self {
        Self::with_backend(config, Arc::new(GeminiBackend))
    }

    pub fn with_backend(config: Config, backend: Arc<dyn GenerationBackend>) -> Self {
        Self { config, backend }
    }

    /// Fails with [`AppError::Config`] when no credential is configured.
    pub fn ensure_configured(&self) -> Result<()> {
        self.config.api_key().map(|_| ())
    }

    /// Runs one generation.
    ///
    /// Backend failures of any kind, including image data that does not
    /// decode, are logged and replaced by a [`AppError::Generation`]
    /// carrying [`GENERIC_FAILURE_MESSAGE`].
    pub async fn generate(&self, request: &GenerationRequest) -> Result<ResultImage> {
        let image_base64 = encode_payload(&request.image)?;
        let api_key = self.config.api_key()?.to_string();

        let backend_request = BackendRequest {
            api_key,
            model: self.config.model_name.clone(),
            image_base64,
            mime_type: request.media_type.mime_type().to_string(),
            instruction: build_instruction(&request.prompt),
            require_image: true,
        };

        tracing::info!(
            model = %backend_request.model,
            mime_type = %backend_request.mime_type,
            image_bytes = request.image.len(),
            "sending generation request"
        );

        let parts = match self.backend.generate(backend_request).await {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!(error = %e, "generation backend call failed");
                return Err(AppError::generation(GENERIC_FAILURE_MESSAGE));
            }
        };

        match extract_image(&parts) {
            Ok(image) => Ok(image),
            Err(AppError::Encoding(e)) => {
                tracing::error!(error = %e, "backend returned undecodable image data");
                Err(AppError::generation(GENERIC_FAILURE_MESSAGE))
            }
            Err(e) => {
                let text: Vec<&str> = parts
                    .iter()
                    .filter_map(|part| match part {
                        ContentPart::Text(text) => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                tracing::warn!(parts = parts.len(), text = ?text, "response carried no usable image");
                Err(e)
            }
        }
    }
}
