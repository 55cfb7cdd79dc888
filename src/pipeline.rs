//! Shared request pipeline consumed by both deployment adapters
//!
//! One linear flow per request: validate, get or build the model session,
//! download the source image, run inference on the blocking pool, encode
//! the result. The HTTP server and the serverless worker both call into
//! this component instead of carrying their own copies.

use crate::config::ServiceConfig;
use crate::error::{BgServeError, Result};
use crate::fetch::{FetchedImage, ImageFetcher};
use crate::models;
use crate::session::{SessionFactory, SessionPool};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;

/// A background-removal request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalRequest {
    /// URL of the source image (required)
    #[serde(default)]
    pub image_url: String,
    /// Return payloads base64-encoded instead of as raw bytes
    #[serde(default = "default_return_base64")]
    pub return_base64: bool,
    /// Also return the untouched original image
    #[serde(default)]
    pub include_original: bool,
    /// Model identifier from the supported set
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_return_base64() -> bool {
    true
}

fn default_model() -> String {
    models::DEFAULT_MODEL.to_string()
}

impl RemovalRequest {
    /// Create a request for a URL with default options
    pub fn new<S: Into<String>>(image_url: S) -> Self {
        Self {
            image_url: image_url.into(),
            return_base64: true,
            include_original: false,
            model: default_model(),
        }
    }
}

impl Default for RemovalRequest {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// A successful background-removal response
///
/// The processed image is always PNG; exactly one of the `image_*` fields
/// is set depending on the requested encoding. The original fields are
/// present only when `include_original` was requested, and always carry the
/// untouched downloaded bytes rather than a re-encode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalResponse {
    /// Processed PNG, base64-encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    /// Processed PNG as raw bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_bytes: Option<Vec<u8>>,
    /// Output format tag, always "PNG"
    pub format: String,
    /// Model that produced the result
    pub model: String,
    /// Original image, base64-encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_image_base64: Option<String>,
    /// Original image as raw bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_image_bytes: Option<Vec<u8>>,
    /// Detected format of the original image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_format: Option<String>,
}

/// The shared background-removal pipeline
#[derive(Debug)]
pub struct RemovalPipeline {
    sessions: SessionPool,
    fetcher: ImageFetcher,
}

impl RemovalPipeline {
    /// Build a pipeline from the service configuration and a backend factory
    ///
    /// # Errors
    /// - Model directory resolution failures
    /// - HTTP client construction failures
    pub fn new(config: &ServiceConfig, factory: Arc<dyn SessionFactory>) -> Result<Self> {
        let model_dir = config.resolve_model_dir()?;
        Ok(Self {
            sessions: SessionPool::new(factory, model_dir),
            fetcher: ImageFetcher::new(config.fetch_timeout, config.max_download_bytes)?,
        })
    }

    /// The underlying session pool
    pub fn sessions(&self) -> &SessionPool {
        &self.sessions
    }

    /// Run one request through the full pipeline
    ///
    /// # Errors
    /// - `InvalidRequest` when `image_url` is missing
    /// - `UnsupportedModel` for identifiers outside the registry
    /// - `Download` when the source image cannot be fetched
    /// - Processing errors from decode, inference, or encode
    pub async fn process(&self, request: RemovalRequest) -> Result<RemovalResponse> {
        if request.image_url.trim().is_empty() {
            return Err(BgServeError::invalid_request("image_url is required"));
        }

        tracing::info!(
            model = %request.model,
            url = %request.image_url,
            "removing background"
        );

        // Validate and build the session before touching the network, so
        // unsupported models never trigger a fetch
        let session = self.sessions.get(&request.model).await?;
        let fetched = self.fetcher.fetch(&request.image_url).await?;

        // Inference is CPU-bound and unbounded; run it on the blocking pool
        let infer_session = Arc::clone(&session);
        let input_image = fetched.image.clone();
        let processed = tokio::task::spawn_blocking(move || {
            infer_session.remove_background(&input_image)
        })
        .await
        .map_err(|e| BgServeError::processing(format!("inference task failed: {e}")))??;

        tracing::info!(model = %request.model, "background removed");
        Self::build_response(&request, &fetched, &processed)
    }

    /// Assemble the response payload from a processed image
    fn build_response(
        request: &RemovalRequest,
        fetched: &FetchedImage,
        processed: &DynamicImage,
    ) -> Result<RemovalResponse> {
        let png = encode_png(processed)?;

        let mut response = RemovalResponse {
            format: "PNG".to_string(),
            model: request.model.clone(),
            ..RemovalResponse::default()
        };

        if request.return_base64 {
            response.image_base64 = Some(BASE64.encode(&png));
        } else {
            response.image_bytes = Some(png);
        }

        if request.include_original {
            if request.return_base64 {
                response.original_image_base64 = Some(BASE64.encode(&fetched.bytes));
            } else {
                response.original_image_bytes = Some(fetched.bytes.clone());
            }
            response.original_format = Some(fetched.format.to_string());
        }

        Ok(response)
    }
}

/// Encode an image as PNG bytes
///
/// # Errors
/// - PNG encoder failures
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
