//! Error types for the background removal serving layer

use thiserror::Error;

/// Result type alias for serving operations
pub type Result<T> = std::result::Result<T, BgServeError>;

/// Error taxonomy for the request pipeline and its adapters
#[derive(Error, Debug)]
pub enum BgServeError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decode or encode errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Failure fetching the source image over the network
    #[error("Failed to download image: {0}")]
    Download(String),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Request rejected before any work was done. The message is the wire
    /// contract (e.g. "image_url is required"), so no prefix is added.
    #[error("{0}")]
    InvalidRequest(String),

    /// Model identifier outside the supported set
    #[error("Unsupported model: {requested}. Supported models: {supported}")]
    UnsupportedModel {
        /// The rejected model identifier
        requested: String,
        /// Comma-separated list of supported identifiers
        supported: String,
    },

    /// Pipeline processing errors
    #[error("Processing error: {0}")]
    Processing(String),
}

impl BgServeError {
    /// Create a new download error
    pub fn download<S: Into<String>>(msg: S) -> Self {
        Self::Download(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new invalid request error
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create an unsupported-model error listing the supported set
    pub fn unsupported_model<S: Into<String>>(requested: S) -> Self {
        Self::UnsupportedModel {
            requested: requested.into(),
            supported: crate::models::supported_model_list(),
        }
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {operation} '{path_display}': {error}"),
        ))
    }

    /// The single error-message string exposed to callers.
    ///
    /// Request validation and download failures keep their own messages;
    /// every other failure is reported as a processing error, matching the
    /// two-kind contract of the serving API.
    pub fn wire_message(&self) -> String {
        match self {
            Self::InvalidRequest(_) | Self::UnsupportedModel { .. } | Self::Download(_) => {
                self.to_string()
            },
            other => format!("Error processing image: {other}"),
        }
    }
}
