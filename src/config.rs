//! Service configuration resolved once at startup
//!
//! The environment is read in `from_env` and nowhere else; everything
//! downstream receives an explicit `ServiceConfig`.

use crate::error::{BgServeError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default listen port for the HTTP server
pub const DEFAULT_PORT: u16 = 80;

/// Model directory baked into the deployment image
pub const BUILTIN_MODEL_DIR: &str = "/app/models";

/// Fixed timeout for fetching source images
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum accepted source image payload (64 MiB)
pub const MAX_DOWNLOAD_BYTES: u64 = 64 * 1024 * 1024;

/// Configuration for the serving process
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// TCP port the HTTP server listens on
    pub port: u16,
    /// Optional mounted volume holding a persistent model cache
    pub volume_dir: Option<PathBuf>,
    /// Fallback model directory baked into the image
    pub builtin_model_dir: PathBuf,
    /// Timeout applied to source image downloads
    pub fetch_timeout: Duration,
    /// Upper bound on downloaded image size in bytes
    pub max_download_bytes: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            volume_dir: None,
            builtin_model_dir: PathBuf::from(BUILTIN_MODEL_DIR),
            fetch_timeout: FETCH_TIMEOUT,
            max_download_bytes: MAX_DOWNLOAD_BYTES,
        }
    }
}

impl ServiceConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the configuration from the process environment
    ///
    /// Reads `PORT` (listen port) and `MODEL_VOLUME_PATH` (persistent model
    /// volume, optional). This is the only place the environment is
    /// consulted.
    ///
    /// # Errors
    /// - `InvalidConfig` when `PORT` is not a valid TCP port
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("PORT") {
            config.port = parse_port(&port)?;
        }

        if let Ok(volume) = std::env::var("MODEL_VOLUME_PATH") {
            if !volume.is_empty() {
                config.volume_dir = Some(PathBuf::from(volume));
            }
        }

        Ok(config)
    }

    /// Set the listen port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the persistent volume directory
    pub fn with_volume_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.volume_dir = Some(dir.into());
        self
    }

    /// Set the built-in model directory
    pub fn with_builtin_model_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.builtin_model_dir = dir.into();
        self
    }

    /// Set the fetch timeout
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the maximum downloaded image size
    pub fn with_max_download_bytes(mut self, bytes: u64) -> Self {
        self.max_download_bytes = bytes;
        self
    }

    /// Resolve the directory model weights are loaded from
    ///
    /// Prefers `<volume>/models` when the mounted volume exists (creating
    /// the subdirectory), otherwise falls back to the built-in path.
    ///
    /// # Errors
    /// - Failed to create the model subdirectory on the volume
    pub fn resolve_model_dir(&self) -> Result<PathBuf> {
        if let Some(volume) = &self.volume_dir {
            if volume.exists() {
                let model_dir = volume.join("models");
                std::fs::create_dir_all(&model_dir).map_err(|e| {
                    BgServeError::file_io_error("create model cache directory", &model_dir, &e)
                })?;
                tracing::info!(
                    path = %model_dir.display(),
                    "using persistent volume for model cache"
                );
                return Ok(model_dir);
            }
            tracing::warn!(
                path = %volume.display(),
                "configured model volume does not exist, falling back to built-in cache"
            );
        }

        tracing::info!(
            path = %self.builtin_model_dir.display(),
            "using built-in model cache from image"
        );
        Ok(self.builtin_model_dir.clone())
    }
}

fn parse_port(value: &str) -> Result<u16> {
    // Port 0 would silently bind an ephemeral port
    match value.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(BgServeError::invalid_config(format!(
            "Invalid PORT value '{value}': expected 1-65535"
        ))),
    }
}
