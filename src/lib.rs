#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! # Background Removal Serving Layer
//!
//! HTTP and serverless entry points around pretrained background-removal
//! models. Requests name an image URL and a model from a fixed supported
//! set; the service downloads the image, runs segmentation inference, and
//! returns the processed PNG (optionally with the untouched original) as
//! base64 or raw bytes.
//!
//! ## Architecture
//!
//! - **Pipeline** ([`RemovalPipeline`]): one linear flow shared by both
//!   adapters: validate, session lookup, fetch, inference, encode.
//! - **Session pool** ([`SessionPool`]): at most one loaded model per
//!   identifier per process, built lazily with single-flight construction
//!   and never evicted.
//! - **Backends**: inference is an opaque tensor-in/tensor-out seam
//!   ([`InferenceBackend`]); the default backend runs ONNX weights through
//!   Tract (pure Rust, CPU only).
//! - **Adapters**: a long-lived axum server ([`server`]) and a
//!   single-invocation job worker ([`worker`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgremove_serve::{
//!     MockSessionFactory, RemovalPipeline, RemovalRequest, ServiceConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::from_env()?;
//! let pipeline = RemovalPipeline::new(&config, Arc::new(MockSessionFactory::new()))?;
//!
//! let response = pipeline
//!     .process(RemovalRequest::new("https://example.com/portrait.jpg"))
//!     .await?;
//! assert_eq!(response.format, "PNG");
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod fetch;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod server;
pub mod session;
pub mod tracing_config;
pub mod worker;

// Public API exports
pub use backends::MockSessionFactory;
#[cfg(feature = "tract")]
pub use backends::{TractBackend, TractSessionFactory};
pub use config::ServiceConfig;
pub use error::{BgServeError, Result};
pub use fetch::{FetchedImage, ImageFetcher};
pub use inference::InferenceBackend;
pub use models::{ModelDescriptor, PreprocessingConfig, DEFAULT_MODEL, SUPPORTED_MODELS};
pub use pipeline::{RemovalPipeline, RemovalRequest, RemovalResponse};
pub use session::{RemovalSession, SessionFactory, SessionPool};
pub use tracing_config::TracingConfig;
pub use worker::JobEnvelope;
