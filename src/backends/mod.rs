//! Inference backend implementations
//!
//! `tract` is the deployable pure-Rust ONNX backend; `mock` is a
//! deterministic stand-in so the serving layer can be exercised without
//! model weights.

pub mod mock;
#[cfg(feature = "tract")]
pub mod tract;

pub use mock::{MockBackend, MockSessionFactory};
#[cfg(feature = "tract")]
pub use tract::{TractBackend, TractSessionFactory};
