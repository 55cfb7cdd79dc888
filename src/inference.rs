//! Inference backend abstraction
//!
//! The segmentation network itself is an external collaborator: the serving
//! layer only sees a tensor-in/tensor-out seam. Backends take `&self` so a
//! single loaded model can serve concurrent in-flight requests.

use crate::error::Result;
use ndarray::Array4;

/// Trait for segmentation inference backends
pub trait InferenceBackend: Send + Sync + std::fmt::Debug {
    /// Run inference on a normalized NCHW input tensor, producing a
    /// single-channel mask tensor
    ///
    /// # Errors
    /// - Model inference failures
    /// - Tensor conversion or shape errors
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>>;
}
