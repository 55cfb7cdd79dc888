//! Tract backend for running segmentation models with pure Rust inference
//!
//! Loads ONNX weights from the configured model directory and runs them
//! through Tract. No external runtime dependencies, CPU only.

use crate::error::{BgServeError, Result};
use crate::inference::InferenceBackend;
use crate::models::ModelDescriptor;
use crate::session::SessionFactory;
use ndarray::Array4;
use std::path::Path;
use std::time::Instant;
use tract_onnx::prelude::*;

/// Type alias for the Tract runnable model type
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract-based segmentation backend bound to one loaded model
#[derive(Debug)]
pub struct TractBackend {
    model: TractModel,
}

impl TractBackend {
    /// Load and optimize an ONNX model from disk
    ///
    /// # Errors
    /// - Model file missing
    /// - ONNX parsing, optimization, or plan construction failures
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BgServeError::model(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        let model = onnx()
            .model_for_path(path)
            .map_err(|e| BgServeError::model(format!("Failed to load ONNX model: {e}")))?
            .into_optimized()
            .map_err(|e| BgServeError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| BgServeError::model(format!("Failed to create runnable model: {e}")))?;

        Ok(Self { model })
    }
}

impl InferenceBackend for TractBackend {
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        tracing::debug!(input_shape = ?input.shape(), "running tract inference");
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = self
            .model
            .run(tvec![input_tensor.into()])
            .map_err(|e| BgServeError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgServeError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            BgServeError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let output_shape = output_data.shape();
        if output_shape.len() != 4 {
            return Err(BgServeError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        }

        let output_array = Array4::from_shape_vec(
            (
                output_shape.first().copied().unwrap_or(1),
                output_shape.get(1).copied().unwrap_or(1),
                output_shape.get(2).copied().unwrap_or(1),
                output_shape.get(3).copied().unwrap_or(1),
            ),
            output_data.to_owned().into_raw_vec_and_offset().0,
        )
        .map_err(|e| BgServeError::inference(format!("Failed to reshape output tensor: {e}")))?;

        tracing::debug!(
            elapsed_ms = inference_start.elapsed().as_millis() as u64,
            output_shape = ?output_array.shape(),
            "tract inference completed"
        );

        Ok(output_array)
    }
}

/// Session factory loading Tract backends from the model directory
#[derive(Debug, Default)]
pub struct TractSessionFactory;

impl TractSessionFactory {
    /// Create a new Tract session factory
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SessionFactory for TractSessionFactory {
    fn create_backend(
        &self,
        model: &ModelDescriptor,
        model_dir: &Path,
    ) -> Result<Box<dyn InferenceBackend>> {
        let weight_path = model_dir.join(model.weight_file());
        tracing::info!(
            model = model.id,
            path = %weight_path.display(),
            "loading model weights"
        );

        let load_start = Instant::now();
        let backend = TractBackend::from_file(&weight_path)?;
        tracing::info!(
            model = model.id,
            elapsed_ms = load_start.elapsed().as_millis() as u64,
            "model loaded"
        );

        Ok(Box::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_weight_file_is_a_model_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let factory = TractSessionFactory::new();
        let descriptor = crate::models::validate_model("u2net").unwrap();

        let err = factory
            .create_backend(descriptor, dir.path())
            .expect_err("missing weights must fail");
        assert!(matches!(err, BgServeError::Model(_)));
        assert!(err.to_string().contains("u2net.onnx"));
    }
}
