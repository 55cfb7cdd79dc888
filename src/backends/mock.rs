//! Mock backend for testing and debugging
//!
//! Produces a simple edge-detection mask from the input tensor, so the full
//! pipeline can run without any model files on disk.

use crate::error::Result;
use crate::inference::InferenceBackend;
use crate::models::ModelDescriptor;
use crate::session::SessionFactory;
use ndarray::Array4;
use std::path::Path;

/// Mock segmentation backend
#[derive(Debug, Default)]
pub struct MockBackend;

impl MockBackend {
    /// Create a new mock backend
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl InferenceBackend for MockBackend {
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let (n, _c, h, w) = input.dim();
        let mut output = Array4::<f32>::zeros((n, 1, h, w));

        for batch in 0..n {
            for y in 1..h.saturating_sub(1) {
                for x in 1..w.saturating_sub(1) {
                    let center = input[[batch, 0, y, x]];
                    let left = input[[batch, 0, y, x - 1]];
                    let right = input[[batch, 0, y, x + 1]];
                    let top = input[[batch, 0, y - 1, x]];
                    let bottom = input[[batch, 0, y + 1, x]];

                    let edge_strength = ((center - left).abs()
                        + (center - right).abs()
                        + (center - top).abs()
                        + (center - bottom).abs())
                        / 4.0;

                    if let Some(elem) = output.get_mut([batch, 0, y, x]) {
                        *elem = if edge_strength > 0.1 { 1.0 } else { 0.0 };
                    }
                }
            }
        }

        Ok(output)
    }
}

/// Session factory producing mock backends, ignoring the model directory
#[derive(Debug, Default)]
pub struct MockSessionFactory;

impl MockSessionFactory {
    /// Create a new mock factory
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SessionFactory for MockSessionFactory {
    fn create_backend(
        &self,
        model: &ModelDescriptor,
        _model_dir: &Path,
    ) -> Result<Box<dyn InferenceBackend>> {
        tracing::debug!(model = model.id, "creating mock inference backend");
        Ok(Box::new(MockBackend::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_output_is_single_channel_mask() {
        let backend = MockBackend::new();
        let input = Array4::<f32>::zeros((1, 3, 32, 32));
        let output = backend.infer(&input).unwrap();
        assert_eq!(output.shape(), &[1, 1, 32, 32]);
    }

    #[test]
    fn test_mock_marks_edges() {
        let backend = MockBackend::new();
        let mut input = Array4::<f32>::zeros((1, 3, 16, 16));
        // A bright square in a dark field produces edges at its border
        for y in 4..12 {
            for x in 4..12 {
                input[[0, 0, y, x]] = 1.0;
            }
        }
        let output = backend.infer(&input).unwrap();
        assert!(output[[0, 0, 4, 4]] > 0.5);
        assert!(output[[0, 0, 8, 8]] < 0.5);
    }
}
