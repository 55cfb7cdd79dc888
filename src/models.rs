//! Closed registry of supported background-removal models
//!
//! The model set is fixed at deploy time: every identifier maps to a weight
//! file expected under the configured model directory, plus the
//! preprocessing parameters the network was trained with. Requests naming an
//! identifier outside this set are rejected before any session is built.

use crate::error::{BgServeError, Result};

/// Model identifier used when a request does not select one
pub const DEFAULT_MODEL: &str = "birefnet-hrsod";

/// Image preprocessing configuration for a model
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingConfig {
    /// Square input resolution expected by the network (width, height)
    pub target_size: [u32; 2],
    /// Per-channel normalization mean (RGB, 0-1 range)
    pub normalization_mean: [f32; 3],
    /// Per-channel normalization standard deviation (RGB)
    pub normalization_std: [f32; 3],
}

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

const U2NET_INPUT: PreprocessingConfig = PreprocessingConfig {
    target_size: [320, 320],
    normalization_mean: IMAGENET_MEAN,
    normalization_std: IMAGENET_STD,
};

const ISNET_INPUT: PreprocessingConfig = PreprocessingConfig {
    target_size: [1024, 1024],
    normalization_mean: [0.5, 0.5, 0.5],
    normalization_std: [1.0, 1.0, 1.0],
};

const BIREFNET_INPUT: PreprocessingConfig = PreprocessingConfig {
    target_size: [1024, 1024],
    normalization_mean: IMAGENET_MEAN,
    normalization_std: IMAGENET_STD,
};

/// Static description of one supported model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    /// Public model identifier, as accepted in requests
    pub id: &'static str,
    /// Preprocessing parameters for this model's input tensor
    pub preprocessing: PreprocessingConfig,
}

impl ModelDescriptor {
    /// File name of the ONNX weights under the model directory
    pub fn weight_file(&self) -> String {
        format!("{}.onnx", self.id)
    }
}

/// All supported models, in the order reported to callers
pub static SUPPORTED_MODELS: &[ModelDescriptor] = &[
    ModelDescriptor { id: "u2net", preprocessing: U2NET_INPUT },
    ModelDescriptor { id: "u2netp", preprocessing: U2NET_INPUT },
    ModelDescriptor { id: "u2net_human_seg", preprocessing: U2NET_INPUT },
    ModelDescriptor { id: "u2net_cloth_seg", preprocessing: U2NET_INPUT },
    ModelDescriptor { id: "silueta", preprocessing: U2NET_INPUT },
    ModelDescriptor { id: "isnet-general-use", preprocessing: ISNET_INPUT },
    ModelDescriptor { id: "isnet-anime", preprocessing: ISNET_INPUT },
    ModelDescriptor { id: "sam", preprocessing: BIREFNET_INPUT },
    ModelDescriptor { id: "birefnet-general", preprocessing: BIREFNET_INPUT },
    ModelDescriptor { id: "birefnet-general-lite", preprocessing: BIREFNET_INPUT },
    ModelDescriptor { id: "birefnet-portrait", preprocessing: BIREFNET_INPUT },
    ModelDescriptor { id: "birefnet-dis", preprocessing: BIREFNET_INPUT },
    ModelDescriptor { id: "birefnet-hrsod", preprocessing: BIREFNET_INPUT },
    ModelDescriptor { id: "birefnet-cod", preprocessing: BIREFNET_INPUT },
    ModelDescriptor { id: "birefnet-massive", preprocessing: BIREFNET_INPUT },
];

/// Look up the descriptor for a model identifier
pub fn descriptor(model_id: &str) -> Option<&'static ModelDescriptor> {
    SUPPORTED_MODELS.iter().find(|d| d.id == model_id)
}

/// Validate a model identifier against the supported set
///
/// # Errors
/// - `UnsupportedModel` when the identifier is not in the registry
pub fn validate_model(model_id: &str) -> Result<&'static ModelDescriptor> {
    descriptor(model_id).ok_or_else(|| BgServeError::unsupported_model(model_id))
}

/// Comma-separated list of supported model identifiers
pub fn supported_model_list() -> String {
    SUPPORTED_MODELS
        .iter()
        .map(|d| d.id)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_the_fixed_model_set() {
        assert_eq!(SUPPORTED_MODELS.len(), 15);
        for expected in [
            "u2net",
            "u2netp",
            "u2net_human_seg",
            "u2net_cloth_seg",
            "silueta",
            "isnet-general-use",
            "isnet-anime",
            "sam",
            "birefnet-general",
            "birefnet-general-lite",
            "birefnet-portrait",
            "birefnet-dis",
            "birefnet-hrsod",
            "birefnet-cod",
            "birefnet-massive",
        ] {
            assert!(descriptor(expected).is_some(), "missing model {expected}");
        }
    }

    #[test]
    fn test_default_model_is_supported() {
        let descriptor = validate_model(DEFAULT_MODEL).expect("default model must validate");
        assert_eq!(descriptor.id, DEFAULT_MODEL);
        assert_eq!(descriptor.preprocessing.target_size, [1024, 1024]);
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let err = validate_model("u3net").expect_err("unknown model must fail");
        let message = err.to_string();
        assert!(message.contains("Unsupported model: u3net"));
        assert!(message.contains("Supported models:"));
        assert!(message.contains("isnet-anime"));
    }

    #[test]
    fn test_weight_file_name() {
        let descriptor = validate_model("u2netp").unwrap();
        assert_eq!(descriptor.weight_file(), "u2netp.onnx");
    }

    #[test]
    fn test_supported_model_list_is_comma_separated() {
        let list = supported_model_list();
        assert!(list.starts_with("u2net, u2netp"));
        assert!(list.ends_with("birefnet-massive"));
    }
}
