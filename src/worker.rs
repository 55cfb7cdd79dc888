//! Single-invocation serverless adapter
//!
//! The worker receives one job envelope per invocation and returns the
//! result as a JSON value rather than an HTTP body. Result shapes match the
//! HTTP adapter's bodies exactly; only the transport differs.

use crate::pipeline::{RemovalPipeline, RemovalRequest};
use serde::Deserialize;
use serde_json::json;

/// Serverless job envelope: `{"input": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct JobEnvelope {
    /// The wrapped background-removal request
    pub input: RemovalRequest,
}

/// Run one raw job payload through the pipeline
///
/// Envelope parse failures and pipeline errors are both returned as the
/// single-field error shape; this function never fails outright.
pub async fn run(pipeline: &RemovalPipeline, raw_job: &str) -> serde_json::Value {
    let envelope: JobEnvelope = match serde_json::from_str(raw_job) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(%e, "rejecting malformed job envelope");
            return json!({ "error": format!("invalid job payload: {e}") });
        },
    };

    run_job(pipeline, envelope).await
}

/// Run one parsed job envelope through the pipeline
pub async fn run_job(pipeline: &RemovalPipeline, envelope: JobEnvelope) -> serde_json::Value {
    match pipeline.process(envelope.input).await {
        Ok(response) => serde_json::to_value(response).unwrap_or_else(|e| {
            json!({ "error": format!("Error processing image: failed to serialize response: {e}") })
        }),
        Err(error) => {
            tracing::warn!(%error, "job failed");
            json!({ "error": error.wire_message() })
        },
    }
}
