//! Single-invocation serverless worker binary
//!
//! Reads one job envelope (`{"input": {...}}`) from stdin and writes the
//! result JSON to stdout.

use anyhow::Context;
use bgremove_serve::{worker, RemovalPipeline, ServiceConfig, TracingConfig, TractSessionFactory};
use std::io::Read;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    TracingConfig::new().init()?;

    let config = ServiceConfig::from_env().context("failed to resolve service configuration")?;
    let pipeline = RemovalPipeline::new(&config, Arc::new(TractSessionFactory::new()))
        .context("failed to build removal pipeline")?;

    let mut raw_job = String::new();
    std::io::stdin()
        .read_to_string(&mut raw_job)
        .context("failed to read job payload from stdin")?;

    let result = worker::run(&pipeline, &raw_job).await;
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}
