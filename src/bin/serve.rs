//! Long-lived HTTP server binary

use anyhow::Context;
use bgremove_serve::{
    server, RemovalPipeline, ServiceConfig, TracingConfig, TractSessionFactory,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    TracingConfig::new().init()?;

    let config = ServiceConfig::from_env().context("failed to resolve service configuration")?;
    tracing::info!(port = config.port, "starting background removal server");

    let pipeline = Arc::new(
        RemovalPipeline::new(&config, Arc::new(TractSessionFactory::new()))
            .context("failed to build removal pipeline")?,
    );

    server::serve(&config, pipeline)
        .await
        .context("server terminated with an error")?;
    Ok(())
}
