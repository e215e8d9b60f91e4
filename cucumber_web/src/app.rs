use crate::{
    config::Config,
    server::{HttpServer, SharedState},
    telemetry::Metrics,
};
use cucumber_detection::CucumberDetection;
use std::sync::Arc;

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let fruit = CucumberDetection::load(&config.fruit_model, &config.fruit_labels, &config.annotation)
        .inspect_err(|e| tracing::error!("Failed to load fruit maturity model: {}", e))?;
    let leaf = CucumberDetection::load(&config.leaf_model, &config.leaf_labels, &config.annotation)
        .inspect_err(|e| tracing::error!("Failed to load leaf disease model: {}", e))?;

    let state = SharedState {
        fruit: Arc::new(fruit),
        leaf: Arc::new(leaf),
        metrics: Arc::new(Metrics::new()?),
    };

    let server = HttpServer::new(state, &config).await?;
    server.run().await?;

    tracing::info!("Server stopped");
    Ok(())
}
