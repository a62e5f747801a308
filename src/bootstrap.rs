use crate::collector::service::CollectionService;
use crate::config::Configuration;
use crate::domain::TelemetrySource;
use crate::metrics;
use std::sync::Arc;
use std::time::Duration;

/// Builds the collection service over the built-in plugins and starts the
/// configured features.
pub async fn init_service(
    config: &Configuration,
    source: Arc<dyn TelemetrySource>,
    registry: prometheus::Registry,
) -> anyhow::Result<CollectionService> {
    let plugins = metrics::default_registry()?;
    let service = CollectionService::new(source, plugins, registry)
        .with_timeout(Duration::from_millis(config.collector.scrape_timeout));

    service.start(&config.collector.features).await?;
    tracing::info!(
        plugins = ?service.active_plugins().await,
        "Collection service started"
    );

    Ok(service)
}
