use crate::collector::service::CollectionService;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use std::sync::Arc;

const INDEX_PAGE: &str = r#"<html>
<head><title>VMware Exporter</title></head>
<body>
<h1>VMware Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
</body>
</html>
"#;

pub async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

/// Runs one scrape cycle and renders the whole sink. A failed cycle yields a
/// 500 carrying the error text instead of partial data.
pub async fn metrics(
    State(service): State<Arc<CollectionService>>,
) -> Result<String, (StatusCode, String)> {
    if let Err(error) = service.scrape().await {
        tracing::error!(%error, "Scrape failed");
        return Err((StatusCode::INTERNAL_SERVER_ERROR, error.to_string()));
    }

    let metric_families = service.sink().gather();
    let encoder = prometheus::TextEncoder::new();

    encoder.encode_to_string(&metric_families).map_err(|error| {
        tracing::error!(%error, "Failed to encode metrics");
        (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    })
}
