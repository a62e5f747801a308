use crate::config::Configuration;
use crate::server::shutdown::shutdown_signal;
use crate::server::state::AppState;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use std::error::Error;
use std::net::ToSocketAddrs;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::Layer;
use tower_http::LatencyUnit;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod handler;
pub mod shutdown;
pub mod state;

const SCRAPE_GRACE: Duration = Duration::from_secs(1);

/// Serves until SIGINT/SIGTERM on every address the configured bind
/// address resolves to.
pub async fn start_server(state: AppState) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = state.configuration.clone();
    let router = create_router(state);

    let mut handles = Vec::new();
    for addr in (config.http.address.as_str(), config.http.port).to_socket_addrs()? {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| format!("Could not bind to {}: {}", addr, e))?;

        tracing::info!("Listening on {}", listener.local_addr()?);

        let router = router.clone();
        let handle = tokio::task::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await
        });

        handles.push(handle);
    }

    if handles.is_empty() {
        return Err(format!(
            "The bind address [{}:{}] did not resolve to any IP addresses",
            config.http.address, config.http.port
        )
        .into());
    }

    for handle in handles {
        match handle.await {
            Ok(Ok(())) => (),
            Ok(Err(e)) => return Err(format!("Server failed: {}", e).into()),
            Err(e) => return Err(format!("Server task panicked: {}", e).into()),
        }
    }

    Ok(())
}

fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/", get(handler::index))
        .route("/metrics", get(handler::metrics))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::INTERNAL_SERVER_ERROR,
            request_timeout(&state.configuration),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or("unknown"))
                        .unwrap_or("unknown");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state);

    Router::new().fallback_service(NormalizePathLayer::trim_trailing_slash().layer(router))
}

/// Never shorter than the scrape deadline plus [`SCRAPE_GRACE`], so a timed
/// out cycle still reports its own error.
fn request_timeout(config: &Configuration) -> Duration {
    let http = Duration::from_millis(config.http.timeout);
    let scrape = Duration::from_millis(config.collector.scrape_timeout) + SCRAPE_GRACE;
    http.max(scrape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Plugin;
    use crate::collector::registry::CollectorRegistry;
    use crate::collector::service::CollectionService;
    use crate::collector::testing::RecordingPlugin;
    use crate::datasource::fake::FakeSource;
    use crate::domain::RawValue;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn state(source: FakeSource) -> AppState {
        let mut registry = CollectorRegistry::new();
        registry
            .add("lun", || Ok(Box::new(RecordingPlugin::new("lun")) as Box<dyn Plugin>))
            .unwrap();

        let service =
            CollectionService::new(Arc::new(source), registry, prometheus::Registry::new());
        service.start("lun").await.unwrap();

        AppState {
            configuration: Arc::new(Configuration::default()),
            service: Arc::new(service),
        }
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_request_timeout_covers_scrape_deadline() {
        let mut config = Configuration::default();
        assert_eq!(request_timeout(&config), Duration::from_secs(10));

        config.collector.scrape_timeout = 30_000;
        assert_eq!(request_timeout(&config), Duration::from_secs(31));
    }

    #[tokio::test]
    async fn test_index_page() {
        let router = create_router(state(FakeSource::new("esx01")).await);
        let (status, body) = get(router, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("href=\"/metrics\""));
    }

    #[tokio::test]
    async fn test_metrics_route_with_trailing_slash() {
        let source = FakeSource::new("esx01")
            .with_object("TestObject", "lun-1", vec![("value", RawValue::Float(1.0))]);
        let router = create_router(state(source).await);

        let (status, body) = get(router, "/metrics/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("vmware_lun_value{object=\"lun-1\"} 1"));
    }

    #[tokio::test]
    async fn test_failed_scrape_is_500() {
        let router = create_router(state(FakeSource::new("esx01").failing_queries()).await);
        let (status, body) = get(router, "/metrics").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("remote API returned 503"));
    }
}
