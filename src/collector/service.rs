use crate::collector::builder::Vector;
use crate::collector::registry::CollectorRegistry;
use crate::collector::{Plugin, ScrapeContext};
use crate::domain::TelemetrySource;
use crate::error::{ExporterError, RemoteQueryError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::Instrument;

pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(5);

enum Lifecycle {
    Uninitialized,
    Started(Vec<Box<dyn Plugin>>),
    Stopped,
}

impl Lifecycle {
    fn label(&self) -> &'static str {
        match self {
            Lifecycle::Uninitialized => "uninitialized",
            Lifecycle::Started(_) => "started",
            Lifecycle::Stopped => "stopped",
        }
    }
}

/// Drives the plugin lifecycle: `start` once, any number of `scrape` cycles,
/// then `stop` once. Scrape cycles are serialized.
pub struct CollectionService {
    source: Arc<dyn TelemetrySource>,
    registry: CollectorRegistry,
    sink: prometheus::Registry,
    timeout: Duration,
    state: Mutex<Lifecycle>,
}

impl CollectionService {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        registry: CollectorRegistry,
        sink: prometheus::Registry,
    ) -> Self {
        Self {
            source,
            registry,
            sink,
            timeout: DEFAULT_SCRAPE_TIMEOUT,
            state: Mutex::new(Lifecycle::Uninitialized),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn sink(&self) -> &prometheus::Registry {
        &self.sink
    }

    pub async fn active_plugins(&self) -> Vec<&'static str> {
        match &*self.state.lock().await {
            Lifecycle::Started(plugins) => plugins.iter().map(|p| p.name()).collect(),
            _ => vec![],
        }
    }

    /// Loads the comma-delimited `features`, registers every plugin's metrics
    /// with the sink and then runs its startup. On failure the plugins that
    /// already started are shut down and every registered metric is removed,
    /// leaving the service unstarted.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn start(&self, features: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if !matches!(*state, Lifecycle::Uninitialized) {
            return Err(ExporterError::InvalidState {
                expected: "uninitialized",
                actual: state.label(),
            });
        }

        let names = parse_features(features);
        let mut plugins = self.registry.load(&names)?;

        let mut registered = Vec::new();
        let mut started = 0;
        let mut failure = None;

        for plugin in plugins.iter_mut() {
            let outcome = match self.register(&**plugin, &mut registered) {
                Ok(()) => self.bounded(plugin.startup(self.source.as_ref())).await,
                Err(error) => Err(error),
            };

            if let Err(error) = outcome {
                tracing::error!(plugin = plugin.name(), %error, "Collector failed to start");
                failure = Some(error);
                break;
            }

            started += 1;
            tracing::info!(plugin = plugin.name(), "Collector started");
        }

        if let Some(error) = failure {
            self.roll_back(&mut plugins[..started], &registered).await;
            return Err(error);
        }

        *state = Lifecycle::Started(plugins);
        Ok(())
    }

    fn register(&self, plugin: &dyn Plugin, registered: &mut Vec<Vector>) -> Result<()> {
        for vector in plugin.metrics() {
            self.sink
                .register(vector.boxed())
                .map_err(|source| match source {
                    prometheus::Error::AlreadyReg => ExporterError::DuplicateMetricIdentity {
                        metric: vector.name(),
                        source,
                    },
                    source => ExporterError::InvalidMetric {
                        metric: vector.name(),
                        source,
                    },
                })?;

            registered.push(vector);
        }

        Ok(())
    }

    /// Undoes a partial `start`. Failures are logged; the start error is what
    /// the caller sees.
    async fn roll_back(&self, started: &mut [Box<dyn Plugin>], registered: &[Vector]) {
        for plugin in started.iter_mut() {
            if let Err(error) = self.bounded(plugin.shutdown(self.source.as_ref())).await {
                tracing::warn!(
                    plugin = plugin.name(),
                    %error,
                    "Collector shutdown failed during rollback"
                );
            }
        }

        for vector in registered {
            if let Err(error) = self.sink.unregister(vector.boxed()) {
                tracing::warn!(metric = %vector.name(), %error, "Could not unregister metric");
            }
        }
    }

    /// Runs one cycle: every plugin in order, within one shared deadline.
    /// The first failing plugin ends the cycle.
    pub async fn scrape(&self) -> Result<()> {
        let state = self.state.lock().await;
        let Lifecycle::Started(plugins) = &*state else {
            return Err(ExporterError::InvalidState {
                expected: "started",
                actual: state.label(),
            });
        };

        let span = tracing::debug_span!("scrape", endpoint = self.source.endpoint());
        let ctx = ScrapeContext::new(self.source.as_ref(), self.timeout, span.clone());

        let cycle = async {
            for plugin in plugins {
                plugin.scrape(&ctx).await.inspect_err(|error| {
                    tracing::warn!(plugin = plugin.name(), %error, "Collector failed");
                })?;
            }

            Ok::<(), ExporterError>(())
        };

        let started = Instant::now();
        let result = match tokio::time::timeout_at(ctx.deadline(), cycle)
            .instrument(span)
            .await
        {
            Ok(result) => result,
            Err(_) => Err(RemoteQueryError::Timeout(self.timeout).into()),
        };

        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Scrape cycle finished"
        );

        result
    }

    /// Shuts every plugin down, even when an earlier one fails. Returns the
    /// first failure. The service cannot be started again afterwards.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut plugins = match std::mem::replace(&mut *state, Lifecycle::Stopped) {
            Lifecycle::Started(plugins) => plugins,
            previous => {
                let actual = previous.label();
                *state = previous;
                return Err(ExporterError::InvalidState {
                    expected: "started",
                    actual,
                });
            }
        };

        let mut first_error = None;
        for plugin in plugins.iter_mut() {
            if let Err(error) = self.bounded(plugin.shutdown(self.source.as_ref())).await {
                tracing::error!(plugin = plugin.name(), %error, "Collector shutdown failed");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn bounded<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(RemoteQueryError::Timeout(self.timeout).into()),
        }
    }
}

pub fn parse_features(features: &str) -> Vec<&str> {
    features
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}
