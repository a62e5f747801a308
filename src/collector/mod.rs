use crate::collector::builder::Vector;
use crate::domain::TelemetrySource;
use crate::error::Result;
use std::time::Duration;
use tokio::time::Instant;

pub mod builder;
pub mod convert;
pub mod registry;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

/// A self-contained unit producing one family of related metrics.
///
/// `startup` runs once before the first scrape, after the plugin's metrics
/// have been registered with the sink. `shutdown` runs once at teardown and
/// releases whatever `startup` opened on the remote side.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn metrics(&self) -> Vec<Vector>;

    async fn startup(&mut self, source: &dyn TelemetrySource) -> Result<()>;

    async fn shutdown(&mut self, source: &dyn TelemetrySource) -> Result<()>;

    async fn scrape(&self, ctx: &ScrapeContext<'_>) -> Result<()>;
}

/// State for a single scrape cycle. Plugins borrow it for the duration of
/// their `scrape` call.
pub struct ScrapeContext<'a> {
    source: &'a dyn TelemetrySource,
    deadline: Instant,
    span: tracing::Span,
}

impl<'a> ScrapeContext<'a> {
    pub fn new(source: &'a dyn TelemetrySource, timeout: Duration, span: tracing::Span) -> Self {
        Self {
            source,
            deadline: Instant::now() + timeout,
            span,
        }
    }

    pub fn source(&self) -> &'a dyn TelemetrySource {
        self.source
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}
