use crate::collector::builder::{MetricsBuilder, PropertyProcessor, Vector, prop};
use crate::collector::{Plugin, ScrapeContext};
use crate::domain::{ManagedObjectRef, TelemetrySource};
use crate::error::{ExporterError, RemoteQueryError, Result};
use std::sync::{Arc, Mutex};

pub type Journal = Arc<Mutex<Vec<String>>>;

/// Test plugin writing its lifecycle calls to a shared journal. It queries
/// `TestObject` instances and exposes `vmware_<name>_value{object}` bound to
/// the `value` property with the identity converter.
pub struct RecordingPlugin {
    name: &'static str,
    journal: Journal,
    metrics: Vec<Vector>,
    builder: MetricsBuilder,
    processor: PropertyProcessor,
    view: Option<ManagedObjectRef>,
    fail_startup: bool,
    fail_shutdown: bool,
}

impl RecordingPlugin {
    pub fn new(name: &'static str) -> Self {
        Self::with_journal(name, Journal::default())
    }

    pub fn with_journal(name: &'static str, journal: Journal) -> Self {
        let mut builder = MetricsBuilder::new(name);
        builder.with_labels(["object"]).gauge();

        let value = builder
            .build_with("value", "Test value", [prop("value")])
            .expect("valid test metric");
        let processor = builder.processor();

        Self {
            name,
            journal,
            metrics: vec![value],
            builder,
            processor,
            view: None,
            fail_startup: false,
            fail_shutdown: false,
        }
    }

    pub fn failing_startup(mut self) -> Self {
        self.fail_startup = true;
        self
    }

    pub fn failing_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }

    fn record(&self, event: &str) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, event));
    }
}

#[async_trait::async_trait]
impl Plugin for RecordingPlugin {
    fn name(&self) -> &'static str {
        self.name
    }

    fn metrics(&self) -> Vec<Vector> {
        self.metrics.clone()
    }

    async fn startup(&mut self, source: &dyn TelemetrySource) -> Result<()> {
        self.record("startup");
        if self.fail_startup {
            return Err(RemoteQueryError::MissingSession.into());
        }

        self.view = Some(source.create_container_view(&["TestObject"]).await?);
        Ok(())
    }

    async fn shutdown(&mut self, source: &dyn TelemetrySource) -> Result<()> {
        self.record("shutdown");
        if let Some(view) = self.view.take() {
            source.destroy_view(&view).await?;
        }

        if self.fail_shutdown {
            return Err(RemoteQueryError::MissingSession.into());
        }
        Ok(())
    }

    async fn scrape(&self, ctx: &ScrapeContext<'_>) -> Result<()> {
        self.record("scrape");
        let view = self.view.as_ref().ok_or(ExporterError::InvalidState {
            expected: "started",
            actual: "uninitialized",
        })?;

        let objects = ctx
            .source()
            .retrieve_properties(view, "TestObject", &self.builder.required_properties())
            .await?;

        for object in objects {
            self.processor.process(&object.properties, &[&object.obj.value]);
        }

        Ok(())
    }
}
