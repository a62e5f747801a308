use crate::collector::ScrapeContext;
use crate::collector::builder::{MetricsBuilder, Vector};
use crate::collector::convert;
use crate::collector::registry::CollectorRegistry;
use crate::domain::{ManagedObjectRef, ObjectContent, RawValue, TelemetrySource};
use crate::error::{ExporterError, Result};

pub mod datastore;
pub mod host;
pub mod vm;

/// Every inventory object carries its display name here; plugins use it as
/// the identifying label.
pub const NAME_PROPERTY: &str = "name";

pub fn default_registry() -> Result<CollectorRegistry> {
    let mut registry = CollectorRegistry::new();
    registry
        .add(host::NAME, host::Host::create)?
        .add(datastore::NAME, datastore::Datastore::create)?
        .add(vm::NAME, vm::VirtualMachine::create)?;

    Ok(registry)
}

/// A container view over one managed-object type, opened at startup and
/// destroyed at shutdown.
struct ObjectView {
    kind: &'static str,
    view: Option<ManagedObjectRef>,
}

impl ObjectView {
    fn new(kind: &'static str) -> Self {
        Self { kind, view: None }
    }

    async fn open(&mut self, source: &dyn TelemetrySource) -> Result<()> {
        if self.view.is_none() {
            let view = source.create_container_view(&[self.kind]).await?;
            tracing::debug!(kind = self.kind, %view, "Opened container view");
            self.view = Some(view);
        }

        Ok(())
    }

    async fn close(&mut self, source: &dyn TelemetrySource) -> Result<()> {
        if let Some(view) = self.view.take() {
            source.destroy_view(&view).await?;
            tracing::debug!(kind = self.kind, %view, "Destroyed container view");
        }

        Ok(())
    }

    async fn retrieve(
        &self,
        ctx: &ScrapeContext<'_>,
        paths: &[String],
    ) -> Result<Vec<ObjectContent>> {
        let view = self.view.as_ref().ok_or(ExporterError::InvalidState {
            expected: "started",
            actual: "uninitialized",
        })?;

        Ok(ctx
            .source()
            .retrieve_properties(view, self.kind, paths)
            .await?)
    }
}

/// The name property, the bound properties of `builder`'s group, then
/// `unbound` paths the plugin reads itself.
fn query_paths(builder: &MetricsBuilder, unbound: &[&str]) -> Vec<String> {
    let mut paths = vec![NAME_PROPERTY.to_owned()];
    for path in builder
        .required_properties()
        .into_iter()
        .chain(unbound.iter().map(|p| p.to_string()))
    {
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

fn object_name(object: &ObjectContent) -> Option<&str> {
    let name = object.property(NAME_PROPERTY).and_then(RawValue::as_text);
    if name.is_none() {
        tracing::debug!(object = %object.obj, "Skipping object without a name");
    }
    name
}

fn number(object: &ObjectContent, property: &str) -> Option<f64> {
    object
        .property(property)
        .and_then(|v| convert::numeric(v).ok())
}

fn set_direct(vector: &Vector, label_values: &[&str], value: f64) {
    if let Err(error) = vector.set(label_values, value) {
        tracing::warn!(metric = %vector.name(), %error, "Could not update metric");
    }
}
