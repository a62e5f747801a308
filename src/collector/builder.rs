use crate::collector::convert::{self, Converter};
use crate::domain::DynamicProperty;
use crate::error::{ExporterError, Result};
use prometheus::core::Collector;
use prometheus::{GaugeVec, Opts};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard};

pub const NAMESPACE: &str = "vmware";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorKind {
    Gauge,
}

/// A labeled metric vector, ready to be registered with the sink.
#[derive(Clone)]
pub enum Vector {
    Gauge(GaugeVec),
}

impl Vector {
    pub fn name(&self) -> String {
        match self {
            Vector::Gauge(v) => v
                .desc()
                .first()
                .map(|d| d.fq_name.clone())
                .unwrap_or_default(),
        }
    }

    pub fn as_gauge(&self) -> Option<&GaugeVec> {
        match self {
            Vector::Gauge(v) => Some(v),
        }
    }

    pub fn boxed(&self) -> Box<dyn Collector> {
        match self {
            Vector::Gauge(v) => Box::new(v.clone()),
        }
    }

    pub fn set(&self, label_values: &[&str], value: f64) -> prometheus::Result<()> {
        match self {
            Vector::Gauge(v) => {
                v.get_metric_with_label_values(label_values)?.set(value);
                Ok(())
            }
        }
    }
}

struct Binding {
    vector: Vector,
    converter: Converter,
}

/// Property keys needed by one family of metrics and the vectors reading each key.
#[derive(Default)]
struct DescriptorGroup {
    properties: Vec<String>,
    bindings: HashMap<String, Vec<Binding>>,
}

impl DescriptorGroup {
    fn bind(&mut self, property: String, binding: Binding) {
        match self.bindings.entry(property) {
            Entry::Occupied(mut e) => e.get_mut().push(binding),
            Entry::Vacant(e) => {
                self.properties.push(e.key().clone());
                e.insert(vec![binding]);
            }
        }
    }
}

fn lock(group: &Mutex<DescriptorGroup>) -> MutexGuard<'_, DescriptorGroup> {
    group.lock().unwrap_or_else(|e| e.into_inner())
}

pub enum BuildOption {
    Property(String),
    Converter(Converter),
}

pub fn prop(key: impl Into<String>) -> BuildOption {
    BuildOption::Property(key.into())
}

pub fn conv(converter: Converter) -> BuildOption {
    BuildOption::Converter(converter)
}

/// Declares metrics and the remote properties they read.
///
/// Builders derived through [`MetricsBuilder::subsystem`] share a single
/// descriptor group, so every metric in the lineage contributes to one
/// deduplicated property list and one [`PropertyProcessor`].
#[derive(Clone)]
pub struct MetricsBuilder {
    namespace: &'static str,
    subsystem: String,
    labels: Vec<String>,
    group: Arc<Mutex<DescriptorGroup>>,

    kind: Option<VectorKind>,
    converter: Converter,
    property: Option<String>,
    build_converter: Option<Converter>,
}

impl MetricsBuilder {
    pub fn new(subsystem: impl Into<String>) -> Self {
        Self {
            namespace: NAMESPACE,
            subsystem: subsystem.into(),
            labels: vec![],
            group: Arc::new(Mutex::new(DescriptorGroup::default())),
            kind: None,
            converter: convert::identity,
            property: None,
            build_converter: None,
        }
    }

    pub fn with_labels<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(names.into_iter().map(Into::into));
        self
    }

    /// A builder for `<subsystem>_<suffix>` feeding the same descriptor group.
    pub fn subsystem(&self, suffix: &str) -> Self {
        let mut derived = self.clone();
        derived.subsystem = format!("{}_{}", self.subsystem, suffix);
        derived.property = None;
        derived.build_converter = None;
        derived
    }

    pub fn gauge(&mut self) -> &mut Self {
        self.kind = Some(VectorKind::Gauge);
        self
    }

    /// Binds the next built metric to a remote property path. Cleared by `build`.
    pub fn bind_property(&mut self, key: impl Into<String>) -> &mut Self {
        self.property = Some(key.into());
        self
    }

    /// Replaces the converter used by every metric built afterwards.
    pub fn with_converter(&mut self, converter: Converter) -> &mut Self {
        self.converter = converter;
        self
    }

    pub fn required_properties(&self) -> Vec<String> {
        lock(&self.group).properties.clone()
    }

    pub fn processor(&self) -> PropertyProcessor {
        PropertyProcessor {
            group: Arc::clone(&self.group),
        }
    }

    pub fn build(&mut self, name: &str, help: &str) -> Result<Vector> {
        self.build_with(name, help, [])
    }

    /// Builds one metric. Options apply to this metric only.
    pub fn build_with(
        &mut self,
        name: &str,
        help: &str,
        options: impl IntoIterator<Item = BuildOption>,
    ) -> Result<Vector> {
        for option in options {
            match option {
                BuildOption::Property(key) => self.property = Some(key),
                BuildOption::Converter(converter) => self.build_converter = Some(converter),
            }
        }

        let property = self.property.take();
        let converter = self.build_converter.take().unwrap_or(self.converter);
        let metric = format!("{}_{}_{}", self.namespace, self.subsystem, name);

        let opts = Opts::new(name, help)
            .namespace(self.namespace)
            .subsystem(self.subsystem.as_str());
        let labels = self.labels.iter().map(String::as_str).collect::<Vec<_>>();

        let vector = match self.kind {
            Some(VectorKind::Gauge) => Vector::Gauge(
                GaugeVec::new(opts, &labels)
                    .map_err(|source| ExporterError::InvalidMetric { metric, source })?,
            ),
            None => return Err(ExporterError::UnsupportedVectorKind { metric }),
        };

        if let Some(property) = property {
            lock(&self.group).bind(
                property,
                Binding {
                    vector: vector.clone(),
                    converter,
                },
            );
        }

        Ok(vector)
    }
}

/// Routes property values to the vectors bound to them.
#[derive(Clone)]
pub struct PropertyProcessor {
    group: Arc<Mutex<DescriptorGroup>>,
}

impl PropertyProcessor {
    /// Label values must follow the order the labels were declared in.
    /// Properties nobody is bound to are ignored.
    pub fn process(&self, properties: &[DynamicProperty], label_values: &[&str]) {
        let group = lock(&self.group);

        for property in properties {
            let Some(bindings) = group.bindings.get(&property.name) else {
                continue;
            };

            for binding in bindings {
                let value = match (binding.converter)(&property.value) {
                    Ok(value) => value,
                    Err(fallback) => {
                        tracing::warn!(
                            property = %property.name,
                            metric = %binding.vector.name(),
                            %fallback,
                            "Reporting zero for a value without numeric mapping"
                        );
                        0.0
                    }
                };

                if let Err(error) = binding.vector.set(label_values, value) {
                    tracing::warn!(
                        property = %property.name,
                        metric = %binding.vector.name(),
                        ?label_values,
                        %error,
                        "Skipping value, label values do not match the metric"
                    );
                }
            }
        }
    }
}
