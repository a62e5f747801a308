use crate::collector::builder::{MetricsBuilder, PropertyProcessor, Vector, conv, prop};
use crate::collector::convert;
use crate::collector::{Plugin, ScrapeContext};
use crate::domain::TelemetrySource;
use crate::error::Result;
use crate::metrics::{ObjectView, number, object_name, query_paths, set_direct};

pub const NAME: &str = "datastore";

const KIND: &str = "Datastore";
const CAPACITY: &str = "summary.capacity";
const FREE_SPACE: &str = "summary.freeSpace";

pub struct Datastore {
    metrics: Vec<Vector>,
    used: Vector,
    paths: Vec<String>,
    processor: PropertyProcessor,
    view: ObjectView,
}

impl Datastore {
    pub fn create() -> Result<Box<dyn Plugin>> {
        Ok(Box::new(Self::new()?))
    }

    pub fn new() -> Result<Self> {
        let mut ds = MetricsBuilder::new("datastore");
        ds.with_labels(["ds_name", "host_name"])
            .gauge()
            .with_converter(convert::numeric);

        let used = ds.build("used_size", "Datastore used")?;
        let metrics = vec![
            ds.build_with("capacity_size", "Datastore total", [prop(CAPACITY)])?,
            ds.build_with("freespace_size", "Datastore free", [prop(FREE_SPACE)])?,
            ds.build_with(
                "accessible",
                "Datastore is accessible",
                [prop("summary.accessible"), conv(convert::boolean)],
            )?,
            used.clone(),
        ];

        Ok(Self {
            metrics,
            used,
            paths: query_paths(&ds, &[]),
            processor: ds.processor(),
            view: ObjectView::new(KIND),
        })
    }
}

#[async_trait::async_trait]
impl Plugin for Datastore {
    fn name(&self) -> &'static str {
        NAME
    }

    fn metrics(&self) -> Vec<Vector> {
        self.metrics.clone()
    }

    async fn startup(&mut self, source: &dyn TelemetrySource) -> Result<()> {
        self.view.open(source).await
    }

    async fn shutdown(&mut self, source: &dyn TelemetrySource) -> Result<()> {
        self.view.close(source).await
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn scrape(&self, ctx: &ScrapeContext<'_>) -> Result<()> {
        let endpoint = ctx.source().endpoint();
        let stores = self.view.retrieve(ctx, &self.paths).await?;

        for store in &stores {
            let Some(name) = object_name(store) else {
                continue;
            };

            let labels = [name, endpoint];
            self.processor.process(&store.properties, &labels);

            if let (Some(capacity), Some(free)) = (number(store, CAPACITY), number(store, FREE_SPACE)) {
                set_direct(&self.used, &labels, capacity - free);
            }
        }

        tracing::debug!(
            parent: ctx.span(),
            datastores = stores.len(),
            remaining_ms = ctx.remaining().as_millis() as u64,
            "Datastore metrics updated"
        );
        Ok(())
    }
}
