use crate::collector::builder::{MetricsBuilder, PropertyProcessor, Vector, conv, prop};
use crate::collector::convert;
use crate::collector::{Plugin, ScrapeContext};
use crate::domain::TelemetrySource;
use crate::error::Result;
use crate::metrics::{ObjectView, object_name, query_paths};

pub const NAME: &str = "vm";

const KIND: &str = "VirtualMachine";

pub struct VirtualMachine {
    metrics: Vec<Vector>,
    paths: Vec<String>,
    processor: PropertyProcessor,
    view: ObjectView,
}

impl VirtualMachine {
    pub fn create() -> Result<Box<dyn Plugin>> {
        Ok(Box::new(Self::new()?))
    }

    pub fn new() -> Result<Self> {
        let mut vm = MetricsBuilder::new("vm");
        vm.with_labels(["vm_name", "host_name"])
            .gauge()
            .with_converter(convert::numeric);

        let metrics = vec![
            vm.build_with(
                "boot_timestamp",
                "VMWare VM boot time in seconds",
                [prop("runtime.bootTime"), conv(convert::timestamp_seconds)],
            )?,
            vm.build_with(
                "power_state",
                "VMWare VM power state: poweredOn 1, poweredOff 2, standBy 3, other 0",
                [prop("runtime.powerState"), conv(convert::power_state)],
            )?,
            vm.build_with(
                "num_cpu",
                "Available number of cores",
                [prop("summary.config.numCpu")],
            )?,
            vm.build_with(
                "cpu_available_mhz",
                "VMWare VM total CPU",
                [prop("summary.runtime.maxCpuUsage")],
            )?,
            vm.build_with(
                "cpu_usage_mhz",
                "VMWare VM usage CPU",
                [prop("summary.quickStats.overallCpuUsage")],
            )?,
            vm.build_with(
                "mem_available",
                "Available memory in Mbytes",
                [prop("summary.config.memorySizeMB")],
            )?,
            vm.build_with(
                "mem_usage",
                "Guest memory usage in bytes",
                [
                    prop("summary.quickStats.guestMemoryUsage"),
                    conv(convert::megabytes_to_bytes),
                ],
            )?,
        ];

        Ok(Self {
            metrics,
            paths: query_paths(&vm, &[]),
            processor: vm.processor(),
            view: ObjectView::new(KIND),
        })
    }
}

#[async_trait::async_trait]
impl Plugin for VirtualMachine {
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
        let vms = self.view.retrieve(ctx, &self.paths).await?;

        for vm in &vms {
            if let Some(name) = object_name(vm) {
                self.processor.process(&vm.properties, &[name, endpoint]);
            }
        }

        tracing::debug!(
            parent: ctx.span(),
            vms = vms.len(),
            remaining_ms = ctx.remaining().as_millis() as u64,
            "VM metrics updated"
        );
        Ok(())
    }
}
