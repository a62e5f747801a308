use crate::collector::builder::{MetricsBuilder, PropertyProcessor, Vector, conv, prop};
use crate::collector::convert;
use crate::collector::{Plugin, ScrapeContext};
use crate::domain::{RawValue, TelemetrySource};
use crate::error::Result;
use crate::metrics::{ObjectView, number, object_name, query_paths, set_direct};

pub const NAME: &str = "host";

const KIND: &str = "HostSystem";
const CPU_MHZ: &str = "summary.hardware.cpuMhz";
const CPU_CORES: &str = "summary.hardware.numCpuCores";
const SCSI_LUNS: &str = "config.storageDevice.scsiLun";

pub struct Host {
    metrics: Vec<Vector>,
    cpu_max: Vector,
    disk_ok: Vector,
    paths: Vec<String>,
    processor: PropertyProcessor,
    view: ObjectView,
}

impl Host {
    pub fn create() -> Result<Box<dyn Plugin>> {
        Ok(Box::new(Self::new()?))
    }

    pub fn new() -> Result<Self> {
        let mut host = MetricsBuilder::new("host");
        host.with_labels(["host_name"])
            .gauge()
            .with_converter(convert::numeric);

        let mut boot = host.subsystem("boot");
        let mut power = host.subsystem("power");
        let mut cpu = host.subsystem("cpu");
        let mut mem = host.subsystem("mem");
        let mut disk = host.subsystem("disk");
        disk.with_labels(["device"]);

        let cpu_max = cpu.build("max", "VMWare Host CPU max availability in Mhz")?;
        let disk_ok = disk.build("ok", "Disk is working normally")?;

        let metrics = vec![
            boot.build_with(
                "seconds",
                "VMWare Host boot time in seconds",
                [prop("runtime.bootTime"), conv(convert::timestamp_seconds)],
            )?,
            power.build_with(
                "state",
                "VMWare Host power state: poweredOn 1, poweredOff 2, standBy 3, other 0",
                [prop("runtime.powerState"), conv(convert::power_state)],
            )?,
            cpu.build_with(
                "usage",
                "VMWare Host CPU usage in Mhz",
                [prop("summary.quickStats.overallCpuUsage")],
            )?,
            cpu.build_with("mhz", "VMWare Host CPU core frequency in Mhz", [prop(CPU_MHZ)])?,
            cpu.build_with(
                "num",
                "VMWare Number of processors in the Host",
                [prop(CPU_CORES)],
            )?,
            mem.build_with(
                "usage",
                "VMWare Host Memory usage in Mbytes",
                [prop("summary.quickStats.overallMemoryUsage")],
            )?,
            mem.build_with(
                "max",
                "VMWare Host Memory Max availability in Mbytes",
                [
                    prop("summary.hardware.memorySize"),
                    conv(convert::bytes_to_megabytes),
                ],
            )?,
            mem.build_with(
                "max_bytes",
                "VMWare Host Memory Max availability in bytes",
                [prop("summary.hardware.memorySize")],
            )?,
            cpu_max.clone(),
            disk_ok.clone(),
        ];

        Ok(Self {
            metrics,
            cpu_max,
            disk_ok,
            paths: query_paths(&host, &[SCSI_LUNS]),
            processor: host.processor(),
            view: ObjectView::new(KIND),
        })
    }
}

#[async_trait::async_trait]
impl Plugin for Host {
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
        let hosts = self.view.retrieve(ctx, &self.paths).await?;

        for host in &hosts {
            let Some(name) = object_name(host) else {
                continue;
            };

            self.processor.process(&host.properties, &[name]);

            if let (Some(mhz), Some(cores)) = (number(host, CPU_MHZ), number(host, CPU_CORES)) {
                set_direct(&self.cpu_max, &[name], mhz * cores);
            }

            for lun in host.property(SCSI_LUNS).and_then(RawValue::as_list).unwrap_or_default() {
                if let Some(device) = lun.field("deviceName").and_then(RawValue::as_text) {
                    set_direct(&self.disk_ok, &[name, device], lun_state(lun));
                }
            }
        }

        tracing::debug!(
            parent: ctx.span(),
            hosts = hosts.len(),
            remaining_ms = ctx.remaining().as_millis() as u64,
            "Host metrics updated"
        );
        Ok(())
    }
}

/// 1 when every operational state of the LUN is `ok`, otherwise 0.
fn lun_state(lun: &RawValue) -> f64 {
    let healthy = lun
        .field("operationalState")
        .and_then(RawValue::as_list)
        .unwrap_or_default()
        .iter()
        .all(|state| state.as_text() == Some("ok"));

    if healthy { 1.0 } else { 0.0 }
}
