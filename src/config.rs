use config::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const PRINT_CONFIG_FLAG: &str = "--print-config";
const ENV_PREFIX: &str = "EXPORTER";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Log {
    pub enable_stdout: bool,
    pub enable_log_file: bool,
    pub log_file_directory: Option<String>,
    pub level: String,
    pub directives: Vec<String>,
    pub max_log_files: usize,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            enable_stdout: true,
            enable_log_file: false,
            log_file_directory: Some("/var/log/vmware-exporter/".to_owned()),
            level: "INFO".to_owned(),
            directives: vec![],
            max_log_files: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Http {
    pub address: String,
    pub port: u16,
    pub timeout: u64,
}

impl Default for Http {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_owned(),
            port: 9512,
            timeout: Duration::from_secs(10).as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Vsphere {
    pub host: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Accept self-signed endpoint certificates.
    pub insecure: bool,
    pub api_release: String,
    pub request_timeout: u64,
}

impl Default for Vsphere {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            password: String::new(),
            insecure: false,
            api_release: "8.0.1.0".to_owned(),
            request_timeout: Duration::from_secs(10).as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Collector {
    /// Comma delimited plugin names.
    pub features: String,
    pub scrape_timeout: u64,
}

impl Default for Collector {
    fn default() -> Self {
        Self {
            features: "host".to_owned(),
            scrape_timeout: Duration::from_secs(5).as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default = "Log::default")]
    pub log: Log,

    #[serde(default = "Http::default")]
    pub http: Http,

    #[serde(default = "Vsphere::default")]
    pub vsphere: Vsphere,

    #[serde(default = "Collector::default")]
    pub collector: Collector,
}

impl Configuration {
    pub fn load(base_path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        let base_path = base_path.as_ref();
        let defaults = Config::try_from(&Configuration::default())?;

        let cfg = Config::builder()
            .add_source(defaults)
            .add_source(
                config::File::from(base_path.join("config.toml"))
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::File::from(base_path.join("config.json"))
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("http.address", listen_address())?
            .set_override_option("http.port", listen_port())?
            .set_override_option("vsphere.host", env("ESX_HOST"))?
            .set_override_option("vsphere.username", env("ESX_USERNAME"))?
            .set_override_option("vsphere.password", env("ESX_PASSWORD"))?
            .set_override_option("collector.features", env("ESX_FEATURES"))?
            .set_override_option("log.level", env("ESX_LOG"))?
            .build()?;

        cfg.try_deserialize()
    }

    /// Fails when a setting the exporter cannot run without is missing.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("vsphere.host", "ESX_HOST", &self.vsphere.host),
            ("vsphere.username", "ESX_USERNAME", &self.vsphere.username),
            ("vsphere.password", "ESX_PASSWORD", &self.vsphere.password),
        ];

        for (key, var, value) in required {
            if value.trim().is_empty() {
                return Err(format!(
                    "You must configure '{}' or the environment variable {}",
                    key, var
                ));
            }
        }

        Ok(())
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// `ESX_LISTEN` accepts `:9512`, `9512` or `127.0.0.1:9512`.
fn split_listen(listen: &str) -> (Option<String>, Option<u16>) {
    match listen.rsplit_once(':') {
        Some((address, port)) => (
            Some(address).filter(|a| !a.is_empty()).map(str::to_owned),
            port.parse().ok(),
        ),
        None => (None, listen.parse().ok()),
    }
}

fn listen_address() -> Option<String> {
    env("ESX_LISTEN").and_then(|l| split_listen(&l).0)
}

fn listen_port() -> Option<u64> {
    env("ESX_LISTEN")
        .and_then(|l| split_listen(&l).1)
        .map(u64::from)
}

pub fn get_config_base_path(
    args: impl Iterator<Item = String>,
) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
    let base_path = args
        .skip(1)
        .find(|arg| !arg.starts_with("--"))
        .unwrap_or_else(|| "./".to_owned());

    let path = PathBuf::from(base_path);
    if !path.is_dir() {
        return Err(format!("Configuration path [{}] is not a directory", path.display()).into());
    }

    Ok(path)
}

pub fn should_print_config_and_exit(mut args: impl Iterator<Item = String>) -> bool {
    args.any(|arg| arg == PRINT_CONFIG_FLAG)
}

pub fn print_config(configuration: &Configuration) -> Result<(), toml::ser::Error> {
    println!("{}", toml::to_string_pretty(configuration)?);
    Ok(())
}
