use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::collect::traffic::RouterOverrides;
use crate::config::dashboard_config::Revision;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = r###"Prometheus metrics on a USB LCD panel"###)]
pub struct CmdArgs {
    /// Path to the dashboard layout.
    #[arg(short, long, default_value = "/etc/metrics_panel/dashboard.toml")]
    pub config: PathBuf,

    /// Prometheus base URL, e.g. http://prometheus:9090
    #[arg(long, env = "PROM_SERVER_URL")]
    pub prometheus_url: Option<String>,

    /// Router address for the traffic counters.
    #[arg(long, env = "OPNS_IP_ADDR")]
    pub router_address: Option<String>,

    #[arg(long, env = "OPNS_API_KEY", hide_env_values = true)]
    pub router_key: Option<String>,

    #[arg(long, env = "OPNS_API_SECRET", hide_env_values = true)]
    pub router_secret: Option<String>,

    /// Overrides the panel revision of the layout file.
    #[arg(long, value_enum)]
    pub revision: Option<Revision>,

    /// Draw a single refresh and exit.
    #[arg(long)]
    pub once: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl CmdArgs {
    pub fn router_overrides(&self) -> RouterOverrides {
        RouterOverrides {
            address: self.router_address.clone(),
            key: self.router_key.clone(),
            secret: self.router_secret.clone(),
        }
    }
}
