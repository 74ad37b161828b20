mod cli;
mod collect;
mod config;
mod constants;
mod display;
mod ext;
mod init;
mod refresh;
mod render;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::cli::CmdArgs;
use crate::collect::prometheus::PrometheusClient;
use crate::collect::traffic::open_counter_source;
use crate::collect::MetricFetcher;
use crate::config::dashboard_config::DashboardConfig;
use crate::init::{init_tracing, install_signal_handlers};
use crate::refresh::{RefreshLoop, StopFlag};
use crate::render::canvas::Canvas;

fn main() -> anyhow::Result<()> {
    let args = CmdArgs::parse();
    init_tracing(args.log_format)?;

    let mut config = DashboardConfig::load(&args.config)?;
    if let Some(revision) = args.revision {
        config.display.revision = revision;
    }
    info!(config = %args.config.display(), revision = ?config.display.revision, "Loaded dashboard");

    let prometheus_url = args.prometheus_url.clone().or_else(|| config.prometheus.url.clone());
    let prometheus = match prometheus_url.as_deref() {
        Some(url) => Some(PrometheusClient::new(url, config.request_timeout)?),
        None => {
            warn!("No Prometheus URL configured (PROM_SERVER_URL)");
            None
        }
    };

    let counters = match &config.traffic {
        Some(traffic) if config.needs_throughput() => Some(open_counter_source(
            &traffic.source,
            prometheus.as_ref(),
            &args.router_overrides(),
            config.request_timeout,
        )?),
        _ => None,
    };

    let fetcher = prometheus.map(|client| Box::new(client) as Box<dyn MetricFetcher>);

    let stop = StopFlag::new();
    install_signal_handlers(stop.clone()).context("Failed to install signal handlers")?;

    let mut refresh = RefreshLoop::new(&config, fetcher, counters, stop)?;

    let canvas = Canvas::load_fonts(&config.fonts)?;
    let mut display = display::open(&config.display, canvas)?;
    refresh.setup(display.as_mut()).context("Failed to set up the display")?;

    if args.once {
        refresh.run_once(display.as_mut())
    } else {
        refresh.run(display.as_mut())
    }
}
