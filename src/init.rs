use console_subscriber::ConsoleLayer;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;
use crate::refresh::StopFlag;

pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let console_layer = ConsoleLayer::builder().with_default_env().spawn();
    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let (compact_layer, json_layer) = match format {
        LogFormat::Compact => (
            Some(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_ansi(atty::is(atty::Stream::Stdout))
                    .with_target(false),
            ),
            None,
        ),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(compact_layer)
        .with(json_layer)
        .with(console_layer)
        .init();

    Ok(())
}

/// Raises `stop` on the first SIGINT, SIGTERM or SIGQUIT.
///
/// The handlers are registered before this returns, so a signal arriving
/// during panel setup is not lost.
pub fn install_signal_handlers(stop: StopFlag) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let (mut interrupt, mut terminate, mut quit) = {
        let _guard = runtime.enter();
        (
            signal(SignalKind::interrupt())?,
            signal(SignalKind::terminate())?,
            signal(SignalKind::quit())?,
        )
    };

    std::thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            runtime.block_on(async {
                let name = tokio::select! {
                    _ = interrupt.recv() => "SIGINT",
                    _ = terminate.recv() => "SIGTERM",
                    _ = quit.recv() => "SIGQUIT",
                };
                info!(signal = name, "Caught signal, finishing the current refresh");
                stop.raise();
            });
        })?;

    Ok(())
}
