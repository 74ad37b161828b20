use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::bail;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::collect::rate::RateState;
use crate::collect::sample::MetricSample;
use crate::collect::traffic::CounterSource;
use crate::collect::MetricFetcher;
use crate::config::dashboard_config::{DashboardConfig, Direction, DisplayConfig, FieldSource, TextStyle};
use crate::display::DisplaySink;
use crate::ext::destructure_ext::DestructureTupleExt;
use crate::refresh::field::BoundField;

pub mod field;

/// Longest uninterrupted sleep while waiting for the next refresh.
const STOP_POLL: Duration = Duration::from_millis(100);

/// Raised by the signal listener, observed by the loop between refreshes.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
struct BoundLabel {
    text: String,
    x: u32,
    y: u32,
    style: TextStyle,
}

pub struct RefreshLoop {
    display_config: DisplayConfig,
    interval: Duration,
    labels: Vec<BoundLabel>,
    fields: Vec<BoundField>,
    fetcher: Option<Box<dyn MetricFetcher>>,
    counters: Option<Box<dyn CounterSource>>,
    rate: RateState,
    stop: StopFlag,
}

impl RefreshLoop {
    pub fn new(
        config: &DashboardConfig,
        fetcher: Option<Box<dyn MetricFetcher>>,
        counters: Option<Box<dyn CounterSource>>,
        stop: StopFlag,
    ) -> anyhow::Result<Self> {
        let labels = config
            .labels
            .iter()
            .map(|label| {
                Ok(BoundLabel {
                    text: label.text.clone(),
                    x: label.x,
                    y: label.y,
                    style: config.style(&label.style)?.clone(),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let fields = config
            .fields
            .iter()
            .map(|field| Ok(BoundField::new(field.clone(), config.style(&field.style)?.clone())))
            .collect::<anyhow::Result<Vec<_>>>()?;

        if fetcher.is_none() && fields.iter().any(|field| field.query.is_some()) {
            bail!("The layout queries Prometheus but no URL is configured (PROM_SERVER_URL)");
        }
        let counters = match (counters, config.needs_throughput()) {
            (None, true) => {
                bail!("The layout shows throughput but no byte counter source is configured")
            }
            (Some(_), false) => {
                debug!("No throughput field, byte counters will not be read");
                None
            }
            (counters, true) => counters,
            (None, false) => None,
        };

        Ok(Self {
            display_config: config.display.clone(),
            interval: config.refresh_interval,
            labels,
            fields,
            fetcher,
            counters,
            rate: RateState::default(),
            stop,
        })
    }

    /// One-time panel setup, then the static labels.
    pub fn setup(&mut self, display: &mut dyn DisplaySink) -> anyhow::Result<()> {
        // Clears the screen and recovers a panel left in an unstable state.
        display.reset()?;
        display.initialize()?;
        display.set_brightness(self.display_config.brightness)?;
        display.set_orientation(self.display_config.orientation)?;

        for label in &self.labels {
            display.draw_text(&label.text, label.x, label.y, &label.style)?;
        }
        Ok(())
    }

    /// Refreshes until the stop flag is raised, then closes the display.
    pub fn run(&mut self, display: &mut dyn DisplaySink) -> anyhow::Result<()> {
        info!(
            interval = %humantime::format_duration(self.interval),
            fields = self.fields.len(),
            "Refresh loop running"
        );

        while !self.stop.is_raised() {
            self.refresh(display);
            self.wait();
        }

        info!("Stopping, closing the display");
        display.close()
    }

    /// A single refresh followed by an orderly close.
    pub fn run_once(&mut self, display: &mut dyn DisplaySink) -> anyhow::Result<()> {
        self.refresh(display);
        display.close()
    }

    pub fn refresh(&mut self, display: &mut dyn DisplaySink) {
        self.refresh_at(display, Instant::now());
    }

    fn refresh_at(&mut self, display: &mut dyn DisplaySink, now: Instant) {
        let (download, upload) = self
            .read_throughput(now)
            .map_err(|err| {
                warn!(?err, "Failed to read byte counters");
                err
            })
            .destructure();

        // A query shared by several fields is only sent once per refresh.
        let mut samples: HashMap<&str, MetricSample> = HashMap::new();

        for field in &self.fields {
            let result = match &field.field.source {
                FieldSource::Clock { .. } => display.draw_text(
                    &field.clock_text(Utc::now()),
                    field.field.x,
                    field.field.y,
                    &field.style,
                ),
                FieldSource::Throughput { direction } => {
                    let rate = match direction {
                        Direction::Download => download,
                        Direction::Upload => upload,
                    };
                    field.draw_sample(display, MetricSample::from(rate))
                }
                FieldSource::Query { .. } | FieldSource::LastOverTime { .. } => {
                    let sample = match (field.query.as_deref(), self.fetcher.as_mut()) {
                        (Some(query), Some(fetcher)) => *samples
                            .entry(query)
                            .or_insert_with(|| fetcher.fetch(query)),
                        _ => MetricSample::Error,
                    };
                    field.draw_sample(display, sample)
                }
            };

            if let Err(err) = result {
                warn!(?err, x = field.field.x, y = field.field.y, "Failed to draw field");
            }
        }

        if let Err(err) = display.flush() {
            warn!(?err, "Failed to flush the display");
        }
        debug!(queries = samples.len(), "Refresh done");
    }

    fn read_throughput(&mut self, now: Instant) -> anyhow::Result<Option<(f64, f64)>> {
        let Some(counters) = self.counters.as_mut() else {
            return Ok(None);
        };

        let reading = counters.read()?;
        let throughput = self.rate.update(reading, now);
        Ok(Some((throughput.download, throughput.upload)))
    }

    fn wait(&self) {
        let deadline = Instant::now() + self.interval;
        while !self.stop.is_raised() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(remaining.min(STOP_POLL));
        }
    }
}
