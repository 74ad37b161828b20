use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use sysinfo::NetworkData;

use crate::config::template::Template;
use crate::constants::{HEIGHT, WIDTH};

pub trait Evaluate<T> where T: ?Sized {
    fn evaluate(&self, value: &T) -> bool;
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub enum Predicate {
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    Equal(String),
    IEqual(String),
}

impl Evaluate<str> for Predicate {
    fn evaluate(&self, value: &str) -> bool {
        match self {
            Predicate::Contains(pattern) => value.contains(pattern),
            Predicate::StartsWith(pattern) => value.starts_with(pattern),
            Predicate::EndsWith(pattern) => value.ends_with(pattern),
            Predicate::Equal(pattern) => value == pattern,
            Predicate::IEqual(pattern) => value.eq_ignore_ascii_case(pattern),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub enum NetworkFilter {
    Name(Predicate),
    MacAddress(Predicate),
}

impl Evaluate<(&String, &NetworkData)> for NetworkFilter {
    fn evaluate(&self, (name, network_data): &(&String, &NetworkData)) -> bool {
        match self {
            NetworkFilter::Name(predicate) => predicate.evaluate(name),
            NetworkFilter::MacAddress(predicate) => {
                predicate.evaluate(&network_data.mac_address().to_string())
            }
        }
    }
}

/// Hardware revision of the attached panel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, clap::ValueEnum)]
pub enum Revision {
    /// Turing Smart Screen 3.5"
    #[serde(rename = "A")]
    A,
    /// XuanFang 3.5" / flagship
    #[serde(rename = "B")]
    B,
    /// Writes a PNG screen capture instead of talking to hardware
    #[serde(rename = "SIMU", alias = "simulated")]
    Simulated,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Portrait = 0,
    ReversePortrait = 1,
    Landscape = 2,
    ReverseLandscape = 3,
}

impl Orientation {
    pub fn is_landscape(self) -> bool {
        matches!(self, Orientation::Landscape | Orientation::ReverseLandscape)
    }

    pub fn is_reverse(self) -> bool {
        matches!(self, Orientation::ReversePortrait | Orientation::ReverseLandscape)
    }

    /// Logical `(width, height)` of the screen in this orientation.
    pub fn dimensions(self) -> (u32, u32) {
        if self.is_landscape() {
            (HEIGHT, WIDTH)
        } else {
            (WIDTH, HEIGHT)
        }
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum PortSelector {
    #[default]
    Auto,
    Path(PathBuf),
}

impl<'de> Deserialize<'de> for PortSelector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        if value.eq_ignore_ascii_case("auto") {
            Ok(PortSelector::Auto)
        } else {
            Ok(PortSelector::Path(value.into()))
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0]);
    pub const WHITE: Color = Color([255, 255, 255]);
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl From<Color> for image::Rgb<u8> {
    fn from(value: Color) -> Self {
        image::Rgb(value.0)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TextStyle {
    /// Key into [`DashboardConfig::fonts`].
    pub font: String,
    pub size: f32,
    #[serde(default = "default_foreground")]
    pub color: Color,
    #[serde(default)]
    pub background: Color,
}

fn default_foreground() -> Color {
    Color::WHITE
}

#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
pub struct DisplayConfig {
    pub revision: Revision,
    #[serde(default)]
    pub port: PortSelector,
    /// Backlight level in percent. High values make the panel run hot.
    #[serde(default = "super::default_brightness")]
    pub brightness: u8,
    #[serde(default)]
    pub orientation: Orientation,
    /// Output file of the simulated panel.
    #[serde(default = "super::default_screencap")]
    pub screencap: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, Eq, PartialEq)]
pub struct PrometheusConfig {
    /// Base URL such as `http://prometheus:9090`; `PROM_SERVER_URL` overrides it.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CounterSourceConfig {
    /// Two queries returning cumulative received/transmitted byte counters.
    Prometheus { received: String, transmitted: String },
    /// Router traffic API, e.g. OPNsense `diagnostics/traffic/interface`.
    Router {
        #[serde(default)]
        address: Option<String>,
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        secret: Option<String>,
        #[serde(default = "super::default_router_interface")]
        interface: String,
        #[serde(default = "super::default_true")]
        accept_invalid_certs: bool,
    },
    /// Interfaces of the host running the dashboard.
    Interface { interfaces: Vec<NetworkFilter> },
}

#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
pub struct TrafficConfig {
    pub source: CounterSourceConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Download,
    Upload,
}

#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldSource {
    /// A query expression sent verbatim.
    Query { query: String },
    /// `last_over_time(<metric>{<selector>}[<window>])`
    LastOverTime {
        metric: String,
        #[serde(default)]
        selector: String,
        #[serde(with = "humantime_serde")]
        window: Duration,
    },
    Throughput { direction: Direction },
    Clock {
        #[serde(default = "super::default_clock_format")]
        format: String,
        #[serde(default)]
        timezone: Option<chrono_tz::Tz>,
    },
}

impl FieldSource {
    /// The backend query expression, if this source is backed by one.
    pub fn expression(&self) -> Option<String> {
        match self {
            FieldSource::Query { query } => Some(query.clone()),
            FieldSource::LastOverTime {
                metric,
                selector,
                window,
            } => Some(format!(
                "last_over_time({metric}{{{selector}}}[{}])",
                prometheus_duration(*window)
            )),
            FieldSource::Throughput { .. } | FieldSource::Clock { .. } => None,
        }
    }
}

fn prometheus_duration(duration: Duration) -> String {
    let secs = duration.as_secs().max(1);
    match secs {
        s if s % 3600 == 0 => format!("{}h", s / 3600),
        s if s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FormatRule {
    #[default]
    Integer,
    OneDecimal,
    /// Bytes per second shown as `Mib/s`.
    Mebibits,
    /// Bytes per second shown as `MiB/s`.
    Mebibytes,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    #[default]
    Err,
    Zero,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Widget {
    #[default]
    Text,
    ProgressBar {
        width: u32,
        height: u32,
        min: f64,
        max: f64,
        #[serde(default = "super::default_true")]
        outline: bool,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StaticLabel {
    pub text: String,
    pub x: u32,
    pub y: u32,
    pub style: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DisplayField {
    pub x: u32,
    pub y: u32,
    pub style: String,
    pub source: FieldSource,
    #[serde(default)]
    pub format: FormatRule,
    #[serde(default)]
    pub template: Template,
    #[serde(default)]
    pub fallback: Fallback,
    #[serde(default)]
    pub widget: Widget,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DashboardConfig {
    #[serde(with = "humantime_serde", default = "super::default_refresh_interval")]
    pub refresh_interval: Duration,
    #[serde(with = "humantime_serde", default = "super::default_request_timeout")]
    pub request_timeout: Duration,
    pub display: DisplayConfig,
    #[serde(default)]
    pub prometheus: PrometheusConfig,
    #[serde(default)]
    pub traffic: Option<TrafficConfig>,
    pub fonts: HashMap<String, PathBuf>,
    pub styles: HashMap<String, TextStyle>,
    #[serde(default)]
    pub labels: Vec<StaticLabel>,
    #[serde(default)]
    pub fields: Vec<DisplayField>,
}

impl DashboardConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let config: DashboardConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn style(&self, name: &str) -> anyhow::Result<&TextStyle> {
        self.styles
            .get(name)
            .ok_or_else(|| anyhow!("Unknown style {name:?}"))
    }

    /// Checks cross references and that every anchor and bar fits the screen.
    pub fn validate(&self) -> anyhow::Result<()> {
        let (width, height) = self.display.orientation.dimensions();

        if self.refresh_interval.is_zero() {
            bail!("refresh_interval must be positive");
        }
        if self.display.brightness > 100 {
            bail!("Brightness is a percentage: {} > 100", self.display.brightness);
        }

        for (name, style) in &self.styles {
            if !self.fonts.contains_key(&style.font) {
                bail!("Style {name:?} uses unknown font {:?}", style.font);
            }
            if style.size <= 0.0 {
                bail!("Style {name:?} must have a positive size");
            }
        }

        for label in &self.labels {
            self.style(&label.style)?;
            if label.x >= width || label.y >= height {
                bail!(
                    "Label {:?} at ({}, {}) is outside the {width}x{height} screen",
                    label.text,
                    label.x,
                    label.y
                );
            }
        }

        for (index, field) in self.fields.iter().enumerate() {
            self.style(&field.style)?;
            if field.x >= width || field.y >= height {
                bail!(
                    "Field #{index} at ({}, {}) is outside the {width}x{height} screen",
                    field.x,
                    field.y
                );
            }
            if let Widget::ProgressBar {
                width: bar_width,
                height: bar_height,
                min,
                max,
                ..
            } = field.widget
            {
                if bar_width == 0 || bar_height == 0 {
                    bail!("Progress bar #{index} must have a non-empty size");
                }
                if field.x.saturating_add(bar_width) > width || field.y.saturating_add(bar_height) > height {
                    bail!(
                        "Progress bar #{index} ({}, {}, {bar_width}x{bar_height}) exceeds the {width}x{height} screen",
                        field.x,
                        field.y
                    );
                }
                if min >= max {
                    bail!("Progress bar #{index} has an empty range: {min} >= {max}");
                }
            }
            match &field.source {
                FieldSource::Throughput { .. } if self.traffic.is_none() => {
                    bail!("Field #{index} shows throughput but [traffic] is not configured");
                }
                FieldSource::Clock { .. } if matches!(field.widget, Widget::ProgressBar { .. }) => {
                    bail!("Field #{index} cannot draw a clock as a progress bar");
                }
                _ => {}
            }
        }

        Ok(())
    }

    pub fn needs_throughput(&self) -> bool {
        self.fields
            .iter()
            .any(|field| matches!(field.source, FieldSource::Throughput { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [display]
        revision = "SIMU"

        [fonts]
        mono = "/usr/share/fonts/RobotoMono-Medium.ttf"

        [styles.value]
        font = "mono"
        size = 25

        [[labels]]
        text = "Office:"
        x = 10
        y = 50
        style = "value"

        [[fields]]
        x = 150
        y = 50
        style = "value"
        template = "{}º"
        source = { type = "last_over_time", metric = "thermometer_temperature_celsius", selector = "room='Office'", window = "1h" }
    "#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = DashboardConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.refresh_interval, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.display.revision, Revision::Simulated);
        assert_eq!(config.display.port, PortSelector::Auto);
        assert_eq!(config.display.brightness, 15);
        assert_eq!(config.display.orientation, Orientation::Portrait);

        let style = config.style("value").unwrap();
        assert_eq!(style.color, Color::WHITE);
        assert_eq!(style.background, Color::BLACK);

        let field = &config.fields[0];
        assert_eq!(field.format, FormatRule::Integer);
        assert_eq!(field.fallback, Fallback::Err);
        assert_eq!(field.widget, Widget::Text);
        assert_eq!(field.template.render("21"), "21º");
        assert_eq!(
            field.source.expression().as_deref(),
            Some("last_over_time(thermometer_temperature_celsius{room='Office'}[1h])")
        );
        assert!(!config.needs_throughput());
    }

    #[test]
    fn test_shipped_layout_is_valid() {
        let config = DashboardConfig::from_toml(include_str!("../../dashboard.toml")).unwrap();
        assert_eq!(config.display.orientation, Orientation::Landscape);
        assert!(config.needs_throughput());
        assert!(matches!(
            config.traffic.as_ref().map(|t| &t.source),
            Some(CounterSourceConfig::Router { .. })
        ));
    }

    #[test]
    fn test_prometheus_traffic_layout_is_valid() {
        let config = DashboardConfig::from_toml(include_str!("../../dashboard-prometheus.toml")).unwrap();
        assert_eq!(config.display.orientation, Orientation::Portrait);
        assert_eq!(config.display.revision, Revision::Simulated);
        assert!(matches!(
            config.traffic.as_ref().map(|t| &t.source),
            Some(CounterSourceConfig::Prometheus { .. })
        ));
        assert!(config
            .fields
            .iter()
            .any(|field| matches!(field.source, FieldSource::Clock { .. })));
    }

    #[test]
    fn test_unknown_revision_is_rejected() {
        let raw = MINIMAL.replace("\"SIMU\"", "\"C\"");
        assert!(DashboardConfig::from_toml(&raw).is_err());
    }

    #[test]
    fn test_huge_progress_bar_is_rejected() {
        let raw = format!(
            "{MINIMAL}\nwidget = {{ type = \"progress_bar\", width = 4294967295, height = 4294967295, min = 0, max = 5 }}\n"
        );
        let err = DashboardConfig::from_toml(&raw).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_out_of_screen_field_is_rejected() {
        let raw = MINIMAL.replace("x = 150", "x = 400");
        let err = DashboardConfig::from_toml(&raw).unwrap_err();
        assert!(err.to_string().contains("outside"));

        // The same x fits once the screen is turned sideways.
        let raw = raw.replace("revision = \"SIMU\"", "revision = \"SIMU\"\norientation = \"landscape\"");
        assert!(DashboardConfig::from_toml(&raw).is_ok());
    }

    #[test]
    fn test_progress_bar_must_fit() {
        let raw = format!(
            "{MINIMAL}\n{}",
            r#"
            [[fields]]
            x = 240
            y = 225
            style = "value"
            source = { type = "query", query = "solar_kw" }
            widget = { type = "progress_bar", width = 140, height = 30, min = 0, max = 5 }
            "#
        );
        assert!(DashboardConfig::from_toml(&raw).is_err());

        let raw = raw.replace("x = 240", "x = 100");
        let config = DashboardConfig::from_toml(&raw).unwrap();
        assert_eq!(
            config.fields[1].widget,
            Widget::ProgressBar {
                width: 140,
                height: 30,
                min: 0.0,
                max: 5.0,
                outline: true
            }
        );
    }

    #[test]
    fn test_unknown_style_and_font_are_rejected() {
        let raw = MINIMAL.replace("style = \"value\"\n        template", "style = \"nope\"\n        template");
        assert!(DashboardConfig::from_toml(&raw).is_err());

        let raw = MINIMAL.replace("font = \"mono\"", "font = \"missing\"");
        assert!(DashboardConfig::from_toml(&raw).is_err());
    }

    #[test]
    fn test_throughput_requires_traffic_source() {
        let raw = format!(
            "{MINIMAL}\n{}",
            r#"
            [[fields]]
            x = 10
            y = 300
            style = "value"
            format = "mebibits"
            source = { type = "throughput", direction = "download" }
            "#
        );
        assert!(DashboardConfig::from_toml(&raw).is_err());

        let raw = format!(
            "{raw}\n{}",
            r#"
            [traffic.source]
            type = "interface"
            interfaces = [{ Name = { Equal = "eth0" } }]
            "#
        );
        let config = DashboardConfig::from_toml(&raw).unwrap();
        assert!(config.needs_throughput());
    }

    #[test]
    fn test_prometheus_duration() {
        assert_eq!(prometheus_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(prometheus_duration(Duration::from_secs(300)), "5m");
        assert_eq!(prometheus_duration(Duration::from_secs(45)), "45s");
    }
}
