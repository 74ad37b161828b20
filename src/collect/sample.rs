use crate::collect::rate::format_rate;
use crate::config::dashboard_config::{Fallback, FormatRule};
use crate::constants::ERR_MARKER;

/// The last known value of one query, or the marker for "could not tell".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricSample {
    Value(f64),
    Error,
}

impl MetricSample {
    pub fn value(self) -> Option<f64> {
        match self {
            MetricSample::Value(value) => Some(value),
            MetricSample::Error => None,
        }
    }
}

impl From<Option<f64>> for MetricSample {
    fn from(value: Option<f64>) -> Self {
        value.map_or(MetricSample::Error, MetricSample::Value)
    }
}

pub fn format_value(sample: MetricSample, rule: FormatRule, fallback: Fallback) -> String {
    let value = match (sample, fallback, rule) {
        (MetricSample::Value(value), _, _) => value,
        (MetricSample::Error, Fallback::Err, _) => return ERR_MARKER.to_string(),
        (MetricSample::Error, Fallback::Zero, FormatRule::Mebibits | FormatRule::Mebibytes) => 0.0,
        // A missing reading is a plain 0, never a made-up 0.0.
        (MetricSample::Error, Fallback::Zero, _) => return "0".to_string(),
    };

    match rule {
        // Ties go to the even neighbour, so 0.5 shows as 0 and 1.5 as 2.
        FormatRule::Integer => format!("{}", value.round_ties_even() as i64),
        FormatRule::OneDecimal => format!("{value:.1}"),
        FormatRule::Mebibits | FormatRule::Mebibytes => format_rate(value, rule),
    }
}
