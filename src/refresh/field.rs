use chrono::{DateTime, Local, Utc};

use crate::collect::sample::{format_value, MetricSample};
use crate::config::dashboard_config::{DisplayField, FieldSource, TextStyle, Widget};
use crate::display::{DisplaySink, ProgressBar};

/// A field with its style looked up once at startup.
#[derive(Debug, Clone)]
pub struct BoundField {
    pub field: DisplayField,
    pub style: TextStyle,
    /// Backend query, precomputed for query-backed sources.
    pub query: Option<String>,
}

impl BoundField {
    pub fn new(field: DisplayField, style: TextStyle) -> Self {
        let query = field.source.expression();
        Self {
            field,
            style,
            query,
        }
    }

    pub fn text(&self, sample: MetricSample) -> String {
        let field = &self.field;
        field
            .template
            .render(&format_value(sample, field.format, field.fallback))
    }

    pub fn clock_text(&self, now: DateTime<Utc>) -> String {
        let FieldSource::Clock { format, timezone } = &self.field.source else {
            return String::new();
        };
        let formatted = match timezone {
            Some(tz) => now.with_timezone(tz).format(format).to_string(),
            None => now.with_timezone(&Local).format(format).to_string(),
        };
        self.field.template.render(&formatted)
    }

    pub fn draw_sample(&self, display: &mut dyn DisplaySink, sample: MetricSample) -> anyhow::Result<()> {
        let field = &self.field;
        match field.widget {
            Widget::Text => display.draw_text(&self.text(sample), field.x, field.y, &self.style),
            Widget::ProgressBar {
                width,
                height,
                min,
                max,
                outline,
            } => display.draw_progress_bar(&ProgressBar {
                x: field.x,
                y: field.y,
                width,
                height,
                min,
                max,
                // An unknown value shows an empty bar.
                value: sample.value().unwrap_or(min),
                color: self.style.color,
                outline,
                background: self.style.background,
            }),
        }
    }
}
