use anyhow::{anyhow, bail};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Align {
    Left,
    Right,
}

/// A single-placeholder text template such as `"{}º"` or `"DL: {:>12}"`.
///
/// The placeholder accepts an optional `:>N` (right-align) or `:<N` / `:N`
/// (left-align) width, mirroring the padding used to overwrite stale digits
/// on the panel.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Template {
    prefix: String,
    suffix: String,
    align: Align,
    width: usize,
}

impl Template {
    pub fn parse(source: &str) -> anyhow::Result<Self> {
        let open = source
            .find('{')
            .ok_or_else(|| anyhow!("Template {source:?} has no {{}} placeholder"))?;
        let close = source[open..]
            .find('}')
            .map(|offset| open + offset)
            .ok_or_else(|| anyhow!("Template {source:?} has an unclosed placeholder"))?;

        let prefix = &source[..open];
        let spec = &source[open + 1..close];
        let suffix = &source[close + 1..];

        if suffix.contains('{') || suffix.contains('}') || prefix.contains('}') {
            bail!("Template {source:?} must contain exactly one placeholder");
        }

        let (align, width) = match spec.strip_prefix(':') {
            None if spec.is_empty() => (Align::Left, 0),
            None => bail!("Template {source:?} has an invalid placeholder {{{spec}}}"),
            Some(format) => {
                let (align, digits) = if let Some(digits) = format.strip_prefix('>') {
                    (Align::Right, digits)
                } else if let Some(digits) = format.strip_prefix('<') {
                    (Align::Left, digits)
                } else {
                    (Align::Left, format)
                };
                let width = digits
                    .parse::<usize>()
                    .map_err(|_| anyhow!("Template {source:?} has an invalid width {digits:?}"))?;
                (align, width)
            }
        };

        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            align,
            width,
        })
    }

    pub fn render(&self, value: &str) -> String {
        let (prefix, suffix, width) = (&self.prefix, &self.suffix, self.width);
        match self.align {
            Align::Right => format!("{prefix}{value:>width$}{suffix}"),
            Align::Left => format!("{prefix}{value:<width$}{suffix}"),
        }
    }
}

impl Default for Template {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            align: Align::Left,
            width: 0,
        }
    }
}

impl TryFrom<String> for Template {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Template::parse(&value)
    }
}
