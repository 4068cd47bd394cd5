use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Offset, Utc};
use std::fmt::Write;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::NormalizeError;

/// Caller-supplied date rendering options.
///
/// `date_format` uses strftime syntax (`%Y-%m-%d %H:%M %Z`). When absent, dates are
/// rendered as RFC 3339 in the effective timezone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatOptions {
    /// IANA timezone name, e.g. `America/New_York`. Defaults to UTC.
    pub date_timezone: Option<String>,
    pub date_format: Option<String>,
}

/// [`FormatOptions`] resolved and validated once per invocation.
#[derive(Debug, Clone)]
pub struct DateFormatter {
    tz: Tz,
    pattern: Option<String>,
}

impl DateFormatter {
    pub fn new(options: &FormatOptions) -> Result<Self, NormalizeError> {
        let tz = match options.date_timezone.as_deref().map(str::trim) {
            None | Some("") => Tz::UTC,
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| NormalizeError::InvalidTimezone(name.to_string()))?,
        };

        let pattern = match options.date_format.as_deref() {
            None | Some("") => None,
            Some(pattern) => {
                // chrono panics while rendering an invalid specifier, so reject it here.
                // Parse-only specifiers such as `%#z` tokenize fine but fail to render.
                let tokenizes = StrftimeItems::new(pattern).all(|item| !matches!(item, Item::Error));
                if !tokenizes || render(&DateTime::UNIX_EPOCH.with_timezone(&tz), pattern).is_none() {
                    return Err(NormalizeError::InvalidDateFormat(pattern.to_string()));
                }
                Some(pattern.to_string())
            }
        };

        Ok(Self { tz, pattern })
    }

    pub fn format(&self, date: &DateTime<Utc>) -> String {
        let local = date.with_timezone(&self.tz);
        match &self.pattern {
            Some(pattern) => match render(&local, pattern) {
                Some(rendered) => rendered,
                None => {
                    tracing::warn!(pattern = %pattern, "Date pattern failed to render, using RFC 3339");
                    rfc3339(&local)
                }
            },
            None => rfc3339(&local),
        }
    }
}

fn rfc3339(local: &DateTime<Tz>) -> String {
    let fixed = local.offset().fix();
    local.with_timezone(&fixed).to_rfc3339()
}

/// Renders through `write!` so a specifier that cannot be displayed yields
/// `None` instead of the panic `DelayedFormat::to_string` raises.
fn render(local: &DateTime<Tz>, pattern: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", local.format(pattern)).ok()?;
    Some(out)
}

impl Default for DateFormatter {
    fn default() -> Self {
        Self {
            tz: Tz::UTC,
            pattern: None,
        }
    }
}
