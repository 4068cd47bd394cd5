//! Article normalization: raw nested records in, flat string records out.
//!
//! The pipeline for one record is:
//!
//! ```text
//! RawRecord → preprocess (seed) → flatten + coerce → extract links → postprocess rules
//! ```
//!
//! - [`flatten`] - depth-first key-path collapse and per-type coercion
//! - [`format`] - timezone and date pattern handling
//! - [`extract`] - image/anchor harvesting from HTML-bearing values
//! - [`rules`] - fixed pre-processing and caller-selected post-processing

pub mod extract;
pub mod flatten;
pub mod format;
pub mod record;
pub mod rules;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use format::{DateFormatter, FormatOptions};
pub use record::{FlatRecord, RawRecord, RawValue};
pub use rules::PostProcessRule;

/// Errors raised while normalizing a record.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// A non-empty map or list survived flattening. This is a defect in the
    /// pipeline or its input, never retried.
    #[error("Malformed record at key '{key}': {detail}")]
    MalformedRecord { key: String, detail: String },
    /// The requested IANA timezone does not exist.
    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),
    /// The date pattern contains an invalid strftime specifier.
    #[error("Invalid date format pattern: {0}")]
    InvalidDateFormat(String),
}

/// Per-invocation options for the normalization pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NormalizeOptions {
    pub format_options: FormatOptions,
    pub use_parser_rules: Vec<PostProcessRule>,
}

/// Normalizes raw records with options resolved once up front.
#[derive(Debug, Clone)]
pub struct Normalizer {
    formatter: DateFormatter,
    rules: Vec<PostProcessRule>,
}

impl Normalizer {
    /// # Errors
    ///
    /// Fails if the timezone or date pattern in `options` is invalid.
    pub fn new(options: &NormalizeOptions) -> Result<Self, NormalizeError> {
        Ok(Self {
            formatter: DateFormatter::new(&options.format_options)?,
            rules: options.use_parser_rules.clone(),
        })
    }

    /// Runs the full pipeline over one raw record.
    ///
    /// Pre-processing seeds the record, so a flattened key with the same name
    /// overwrites the seeded value. Extraction sees only final coerced strings.
    pub fn normalize(&self, raw: &RawRecord) -> Result<FlatRecord, NormalizeError> {
        let mut record = rules::preprocess(raw);

        for (key, value) in flatten::flatten(raw)? {
            match flatten::coerce(&key, value, &self.formatter) {
                Ok(Some(coerced)) => {
                    record.insert(key, coerced);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "Record survived flattening with nested data");
                    return Err(e);
                }
            }
        }

        let extracted = extract::extract_links(&record);
        record.extend(extracted);

        Ok(rules::postprocess(record, &self.rules))
    }

    /// Normalizes every record, stopping at the first failure.
    pub fn normalize_all(&self, raws: &[RawRecord]) -> Result<Vec<FlatRecord>, NormalizeError> {
        raws.iter().map(|raw| self.normalize(raw)).collect()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            formatter: DateFormatter::default(),
            rules: Vec::new(),
        }
    }
}
