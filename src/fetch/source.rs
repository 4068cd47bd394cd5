use feed_rs::model::Entry;
use feed_rs::parser;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::normalize::{RawRecord, RawValue};

#[derive(Debug, Error)]
pub enum SourceError {
    /// The payload is not a feed the source understands.
    #[error("Invalid feed payload: {0}")]
    InvalidFeed(String),
}

/// Turns a successful fetch payload into one raw record per article.
pub trait ArticleSource: Send + Sync {
    fn articles(&self, body: &str) -> Result<Vec<RawRecord>, SourceError>;
}

/// Reads RSS, Atom and JSON Feed payloads with `feed-rs`.
///
/// Each entry becomes a map with these fields when present: `id`, `title`,
/// `description` (summary), `content`, `link`, `links`, `author`, `authors`,
/// `categories` (terms), `published`, `updated` (dates), `source`, `rights`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedRsSource;

impl ArticleSource for FeedRsSource {
    fn articles(&self, body: &str) -> Result<Vec<RawRecord>, SourceError> {
        let feed =
            parser::parse(body.as_bytes()).map_err(|e| SourceError::InvalidFeed(e.to_string()))?;
        Ok(feed.entries.into_iter().map(entry_to_record).collect())
    }
}

fn entry_to_record(entry: Entry) -> RawRecord {
    let mut fields = BTreeMap::new();
    let mut put = |key: &str, value: RawValue| {
        fields.insert(key.to_string(), value);
    };

    put("id", RawValue::from(entry.id));
    if let Some(title) = entry.title {
        put("title", RawValue::from(title.content));
    }
    if let Some(summary) = entry.summary {
        put("description", RawValue::from(summary.content));
    }
    if let Some(body) = entry.content.and_then(|c| c.body) {
        put("content", RawValue::from(body));
    }
    if let Some(first) = entry.links.first() {
        put("link", RawValue::from(first.href.as_str()));
    }
    put(
        "links",
        RawValue::List(
            entry
                .links
                .into_iter()
                .map(|link| {
                    let mut map = BTreeMap::new();
                    map.insert("href".to_string(), RawValue::from(link.href));
                    if let Some(rel) = link.rel {
                        map.insert("rel".to_string(), RawValue::from(rel));
                    }
                    if let Some(title) = link.title {
                        map.insert("title".to_string(), RawValue::from(title));
                    }
                    RawValue::Map(map)
                })
                .collect(),
        ),
    );
    if let Some(first) = entry.authors.first() {
        put("author", RawValue::from(first.name.as_str()));
    }
    put(
        "authors",
        RawValue::List(
            entry
                .authors
                .into_iter()
                .map(|person| {
                    let mut map = BTreeMap::new();
                    map.insert("name".to_string(), RawValue::from(person.name));
                    if let Some(email) = person.email {
                        map.insert("email".to_string(), RawValue::from(email));
                    }
                    if let Some(uri) = person.uri {
                        map.insert("uri".to_string(), RawValue::from(uri));
                    }
                    RawValue::Map(map)
                })
                .collect(),
        ),
    );
    put(
        "categories",
        RawValue::List(
            entry
                .categories
                .into_iter()
                .map(|c| RawValue::from(c.term))
                .collect(),
        ),
    );
    if let Some(published) = entry.published {
        put("published", RawValue::Date(published));
    }
    if let Some(updated) = entry.updated {
        put("updated", RawValue::Date(updated));
    }
    if let Some(source) = entry.source {
        put("source", RawValue::from(source));
    }
    if let Some(rights) = entry.rights {
        put("rights", RawValue::from(rights.content));
    }

    RawValue::Map(fields)
}
