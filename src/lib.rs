//! Fetches syndication feeds through an external feed request service and
//! turns their articles into flat, string-valued records.
//!
//! - [`fetch`] talks to the service over HTTP or a WebSocket stream, retries
//!   transport failures and interprets the service's envelope.
//! - [`normalize`] flattens nested article records, renders dates, extracts
//!   links from HTML fields and applies post-processing rules.
//! - [`config`] loads `~/.config/feedwell/config.toml` and wires a client.

pub mod config;
pub mod fetch;
pub mod normalize;
pub mod util;

pub use config::Config;
pub use fetch::{ClientError, FeedClient, FetchError, FetchOptions};
pub use normalize::{FlatRecord, NormalizeOptions, Normalizer, RawRecord};
