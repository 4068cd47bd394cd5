//! Small helpers shared by the fetch layer.
//!
//! - **Feed URL validation**: feed URLs are handed to the fetch service, which
//!   dereferences them, so internal addresses are refused before any call is made

mod feed_url;

pub use feed_url::{validate_url, UrlValidationError};
