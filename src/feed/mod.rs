//! Feed handling: configuration registry, retrieval, parsing and filtering.
//!
//! - [`registry`] - the configured feed list, in processing order
//! - [`fetcher`] - HTTP retrieval with timeout, retry and size limits
//! - [`parser`] - RSS/Atom/JSON Feed parsing via `feed-rs`
//! - [`filter`] - keyword include/exclude policy and per-feed cap
//!
//! # Example
//!
//! ```ignore
//! use newsroom::feed::{filter, FeedFetcher};
//!
//! let entries = fetcher.fetch(&config.name, &config.url).await?;
//! let eligible = filter::apply(entries, &config);
//! ```

pub mod fetcher;
pub mod filter;
pub mod parser;
pub mod registry;

pub use fetcher::{build_client, FeedFetcher, FetchError};
pub use parser::{parse_feed, ParseError, RawEntry};
pub use registry::{FeedRegistry, RegistryError};
