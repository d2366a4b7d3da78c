//! Utility functions shared by the pipeline.
//!
//! - **Text processing**: title cleanup, HTML stripping and excerpt truncation
//! - **URL validation**: scheme and private-host checks for ad-hoc imports

mod text;
mod url_validator;

pub use text::{
    clean_title, collapse_whitespace, escape_html, excerpt, strip_control_chars, strip_html,
    truncate_chars,
};
pub use url_validator::{validate_feed_url, UrlValidationError};

/// Maximum excerpt length, in characters, for imported drafts.
pub const EXCERPT_MAX_CHARS: usize = 300;
