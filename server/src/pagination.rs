//! Page window parsing and the `content-range` header contract.
//!
//! `page` and `per_page` arrive as raw query strings. A value is read up to
//! its first non-digit (`2abc` is 2). Anything absent, non-numeric, or below 1
//! falls back to the default rather than to zero or an error. The reported range is derived from the window alone and is not
//! clamped against the total.

use std::fmt;

use serde::Deserialize;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PER_PAGE: u64 = 30;

/// Raw pagination query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl PageParams {
    pub fn window(&self) -> Window {
        Window {
            page: parse_positive(self.page.as_deref(), DEFAULT_PAGE),
            per_page: parse_positive(self.per_page.as_deref(), DEFAULT_PER_PAGE),
        }
    }
}

/// Parse a strictly positive integer, or return `default`.
pub fn parse_positive(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(leading_integer)
        .filter(|value| *value >= 1)
        .unwrap_or(default)
}

/// The unsigned integer at the start of `raw`, ignoring whatever trails it.
fn leading_integer(raw: &str) -> Option<u64> {
    let raw = raw.trim_start();
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().ok()
}

/// A validated 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub page: u64,
    pub per_page: u64,
}

impl Window {
    pub fn limit(&self) -> u64 {
        self.per_page
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn content_range(&self, total: u64) -> ContentRange {
        let end = self.page.saturating_mul(self.per_page);
        ContentRange {
            begin: end - self.per_page + 1,
            end,
            total,
        }
    }
}

/// 1-based inclusive item range relative to the total row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub begin: u64,
    pub end: u64,
    pub total: u64,
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}/{}", self.begin, self.end, self.total)
    }
}
