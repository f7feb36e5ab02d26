use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A document exactly as the content API returns it. `data` is left
/// untyped; shaping it is the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(rename = "type", default)]
    pub document_type: String,
    #[serde(default)]
    pub first_publication_date: Option<String>,
    #[serde(default)]
    pub last_publication_date: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub results_per_page: u32,
    #[serde(default)]
    pub results_size: u32,
    #[serde(default)]
    pub total_results_size: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub next_page: Option<String>,
    #[serde(default)]
    pub prev_page: Option<String>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub field: String,
    pub descending: bool,
}

impl Ordering {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Parses a single `field [desc]` clause.
    pub fn parse(clause: &str) -> Option<Self> {
        let mut parts = clause.split_whitespace();
        let field = parts.next()?;
        let descending = match parts.next() {
            None => false,
            Some(direction) if direction.eq_ignore_ascii_case("desc") => true,
            Some(direction) if direction.eq_ignore_ascii_case("asc") => false,
            Some(_) => return None,
        };
        Some(Self {
            field: field.to_string(),
            descending,
        })
    }

    /// Renders the bracketed list form used on the wire:
    /// `[document.first_publication_date desc,my.posts.title]`.
    pub fn to_param(orderings: &[Ordering]) -> String {
        let clauses: Vec<String> = orderings.iter().map(|o| o.to_string()).collect();
        format!("[{}]", clauses.join(","))
    }

    pub fn parse_param(param: &str) -> Vec<Ordering> {
        param
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .filter_map(Ordering::parse)
            .collect()
    }
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "{} desc", self.field)
        } else {
            write!(f, "{}", self.field)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub orderings: Vec<Ordering>,
    pub page_size: Option<u32>,
    pub page: Option<u32>,
    /// Only return documents that come after this document id in the
    /// requested ordering.
    pub after: Option<String>,
    /// Field projection such as `posts.title`.
    pub fetch: Vec<String>,
    pub preview_ref: Option<String>,
}

impl QueryOptions {
    pub fn effective_page_size(&self) -> u32 {
        match self.page_size {
            Some(0) | None => DEFAULT_PAGE_SIZE,
            Some(size) => size.min(MAX_PAGE_SIZE),
        }
    }
}

/// Parses the timestamp formats the content API emits. Prismic writes
/// offsets without a colon (`2021-03-25T19:25:28+0000`), which RFC 3339
/// parsing rejects.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(date) = DateTime::parse_from_str(value, format) {
            return Some(date.with_timezone(&Utc));
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_ordering_param_round_trip() {
        let orderings = vec![
            Ordering::desc("document.first_publication_date"),
            Ordering::asc("my.posts.title"),
        ];
        let param = Ordering::to_param(&orderings);
        assert_eq!(
            param,
            "[document.first_publication_date desc,my.posts.title]"
        );
        assert_eq!(Ordering::parse_param(&param), orderings);
    }

    #[test]
    fn test_ordering_rejects_unknown_direction() {
        assert!(Ordering::parse("document.id sideways").is_none());
        assert!(Ordering::parse("").is_none());
    }

    #[test]
    fn test_parse_prismic_timestamp() {
        let date = parse_timestamp("2021-03-25T19:25:28+0000").unwrap();
        assert_eq!(date.year(), 2021);
        assert_eq!(date.month(), 3);
        assert_eq!(date.day(), 25);
        assert_eq!(date.hour(), 19);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2021-03-25T19:25:28Z").is_some());
        assert!(parse_timestamp("2021-03-25T19:25:28.123+0000").is_some());
        assert!(parse_timestamp("2021-03-25").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_effective_page_size() {
        let mut options = QueryOptions::default();
        assert_eq!(options.effective_page_size(), DEFAULT_PAGE_SIZE);
        options.page_size = Some(0);
        assert_eq!(options.effective_page_size(), DEFAULT_PAGE_SIZE);
        options.page_size = Some(500);
        assert_eq!(options.effective_page_size(), MAX_PAGE_SIZE);
        options.page_size = Some(3);
        assert_eq!(options.effective_page_size(), 3);
    }

    #[test]
    fn test_raw_document_defaults() {
        let doc: RawDocument = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(doc.id, "abc");
        assert!(doc.uid.is_none());
        assert!(doc.first_publication_date.is_none());
        assert!(doc.data.is_null());
    }
}
