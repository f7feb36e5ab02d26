use super::richtext::RichTextNode;
use crate::content::Ordering;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub uid: String,
    pub first_publication_date: Option<DateTime<Utc>>,
    pub last_publication_date: Option<DateTime<Utc>>,
    pub data: PostData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostData {
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub banner: Banner,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Banner {
    pub url: String,
    pub alt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentBlock {
    pub heading: String,
    pub body: Vec<RichTextNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub uid: String,
    pub first_publication_date: Option<DateTime<Utc>>,
    pub data: PostSummaryData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostSummaryData {
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

/// One page of the listing. A `None` cursor means there is nothing more to
/// load; any other value is passed back to `load_more` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostPagination {
    pub next_page: Option<String>,
    pub results: Vec<PostSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostLink {
    pub uid: String,
    pub title: String,
}

/// Everything the detail template needs for one post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostPage {
    pub post: Post,
    pub read_time_minutes: usize,
    pub is_edited: bool,
    pub prev_post: Option<PostLink>,
    pub next_post: Option<PostLink>,
    pub preview: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// First resolution for this slug is still running.
    Pending,
    Resolved(Arc<PostPage>),
    NotFound,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlogConfig {
    pub document_type: String,
    pub page_size: u32,
    /// Ordering clause for the listing, e.g. `document.first_publication_date desc`.
    pub ordering: String,
    pub revalidate_seconds: u64,
    /// Resolve every known post at startup.
    pub prerender: bool,
    pub index_template: String,
    pub post_template: String,
    pub words_per_minute: usize,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            document_type: String::from("posts"),
            page_size: 3,
            ordering: String::from("document.first_publication_date desc"),
            revalidate_seconds: 60 * 60,
            prerender: false,
            index_template: String::from("pages/index.html.liquid"),
            post_template: String::from("pages/post.html.liquid"),
            words_per_minute: 200,
        }
    }
}

impl BlogConfig {
    pub fn listing_orderings(&self) -> Vec<Ordering> {
        Ordering::parse(&self.ordering).into_iter().collect()
    }

    /// Field projection for listing queries.
    pub fn summary_fields(&self) -> Vec<String> {
        ["title", "subtitle", "author"]
            .iter()
            .map(|field| format!("{}.{}", self.document_type, field))
            .collect()
    }
}
