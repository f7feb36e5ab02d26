use super::{
    richtext::{self, RichTextNode},
    types::*,
};
use crate::content::{RawDocument, parse_timestamp};
use serde_json::Value;
use tracing::debug;

fn text(data: &Value, key: &str) -> String {
    match data.get(key) {
        Some(Value::String(value)) => value.clone(),
        // Title fields may arrive as structured text instead of plain text.
        Some(Value::Array(_)) => richtext::as_text(&richtext::decode_nodes(&data[key])),
        Some(Value::Null) | None => String::new(),
        Some(other) => {
            debug!("Field {} has unexpected shape: {}", key, other);
            String::new()
        }
    }
}

fn banner(data: &Value) -> Banner {
    let banner = data.get("banner").cloned().unwrap_or(Value::Null);
    Banner {
        url: text(&banner, "url"),
        alt: text(&banner, "alt"),
    }
}

fn content_block(value: &Value) -> ContentBlock {
    let body: Vec<RichTextNode> = value
        .get("body")
        .map(richtext::decode_nodes)
        .unwrap_or_default();

    ContentBlock {
        heading: text(value, "heading"),
        body,
    }
}

fn slug(document: &RawDocument) -> String {
    document
        .uid
        .clone()
        .filter(|uid| !uid.is_empty())
        .unwrap_or_else(|| document.id.clone())
}

/// Shapes a raw document into a `Post`. Never fails; missing or malformed
/// fields fall back to empty values.
pub fn project_post(document: &RawDocument) -> Post {
    let data = &document.data;

    let content = data
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| blocks.iter().map(content_block).collect())
        .unwrap_or_default();

    Post {
        uid: slug(document),
        first_publication_date: document
            .first_publication_date
            .as_deref()
            .and_then(parse_timestamp),
        last_publication_date: document
            .last_publication_date
            .as_deref()
            .and_then(parse_timestamp),
        data: PostData {
            title: text(data, "title"),
            subtitle: text(data, "subtitle"),
            author: text(data, "author"),
            banner: banner(data),
            content,
        },
    }
}

pub fn project_summary(document: &RawDocument) -> PostSummary {
    let data = &document.data;

    PostSummary {
        uid: slug(document),
        first_publication_date: document
            .first_publication_date
            .as_deref()
            .and_then(parse_timestamp),
        data: PostSummaryData {
            title: text(data, "title"),
            subtitle: text(data, "subtitle"),
            author: text(data, "author"),
        },
    }
}

pub fn project_link(document: &RawDocument) -> PostLink {
    PostLink {
        uid: slug(document),
        title: text(&document.data, "title"),
    }
}

/// Whitespace-separated words across headings and bodies, in block order.
pub fn word_count(content: &[ContentBlock]) -> usize {
    content
        .iter()
        .map(|block| {
            block.heading.split_whitespace().count()
                + richtext::as_text(&block.body).split_whitespace().count()
        })
        .sum()
}

pub fn read_time_minutes(content: &[ContentBlock], words_per_minute: usize) -> usize {
    word_count(content).div_ceil(words_per_minute.max(1))
}

pub fn is_edited(post: &Post) -> bool {
    post.last_publication_date != post.first_publication_date
}
