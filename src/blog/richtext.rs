//! Structured text as stored by the content API: a list of blocks, each with
//! plain text and character-offset spans for inline formatting.

use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichTextNode {
    Heading {
        level: u8,
        text: String,
        spans: Vec<Span>,
    },
    Paragraph {
        text: String,
        spans: Vec<Span>,
    },
    Preformatted {
        text: String,
        spans: Vec<Span>,
    },
    ListItem {
        text: String,
        spans: Vec<Span>,
    },
    OrderedListItem {
        text: String,
        spans: Vec<Span>,
    },
    Image {
        url: String,
        alt: String,
    },
    Embed {
        html: String,
    },
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub kind: SpanKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SpanKind {
    Strong,
    Em,
    Hyperlink { url: String, new_tab: bool },
    Label(String),
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn decode_span(value: &Value) -> Option<Span> {
    let start = value.get("start")?.as_u64()? as usize;
    let end = value.get("end")?.as_u64()? as usize;
    let data = value.get("data").cloned().unwrap_or(Value::Null);

    let kind = match value.get("type")?.as_str()? {
        "strong" => SpanKind::Strong,
        "em" => SpanKind::Em,
        "hyperlink" => SpanKind::Hyperlink {
            url: str_field(&data, "url"),
            new_tab: data.get("target").and_then(Value::as_str) == Some("_blank"),
        },
        "label" => SpanKind::Label(str_field(&data, "label")),
        _ => return None,
    };

    Some(Span { start, end, kind })
}

fn decode_spans(value: &Value) -> Vec<Span> {
    value
        .get("spans")
        .and_then(Value::as_array)
        .map(|spans| spans.iter().filter_map(decode_span).collect())
        .unwrap_or_default()
}

/// Decodes one node. Unrecognized node types become `Unknown` instead of
/// failing the whole post.
pub fn decode_node(value: &Value) -> RichTextNode {
    let text = str_field(value, "text");
    let node_type = value.get("type").and_then(Value::as_str).unwrap_or_default();

    match node_type {
        "paragraph" => RichTextNode::Paragraph {
            text,
            spans: decode_spans(value),
        },
        "preformatted" => RichTextNode::Preformatted {
            text,
            spans: decode_spans(value),
        },
        "list-item" => RichTextNode::ListItem {
            text,
            spans: decode_spans(value),
        },
        "o-list-item" => RichTextNode::OrderedListItem {
            text,
            spans: decode_spans(value),
        },
        "image" => RichTextNode::Image {
            url: str_field(value, "url"),
            alt: str_field(value, "alt"),
        },
        "embed" => RichTextNode::Embed {
            html: value
                .get("oembed")
                .map(|oembed| str_field(oembed, "html"))
                .unwrap_or_default(),
        },
        heading if heading.starts_with("heading") => {
            match heading["heading".len()..].parse::<u8>() {
                Ok(level @ 1..=6) => RichTextNode::Heading {
                    level,
                    text,
                    spans: decode_spans(value),
                },
                _ => RichTextNode::Unknown,
            }
        }
        _ => RichTextNode::Unknown,
    }
}

pub fn decode_nodes(value: &Value) -> Vec<RichTextNode> {
    value
        .as_array()
        .map(|nodes| nodes.iter().map(decode_node).collect())
        .unwrap_or_default()
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn open_tag(kind: &SpanKind) -> String {
    match kind {
        SpanKind::Strong => "<strong>".to_string(),
        SpanKind::Em => "<em>".to_string(),
        SpanKind::Hyperlink { url, new_tab: true } => format!(
            r#"<a href="{}" target="_blank" rel="noopener noreferrer">"#,
            escape_html(url)
        ),
        SpanKind::Hyperlink { url, .. } => format!(r#"<a href="{}">"#, escape_html(url)),
        SpanKind::Label(label) => format!(r#"<span class="{}">"#, escape_html(label)),
    }
}

fn close_tag(kind: &SpanKind) -> &'static str {
    match kind {
        SpanKind::Strong => "</strong>",
        SpanKind::Em => "</em>",
        SpanKind::Hyperlink { .. } => "</a>",
        SpanKind::Label(_) => "</span>",
    }
}

/// Renders text with its spans applied. Offsets count characters.
/// Overlapping spans are split so the output stays well nested.
pub fn render_spans(text: &str, spans: &[Span]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let spans: Vec<Span> = spans
        .iter()
        .map(|span| Span {
            start: span.start.min(len),
            end: span.end.min(len),
            kind: span.kind.clone(),
        })
        .filter(|span| span.start < span.end)
        .collect();

    let mut out = String::new();
    let mut open: Vec<&Span> = Vec::new();

    for i in 0..=len {
        if let Some(lowest) = open.iter().position(|span| span.end == i) {
            let closed = open.split_off(lowest);
            for span in closed.iter().rev() {
                out.push_str(close_tag(&span.kind));
            }
            for span in closed {
                if span.end != i {
                    out.push_str(&open_tag(&span.kind));
                    open.push(span);
                }
            }
        }

        let mut starting: Vec<&Span> = spans.iter().filter(|span| span.start == i).collect();
        starting.sort_by(|a, b| b.end.cmp(&a.end));
        for span in starting {
            out.push_str(&open_tag(&span.kind));
            open.push(span);
        }

        if let Some(&c) = chars.get(i) {
            match c {
                '\n' => out.push_str("<br />"),
                _ => out.push_str(&escape_html(&c.to_string())),
            }
        }
    }

    out
}

#[derive(PartialEq)]
enum ListKind {
    Unordered,
    Ordered,
}

pub fn as_html(nodes: &[RichTextNode]) -> String {
    let mut out = String::new();
    let mut list: Option<ListKind> = None;

    for node in nodes {
        let wanted = match node {
            RichTextNode::ListItem { .. } => Some(ListKind::Unordered),
            RichTextNode::OrderedListItem { .. } => Some(ListKind::Ordered),
            _ => None,
        };

        if list != wanted {
            match list {
                Some(ListKind::Unordered) => out.push_str("</ul>"),
                Some(ListKind::Ordered) => out.push_str("</ol>"),
                None => {}
            }
            match wanted {
                Some(ListKind::Unordered) => out.push_str("<ul>"),
                Some(ListKind::Ordered) => out.push_str("<ol>"),
                None => {}
            }
            list = wanted;
        }

        match node {
            RichTextNode::Heading { level, text, spans } => {
                let _ = write!(out, "<h{0}>{1}</h{0}>", level, render_spans(text, spans));
            }
            RichTextNode::Paragraph { text, spans } => {
                let _ = write!(out, "<p>{}</p>", render_spans(text, spans));
            }
            RichTextNode::Preformatted { text, spans } => {
                let _ = write!(out, "<pre>{}</pre>", render_spans(text, spans));
            }
            RichTextNode::ListItem { text, spans }
            | RichTextNode::OrderedListItem { text, spans } => {
                let _ = write!(out, "<li>{}</li>", render_spans(text, spans));
            }
            RichTextNode::Image { url, alt } => {
                let _ = write!(
                    out,
                    r#"<p class="block-img"><img src="{}" alt="{}" /></p>"#,
                    escape_html(url),
                    escape_html(alt)
                );
            }
            // oEmbed markup comes from the CMS and is trusted as-is.
            RichTextNode::Embed { html } => {
                let _ = write!(out, r#"<div class="embed">{}</div>"#, html);
            }
            RichTextNode::Unknown => {}
        }
    }

    match list {
        Some(ListKind::Unordered) => out.push_str("</ul>"),
        Some(ListKind::Ordered) => out.push_str("</ol>"),
        None => {}
    }

    out
}

pub fn as_text(nodes: &[RichTextNode]) -> String {
    nodes
        .iter()
        .filter_map(|node| match node {
            RichTextNode::Heading { text, .. }
            | RichTextNode::Paragraph { text, .. }
            | RichTextNode::Preformatted { text, .. }
            | RichTextNode::ListItem { text, .. }
            | RichTextNode::OrderedListItem { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
