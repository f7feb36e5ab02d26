use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering as CmpOrdering;
use tracing::{debug, info};
use url::Url;

use crate::content::{
    ContentError, ContentSource, FileConfig, Ordering, Paginated, QueryOptions, RawDocument,
    parse_timestamp,
};

const CURSOR_BASE: &str = "file:///api/v2/documents/search";

/// Serves documents from a JSON file held in memory. Queries, ordering,
/// `after` and cursors behave like the hosted API so pages render the same
/// against either source.
pub struct FileSource {
    documents: Vec<RawDocument>,
}

impl FileSource {
    pub async fn load(config: &FileConfig) -> Result<Self, ContentError> {
        let content = tokio::fs::read_to_string(&config.path).await?;
        let documents: Vec<RawDocument> = serde_json::from_str(&content).map_err(|e| {
            ContentError::InvalidResponse(format!("{:?}: {}", config.path, e))
        })?;

        info!(
            "Loaded {} documents from {:?}",
            documents.len(),
            config.path
        );

        Ok(Self::from_documents(documents))
    }

    pub fn from_documents(documents: Vec<RawDocument>) -> Self {
        Self { documents }
    }

    fn run_query(
        &self,
        document_type: &str,
        options: &QueryOptions,
    ) -> Result<Paginated<RawDocument>, ContentError> {
        let mut matching: Vec<&RawDocument> = self
            .documents
            .iter()
            .filter(|doc| doc.document_type == document_type)
            .collect();

        // Stable sort keeps file order for ties.
        matching.sort_by(|a, b| compare_documents(a, b, &options.orderings));

        if let Some(after) = &options.after {
            matching = match matching.iter().position(|doc| &doc.id == after) {
                Some(index) => matching.split_off(index + 1),
                None => Vec::new(),
            };
        }

        let page_size = options.effective_page_size();
        let page = options.page.unwrap_or(1).max(1);
        let total = matching.len() as u32;
        let total_pages = total.div_ceil(page_size);

        let start = (page - 1).saturating_mul(page_size).min(total) as usize;
        let end = (start + page_size as usize).min(matching.len());

        let results: Vec<RawDocument> = matching[start..end]
            .iter()
            .map(|doc| project_fields(doc, &options.fetch))
            .collect();

        let next_page = if page < total_pages {
            Some(build_cursor(document_type, options, page + 1)?.to_string())
        } else {
            None
        };
        let prev_page = if page > 1 && page <= total_pages.max(1) {
            Some(build_cursor(document_type, options, page - 1)?.to_string())
        } else {
            None
        };

        Ok(Paginated {
            page,
            results_per_page: page_size,
            results_size: results.len() as u32,
            total_results_size: total,
            total_pages,
            next_page,
            prev_page,
            results,
        })
    }
}

#[async_trait]
impl ContentSource for FileSource {
    async fn query_by_type(
        &self,
        document_type: &str,
        options: &QueryOptions,
    ) -> Result<Paginated<RawDocument>, ContentError> {
        if options.preview_ref.is_some() {
            debug!("File source has no drafts, ignoring preview ref");
        }
        self.run_query(document_type, options)
    }

    async fn get_by_uid(
        &self,
        document_type: &str,
        uid: &str,
        preview_ref: Option<&str>,
    ) -> Result<RawDocument, ContentError> {
        if preview_ref.is_some() {
            debug!("File source has no drafts, ignoring preview ref");
        }
        self.documents
            .iter()
            .find(|doc| doc.document_type == document_type && doc.uid.as_deref() == Some(uid))
            .cloned()
            .ok_or_else(|| ContentError::NotFound(uid.to_string()))
    }

    async fn fetch_page(&self, cursor: &str) -> Result<Paginated<RawDocument>, ContentError> {
        let (document_type, options) = parse_cursor(cursor)?;
        self.run_query(&document_type, &options)
    }

    fn name(&self) -> &str {
        "File Content Source"
    }
}

fn sort_key_date(doc: &RawDocument, field: &str) -> Option<DateTime<Utc>> {
    let value = match field {
        "document.first_publication_date" => doc.first_publication_date.as_deref(),
        "document.last_publication_date" => doc.last_publication_date.as_deref(),
        _ => None,
    };
    value.and_then(parse_timestamp)
}

fn data_field<'a>(doc: &'a RawDocument, field: &str) -> Option<&'a str> {
    // `my.<type>.<field>`
    let name = field.strip_prefix("my.")?.split_once('.')?.1;
    doc.data.get(name)?.as_str()
}

fn compare_documents(a: &RawDocument, b: &RawDocument, orderings: &[Ordering]) -> CmpOrdering {
    for ordering in orderings {
        let order = if ordering.field.starts_with("document.") {
            // Missing dates sort as oldest.
            sort_key_date(a, &ordering.field).cmp(&sort_key_date(b, &ordering.field))
        } else {
            data_field(a, &ordering.field).cmp(&data_field(b, &ordering.field))
        };
        let order = if ordering.descending {
            order.reverse()
        } else {
            order
        };
        if order != CmpOrdering::Equal {
            return order;
        }
    }
    CmpOrdering::Equal
}

fn project_fields(doc: &RawDocument, fetch: &[String]) -> RawDocument {
    if fetch.is_empty() {
        return doc.clone();
    }

    let prefix = format!("{}.", doc.document_type);
    let wanted: Vec<&str> = fetch
        .iter()
        .filter_map(|field| field.strip_prefix(&prefix))
        .collect();

    let data = match doc.data.as_object() {
        Some(object) => serde_json::Value::Object(
            object
                .iter()
                .filter(|(key, _)| wanted.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        None => doc.data.clone(),
    };

    RawDocument {
        data,
        ..doc.clone()
    }
}

fn build_cursor(
    document_type: &str,
    options: &QueryOptions,
    page: u32,
) -> Result<Url, ContentError> {
    let mut url =
        Url::parse(CURSOR_BASE).map_err(|e| ContentError::ConfigError(e.to_string()))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("type", document_type);
        query.append_pair("page", &page.to_string());
        query.append_pair("pageSize", &options.effective_page_size().to_string());
        if !options.orderings.is_empty() {
            query.append_pair("orderings", &Ordering::to_param(&options.orderings));
        }
        if let Some(after) = &options.after {
            query.append_pair("after", after);
        }
        if !options.fetch.is_empty() {
            query.append_pair("fetch", &options.fetch.join(","));
        }
    }
    Ok(url)
}

fn parse_cursor(cursor: &str) -> Result<(String, QueryOptions), ContentError> {
    let url = Url::parse(cursor).map_err(|e| ContentError::InvalidCursor(e.to_string()))?;
    if url.scheme() != "file" || url.path() != "/api/v2/documents/search" {
        return Err(ContentError::InvalidCursor(cursor.to_string()));
    }

    let mut document_type = None;
    let mut options = QueryOptions::default();

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "type" => document_type = Some(value.into_owned()),
            "page" => {
                options.page = Some(
                    value
                        .parse()
                        .map_err(|_| ContentError::InvalidCursor(cursor.to_string()))?,
                )
            }
            "pageSize" => {
                options.page_size = Some(
                    value
                        .parse()
                        .map_err(|_| ContentError::InvalidCursor(cursor.to_string()))?,
                )
            }
            "orderings" => options.orderings = Ordering::parse_param(&value),
            "after" => options.after = Some(value.into_owned()),
            "fetch" => {
                options.fetch = value
                    .split(',')
                    .filter(|field| !field.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            _ => {}
        }
    }

    let document_type =
        document_type.ok_or_else(|| ContentError::InvalidCursor(cursor.to_string()))?;
    Ok((document_type, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(id: &str, date: &str, title: &str) -> RawDocument {
        RawDocument {
            id: id.to_string(),
            uid: Some(format!("{}-slug", id)),
            document_type: "posts".to_string(),
            first_publication_date: Some(date.to_string()),
            last_publication_date: Some(date.to_string()),
            data: json!({ "title": title, "subtitle": "sub", "author": "Ana" }),
        }
    }

    fn source() -> FileSource {
        FileSource::from_documents(vec![
            document("b", "2021-02-01T10:00:00+0000", "Second"),
            document("a", "2021-01-01T10:00:00+0000", "First"),
            document("c", "2021-03-01T10:00:00+0000", "Third"),
            RawDocument {
                id: "page".to_string(),
                uid: Some("about".to_string()),
                document_type: "page".to_string(),
                first_publication_date: None,
                last_publication_date: None,
                data: json!({}),
            },
        ])
    }

    fn by_date(descending: bool) -> Vec<Ordering> {
        let field = "document.first_publication_date";
        vec![if descending {
            Ordering::desc(field)
        } else {
            Ordering::asc(field)
        }]
    }

    #[tokio::test]
    async fn test_query_filters_type_and_orders() {
        let options = QueryOptions {
            orderings: by_date(true),
            ..Default::default()
        };
        let page = source().query_by_type("posts", &options).await.unwrap();
        let ids: Vec<_> = page.results.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(page.total_results_size, 3);
        assert!(page.next_page.is_none());
    }

    #[tokio::test]
    async fn test_after_returns_following_documents() {
        let options = QueryOptions {
            orderings: by_date(true),
            after: Some("b".to_string()),
            page_size: Some(1),
            ..Default::default()
        };
        let page = source().query_by_type("posts", &options).await.unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].id, "a");

        let options = QueryOptions {
            orderings: by_date(false),
            after: Some("c".to_string()),
            page_size: Some(1),
            ..Default::default()
        };
        let page = source().query_by_type("posts", &options).await.unwrap();
        assert!(page.results.is_empty());
    }

    #[tokio::test]
    async fn test_cursor_follows_to_last_page() {
        let source = source();
        let options = QueryOptions {
            orderings: by_date(false),
            page_size: Some(2),
            ..Default::default()
        };
        let first = source.query_by_type("posts", &options).await.unwrap();
        assert_eq!(first.results.len(), 2);
        let cursor = first.next_page.expect("more pages");
        assert!(cursor.starts_with("file:///"));

        let second = source.fetch_page(&cursor).await.unwrap();
        assert_eq!(second.page, 2);
        assert_eq!(second.results.len(), 1);
        assert_eq!(second.results[0].id, "c");
        assert!(second.next_page.is_none());
        assert!(second.prev_page.is_some());
    }

    #[tokio::test]
    async fn test_fetch_projects_fields() {
        let options = QueryOptions {
            fetch: vec!["posts.title".to_string()],
            ..Default::default()
        };
        let page = source().query_by_type("posts", &options).await.unwrap();
        let data = page.results[0].data.as_object().unwrap();
        assert!(data.contains_key("title"));
        assert!(!data.contains_key("author"));
    }

    #[tokio::test]
    async fn test_get_by_uid() {
        let source = source();
        let doc = source.get_by_uid("posts", "a-slug", None).await.unwrap();
        assert_eq!(doc.id, "a");

        let missing = source.get_by_uid("posts", "about", None).await;
        assert!(matches!(missing, Err(ContentError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_foreign_cursor() {
        let result = source()
            .fetch_page("https://example.com/api/v2/documents/search?page=2")
            .await;
        assert!(matches!(result, Err(ContentError::InvalidCursor(_))));

        let result = source().fetch_page("not a url").await;
        assert!(matches!(result, Err(ContentError::InvalidCursor(_))));
    }
}
