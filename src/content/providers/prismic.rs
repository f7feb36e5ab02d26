use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use crate::content::{
    ContentError, ContentSource, Ordering, Paginated, PrismicConfig, QueryOptions, RawDocument,
};

#[derive(Debug, Deserialize)]
struct ApiInfo {
    #[serde(default)]
    refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "isMasterRef", default)]
    is_master_ref: bool,
}

/// Client for a Prismic-compatible REST API (v2).
pub struct PrismicSource {
    client: Client,
    endpoint: Url,
    access_token: Option<String>,
}

impl PrismicSource {
    pub fn new(config: &PrismicConfig) -> Result<Self, ContentError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            ContentError::ConfigError(format!("Invalid endpoint {}: {}", config.endpoint, e))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(ContentError::ConfigError(format!(
                "Endpoint cannot be used as a base URL: {}",
                config.endpoint
            )));
        }

        let client = Client::builder()
            .user_agent(concat!("spacetraveling/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ContentError::ConfigError(format!("Failed to build client: {}", e)))?;

        let access_token = config
            .access_token
            .clone()
            .or_else(|| std::env::var("PRISMIC_ACCESS_TOKEN").ok())
            .filter(|token| !token.is_empty());

        Ok(Self {
            client,
            endpoint,
            access_token,
        })
    }

    fn with_token(&self, mut url: Url) -> Url {
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        url
    }

    fn search_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("documents").push("search");
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ContentError> {
        // The query string may carry the access token, keep it out of logs.
        debug!("GET {}", url.path());

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            error!("Request to {} failed: {}", url.path(), e);
            ContentError::Unavailable(e.without_url().to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            error!("Content API returned {} for {}", status, url.path());
            return Err(ContentError::Unavailable(format!(
                "{} returned {}",
                url.path(),
                status
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ContentError::InvalidResponse(e.without_url().to_string()))
    }

    async fn master_ref(&self) -> Result<String, ContentError> {
        let info: ApiInfo = self.get_json(self.with_token(self.endpoint.clone())).await?;
        info.refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or_else(|| ContentError::InvalidResponse("API has no master ref".to_string()))
    }

    async fn resolve_ref(&self, preview_ref: Option<&str>) -> Result<String, ContentError> {
        match preview_ref {
            Some(reference) => Ok(reference.to_string()),
            None => self.master_ref().await,
        }
    }

    async fn search(
        &self,
        predicate: &str,
        options: &QueryOptions,
    ) -> Result<Paginated<RawDocument>, ContentError> {
        let reference = self.resolve_ref(options.preview_ref.as_deref()).await?;

        let mut url = self.search_url();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("ref", &reference);
            query.append_pair("q", predicate);
            query.append_pair("pageSize", &options.effective_page_size().to_string());
            if let Some(page) = options.page {
                query.append_pair("page", &page.to_string());
            }
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

        let page = self.get_json(self.with_token(url)).await?;
        Ok(public_page(page))
    }
}

/// Cursors leave the server, so the token is taken out of them and put
/// back when they are followed.
fn public_page(mut page: Paginated<RawDocument>) -> Paginated<RawDocument> {
    page.next_page = page.next_page.map(|cursor| strip_token(&cursor));
    page.prev_page = page.prev_page.map(|cursor| strip_token(&cursor));
    page
}

fn without_token(url: &Url) -> Url {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "access_token")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut clean = url.clone();
    if pairs.is_empty() {
        clean.set_query(None);
    } else {
        clean.query_pairs_mut().clear().extend_pairs(pairs);
    }
    clean
}

/// Drops the `access_token` parameter from a cursor URL. Values that do not
/// parse are returned as they are.
pub fn strip_token(cursor: &str) -> String {
    match Url::parse(cursor) {
        Ok(url) => without_token(&url).to_string(),
        Err(_) => cursor.to_string(),
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

pub fn type_predicate(document_type: &str) -> String {
    format!("[[at(document.type,{})]]", quote(document_type))
}

pub fn uid_predicate(document_type: &str, uid: &str) -> String {
    format!("[[at(my.{}.uid,{})]]", document_type, quote(uid))
}

#[async_trait]
impl ContentSource for PrismicSource {
    async fn query_by_type(
        &self,
        document_type: &str,
        options: &QueryOptions,
    ) -> Result<Paginated<RawDocument>, ContentError> {
        self.search(&type_predicate(document_type), options).await
    }

    async fn get_by_uid(
        &self,
        document_type: &str,
        uid: &str,
        preview_ref: Option<&str>,
    ) -> Result<RawDocument, ContentError> {
        let options = QueryOptions {
            page_size: Some(1),
            preview_ref: preview_ref.map(str::to_string),
            ..Default::default()
        };
        let response = self
            .search(&uid_predicate(document_type, uid), &options)
            .await?;

        response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ContentError::NotFound(uid.to_string()))
    }

    async fn fetch_page(&self, cursor: &str) -> Result<Paginated<RawDocument>, ContentError> {
        let url = Url::parse(cursor).map_err(|e| ContentError::InvalidCursor(e.to_string()))?;

        // Cursors are replayed from client input, only follow our own API.
        if url.origin() != self.endpoint.origin() {
            return Err(ContentError::InvalidCursor(format!(
                "cursor origin does not match {}",
                self.endpoint.origin().ascii_serialization()
            )));
        }

        let page = self.get_json(self.with_token(without_token(&url))).await?;
        Ok(public_page(page))
    }

    fn name(&self) -> &str {
        "Prismic"
    }
}
