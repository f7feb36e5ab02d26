use super::{cache::RevalidatingCache, error::BlogError, projection, types::*};
use crate::content::{DynContentSource, Paginated, QueryOptions, RawDocument};
use std::time::Duration;
use tracing::{debug, info, warn};

const INITIAL_PAGE_KEY: &str = "initial";

pub struct ListingController {
    source: DynContentSource,
    config: BlogConfig,
    cache: RevalidatingCache<PostPagination>,
}

fn to_pagination(response: Paginated<RawDocument>) -> PostPagination {
    PostPagination {
        next_page: response.next_page.filter(|cursor| !cursor.is_empty()),
        results: response
            .results
            .iter()
            .map(projection::project_summary)
            .collect(),
    }
}

impl ListingController {
    pub fn new(source: DynContentSource, config: BlogConfig) -> Self {
        let cache = RevalidatingCache::new(Duration::from_secs(config.revalidate_seconds));
        Self {
            source,
            config,
            cache,
        }
    }

    pub fn get_config(&self) -> &BlogConfig {
        &self.config
    }

    /// First page of the listing, reused for the revalidation window.
    pub async fn build_initial_page(&self) -> Result<PostPagination, BlogError> {
        self.cache
            .get_or_try_init(INITIAL_PAGE_KEY, || self.fetch_initial_page())
            .await
    }

    async fn fetch_initial_page(&self) -> Result<PostPagination, BlogError> {
        let options = QueryOptions {
            orderings: self.config.listing_orderings(),
            page_size: Some(self.config.page_size),
            fetch: self.config.summary_fields(),
            ..Default::default()
        };

        let response = self
            .source
            .query_by_type(&self.config.document_type, &options)
            .await?;

        info!(
            "Fetched initial listing from {}: {} of {} posts",
            self.source.name(),
            response.results.len(),
            response.total_results_size
        );

        Ok(to_pagination(response))
    }

    /// Follows a `next_page` cursor. The caller appends the results to what
    /// it already shows and keeps the returned cursor.
    pub async fn load_more(&self, cursor: &str) -> Result<PostPagination, BlogError> {
        if cursor.trim().is_empty() {
            return Err(BlogError::InvalidCursor(cursor.to_string()));
        }

        debug!("Loading more posts");
        let response = self.source.fetch_page(cursor).await?;
        Ok(to_pagination(response))
    }

    /// Runs one "load more" cycle on `state`. Returns `Ok(false)` when there
    /// was nothing to do: no more pages, or a load is already running.
    pub async fn advance(&self, state: &mut ListingState) -> Result<bool, BlogError> {
        let Some(cursor) = state.begin_load() else {
            return Ok(false);
        };

        match self.load_more(&cursor).await {
            Ok(page) => {
                state.complete(page);
                Ok(true)
            }
            Err(e) => {
                warn!("Failed to load more posts: {}", e);
                state.fail();
                Err(e)
            }
        }
    }
}

/// Posts shown so far plus the cursor for the next batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingState {
    cursor: Option<String>,
    results: Vec<PostSummary>,
    in_flight: bool,
}

impl ListingState {
    pub fn from_initial(page: PostPagination) -> Self {
        Self {
            cursor: page.next_page,
            results: page.results,
            in_flight: false,
        }
    }

    pub fn results(&self) -> &[PostSummary] {
        &self.results
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    /// Hands out the cursor and marks a load as running. Returns `None` while
    /// another load is running or when the list is exhausted.
    pub fn begin_load(&mut self) -> Option<String> {
        if self.in_flight {
            return None;
        }
        let cursor = self.cursor.clone()?;
        self.in_flight = true;
        Some(cursor)
    }

    pub fn complete(&mut self, page: PostPagination) {
        self.results.extend(page.results);
        self.cursor = page.next_page;
        self.in_flight = false;
    }

    /// Leaves results and cursor as they were so the load can be retried.
    pub fn fail(&mut self) {
        self.in_flight = false;
    }
}
