use super::{
    cache::{CacheState, RevalidatingCache},
    error::BlogError,
    projection,
    types::*,
};
use crate::content::{DynContentSource, MAX_PAGE_SIZE, Ordering, QueryOptions, RawDocument};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info};

const PUBLICATION_DATE: &str = "document.first_publication_date";

pub struct DetailController {
    source: DynContentSource,
    config: BlogConfig,
    cache: RevalidatingCache<Option<Arc<PostPage>>>,
}

impl DetailController {
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

    /// Fetches and shapes one post, bypassing the cache.
    pub async fn resolve(
        &self,
        slug: &str,
        preview_ref: Option<&str>,
    ) -> Result<PostPage, BlogError> {
        let document = self
            .source
            .get_by_uid(&self.config.document_type, slug, preview_ref)
            .await?;

        let post = projection::project_post(&document);
        let read_time_minutes =
            projection::read_time_minutes(&post.data.content, self.config.words_per_minute);
        let is_edited = projection::is_edited(&post);

        let (prev_post, next_post) = tokio::try_join!(
            self.neighbor(&document, true, preview_ref),
            self.neighbor(&document, false, preview_ref),
        )?;

        debug!(
            "Resolved post {} ({} min read, edited: {})",
            post.uid, read_time_minutes, is_edited
        );

        Ok(PostPage {
            post,
            read_time_minutes,
            is_edited,
            prev_post,
            next_post,
            preview: preview_ref.is_some(),
        })
    }

    /// The post right after `document` by publication date: the next older
    /// one when `older` is set, the next newer one otherwise.
    async fn neighbor(
        &self,
        document: &RawDocument,
        older: bool,
        preview_ref: Option<&str>,
    ) -> Result<Option<PostLink>, BlogError> {
        let ordering = if older {
            Ordering::desc(PUBLICATION_DATE)
        } else {
            Ordering::asc(PUBLICATION_DATE)
        };

        let options = QueryOptions {
            orderings: vec![ordering],
            page_size: Some(1),
            after: Some(document.id.clone()),
            fetch: vec![format!("{}.title", self.config.document_type)],
            preview_ref: preview_ref.map(str::to_string),
            ..Default::default()
        };

        let response = self
            .source
            .query_by_type(&self.config.document_type, &options)
            .await?;

        Ok(response.results.first().map(projection::project_link))
    }

    /// Cached page for `slug`. The first request resolves it once; callers
    /// arriving meanwhile wait for that same resolution.
    pub async fn page(&self, slug: &str) -> Result<Option<Arc<PostPage>>, BlogError> {
        self.cache
            .get_or_try_init(slug, || async {
                match self.resolve(slug, None).await {
                    Ok(page) => Ok(Some(Arc::new(page))),
                    Err(BlogError::NotFound(_)) => {
                        info!("No post with slug {}", slug);
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            })
            .await
    }

    pub async fn state(&self, slug: &str) -> Option<Resolution> {
        match self.cache.state(slug).await {
            CacheState::Missing => None,
            CacheState::Pending => Some(Resolution::Pending),
            CacheState::Ready(Some(page)) => Some(Resolution::Resolved(page)),
            CacheState::Ready(None) => Some(Resolution::NotFound),
        }
    }

    /// Non-blocking lookup. A slug seen for the first time starts resolving
    /// in the background and reports `Pending` until it finishes.
    pub async fn lookup(self: &Arc<Self>, slug: &str) -> Resolution {
        if let Some(resolution) = self.state(slug).await {
            return resolution;
        }

        let controller = self.clone();
        let owned_slug = slug.to_string();
        tokio::spawn(async move {
            if let Err(e) = controller.page(&owned_slug).await {
                error!("Failed to resolve post {}: {}", owned_slug, e);
            }
        });

        Resolution::Pending
    }

    /// Every known slug, following the listing cursor to the end.
    pub async fn enumerate_slugs(&self) -> Result<Vec<String>, BlogError> {
        let options = QueryOptions {
            orderings: vec![Ordering::desc(PUBLICATION_DATE)],
            page_size: Some(MAX_PAGE_SIZE),
            fetch: vec![format!("{}.title", self.config.document_type)],
            ..Default::default()
        };

        let mut response = self
            .source
            .query_by_type(&self.config.document_type, &options)
            .await?;
        let mut slugs = Vec::new();

        loop {
            slugs.extend(
                response
                    .results
                    .iter()
                    .map(|document| projection::project_link(document).uid),
            );

            match response.next_page.as_deref() {
                Some(cursor) if !cursor.is_empty() => {
                    response = self.source.fetch_page(cursor).await?;
                }
                _ => break,
            }
        }

        Ok(slugs)
    }

    /// Resolves every enumerated post into the cache.
    pub async fn prerender(&self) -> Result<usize, BlogError> {
        let slugs = self.enumerate_slugs().await?;
        info!("Pre-rendering {} posts", slugs.len());

        let mut rendered = 0;
        for slug in &slugs {
            match self.page(slug).await {
                Ok(Some(_)) => rendered += 1,
                Ok(None) => debug!("Enumerated post {} no longer exists", slug),
                Err(e) => error!("Failed to pre-render post {}: {}", slug, e),
            }
        }

        Ok(rendered)
    }
}
