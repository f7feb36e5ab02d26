pub mod config;
pub mod error;
pub mod providers;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Read-only access to a headless document store.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Lists documents of `document_type`, honoring orderings, page size,
    /// `after` and field projection.
    async fn query_by_type(
        &self,
        document_type: &str,
        options: &QueryOptions,
    ) -> Result<Paginated<RawDocument>, ContentError>;

    /// Fetches a single document by its uid. Returns `ContentError::NotFound`
    /// when no document matches.
    async fn get_by_uid(
        &self,
        document_type: &str,
        uid: &str,
        preview_ref: Option<&str>,
    ) -> Result<RawDocument, ContentError>;

    /// Follows a `next_page` cursor exactly as it was returned by a previous
    /// query.
    async fn fetch_page(&self, cursor: &str) -> Result<Paginated<RawDocument>, ContentError>;

    fn name(&self) -> &str;
}

pub type DynContentSource = Arc<dyn ContentSource>;

pub async fn create_source(config: &ContentSourceConfig) -> Result<DynContentSource, ContentError> {
    match config {
        ContentSourceConfig::Prismic(prismic_config) => Ok(Arc::new(
            providers::prismic::PrismicSource::new(prismic_config)?,
        )),
        ContentSourceConfig::File(file_config) => Ok(Arc::new(
            providers::file::FileSource::load(file_config).await?,
        )),
    }
}
