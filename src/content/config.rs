use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ContentSourceConfig {
    Prismic(PrismicConfig),
    File(FileConfig),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrismicConfig {
    /// API root, e.g. `https://my-repo.cdn.prismic.io/api/v2`
    pub endpoint: String,
    /// Falls back to the `PRISMIC_ACCESS_TOKEN` environment variable.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileConfig {
    /// JSON array of documents in the API's document shape.
    pub path: PathBuf,
}

fn default_timeout_seconds() -> u64 {
    10
}

impl Default for ContentSourceConfig {
    fn default() -> Self {
        ContentSourceConfig::File(FileConfig {
            path: PathBuf::from("content/posts.json"),
        })
    }
}

impl ContentSourceConfig {
    pub fn describe(&self) -> String {
        match self {
            ContentSourceConfig::Prismic(config) => format!("prismic ({})", config.endpoint),
            ContentSourceConfig::File(config) => format!("file ({:?})", config.path),
        }
    }
}
