use crate::{
    Config,
    content::{ContentSourceConfig, providers::prismic::PrismicSource},
};
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Templates directory does not exist: {0}")]
    TemplateDirectoryMissing(String),

    #[error("Required template missing: {0}")]
    RequiredTemplateMissing(String),

    #[error("Static files directory does not exist")]
    StaticDirectoryMissing,

    #[error("Content file does not exist: {0}")]
    ContentFileMissing(String),

    #[error("Invalid content endpoint: {0}")]
    InvalidContentEndpoint(String),

    #[error("Preview secret is empty")]
    EmptyPreviewSecret,
}

impl StartupCheckError {
    /// Errors that make serving pointless.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StartupCheckError::TemplateDirectoryMissing(_)
                | StartupCheckError::RequiredTemplateMissing(_)
                | StartupCheckError::ContentFileMissing(_)
                | StartupCheckError::InvalidContentEndpoint(_)
                | StartupCheckError::EmptyPreviewSecret
        )
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let templates_dir = Path::new(&config.templates.directory);
    if !templates_dir.exists() {
        error!("Templates directory does not exist: {:?}", templates_dir);
        errors.push(StartupCheckError::TemplateDirectoryMissing(
            templates_dir.display().to_string(),
        ));
    } else {
        info!("Templates directory exists: {:?}", templates_dir);
        for template in [&config.blog.index_template, &config.blog.post_template] {
            if !templates_dir.join(template).exists() {
                error!("Required template missing: {}", template);
                errors.push(StartupCheckError::RequiredTemplateMissing(template.clone()));
            }
        }
    }

    let static_dir = Path::new(&config.static_files.directory);
    if !static_dir.exists() {
        warn!("Static files directory does not exist: {:?}", static_dir);
        errors.push(StartupCheckError::StaticDirectoryMissing);
    } else {
        info!("Static files directory exists: {:?}", static_dir);
    }

    match &config.content {
        ContentSourceConfig::File(file_config) => {
            if !file_config.path.exists() {
                error!("Content file does not exist: {:?}", file_config.path);
                errors.push(StartupCheckError::ContentFileMissing(
                    file_config.path.display().to_string(),
                ));
            } else {
                info!("Content file exists: {:?}", file_config.path);
            }
        }
        ContentSourceConfig::Prismic(prismic_config) => {
            match PrismicSource::new(prismic_config) {
                Ok(_) => info!("Content endpoint: {}", prismic_config.endpoint),
                Err(e) => {
                    error!("Content endpoint is not usable: {}", e);
                    errors.push(StartupCheckError::InvalidContentEndpoint(
                        prismic_config.endpoint.clone(),
                    ));
                }
            }
        }
    }

    if config.app.preview_secret.is_empty() {
        errors.push(StartupCheckError::EmptyPreviewSecret);
    } else if config.app.preview_secret == "change-me-in-production" {
        warn!("Preview secret is the default value, set app.preview_secret");
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}
