use std::{collections::HashMap, path::PathBuf, sync::Arc, time::SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

const HEADER_TEMPLATE: &str = "partials/_header.html.liquid";
const FOOTER_TEMPLATE: &str = "partials/_footer.html.liquid";

pub struct TemplateEngine {
    template_dir: PathBuf,
    cache: Arc<RwLock<HashMap<String, CachedTemplate>>>,
}

struct CachedTemplate {
    content: String,
    modified: SystemTime,
}

impl TemplateEngine {
    pub fn new(template_dir: PathBuf) -> Self {
        Self {
            template_dir,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn load_template(&self, path: &str) -> Result<String, String> {
        let template_path = self.template_dir.join(path);

        let metadata = tokio::fs::metadata(&template_path)
            .await
            .map_err(|e| format!("Failed to get metadata for {}: {}", path, e))?;

        let modified = metadata
            .modified()
            .map_err(|e| format!("Failed to get modified time: {}", e))?;

        let mut cache = self.cache.write().await;

        if let Some(cached) = cache.get(path)
            && cached.modified >= modified
        {
            debug!("Using cached template for {}", path);
            return Ok(cached.content.clone());
        }

        info!("Loading template: {}", path);

        let content = tokio::fs::read_to_string(&template_path)
            .await
            .map_err(|e| format!("Failed to read template {}: {}", path, e))?;

        cache.insert(
            path.to_string(),
            CachedTemplate {
                content: content.clone(),
                modified,
            },
        );

        Ok(content)
    }

    fn render_source(source: &str, globals: &liquid::Object) -> Result<String, String> {
        let parser = liquid::ParserBuilder::with_stdlib()
            .build()
            .map_err(|e| format!("Failed to create parser: {}", e))?;

        let template = parser
            .parse(source)
            .map_err(|e| format!("Failed to parse template: {}", e))?;

        template
            .render(globals)
            .map_err(|e| format!("Failed to render template: {}", e))
    }

    /// Renders a partial with the page's globals. A missing or broken partial
    /// renders as empty so the page itself still comes out.
    async fn render_partial(&self, path: &str, globals: &liquid::Object) -> String {
        let source = match self.load_template(path).await {
            Ok(source) => source,
            Err(e) => {
                error!("Failed to load partial {}: {}", path, e);
                return String::new();
            }
        };

        Self::render_source(&source, globals).unwrap_or_else(|e| {
            error!("Failed to render partial {}: {}", path, e);
            String::new()
        })
    }

    pub async fn render_template(
        &self,
        template_name: &str,
        globals: liquid::Object,
    ) -> Result<String, String> {
        let template_content = self.load_template(template_name).await?;

        let header_content = self.render_partial(HEADER_TEMPLATE, &globals).await;
        let footer_content = self.render_partial(FOOTER_TEMPLATE, &globals).await;

        let mut full_globals = globals;
        full_globals.insert(
            "header".into(),
            liquid::model::Value::Scalar(header_content.into()),
        );
        full_globals.insert(
            "footer".into(),
            liquid::model::Value::Scalar(footer_content.into()),
        );

        Self::render_source(&template_content, &full_globals)
    }
}
