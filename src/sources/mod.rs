//! Source adapters.
//!
//! A source adapter turns one external site into [`RawJob`]s using only the
//! [`Fetch`] capability it is given. The core never looks inside an adapter;
//! it only relies on the [`SourceAdapter`] contract.
//!
//! - `HtmlSourceAdapter`: listing pages scraped with CSS selectors
//! - `JsonSourceAdapter`: paginated JSON APIs

mod html;
mod json;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AdapterError, AppError, Result};
use crate::fetch::Fetch;
use crate::models::{Config, RawJob, SourceConfig, SourceKind};

pub use html::HtmlSourceAdapter;
pub use json::JsonSourceAdapter;

/// Result of one adapter run.
pub type SourceResult = std::result::Result<Vec<RawJob>, AdapterError>;

/// Extraction logic for one source.
///
/// Implementations must bound their own paging; the orchestrator deadline
/// is only a backstop.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch and extract every listing the source currently offers.
    async fn run(&self, fetch: &dyn Fetch) -> SourceResult;
}

/// A registered adapter.
#[derive(Clone)]
pub struct RegisteredSource {
    pub name: String,
    pub adapter: Arc<dyn SourceAdapter>,
}

/// Adapters in registration order, with unique names.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<RegisteredSource>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter. Names must be unique.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        adapter: Arc<dyn SourceAdapter>,
    ) -> Result<()> {
        let name = name.into();
        if self.sources.iter().any(|s| s.name == name) {
            return Err(AppError::config(format!(
                "source '{name}' is registered twice"
            )));
        }
        self.sources.push(RegisteredSource { name, adapter });
        Ok(())
    }

    /// Build a registry from the enabled sources of a configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();
        for source in config.enabled_sources() {
            registry.register(source.name.clone(), adapter_for(source))?;
        }
        Ok(registry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredSource> {
        self.sources.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Instantiate the built-in adapter for a configured source.
pub fn adapter_for(source: &SourceConfig) -> Arc<dyn SourceAdapter> {
    match &source.kind {
        SourceKind::Html(html) => Arc::new(HtmlSourceAdapter::new(html.clone())),
        SourceKind::Json(json) => Arc::new(JsonSourceAdapter::new(json.clone())),
    }
}
