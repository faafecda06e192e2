//! Template loading
//!
//! - [`DirectoryTemplateLoader`]: one YAML or JSON document per industry
//! - [`CachedTemplateLoader`]: moka cache with TTL in front of any loader
//! - [`GenericTemplateLoader`]: the built-in questionnaire for every industry
//!
//! Parse and schema failures surface as [`WizardError::Template`] and are
//! never cached; a missing document is reported as a 404 so the session can
//! fall back to the generic template.

use crate::collaborators::TemplateLoader;
use async_trait::async_trait;
use moka::future::Cache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wizard_core::{IndustrySlug, QuestionTemplate, TemplateError, WizardError};

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Loads `<root>/<industry>.{yaml,yml,json}`
#[derive(Debug, Clone)]
pub struct DirectoryTemplateLoader {
    root: PathBuf,
}

impl DirectoryTemplateLoader {
    /// Create loader over `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Template directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parse one document
    ///
    /// # Errors
    /// Returns [`WizardError::Template`] when the document does not parse,
    /// declares another industry, or fails validation.
    pub fn parse(
        path: &Path,
        text: &str,
        industry: &IndustrySlug,
    ) -> Result<QuestionTemplate, WizardError> {
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let template: QuestionTemplate = if is_json {
            serde_json::from_str(text)
                .map_err(|e| TemplateError::Malformed(format!("{}: {e}", path.display())))?
        } else {
            serde_yaml::from_str(text)
                .map_err(|e| TemplateError::Malformed(format!("{}: {e}", path.display())))?
        };
        let template = QuestionTemplate {
            industry: IndustrySlug::new(template.industry.as_str()),
            fallback: false,
            ..template
        };
        if &template.industry != industry {
            return Err(TemplateError::IndustryMismatch {
                expected: industry.to_string(),
                found: template.industry.to_string(),
            }
            .into());
        }
        template.validate()?;
        Ok(template)
    }
}

#[async_trait]
impl TemplateLoader for DirectoryTemplateLoader {
    async fn load_template(
        &self,
        industry: &IndustrySlug,
        cancel: &CancellationToken,
    ) -> Result<QuestionTemplate, WizardError> {
        for ext in EXTENSIONS {
            if cancel.is_cancelled() {
                return Err(WizardError::Aborted);
            }
            let path = self.root.join(format!("{industry}.{ext}"));
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => {
                    tracing::debug!(path = %path.display(), "Loaded template document");
                    return Self::parse(&path, &text, industry);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(WizardError::Network(format!("{}: {e}", path.display())));
                }
            }
        }
        Err(WizardError::Api {
            status: Some(404),
            message: format!("no template for {industry} in {}", self.root.display()),
        })
    }
}

/// Serves the generic questionnaire for every industry
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericTemplateLoader;

#[async_trait]
impl TemplateLoader for GenericTemplateLoader {
    async fn load_template(
        &self,
        industry: &IndustrySlug,
        _cancel: &CancellationToken,
    ) -> Result<QuestionTemplate, WizardError> {
        Ok(QuestionTemplate::generic(industry.clone()))
    }
}

/// Caches successful loads of another loader
#[derive(Clone)]
pub struct CachedTemplateLoader {
    inner: Arc<dyn TemplateLoader>,
    cache: Cache<IndustrySlug, Arc<QuestionTemplate>>,
}

impl std::fmt::Debug for CachedTemplateLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedTemplateLoader")
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl CachedTemplateLoader {
    /// Create cache with max capacity and time-to-live
    #[must_use]
    pub fn new(inner: Arc<dyn TemplateLoader>, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Drop the cached template of `industry`
    pub async fn invalidate(&self, industry: &IndustrySlug) {
        self.cache.invalidate(industry).await;
    }

    /// Check if `industry` is cached
    #[must_use]
    pub fn contains(&self, industry: &IndustrySlug) -> bool {
        self.cache.contains_key(industry)
    }
}

#[async_trait]
impl TemplateLoader for CachedTemplateLoader {
    async fn load_template(
        &self,
        industry: &IndustrySlug,
        cancel: &CancellationToken,
    ) -> Result<QuestionTemplate, WizardError> {
        let loaded = self
            .cache
            .try_get_with(industry.clone(), async {
                self.inner
                    .load_template(industry, cancel)
                    .await
                    .map(Arc::new)
            })
            .await
            .map_err(|e: Arc<WizardError>| (*e).clone())?;
        metrics::counter!("wizard_template_loads_total").increment(1);
        Ok(QuestionTemplate::clone(&loaded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const HOTEL_YAML: &str = r#"
industry: hotel
version: "2024.1"
parts:
  - id: rooms
    title: Rooms
    questions:
      - id: roomCount
        label: Number of rooms
        type: number
        unit: rooms
        default: 120
        required: true
"#;

    #[tokio::test]
    async fn loads_yaml_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hotel.yaml"), HOTEL_YAML).unwrap();
        let loader = DirectoryTemplateLoader::new(dir.path());

        let template = loader
            .load_template(&IndustrySlug::new("hotel"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(template.version, "2024.1");
        assert!(template.has_question("roomCount"));
        assert!(!template.fallback);
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DirectoryTemplateLoader::new(dir.path());
        let err = loader
            .load_template(&IndustrySlug::new("hotel"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WizardError::Api { status: Some(404), .. }));
        assert!(!err.is_blocking());
    }

    #[tokio::test]
    async fn malformed_and_mismatched_documents_are_template_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hotel.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("retail.yaml"), HOTEL_YAML).unwrap();
        let loader = DirectoryTemplateLoader::new(dir.path());
        let cancel = CancellationToken::new();

        let malformed = loader
            .load_template(&IndustrySlug::new("hotel"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(malformed, WizardError::Template(TemplateError::Malformed(_))));

        let mismatched = loader
            .load_template(&IndustrySlug::new("retail"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            mismatched,
            WizardError::Template(TemplateError::IndustryMismatch { .. })
        ));
        assert!(mismatched.is_blocking());
    }

    struct CountingLoader(AtomicU32);

    #[async_trait]
    impl TemplateLoader for CountingLoader {
        async fn load_template(
            &self,
            industry: &IndustrySlug,
            _cancel: &CancellationToken,
        ) -> Result<QuestionTemplate, WizardError> {
            let calls = self.0.fetch_add(1, Ordering::SeqCst);
            if calls == 0 {
                Err(WizardError::Network("reset".into()))
            } else {
                Ok(QuestionTemplate::generic(industry.clone()))
            }
        }
    }

    #[tokio::test]
    async fn cache_skips_failures_and_reuses_successes() {
        let inner = Arc::new(CountingLoader(AtomicU32::new(0)));
        let cached = CachedTemplateLoader::new(inner.clone(), 16, Duration::from_secs(60));
        let hotel = IndustrySlug::new("hotel");
        let cancel = CancellationToken::new();

        assert!(cached.load_template(&hotel, &cancel).await.is_err());
        assert!(!cached.contains(&hotel));
        cached.load_template(&hotel, &cancel).await.unwrap();
        cached.load_template(&hotel, &cancel).await.unwrap();
        assert_eq!(inner.0.load(Ordering::SeqCst), 2);

        cached.invalidate(&hotel).await;
        cached.load_template(&hotel, &cancel).await.unwrap();
        assert_eq!(inner.0.load(Ordering::SeqCst), 3);
    }
}
