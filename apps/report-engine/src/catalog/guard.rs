//! Strict-mode guard: the single place where "missing content" becomes an error.
//!
//! Lenient (default): empty sections and absent templates pass through and the
//! engine synthesizes placeholders. Strict: they raise `MissingCatalog` so
//! content gaps surface during pre-production validation.

use async_trait::async_trait;
use tracing::warn;

use crate::catalog::{Catalog, PolicyStore};
use crate::errors::EngineError;
use crate::models::{AssemblerDefaults, Candidate, CardRules, HighlightTemplates, SelectionPolicy};
use crate::selection::highlights::HIGHLIGHTS_SCOPE;

pub struct GuardedCatalog<C> {
    inner: C,
    strict: bool,
}

impl<C> GuardedCatalog<C> {
    pub fn new(inner: C, strict: bool) -> Self {
        GuardedCatalog { inner, strict }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

#[async_trait]
impl<C: Catalog> Catalog for GuardedCatalog<C> {
    async fn load_candidates(&self, section: &str) -> Result<Vec<Candidate>, EngineError> {
        let items = self.inner.load_candidates(section).await?;
        if items.is_empty() {
            if self.strict {
                return Err(EngineError::missing_catalog(section));
            }
            warn!("No card candidates for '{section}'; placeholders will be synthesized");
        }
        Ok(items)
    }

    async fn load_fallback(&self, section: &str) -> Result<Vec<Candidate>, EngineError> {
        self.inner.load_fallback(section).await
    }

    async fn load_card_rules(&self, section: &str) -> Result<CardRules, EngineError> {
        self.inner.load_card_rules(section).await
    }

    async fn load_highlight_templates(&self) -> Result<Option<HighlightTemplates>, EngineError> {
        let templates = self.inner.load_highlight_templates().await?;
        let missing = templates.as_ref().map_or(true, HighlightTemplates::is_empty);
        if missing {
            if self.strict {
                return Err(EngineError::missing_catalog(HIGHLIGHTS_SCOPE));
            }
            warn!("No highlight templates; placeholders will be synthesized");
        }
        Ok(templates)
    }
}

#[async_trait]
impl<C: PolicyStore> PolicyStore for GuardedCatalog<C> {
    async fn get(&self, section: &str) -> Result<Option<SelectionPolicy>, EngineError> {
        self.inner.get(section).await
    }

    async fn assembler_defaults(&self) -> Result<AssemblerDefaults, EngineError> {
        self.inner.assembler_defaults().await
    }
}
