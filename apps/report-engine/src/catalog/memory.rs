use std::collections::HashMap;

use async_trait::async_trait;

use crate::catalog::{Catalog, PolicyStore};
use crate::errors::EngineError;
use crate::models::{AssemblerDefaults, Candidate, CardRules, HighlightTemplates, SelectionPolicy};

/// Catalog held entirely in memory. Used for embedding pre-built content and in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    candidates: HashMap<String, Vec<Candidate>>,
    fallback: HashMap<String, Vec<Candidate>>,
    rules: HashMap<String, CardRules>,
    policies: HashMap<String, SelectionPolicy>,
    templates: Option<HighlightTemplates>,
    defaults: AssemblerDefaults,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidates(mut self, section: &str, items: Vec<Candidate>) -> Self {
        self.candidates.insert(section.to_string(), items);
        self
    }

    pub fn with_fallback(mut self, section: &str, items: Vec<Candidate>) -> Self {
        self.fallback.insert(section.to_string(), items);
        self
    }

    pub fn with_rules(mut self, section: &str, rules: CardRules) -> Self {
        self.rules.insert(section.to_string(), rules);
        self
    }

    pub fn with_policy(mut self, section: &str, policy: SelectionPolicy) -> Self {
        self.policies.insert(section.to_string(), policy.normalized());
        self
    }

    pub fn with_templates(mut self, templates: HighlightTemplates) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn with_defaults(mut self, defaults: AssemblerDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn load_candidates(&self, section: &str) -> Result<Vec<Candidate>, EngineError> {
        Ok(self.candidates.get(section).cloned().unwrap_or_default())
    }

    async fn load_fallback(&self, section: &str) -> Result<Vec<Candidate>, EngineError> {
        Ok(self.fallback.get(section).cloned().unwrap_or_default())
    }

    async fn load_card_rules(&self, section: &str) -> Result<CardRules, EngineError> {
        Ok(self.rules.get(section).cloned().unwrap_or_default())
    }

    async fn load_highlight_templates(&self) -> Result<Option<HighlightTemplates>, EngineError> {
        Ok(self.templates.clone())
    }
}

#[async_trait]
impl PolicyStore for InMemoryCatalog {
    async fn get(&self, section: &str) -> Result<Option<SelectionPolicy>, EngineError> {
        Ok(self.policies.get(section).cloned())
    }

    async fn assembler_defaults(&self) -> Result<AssemblerDefaults, EngineError> {
        Ok(self.defaults.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    #[tokio::test]
    async fn test_unknown_section_is_empty() {
        let catalog = InMemoryCatalog::new();
        assert!(catalog.load_candidates("career").await.unwrap().is_empty());
        assert_eq!(catalog.load_card_rules("career").await.unwrap(), CardRules::default());
        assert!(catalog.get("career").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_policy_normalized_on_insert() {
        let catalog = InMemoryCatalog::new().with_policy("traits", SelectionPolicy::new(4, 9, 2));
        let policy = catalog.get("traits").await.unwrap().unwrap();
        assert_eq!(policy.max_count, 4);
        assert_eq!(policy.target_count, 4);
    }

    #[tokio::test]
    async fn test_fallback_kept_apart_from_candidates() {
        let catalog = InMemoryCatalog::new()
            .with_candidates("traits", vec![Candidate::new("a", Category::NonAxis)])
            .with_fallback("traits", vec![Candidate::new("fb", Category::NonAxis)]);
        assert_eq!(catalog.load_candidates("traits").await.unwrap()[0].id, "a");
        assert_eq!(catalog.load_fallback("traits").await.unwrap()[0].id, "fb");
    }
}
