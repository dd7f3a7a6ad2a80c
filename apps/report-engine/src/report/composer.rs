//! Report composition: loads every piece of content up front, then runs the
//! pure selection engine once per card section and once for highlights.
//!
//! Flow: derive tags/axis → derive seed → load content (async) →
//!       select_cards per section → select_highlights → explain trail.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::{Catalog, PolicyStore};
use crate::errors::EngineError;
use crate::models::{AxisInfo, SelectionResult, UserTagSet};
use crate::seed::{derive_seed, SeedSource};
use crate::selection::{
    select_cards, select_highlights, CardSectionContent, ExplainRecorder, ExplainTrail,
};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// One dimension's score as delivered by the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreInput {
    pub side: String,
    pub percentile: f64,
}

/// Input for one report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub attempt_id: Option<Uuid>,
    #[serde(default)]
    pub type_code: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub scores: BTreeMap<String, ScoreInput>,
    #[serde(default)]
    pub sections: Vec<String>,
}

impl ReportRequest {
    /// Axis states from the raw scores; percentiles are rounded and clamped to 0–100.
    pub fn axis_info(&self) -> AxisInfo {
        let mut axis = AxisInfo::new();
        for (dim, score) in &self.scores {
            let pct = if score.percentile.is_finite() {
                score.percentile.round().clamp(0.0, 100.0) as u8
            } else {
                50
            };
            axis = axis.with(dim, &score.side, pct);
        }
        axis
    }

    /// Request tags plus the type-code tags. Axis tags are added per pipeline.
    pub fn user_tags(&self, axis: &AxisInfo) -> UserTagSet {
        let tags = UserTagSet::from_tags(&self.tags);
        let tags = match self.type_code.as_deref() {
            Some(code) => tags.with_type_code(code),
            None => tags,
        };
        tags.with_axis_tags(axis)
    }

    /// Section names trimmed, de-duplicated, request order kept.
    pub fn section_names(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.sections
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && seen.insert(s.to_string()))
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ComposeOptions {
    pub capture_explain: bool,
    pub explain_items_max: usize,
}

/// Selected content for every requested section plus the highlights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedSelection {
    pub seed: u64,
    pub seed_source: SeedSource,
    pub cards: BTreeMap<String, SelectionResult>,
    pub highlights: SelectionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain: Option<ExplainTrail>,
}

// ────────────────────────────────────────────────────────────────────────────
// Composer
// ────────────────────────────────────────────────────────────────────────────

pub struct ReportComposer {
    catalog: Arc<dyn Catalog>,
    policies: Arc<dyn PolicyStore>,
    options: ComposeOptions,
}

impl ReportComposer {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        policies: Arc<dyn PolicyStore>,
        options: ComposeOptions,
    ) -> Self {
        ReportComposer {
            catalog,
            policies,
            options,
        }
    }

    /// Runs the full selection for one report.
    ///
    /// Only catalog loading can fail; in strict mode an empty section or an
    /// absent template table surfaces here as `MissingCatalog`.
    pub async fn compose(&self, request: &ReportRequest) -> Result<ComposedSelection, EngineError> {
        // Step 1: user state
        let axis = request.axis_info();
        let tags = request.user_tags(&axis);
        let sections = request.section_names();

        // Step 2: seed
        let (seed, seed_source) = derive_seed(request.attempt_id, &tags, &axis);
        info!(
            "Composing report: {} sections, {} tags, seed {seed:016x} ({seed_source:?})",
            sections.len(),
            tags.len()
        );

        // Step 3: load everything before selecting anything
        let defaults = self.policies.assembler_defaults().await?;
        let mut loaded = Vec::with_capacity(sections.len());
        for section in &sections {
            loaded.push((section.clone(), self.load_section(section).await?));
        }
        let templates = self
            .catalog
            .load_highlight_templates()
            .await?
            .unwrap_or_default();

        // Step 4: card sections
        let mut recorder =
            ExplainRecorder::new(self.options.capture_explain, self.options.explain_items_max);
        recorder.record_seed(seed, seed_source);

        let mut cards = BTreeMap::new();
        for (section, content) in loaded {
            let selection = select_cards(&section, content, &defaults, &tags, &axis, seed);
            info!("Section '{section}': {} cards", selection.result.len());
            recorder.record_selection(selection.selection);
            recorder.record_section(selection.section);
            cards.insert(section, selection.result);
        }

        // Step 5: highlights
        let highlights = select_highlights(&templates, &tags, &axis, seed);
        info!("Highlights: {}", highlights.result.len());
        recorder.record_selection(highlights.explain);

        Ok(ComposedSelection {
            seed,
            seed_source,
            cards,
            highlights: highlights.result,
            explain: recorder.finish(),
        })
    }

    async fn load_section(&self, section: &str) -> Result<CardSectionContent, EngineError> {
        let (candidates, fallback, rules, policy) = tokio::try_join!(
            self.catalog.load_candidates(section),
            self.catalog.load_fallback(section),
            self.catalog.load_card_rules(section),
            self.policies.get(section),
        )?;
        debug!(
            "Loaded '{section}': {} candidates, {} fallback, policy={}",
            candidates.len(),
            fallback.len(),
            policy.is_some()
        );
        Ok(CardSectionContent {
            candidates,
            rules,
            policy,
            fallback,
        })
    }
}

impl std::fmt::Debug for ReportComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportComposer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
