//! Explain Recorder: optional decision trail for debug tooling.
//! Never read by the selection logic itself.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::seed::SeedSource;
use crate::selection::assembler::SectionExplain;
use crate::selection::selector::SelectionExplain;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainTrail {
    pub seed: u64,
    pub seed_source: Option<SeedSource>,
    pub selections: Vec<SelectionExplain>,
    pub sections: Vec<SectionExplain>,
}

/// Collects explain records when enabled; a disabled recorder drops everything.
#[derive(Debug, Clone)]
pub struct ExplainRecorder {
    enabled: bool,
    items_max: usize,
    trail: ExplainTrail,
}

impl ExplainRecorder {
    pub fn new(enabled: bool, items_max: usize) -> Self {
        ExplainRecorder {
            enabled,
            items_max,
            trail: ExplainTrail::default(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, 0)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_seed(&mut self, seed: u64, source: SeedSource) {
        if self.enabled {
            self.trail.seed = seed;
            self.trail.seed_source = Some(source);
        }
    }

    pub fn record_selection(&mut self, mut explain: SelectionExplain) {
        if !self.enabled {
            return;
        }
        let max = self.items_max;
        explain.gated.truncate(max);
        explain.skipped.truncate(max);
        explain.selected.truncate(max);
        explain.evicted.truncate(max);
        explain.synthesized.truncate(max);
        explain.truncated.truncate(max);
        debug!(
            "explain[{}]: pool={} selected={} rejected={} synthesized={}",
            explain.scope,
            explain.pool_size,
            explain.selected.len(),
            explain.rejected_total,
            explain.synthesized.len()
        );
        self.trail.selections.push(explain);
    }

    pub fn record_section(&mut self, mut explain: SectionExplain) {
        if !self.enabled {
            return;
        }
        explain.fallback_added_ids.truncate(self.items_max);
        debug!(
            "explain[{}]: before={} after_trim={} fallback_added={} final={}",
            explain.section,
            explain.counts.before,
            explain.counts.after_trim,
            explain.counts.fallback_added,
            explain.counts.final_count
        );
        self.trail.sections.push(explain);
    }

    /// The collected trail, or `None` when recording was off.
    pub fn finish(self) -> Option<ExplainTrail> {
        self.enabled.then_some(self.trail)
    }
}
