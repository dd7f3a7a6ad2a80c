use serde::{Deserialize, Serialize};

use crate::models::candidate::{Candidate, Category};

/// Stage of the fallback ladder that produced a result item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Matched,
    SoftMatched,
    FallbackTagged,
    FallbackArbitrary,
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedItem {
    pub candidate: Candidate,
    pub tier: Tier,
    pub score: i64,
}

impl SelectedItem {
    pub fn id(&self) -> &str {
        &self.candidate.id
    }

    pub fn category(&self) -> Category {
        self.candidate.category
    }
}

/// Ordered output of one selection run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub items: Vec<SelectedItem>,
}

impl SelectionResult {
    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(SelectedItem::id).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count_category(&self, category: Category) -> usize {
        self.items.iter().filter(|i| i.category() == category).count()
    }

    pub fn count_tier(&self, tier: Tier) -> usize {
        self.items.iter().filter(|i| i.tier == tier).count()
    }
}
