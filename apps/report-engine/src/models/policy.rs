use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::candidate::Category;

/// Count bounds and category balancing for one selection run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    pub min_count: usize,
    pub target_count: usize,
    pub max_count: usize,
    #[serde(default)]
    pub category_caps: BTreeMap<Category, usize>,
    #[serde(default)]
    pub category_floors: BTreeMap<Category, usize>,
    #[serde(default)]
    pub fallback_tags: Vec<String>,
    #[serde(default = "default_true")]
    pub allow_fallback: bool,
}

fn default_true() -> bool {
    true
}

impl SelectionPolicy {
    pub fn new(min_count: usize, target_count: usize, max_count: usize) -> Self {
        SelectionPolicy {
            min_count,
            target_count,
            max_count,
            category_caps: BTreeMap::new(),
            category_floors: BTreeMap::new(),
            fallback_tags: Vec::new(),
            allow_fallback: true,
        }
    }

    /// Clamps inconsistent author input instead of rejecting it:
    /// `max ≥ min`, `min ≤ target ≤ max`, every cap at least its floor.
    pub fn normalized(mut self) -> Self {
        self.max_count = self.max_count.max(self.min_count);
        self.target_count = self.target_count.clamp(self.min_count, self.max_count);
        for (category, floor) in &self.category_floors {
            if let Some(cap) = self.category_caps.get_mut(category) {
                *cap = (*cap).max(*floor);
            }
        }
        self
    }

    /// Raises `min_count` to the variant's hard floor, then normalizes.
    pub fn with_hard_floor(mut self, floor: usize) -> Self {
        self.min_count = self.min_count.max(floor);
        self.normalized()
    }

    pub fn cap(&self, category: Category) -> Option<usize> {
        self.category_caps.get(&category).copied()
    }

    pub fn floor(&self, category: Category) -> usize {
        self.category_floors.get(&category).copied().unwrap_or(0)
    }

    pub fn with_cap(mut self, category: Category, cap: usize) -> Self {
        self.category_caps.insert(category, cap);
        self
    }

    pub fn with_floor(mut self, category: Category, floor: usize) -> Self {
        self.category_floors.insert(category, floor);
        self
    }

    pub fn with_fallback_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn allow_fallback(mut self, allow: bool) -> Self {
        self.allow_fallback = allow;
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Section assembler defaults
// ────────────────────────────────────────────────────────────────────────────

/// Key used to decide whether a fallback item is already present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupeKey {
    #[default]
    Id,
    Title,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendMode {
    #[default]
    #[serde(alias = "append_after_existing")]
    Append,
    #[serde(alias = "prepend_before_existing")]
    Prepend,
}

/// Pack-wide knobs for the section assembler's fallback fill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblerDefaults {
    #[serde(default)]
    pub dedupe_by: DedupeKey,
    #[serde(default, alias = "fallback_append_mode")]
    pub append_mode: AppendMode,
    #[serde(default)]
    pub allow_repeat_fallback: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_raises_max_to_min() {
        let p = SelectionPolicy::new(5, 3, 2).normalized();
        assert_eq!((p.min_count, p.target_count, p.max_count), (5, 5, 5));
    }

    #[test]
    fn test_normalize_clamps_target_into_range() {
        let high = SelectionPolicy::new(2, 9, 6).normalized();
        assert_eq!((high.min_count, high.target_count, high.max_count), (2, 6, 6));

        let low = SelectionPolicy::new(3, 1, 6).normalized();
        assert_eq!(low.target_count, 3);
    }

    #[test]
    fn test_normalize_raises_cap_to_floor() {
        let p = SelectionPolicy::new(1, 2, 3)
            .with_cap(Category::Action, 0)
            .with_floor(Category::Action, 1)
            .normalized();
        assert_eq!(p.cap(Category::Action), Some(1));
    }

    #[test]
    fn test_hard_floor_lifts_min() {
        let p = SelectionPolicy::new(0, 1, 1).with_hard_floor(2);
        assert_eq!((p.min_count, p.target_count, p.max_count), (2, 2, 2));
    }

    #[test]
    fn test_assembler_defaults_accept_long_mode_names() {
        let d: AssemblerDefaults = serde_json::from_str(
            r#"{"dedupe_by":"title","fallback_append_mode":"prepend_before_existing"}"#,
        )
        .unwrap();
        assert_eq!(d.dedupe_by, DedupeKey::Title);
        assert_eq!(d.append_mode, AppendMode::Prepend);
        assert!(!d.allow_repeat_fallback);
    }
}
