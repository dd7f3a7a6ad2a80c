//! Typed content-pack documents: per-section card rules and the highlight
//! template table. Validated once by the catalog loader; the engine never
//! sees raw JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::candidate::{Category, Payload};
use crate::models::policy::SelectionPolicy;
use crate::models::tags::Level;

/// Cards: a section always shows at least this many items.
pub const CARD_HARD_FLOOR: usize = 2;
/// Highlights: the summary always shows at least this many items.
pub const HIGHLIGHT_HARD_FLOOR: usize = 3;
pub const HIGHLIGHT_TARGET: usize = 4;
/// Strength highlights never exceed this, whatever `top_n` says.
pub const MAX_STRENGTH_HIGHLIGHTS: usize = 2;

// ────────────────────────────────────────────────────────────────────────────
// Card rules
// ────────────────────────────────────────────────────────────────────────────

/// `rules` block of a `report_cards_<section>.json` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRules {
    #[serde(default = "default_min_cards")]
    pub min_cards: usize,
    #[serde(default = "default_target_cards")]
    pub target_cards: usize,
    #[serde(default = "default_max_cards")]
    pub max_cards: usize,
    #[serde(default = "default_fallback_tags")]
    pub fallback_tags: Vec<String>,
}

fn default_min_cards() -> usize {
    CARD_HARD_FLOOR
}
fn default_target_cards() -> usize {
    3
}
fn default_max_cards() -> usize {
    6
}
fn default_fallback_tags() -> Vec<String> {
    vec!["fallback".to_string(), "kind:core".to_string()]
}

impl Default for CardRules {
    fn default() -> Self {
        CardRules {
            min_cards: default_min_cards(),
            target_cards: default_target_cards(),
            max_cards: default_max_cards(),
            fallback_tags: default_fallback_tags(),
        }
    }
}

impl CardRules {
    /// Selector policy for the section's own pool.
    pub fn to_policy(&self) -> SelectionPolicy {
        let base = SelectionPolicy::new(self.min_cards, self.target_cards, self.max_cards)
            .with_fallback_tags(self.fallback_tags.iter().cloned())
            .with_hard_floor(CARD_HARD_FLOOR);
        apply_card_categories(base)
    }
}

/// Axis cards capped at `target - 1`, at least one non-axis card.
pub fn apply_card_categories(policy: SelectionPolicy) -> SelectionPolicy {
    let axis_cap = policy.target_count.saturating_sub(1).max(1);
    policy
        .with_cap(Category::Axis, axis_cap)
        .with_floor(Category::NonAxis, 1)
        .normalized()
}

// ────────────────────────────────────────────────────────────────────────────
// Highlight templates
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightRules {
    /// Candidates below this level only enter the soft pool.
    #[serde(default = "default_min_level")]
    pub min_level: Level,
    #[serde(default = "default_min_delta")]
    pub min_delta: u8,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Use the soft pool when nothing passes the gate.
    #[serde(default = "default_allow_empty")]
    pub allow_empty: bool,
    #[serde(default = "default_id_format")]
    pub id_format: String,
}

fn default_min_level() -> Level {
    Level::Clear
}
fn default_min_delta() -> u8 {
    15
}
fn default_top_n() -> usize {
    2
}
fn default_allow_empty() -> bool {
    true
}
fn default_id_format() -> String {
    "${dim}_${side}_${level}".to_string()
}

impl Default for HighlightRules {
    fn default() -> Self {
        HighlightRules {
            min_level: default_min_level(),
            min_delta: default_min_delta(),
            top_n: default_top_n(),
            allow_empty: default_allow_empty(),
            id_format: default_id_format(),
        }
    }
}

impl HighlightRules {
    pub fn passes_gate(&self, level: Level, delta: u8) -> bool {
        level >= self.min_level && delta >= self.min_delta
    }

    pub fn format_id(&self, dim: &str, side: &str, level: Level) -> String {
        self.id_format
            .replace("${dim}", dim)
            .replace("${side}", side)
            .replace("${level}", level.as_str())
    }

    /// Policy for the summary block: 3..=4 items, one blindspot, one action.
    pub fn to_policy(&self) -> SelectionPolicy {
        SelectionPolicy::new(HIGHLIGHT_HARD_FLOOR, HIGHLIGHT_TARGET, HIGHLIGHT_TARGET)
            .with_cap(
                Category::Strength,
                self.top_n.min(MAX_STRENGTH_HIGHLIGHTS),
            )
            .with_cap(Category::Blindspot, 1)
            .with_cap(Category::Action, 1)
            .with_floor(Category::Blindspot, 1)
            .with_floor(Category::Action, 1)
            .with_hard_floor(HIGHLIGHT_HARD_FLOOR)
    }
}

/// One entry of the template table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightTemplate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub kind: Option<Category>,
    /// Zero means "rank by the axis delta".
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub min_match: Option<u32>,
    #[serde(flatten)]
    pub payload: Payload,
}

/// `dim → side → level → template`.
pub type TemplateTable = BTreeMap<String, BTreeMap<String, BTreeMap<Level, HighlightTemplate>>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightTemplates {
    #[serde(default)]
    pub rules: HighlightRules,
    #[serde(default)]
    pub templates: TemplateTable,
}

impl HighlightTemplates {
    /// Template for `(dim, side)` at `level`, else the nearest weaker level that has one.
    pub fn resolve(&self, dim: &str, side: &str, level: Level) -> Option<(Level, &HighlightTemplate)> {
        let by_level = self.templates.get(dim)?.get(side)?;
        level
            .descending()
            .find_map(|l| by_level.get(&l).map(|tpl| (l, tpl)))
    }

    pub fn insert(&mut self, dim: &str, side: &str, level: Level, template: HighlightTemplate) {
        self.templates
            .entry(dim.to_string())
            .or_default()
            .entry(side.to_string())
            .or_default()
            .insert(level, template);
    }

    pub fn is_empty(&self) -> bool {
        self.templates
            .values()
            .all(|sides| sides.values().all(|levels| levels.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_rules_defaults() {
        let rules: CardRules = serde_json::from_str("{}").unwrap();
        assert_eq!(rules, CardRules::default());
        assert_eq!(rules.fallback_tags, vec!["fallback", "kind:core"]);
    }

    #[test]
    fn test_card_policy_enforces_hard_floor_and_axis_cap() {
        let rules = CardRules {
            min_cards: 0,
            target_cards: 4,
            max_cards: 3,
            ..CardRules::default()
        };
        let policy = rules.to_policy();
        assert_eq!(policy.min_count, 2);
        assert_eq!(policy.max_count, 3);
        assert_eq!(policy.target_count, 3);
        assert_eq!(policy.cap(Category::Axis), Some(2));
        assert_eq!(policy.floor(Category::NonAxis), 1);
    }

    #[test]
    fn test_highlight_policy_shape() {
        let policy = HighlightRules::default().to_policy();
        assert_eq!((policy.min_count, policy.target_count, policy.max_count), (3, 4, 4));
        assert_eq!(policy.cap(Category::Strength), Some(2));
        assert_eq!(policy.floor(Category::Blindspot), 1);
        assert_eq!(policy.floor(Category::Action), 1);
    }

    #[test]
    fn test_strength_cap_never_exceeds_two() {
        let rules = HighlightRules {
            top_n: 9,
            ..HighlightRules::default()
        };
        assert_eq!(rules.to_policy().cap(Category::Strength), Some(2));
    }

    #[test]
    fn test_resolve_falls_back_to_weaker_level() {
        let mut table = HighlightTemplates::default();
        table.insert(
            "EI",
            "E",
            Level::Clear,
            HighlightTemplate {
                id: Some("ei_clear".to_string()),
                ..HighlightTemplate::default()
            },
        );
        let (level, tpl) = table.resolve("EI", "E", Level::VeryStrong).unwrap();
        assert_eq!(level, Level::Clear);
        assert_eq!(tpl.id.as_deref(), Some("ei_clear"));
        assert!(table.resolve("EI", "E", Level::Weak).is_none());
        assert!(table.resolve("EI", "I", Level::VeryStrong).is_none());
    }

    #[test]
    fn test_format_id_and_gate() {
        let rules = HighlightRules::default();
        assert_eq!(rules.format_id("TF", "T", Level::Strong), "TF_T_strong");
        assert!(rules.passes_gate(Level::Strong, 22));
        assert!(!rules.passes_gate(Level::Clear, 12));
        assert!(!rules.passes_gate(Level::Weak, 40));
    }

    #[test]
    fn test_templates_deserialize_level_keys() {
        let doc = r#"{
            "rules": {"top_n": 1},
            "templates": {"EI": {"E": {"strong": {"id": "x", "title": "Energized", "priority": 7}}}}
        }"#;
        let t: HighlightTemplates = serde_json::from_str(doc).unwrap();
        assert_eq!(t.rules.top_n, 1);
        let (_, tpl) = t.resolve("EI", "E", Level::Strong).unwrap();
        assert_eq!(tpl.payload.title, "Energized");
        assert_eq!(tpl.priority, 7);
        assert!(!t.is_empty());
    }
}
