//! Highlight pipeline: template pool → select → synthesis → display order.

use crate::models::content::HIGHLIGHT_HARD_FLOOR;
use crate::models::{AxisInfo, Category, HighlightTemplates, SelectedItem, SelectionResult, UserTagSet};
use crate::selection::pool::build_highlight_pool;
use crate::selection::selector::{finalize, select, CategoryRules, SelectionContext, SelectionExplain};

pub const HIGHLIGHTS_SCOPE: &str = "highlights";

const HIGHLIGHT_CATEGORY_RULES: CategoryRules = CategoryRules {
    filler: Category::Insight,
    pad_to_target: true,
};

#[derive(Debug, Clone)]
pub struct HighlightSelection {
    pub result: SelectionResult,
    pub explain: SelectionExplain,
}

/// Selects 3–4 summary highlights: at most two strengths, exactly one
/// blindspot and one action, padded with insights.
pub fn select_highlights(
    templates: &HighlightTemplates,
    user_tags: &UserTagSet,
    axis: &AxisInfo,
    seed: u64,
) -> HighlightSelection {
    let ctx = SelectionContext {
        scope: HIGHLIGHTS_SCOPE,
        seed,
        default_min_match: 0,
        hard_floor: HIGHLIGHT_HARD_FLOOR,
    };
    let user_tags = user_tags.clone().with_axis_tags(axis);
    let policy = templates.rules.to_policy();

    let pool = build_highlight_pool(templates, axis).into_candidates();
    let draft = select(pool, &user_tags, &policy, &ctx);
    let mut explain = draft.explain;
    let mut items = finalize(draft.items, &policy, &ctx, HIGHLIGHT_CATEGORY_RULES, &mut explain);

    sort_for_display(&mut items);
    HighlightSelection {
        result: SelectionResult { items },
        explain,
    }
}

/// Strengths, then blindspot, action, insights; rank order kept within a category.
fn sort_for_display(items: &mut [SelectedItem]) {
    items.sort_by_key(|item| display_rank(item.category()));
}

fn display_rank(category: Category) -> u8 {
    match category {
        Category::Strength => 0,
        Category::Blindspot => 1,
        Category::Action => 2,
        Category::Insight => 3,
        Category::Axis | Category::NonAxis => 4,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::models::{HighlightTemplate, Level, Tier, DIMENSIONS};

    const SIDES: [&str; 5] = ["E", "S", "T", "J", "A"];

    fn make_strength_templates(level: Level) -> HighlightTemplates {
        let mut t = HighlightTemplates::default();
        for (dim, side) in DIMENSIONS.iter().zip(SIDES) {
            t.insert(dim, side, level, HighlightTemplate::default());
        }
        t
    }

    fn make_axis(percentile: u8) -> AxisInfo {
        DIMENSIONS
            .iter()
            .zip(SIDES)
            .fold(AxisInfo::new(), |axis, (dim, side)| axis.with(dim, side, percentile))
    }

    fn assert_highlight_invariants(result: &SelectionResult) {
        let ids = result.ids();
        let unique: HashSet<_> = ids.iter().collect();
        assert!((3..=4).contains(&result.len()), "size {}: {ids:?}", result.len());
        assert_eq!(unique.len(), ids.len(), "duplicates: {ids:?}");
        assert_eq!(result.count_category(Category::Blindspot), 1, "{ids:?}");
        assert_eq!(result.count_category(Category::Action), 1, "{ids:?}");
        assert!(result.count_category(Category::Strength) <= 2, "{ids:?}");
    }

    #[test]
    fn test_five_strong_axes_give_two_strengths_blindspot_action() {
        let templates = make_strength_templates(Level::Strong);
        let axis = make_axis(72);
        let out = select_highlights(&templates, &UserTagSet::new(), &axis, 2024);

        assert_eq!(out.result.len(), 4);
        assert_eq!(out.result.count_category(Category::Strength), 2);
        assert_eq!(out.result.count_category(Category::Blindspot), 1);
        assert_eq!(out.result.count_category(Category::Action), 1);

        let cats: Vec<_> = out.result.items.iter().map(|i| i.category()).collect();
        assert_eq!(
            cats,
            vec![Category::Strength, Category::Strength, Category::Blindspot, Category::Action]
        );
        assert_eq!(out.result.items[2].id(), "hl.blindspot.EI_E_strong");
        assert_eq!(out.result.items[3].tier, Tier::Synthesized);

        let again = select_highlights(&templates, &UserTagSet::new(), &axis, 2024);
        assert_eq!(out.result, again.result);
    }

    #[test]
    fn test_empty_templates_still_yield_floor() {
        let out = select_highlights(&HighlightTemplates::default(), &UserTagSet::new(), &AxisInfo::new(), 1);
        assert_highlight_invariants(&out.result);
        assert_eq!(out.result.count_tier(Tier::Synthesized), out.result.len());
    }

    #[test]
    fn test_template_kinds_fill_floors_before_synthesis() {
        let mut templates = make_strength_templates(Level::Clear);
        templates.insert(
            "TF",
            "T",
            Level::VeryStrong,
            HighlightTemplate {
                id: Some("hl.action.tf".to_string()),
                kind: Some(Category::Action),
                ..HighlightTemplate::default()
            },
        );
        let axis = make_axis(72).with("TF", "T", 95);
        let out = select_highlights(&templates, &UserTagSet::new(), &axis, 4);

        assert_highlight_invariants(&out.result);
        assert!(out.result.ids().contains(&"hl.action.tf"));
        assert_eq!(out.result.count_tier(Tier::Synthesized), 0);
    }

    #[test]
    fn test_invariants_across_axis_profiles() {
        let templates = make_strength_templates(Level::VeryWeak);
        for percentile in (0..=100).step_by(7) {
            for seed in [0, 1, u64::MAX] {
                let out = select_highlights(&templates, &UserTagSet::new(), &make_axis(percentile), seed);
                assert_highlight_invariants(&out.result);
            }
        }
    }

    #[test]
    fn test_strength_ties_broken_by_seed() {
        let templates = make_strength_templates(Level::Strong);
        let axis = make_axis(72);
        let picks: HashSet<Vec<String>> = (0..16)
            .map(|seed| {
                select_highlights(&templates, &UserTagSet::new(), &axis, seed)
                    .result
                    .items
                    .iter()
                    .filter(|i| i.category() == Category::Strength)
                    .map(|i| i.id().to_string())
                    .collect()
            })
            .collect();
        assert!(picks.len() > 1, "strength picks should vary with the seed");
    }
}
