//! Card pipeline: pool → select → section assembler → synthesis and cap.

use crate::models::content::{apply_card_categories, CARD_HARD_FLOOR};
use crate::models::{
    AssemblerDefaults, AxisInfo, Candidate, CardRules, Category, SelectionPolicy, SelectionResult,
    UserTagSet,
};
use crate::selection::assembler::{assemble_section, SectionExplain};
use crate::selection::pool::build_card_pool;
use crate::selection::selector::{finalize, select, CategoryRules, SelectionContext, SelectionExplain};

/// Cards need at least one clause hit to count as matched.
const CARD_DEFAULT_MIN_MATCH: u32 = 1;

const CARD_CATEGORY_RULES: CategoryRules = CategoryRules {
    filler: Category::NonAxis,
    pad_to_target: false,
};

/// Everything loaded for one card section.
#[derive(Debug, Clone, Default)]
pub struct CardSectionContent {
    pub candidates: Vec<Candidate>,
    pub rules: CardRules,
    /// Assembler authority for final counts; `None` passes through.
    pub policy: Option<SelectionPolicy>,
    pub fallback: Vec<Candidate>,
}

#[derive(Debug, Clone)]
pub struct CardSelection {
    pub result: SelectionResult,
    pub selection: SelectionExplain,
    pub section: SectionExplain,
}

pub fn select_cards(
    section: &str,
    content: CardSectionContent,
    defaults: &AssemblerDefaults,
    user_tags: &UserTagSet,
    axis: &AxisInfo,
    seed: u64,
) -> CardSelection {
    let ctx = SelectionContext {
        scope: section,
        seed,
        default_min_match: CARD_DEFAULT_MIN_MATCH,
        hard_floor: CARD_HARD_FLOOR,
    };

    // Step 1: pool with section and axis gates
    let pool = build_card_pool(section, content.candidates, user_tags, axis);

    // Step 2: selector against the section's own card rules
    let pool_policy = content.rules.to_policy();
    let mut draft = select(pool.candidates, user_tags, &pool_policy, &ctx);
    draft.explain.gated = pool.gated;

    // Step 3: section assembler against the section policy
    let section_policy = content.policy.map(|p| {
        apply_card_categories(
            p.with_fallback_tags(content.rules.fallback_tags.iter().cloned())
                .with_hard_floor(CARD_HARD_FLOOR),
        )
    });
    let (items, section_explain) = assemble_section(
        section,
        draft.items,
        section_policy.as_ref(),
        &content.fallback,
        defaults,
    );

    // Step 4: synthesis and cap under whichever policy is authoritative
    let final_policy = section_policy.unwrap_or(pool_policy);
    let mut explain = draft.explain;
    let items = finalize(items, &final_policy, &ctx, CARD_CATEGORY_RULES, &mut explain);

    CardSelection {
        result: SelectionResult { items },
        selection: explain,
        section: section_explain,
    }
}
