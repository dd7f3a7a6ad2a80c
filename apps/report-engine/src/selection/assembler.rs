//! Section Assembler: resizes a selected card list against the section's own
//! policy, topping up from the section's fallback catalog.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{
    AppendMode, AssemblerDefaults, Candidate, DedupeKey, SelectedItem, SelectionPolicy, Tier,
};
use crate::selection::selector::{count_category, last_unprotected};

/// Upper bound on fallback draws when repeats are enabled.
const REPEAT_FALLBACK_LIMIT: usize = 2000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblerCounts {
    pub before: usize,
    pub after_trim: usize,
    pub fallback_added: usize,
    #[serde(rename = "final")]
    pub final_count: usize,
    pub short_after_fill: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblerActions {
    pub trimmed_to_caps: bool,
    pub trimmed_to_max: bool,
    pub trimmed_to_target: bool,
    pub fallback_allowed: bool,
    pub fallback_used: bool,
}

/// Per-section explain record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionExplain {
    pub section: String,
    pub policy: Option<SelectionPolicy>,
    pub policy_missing: bool,
    pub counts: AssemblerCounts,
    pub actions: AssemblerActions,
    pub fallback_added_ids: Vec<String>,
}

/// Applies category caps, cap-to-max, cap-to-target, fallback fill to min and
/// a final re-cap. Trims drop the lowest-ranked item whose category stays at
/// or above its floor. Without a policy the list passes through untouched.
pub fn assemble_section(
    section: &str,
    mut items: Vec<SelectedItem>,
    policy: Option<&SelectionPolicy>,
    fallback: &[Candidate],
    defaults: &AssemblerDefaults,
) -> (Vec<SelectedItem>, SectionExplain) {
    let before = items.len();
    let mut explain = SectionExplain {
        section: section.to_string(),
        policy: policy.cloned(),
        ..SectionExplain::default()
    };
    explain.counts.before = before;

    let Some(policy) = policy else {
        debug!("No section policy for '{section}'; passing {before} item(s) through");
        explain.policy_missing = true;
        explain.counts.after_trim = before;
        explain.counts.final_count = before;
        return (items, explain);
    };

    // Step 1: category caps
    explain.actions.trimmed_to_caps = trim_to_caps(&mut items, policy);

    // Step 2: cap to max, then to target
    if trim_to(&mut items, policy.max_count, policy) {
        explain.actions.trimmed_to_max = true;
    }
    if trim_to(&mut items, policy.target_count, policy) {
        explain.actions.trimmed_to_target = true;
    }
    explain.counts.after_trim = items.len();

    // Step 3: fallback fill to min
    explain.actions.fallback_allowed = policy.allow_fallback;
    if items.len() < policy.min_count && policy.allow_fallback {
        let need = policy.min_count - items.len();
        let added = draw_fallback(&items, fallback, need, defaults);

        explain.fallback_added_ids = added.iter().map(|i| i.candidate.id.clone()).collect();
        explain.counts.fallback_added = added.len();
        explain.actions.fallback_used = !added.is_empty();

        match defaults.append_mode {
            AppendMode::Append => items.extend(added),
            AppendMode::Prepend => {
                let existing = std::mem::take(&mut items);
                items = added;
                items.extend(existing);
            }
        }
    }

    if items.len() < policy.min_count {
        let short = policy.min_count - items.len();
        explain.counts.short_after_fill = short;
        warn!(
            "Section '{section}' short by {short} after fallback fill ({} < min {})",
            items.len(),
            policy.min_count
        );
    }

    // Step 4: re-cap to max
    if trim_to(&mut items, policy.max_count, policy) {
        explain.actions.trimmed_to_max = true;
    }
    explain.counts.final_count = items.len();

    (items, explain)
}

/// Drops the lowest-ranked items of every over-cap category.
fn trim_to_caps(items: &mut Vec<SelectedItem>, policy: &SelectionPolicy) -> bool {
    let mut trimmed = false;
    for (&category, &cap) in &policy.category_caps {
        while count_category(items, category) > cap {
            let Some(victim) = items.iter().rposition(|i| i.category() == category) else {
                break;
            };
            debug!("Dropping '{}' over the {category} cap", items[victim].id());
            items.remove(victim);
            trimmed = true;
        }
    }
    trimmed
}

/// Shrinks to `limit` from the tail, sparing floor-protected items while any
/// unprotected one is left.
fn trim_to(items: &mut Vec<SelectedItem>, limit: usize, policy: &SelectionPolicy) -> bool {
    let trimmed = items.len() > limit;
    while items.len() > limit {
        let victim = last_unprotected(items, policy, None).unwrap_or(items.len() - 1);
        items.remove(victim);
    }
    trimmed
}

/// Up to `need` fallback items not already present by the dedupe key; cycles
/// the catalog with `#<n>` id suffixes when repeats are allowed.
fn draw_fallback(
    present: &[SelectedItem],
    fallback: &[Candidate],
    need: usize,
    defaults: &AssemblerDefaults,
) -> Vec<SelectedItem> {
    let mut keys: HashSet<String> = present
        .iter()
        .map(|i| dedupe_key(&i.candidate, defaults.dedupe_by))
        .collect();
    let mut ids: HashSet<String> = present.iter().map(|i| i.candidate.id.clone()).collect();
    let mut added = Vec::new();

    for candidate in fallback {
        if added.len() >= need {
            return added;
        }
        if candidate.id.is_empty() || ids.contains(&candidate.id) {
            continue;
        }
        if !keys.insert(dedupe_key(candidate, defaults.dedupe_by)) {
            continue;
        }
        ids.insert(candidate.id.clone());
        added.push(fallback_item(candidate.clone()));
    }

    if !defaults.allow_repeat_fallback || fallback.is_empty() {
        return added;
    }

    let mut draws = 0;
    let mut round = 1;
    while added.len() < need && draws < REPEAT_FALLBACK_LIMIT {
        for candidate in fallback.iter().filter(|c| !c.id.is_empty()) {
            if added.len() >= need || draws >= REPEAT_FALLBACK_LIMIT {
                break;
            }
            draws += 1;
            let id = format!("{}#{round}", candidate.id);
            if !ids.insert(id.clone()) {
                continue;
            }
            added.push(fallback_item(Candidate {
                id,
                ..candidate.clone()
            }));
        }
        round += 1;
    }
    added
}

fn dedupe_key(candidate: &Candidate, key: DedupeKey) -> String {
    match key {
        DedupeKey::Title if !candidate.payload.title.is_empty() => {
            format!("title:{}", candidate.payload.title)
        }
        _ => format!("id:{}", candidate.id),
    }
}

fn fallback_item(candidate: Candidate) -> SelectedItem {
    SelectedItem {
        candidate,
        tier: Tier::FallbackTagged,
        score: 0,
    }
}
