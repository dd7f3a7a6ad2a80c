//! Selector: the multi-pass rank / fill / balance / cap algorithm shared by
//! cards and highlights.
//!
//! Split in two entry points so the card pipeline can run the section
//! assembler in between:
//!
//! - [`select`]: rank, primary fill, category completion, dedupe, fallback tier.
//! - [`finalize`]: synthesis tier and the final cap.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{Candidate, Category, Payload, SelectedItem, SelectionPolicy, Tier, UserTagSet};
use crate::rules::{evaluate, EvalContext, Evaluation, RejectReason};
use crate::seed::fnv1a_64;

/// Rejected candidates kept verbatim in the explain record.
const REJECTED_SAMPLE_MAX: usize = 5;

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

/// Per-run selection inputs.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    /// Section key or `"highlights"`; part of synthesized ids.
    pub scope: &'a str,
    pub seed: u64,
    pub default_min_match: u32,
    /// The result never has fewer items than this.
    pub hard_floor: usize,
}

impl SelectionContext<'_> {
    fn eval_context(&self) -> EvalContext {
        EvalContext {
            seed: self.seed,
            default_min_match: self.default_min_match,
        }
    }
}

/// Variant-specific synthesis behavior.
#[derive(Debug, Clone, Copy)]
pub struct CategoryRules {
    /// Category of generic placeholders used to reach the floor.
    pub filler: Category,
    /// Keep synthesizing fillers up to `target_count`, not just the hard floor.
    pub pad_to_target: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Explain records
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainPick {
    pub id: String,
    pub category: Category,
    pub tier: Tier,
    pub hit: u32,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainReject {
    pub id: String,
    #[serde(flatten)]
    pub reason: RejectReason,
}

/// Decision trail of one selection run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionExplain {
    pub scope: String,
    pub seed: u64,
    pub pool_size: usize,
    pub policy: Option<SelectionPolicy>,
    /// Excluded by the pool builder before ranking (axis gate, section mismatch).
    pub gated: Vec<String>,
    pub skipped: Vec<String>,
    pub selected: Vec<ExplainPick>,
    pub rejected_total: usize,
    pub rejected_samples: Vec<ExplainReject>,
    pub evicted: Vec<String>,
    pub synthesized: Vec<String>,
    pub truncated: Vec<String>,
}

/// Output of [`select`], before synthesis and the final cap.
#[derive(Debug, Clone)]
pub struct Draft {
    pub items: Vec<SelectedItem>,
    pub explain: SelectionExplain,
}

// ────────────────────────────────────────────────────────────────────────────
// Steps 1–5
// ────────────────────────────────────────────────────────────────────────────

struct Ranked {
    candidate: Candidate,
    eval: Evaluation,
}

/// Ranks the pool and fills up to `target_count` with category balancing,
/// then tops up to `max(min_count, hard_floor)` from the fallback tier.
///
/// Algorithm:
/// 1. Rank accepted candidates by score desc, tiebreak asc, id asc; soft
///    rejects follow in the same order, forbidden ones are dropped
/// 2. Primary fill from accepted candidates up to target, honoring caps and
///    preferring unmet-floor categories among equal scores
/// 3. Category completion from the full ranked pool, evicting the
///    lowest-ranked unprotected pick when at target
/// 4. Dedupe by id
/// 5. Fallback tier: fallback-tagged, then arbitrary unused candidates
pub fn select(
    pool: Vec<Candidate>,
    user_tags: &UserTagSet,
    policy: &SelectionPolicy,
    ctx: &SelectionContext<'_>,
) -> Draft {
    let mut explain = SelectionExplain {
        scope: ctx.scope.to_string(),
        seed: ctx.seed,
        pool_size: pool.len(),
        policy: Some(policy.clone()),
        ..SelectionExplain::default()
    };

    // Step 1: rank
    let eval_ctx = ctx.eval_context();
    let mut seen = HashSet::new();
    let mut accepted = Vec::new();
    let mut soft = Vec::new();
    for candidate in pool {
        if candidate.id.trim().is_empty() {
            warn!("Skipping candidate with empty id in '{}'", ctx.scope);
            explain.skipped.push("(empty)".to_string());
            continue;
        }
        if !seen.insert(candidate.id.clone()) {
            debug!("Duplicate candidate '{}' in '{}' dropped", candidate.id, ctx.scope);
            explain.skipped.push(candidate.id);
            continue;
        }

        let eval = evaluate(&candidate, user_tags, &eval_ctx);
        match eval.reject.clone() {
            None => accepted.push(Ranked { candidate, eval }),
            Some(reason) => {
                explain.rejected_total += 1;
                let hard = reason.is_hard();
                if explain.rejected_samples.len() < REJECTED_SAMPLE_MAX {
                    explain.rejected_samples.push(ExplainReject {
                        id: candidate.id.clone(),
                        reason,
                    });
                }
                if !hard {
                    soft.push(Ranked { candidate, eval });
                }
            }
        }
    }
    sort_ranked(&mut accepted);
    sort_ranked(&mut soft);
    let accepted_len = accepted.len();
    let mut ranked = accepted;
    ranked.append(&mut soft);

    let mut window = Window::new(&ranked, policy);

    // Step 2: primary fill
    let target = policy.target_count;
    let mut group_start = 0;
    while group_start < accepted_len && window.len() < target {
        let score = ranked[group_start].eval.score;
        let group_end = ranked[group_start..accepted_len]
            .iter()
            .position(|r| r.eval.score != score)
            .map_or(accepted_len, |p| group_start + p);

        while window.len() < target {
            let eligible: Vec<usize> = (group_start..group_end)
                .filter(|&i| window.can_take(i))
                .collect();
            let preferred = eligible
                .iter()
                .copied()
                .find(|&i| window.floor_unmet(ranked[i].candidate.category));
            match preferred.or_else(|| eligible.first().copied()) {
                Some(i) => window.take(i, ranked[i].eval.tier()),
                None => break,
            }
        }
        group_start = group_end;
    }

    // Step 3: category completion
    let floors: Vec<(Category, usize)> = policy
        .category_floors
        .iter()
        .map(|(c, f)| (*c, *f))
        .collect();
    for (category, floor) in floors {
        while window.count(category) < floor {
            let usable = if policy.allow_fallback {
                ranked.len()
            } else {
                accepted_len
            };
            let Some(index) = (0..usable)
                .find(|&i| ranked[i].candidate.category == category && window.can_take(i))
            else {
                break;
            };

            if window.len() >= target {
                match window.evictable() {
                    Some(victim) => {
                        explain.evicted.push(ranked[victim].candidate.id.clone());
                        window.release(victim);
                    }
                    None if window.len() >= policy.max_count => break,
                    None => {}
                }
            }

            let tier = if index < accepted_len {
                ranked[index].eval.tier()
            } else {
                fallback_tier(&ranked[index].candidate, policy)
            };
            window.take(index, tier);
        }
    }

    // Step 5: fallback tier
    let goal = policy
        .min_count
        .max(ctx.hard_floor)
        .min(policy.max_count);
    if window.len() < goal && policy.allow_fallback {
        for i in 0..ranked.len() {
            if window.len() >= goal {
                break;
            }
            if window.can_take(i) && ranked[i].candidate.has_any_tag(&policy.fallback_tags) {
                window.take(i, Tier::FallbackTagged);
            }
        }
        for i in 0..ranked.len() {
            if window.len() >= goal {
                break;
            }
            if window.can_take(i) {
                window.take(i, Tier::FallbackArbitrary);
            }
        }
    }

    // Step 4: dedupe (ids are unique after step 1; kept as the output contract)
    let picks = window.into_picks();
    let mut emitted = HashSet::new();
    let mut items = Vec::with_capacity(picks.len());
    for (index, tier) in picks {
        let entry = &ranked[index];
        if !emitted.insert(entry.candidate.id.clone()) {
            continue;
        }
        explain.selected.push(ExplainPick {
            id: entry.candidate.id.clone(),
            category: entry.candidate.category,
            tier,
            hit: entry.eval.hit,
            score: entry.eval.score,
        });
        items.push(SelectedItem {
            candidate: entry.candidate.clone(),
            tier,
            score: entry.eval.score,
        });
    }

    Draft { items, explain }
}

fn sort_ranked(list: &mut [Ranked]) {
    list.sort_by(|a, b| {
        (Reverse(a.eval.score), a.eval.tiebreak, &a.candidate.id).cmp(&(
            Reverse(b.eval.score),
            b.eval.tiebreak,
            &b.candidate.id,
        ))
    });
}

fn fallback_tier(candidate: &Candidate, policy: &SelectionPolicy) -> Tier {
    if candidate.has_any_tag(&policy.fallback_tags) {
        Tier::FallbackTagged
    } else {
        Tier::FallbackArbitrary
    }
}

/// Current picks, keyed by rank so iteration is always rank order.
struct Window<'a> {
    ranked: &'a [Ranked],
    policy: &'a SelectionPolicy,
    picks: BTreeMap<usize, Tier>,
}

impl<'a> Window<'a> {
    fn new(ranked: &'a [Ranked], policy: &'a SelectionPolicy) -> Self {
        Window {
            ranked,
            policy,
            picks: BTreeMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.picks.len()
    }

    fn category_of(&self, index: usize) -> Category {
        self.ranked[index].candidate.category
    }

    fn count(&self, category: Category) -> usize {
        self.picks
            .keys()
            .filter(|&&i| self.category_of(i) == category)
            .count()
    }

    fn floor_unmet(&self, category: Category) -> bool {
        self.count(category) < self.policy.floor(category)
    }

    fn can_take(&self, index: usize) -> bool {
        if self.picks.contains_key(&index) {
            return false;
        }
        let category = self.category_of(index);
        self.policy
            .cap(category)
            .map_or(true, |cap| self.count(category) < cap)
    }

    fn take(&mut self, index: usize, tier: Tier) {
        self.picks.insert(index, tier);
    }

    fn release(&mut self, index: usize) {
        self.picks.remove(&index);
    }

    /// Lowest-ranked pick whose category stays at or above its floor without it.
    fn evictable(&self) -> Option<usize> {
        self.picks.keys().rev().copied().find(|&i| {
            let category = self.category_of(i);
            let floor = self.policy.floor(category);
            floor == 0 || self.count(category) > floor
        })
    }

    fn into_picks(self) -> BTreeMap<usize, Tier> {
        self.picks
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Steps 6–7
// ────────────────────────────────────────────────────────────────────────────

/// Synthesizes placeholders for unmet floors and the hard floor, then caps to
/// `max_count` from the tail without removing floor-protected items.
pub fn finalize(
    items: Vec<SelectedItem>,
    policy: &SelectionPolicy,
    ctx: &SelectionContext<'_>,
    rules: CategoryRules,
    explain: &mut SelectionExplain,
) -> Vec<SelectedItem> {
    let mut seen = HashSet::new();
    let mut items: Vec<SelectedItem> = items
        .into_iter()
        .filter(|item| seen.insert(item.candidate.id.clone()))
        .collect();
    let mut ordinals: BTreeMap<Category, u32> = BTreeMap::new();

    // Step 6a: unmet category floors
    for (&category, &floor) in &policy.category_floors {
        while count_category(&items, category) < floor {
            if items.len() >= policy.target_count {
                if let Some(victim) = last_unprotected(&items, policy, Some(category)) {
                    let removed = items.remove(victim);
                    explain.evicted.push(removed.candidate.id);
                }
            }
            let item = synthesize(ctx, category, &mut ordinals, &seen);
            seen.insert(item.candidate.id.clone());
            explain.synthesized.push(item.candidate.id.clone());
            items.push(item);
        }
    }

    // Step 6b: generic fillers
    let pad_goal = if rules.pad_to_target {
        policy.target_count.max(ctx.hard_floor)
    } else {
        ctx.hard_floor
    };
    while items.len() < pad_goal.min(policy.max_count.max(ctx.hard_floor)) {
        let item = synthesize(ctx, rules.filler, &mut ordinals, &seen);
        seen.insert(item.candidate.id.clone());
        explain.synthesized.push(item.candidate.id.clone());
        items.push(item);
    }

    // Step 7: cap
    while items.len() > policy.max_count {
        let Some(victim) = last_unprotected(&items, policy, None) else {
            break;
        };
        let removed = items.remove(victim);
        explain.truncated.push(removed.candidate.id);
    }

    if !explain.synthesized.is_empty() {
        debug!(
            "Synthesized {} item(s) for '{}'",
            explain.synthesized.len(),
            ctx.scope
        );
    }
    items
}

pub(crate) fn count_category(items: &[SelectedItem], category: Category) -> usize {
    items.iter().filter(|i| i.category() == category).count()
}

/// Index of the last item that can go without breaking a floor.
pub(crate) fn last_unprotected(
    items: &[SelectedItem],
    policy: &SelectionPolicy,
    keep: Option<Category>,
) -> Option<usize> {
    items.iter().rposition(|item| {
        let category = item.category();
        let floor = policy.floor(category);
        Some(category) != keep && (floor == 0 || count_category(items, category) > floor)
    })
}

fn synthesize(
    ctx: &SelectionContext<'_>,
    category: Category,
    ordinals: &mut BTreeMap<Category, u32>,
    taken: &HashSet<String>,
) -> SelectedItem {
    loop {
        let ordinal = ordinals.entry(category).or_insert(0);
        *ordinal += 1;
        let id = synthesized_id(ctx.seed, ctx.scope, category, *ordinal);
        if taken.contains(&id) {
            continue;
        }
        let kind = format!("kind:{category}");
        let candidate = Candidate {
            payload: Payload::placeholder(ctx.scope, category),
            ..Candidate::new(id, category).with_tags(["synthesized", kind.as_str()])
        };
        return SelectedItem {
            candidate,
            tier: Tier::Synthesized,
            score: 0,
        };
    }
}

/// Deterministic placeholder id: same seed, scope and category always give the same id.
pub fn synthesized_id(seed: u64, scope: &str, category: Category, ordinal: u32) -> String {
    let hash = fnv1a_64(format!("{seed}|{scope}|{category}|{ordinal}").as_bytes());
    format!("synth.{category}.{hash:016x}")
}
