//! Rule Evaluator: scores and gates a single candidate against the user's tags.
//!
//! Pure: no I/O and no shared state.

use serde::{Deserialize, Serialize};

use crate::models::{Candidate, Tier, UserTagSet};
use crate::seed::fnv1a_64;

/// Weight of one satisfied clause. Larger than the full priority range so any
/// positive hit outranks every candidate with no hits.
pub const HIT_WEIGHT: i64 = 1_000_000;
/// Priorities are clamped to `±PRIORITY_LIMIT` before scoring.
pub const PRIORITY_LIMIT: i64 = 100_000;

/// Per-run evaluation inputs.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext {
    pub seed: u64,
    /// Threshold for predicates that do not carry their own `min_match`.
    pub default_min_match: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// Never selectable, not even by a fallback tier.
    Forbidden { tags: Vec<String> },
    /// Still usable by the fallback tiers.
    BelowMinMatch { hit: u32, need: u32 },
}

impl RejectReason {
    pub fn is_hard(&self) -> bool {
        matches!(self, RejectReason::Forbidden { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub ok: bool,
    pub hit: u32,
    pub score: i64,
    pub tiebreak: u64,
    pub reject: Option<RejectReason>,
}

impl Evaluation {
    /// Tier an accepted candidate enters the result with.
    pub fn tier(&self) -> Tier {
        if self.hit > 0 {
            Tier::Matched
        } else {
            Tier::SoftMatched
        }
    }
}

pub fn evaluate(candidate: &Candidate, user_tags: &UserTagSet, ctx: &EvalContext) -> Evaluation {
    let priority = candidate.priority.clamp(-PRIORITY_LIMIT, PRIORITY_LIMIT);
    let tiebreak = tiebreak(ctx.seed, &candidate.id);

    let Some(predicate) = candidate.predicate.as_ref() else {
        return Evaluation {
            ok: true,
            hit: 0,
            score: priority,
            tiebreak,
            reject: None,
        };
    };

    let hit = predicate
        .clauses
        .iter()
        .filter(|clause| user_tags.contains(clause))
        .count() as u32;
    let score = if hit > 0 {
        i64::from(hit) * HIT_WEIGHT + priority
    } else {
        priority
    };

    let forbidden: Vec<String> = predicate
        .forbid
        .iter()
        .filter(|tag| user_tags.contains(tag))
        .cloned()
        .collect();
    if !forbidden.is_empty() {
        return Evaluation {
            ok: false,
            hit,
            score,
            tiebreak,
            reject: Some(RejectReason::Forbidden { tags: forbidden }),
        };
    }

    let need = predicate.min_match.unwrap_or(ctx.default_min_match);
    let reject = (hit < need).then_some(RejectReason::BelowMinMatch { hit, need });

    Evaluation {
        ok: reject.is_none(),
        hit,
        score,
        tiebreak,
        reject,
    }
}

/// Stable pseudo-random order key for `id` under `seed`.
pub fn tiebreak(seed: u64, id: &str) -> u64 {
    fnv1a_64(format!("{seed}|{id}").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Predicate};

    fn make_ctx() -> EvalContext {
        EvalContext {
            seed: 42,
            default_min_match: 1,
        }
    }

    fn make_card(id: &str, clauses: &[&str], priority: i64) -> Candidate {
        Candidate::new(id, Category::NonAxis)
            .with_priority(priority)
            .with_predicate(Predicate::new(clauses.iter().copied()))
    }

    #[test]
    fn test_no_predicate_passes_with_zero_hits() {
        let c = Candidate::new("plain", Category::NonAxis).with_priority(7);
        let eval = evaluate(&c, &UserTagSet::new(), &make_ctx());
        assert!(eval.ok);
        assert_eq!(eval.hit, 0);
        assert_eq!(eval.score, 7);
        assert_eq!(eval.tier(), Tier::SoftMatched);
    }

    #[test]
    fn test_hits_count_present_clauses() {
        let tags = UserTagSet::from_tags(["axis:EI:E", "role:NT"]);
        let c = make_card("c", &["axis:EI:E", "role:NT", "role:SJ"], 0);
        let eval = evaluate(&c, &tags, &make_ctx());
        assert!(eval.ok);
        assert_eq!(eval.hit, 2);
        assert_eq!(eval.score, 2 * HIT_WEIGHT);
        assert_eq!(eval.tier(), Tier::Matched);
    }

    #[test]
    fn test_any_hit_outranks_max_priority() {
        let tags = UserTagSet::from_tags(["role:NT"]);
        let matched = evaluate(&make_card("m", &["role:NT"], -PRIORITY_LIMIT), &tags, &make_ctx());
        let loud = evaluate(
            &Candidate::new("l", Category::NonAxis).with_priority(i64::MAX),
            &tags,
            &make_ctx(),
        );
        assert!(matched.score > loud.score, "{} vs {}", matched.score, loud.score);
    }

    #[test]
    fn test_below_min_match_is_soft_reject() {
        let tags = UserTagSet::from_tags(["role:NT"]);
        let c = Candidate::new("c", Category::NonAxis)
            .with_predicate(Predicate::new(["role:NT", "type:INTJ-A"]).min_match(2));
        let eval = evaluate(&c, &tags, &make_ctx());
        assert!(!eval.ok);
        assert_eq!(eval.reject, Some(RejectReason::BelowMinMatch { hit: 1, need: 2 }));
        assert!(!eval.reject.unwrap().is_hard());
    }

    #[test]
    fn test_default_min_match_comes_from_context() {
        let c = make_card("c", &["role:SJ"], 0);
        let strict = evaluate(&c, &UserTagSet::new(), &make_ctx());
        let lenient = evaluate(
            &c,
            &UserTagSet::new(),
            &EvalContext {
                seed: 42,
                default_min_match: 0,
            },
        );
        assert!(!strict.ok);
        assert!(lenient.ok);
    }

    #[test]
    fn test_forbidden_tag_is_hard_reject() {
        let tags = UserTagSet::from_tags(["role:NT", "borderline:EI"]);
        let c = Candidate::new("c", Category::NonAxis)
            .with_predicate(Predicate::new(["role:NT"]).forbid(["borderline:EI"]));
        let eval = evaluate(&c, &tags, &make_ctx());
        assert!(!eval.ok);
        assert!(eval.reject.unwrap().is_hard());
    }

    #[test]
    fn test_tiebreak_is_stable_and_seed_dependent() {
        assert_eq!(tiebreak(1, "a"), tiebreak(1, "a"));
        assert_ne!(tiebreak(1, "a"), tiebreak(2, "a"));
        assert_ne!(tiebreak(1, "a"), tiebreak(1, "b"));
    }
}
