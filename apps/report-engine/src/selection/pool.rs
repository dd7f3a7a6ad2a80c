//! Candidate Pool Builder: turns catalog content into the candidate list one
//! selection run ranks.

use tracing::debug;

use crate::models::{
    AxisInfo, AxisMatch, Candidate, Category, HighlightTemplates, Predicate, UserTagSet,
};

// ────────────────────────────────────────────────────────────────────────────
// Cards
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct CardPool {
    pub candidates: Vec<Candidate>,
    /// Ids excluded outright, with the gate that excluded them.
    pub gated: Vec<String>,
}

/// Keeps candidates that belong to `section` and pass their axis gate.
pub fn build_card_pool(
    section: &str,
    candidates: Vec<Candidate>,
    user_tags: &UserTagSet,
    axis: &AxisInfo,
) -> CardPool {
    let mut pool = CardPool::default();
    for candidate in candidates {
        let belongs = {
            let mut sections = candidate.sections().peekable();
            sections.peek().is_none() || sections.any(|s| s == section)
        };
        if !belongs {
            pool.gated.push(format!("{}:section", candidate.id));
            continue;
        }
        if let Some(clause) = &candidate.axis_match {
            if !axis_gate_passes(clause, user_tags, axis) {
                debug!("Axis gate excluded '{}' in '{section}'", candidate.id);
                pool.gated.push(format!("{}:axis", candidate.id));
                continue;
            }
        }
        pool.candidates.push(candidate);
    }
    pool
}

/// The user must carry `axis:<dim>:<side>` and lean at least `min_delta` on `dim`.
pub fn axis_gate_passes(clause: &AxisMatch, user_tags: &UserTagSet, axis: &AxisInfo) -> bool {
    if clause.dim.is_empty() || clause.side.is_empty() {
        return false;
    }
    user_tags.contains(&clause.tag()) && axis.delta(&clause.dim) >= clause.min_delta
}

// ────────────────────────────────────────────────────────────────────────────
// Highlights
// ────────────────────────────────────────────────────────────────────────────

/// Resolved highlight candidates, split by the level / delta gate.
#[derive(Debug, Clone, Default)]
pub struct HighlightPool {
    pub strict: Vec<Candidate>,
    pub soft: Vec<Candidate>,
    /// Drawn from the weakest axis.
    pub blindspot: Option<Candidate>,
    pub allow_empty: bool,
}

impl HighlightPool {
    /// Strict candidates, or the soft ones when nothing passed the gate and
    /// that is allowed; the blindspot candidate always joins.
    pub fn into_candidates(self) -> Vec<Candidate> {
        let mut out = if self.strict.is_empty() && self.allow_empty {
            self.soft
        } else {
            self.strict
        };
        out.extend(self.blindspot);
        out
    }
}

/// One candidate per known dimension, resolved by `(dim, side, level)` with
/// downward level fallback, plus a blindspot from the weakest dimension.
pub fn build_highlight_pool(templates: &HighlightTemplates, axis: &AxisInfo) -> HighlightPool {
    let rules = &templates.rules;
    let mut pool = HighlightPool {
        allow_empty: rules.allow_empty,
        ..HighlightPool::default()
    };

    for (dim, state) in axis.in_dimension_order() {
        let Some((level, template)) = templates.resolve(dim, &state.side, state.level) else {
            debug!("No highlight template for {dim}:{} at or below {}", state.side, state.level);
            continue;
        };
        let id = template
            .id
            .clone()
            .unwrap_or_else(|| rules.format_id(dim, &state.side, level));
        let axis_tag = format!("axis:{dim}:{}", state.side);

        let mut clauses = template.tags.clone();
        clauses.push(axis_tag.clone());
        let mut predicate = Predicate::new(clauses);
        predicate.min_match = template.min_match;

        let candidate = Candidate {
            payload: template.payload.clone(),
            ..Candidate::new(id, template.kind.unwrap_or(Category::Strength))
                .with_tags(template.tags.iter())
                .with_tags([
                    axis_tag,
                    format!("dim:{dim}"),
                    format!("level:{level}"),
                ])
                .with_priority(if template.priority != 0 {
                    template.priority
                } else {
                    i64::from(state.delta)
                })
                .with_predicate(predicate)
        };

        if rules.passes_gate(state.level, state.delta) {
            pool.strict.push(candidate);
        } else {
            pool.soft.push(candidate);
        }
    }

    pool.blindspot = blindspot_candidate(templates, axis);
    pool
}

/// Weakest-delta dimension (first in dimension order on ties) as a blindspot.
fn blindspot_candidate(templates: &HighlightTemplates, axis: &AxisInfo) -> Option<Candidate> {
    let (dim, state) = axis
        .in_dimension_order()
        .min_by_key(|(_, state)| state.delta)?;
    let (level, template) = templates.resolve(dim, &state.side, state.level)?;
    let base_id = template
        .id
        .clone()
        .unwrap_or_else(|| templates.rules.format_id(dim, &state.side, level));
    let axis_tag = format!("axis:{dim}:{}", state.side);

    Some(Candidate {
        payload: template.payload.clone(),
        ..Candidate::new(format!("hl.blindspot.{base_id}"), Category::Blindspot)
            .with_tags([
                axis_tag.clone(),
                format!("dim:{dim}"),
                format!("level:{level}"),
                "kind:blindspot".to_string(),
            ])
            .with_priority(50 - i64::from(state.delta))
            .with_predicate(Predicate::new([axis_tag]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HighlightTemplate, Level};

    fn make_axis_card(id: &str, min_delta: u8) -> Candidate {
        Candidate::new(id, Category::Axis).with_axis_match("EI", "E", min_delta)
    }

    fn make_templates(dims: &[(&str, &str)], level: Level) -> HighlightTemplates {
        let mut t = HighlightTemplates::default();
        for (dim, side) in dims {
            t.insert(dim, side, level, HighlightTemplate::default());
        }
        t
    }

    #[test]
    fn test_axis_gate_requires_tag_and_delta() {
        let axis = AxisInfo::new().with("EI", "E", 70); // delta 20
        let with_tag = UserTagSet::from_tags(["axis:EI:E"]);

        let pool = build_card_pool("traits", vec![make_axis_card("ok", 15)], &with_tag, &axis);
        assert_eq!(pool.candidates.len(), 1);

        let pool = build_card_pool(
            "traits",
            vec![make_axis_card("no_tag", 15)],
            &UserTagSet::new(),
            &axis,
        );
        assert!(pool.candidates.is_empty());
        assert_eq!(pool.gated, vec!["no_tag:axis"]);

        let weak = AxisInfo::new().with("EI", "E", 60); // delta 10
        let pool = build_card_pool("traits", vec![make_axis_card("weak", 15)], &with_tag, &weak);
        assert!(pool.candidates.is_empty());
    }

    #[test]
    fn test_axis_gate_missing_axis_counts_as_zero_delta() {
        let tags = UserTagSet::from_tags(["axis:EI:E"]);
        assert!(!axis_gate_passes(
            &AxisMatch {
                dim: "EI".into(),
                side: "E".into(),
                min_delta: 1
            },
            &tags,
            &AxisInfo::new()
        ));
    }

    #[test]
    fn test_section_tags_filter_pool() {
        let pool = build_card_pool(
            "traits",
            vec![
                Candidate::new("mine", Category::NonAxis).with_tags(["section:traits"]),
                Candidate::new("theirs", Category::NonAxis).with_tags(["section:career"]),
                Candidate::new("anywhere", Category::NonAxis),
            ],
            &UserTagSet::new(),
            &AxisInfo::new(),
        );
        let ids: Vec<_> = pool.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["mine", "anywhere"]);
    }

    #[test]
    fn test_highlight_candidate_shape() {
        let templates = make_templates(&[("EI", "E")], Level::Strong);
        let axis = AxisInfo::new().with("EI", "E", 72);
        let pool = build_highlight_pool(&templates, &axis);

        assert_eq!(pool.strict.len(), 1);
        let c = &pool.strict[0];
        assert_eq!(c.id, "EI_E_strong");
        assert_eq!(c.category, Category::Strength);
        assert_eq!(c.priority, 22);
        assert!(c.tags.contains("axis:EI:E"));
        assert!(c.tags.contains("dim:EI"));
        assert!(c.tags.contains("level:strong"));
    }

    #[test]
    fn test_highlight_resolves_weaker_template() {
        let templates = make_templates(&[("SN", "N")], Level::Clear);
        let axis = AxisInfo::new().with("SN", "N", 10); // delta 40, very_strong
        let pool = build_highlight_pool(&templates, &axis);
        assert_eq!(pool.strict[0].id, "SN_N_clear");
    }

    #[test]
    fn test_weak_axes_go_to_soft_pool() {
        let templates = make_templates(&[("EI", "E"), ("JP", "P")], Level::VeryWeak);
        let axis = AxisInfo::new().with("EI", "E", 56).with("JP", "P", 52);
        let pool = build_highlight_pool(&templates, &axis);
        assert!(pool.strict.is_empty());
        assert_eq!(pool.soft.len(), 2);

        let candidates = pool.into_candidates();
        // two soft picks plus the blindspot from JP (delta 2)
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[2].id, "hl.blindspot.JP_P_very_weak");
    }

    #[test]
    fn test_soft_pool_dropped_when_empty_not_allowed() {
        let mut templates = make_templates(&[("EI", "E")], Level::VeryWeak);
        templates.rules.allow_empty = false;
        let axis = AxisInfo::new().with("EI", "E", 52);
        let candidates = build_highlight_pool(&templates, &axis).into_candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].category, Category::Blindspot);
    }

    #[test]
    fn test_blindspot_ties_resolve_in_dimension_order() {
        let templates = make_templates(&[("EI", "E"), ("SN", "S"), ("AT", "A")], Level::Strong);
        let axis = AxisInfo::new()
            .with("AT", "A", 72)
            .with("SN", "S", 72)
            .with("EI", "E", 72);
        let pool = build_highlight_pool(&templates, &axis);
        let blindspot = pool.blindspot.unwrap();
        assert_eq!(blindspot.id, "hl.blindspot.EI_E_strong");
        assert_eq!(blindspot.priority, 28);
    }
}
