use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::tags::normalize_tag;

// ────────────────────────────────────────────────────────────────────────────
// Category
// ────────────────────────────────────────────────────────────────────────────

/// Balancing bucket of a candidate.
/// Cards use `axis` / `non_axis`; highlights use the remaining four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Axis,
    #[serde(alias = "core", alias = "topic")]
    NonAxis,
    Strength,
    #[serde(alias = "risk")]
    Blindspot,
    Action,
    Insight,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Axis => "axis",
            Category::NonAxis => "non_axis",
            Category::Strength => "strength",
            Category::Blindspot => "blindspot",
            Category::Action => "action",
            Category::Insight => "insight",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "axis" => Ok(Category::Axis),
            "non_axis" | "core" | "topic" => Ok(Category::NonAxis),
            "strength" => Ok(Category::Strength),
            "blindspot" | "risk" => Ok(Category::Blindspot),
            "action" => Ok(Category::Action),
            "insight" => Ok(Category::Insight),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Matching metadata
// ────────────────────────────────────────────────────────────────────────────

/// Tag rule attached to a candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    /// Required tags; each one present in the user set counts as one hit.
    pub clauses: Vec<String>,
    /// Any of these present rejects the candidate outright.
    #[serde(default)]
    pub forbid: Vec<String>,
    /// Falls back to the caller's default when absent.
    #[serde(default)]
    pub min_match: Option<u32>,
}

impl Predicate {
    pub fn new<I, S>(clauses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Predicate {
            clauses: clauses
                .into_iter()
                .filter_map(|c| normalize_tag(c.as_ref()))
                .collect(),
            forbid: Vec::new(),
            min_match: None,
        }
    }

    pub fn min_match(mut self, n: u32) -> Self {
        self.min_match = Some(n);
        self
    }

    pub fn forbid<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.forbid = tags
            .into_iter()
            .filter_map(|t| normalize_tag(t.as_ref()))
            .collect();
        self
    }
}

/// Hard gate for axis-linked cards: the user must lean `side` on `dim` by at least `min_delta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisMatch {
    pub dim: String,
    pub side: String,
    pub min_delta: u8,
}

impl AxisMatch {
    pub fn tag(&self) -> String {
        format!("axis:{}:{}", self.dim, self.side)
    }
}

/// Opaque render templates. The engine only reads `title`, and only as a dedupe key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "desc")]
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bullets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tips: Vec<String>,
}

impl Payload {
    /// Template keys for a synthesized item; the renderer resolves them to generic copy.
    pub fn placeholder(scope: &str, category: Category) -> Self {
        Payload {
            title: format!("{{{{placeholder.{scope}.{category}.title}}}}"),
            body: format!("{{{{placeholder.{scope}.{category}.body}}}}"),
            bullets: Vec::new(),
            tips: Vec::new(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Candidate
// ────────────────────────────────────────────────────────────────────────────

/// One selectable content unit (a card or a highlight template).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Predicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis_match: Option<AxisMatch>,
    pub category: Category,
    #[serde(default)]
    pub payload: Payload,
}

impl Candidate {
    pub fn new(id: impl Into<String>, category: Category) -> Self {
        Candidate {
            id: id.into(),
            tags: BTreeSet::new(),
            priority: 0,
            predicate: None,
            axis_match: None,
            category,
            payload: Payload::default(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags
            .extend(tags.into_iter().filter_map(|t| normalize_tag(t.as_ref())));
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_axis_match(mut self, dim: &str, side: &str, min_delta: u8) -> Self {
        self.axis_match = Some(AxisMatch {
            dim: dim.to_string(),
            side: side.to_string(),
            min_delta,
        });
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.payload.title = title.into();
        self
    }

    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }

    /// Section keys this candidate is restricted to via `section:<key>` tags.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().filter_map(|t| t.strip_prefix("section:"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_aliases_parse() {
        assert_eq!("risk".parse::<Category>().unwrap(), Category::Blindspot);
        assert_eq!("non-axis".parse::<Category>().unwrap(), Category::NonAxis);
        assert!("mystery".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let json = serde_json::to_string(&Category::NonAxis).unwrap();
        assert_eq!(json, "\"non_axis\"");
    }

    #[test]
    fn test_builder_normalizes_tags() {
        let c = Candidate::new("c1", Category::NonAxis).with_tags(["  Section:traits ", ""]);
        assert!(c.tags.contains("section:traits"));
        assert_eq!(c.tags.len(), 1);
        assert_eq!(c.sections().collect::<Vec<_>>(), vec!["traits"]);
    }

    #[test]
    fn test_placeholder_payload_uses_template_keys() {
        let p = Payload::placeholder("highlights", Category::Action);
        assert_eq!(p.title, "{{placeholder.highlights.action.title}}");
    }

    #[test]
    fn test_axis_match_tag() {
        let c = Candidate::new("c", Category::Axis).with_axis_match("EI", "E", 15);
        assert_eq!(c.axis_match.unwrap().tag(), "axis:EI:E");
    }
}
