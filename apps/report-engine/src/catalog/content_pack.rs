//! Filesystem content pack: JSON documents under `<root>/`.
//!
//! Layout:
//! - `report_cards_<section>.json`           `{rules, items: [card…]}`
//! - `report_cards_fallback_<section>.json`  `{items: [card…]}` or `[card…]`
//! - `report_highlights_templates.json`      `{rules, templates: {dim: {side: {level: tpl}}}}`
//! - `report_section_policies.json`          `{defaults, items: {section: policy}}`
//!
//! Missing files read as empty. Documents that are not valid JSON are errors;
//! malformed items inside a valid document are skipped with a warning.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::catalog::{Catalog, PolicyStore};
use crate::errors::EngineError;
use crate::models::tags::normalize_tag;
use crate::models::{
    AssemblerDefaults, AxisMatch, Candidate, CardRules, Category, HighlightTemplate,
    HighlightTemplates, Level, Payload, Predicate, SelectionPolicy,
};

const POLICIES_FILE: &str = "report_section_policies.json";
const HIGHLIGHTS_FILE: &str = "report_highlights_templates.json";

/// Content pack rooted at one version directory.
#[derive(Debug, Clone)]
pub struct ContentPackCatalog {
    root: PathBuf,
}

impl ContentPackCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ContentPackCatalog { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cards_path(&self, section: &str) -> PathBuf {
        self.root.join(format!("report_cards_{section}.json"))
    }

    fn fallback_path(&self, section: &str) -> PathBuf {
        self.root.join(format!("report_cards_fallback_{section}.json"))
    }

    async fn section_policies(&self) -> Result<SectionPolicies, EngineError> {
        Ok(read_json(&self.root.join(POLICIES_FILE))
            .await?
            .map(|doc| parse_policy_document(&doc))
            .unwrap_or_default())
    }
}

#[async_trait]
impl Catalog for ContentPackCatalog {
    async fn load_candidates(&self, section: &str) -> Result<Vec<Candidate>, EngineError> {
        let Some(doc) = read_json(&self.cards_path(section)).await? else {
            return Ok(Vec::new());
        };
        let (_, items) = parse_card_document(section, &doc);
        info!("Loaded {} card candidate(s) for '{section}'", items.len());
        Ok(items)
    }

    async fn load_fallback(&self, section: &str) -> Result<Vec<Candidate>, EngineError> {
        Ok(read_json(&self.fallback_path(section))
            .await?
            .map(|doc| parse_items(section, items_of(&doc)))
            .unwrap_or_default())
    }

    async fn load_card_rules(&self, section: &str) -> Result<CardRules, EngineError> {
        Ok(read_json(&self.cards_path(section))
            .await?
            .map(|doc| parse_card_document(section, &doc).0)
            .unwrap_or_default())
    }

    async fn load_highlight_templates(&self) -> Result<Option<HighlightTemplates>, EngineError> {
        Ok(read_json(&self.root.join(HIGHLIGHTS_FILE))
            .await?
            .map(|doc| parse_highlight_document(&doc)))
    }
}

#[async_trait]
impl PolicyStore for ContentPackCatalog {
    async fn get(&self, section: &str) -> Result<Option<SelectionPolicy>, EngineError> {
        Ok(self.section_policies().await?.items.remove(section))
    }

    async fn assembler_defaults(&self) -> Result<AssemblerDefaults, EngineError> {
        Ok(self.section_policies().await?.defaults)
    }
}

/// `Ok(None)` when the file does not exist.
async fn read_json(path: &Path) -> Result<Option<Value>, EngineError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(EngineError::Io(e)),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| EngineError::ContentPack(format!("{}: {e}", path.display())))
}

// ────────────────────────────────────────────────────────────────────────────
// Card documents
// ────────────────────────────────────────────────────────────────────────────

/// Rules and valid items of a card document; bad rules fall back to defaults.
pub fn parse_card_document(section: &str, doc: &Value) -> (CardRules, Vec<Candidate>) {
    let rules = match doc.get("rules") {
        Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
            warn!("Invalid card rules for '{section}', using defaults: {e}");
            CardRules::default()
        }),
        None => CardRules::default(),
    };
    (rules, parse_items(section, items_of(doc)))
}

fn items_of(doc: &Value) -> &[Value] {
    match doc {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

fn parse_items(section: &str, items: &[Value]) -> Vec<Candidate> {
    items
        .iter()
        .filter_map(|raw| match parse_card(section, raw) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                warn!("Skipping card in '{section}': {e}");
                None
            }
        })
        .collect()
}

/// Validates one card item into a `Candidate`.
pub fn parse_card(section: &str, raw: &Value) -> Result<Candidate, EngineError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| EngineError::malformed("(unknown)", "item is not an object"))?;
    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| EngineError::malformed("(unknown)", "missing id"))?
        .to_string();

    let tags = string_list(obj, "tags", &id)?;
    let priority = match obj.get("priority") {
        None | Some(Value::Null) => 0,
        Some(v) => v
            .as_i64()
            .ok_or_else(|| EngineError::malformed(&id, "priority is not an integer"))?,
    };

    let axis_match = match obj.get("match").and_then(|m| m.get("axis")) {
        None | Some(Value::Null) => None,
        Some(axis) => Some(parse_axis_match(axis, &id)?),
    };

    let category = match obj.get("category").and_then(Value::as_str) {
        Some(raw) => raw
            .parse::<Category>()
            .map_err(|e| EngineError::malformed(&id, e))?,
        None if axis_match.is_some() || id.contains("_axis_") => Category::Axis,
        None => Category::NonAxis,
    };

    let own_section = obj
        .get("section")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(section);

    let predicate = match obj.get("rules") {
        None | Some(Value::Null) => {
            let clauses: Vec<&String> = tags.iter().filter(|t| !t.starts_with("section:")).collect();
            (!clauses.is_empty()).then(|| Predicate::new(clauses))
        }
        Some(rules) => Some(parse_predicate(rules, &id)?),
    };

    let payload = Payload {
        title: string_field(obj, "title"),
        body: obj
            .get("body")
            .or_else(|| obj.get("desc"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        bullets: string_list(obj, "bullets", &id)?,
        tips: string_list(obj, "tips", &id)?,
    };

    let mut candidate = Candidate {
        payload,
        axis_match,
        predicate,
        ..Candidate::new(id, category)
            .with_tags(tags.iter())
            .with_priority(priority)
    };
    candidate.tags.insert(format!("section:{own_section}"));
    Ok(candidate)
}

fn parse_predicate(raw: &Value, id: &str) -> Result<Predicate, EngineError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| EngineError::malformed(id, "rules is not an object"))?;

    let require_all = string_list(obj, "require_all", id)?;
    let mut clauses = require_all.clone();
    for key in ["clauses", "require_any", "tags"] {
        clauses.extend(string_list(obj, key, id)?);
    }
    let forbid = string_list(obj, "forbid", id)?;

    let min_match = match obj.get("min_match") {
        None | Some(Value::Null) if require_all.is_empty() => None,
        None | Some(Value::Null) => Some(require_all.len() as u32),
        Some(v) => Some(
            v.as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| EngineError::malformed(id, "min_match is not a non-negative integer"))?,
        ),
    };

    let mut predicate = Predicate::new(clauses).forbid(forbid);
    predicate.min_match = min_match;
    Ok(predicate)
}

fn parse_axis_match(raw: &Value, id: &str) -> Result<AxisMatch, EngineError> {
    let dim = raw.get("dim").and_then(Value::as_str).map(str::trim).unwrap_or_default();
    let side = raw.get("side").and_then(Value::as_str).map(str::trim).unwrap_or_default();
    if dim.is_empty() || side.is_empty() {
        return Err(EngineError::malformed(id, "axis match needs dim and side"));
    }
    let min_delta = match raw.get("min_delta") {
        None | Some(Value::Null) => 0,
        Some(v) => v
            .as_u64()
            .filter(|d| *d <= 50)
            .ok_or_else(|| EngineError::malformed(id, "min_delta must be 0..=50"))? as u8,
    };
    Ok(AxisMatch {
        dim: dim.to_ascii_uppercase(),
        side: side.to_ascii_uppercase(),
        min_delta,
    })
}

fn string_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// A missing key is an empty list; anything but an array of strings is malformed.
fn string_list(obj: &Map<String, Value>, key: &str, id: &str) -> Result<Vec<String>, EngineError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| EngineError::malformed(id, format!("'{key}' must hold strings")))
            })
            .collect(),
        Some(_) => Err(EngineError::malformed(id, format!("'{key}' is not a list"))),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Highlight templates
// ────────────────────────────────────────────────────────────────────────────

/// Template table with per-entry validation.
pub fn parse_highlight_document(doc: &Value) -> HighlightTemplates {
    let mut out = HighlightTemplates::default();
    if let Some(rules) = doc.get("rules") {
        match serde_json::from_value(rules.clone()) {
            Ok(rules) => out.rules = rules,
            Err(e) => warn!("Invalid highlight rules, using defaults: {e}"),
        }
    }

    let Some(dims) = doc.get("templates").and_then(Value::as_object) else {
        return out;
    };
    for (dim, sides) in dims {
        let Some(sides) = sides.as_object() else {
            warn!("Highlight templates for '{dim}' are not an object");
            continue;
        };
        for (side, levels) in sides {
            let Some(levels) = levels.as_object() else {
                warn!("Highlight templates for '{dim}:{side}' are not an object");
                continue;
            };
            for (level, raw) in levels {
                let level: Level = match level.parse() {
                    Ok(level) => level,
                    Err(e) => {
                        warn!("Skipping highlight template {dim}:{side}: {e}");
                        continue;
                    }
                };
                match serde_json::from_value::<HighlightTemplate>(raw.clone()) {
                    Ok(mut template) => {
                        template.tags = template
                            .tags
                            .iter()
                            .filter_map(|t| normalize_tag(t))
                            .collect();
                        out.insert(dim, side, level, template);
                    }
                    Err(e) => warn!("Skipping highlight template {dim}:{side}:{level}: {e}"),
                }
            }
        }
    }
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Section policies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SectionPolicies {
    pub defaults: AssemblerDefaults,
    pub items: BTreeMap<String, SelectionPolicy>,
}

pub fn parse_policy_document(doc: &Value) -> SectionPolicies {
    let defaults = match doc.get("defaults") {
        Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
            warn!("Invalid section policy defaults: {e}");
            AssemblerDefaults::default()
        }),
        None => AssemblerDefaults::default(),
    };

    let items = doc.get("items");
    let entries = items
        .and_then(|i| i.get("cards"))
        .or(items)
        .and_then(Value::as_object);

    let mut out = SectionPolicies {
        defaults,
        items: BTreeMap::new(),
    };
    for (section, raw) in entries.into_iter().flatten() {
        match parse_policy(raw) {
            Some(policy) => {
                out.items.insert(section.clone(), policy.normalized());
            }
            None => warn!("Skipping malformed section policy '{section}'"),
        }
    }
    out
}

fn parse_policy(raw: &Value) -> Option<SelectionPolicy> {
    let obj = raw.as_object()?;
    let count = |long: &str, short: &str| -> Option<Option<usize>> {
        match obj.get(long).or_else(|| obj.get(short)) {
            None | Some(Value::Null) => Some(None),
            Some(v) => v.as_u64().map(|n| Some(n as usize)),
        }
    };
    let min = count("min_cards", "min")?.unwrap_or(0);
    let target = count("target_cards", "target")?.unwrap_or(min);
    let max = count("max_cards", "max")?.unwrap_or(target);
    let allow_fallback = match obj.get("allow_fallback") {
        None | Some(Value::Null) => true,
        Some(v) => v.as_bool()?,
    };
    Some(SelectionPolicy::new(min, target, max).allow_fallback(allow_fallback))
}
