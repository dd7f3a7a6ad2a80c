//! User-side inputs: the normalized tag set and per-axis state.
//!
//! Derivation of these from raw scores belongs to the scoring subsystem; this
//! module only owns the normalizing constructors so every caller produces the
//! same canonical shapes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The fixed trait dimensions, in canonical order.
pub const DIMENSIONS: [&str; 5] = ["EI", "SN", "TF", "JP", "AT"];

// ────────────────────────────────────────────────────────────────────────────
// Level
// ────────────────────────────────────────────────────────────────────────────

/// Strength of one axis, ordered weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    VeryWeak,
    Weak,
    Moderate,
    Clear,
    Strong,
    VeryStrong,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::VeryWeak,
        Level::Weak,
        Level::Moderate,
        Level::Clear,
        Level::Strong,
        Level::VeryStrong,
    ];

    /// Thresholds on `delta = |percentile - 50|` (display percentile 80 / 70 / 60 / 55).
    /// `moderate` is never derived; it only appears in template tables.
    pub fn from_delta(delta: u8) -> Self {
        match delta {
            30.. => Level::VeryStrong,
            20..=29 => Level::Strong,
            10..=19 => Level::Clear,
            5..=9 => Level::Weak,
            _ => Level::VeryWeak,
        }
    }

    pub fn rank(self) -> usize {
        self as usize
    }

    /// This level, then each weaker one down to `very_weak`.
    pub fn descending(self) -> impl Iterator<Item = Level> {
        Level::ALL[..=self.rank()].iter().rev().copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::VeryWeak => "very_weak",
            Level::Weak => "weak",
            Level::Moderate => "moderate",
            Level::Clear => "clear",
            Level::Strong => "strong",
            Level::VeryStrong => "very_strong",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Level::ALL
            .into_iter()
            .find(|l| l.as_str() == wanted)
            .ok_or_else(|| format!("unknown level '{s}'"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Axis info
// ────────────────────────────────────────────────────────────────────────────

/// One dimension's state for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisState {
    pub side: String,
    pub percentile: u8, // 0 – 100
    pub delta: u8,      // |percentile - 50|, 0 – 50
    pub level: Level,
}

impl AxisState {
    pub fn from_percentile(side: impl Into<String>, percentile: u8) -> Self {
        let percentile = percentile.min(100);
        let delta = percentile.abs_diff(50);
        AxisState {
            side: side.into().trim().to_string(),
            percentile,
            delta,
            level: Level::from_delta(delta),
        }
    }
}

/// `dim → AxisState`, ordered by dimension key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AxisInfo(BTreeMap<String, AxisState>);

impl AxisInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dim: impl Into<String>, state: AxisState) {
        self.0.insert(dim.into().trim().to_ascii_uppercase(), state);
    }

    pub fn with(mut self, dim: &str, side: &str, percentile: u8) -> Self {
        self.insert(dim, AxisState::from_percentile(side, percentile));
        self
    }

    pub fn get(&self, dim: &str) -> Option<&AxisState> {
        self.0.get(dim)
    }

    /// Delta for `dim`; an absent axis counts as no evidence.
    pub fn delta(&self, dim: &str) -> u8 {
        self.get(dim).map(|s| s.delta).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AxisState)> {
        self.0.iter()
    }

    /// Known axes in the fixed dimension order.
    pub fn in_dimension_order(&self) -> impl Iterator<Item = (&'static str, &AxisState)> {
        DIMENSIONS
            .iter()
            .filter_map(|dim| self.0.get(*dim).map(|state| (*dim, state)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tag set
// ────────────────────────────────────────────────────────────────────────────

/// Trims, collapses inner whitespace, trims every `:` segment and lower-cases
/// the prefix before the first `:`. Returns `None` for empty input.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    let segments: Vec<&str> = collapsed.split(':').map(str::trim).collect();
    match segments.split_first() {
        Some((prefix, rest)) if !rest.is_empty() => Some(format!(
            "{}:{}",
            prefix.to_ascii_lowercase(),
            rest.join(":")
        )),
        _ => Some(collapsed),
    }
}

/// The user's tags, normalized and ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserTagSet(BTreeSet<String>);

impl UserTagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for tag in tags {
            set.insert(tag.as_ref());
        }
        set
    }

    pub fn insert(&mut self, raw: &str) -> bool {
        match normalize_tag(raw) {
            Some(tag) => self.0.insert(tag),
            None => false,
        }
    }

    /// Adds `axis:<dim>:<side>` and `state:<dim>:<level>` for every known axis.
    pub fn with_axis_tags(mut self, axis: &AxisInfo) -> Self {
        for (dim, state) in axis.iter() {
            if state.side.is_empty() {
                continue;
            }
            self.insert(&format!("axis:{dim}:{}", state.side));
            self.insert(&format!("state:{dim}:{}", state.level));
        }
        self
    }

    /// Adds `type:<code>` and, for codes shaped like `ENFJ-A`, one axis tag per letter.
    pub fn with_type_code(mut self, code: &str) -> Self {
        let code = code.trim().to_ascii_uppercase();
        if code.is_empty() {
            return self;
        }
        self.insert(&format!("type:{code}"));

        let letters: Vec<char> = code.chars().filter(|c| *c != '-').collect();
        if letters.len() != 5 {
            return self;
        }
        for (dim, side) in DIMENSIONS.iter().zip(letters) {
            if dim.contains(side) {
                self.insert(&format!("axis:{dim}:{side}"));
            }
        }
        self
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_thresholds() {
        assert_eq!(Level::from_delta(0), Level::VeryWeak);
        assert_eq!(Level::from_delta(4), Level::VeryWeak);
        assert_eq!(Level::from_delta(5), Level::Weak);
        assert_eq!(Level::from_delta(10), Level::Clear);
        assert_eq!(Level::from_delta(19), Level::Clear);
        assert_eq!(Level::from_delta(22), Level::Strong);
        assert_eq!(Level::from_delta(30), Level::VeryStrong);
        assert_eq!(Level::from_delta(50), Level::VeryStrong);
    }

    #[test]
    fn test_level_descending_walks_down_to_very_weak() {
        let levels: Vec<_> = Level::Clear.descending().collect();
        assert_eq!(
            levels,
            vec![Level::Clear, Level::Moderate, Level::Weak, Level::VeryWeak]
        );
    }

    #[test]
    fn test_level_parse_is_case_insensitive() {
        assert_eq!("Very_Strong".parse::<Level>().unwrap(), Level::VeryStrong);
        assert!("huge".parse::<Level>().is_err());
    }

    #[test]
    fn test_axis_state_derives_delta_and_level() {
        let state = AxisState::from_percentile("E", 72);
        assert_eq!(state.delta, 22);
        assert_eq!(state.level, Level::Strong);

        let low = AxisState::from_percentile("I", 10);
        assert_eq!(low.delta, 40);
        assert_eq!(low.level, Level::VeryStrong);
    }

    #[test]
    fn test_axis_state_clamps_percentile() {
        let state = AxisState::from_percentile("E", 180);
        assert_eq!(state.percentile, 100);
        assert_eq!(state.delta, 50);
    }

    #[test]
    fn test_normalize_tag_lowercases_prefix_only() {
        assert_eq!(normalize_tag("  AXIS:EI:E "), Some("axis:EI:E".to_string()));
        assert_eq!(normalize_tag("Role:  NT"), Some("role:NT".to_string()));
        assert_eq!(normalize_tag("Axis : EI :  E"), Some("axis:EI:E".to_string()));
        assert_eq!(normalize_tag("kind  core"), Some("kind core".to_string()));
        assert_eq!(normalize_tag("   "), None);
    }

    #[test]
    fn test_spaced_user_tag_matches_clause() {
        let tags = UserTagSet::from_tags(["Role: NT"]);
        assert!(tags.contains("role:NT"));
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_type_code_expands_axis_tags() {
        let tags = UserTagSet::new().with_type_code("enfj-a");
        assert!(tags.contains("type:ENFJ-A"));
        assert!(tags.contains("axis:EI:E"));
        assert!(tags.contains("axis:SN:N"));
        assert!(tags.contains("axis:TF:F"));
        assert!(tags.contains("axis:JP:J"));
        assert!(tags.contains("axis:AT:A"));
    }

    #[test]
    fn test_axis_tags_from_axis_info() {
        let axis = AxisInfo::new().with("EI", "E", 72);
        let tags = UserTagSet::new().with_axis_tags(&axis);
        assert!(tags.contains("axis:EI:E"));
        assert!(tags.contains("state:EI:strong"));
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_dimension_order_ignores_unknown_axes() {
        let axis = AxisInfo::new()
            .with("AT", "A", 60)
            .with("EI", "E", 70)
            .with("XX", "Q", 90);
        let dims: Vec<_> = axis.in_dimension_order().map(|(d, _)| d).collect();
        assert_eq!(dims, vec!["EI", "AT"]);
    }
}
