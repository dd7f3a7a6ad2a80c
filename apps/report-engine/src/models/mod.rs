pub mod candidate;
pub mod content;
pub mod policy;
pub mod selection;
pub mod tags;

pub use candidate::{AxisMatch, Candidate, Category, Payload, Predicate};
pub use content::{CardRules, HighlightRules, HighlightTemplate, HighlightTemplates};
pub use policy::{AppendMode, AssemblerDefaults, DedupeKey, SelectionPolicy};
pub use selection::{SelectedItem, SelectionResult, Tier};
pub use tags::{AxisInfo, AxisState, Level, UserTagSet, DIMENSIONS};
