// Selection engine: pure, synchronous, no I/O.
// Content is loaded by the catalog layer before any of this runs.

pub mod assembler;
pub mod cards;
pub mod explain;
pub mod highlights;
pub mod pool;
pub mod selector;

pub use assembler::{assemble_section, SectionExplain};
pub use cards::{select_cards, CardSectionContent, CardSelection};
pub use explain::{ExplainRecorder, ExplainTrail};
pub use highlights::{select_highlights, HighlightSelection};
pub use selector::{finalize, select, CategoryRules, SelectionContext, SelectionExplain};
