pub mod composer;

pub use composer::{ComposeOptions, ComposedSelection, ReportComposer, ReportRequest, ScoreInput};
