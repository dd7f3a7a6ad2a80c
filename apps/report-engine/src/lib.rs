//! Deterministic content selection for personality reports.
//!
//! The engine is pure: given a user's tags, axis states, a seed and a loaded
//! content snapshot it always returns the same cards and highlights. All I/O
//! lives behind the [`catalog`] traits and the [`report::ReportComposer`].

pub mod catalog;
pub mod config;
pub mod errors;
pub mod models;
pub mod report;
pub mod rules;
pub mod seed;
pub mod selection;

pub use errors::EngineError;
pub use report::{ComposeOptions, ComposedSelection, ReportComposer, ReportRequest};
