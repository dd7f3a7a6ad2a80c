//! Catalog boundary: every byte of content enters the engine through these
//! traits, already validated into typed structs.
//!
//! Composition used by the binary:
//! `GuardedCatalog<CachedCatalog<ContentPackCatalog>>`, held as `Arc<dyn Catalog>`.

use async_trait::async_trait;

use crate::errors::EngineError;
use crate::models::{AssemblerDefaults, Candidate, CardRules, HighlightTemplates, SelectionPolicy};

pub mod cache;
pub mod content_pack;
pub mod guard;
pub mod memory;

pub use cache::{CachedCatalog, Clock, SystemClock};
pub use content_pack::ContentPackCatalog;
pub use guard::GuardedCatalog;
pub use memory::InMemoryCatalog;

// ────────────────────────────────────────────────────────────────────────────
// Trait definitions
// ────────────────────────────────────────────────────────────────────────────

/// Source of selectable content. Implement this to swap storage backends
/// without touching the engine or the composer.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Primary card candidates for a section; empty when the section has none.
    async fn load_candidates(&self, section: &str) -> Result<Vec<Candidate>, EngineError>;

    /// The section's distinct fallback catalog, used only by the section assembler.
    async fn load_fallback(&self, section: &str) -> Result<Vec<Candidate>, EngineError>;

    async fn load_card_rules(&self, section: &str) -> Result<CardRules, EngineError>;

    async fn load_highlight_templates(&self) -> Result<Option<HighlightTemplates>, EngineError>;
}

/// Per-section count policies for the section assembler.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn get(&self, section: &str) -> Result<Option<SelectionPolicy>, EngineError>;

    async fn assembler_defaults(&self) -> Result<AssemblerDefaults, EngineError>;
}
