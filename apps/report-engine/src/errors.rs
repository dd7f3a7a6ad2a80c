use thiserror::Error;

/// Engine-level error type.
/// Every fallible library function returns `Result<T, EngineError>`; the binary
/// wraps it in `anyhow` at the edge.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Strict mode only: a section (or the highlight template table) has no content.
    #[error("Missing catalog for section '{section}'")]
    MissingCatalog { section: String },

    #[error("Malformed candidate '{id}': {reason}")]
    MalformedCandidate { id: String, reason: String },

    #[error("Content pack error: {0}")]
    ContentPack(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    pub fn missing_catalog(section: impl Into<String>) -> Self {
        EngineError::MissingCatalog {
            section: section.into(),
        }
    }

    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::MalformedCandidate {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable code, used in CLI error output.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::MissingCatalog { .. } => "MISSING_CATALOG",
            EngineError::MalformedCandidate { .. } => "MALFORMED_CANDIDATE",
            EngineError::ContentPack(_) => "CONTENT_PACK_ERROR",
            EngineError::Io(_) => "IO_ERROR",
            EngineError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_catalog_message_names_section() {
        let err = EngineError::missing_catalog("traits");
        assert_eq!(err.to_string(), "Missing catalog for section 'traits'");
        assert_eq!(err.code(), "MISSING_CATALOG");
    }

    #[test]
    fn test_io_error_converts_via_from() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: EngineError = io.into();
        assert_eq!(err.code(), "IO_ERROR");
    }

    #[test]
    fn test_content_pack_error_code() {
        let err = EngineError::ContentPack("report_cards_traits.json: EOF".to_string());
        assert_eq!(err.code(), "CONTENT_PACK_ERROR");
        assert!(err.to_string().contains("report_cards_traits.json"));
    }
}
