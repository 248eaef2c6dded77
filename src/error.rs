use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::LevelKind;

/// Fatal error for one document. The caller gets either a complete tree or one
/// of these, never a partial tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{document}: malformed XML at byte {offset}: {message}")]
    Xml {
        document: String,
        offset: u64,
        message: String,
    },
    #[error("{document}: invalid encoding at byte {offset}: {message}")]
    Encoding {
        document: String,
        offset: u64,
        message: String,
    },
    #[error("{document}: element <{element}> opened at byte {offset} is never closed")]
    Unterminated {
        document: String,
        element: String,
        offset: u64,
    },
    #[error("{document}: unexpected closing tag </{element}> at byte {offset}")]
    UnexpectedEnd {
        document: String,
        element: String,
        offset: u64,
    },
}

impl ParseError {
    pub fn document(&self) -> &str {
        match self {
            ParseError::Xml { document, .. }
            | ParseError::Encoding { document, .. }
            | ParseError::Unterminated { document, .. }
            | ParseError::UnexpectedEnd { document, .. } => document,
        }
    }

    pub fn offset(&self) -> u64 {
        match self {
            ParseError::Xml { offset, .. }
            | ParseError::Encoding { offset, .. }
            | ParseError::Unterminated { offset, .. }
            | ParseError::UnexpectedEnd { offset, .. } => *offset,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("invalid chunking configuration: {0}")]
    InvalidConfig(String),
    #[error("{kind} {designator:?} has no canonical id; assign ids before chunking")]
    MissingCanonicalId { kind: LevelKind, designator: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Unknown element skipped; its text is carried in `excluded_text`.
    UnrecognizedElement,
    /// Known non-legislative content (table of contents) skipped.
    ExcludedContent,
    /// Unknown level-like element kept as `LevelKind::Other`.
    AnomalousLevel,
    DuplicateDesignator,
    MissingDesignator,
    AmbiguousCitation,
    ForcedSplit,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::UnrecognizedElement => "unrecognized_element",
            WarningKind::ExcludedContent => "excluded_content",
            WarningKind::AnomalousLevel => "anomalous_level",
            WarningKind::DuplicateDesignator => "duplicate_designator",
            WarningKind::MissingDesignator => "missing_designator",
            WarningKind::AmbiguousCitation => "ambiguous_citation",
            WarningKind::ForcedSplit => "forced_split",
        }
    }
}

/// Non-fatal diagnostic returned alongside a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub kind: WarningKind,
    pub message: String,
    /// Level the warning belongs to, once ids are assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// Text content that was not placed in any level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_text: Option<String>,
    /// Pre-order ordinal of the owning level, resolved to `canonical_id` after the id pass.
    #[serde(skip)]
    pub(crate) owner: Option<usize>,
}

impl ParseWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            canonical_id: None,
            offset: None,
            excluded_text: None,
            owner: None,
        }
    }

    pub fn at_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn for_level(mut self, canonical_id: impl Into<String>) -> Self {
        self.canonical_id = Some(canonical_id.into());
        self
    }

    pub fn with_excluded_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.is_empty() {
            self.excluded_text = Some(text);
        }
        self
    }

    pub(crate) fn owned_by(mut self, ordinal: usize) -> Self {
        self.owner = Some(ordinal);
        self
    }
}
