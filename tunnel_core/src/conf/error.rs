//! Error types for the wg-quick configuration grammar.

use std::fmt;

use thiserror::Error;

use super::attribute::AttributeKind;

/// Configuration section an error was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Outside of any section
    Config,
    /// An `[Interface]` section
    Interface,
    /// A `[Peer]` section
    Peer,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Config => f.write_str("top level"),
            Section::Interface => f.write_str("[Interface]"),
            Section::Peer => f.write_str("[Peer]"),
        }
    }
}

/// Why a line was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseReason {
    #[error("syntax error")]
    SyntaxError,

    #[error("unknown section")]
    UnknownSection,

    #[error("missing [Interface] section")]
    MissingSection,

    #[error("unknown attribute")]
    UnknownAttribute,

    #[error("missing {0} attribute")]
    MissingAttribute(AttributeKind),

    #[error("invalid value for {0}")]
    InvalidValue(AttributeKind),

    #[error("empty list entry for {0}")]
    EmptyEntry(AttributeKind),
}

/// Malformed configuration text. Carries the offending line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} in {section}: {line:?}")]
pub struct ConfigParseError {
    pub section: Section,
    pub reason: ParseReason,
    pub line: String,
}

impl ConfigParseError {
    pub fn new(section: Section, reason: ParseReason, line: impl Into<String>) -> Self {
        ConfigParseError {
            section,
            reason,
            line: line.into(),
        }
    }
}

/// Result type for configuration parsing.
pub type ParseResult<T> = Result<T, ConfigParseError>;
