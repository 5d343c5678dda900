//! `Key = Value` lines and the closed set of recognised attribute keys.

use std::fmt;

use super::error::{ConfigParseError, ParseReason, ParseResult, Section};

/// Every attribute the grammar understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Address,
    Dns,
    ExcludedApplications,
    ListenPort,
    Mtu,
    PrivateKey,
    PublicKey,
    PresharedKey,
    AllowedIps,
    Endpoint,
    PersistentKeepalive,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 11] = [
        AttributeKind::Address,
        AttributeKind::Dns,
        AttributeKind::ExcludedApplications,
        AttributeKind::ListenPort,
        AttributeKind::Mtu,
        AttributeKind::PrivateKey,
        AttributeKind::PublicKey,
        AttributeKind::PresharedKey,
        AttributeKind::AllowedIps,
        AttributeKind::Endpoint,
        AttributeKind::PersistentKeepalive,
    ];

    /// Canonical spelling used when composing configuration text.
    pub const fn name(self) -> &'static str {
        match self {
            AttributeKind::Address => "Address",
            AttributeKind::Dns => "DNS",
            AttributeKind::ExcludedApplications => "ExcludedApplications",
            AttributeKind::ListenPort => "ListenPort",
            AttributeKind::Mtu => "MTU",
            AttributeKind::PrivateKey => "PrivateKey",
            AttributeKind::PublicKey => "PublicKey",
            AttributeKind::PresharedKey => "PresharedKey",
            AttributeKind::AllowedIps => "AllowedIPs",
            AttributeKind::Endpoint => "Endpoint",
            AttributeKind::PersistentKeepalive => "PersistentKeepalive",
        }
    }

    /// Section the attribute belongs to.
    pub const fn section(self) -> Section {
        match self {
            AttributeKind::Address
            | AttributeKind::Dns
            | AttributeKind::ExcludedApplications
            | AttributeKind::ListenPort
            | AttributeKind::Mtu
            | AttributeKind::PrivateKey => Section::Interface,
            AttributeKind::PublicKey
            | AttributeKind::PresharedKey
            | AttributeKind::AllowedIps
            | AttributeKind::Endpoint
            | AttributeKind::PersistentKeepalive => Section::Peer,
        }
    }

    /// Case-insensitive lookup of a key as written in a configuration file.
    pub fn lookup(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(key))
    }

    /// Compose a single `Key = Value` line.
    pub fn compose(self, value: impl fmt::Display) -> String {
        format!("{} = {}\n", self.name(), value)
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single parsed `Key = Value` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub kind: AttributeKind,
    pub value: &'a str,
    /// The full line the attribute was read from
    pub line: &'a str,
}

impl<'a> Attribute<'a> {
    /// Parse a comment-free, trimmed line inside `section`.
    ///
    /// The key must be a word and the value non-empty; keys that are not
    /// recognised for `section` are rejected.
    pub fn parse(section: Section, line: &'a str) -> ParseResult<Self> {
        let syntax_error = || ConfigParseError::new(section, ParseReason::SyntaxError, line);
        let (key, value) = line.split_once('=').ok_or_else(syntax_error)?;
        let key = key.trim();
        let value = value.trim();
        if key.is_empty()
            || value.is_empty()
            || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(syntax_error());
        }

        match AttributeKind::lookup(key) {
            Some(kind) if kind.section() == section => Ok(Attribute { kind, value, line }),
            _ => Err(ConfigParseError::new(
                section,
                ParseReason::UnknownAttribute,
                line,
            )),
        }
    }

    /// Split a comma-separated value. Empty entries are rejected.
    pub fn split(&self) -> ParseResult<Vec<&'a str>> {
        let kind = self.kind;
        let line = self.line;
        self.value
            .split(',')
            .map(str::trim)
            .map(|entry| {
                if entry.is_empty() {
                    Err(ConfigParseError::new(
                        kind.section(),
                        ParseReason::EmptyEntry(kind),
                        line,
                    ))
                } else {
                    Ok(entry)
                }
            })
            .collect()
    }

    /// Error for a value that failed to parse.
    pub fn invalid(&self) -> ConfigParseError {
        ConfigParseError::new(
            self.kind.section(),
            ParseReason::InvalidValue(self.kind),
            self.line,
        )
    }
}

/// Join list values the way they are written in configuration files.
pub fn join<I, T>(values: I) -> String
where
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    values
        .into_iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
