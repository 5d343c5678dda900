//! Tunnel configuration snapshots and the wg-quick text format.
//!
//! A [`ConfigSnapshot`] is an immutable value. It is parsed from and composed
//! to canonical wg-quick text; composing a parsed snapshot and parsing the
//! result again yields an equal value. Changes go through
//! [`ConfigSnapshot::to_editable`] and [`EditableConfig::commit`].

mod attribute;
mod editable;
mod error;
mod exclusions;
mod inet;
mod interface;
mod key;
mod peer;

use std::fmt;
use std::str::FromStr;

pub use attribute::AttributeKind;
pub use editable::{EditableConfig, EditableInterface, EditablePeer};
pub use error::{ConfigParseError, ParseReason, ParseResult, Section};
pub use exclusions::GlobalExclusions;
pub use inet::{InetEndpoint, InetNetwork, InetParseError};
pub use interface::{Interface, InterfaceBuilder};
pub use key::{KEY_LEN, Key, KeyError, KeyPair};
pub use peer::{Peer, PeerBuilder};

use attribute::Attribute;

/// Full configuration of one tunnel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSnapshot {
    interface: Interface,
    peers: Vec<Peer>,
}

enum Current {
    Nothing,
    Interface,
    Peer(PeerBuilder),
}

impl ConfigSnapshot {
    pub fn from_parts(interface: Interface, peers: Vec<Peer>) -> Self {
        ConfigSnapshot { interface, peers }
    }

    /// Parse wg-quick text without any global exclusions.
    pub fn parse(text: &str) -> ParseResult<Self> {
        Self::parse_with_exclusions(text, &GlobalExclusions::default())
    }

    /// Parse wg-quick text. Repeated `[Interface]` sections are combined and
    /// `#` starts a comment anywhere on a line.
    pub fn parse_with_exclusions(text: &str, exclusions: &GlobalExclusions) -> ParseResult<Self> {
        let mut interface = InterfaceBuilder::default();
        let mut peers: Vec<Peer> = Vec::new();
        let mut seen_interface = false;
        let mut current = Current::Nothing;

        for raw in text.lines() {
            let line = raw.split_once('#').map_or(raw, |(content, _)| content).trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('[') {
                if let Current::Peer(builder) = std::mem::replace(&mut current, Current::Nothing) {
                    push_peer(&mut peers, builder.build()?);
                }
                current = if line.eq_ignore_ascii_case("[Interface]") {
                    seen_interface = true;
                    Current::Interface
                } else if line.eq_ignore_ascii_case("[Peer]") {
                    Current::Peer(PeerBuilder::default())
                } else {
                    return Err(ConfigParseError::new(
                        Section::Config,
                        ParseReason::UnknownSection,
                        line,
                    ));
                };
                continue;
            }

            match &mut current {
                Current::Nothing => {
                    return Err(ConfigParseError::new(
                        Section::Config,
                        ParseReason::UnknownSection,
                        line,
                    ));
                }
                Current::Interface => {
                    let attr = Attribute::parse(Section::Interface, line)?;
                    interface.parse_attribute(&attr)?;
                }
                Current::Peer(builder) => {
                    let attr = Attribute::parse(Section::Peer, line)?;
                    builder.parse_attribute(&attr)?;
                }
            }
        }

        if let Current::Peer(builder) = current {
            push_peer(&mut peers, builder.build()?);
        }
        if !seen_interface {
            return Err(ConfigParseError::new(
                Section::Config,
                ParseReason::MissingSection,
                "",
            ));
        }

        Ok(ConfigSnapshot {
            interface: interface.build(exclusions),
            peers,
        })
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Compose canonical wg-quick text.
    pub fn to_wg_quick_string(&self) -> String {
        let mut out = String::from("[Interface]\n");
        out.push_str(&self.interface.to_wg_quick_string());
        for peer in &self.peers {
            out.push_str("\n[Peer]\n");
            out.push_str(&peer.to_wg_quick_string());
        }
        out
    }

    pub fn to_editable(&self) -> EditableConfig {
        EditableConfig::from(self)
    }
}

fn push_peer(peers: &mut Vec<Peer>, peer: Peer) {
    if !peers.contains(&peer) {
        peers.push(peer);
    }
}

impl FromStr for ConfigSnapshot {
    type Err = ConfigParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigSnapshot::parse(s)
    }
}

impl fmt::Display for ConfigSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wg_quick_string())
    }
}
