//! Mutable string form of a snapshot, for editors and JSON output.

use serde::{Deserialize, Serialize};

use super::attribute::{self, Attribute, AttributeKind};
use super::error::{ParseResult, Section};
use super::exclusions::GlobalExclusions;
use super::interface::{Interface, InterfaceBuilder};
use super::peer::{Peer, PeerBuilder};
use super::ConfigSnapshot;

/// Every field holds the text as it would appear after `=`. Empty means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditableInterface {
    pub addresses: String,
    pub dns_servers: String,
    pub excluded_applications: String,
    pub listen_port: String,
    pub mtu: String,
    pub private_key: String,
    /// Derived from `private_key`; ignored on commit.
    pub public_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditablePeer {
    pub public_key: String,
    pub preshared_key: String,
    pub allowed_ips: String,
    pub endpoint: String,
    pub persistent_keepalive: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditableConfig {
    pub interface: EditableInterface,
    pub peers: Vec<EditablePeer>,
}

fn unset_if_zero<T: PartialEq + Default + ToString>(value: T) -> String {
    if value == T::default() {
        String::new()
    } else {
        value.to_string()
    }
}

impl From<&Interface> for EditableInterface {
    fn from(interface: &Interface) -> Self {
        let (private_key, public_key) = match interface.key_pair() {
            Some(pair) => (
                pair.private_key().to_base64(),
                pair.public_key().to_base64(),
            ),
            None => (String::new(), String::new()),
        };
        EditableInterface {
            addresses: attribute::join(interface.addresses()),
            dns_servers: attribute::join(interface.dns_servers()),
            excluded_applications: attribute::join(interface.excluded_applications()),
            listen_port: unset_if_zero(interface.listen_port()),
            mtu: unset_if_zero(interface.mtu()),
            private_key,
            public_key,
        }
    }
}

impl From<&Peer> for EditablePeer {
    fn from(peer: &Peer) -> Self {
        EditablePeer {
            public_key: peer.public_key().to_base64(),
            preshared_key: peer
                .preshared_key()
                .map(|key| key.to_base64())
                .unwrap_or_default(),
            allowed_ips: attribute::join(peer.allowed_ips()),
            endpoint: peer
                .endpoint()
                .map(ToString::to_string)
                .unwrap_or_default(),
            persistent_keepalive: unset_if_zero(peer.persistent_keepalive()),
        }
    }
}

impl From<&ConfigSnapshot> for EditableConfig {
    fn from(snapshot: &ConfigSnapshot) -> Self {
        EditableConfig {
            interface: snapshot.interface().into(),
            peers: snapshot.peers().iter().map(EditablePeer::from).collect(),
        }
    }
}

/// Run `field` through the same line parser configuration text goes through.
fn apply_field<F>(section: Section, kind: AttributeKind, value: &str, mut apply: F) -> ParseResult<()>
where
    F: FnMut(&Attribute<'_>) -> ParseResult<()>,
{
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }
    let line = format!("{} = {}", kind.name(), value);
    let attr = Attribute::parse(section, &line)?;
    apply(&attr)
}

impl EditableInterface {
    fn commit(&self, exclusions: &GlobalExclusions) -> ParseResult<Interface> {
        let mut builder = InterfaceBuilder::default();
        let fields = [
            (AttributeKind::Address, &self.addresses),
            (AttributeKind::Dns, &self.dns_servers),
            (AttributeKind::ExcludedApplications, &self.excluded_applications),
            (AttributeKind::ListenPort, &self.listen_port),
            (AttributeKind::Mtu, &self.mtu),
            (AttributeKind::PrivateKey, &self.private_key),
        ];
        for (kind, value) in fields {
            apply_field(Section::Interface, kind, value, |attr| {
                builder.parse_attribute(attr)
            })?;
        }
        Ok(builder.build(exclusions))
    }
}

impl EditablePeer {
    fn commit(&self) -> ParseResult<Peer> {
        let mut builder = PeerBuilder::default();
        let fields = [
            (AttributeKind::PublicKey, &self.public_key),
            (AttributeKind::PresharedKey, &self.preshared_key),
            (AttributeKind::AllowedIps, &self.allowed_ips),
            (AttributeKind::Endpoint, &self.endpoint),
            (AttributeKind::PersistentKeepalive, &self.persistent_keepalive),
        ];
        for (kind, value) in fields {
            apply_field(Section::Peer, kind, value, |attr| builder.parse_attribute(attr))?;
        }
        builder.build()
    }
}

impl EditableConfig {
    /// Validate the edited fields and produce a new snapshot.
    pub fn commit(&self, exclusions: &GlobalExclusions) -> ParseResult<ConfigSnapshot> {
        let interface = self.interface.commit(exclusions)?;
        let mut peers: Vec<Peer> = Vec::with_capacity(self.peers.len());
        for editable in &self.peers {
            let peer = editable.commit()?;
            if !peers.contains(&peer) {
                peers.push(peer);
            }
        }
        Ok(ConfigSnapshot::from_parts(interface, peers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::error::ParseReason;

    const CONFIG: &str = "[Interface]\n\
        Address = 10.0.0.2/32\n\
        ListenPort = 51820\n\
        PrivateKey = yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=\n\
        \n\
        [Peer]\n\
        AllowedIPs = 0.0.0.0/0\n\
        Endpoint = vpn.example.com:51820\n\
        PublicKey = xTIBA5rboUvnH4htodjb6e697QjLERt1NAB4mZqp8Dg=\n";

    #[test]
    fn test_edit_and_commit() {
        let snapshot = ConfigSnapshot::parse(CONFIG).unwrap();
        let mut editable = snapshot.to_editable();
        assert_eq!(editable.interface.mtu, "");
        assert!(!editable.interface.public_key.is_empty());

        editable.interface.mtu = "1420".to_string();
        let updated = editable.commit(&GlobalExclusions::default()).unwrap();
        assert_eq!(updated.interface().mtu(), 1420);
        assert_eq!(updated.peers(), snapshot.peers());
        // The source snapshot is untouched.
        assert_eq!(snapshot.interface().mtu(), 0);
    }

    #[test]
    fn test_unchanged_commit_is_equal() {
        let snapshot = ConfigSnapshot::parse(CONFIG).unwrap();
        let committed = snapshot
            .to_editable()
            .commit(&GlobalExclusions::default())
            .unwrap();
        assert_eq!(committed, snapshot);
    }

    #[test]
    fn test_commit_reports_bad_field() {
        let mut editable = ConfigSnapshot::parse(CONFIG).unwrap().to_editable();
        editable.peers[0].endpoint = "no port".to_string();
        let err = editable.commit(&GlobalExclusions::default()).unwrap_err();
        assert_eq!(err.reason, ParseReason::InvalidValue(AttributeKind::Endpoint));
    }

    #[test]
    fn test_json_form() {
        let editable = ConfigSnapshot::parse(CONFIG).unwrap().to_editable();
        let json = serde_json::to_string(&editable).unwrap();
        let back: EditableConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, editable);
    }
}
