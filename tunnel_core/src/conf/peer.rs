//! The `[Peer]` section.

use super::attribute::{self, Attribute, AttributeKind};
use super::error::{ConfigParseError, ParseReason, ParseResult, Section};
use super::inet::{InetEndpoint, InetNetwork};
use super::key::Key;

/// Remote side of a tunnel. Every peer has a public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    public_key: Key,
    preshared_key: Option<Key>,
    allowed_ips: Vec<InetNetwork>,
    endpoint: Option<InetEndpoint>,
    persistent_keepalive: u16,
}

impl Peer {
    pub fn builder() -> PeerBuilder {
        PeerBuilder::default()
    }

    pub fn public_key(&self) -> &Key {
        &self.public_key
    }

    pub fn preshared_key(&self) -> Option<&Key> {
        self.preshared_key.as_ref()
    }

    pub fn allowed_ips(&self) -> &[InetNetwork] {
        &self.allowed_ips
    }

    pub fn endpoint(&self) -> Option<&InetEndpoint> {
        self.endpoint.as_ref()
    }

    /// Keepalive interval in seconds, 0 when disabled.
    pub fn persistent_keepalive(&self) -> u16 {
        self.persistent_keepalive
    }

    pub fn to_wg_quick_string(&self) -> String {
        let mut out = String::new();
        if !self.allowed_ips.is_empty() {
            out.push_str(&AttributeKind::AllowedIps.compose(attribute::join(&self.allowed_ips)));
        }
        if let Some(endpoint) = &self.endpoint {
            out.push_str(&AttributeKind::Endpoint.compose(endpoint));
        }
        if self.persistent_keepalive != 0 {
            out.push_str(&AttributeKind::PersistentKeepalive.compose(self.persistent_keepalive));
        }
        if let Some(psk) = &self.preshared_key {
            out.push_str(&AttributeKind::PresharedKey.compose(psk.to_base64()));
        }
        out.push_str(&AttributeKind::PublicKey.compose(self.public_key.to_base64()));
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct PeerBuilder {
    public_key: Option<Key>,
    preshared_key: Option<Key>,
    allowed_ips: Vec<InetNetwork>,
    endpoint: Option<InetEndpoint>,
    persistent_keepalive: u16,
}

impl PeerBuilder {
    pub fn public_key(mut self, key: Key) -> Self {
        self.public_key = Some(key);
        self
    }

    pub fn preshared_key(mut self, key: Key) -> Self {
        self.preshared_key = Some(key);
        self
    }

    pub fn add_allowed_ip(mut self, network: InetNetwork) -> Self {
        if !self.allowed_ips.contains(&network) {
            self.allowed_ips.push(network);
        }
        self
    }

    pub fn endpoint(mut self, endpoint: InetEndpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn persistent_keepalive(mut self, seconds: u16) -> Self {
        self.persistent_keepalive = seconds;
        self
    }

    pub fn parse_attribute(&mut self, attr: &Attribute<'_>) -> ParseResult<()> {
        match attr.kind {
            AttributeKind::PublicKey => {
                self.public_key = Some(attr.value.parse().map_err(|_| attr.invalid())?);
            }
            AttributeKind::PresharedKey => {
                self.preshared_key = Some(attr.value.parse().map_err(|_| attr.invalid())?);
            }
            AttributeKind::AllowedIps => {
                for entry in attr.split()? {
                    let network: InetNetwork = entry.parse().map_err(|_| attr.invalid())?;
                    if !self.allowed_ips.contains(&network) {
                        self.allowed_ips.push(network);
                    }
                }
            }
            AttributeKind::Endpoint => {
                self.endpoint = Some(attr.value.parse().map_err(|_| attr.invalid())?);
            }
            AttributeKind::PersistentKeepalive => {
                self.persistent_keepalive = attr.value.parse().map_err(|_| attr.invalid())?;
            }
            AttributeKind::Address
            | AttributeKind::Dns
            | AttributeKind::ExcludedApplications
            | AttributeKind::ListenPort
            | AttributeKind::Mtu
            | AttributeKind::PrivateKey => {
                return Err(ConfigParseError::new(
                    Section::Peer,
                    ParseReason::UnknownAttribute,
                    attr.line,
                ));
            }
        }
        Ok(())
    }

    pub fn build(self) -> ParseResult<Peer> {
        let public_key = self.public_key.ok_or_else(|| {
            ConfigParseError::new(
                Section::Peer,
                ParseReason::MissingAttribute(AttributeKind::PublicKey),
                "[Peer]",
            )
        })?;
        Ok(Peer {
            public_key,
            preshared_key: self.preshared_key,
            allowed_ips: self.allowed_ips,
            endpoint: self.endpoint,
            persistent_keepalive: self.persistent_keepalive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLIC: &str = "HIgo9xNzJMWLKASShiTqIybxZ0U3wGLiUeJ1PKf8ykw=";

    fn parse(lines: &[&str]) -> ParseResult<Peer> {
        let mut builder = Peer::builder();
        for line in lines {
            builder.parse_attribute(&Attribute::parse(Section::Peer, line)?)?;
        }
        builder.build()
    }

    #[test]
    fn test_compose_order() {
        let key_line = format!("PublicKey = {PUBLIC}");
        let peer = parse(&[
            key_line.as_str(),
            "PersistentKeepalive = 25",
            "Endpoint = [2001:db8::1]:51820",
            "AllowedIPs = 0.0.0.0/0, ::/0",
        ])
        .unwrap();

        assert_eq!(
            peer.to_wg_quick_string(),
            format!(
                "AllowedIPs = 0.0.0.0/0, ::/0\n\
                 Endpoint = [2001:db8::1]:51820\n\
                 PersistentKeepalive = 25\n\
                 PublicKey = {PUBLIC}\n"
            )
        );
    }

    #[test]
    fn test_missing_public_key() {
        let err = parse(&["AllowedIPs = 0.0.0.0/0"]).unwrap_err();
        assert_eq!(
            err.reason,
            ParseReason::MissingAttribute(AttributeKind::PublicKey)
        );
        assert_eq!(err.line, "[Peer]");
    }

    #[test]
    fn test_invalid_endpoint() {
        let key_line = format!("PublicKey = {PUBLIC}");
        let err = parse(&[key_line.as_str(), "Endpoint = nowhere"]).unwrap_err();
        assert_eq!(err.reason, ParseReason::InvalidValue(AttributeKind::Endpoint));
        assert_eq!(err.line, "Endpoint = nowhere");
    }
}
