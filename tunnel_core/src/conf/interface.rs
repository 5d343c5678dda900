//! The `[Interface]` section.

use std::net::IpAddr;

use super::attribute::{self, Attribute, AttributeKind};
use super::error::{ConfigParseError, ParseReason, ParseResult, Section};
use super::exclusions::GlobalExclusions;
use super::inet::InetNetwork;
use super::key::{Key, KeyPair};

/// Local side of a tunnel: addresses, resolvers, exclusions, port, MTU and keys.
///
/// A listen port or MTU of 0 means the value is unset and is left out of the
/// composed text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interface {
    addresses: Vec<InetNetwork>,
    dns_servers: Vec<IpAddr>,
    excluded_applications: Vec<String>,
    listen_port: u16,
    mtu: u32,
    key_pair: Option<KeyPair>,
}

impl Interface {
    pub fn builder() -> InterfaceBuilder {
        InterfaceBuilder::default()
    }

    pub fn addresses(&self) -> &[InetNetwork] {
        &self.addresses
    }

    pub fn dns_servers(&self) -> &[IpAddr] {
        &self.dns_servers
    }

    pub fn excluded_applications(&self) -> &[String] {
        &self.excluded_applications
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    pub fn mtu(&self) -> u32 {
        self.mtu
    }

    pub fn key_pair(&self) -> Option<&KeyPair> {
        self.key_pair.as_ref()
    }

    /// Compose the section body as `Key = Value` lines.
    pub fn to_wg_quick_string(&self) -> String {
        let mut out = String::new();
        if !self.addresses.is_empty() {
            out.push_str(&AttributeKind::Address.compose(attribute::join(&self.addresses)));
        }
        if !self.dns_servers.is_empty() {
            out.push_str(&AttributeKind::Dns.compose(attribute::join(&self.dns_servers)));
        }
        if !self.excluded_applications.is_empty() {
            out.push_str(
                &AttributeKind::ExcludedApplications
                    .compose(attribute::join(&self.excluded_applications)),
            );
        }
        if self.listen_port != 0 {
            out.push_str(&AttributeKind::ListenPort.compose(self.listen_port));
        }
        if self.mtu != 0 {
            out.push_str(&AttributeKind::Mtu.compose(self.mtu));
        }
        if let Some(key_pair) = &self.key_pair {
            out.push_str(&AttributeKind::PrivateKey.compose(key_pair.private_key().to_base64()));
        }
        out
    }
}

/// Accumulates interface attributes. List entries seen twice are kept once.
#[derive(Debug, Clone, Default)]
pub struct InterfaceBuilder {
    addresses: Vec<InetNetwork>,
    dns_servers: Vec<IpAddr>,
    excluded_applications: Vec<String>,
    listen_port: u16,
    mtu: u32,
    key_pair: Option<KeyPair>,
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, value: T) {
    if !list.contains(&value) {
        list.push(value);
    }
}

impl InterfaceBuilder {
    pub fn add_address(mut self, address: InetNetwork) -> Self {
        push_unique(&mut self.addresses, address);
        self
    }

    pub fn add_dns_server(mut self, server: IpAddr) -> Self {
        push_unique(&mut self.dns_servers, server);
        self
    }

    pub fn exclude_application(mut self, application: impl Into<String>) -> Self {
        push_unique(&mut self.excluded_applications, application.into());
        self
    }

    pub fn listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    pub fn mtu(mut self, mtu: u32) -> Self {
        self.mtu = mtu;
        self
    }

    pub fn private_key(mut self, key: Key) -> Self {
        self.key_pair = Some(KeyPair::from_private_key(key));
        self
    }

    /// Apply one parsed attribute.
    pub fn parse_attribute(&mut self, attr: &Attribute<'_>) -> ParseResult<()> {
        match attr.kind {
            AttributeKind::Address => {
                for entry in attr.split()? {
                    let address = entry.parse().map_err(|_| attr.invalid())?;
                    push_unique(&mut self.addresses, address);
                }
            }
            AttributeKind::Dns => {
                for entry in attr.split()? {
                    let server = entry.parse().map_err(|_| attr.invalid())?;
                    push_unique(&mut self.dns_servers, server);
                }
            }
            AttributeKind::ExcludedApplications => {
                for entry in attr.split()? {
                    push_unique(&mut self.excluded_applications, entry.to_string());
                }
            }
            AttributeKind::ListenPort => {
                self.listen_port = attr.value.parse().map_err(|_| attr.invalid())?;
            }
            AttributeKind::Mtu => {
                self.mtu = attr.value.parse().map_err(|_| attr.invalid())?;
            }
            AttributeKind::PrivateKey => {
                let key = Key::from_base64(attr.value).map_err(|_| attr.invalid())?;
                self.key_pair = Some(KeyPair::from_private_key(key));
            }
            AttributeKind::PublicKey
            | AttributeKind::PresharedKey
            | AttributeKind::AllowedIps
            | AttributeKind::Endpoint
            | AttributeKind::PersistentKeepalive => {
                return Err(ConfigParseError::new(
                    Section::Interface,
                    ParseReason::UnknownAttribute,
                    attr.line,
                ));
            }
        }
        Ok(())
    }

    /// Finish the interface, appending global exclusions it does not list yet.
    pub fn build(mut self, exclusions: &GlobalExclusions) -> Interface {
        exclusions.merge_into(&mut self.excluded_applications);
        Interface {
            addresses: self.addresses,
            dns_servers: self.dns_servers,
            excluded_applications: self.excluded_applications,
            listen_port: self.listen_port,
            mtu: self.mtu,
            key_pair: self.key_pair,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(lines: &[&str], exclusions: &GlobalExclusions) -> ParseResult<Interface> {
        let mut builder = Interface::builder();
        for line in lines {
            let attr = Attribute::parse(Section::Interface, line)?;
            builder.parse_attribute(&attr)?;
        }
        Ok(builder.build(exclusions))
    }

    #[test]
    fn test_compose_order_and_unset_values() {
        let iface = parse(
            &[
                "PrivateKey = yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=",
                "MTU = 0",
                "DNS = 1.1.1.1",
                "Address = 10.0.0.2/32, fd00::2/128",
            ],
            &GlobalExclusions::default(),
        )
        .unwrap();

        assert_eq!(
            iface.to_wg_quick_string(),
            "Address = 10.0.0.2/32, fd00::2/128\n\
             DNS = 1.1.1.1\n\
             PrivateKey = yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=\n"
        );
    }

    #[test]
    fn test_duplicates_collapse() {
        let iface = parse(
            &["Address = 10.0.0.2/32", "Address = 10.0.0.2/32, 10.0.0.3/32"],
            &GlobalExclusions::default(),
        )
        .unwrap();
        assert_eq!(iface.addresses().len(), 2);
    }

    #[test]
    fn test_global_exclusions_are_appended() {
        let globals = GlobalExclusions::new(["com.global"]);
        let iface = parse(&["ExcludedApplications = com.local, com.global"], &globals).unwrap();
        assert_eq!(iface.excluded_applications(), ["com.local", "com.global"]);

        let iface = parse(&[], &globals).unwrap();
        assert_eq!(iface.excluded_applications(), ["com.global"]);
    }

    #[test]
    fn test_invalid_values() {
        let globals = GlobalExclusions::default();
        let err = parse(&["ListenPort = 70000"], &globals).unwrap_err();
        assert_eq!(err.reason, ParseReason::InvalidValue(AttributeKind::ListenPort));

        let err = parse(&["DNS = dns.example.com"], &globals).unwrap_err();
        assert_eq!(err.reason, ParseReason::InvalidValue(AttributeKind::Dns));

        let err = parse(&["PrivateKey = abc"], &globals).unwrap_err();
        assert_eq!(err.reason, ParseReason::InvalidValue(AttributeKind::PrivateKey));
    }

    #[test]
    fn test_builder() {
        let iface = Interface::builder()
            .add_address("10.1.0.1/24".parse().unwrap())
            .listen_port(51820)
            .mtu(1420)
            .build(&GlobalExclusions::default());
        assert_eq!(
            iface.to_wg_quick_string(),
            "Address = 10.1.0.1/24\nListenPort = 51820\nMTU = 1420\n"
        );
        assert!(iface.key_pair().is_none());
    }
}
