use std::net::IpAddr;

use proptest::option;
use proptest::prelude::*;
use tunnel_core::conf::{
    ConfigSnapshot, GlobalExclusions, InetEndpoint, InetNetwork, Interface, Key, Peer,
};

fn ip() -> impl Strategy<Value = IpAddr> {
    prop_oneof![
        any::<[u8; 4]>().prop_map(IpAddr::from),
        any::<[u16; 8]>().prop_map(IpAddr::from),
    ]
}

fn network() -> impl Strategy<Value = InetNetwork> {
    (ip(), 0u8..=128).prop_map(|(address, prefix_len)| InetNetwork::new(address, prefix_len))
}

fn key() -> impl Strategy<Value = Key> {
    any::<[u8; 32]>().prop_map(Key::from_bytes)
}

fn endpoint() -> impl Strategy<Value = InetEndpoint> {
    prop_oneof![
        ("[a-z]{1,10}(\\.[a-z]{2,5})?", any::<u16>())
            .prop_map(|(host, port)| InetEndpoint::new(host, port)),
        (ip(), any::<u16>()).prop_map(|(host, port)| InetEndpoint::new(host.to_string(), port)),
    ]
}

fn application() -> impl Strategy<Value = String> {
    "[a-z]{1,8}(\\.[a-z]{1,8}){0,2}"
}

fn peer() -> impl Strategy<Value = Peer> {
    (
        key(),
        option::of(key()),
        proptest::collection::vec(network(), 0..4),
        option::of(endpoint()),
        any::<u16>(),
    )
        .prop_map(|(public_key, preshared_key, allowed_ips, endpoint, keepalive)| {
            let mut builder = Peer::builder()
                .public_key(public_key)
                .persistent_keepalive(keepalive);
            if let Some(psk) = preshared_key {
                builder = builder.preshared_key(psk);
            }
            for network in allowed_ips {
                builder = builder.add_allowed_ip(network);
            }
            if let Some(endpoint) = endpoint {
                builder = builder.endpoint(endpoint);
            }
            builder.build().unwrap()
        })
}

fn interface(globals: GlobalExclusions) -> impl Strategy<Value = Interface> {
    (
        proptest::collection::vec(network(), 0..4),
        proptest::collection::vec(ip(), 0..3),
        proptest::collection::vec(application(), 0..3),
        any::<u16>(),
        any::<u32>(),
        option::of(key()),
    )
        .prop_map(move |(addresses, dns, applications, port, mtu, private_key)| {
            let mut builder = Interface::builder().listen_port(port).mtu(mtu);
            for address in addresses {
                builder = builder.add_address(address);
            }
            for server in dns {
                builder = builder.add_dns_server(server);
            }
            for application in applications {
                builder = builder.exclude_application(application);
            }
            if let Some(key) = private_key {
                builder = builder.private_key(key);
            }
            builder.build(&globals)
        })
}

fn snapshot() -> impl Strategy<Value = (GlobalExclusions, ConfigSnapshot)> {
    proptest::collection::vec(application(), 0..3)
        .prop_map(GlobalExclusions::new)
        .prop_flat_map(|globals| {
            let parts = (
                interface(globals.clone()),
                proptest::collection::vec(peer(), 0..3),
            );
            (Just(globals), parts)
        })
        .prop_map(|(globals, (interface, peers))| {
            let mut unique: Vec<Peer> = Vec::new();
            for peer in peers {
                if !unique.contains(&peer) {
                    unique.push(peer);
                }
            }
            (globals, ConfigSnapshot::from_parts(interface, unique))
        })
}

proptest! {
    #[test]
    fn compose_then_parse_is_identity((globals, config) in snapshot()) {
        let text = config.to_wg_quick_string();
        let parsed = ConfigSnapshot::parse_with_exclusions(&text, &globals).unwrap();
        prop_assert_eq!(&parsed, &config);
        prop_assert_eq!(parsed.to_wg_quick_string(), text);
    }
}
