use tempfile::tempdir;
use tunnel_core::conf::{ConfigSnapshot, GlobalExclusions, ParseReason};
use tunnel_core::tunnel::{ConfigStore, FileConfigStore, StoreError};

const PRIVATE: &str = "yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=";
const PEER: &str = "xTIBA5rboUvnH4htodjb6e697QjLERt1NAB4mZqp8Dg=";
const PRESHARED: &str = "TrMvSoP4jYQlY6RIzBgbssQqY3vxI2Pi+y71lOWWXX0=";

fn full_config() -> String {
    format!(
        "[Interface]\n\
         PrivateKey = {PRIVATE}\n\
         Address = 10.0.0.2/32, fd00::2/128, 10.0.0.2/32\n\
         DNS = 1.1.1.1, 2606:4700:4700::1111\n\
         ExcludedApplications = org.example.bank, org.example.bank\n\
         ListenPort = 51820\n\
         MTU = 1420\n\
         \n\
         [Peer]\n\
         PublicKey = {PEER}\n\
         PresharedKey = {PRESHARED}\n\
         AllowedIPs = 0.0.0.0/0, ::/0\n\
         Endpoint = [2001:db8::1]:51820\n\
         PersistentKeepalive = 25\n"
    )
}

#[test]
fn test_text_round_trip_is_idempotent() {
    let first = ConfigSnapshot::parse(&full_config()).unwrap();
    let text = first.to_wg_quick_string();
    let second = ConfigSnapshot::parse(&text).unwrap();

    assert_eq!(first, second);
    assert_eq!(second.to_wg_quick_string(), text);

    let interface = first.interface();
    assert_eq!(interface.addresses().len(), 2);
    assert_eq!(interface.dns_servers().len(), 2);
    assert_eq!(interface.excluded_applications(), ["org.example.bank"]);
    assert_eq!(interface.listen_port(), 51820);
    assert_eq!(interface.mtu(), 1420);
    assert_eq!(
        interface.key_pair().unwrap().private_key().to_base64(),
        PRIVATE
    );

    let peer = &first.peers()[0];
    assert_eq!(peer.public_key().to_base64(), PEER);
    assert_eq!(peer.preshared_key().unwrap().to_base64(), PRESHARED);
    assert_eq!(peer.allowed_ips().len(), 2);
    assert_eq!(peer.endpoint().unwrap().to_string(), "[2001:db8::1]:51820");
    assert_eq!(peer.persistent_keepalive(), 25);
}

#[test]
fn test_global_exclusions_are_seeded() {
    let exclusions = GlobalExclusions::new(["org.example.tv", "org.example.bank"]);
    let snapshot = ConfigSnapshot::parse_with_exclusions(&full_config(), &exclusions).unwrap();

    assert_eq!(
        snapshot.interface().excluded_applications(),
        ["org.example.bank", "org.example.tv"]
    );

    // Re-parsing with the same exclusions changes nothing.
    let again =
        ConfigSnapshot::parse_with_exclusions(&snapshot.to_wg_quick_string(), &exclusions).unwrap();
    assert_eq!(again, snapshot);
}

#[test]
fn test_peer_requires_public_key() {
    let err = ConfigSnapshot::parse("[Interface]\n[Peer]\nAllowedIPs = 0.0.0.0/0\n").unwrap_err();
    assert!(matches!(err.reason, ParseReason::MissingAttribute(_)));
}

#[test]
fn test_empty_list_entry_is_rejected() {
    let err = ConfigSnapshot::parse("[Interface]\nAddress = 10.0.0.2/32,,10.0.0.3/32\n").unwrap_err();
    assert_eq!(err.line, "Address = 10.0.0.2/32,,10.0.0.3/32");
}

#[test]
fn test_file_store_round_trip() {
    let dir = tempdir().unwrap();
    let exclusions = GlobalExclusions::new(["org.example.tv"]);
    let store = FileConfigStore::new(dir.path().join("tunnels"), exclusions.clone());

    let snapshot = ConfigSnapshot::parse(&full_config()).unwrap();
    store.create("home", &snapshot).unwrap();
    assert!(matches!(
        store.create("home", &snapshot),
        Err(StoreError::AlreadyExists(_))
    ));

    let loaded = store.load("home").unwrap();
    assert_eq!(
        loaded,
        ConfigSnapshot::parse_with_exclusions(&full_config(), &exclusions).unwrap()
    );
    assert_eq!(
        store.enumerate().unwrap().into_iter().collect::<Vec<_>>(),
        vec!["home"]
    );

    store.rename("home", "office").unwrap();
    assert!(matches!(store.load("home"), Err(StoreError::NotFound(_))));
    store.delete("office").unwrap();
    assert!(store.enumerate().unwrap().is_empty());
}

#[test]
fn test_editable_json_commit() {
    let snapshot = ConfigSnapshot::parse(&full_config()).unwrap();
    let json = serde_json::to_string_pretty(&snapshot.to_editable()).unwrap();

    let mut editable: tunnel_core::EditableConfig = serde_json::from_str(&json).unwrap();
    editable.peers[0].persistent_keepalive = String::new();
    editable.interface.dns_servers = "9.9.9.9".to_string();

    let committed = editable.commit(&GlobalExclusions::default()).unwrap();
    assert_eq!(committed.peers()[0].persistent_keepalive(), 0);
    assert_eq!(committed.interface().dns_servers().len(), 1);
    assert_eq!(committed.interface().addresses(), snapshot.interface().addresses());
}
