//! Port aliasing (spec §8 scenario 3) through `Client`, not `Port` alone.

use pipewire_jack_shim::client::Client;
use pipewire_jack_shim::config::Config;
use pipewire_jack_shim::port::{PortFlags, PortType};
use pipewire_jack_shim::pwcore::FakeCore;

#[test]
fn two_aliases_fill_then_a_third_is_rejected() {
    let mut client = Client::new(Box::new(FakeCore::new()), Config::default(), "aliaser").unwrap();
    let port = client
        .register_port("p", PortFlags::OUTPUT, PortType::Audio, 64)
        .unwrap();

    client.set_port_alias(port, "a1").unwrap();
    client.set_port_alias(port, "a2").unwrap();

    let aliases = client.port_aliases(port).unwrap();
    assert_eq!(aliases.len(), 2);
    assert_eq!(aliases[0], "a1");
    assert_eq!(aliases[1], "a2");

    assert!(client.set_port_alias(port, "a3").is_err());
}
