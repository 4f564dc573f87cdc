//! Self-connect policy (spec §4.8, §8 scenario 4) driven through
//! `Client::connect`, with real ownership resolved from the registry and
//! the remote-port mirror rather than assumed.

use pipewire_jack_shim::client::Client;
use pipewire_jack_shim::config::Config;
use pipewire_jack_shim::connect::SelfConnectMode;
use pipewire_jack_shim::port::{Port, PortFlags, PortType};
use pipewire_jack_shim::pwcore::FakeCore;

fn client_with(mode: SelfConnectMode) -> Client {
    let mut config = Config::default();
    config.self_connect_mode = mode;
    Client::new(Box::new(FakeCore::new()), config, "policy").unwrap()
}

#[test]
fn ignore_external_silently_drops_an_ours_to_remote_connection() {
    let mut client = client_with(SelfConnectMode::IgnoreExternal);
    let src = client
        .register_port("src", PortFlags::OUTPUT, PortType::Audio, 64)
        .unwrap();
    let dst = 9100;
    client.mirror_remote_port(
        dst,
        Port::new("other:dst".into(), 42, PortFlags::INPUT, PortType::Audio, 64),
    );

    assert!(client.connect(src, dst).is_ok());
    // Silently dropped: no link actually exists to tear down.
    assert!(client.disconnect(src, dst).is_err());
}

#[test]
fn ignore_external_still_creates_a_fully_remote_link() {
    let mut client = client_with(SelfConnectMode::IgnoreExternal);
    let src = 9200;
    let dst = 9201;
    client.mirror_remote_port(
        src,
        Port::new("other:src".into(), 42, PortFlags::OUTPUT, PortType::Audio, 64),
    );
    client.mirror_remote_port(
        dst,
        Port::new("other:dst".into(), 43, PortFlags::INPUT, PortType::Audio, 64),
    );

    assert!(client.connect(src, dst).is_ok());
    assert!(client.disconnect(src, dst).is_ok());
}
