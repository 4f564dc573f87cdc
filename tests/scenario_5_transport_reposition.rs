//! Transport reposition (spec §8 scenario 5): becoming timebase owner when
//! nobody else holds it, then publishing a reposition request.

use pipewire_jack_shim::client::Client;
use pipewire_jack_shim::config::Config;
use pipewire_jack_shim::pwcore::FakeCore;
use pipewire_jack_shim::transport::install_timeowner;
use std::sync::atomic::Ordering;

#[test]
fn reposition_after_conditionally_becoming_timebase_owner() {
    let client = Client::new(Box::new(FakeCore::new()), Config::default(), "timebase").unwrap();

    assert!(install_timeowner(&client.activation.segment_owner, client.node_id(), true));
    assert!(client.is_timebase_owner());

    client.request_reposition(48000);

    assert_eq!(
        client.activation.reposition_position.load(Ordering::Acquire),
        48000
    );
    assert_eq!(
        client.activation.reposition_owner.load(Ordering::Acquire),
        client.node_id()
    );
}

#[test]
fn conditional_install_fails_once_someone_else_owns_it() {
    let client = Client::new(Box::new(FakeCore::new()), Config::default(), "timebase").unwrap();
    client.activation.segment_owner.store(999, Ordering::Release);

    assert!(!install_timeowner(&client.activation.segment_owner, client.node_id(), true));
    assert!(!client.is_timebase_owner());
}
