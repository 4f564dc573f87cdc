/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! The boundary to the PipeWire client-node protocol (spec §1: "treat the
//! PipeWire core and client-node proxies as an external collaborator").
//! `PwCore` is the seam the rest of this crate calls through; production
//! code is backed by the real `pw_core`/`pw_client_node` bridge (outside
//! this crate's scope), tests are backed by [`FakeCore`].

use crate::error::ShimResult;
use crate::format::FormatParam;
use std::collections::HashMap;

/// A proxy id as handed out by the PipeWire core.
pub type ProxyId = u32;

pub trait PwCore: Send + Sync {
    /// Register a node proxy (one per JACK client) and return its id.
    fn create_node(&mut self, name: &str, props: &HashMap<String, String>) -> ShimResult<ProxyId>;

    fn destroy_node(&mut self, id: ProxyId) -> ShimResult<()>;

    /// Register a port proxy under an existing node.
    fn create_port(
        &mut self,
        node: ProxyId,
        name: &str,
        format: FormatParam,
        is_input: bool,
    ) -> ShimResult<ProxyId>;

    fn destroy_port(&mut self, id: ProxyId) -> ShimResult<()>;

    fn link_ports(&mut self, src: ProxyId, dst: ProxyId) -> ShimResult<ProxyId>;

    fn unlink(&mut self, link: ProxyId) -> ShimResult<()>;

    /// Pump the PipeWire main loop once; production implementations block
    /// on the underlying epoll fd, `FakeCore` is a no-op.
    fn roundtrip(&mut self) -> ShimResult<()>;
}

/// An in-memory [`PwCore`] double (SPEC_FULL §B.4): records calls and hands
/// out monotonically increasing ids, with no real daemon round-trip. Used
/// by unit and integration tests so the rest of the crate is exercised
/// without a running PipeWire server.
#[derive(Default)]
pub struct FakeCore {
    next_id: ProxyId,
    pub nodes: HashMap<ProxyId, String>,
    pub ports: HashMap<ProxyId, (ProxyId, String, bool)>,
    pub links: HashMap<ProxyId, (ProxyId, ProxyId)>,
    pub roundtrips: u64,
}

impl FakeCore {
    pub fn new() -> Self {
        FakeCore {
            next_id: 1,
            ..Default::default()
        }
    }

    fn alloc_id(&mut self) -> ProxyId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl PwCore for FakeCore {
    fn create_node(&mut self, name: &str, _props: &HashMap<String, String>) -> ShimResult<ProxyId> {
        let id = self.alloc_id();
        self.nodes.insert(id, name.to_owned());
        Ok(id)
    }

    fn destroy_node(&mut self, id: ProxyId) -> ShimResult<()> {
        self.nodes.remove(&id);
        self.ports.retain(|_, (node, _, _)| *node != id);
        Ok(())
    }

    fn create_port(
        &mut self,
        node: ProxyId,
        name: &str,
        _format: FormatParam,
        is_input: bool,
    ) -> ShimResult<ProxyId> {
        let id = self.alloc_id();
        self.ports.insert(id, (node, name.to_owned(), is_input));
        Ok(id)
    }

    fn destroy_port(&mut self, id: ProxyId) -> ShimResult<()> {
        self.ports.remove(&id);
        self.links
            .retain(|_, (src, dst)| *src != id && *dst != id);
        Ok(())
    }

    fn link_ports(&mut self, src: ProxyId, dst: ProxyId) -> ShimResult<ProxyId> {
        let id = self.alloc_id();
        self.links.insert(id, (src, dst));
        Ok(id)
    }

    fn unlink(&mut self, link: ProxyId) -> ShimResult<()> {
        self.links.remove(&link);
        Ok(())
    }

    fn roundtrip(&mut self) -> ShimResult<()> {
        self.roundtrips += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destroying_a_node_cascades_to_its_ports() {
        let mut core = FakeCore::new();
        let node = core.create_node("c", &HashMap::new()).unwrap();
        let port = core
            .create_port(node, "c:in", FormatParam::Midi, true)
            .unwrap();
        core.destroy_node(node).unwrap();
        assert!(!core.ports.contains_key(&port));
    }

    #[test]
    fn destroying_a_port_cascades_to_its_links() {
        let mut core = FakeCore::new();
        let node = core.create_node("c", &HashMap::new()).unwrap();
        let a = core
            .create_port(node, "c:out", FormatParam::Midi, false)
            .unwrap();
        let b = core
            .create_port(node, "c:in", FormatParam::Midi, true)
            .unwrap();
        let link = core.link_ports(a, b).unwrap();
        core.destroy_port(a).unwrap();
        assert!(!core.links.contains_key(&link));
    }
}
