/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! Port entity and its mixing/empty buffer (spec §3, §4.2).

use crate::latency::LatencyInfo;

bitflags::bitflags! {
    pub struct PortFlags: u32 {
        const INPUT       = 0x01;
        const OUTPUT      = 0x02;
        const PHYSICAL    = 0x04;
        const CAN_MONITOR = 0x08;
        const TERMINAL    = 0x10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortType {
    Audio,
    Midi,
    Video,
    Other,
}

impl PortType {
    /// Ordering used by `jack_get_ports` (spec §4.8): audio, midi, video,
    /// other.
    pub fn sort_key(self) -> u8 {
        match self {
            PortType::Audio => 0,
            PortType::Midi => 1,
            PortType::Video => 2,
            PortType::Other => 3,
        }
    }
}

pub const MAX_ALIASES: usize = 2;

/// Alignment, in bytes, required of the inline empty buffer (spec §3).
pub const EMPTY_BUFFER_ALIGN: usize = 16;

#[derive(Debug)]
pub struct Port {
    pub flags: PortFlags,
    pub fq_name: String,
    pub aliases: [Option<String>; MAX_ALIASES],
    pub system_alias: String,
    pub node_id: u32,
    pub port_type: PortType,
    pub monitor_request_count: u32,
    pub latency: [LatencyInfo; 2],
    /// The port's own global mix index (spec §4.2), if allocated.
    pub global_mix: Option<usize>,
    /// Indices of per-peer mixes for this port.
    pub mixes: Vec<usize>,
    empty_buffer: Vec<u8>,
    pub is_monitor: bool,
    pub visible: bool,
}

impl Port {
    pub fn new(
        fq_name: String,
        node_id: u32,
        flags: PortFlags,
        port_type: PortType,
        max_frames: usize,
    ) -> Self {
        let bytes = (max_frames * 4).max(EMPTY_BUFFER_ALIGN);
        // Over-allocate so an aligned slice of the required size can
        // always be carved out of it.
        let mut empty_buffer = vec![0u8; bytes + EMPTY_BUFFER_ALIGN];
        let misalign = empty_buffer.as_ptr() as usize % EMPTY_BUFFER_ALIGN;
        if misalign != 0 {
            empty_buffer.drain(0..EMPTY_BUFFER_ALIGN - misalign);
        }
        Port {
            flags,
            fq_name,
            aliases: [None, None],
            system_alias: String::new(),
            node_id,
            port_type,
            monitor_request_count: 0,
            latency: [LatencyInfo::default(), LatencyInfo::default()],
            global_mix: None,
            mixes: Vec::new(),
            empty_buffer,
            is_monitor: false,
            visible: true,
        }
    }

    pub fn empty_buffer_mut(&mut self) -> &mut [u8] {
        &mut self.empty_buffer
    }

    pub fn empty_buffer(&self) -> &[u8] {
        &self.empty_buffer
    }

    pub fn is_input(&self) -> bool {
        self.flags.contains(PortFlags::INPUT)
    }

    pub fn is_output(&self) -> bool {
        self.flags.contains(PortFlags::OUTPUT)
    }

    /// `jack_port_set_alias`/`jack_port_get_aliases` (spec §8 scenario 3):
    /// at most `MAX_ALIASES` slots, filled in order, rejecting once full.
    pub fn set_alias(&mut self, alias: &str) -> Result<(), ()> {
        for slot in &mut self.aliases {
            if slot.is_none() {
                *slot = Some(alias.to_owned());
                return Ok(());
            }
        }
        Err(())
    }

    pub fn get_aliases(&self) -> Vec<&str> {
        self.aliases.iter().flatten().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_port() -> Port {
        Port::new(
            "client:in".into(),
            1,
            PortFlags::INPUT,
            PortType::Audio,
            256,
        )
    }

    #[test]
    fn empty_buffer_is_aligned_and_big_enough() {
        let p = make_port();
        assert_eq!(p.empty_buffer().as_ptr() as usize % EMPTY_BUFFER_ALIGN, 0);
        assert!(p.empty_buffer().len() >= 256 * 4);
    }

    #[test]
    fn alias_slots_fill_in_order_then_reject() {
        let mut p = make_port();
        p.set_alias("a1").unwrap();
        p.set_alias("a2").unwrap();
        assert_eq!(p.get_aliases(), vec!["a1", "a2"]);
        assert!(p.set_alias("a3").is_err());
    }
}
