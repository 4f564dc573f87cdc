/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! Connection policy and port matching (spec §4.8).

use crate::{
    error::{ShimError, ShimResult},
    port::{Port, PortType},
};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfConnectMode {
    Allow,
    FailExternal,
    IgnoreExternal,
    FailAll,
    IgnoreAll,
}

impl SelfConnectMode {
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s {
            "allow" => Some(Self::Allow),
            "fail-external" => Some(Self::FailExternal),
            "ignore-external" => Some(Self::IgnoreExternal),
            "fail-all" => Some(Self::FailAll),
            "ignore-all" => Some(Self::IgnoreAll),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectDecision {
    Create,
    SilentlyDrop,
    Reject,
}

/// Apply the self-connect policy matrix (spec §4.8, §8 scenario 4).
/// `src_is_ours`/`dst_is_ours` describe whether each endpoint belongs to
/// the client issuing the connect.
pub fn decide_self_connect(
    mode: SelfConnectMode,
    src_is_ours: bool,
    dst_is_ours: bool,
) -> ConnectDecision {
    let internal = src_is_ours && dst_is_ours;
    let touches_us = src_is_ours || dst_is_ours;
    match mode {
        SelfConnectMode::Allow => ConnectDecision::Create,
        SelfConnectMode::FailExternal => {
            if touches_us && !internal {
                ConnectDecision::Reject
            } else {
                ConnectDecision::Create
            }
        }
        SelfConnectMode::IgnoreExternal => {
            if touches_us && !internal {
                ConnectDecision::SilentlyDrop
            } else {
                ConnectDecision::Create
            }
        }
        SelfConnectMode::FailAll => {
            if touches_us {
                ConnectDecision::Reject
            } else {
                ConnectDecision::Create
            }
        }
        SelfConnectMode::IgnoreAll => {
            if touches_us {
                ConnectDecision::SilentlyDrop
            } else {
                ConnectDecision::Create
            }
        }
    }
}

/// Validate a would-be connection's endpoints before policy is applied:
/// `src` must be an output, `dst` an input, and their types must match.
pub fn validate_endpoints(src: &Port, dst: &Port) -> ShimResult<()> {
    if !src.is_output() {
        return Err(ShimError::Argument("source port is not an output".into()));
    }
    if !dst.is_input() {
        return Err(ShimError::Argument(
            "destination port is not an input".into(),
        ));
    }
    if src.port_type != dst.port_type {
        return Err(ShimError::Argument("port type mismatch".into()));
    }
    Ok(())
}

/// `jack_get_ports`: compile both patterns (empty pattern matches
/// everything, per JACK convention) and return matching ports sorted the
/// way spec §4.8 describes.
pub struct PortQuery {
    name_re: Option<Regex>,
    type_re: Option<Regex>,
}

impl PortQuery {
    pub fn compile(name_pattern: &str, type_pattern: &str) -> ShimResult<Self> {
        let name_re = if name_pattern.is_empty() {
            None
        } else {
            Some(Regex::new(name_pattern)?)
        };
        let type_re = if type_pattern.is_empty() {
            None
        } else {
            Some(Regex::new(type_pattern)?)
        };
        Ok(PortQuery { name_re, type_re })
    }

    fn type_label(t: PortType) -> &'static str {
        match t {
            PortType::Audio => "32 bit float mono audio",
            PortType::Midi => "8 bit raw midi",
            PortType::Video => "32 bit float RGBA video",
            PortType::Other => "other",
        }
    }

    pub fn matches(&self, port: &Port, system_alias: Option<&str>) -> bool {
        if let Some(re) = &self.type_re {
            if !re.is_match(Self::type_label(port.port_type)) {
                return false;
            }
        }
        if let Some(re) = &self.name_re {
            let name_hits = re.is_match(&port.fq_name);
            let alias_hits = system_alias.map(|a| re.is_match(a)).unwrap_or(false);
            if !name_hits && !alias_hits {
                return false;
            }
        }
        true
    }
}

/// Sort key for `jack_get_ports` (spec §4.8): (type, capture-before-
/// playback, default-of-default first, priority, node id, is_monitor,
/// system id, serial).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PortSortKey {
    pub port_type: u8,
    pub capture_before_playback: u8,
    pub default_first: u8,
    pub priority: std::cmp::Reverse<i32>,
    pub node_id: u32,
    pub is_monitor: bool,
    pub system_id: u32,
    pub serial: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_allowed_under_fail_external() {
        assert_eq!(
            decide_self_connect(SelfConnectMode::FailExternal, true, true),
            ConnectDecision::Create
        );
    }

    #[test]
    fn external_rejected_under_fail_all() {
        assert_eq!(
            decide_self_connect(SelfConnectMode::FailAll, true, false),
            ConnectDecision::Reject
        );
    }

    #[test]
    fn external_silently_dropped_under_ignore_external() {
        assert_eq!(
            decide_self_connect(SelfConnectMode::IgnoreExternal, true, false),
            ConnectDecision::SilentlyDrop
        );
    }

    #[test]
    fn fully_remote_link_always_created() {
        for mode in [
            SelfConnectMode::Allow,
            SelfConnectMode::FailExternal,
            SelfConnectMode::IgnoreExternal,
            SelfConnectMode::FailAll,
            SelfConnectMode::IgnoreAll,
        ] {
            assert_eq!(
                decide_self_connect(mode, false, false),
                ConnectDecision::Create
            );
        }
    }

    #[test]
    fn endpoints_must_be_output_then_input_of_matching_type() {
        let out = Port::new("c:out".into(), 1, crate::port::PortFlags::OUTPUT, PortType::Audio, 64);
        let inp = Port::new("c:in".into(), 1, crate::port::PortFlags::INPUT, PortType::Audio, 64);
        assert!(validate_endpoints(&out, &inp).is_ok());
        assert!(validate_endpoints(&inp, &out).is_err());
    }
}
