/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! Configuration: environment overrides and the `jack.*`/`rt.*` property
//! keys the client-node properties carry (spec §6, SPEC_FULL §A.3).

use crate::connect::SelfConnectMode;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantum {
    pub num: u32,
    pub denom: u32,
}

impl std::str::FromStr for Quantum {
    type Err = ();

    /// `PIPEWIRE_QUANTUM="num/denom"` (spec §6).
    fn from_str(s: &str) -> Result<Self, ()> {
        let (num, denom) = s.split_once('/').ok_or(())?;
        let num: u32 = num.parse().map_err(|_| ())?;
        let denom: u32 = denom.parse().map_err(|_| ())?;
        if denom == 0 {
            return Err(());
        }
        Ok(Quantum { num, denom })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub show_monitor: bool,
    pub show_midi: bool,
    pub merge_monitor: bool,
    pub short_name: bool,
    pub filter_name: bool,
    pub filter_char: char,
    pub passive_links: bool,
    pub locked_process: bool,
    pub default_as_system: bool,
    pub fix_midi_events: bool,
    pub global_buffer_size: Option<u32>,
    pub max_client_ports: u32,
    pub fill_aliases: bool,
    pub self_connect_mode: SelfConnectMode,
    pub rt_priority: i32,
    pub quantum: Option<Quantum>,
    pub link_passive_env: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            show_monitor: false,
            show_midi: true,
            merge_monitor: false,
            short_name: false,
            filter_name: false,
            filter_char: ' ',
            passive_links: false,
            locked_process: false,
            default_as_system: false,
            fix_midi_events: false,
            global_buffer_size: None,
            max_client_ports: 768,
            fill_aliases: false,
            self_connect_mode: SelfConnectMode::Allow,
            rt_priority: 88,
            quantum: None,
            link_passive_env: false,
        }
    }
}

impl Config {
    /// Populate from the PipeWire properties the host passed to
    /// `jack_client_open` (spec §6's `jack.*`/`rt.*` keys).
    pub fn from_properties(props: &HashMap<String, String>) -> Self {
        let mut cfg = Config::default();
        let get_bool = |key: &str, default: bool| {
            props
                .get(key)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(default)
        };
        cfg.show_monitor = get_bool("jack.show-monitor", cfg.show_monitor);
        cfg.show_midi = get_bool("jack.show-midi", cfg.show_midi);
        cfg.merge_monitor = get_bool("jack.merge-monitor", cfg.merge_monitor);
        cfg.short_name = get_bool("jack.short-name", cfg.short_name);
        cfg.filter_name = get_bool("jack.filter-name", cfg.filter_name);
        if let Some(c) = props.get("jack.filter-char").and_then(|s| s.chars().next()) {
            cfg.filter_char = c;
        }
        cfg.passive_links = get_bool("jack.passive-links", cfg.passive_links);
        cfg.locked_process = get_bool("jack.locked-process", cfg.locked_process);
        cfg.default_as_system = get_bool("jack.default-as-system", cfg.default_as_system);
        cfg.fix_midi_events = get_bool("jack.fix-midi-events", cfg.fix_midi_events);
        cfg.global_buffer_size = props.get("jack.global-buffer-size").and_then(|s| s.parse().ok());
        if let Some(n) = props
            .get("jack.max-client-ports")
            .and_then(|s| s.parse().ok())
        {
            cfg.max_client_ports = n;
        }
        cfg.fill_aliases = get_bool("jack.fill-aliases", cfg.fill_aliases);
        if let Some(mode) = props
            .get("jack.self-connect-mode")
            .and_then(|s| SelfConnectMode::from_config_str(s))
        {
            cfg.self_connect_mode = mode;
        }
        if let Some(p) = props.get("rt.prio").and_then(|s| s.parse().ok()) {
            cfg.rt_priority = p;
        }
        cfg.apply_environment();
        cfg
    }

    /// Apply `PIPEWIRE_QUANTUM`/`PIPEWIRE_LINK_PASSIVE` environment
    /// overrides (spec §6); `PIPEWIRE_RATE`/`PIPEWIRE_LATENCY`/
    /// `PIPEWIRE_PROPS` are forwarded verbatim to the client-node
    /// properties at `open` time and do not affect this struct.
    fn apply_environment(&mut self) {
        if let Ok(q) = std::env::var("PIPEWIRE_QUANTUM") {
            self.quantum = q.parse().ok();
        }
        self.link_passive_env = std::env::var("PIPEWIRE_LINK_PASSIVE").is_ok();
    }

    /// `JACK_START_SERVER` unset means "pass the no-start flag" (spec §6).
    pub fn no_start_server() -> bool {
        std::env::var_os("JACK_START_SERVER").is_none()
    }

    pub fn shim_disabled() -> bool {
        std::env::var_os("PIPEWIRE_NOJACK").is_some() || std::env::var_os("PIPEWIRE_INTERNAL").is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantum_parses_num_over_denom() {
        assert_eq!("512/48000".parse(), Ok(Quantum { num: 512, denom: 48000 }));
        assert!("512".parse::<Quantum>().is_err());
        assert!("512/0".parse::<Quantum>().is_err());
    }

    #[test]
    fn max_client_ports_defaults_to_768() {
        assert_eq!(Config::default().max_client_ports, 768);
    }

    #[test]
    fn self_connect_mode_parses_all_named_variants() {
        let props: HashMap<String, String> =
            [("jack.self-connect-mode".to_string(), "fail-all".to_string())]
                .into_iter()
                .collect();
        assert_eq!(
            Config::from_properties(&props).self_connect_mode,
            SelfConnectMode::FailAll
        );
    }
}
