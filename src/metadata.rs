/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! Metadata bridge (spec §4.9, SPEC_FULL §B.2).

use crate::uuid::JackUuid;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct PropertyValue {
    pub value: String,
    pub prop_type: Option<String>,
}

/// Process-wide description table (spec §3): one entry per JACK UUID,
/// each holding a grow-on-demand array of `{key, data, type}` triples.
/// Protected by a single mutex at the call site (never from RT).
#[derive(Default)]
pub struct DescriptionTable {
    descriptions: HashMap<u64, HashMap<String, PropertyValue>>,
}

impl DescriptionTable {
    pub fn set_property(&mut self, subject: JackUuid, key: &str, value: &str, prop_type: Option<&str>) {
        self.descriptions
            .entry(subject.0)
            .or_default()
            .insert(
                key.to_owned(),
                PropertyValue {
                    value: value.to_owned(),
                    prop_type: prop_type.map(str::to_owned),
                },
            );
    }

    pub fn get_property(&self, subject: JackUuid, key: &str) -> Option<&PropertyValue> {
        self.descriptions.get(&subject.0)?.get(key)
    }

    pub fn get_all_properties(&self, subject: JackUuid) -> Option<&HashMap<String, PropertyValue>> {
        self.descriptions.get(&subject.0)
    }

    pub fn remove_property(&mut self, subject: JackUuid, key: &str) -> bool {
        self.descriptions
            .get_mut(&subject.0)
            .map(|m| m.remove(key).is_some())
            .unwrap_or(false)
    }

    pub fn remove_all_properties(&mut self, subject: JackUuid) -> bool {
        self.descriptions.remove(&subject.0).is_some()
    }
}

/// Pull the `name` field out of a `default.audio.sink`/
/// `default.audio.source` metadata JSON blob (spec §4.9).
pub fn parse_default_name(json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    value.get("name")?.as_str().map(str::to_owned)
}

/// Tracks the last-seen default sink/source node names so default-port
/// resolution doesn't need a full registry rescan (SPEC_FULL §B.2).
#[derive(Default)]
pub struct DefaultsTracker {
    pub default_sink: Option<String>,
    pub default_source: Option<String>,
}

impl DefaultsTracker {
    pub fn on_metadata_change(&mut self, key: &str, json_value: &str) {
        match key {
            "default.audio.sink" => self.default_sink = parse_default_name(json_value),
            "default.audio.source" => self.default_source = parse_default_name(json_value),
            _ => {}
        }
    }

    pub fn is_default_port(&self, node_name: &str, is_input: bool) -> bool {
        if is_input {
            self.default_sink.as_deref() == Some(node_name)
        } else {
            self.default_source.as_deref() == Some(node_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uuid::{JackUuid, KIND_PORT};

    #[test]
    fn parses_name_field_out_of_default_sink_json() {
        let json = r#"{"name":"alsa_output.pci-0000_00_1f.3.analog-stereo","other":1}"#;
        assert_eq!(
            parse_default_name(json).as_deref(),
            Some("alsa_output.pci-0000_00_1f.3.analog-stereo")
        );
    }

    #[test]
    fn missing_name_field_yields_none() {
        assert_eq!(parse_default_name(r#"{"other":1}"#), None);
    }

    #[test]
    fn set_get_remove_round_trip() {
        let mut table = DescriptionTable::default();
        let uuid = JackUuid::encode(KIND_PORT, 1, false);
        table.set_property(uuid, "color", "red", None);
        assert_eq!(table.get_property(uuid, "color").unwrap().value, "red");
        assert!(table.remove_property(uuid, "color"));
        assert!(table.get_property(uuid, "color").is_none());
    }

    #[test]
    fn defaults_tracker_flags_matching_port() {
        let mut tracker = DefaultsTracker::default();
        tracker.on_metadata_change("default.audio.sink", r#"{"name":"n1"}"#);
        assert!(tracker.is_default_port("n1", true));
        assert!(!tracker.is_default_port("n1", false));
    }
}
