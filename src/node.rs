/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! Node entity (spec §3).

#[derive(Debug, Clone)]
pub struct Node {
    /// Human-readable JACK name, already collision-resolved and filtered.
    pub jack_name: String,
    /// The PipeWire node.name property, unfiltered.
    pub node_name: String,
    pub session_priority: i32,
    pub owning_client_id: Option<u32>,
    pub is_jack: bool,
    pub is_running: bool,
}

impl Node {
    /// Derive the JACK-facing name the way the reference stack does: prefer
    /// `node.nick`, then `node.description`, then `application.name +
    /// node.description`, falling back to `node.name`.
    pub fn derive_jack_name<'a>(
        nick: Option<&'a str>,
        description: Option<&'a str>,
        app_name: Option<&'a str>,
        node_name: &'a str,
    ) -> String {
        if let Some(nick) = nick {
            return nick.to_owned();
        }
        if let (Some(app), Some(desc)) = (app_name, description) {
            return format!("{app} {desc}");
        }
        if let Some(desc) = description {
            return desc.to_owned();
        }
        node_name.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_nick_over_everything() {
        assert_eq!(
            Node::derive_jack_name(Some("Nick"), Some("desc"), Some("app"), "pw.node"),
            "Nick"
        );
    }

    #[test]
    fn falls_back_to_app_plus_description_then_node_name() {
        assert_eq!(
            Node::derive_jack_name(None, Some("desc"), Some("app"), "pw.node"),
            "app desc"
        );
        assert_eq!(
            Node::derive_jack_name(None, Some("desc"), None, "pw.node"),
            "desc"
        );
        assert_eq!(Node::derive_jack_name(None, None, None, "pw.node"), "pw.node");
    }
}
