/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! JACK name filtering (spec §6, §9, SPEC_FULL §B.3).
//!
//! The two filter alphabets are deliberately different: the node/client
//! alphabet includes `:` (the client:port separator must not appear inside
//! a bare client name), the port alphabet does not (a port's short name is
//! always namespaced by its client already). Recorded verbatim rather than
//! unified, per the open question in spec.md §9.

pub const MAX_NAME: usize = 256;
pub const MAX_PORT_FULL_NAME: usize = MAX_NAME + MAX_NAME + 1;

pub struct Filter;

impl Filter {
    pub const NAME_ALPHABET: &'static str = " ()[].:*$";
    pub const PORT_ALPHABET: &'static str = " ()[].*$";

    /// Replace every occurrence of an `alphabet` byte with `replacement`
    /// in place. `alphabet` is always plain ASCII punctuation, so the
    /// bytes it matches are never part of a multi-byte UTF-8 sequence; the
    /// one thing that *can* corrupt validity is a non-ASCII `replacement`
    /// getting truncated to a stray continuation byte, so it is clamped to
    /// ASCII first.
    pub fn filter_name(s: &mut String, alphabet: &str, replacement: char) {
        let replacement = if replacement.is_ascii() {
            replacement as u8
        } else {
            b'_'
        };
        for ch in unsafe { s.as_bytes_mut() } {
            if alphabet.as_bytes().contains(ch) {
                *ch = replacement;
            }
        }
    }

    pub fn filter_client_name(name: &str, enabled: bool, replacement: char) -> String {
        let mut out = name.to_owned();
        if enabled {
            Self::filter_name(&mut out, Self::NAME_ALPHABET, replacement);
        }
        truncate_at_char_boundary(&mut out, MAX_NAME);
        out
    }

    pub fn filter_port_name(name: &str, enabled: bool, replacement: char) -> String {
        let mut out = name.to_owned();
        if enabled {
            Self::filter_name(&mut out, Self::PORT_ALPHABET, replacement);
        }
        truncate_at_char_boundary(&mut out, MAX_NAME);
        out
    }
}

/// Truncate to at most `max_bytes`, backing off to the nearest earlier
/// char boundary instead of panicking mid-character.
fn truncate_at_char_boundary(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut idx = max_bytes;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    s.truncate(idx);
}

/// Resolve a collision between a freshly derived node name and the set of
/// names already in use for other client ids (spec §3 `Node`): a name
/// collision within the same client id reuses the existing name, a
/// collision across client ids gets `-<id>` appended.
pub fn resolve_node_name_collision(
    candidate: &str,
    this_client_id: u32,
    existing: impl Fn(&str) -> Option<u32>,
) -> String {
    match existing(candidate) {
        None => candidate.to_owned(),
        Some(owner) if owner == this_client_id => candidate.to_owned(),
        Some(_) => format!("{candidate}-{this_client_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_alphabet_includes_colon_port_alphabet_does_not() {
        assert!(Filter::NAME_ALPHABET.contains(':'));
        assert!(!Filter::PORT_ALPHABET.contains(':'));
    }

    #[test]
    fn filters_reserved_characters() {
        let filtered = Filter::filter_client_name("My Client[2]", true, '_');
        assert_eq!(filtered, "My_Client_2_");
    }

    #[test]
    fn same_client_id_reuses_name_other_client_id_gets_suffix() {
        let taken = |n: &str| if n == "synth" { Some(3) } else { None };
        assert_eq!(resolve_node_name_collision("synth", 3, taken), "synth");
        assert_eq!(resolve_node_name_collision("synth", 9, taken), "synth-9");
    }
}
