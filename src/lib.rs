/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! A JACK2 client API compatibility shim implemented on top of PipeWire.
//!
//! The crate is organized around the component table: object lifetime
//! ([`object`]), naming ([`naming`], [`uuid`]), ports and mixing
//! ([`port`], [`mix`], [`latency`]), MIDI ([`midi`]), the notification
//! path ([`notify`], [`dispatch`]), the RT cycle ([`rt`]), transport
//! ([`transport`]), connection policy ([`connect`]), metadata
//! ([`metadata`]), format negotiation ([`format`]), thread utilities
//! ([`threadutil`]), and the [`client`] aggregate that ties them
//! together. [`pwcore`] is the seam to the PipeWire client-node protocol;
//! [`abi`] is the exported C surface.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod abi;
pub mod client;
pub mod config;
pub mod connect;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod latency;
pub mod link;
pub mod logging;
pub mod metadata;
pub mod midi;
pub mod mix;
pub mod naming;
pub mod node;
pub mod notify;
pub mod object;
pub mod port;
pub mod pwcore;
pub mod rt;
pub mod state;
pub mod threadutil;
pub mod transport;
pub mod uuid;
