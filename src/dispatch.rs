/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! Callback dispatcher (spec §4.4): drains the notification ring,
//! coalesces latency/graph notifications, and is the only place that
//! calls into user code from the control loop.

use crate::notify::{LatencyDir, NotifyKind, NotificationRecord, Ring, requires_active};
use std::collections::HashMap;

/// User-supplied callback slots. Each is `Some` once the corresponding
/// `jack_set_*_callback` has been called.
#[derive(Default)]
pub struct Callbacks {
    /// `jack_set_process_callback`. Called synchronously from the RT
    /// cycle, not drained from the ring like the others in this struct.
    pub process: Option<Box<dyn FnMut(u32) + Send + Sync>>,
    pub registration: Option<Box<dyn FnMut(u32, bool) + Send + Sync>>,
    pub port_registration: Option<Box<dyn FnMut(u32, bool) + Send + Sync>>,
    pub connect: Option<Box<dyn FnMut(u32, u32, bool) + Send + Sync>>,
    pub buffer_size: Option<Box<dyn FnMut(u32) + Send + Sync>>,
    pub sample_rate: Option<Box<dyn FnMut(u32) + Send + Sync>>,
    pub xrun: Option<Box<dyn FnMut() + Send + Sync>>,
    pub graph_order: Option<Box<dyn FnMut() + Send + Sync>>,
    pub latency: Option<Box<dyn FnMut(LatencyDir) + Send + Sync>>,
    pub shutdown: Option<Box<dyn FnMut() + Send + Sync>>,
}

/// Reentrant-by-integer freeze guard (spec §9): brackets every control
/// thread entry point that mutates the graph or port set.
#[derive(Default)]
pub struct Freezer(u32);

impl Freezer {
    pub fn freeze(&mut self) {
        self.0 += 1;
    }

    /// Returns `true` once the last matching `freeze()` has been undone,
    /// meaning the caller should check and drain the ring.
    pub fn thaw(&mut self) -> bool {
        self.0 = self.0.saturating_sub(1);
        self.0 == 0
    }

    pub fn is_frozen(&self) -> bool {
        self.0 > 0
    }
}

/// Tracks, per object, the last `arg1` value a notification carried so
/// unchanged re-deliveries can be deduplicated (spec §4.4).
#[derive(Default)]
pub struct Dispatcher {
    pub freezer: Freezer,
    ring: Ring,
    registered_arg1: HashMap<u32, i64>,
    recompute_graph_order: bool,
    recompute_latency: [bool; 2],
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// `queue_notify`: applies the emit-matrix and, if admitted, pushes to
    /// the ring and signals the control loop (unless frozen). Returns
    /// whether the event was admitted to the ring (the caller performs the
    /// side effect regardless).
    #[allow(clippy::too_many_arguments)]
    pub fn queue_notify(
        &mut self,
        kind: NotifyKind,
        object_id: Option<u32>,
        arg1: i64,
        callback_present: bool,
        object_exists: bool,
        client_active: bool,
    ) -> bool {
        let gated_by_active = requires_active(kind) && !client_active;
        let admitted = match kind {
            NotifyKind::Registration | NotifyKind::PortRegistration | NotifyKind::Connect => {
                callback_present && object_exists && !gated_by_active
            }
            NotifyKind::BufferFrames | NotifyKind::SampleRate => true,
            _ => callback_present,
        };
        if admitted {
            self.ring.push(NotificationRecord {
                kind,
                object_id,
                arg1,
            });
            if !self.freezer.is_frozen() {
                // In the real control loop this signals the event source;
                // here the caller drains explicitly.
            }
        }
        admitted
    }

    pub fn thaw_and_check(&mut self) -> bool {
        self.freezer.thaw() && !self.ring.is_empty()
    }

    pub fn ring_len(&self) -> usize {
        self.ring.len()
    }

    /// Drain the ring while not frozen, deduplicating unchanged
    /// registration-style updates, and invoking at most one graph and one
    /// latency callback per direction per drain (spec §4.4).
    pub fn drain(&mut self, callbacks: &mut Callbacks) {
        if self.freezer.is_frozen() {
            return;
        }
        self.recompute_graph_order = false;
        self.recompute_latency = [false, false];

        while let Some(rec) = self.ring.pop() {
            if let Some(id) = rec.object_id {
                if let Some(prev) = self.registered_arg1.get(&id) {
                    if *prev == rec.arg1 {
                        continue;
                    }
                }
                self.registered_arg1.insert(id, rec.arg1);
            }
            match rec.kind {
                NotifyKind::Registration => {
                    if let (Some(cb), Some(id)) = (&mut callbacks.registration, rec.object_id) {
                        cb(id, rec.arg1 != 0);
                    }
                }
                NotifyKind::PortRegistration => {
                    if let (Some(cb), Some(id)) = (&mut callbacks.port_registration, rec.object_id)
                    {
                        cb(id, rec.arg1 != 0);
                    }
                }
                NotifyKind::Connect => {
                    if let (Some(cb), Some(id)) = (&mut callbacks.connect, rec.object_id) {
                        let other = (rec.arg1 >> 1) as u32;
                        let connected = rec.arg1 & 1 != 0;
                        cb(id, other, connected);
                    }
                    self.recompute_graph_order = true;
                    self.recompute_latency = [true, true];
                }
                NotifyKind::BufferFrames => {
                    if let Some(cb) = &mut callbacks.buffer_size {
                        cb(rec.arg1 as u32);
                    }
                }
                NotifyKind::SampleRate => {
                    if let Some(cb) = &mut callbacks.sample_rate {
                        cb(rec.arg1 as u32);
                    }
                }
                NotifyKind::XRun => {
                    if let Some(cb) = &mut callbacks.xrun {
                        cb();
                    }
                }
                NotifyKind::GraphOrder => self.recompute_graph_order = true,
                NotifyKind::Latency(dir) => {
                    let dir = match dir {
                        LatencyDir::Capture => 0,
                        LatencyDir::Playback => 1,
                    };
                    self.recompute_latency[dir] = true;
                }
                NotifyKind::TotalLatency => {
                    self.recompute_latency = [true, true];
                }
                NotifyKind::Freewheel => {}
                NotifyKind::Shutdown => {
                    if let Some(cb) = &mut callbacks.shutdown {
                        cb();
                    }
                }
            }
        }

        if self.recompute_graph_order {
            if let Some(cb) = &mut callbacks.graph_order {
                cb();
            }
        }
        for (i, dir) in [LatencyDir::Capture, LatencyDir::Playback].into_iter().enumerate() {
            if self.recompute_latency[i] {
                if let Some(cb) = &mut callbacks.latency {
                    cb(dir);
                }
            }
        }
    }
}
