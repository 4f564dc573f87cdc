/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! Notification ring (spec §4.4): a lock-free SPSC byte ring carrying
//! deferred events from the data/registry threads to the control thread.

use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const RING_SIZE: usize = 8192;
const RECORD_LEN: usize = 24;
pub const RING_CAPACITY: usize = RING_SIZE / RECORD_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Registration,
    PortRegistration,
    Connect,
    BufferFrames,
    SampleRate,
    Latency(LatencyDir),
    TotalLatency,
    GraphOrder,
    XRun,
    Freewheel,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyDir {
    Capture,
    Playback,
}

/// Whether an event kind is gated on the client being active (spec §4.4).
pub fn requires_active(kind: NotifyKind) -> bool {
    matches!(kind, NotifyKind::PortRegistration | NotifyKind::Connect)
}

#[derive(Debug, Clone, Copy)]
pub struct NotificationRecord {
    pub kind: NotifyKind,
    pub object_id: Option<u32>,
    pub arg1: i64,
}

/// Fixed-capacity SPSC ring of `NotificationRecord`s. One producer thread
/// (registry/metadata/RT — serialized by a context lock on the write side
/// per spec §5), one consumer (the control loop).
pub struct Ring {
    buf: Vec<Option<NotificationRecord>>,
    write: CachePadded<AtomicUsize>,
    read: CachePadded<AtomicUsize>,
}

impl Ring {
    pub fn new() -> Self {
        Ring {
            buf: (0..RING_CAPACITY).map(|_| None).collect(),
            write: CachePadded::new(AtomicUsize::new(0)),
            read: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    pub fn len(&self) -> usize {
        self.write.load(Ordering::Acquire) - self.read.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `false` (and drops nothing — caller decides what to do) if
    /// the ring is full.
    pub fn push(&mut self, record: NotificationRecord) -> bool {
        let w = self.write.load(Ordering::Relaxed);
        let r = self.read.load(Ordering::Acquire);
        if w - r >= RING_CAPACITY {
            return false;
        }
        self.buf[w % RING_CAPACITY] = Some(record);
        self.write.store(w + 1, Ordering::Release);
        true
    }

    pub fn pop(&mut self) -> Option<NotificationRecord> {
        let r = self.read.load(Ordering::Relaxed);
        let w = self.write.load(Ordering::Acquire);
        if r == w {
            return None;
        }
        let rec = self.buf[r % RING_CAPACITY].take();
        self.read.store(r + 1, Ordering::Release);
        rec
    }
}

impl Default for Ring {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(arg1: i64) -> NotificationRecord {
        NotificationRecord {
            kind: NotifyKind::XRun,
            object_id: None,
            arg1,
        }
    }

    #[test]
    fn write_index_minus_read_index_never_exceeds_capacity() {
        let mut ring = Ring::new();
        for i in 0..RING_CAPACITY as i64 * 3 {
            ring.push(rec(i));
            assert!(ring.len() <= RING_CAPACITY);
            ring.pop();
        }
    }

    #[test]
    fn fifo_order_is_preserved() {
        let mut ring = Ring::new();
        for i in 0..10 {
            assert!(ring.push(rec(i)));
        }
        for i in 0..10 {
            assert_eq!(ring.pop().unwrap().arg1, i);
        }
        assert!(ring.pop().is_none());
    }

    #[test]
    fn push_fails_once_full_without_corrupting_state() {
        let mut ring = Ring::new();
        for i in 0..RING_CAPACITY as i64 {
            assert!(ring.push(rec(i)));
        }
        assert!(!ring.push(rec(999)));
        assert_eq!(ring.len(), RING_CAPACITY);
    }
}
