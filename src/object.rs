/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! Object pool and recycler (spec §4.1).
//!
//! A JACK client is entitled to hold a `jack_port_t*` forever and call
//! `jack_port_name()` on it long after the port has been unregistered, so
//! removed objects are never freed outright: they are tombstoned in place
//! and only returned to the process-wide free list once enough of them
//! have piled up.

use crate::{link::Link, node::Node, port::Port};

pub const OBJECT_CHUNK: usize = 8;
pub const RECYCLE_THRESHOLD: usize = 128;

pub const INVALID_ID: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Live,
    Removing,
    Removed,
}

#[derive(Debug)]
pub enum ObjectKind {
    Node(Node),
    Port(Port),
    Link(Link),
    Free,
}

/// Tagged union over `{Node, Port, Link}` plus a stable `id`/`serial` pair
/// (spec §3's `Object`).
#[derive(Debug)]
pub struct Object {
    pub id: u32,
    pub serial: u64,
    pub phase: Phase,
    pub kind: ObjectKind,
}

impl Object {
    fn blank(serial: u64) -> Self {
        Object {
            id: INVALID_ID,
            serial,
            phase: Phase::Removed,
            kind: ObjectKind::Free,
        }
    }
}

/// Owns the live+removed object list for one client and the process-wide
/// free pool it draws chunks from and recycles into.
pub struct Registry {
    objects: Vec<Object>,
    /// Indices into `objects` for objects in `Phase::Removed`, oldest first.
    removed: std::collections::VecDeque<usize>,
    next_serial: u64,
    free_pool: Vec<usize>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry {
            objects: Vec::new(),
            removed: std::collections::VecDeque::new(),
            next_serial: 0,
            free_pool: Vec::new(),
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn grow_chunk(&mut self) {
        let base = self.objects.len();
        for i in 0..OBJECT_CHUNK {
            self.objects.push(Object::blank(0));
            self.free_pool.push(base + i);
        }
    }

    /// Allocate a new live object of `kind`, returning its index.
    pub fn alloc(&mut self, kind: ObjectKind, id: u32) -> usize {
        if self.free_pool.is_empty() {
            self.grow_chunk();
        }
        let idx = self
            .free_pool
            .pop()
            .expect("grow_chunk just populated the free pool");
        let serial = self.next_serial;
        self.next_serial += 1;
        self.objects[idx] = Object {
            id,
            serial,
            phase: Phase::Live,
            kind,
        };
        idx
    }

    pub fn get(&self, idx: usize) -> Option<&Object> {
        self.objects.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Object> {
        self.objects.get_mut(idx)
    }

    /// Mark `idx` removed: invalidate its id, push it to the tail of the
    /// removed list, and recycle in bulk once the watermark is crossed.
    /// Does not release the backing memory (spec §4.1).
    pub fn free(&mut self, idx: usize) {
        if let Some(obj) = self.objects.get_mut(idx) {
            obj.id = INVALID_ID;
            obj.phase = Phase::Removed;
        }
        self.removed.push_back(idx);
        if self.removed.len() > RECYCLE_THRESHOLD {
            self.recycle(RECYCLE_THRESHOLD / 2);
        }
    }

    /// Pop `count` of the oldest removed objects back into the free pool.
    fn recycle(&mut self, count: usize) {
        for _ in 0..count {
            let Some(idx) = self.removed.pop_front() else {
                break;
            };
            self.objects[idx].kind = ObjectKind::Free;
            self.free_pool.push(idx);
        }
    }

    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    pub fn find_by_id(&self, id: u32) -> Option<usize> {
        if id == INVALID_ID {
            return None;
        }
        self.objects
            .iter()
            .position(|o| o.id == id && o.phase != Phase::Removed)
    }

    pub fn find_by_serial(&self, serial: u64) -> Option<usize> {
        self.objects.iter().position(|o| o.serial == serial)
    }

    pub fn iter_live(&self) -> impl Iterator<Item = (usize, &Object)> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.phase != Phase::Removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_count_never_exceeds_removed_objects() {
        let mut reg = Registry::new();
        for i in 0..200u32 {
            let idx = reg.alloc(ObjectKind::Free, i);
            reg.free(idx);
            assert!(reg.removed_count() <= RECYCLE_THRESHOLD + 1);
        }
    }

    #[test]
    fn recycle_halves_the_removed_queue_at_the_watermark() {
        let mut reg = Registry::new();
        let mut idxs = Vec::new();
        for i in 0..RECYCLE_THRESHOLD as u32 + 2 {
            idxs.push(reg.alloc(ObjectKind::Free, i));
        }
        for idx in idxs {
            reg.free(idx);
        }
        assert!(reg.removed_count() <= RECYCLE_THRESHOLD / 2 + 1);
    }

    #[test]
    fn removed_object_keeps_its_backing_memory_readable() {
        let mut reg = Registry::new();
        let idx = reg.alloc(ObjectKind::Free, 7);
        reg.free(idx);
        // The slot is still there and still addressable; only the id
        // became the invalid sentinel.
        let obj = reg.get(idx).unwrap();
        assert_eq!(obj.id, INVALID_ID);
        assert_eq!(obj.phase, Phase::Removed);
    }
}
