/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! Port & mix manager (spec §4.2).
//!
//! One `Mix` exists per (port, peer) pair, plus a distinguished global mix
//! (`id = None`) used by outputs and by summed inputs. `MAX_MIX` (1024,
//! spec §9) bounds how many upstream producers a single input port will
//! read from; beyond that the mixer silently truncates, matching the
//! original's behavior.

use std::collections::VecDeque;

pub const MAX_BUFFERS: usize = 2;
pub const MAX_MIX: usize = 1024;

bitflags::bitflags! {
    pub struct BufferFlags: u32 {
        const OUT = 0x01;
    }
}

#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub id: usize,
    pub flags: BufferFlags,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStatus {
    NeedData,
    HaveData,
}

#[derive(Debug)]
pub struct Mix {
    /// `None` for the global mix, `Some(peer_port_id)` otherwise.
    pub peer_id: Option<u32>,
    pub io_status: IoStatus,
    pub pinned_buffer: Option<usize>,
    buffers: Vec<BufferDescriptor>,
    queue: VecDeque<usize>,
}

impl Mix {
    pub fn new(peer_id: Option<u32>) -> Self {
        Mix {
            peer_id,
            io_status: IoStatus::NeedData,
            pinned_buffer: None,
            buffers: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.peer_id.is_none()
    }

    /// `use_buffers`: replace the buffer set, clearing any previous one.
    /// Outputs own every buffer and push them straight back onto the
    /// queue (spec §4.2).
    pub fn use_buffers(&mut self, buffers: Vec<Vec<u8>>, is_output: bool) {
        self.buffers.clear();
        self.queue.clear();
        for (id, data) in buffers.into_iter().enumerate() {
            let flags = if is_output {
                BufferFlags::OUT
            } else {
                BufferFlags::empty()
            };
            self.buffers.push(BufferDescriptor { id, flags, data });
            if is_output {
                self.queue.push_back(id);
            }
        }
    }

    pub fn dequeue_buffer(&mut self) -> Option<usize> {
        let id = self.queue.pop_front()?;
        if let Some(b) = self.buffers.get_mut(id) {
            b.flags.insert(BufferFlags::OUT);
        }
        Some(id)
    }

    pub fn reuse_buffer(&mut self, id: usize) {
        if let Some(b) = self.buffers.get_mut(id) {
            b.flags.remove(BufferFlags::OUT);
        }
        self.queue.push_back(id);
    }

    pub fn buffer(&self, id: usize) -> Option<&BufferDescriptor> {
        self.buffers.get(id)
    }

    pub fn buffer_mut(&mut self, id: usize) -> Option<&mut BufferDescriptor> {
        self.buffers.get_mut(id)
    }

    pub fn buffers(&self) -> &[BufferDescriptor] {
        &self.buffers
    }

    /// Every buffer `id = k` satisfies `0 <= k < n_buffers`, and buffers
    /// with `OUT` set are absent from the queue (spec §8 invariant).
    #[cfg(test)]
    fn check_invariants(&self) -> bool {
        self.buffers.iter().enumerate().all(|(k, b)| b.id == k)
            && self.queue.iter().all(|&id| {
                !self.buffers[id].flags.contains(BufferFlags::OUT)
            })
    }
}

/// Sum floating point audio from up to `MAX_MIX` connected peers into
/// `out`, matching spec §4.2's scalar summation policy (the SSE fast path
/// is an implementation detail of the real codebase's platform dispatch
/// and is not required for correctness here).
pub fn sum_audio_inputs(sources: &[&[f32]], out: &mut [f32]) {
    out.fill(0.0);
    for src in sources.iter().take(MAX_MIX) {
        let n = src.len().min(out.len());
        for i in 0..n {
            out[i] += src[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dequeued_buffers_are_out_and_absent_from_queue() {
        let mut mix = Mix::new(Some(1));
        mix.use_buffers(vec![vec![0; 4], vec![0; 4]], false);
        let id = mix.dequeue_buffer().unwrap();
        assert!(mix.buffer(id).unwrap().flags.contains(BufferFlags::OUT));
        assert!(mix.check_invariants());
    }

    #[test]
    fn reuse_clears_out_flag_and_requeues() {
        let mut mix = Mix::new(Some(1));
        mix.use_buffers(vec![vec![0; 4]], false);
        let id = mix.dequeue_buffer().unwrap();
        mix.reuse_buffer(id);
        assert!(!mix.buffer(id).unwrap().flags.contains(BufferFlags::OUT));
        assert!(mix.check_invariants());
    }

    #[test]
    fn global_mix_has_no_peer() {
        let mix = Mix::new(None);
        assert!(mix.is_global());
    }

    #[test]
    fn audio_mixing_scenario_two_plus_two_equals_four() {
        let a = [1.0f32; 4];
        let b = [2.0f32; 4];
        let mut out = [0.0f32; 4];
        sum_audio_inputs(&[&a, &b], &mut out);
        assert_eq!(out, [3.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn zero_sources_yields_silence() {
        let mut out = [9.0f32; 4];
        sum_audio_inputs(&[], &mut out);
        assert_eq!(out, [0.0; 4]);
    }
}
