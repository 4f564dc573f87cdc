/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! RT cycle driver (spec §4.5) and the activation record it reads/writes
//! (spec §3). Strictly non-blocking: atomics and ring pushes only, no
//! mutexes besides a best-effort `try_lock` around the user callback
//! (spec §5).

use crate::dispatch::Dispatcher;
use crate::notify::NotifyKind;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActivationStatus {
    Idle = 0,
    Awake = 1,
    Finished = 2,
    Triggered = 3,
}

/// The shared, mapped activation record a driver node owns and every
/// client reads/writes atomically (spec §3).
pub struct ActivationRecord {
    pub status: AtomicU8,
    pub awake_time: AtomicU64,
    pub finish_time: AtomicU64,
    pub signal_time: AtomicU64,
    pub segment_owner: AtomicU32,
    pub reposition_position: AtomicU64,
    pub reposition_owner: AtomicU32,
    pub reposition_pending: AtomicBool,
    pub xruns: AtomicU32,
    pub pending_sync: AtomicBool,
    /// Fixed-point CPU load, permille.
    pub cpu_load_permille: AtomicU32,
    pub activation_state: AtomicU32,
    pub sync_timeout_us: AtomicU32,
}

impl Default for ActivationRecord {
    fn default() -> Self {
        ActivationRecord {
            status: AtomicU8::new(ActivationStatus::Idle as u8),
            awake_time: AtomicU64::new(0),
            finish_time: AtomicU64::new(0),
            signal_time: AtomicU64::new(0),
            segment_owner: AtomicU32::new(0),
            reposition_position: AtomicU64::new(0),
            reposition_owner: AtomicU32::new(0),
            reposition_pending: AtomicBool::new(false),
            xruns: AtomicU32::new(0),
            pending_sync: AtomicBool::new(false),
            cpu_load_permille: AtomicU32::new(0),
            activation_state: AtomicU32::new(0),
            sync_timeout_us: AtomicU32::new(2_000_000),
        }
    }
}

impl ActivationRecord {
    pub fn set_status(&self, status: ActivationStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub fn mark_awake(&self, now: u64) {
        self.set_status(ActivationStatus::Awake);
        self.awake_time.store(now, Ordering::Release);
    }

    pub fn mark_finished(&self, now: u64) {
        self.set_status(ActivationStatus::Finished);
        self.finish_time.store(now, Ordering::Release);
    }

    /// `jack_transport_locate`: publish the reposition target and take
    /// ownership of the reposition record (spec §8 scenario 5).
    pub fn request_reposition(&self, frame: u64, owner_node_id: u32) {
        self.reposition_position.store(frame, Ordering::Release);
        self.reposition_owner.store(owner_node_id, Ordering::Release);
        self.reposition_pending.store(true, Ordering::Release);
    }

    /// CAS-based decrement used by `cycle_signal` to fan out triggers to
    /// downstream targets; returns `true` once the link has seen enough
    /// decrements to reach the ready threshold.
    pub fn decrement_activation(&self, threshold: u32) -> bool {
        let prev = self.activation_state.fetch_sub(1, Ordering::AcqRel);
        prev.saturating_sub(1) <= threshold
    }
}

/// Per-cycle statistics (SPEC_FULL §B.1): cumulative xrun count and a
/// CPU-load estimate derived from a rolling mean cycle duration.
#[derive(Default)]
pub struct Stats {
    xruns: u64,
    mean_cycle_ns: u64,
    samples: u64,
    period_ns: u64,
}

impl Stats {
    pub fn set_period(&mut self, buffer_frames: u32, sample_rate: u32) {
        self.period_ns = if sample_rate == 0 {
            0
        } else {
            (buffer_frames as u64 * 1_000_000_000) / sample_rate as u64
        };
    }

    pub fn record_cycle(&mut self, duration_ns: u64) {
        self.samples += 1;
        // Simple incremental mean; avoids keeping a ring of samples.
        let delta = duration_ns as i64 - self.mean_cycle_ns as i64;
        let step = delta / self.samples as i64;
        self.mean_cycle_ns = (self.mean_cycle_ns as i64 + step) as u64;
    }

    pub fn record_xrun(&mut self) {
        self.xruns += 1;
    }

    pub fn xrun_count(&self) -> u64 {
        self.xruns
    }

    pub fn cpu_load(&self) -> f32 {
        if self.period_ns == 0 {
            return 0.0;
        }
        self.mean_cycle_ns as f32 / self.period_ns as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Waiting,
    Processing,
    Signalling,
}

/// `cycle_wait`/`cycle_run`/`cycle_signal` state machine (spec §4.5,
/// §9 "coroutine-like wait/signal").
pub struct CycleDriver {
    pub state: CycleState,
    pub started: bool,
    pub first: bool,
    pub thread_entered: bool,
    pub freewheeling: bool,
    pub sample_rate: u32,
    pub buffer_frames: u32,
}

impl CycleDriver {
    pub fn new(sample_rate: u32, buffer_frames: u32) -> Self {
        CycleDriver {
            state: CycleState::Idle,
            started: false,
            first: true,
            thread_entered: false,
            freewheeling: false,
            sample_rate,
            buffer_frames,
        }
    }

    /// One invocation of `cycle_run`: given the driver's reported buffer
    /// size/sample rate and xrun count, returns `Some(frames)` to process
    /// this cycle, or `None` when the cycle should be skipped because the
    /// format changed (a BUFFER_FRAMES/SAMPLE_RATE notification is queued
    /// in that case).
    pub fn cycle_run(
        &mut self,
        activation: &ActivationRecord,
        now: u64,
        driver_buffer_frames: u32,
        driver_sample_rate: u32,
        driver_xruns: u32,
        dispatcher: &mut Dispatcher,
        client_active: bool,
        has_xrun_cb: bool,
        stats: &mut Stats,
    ) -> Option<u32> {
        self.state = CycleState::Processing;
        activation.mark_awake(now);

        if driver_buffer_frames != self.buffer_frames {
            self.buffer_frames = driver_buffer_frames;
            stats.set_period(self.buffer_frames, self.sample_rate);
            dispatcher.queue_notify(
                NotifyKind::BufferFrames,
                None,
                driver_buffer_frames as i64,
                true,
                true,
                client_active,
            );
            return None;
        }
        if driver_sample_rate != self.sample_rate {
            self.sample_rate = driver_sample_rate;
            stats.set_period(self.buffer_frames, self.sample_rate);
            dispatcher.queue_notify(
                NotifyKind::SampleRate,
                None,
                driver_sample_rate as i64,
                true,
                true,
                client_active,
            );
            return None;
        }

        let prev_xruns = activation.xruns.swap(driver_xruns, Ordering::AcqRel);
        if driver_xruns > prev_xruns {
            stats.record_xrun();
            dispatcher.queue_notify(NotifyKind::XRun, None, 0, has_xrun_cb, true, client_active);
        }

        self.first = false;
        Some(self.buffer_frames)
    }

    /// `cycle_wait`: block until the activation record reports it has been
    /// triggered for this cycle. This crate drives the RT thread from an
    /// external caller rather than owning its own wait primitive (spec §1
    /// scope), so this only performs the state transition and hands back
    /// the last recorded signal time for the caller to act on.
    pub fn cycle_wait(&mut self, activation: &ActivationRecord) -> u64 {
        self.state = CycleState::Waiting;
        activation.signal_time.load(Ordering::Acquire)
    }

    /// `cycle_signal` (spec §4.5): run `advance_outputs` to requeue every
    /// output port's buffer for the next cycle, run `timebase_owner` iff
    /// `own_node_id` currently owns the transport segment, mark the
    /// activation finished, and fan the trigger out to every target link
    /// past its decrement threshold.
    pub fn cycle_signal(
        &mut self,
        activation: &ActivationRecord,
        now: u64,
        targets: &[(&ActivationRecord, u32)],
        own_node_id: u32,
        mut advance_outputs: impl FnMut(),
        mut timebase_owner: impl FnMut(),
    ) {
        self.state = CycleState::Signalling;
        advance_outputs();
        if activation.segment_owner.load(Ordering::Acquire) == own_node_id {
            timebase_owner();
        }
        activation.mark_finished(now);
        for (target, threshold) in targets {
            if target.decrement_activation(*threshold) {
                target.set_status(ActivationStatus::Triggered);
                target.signal_time.store(now, Ordering::Release);
            }
        }
        self.state = CycleState::Idle;
    }

    pub fn start(&mut self) {
        self.started = true;
        self.first = true;
    }

    pub fn pause(&mut self) {
        self.started = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_frames_change_skips_the_cycle_and_notifies() {
        let mut driver = CycleDriver::new(48000, 256);
        let activation = ActivationRecord::default();
        let mut dispatcher = Dispatcher::new();
        let mut stats = Stats::default();
        let frames = driver.cycle_run(
            &activation,
            0,
            512,
            48000,
            0,
            &mut dispatcher,
            true,
            false,
            &mut stats,
        );
        assert!(frames.is_none());
        assert_eq!(driver.buffer_frames, 512);
    }

    #[test]
    fn stable_format_returns_buffer_frames() {
        let mut driver = CycleDriver::new(48000, 256);
        let activation = ActivationRecord::default();
        let mut dispatcher = Dispatcher::new();
        let mut stats = Stats::default();
        let frames = driver.cycle_run(
            &activation,
            0,
            256,
            48000,
            0,
            &mut dispatcher,
            true,
            false,
            &mut stats,
        );
        assert_eq!(frames, Some(256));
    }

    #[test]
    fn growing_driver_xrun_count_increments_stats() {
        let mut driver = CycleDriver::new(48000, 256);
        let activation = ActivationRecord::default();
        let mut dispatcher = Dispatcher::new();
        let mut stats = Stats::default();
        driver.cycle_run(&activation, 0, 256, 48000, 1, &mut dispatcher, true, true, &mut stats);
        assert_eq!(stats.xrun_count(), 1);
    }

    #[test]
    fn reposition_publishes_position_and_owner() {
        let activation = ActivationRecord::default();
        activation.request_reposition(48000, 7);
        assert_eq!(activation.reposition_position.load(Ordering::Acquire), 48000);
        assert_eq!(activation.reposition_owner.load(Ordering::Acquire), 7);
    }

    #[test]
    fn cycle_signal_advances_outputs_and_runs_timebase_owner_only_when_owned() {
        let mut driver = CycleDriver::new(48000, 256);
        let activation = ActivationRecord::default();
        activation.segment_owner.store(7, Ordering::Release);

        let mut advanced = false;
        let mut ran_timebase = false;
        driver.cycle_signal(&activation, 1, &[], 7, || advanced = true, || ran_timebase = true);
        assert!(advanced);
        assert!(ran_timebase);

        let mut advanced_again = false;
        let mut ran_timebase_again = false;
        driver.cycle_signal(
            &activation,
            2,
            &[],
            9,
            || advanced_again = true,
            || ran_timebase_again = true,
        );
        assert!(advanced_again);
        assert!(!ran_timebase_again);
    }

    #[test]
    fn cycle_wait_returns_last_signal_time() {
        let mut driver = CycleDriver::new(48000, 256);
        let activation = ActivationRecord::default();
        activation.signal_time.store(42, Ordering::Release);
        assert_eq!(driver.cycle_wait(&activation), 42);
        assert_eq!(driver.state, CycleState::Waiting);
    }
}
