/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! Transport & timebase (spec §4.6).

use std::sync::atomic::{AtomicU32, Ordering};

pub const TICKS_PER_BEAT: f64 = 1920.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Starting,
    Rolling,
    Looping,
}

#[derive(Debug, Clone, Copy)]
pub enum IoPositionState {
    Stopped,
    Starting,
    Running { looping: bool },
}

#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub start: u64,
    pub duration: u64,
    pub rate: f64,
    pub position: u64,
    pub owner: u32,
    pub bar_valid: bool,
    pub bar: i32,
    pub beats_per_bar: f32,
    pub beat_type: f32,
    pub ticks_per_beat: f64,
    pub beat: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct IoPosition {
    pub state: IoPositionState,
    pub clock_offset: u64,
    pub segment: Segment,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Bbt {
    pub bar: i32,
    pub beat: i32,
    pub tick: i32,
    pub bar_start_tick: f64,
    pub beats_per_bar: f32,
    pub beat_type: f32,
    pub ticks_per_beat: f64,
    pub beats_per_minute: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct JackPosition {
    pub frame: u64,
    pub frame_rate: u32,
    pub state: TransportState,
    pub bbt: Option<Bbt>,
}

/// `position_to_jack` (spec §4.6): derive the JACK-facing position from a
/// driver `io_position`.
pub fn position_to_jack(io: &IoPosition, frame_rate: u32) -> JackPosition {
    let state = match io.state {
        IoPositionState::Stopped => TransportState::Stopped,
        IoPositionState::Starting => TransportState::Starting,
        IoPositionState::Running { looping: false } => TransportState::Rolling,
        IoPositionState::Running { looping: true } => TransportState::Looping,
    };

    let seg = &io.segment;
    let frame = if seg.duration > 0 && seg.rate > 0.0 {
        let elapsed = seg.position.saturating_sub(io.clock_offset);
        if elapsed < seg.duration {
            seg.start + (elapsed as f64 * seg.rate) as u64
        } else {
            seg.position
        }
    } else {
        seg.position
    };

    let bbt = if seg.owner != 0 && seg.bar_valid {
        let ticks_per_beat = TICKS_PER_BEAT;
        let total_beats = seg.beat;
        let beat_in_bar = total_beats.rem_euclid(seg.beats_per_bar as f64);
        let bar = seg.bar + (total_beats / seg.beats_per_bar as f64).floor() as i32;
        let beat = beat_in_bar.floor() as i32 + 1;
        let tick = ((beat_in_bar.fract()) * ticks_per_beat).round() as i32;
        Some(Bbt {
            bar,
            beat,
            tick,
            bar_start_tick: (bar as f64) * seg.beats_per_bar as f64 * ticks_per_beat,
            beats_per_bar: seg.beats_per_bar,
            beat_type: seg.beat_type,
            ticks_per_beat,
            beats_per_minute: 120.0,
        })
    } else {
        None
    };

    JackPosition {
        frame,
        frame_rate,
        state,
        bbt,
    }
}

/// `jack_to_position`, the inverse used by timebase owners: turn BBT
/// fields back into the segment's absolute beat position.
pub fn jack_to_position(bbt: &Bbt, seg: &mut Segment, bbt_offset_valid: bool) {
    if bbt_offset_valid {
        seg.bar = bbt.bar;
    }
    seg.beats_per_bar = bbt.beats_per_bar;
    seg.beat_type = bbt.beat_type;
    seg.ticks_per_beat = bbt.ticks_per_beat;
    seg.beat = (bbt.bar as f64) * bbt.beats_per_bar as f64
        + (bbt.beat - 1) as f64
        + bbt.tick as f64 / bbt.ticks_per_beat.max(1.0);
    seg.bar_valid = true;
}

/// Timebase owner election (spec §4.6): `install_timeowner` either
/// unconditionally overwrites `segment_owner` or CAS's from zero.
pub fn install_timeowner(segment_owner: &AtomicU32, node_id: u32, conditional: bool) -> bool {
    if conditional {
        segment_owner
            .compare_exchange(0, node_id, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    } else {
        segment_owner.store(node_id, Ordering::Release);
        true
    }
}

pub fn release_timebase(segment_owner: &AtomicU32, node_id: u32) -> bool {
    segment_owner
        .compare_exchange(node_id, 0, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(state: IoPositionState) -> IoPosition {
        IoPosition {
            state,
            clock_offset: 0,
            segment: Segment {
                start: 0,
                duration: 1_000_000,
                rate: 1.0,
                position: 1000,
                owner: 0,
                bar_valid: false,
                bar: 1,
                beats_per_bar: 4.0,
                beat_type: 4.0,
                ticks_per_beat: TICKS_PER_BEAT,
                beat: 0.0,
            },
        }
    }

    #[test]
    fn stopped_starting_rolling_looping_map_correctly() {
        assert_eq!(
            position_to_jack(&segment(IoPositionState::Stopped), 48000).state,
            TransportState::Stopped
        );
        assert_eq!(
            position_to_jack(&segment(IoPositionState::Starting), 48000).state,
            TransportState::Starting
        );
        assert_eq!(
            position_to_jack(&segment(IoPositionState::Running { looping: false }), 48000).state,
            TransportState::Rolling
        );
        assert_eq!(
            position_to_jack(&segment(IoPositionState::Running { looping: true }), 48000).state,
            TransportState::Looping
        );
    }

    #[test]
    fn bbt_absent_without_an_owner() {
        let pos = position_to_jack(&segment(IoPositionState::Running { looping: false }), 48000);
        assert!(pos.bbt.is_none());
    }

    #[test]
    fn bbt_present_with_owner_and_valid_bar() {
        let mut io = segment(IoPositionState::Running { looping: false });
        io.segment.owner = 5;
        io.segment.bar_valid = true;
        io.segment.beat = 5.5;
        let pos = position_to_jack(&io, 48000);
        let bbt = pos.bbt.unwrap();
        assert_eq!(bbt.bar, 2);
        assert_eq!(bbt.beat, 2);
    }

    #[test]
    fn timebase_conditional_install_only_when_unowned() {
        let owner = AtomicU32::new(0);
        assert!(install_timeowner(&owner, 3, true));
        assert!(!install_timeowner(&owner, 9, true));
        assert_eq!(owner.load(Ordering::Acquire), 3);
    }

    #[test]
    fn release_only_succeeds_for_the_current_owner() {
        let owner = AtomicU32::new(3);
        assert!(!release_timebase(&owner, 9));
        assert!(release_timebase(&owner, 3));
        assert_eq!(owner.load(Ordering::Acquire), 0);
    }
}
