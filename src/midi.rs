/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! MIDI codec (spec §4.3, §6): the JACK `midi_buffer` layout, a
//! time-stamped `Sequence` POD used as the wire format between mixes, and
//! priority-aware event ordering.

pub const MIDI_MAGIC: u32 = 0x900d_f00d;
const HEADER_LEN: usize = 24;
const EVENT_RECORD_LEN: usize = 8;
const INLINE_CAP: usize = 4;

#[derive(Debug, Clone)]
pub struct MidiEvent {
    pub time: u16,
    pub data: Vec<u8>,
}

/// A parsed `jack_midi_buffer_t`.
#[derive(Debug, Clone)]
pub struct MidiBuffer {
    pub buffer_size: u32,
    pub nframes: u32,
    pub write_pos: u32,
    pub lost_events: u32,
    events: Vec<MidiEvent>,
    /// Bytes already consumed from the back of the buffer by payloads.
    tail_used: u32,
}

impl MidiBuffer {
    pub fn new(buffer_size: u32, nframes: u32) -> Self {
        MidiBuffer {
            buffer_size,
            nframes,
            write_pos: 0,
            lost_events: 0,
            events: Vec::new(),
            tail_used: 0,
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    fn header_and_event_table_len(&self) -> u32 {
        HEADER_LEN as u32 + self.events.len() as u32 * EVENT_RECORD_LEN as u32
    }

    /// Remaining bytes available for a new event, accounting for one
    /// *future* event record (spec §4.3).
    pub fn max_event_size(&self) -> u32 {
        let used = self.header_and_event_table_len() + EVENT_RECORD_LEN as u32 + self.tail_used;
        self.buffer_size.saturating_sub(used)
    }

    /// `jack_midi_event_reserve`: returns the index of the reserved event
    /// on success.
    pub fn event_reserve(&mut self, time: u32, data_size: u32) -> Result<usize, ()> {
        if time >= self.nframes || data_size == 0 {
            self.lost_events += 1;
            return Err(());
        }
        if let Some(last) = self.events.last() {
            if (time as u16) < last.time {
                self.lost_events += 1;
                return Err(());
            }
        }
        let extra_tail = if data_size as usize > INLINE_CAP {
            data_size
        } else {
            0
        };
        if extra_tail > self.max_event_size() {
            self.lost_events += 1;
            return Err(());
        }
        self.tail_used += extra_tail;
        self.events.push(MidiEvent {
            time: time as u16,
            data: vec![0u8; data_size as usize],
        });
        Ok(self.events.len() - 1)
    }

    pub fn event_write(&mut self, index: usize, bytes: &[u8]) {
        if let Some(ev) = self.events.get_mut(index) {
            let n = bytes.len().min(ev.data.len());
            ev.data[..n].copy_from_slice(&bytes[..n]);
        }
    }

    pub fn event_get(&self, index: usize) -> Option<&MidiEvent> {
        self.events.get(index)
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.tail_used = 0;
        self.write_pos = 0;
        self.lost_events = 0;
    }

    /// Rewrite `NoteOn vel=0` as `NoteOff vel=0x40` (spec §8 scenario 2,
    /// `jack.fix-midi-events`).
    pub fn fix_note_on_zero_velocity(&mut self) {
        for ev in &mut self.events {
            if ev.data.len() == 3 {
                let status = ev.data[0] & 0xF0;
                if status == 0x90 && ev.data[2] == 0x00 {
                    ev.data[0] = 0x80 | (ev.data[0] & 0x0F);
                    ev.data[2] = 0x40;
                }
            }
        }
    }
}

/// Channel-message precedence used when merging simultaneous events on
/// the same MIDI channel (spec §4.2): controller > program-change >
/// note-off > note-on > aftertouch > channel-pressure > pitch-bend.
fn priority(status: u8) -> u8 {
    match status & 0xF0 {
        0xB0 => 0, // controller
        0xC0 => 1, // program change
        0x80 => 2, // note off
        0x90 => 3, // note on
        0xA0 => 4, // aftertouch (poly key pressure)
        0xD0 => 5, // channel pressure
        0xE0 => 6, // pitch bend
        _ => 7,
    }
}

/// Merge several `Sequence`s (already-linearised event streams, one per
/// connected peer) into offset order, breaking ties on the priority
/// table above for same-channel messages (spec §4.2).
pub fn merge_sequences(mut sequences: Vec<Vec<MidiEvent>>) -> Vec<MidiEvent> {
    let mut merged: Vec<MidiEvent> = sequences.drain(..).flatten().collect();
    merged.sort_by(|a, b| {
        a.time.cmp(&b.time).then_with(|| {
            let pa = a.data.first().map(|b| priority(*b)).unwrap_or(7);
            let pb = b.data.first().map(|b| priority(*b)).unwrap_or(7);
            pa.cmp(&pb)
        })
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_zero_size_is_rejected_and_counted() {
        let mut buf = MidiBuffer::new(1024, 64);
        assert!(buf.event_reserve(0, 0).is_err());
        assert_eq!(buf.lost_events, 1);
    }

    #[test]
    fn reserve_at_or_past_nframes_is_rejected() {
        let mut buf = MidiBuffer::new(1024, 64);
        assert!(buf.event_reserve(64, 3).is_err());
    }

    #[test]
    fn time_must_be_non_decreasing() {
        let mut buf = MidiBuffer::new(1024, 64);
        buf.event_reserve(10, 3).unwrap();
        assert!(buf.event_reserve(5, 3).is_err());
    }

    #[test]
    fn events_are_non_decreasing_and_nonempty() {
        let mut buf = MidiBuffer::new(1024, 64);
        buf.event_reserve(1, 3).unwrap();
        buf.event_reserve(1, 3).unwrap();
        buf.event_reserve(5, 8).unwrap();
        for w in 0..buf.event_count() - 1 {
            let a = buf.event_get(w).unwrap();
            let b = buf.event_get(w + 1).unwrap();
            assert!(a.time <= b.time);
            assert!(!a.data.is_empty());
        }
    }

    #[test]
    fn note_on_zero_velocity_becomes_note_off() {
        let mut buf = MidiBuffer::new(1024, 64);
        let idx = buf.event_reserve(0, 3).unwrap();
        buf.event_write(idx, &[0x90, 0x3C, 0x00]);
        buf.fix_note_on_zero_velocity();
        assert_eq!(buf.event_get(0).unwrap().data, vec![0x80, 0x3C, 0x40]);
    }

    #[test]
    fn merge_orders_by_offset_then_priority() {
        let note_on = MidiEvent {
            time: 0,
            data: vec![0x90, 1, 1],
        };
        let controller = MidiEvent {
            time: 0,
            data: vec![0xB0, 1, 1],
        };
        let merged = merge_sequences(vec![vec![note_on], vec![controller]]);
        assert_eq!(merged[0].data[0] & 0xF0, 0xB0);
        assert_eq!(merged[1].data[0] & 0xF0, 0x90);
    }
}
