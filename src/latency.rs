/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! Latency propagation (spec §4.10).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatencyInfo {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyDirection {
    Capture,
    Playback,
}

impl LatencyInfo {
    pub fn combine_start() -> Self {
        LatencyInfo {
            min: u32::MAX,
            max: 0,
        }
    }

    /// Fold `other`'s direction-latency, plus `extra` frames contributed
    /// by the combining node itself, into `self`.
    pub fn combine(&mut self, other: LatencyInfo, extra: u32) {
        self.min = self.min.min(other.min + extra);
        self.max = self.max.max(other.max + extra);
    }

    pub fn combine_finish(&mut self) {
        if self.min == u32::MAX {
            *self = LatencyInfo::default();
        }
    }
}

/// Recompute the aggregate latency for one direction across a set of
/// upstream per-port latencies, each contributing `extra` frames of its
/// own processing (spec §4.10's combine_start/combine/combine_finish
/// sequence).
pub fn combine_all(parts: impl IntoIterator<Item = LatencyInfo>, extra: u32) -> LatencyInfo {
    let mut acc = LatencyInfo::combine_start();
    let mut any = false;
    for p in parts {
        acc.combine(p, extra);
        any = true;
    }
    acc.combine_finish();
    if !any {
        acc = LatencyInfo::default();
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_folds_min_and_max_with_extra_offset() {
        let combined = combine_all(
            [LatencyInfo { min: 10, max: 20 }, LatencyInfo { min: 5, max: 30 }],
            4,
        );
        assert_eq!(combined.min, 9);
        assert_eq!(combined.max, 34);
    }

    #[test]
    fn combine_of_nothing_is_zero() {
        let combined = combine_all([], 4);
        assert_eq!(combined, LatencyInfo::default());
    }
}
