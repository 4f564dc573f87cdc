/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! Thread utilities shim (spec §4.11): lets a client hand an arbitrary
//! worker thread the same realtime scheduling the JACK process thread
//! gets, without requiring that thread be created by us.

use thread_priority::{
    NormalThreadSchedulePolicy, RealtimeThreadSchedulePolicy, ThreadPriority, ThreadPriorityValue,
    ThreadSchedulePolicy, set_thread_priority_and_policy, thread_native_id,
};
use tracing::{info, warn};

/// `jack_acquire_real_time_scheduling` (spec §4.11): apply FIFO realtime
/// scheduling to the *calling* thread at the given JACK priority (1-100,
/// clamped to the platform's realtime range).
pub fn acquire_real_time_scheduling(priority: i32) -> Result<(), String> {
    let id = thread_native_id();
    let value = ThreadPriorityValue::try_from(priority.clamp(1, 99) as u8)
        .map_err(|e| format!("invalid priority {priority}: {e:?}"))?;
    set_thread_priority_and_policy(
        id,
        ThreadPriority::Crossplatform(value),
        ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
    )
    .map_err(|e| {
        warn!("could not acquire realtime scheduling for thread {id}: {e}");
        e.to_string()
    })?;
    info!("thread {id} acquired realtime FIFO priority {priority}");
    Ok(())
}

/// `jack_drop_real_time_scheduling`: fall back to the default `SCHED_OTHER`
/// policy at normal priority.
pub fn drop_real_time_scheduling() -> Result<(), String> {
    let id = thread_native_id();
    let value = ThreadPriorityValue::try_from(0u8).map_err(|e| format!("invalid priority 0: {e:?}"))?;
    set_thread_priority_and_policy(
        id,
        ThreadPriority::Crossplatform(value),
        ThreadSchedulePolicy::Normal(NormalThreadSchedulePolicy::Other),
    )
    .map_err(|e| e.to_string())
}

/// `jack_client_max_real_time_priority`/`jack_client_real_time_priority`
/// (spec §4.11): report the ceiling the shim will request, derived from
/// configuration rather than a live server query.
pub fn max_real_time_priority(configured: i32) -> i32 {
    configured.clamp(1, 99)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_real_time_priority_is_clamped_to_platform_range() {
        assert_eq!(max_real_time_priority(150), 99);
        assert_eq!(max_real_time_priority(0), 1);
        assert_eq!(max_real_time_priority(88), 88);
    }
}
