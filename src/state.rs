/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! Process-wide ambient state (spec §9 "Ambient global state"): the JACK
//! ABI hands out opaque `jack_client_t*` handles, so *something* has to
//! own a process-wide table from handle to client. Kept to the minimum
//! the ABI boundary requires; everything else is threaded through
//! explicitly rather than reached for globally.

use crate::client::Client;
use crate::metadata::DescriptionTable;
use dashmap::DashMap;
use lazy_static::lazy_static;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

lazy_static! {
    static ref CLIENTS: DashMap<u64, Client> = DashMap::new();
    static ref NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);
    /// Metadata is a process-wide table (spec §4.9): it outlives any one
    /// client and is addressed by UUID, not by handle.
    static ref DESCRIPTIONS: Mutex<DescriptionTable> = Mutex::new(DescriptionTable::default());
    /// Count of clients currently using the shim's one-shot logging init
    /// (SPEC_FULL §A.2); used only to decide whether to tear it down, we
    /// never actually tear tracing down once installed.
    static ref ACTIVE_CLIENTS: AtomicI32 = AtomicI32::new(0);
}

/// Opaque handle returned to the ABI layer in place of a raw pointer; kept
/// as a plain `u64` so the ABI can box/unbox it behind `as *mut c_void`
/// without this module knowing about raw pointers at all.
pub type ClientHandle = u64;

pub fn insert_client(client: Client) -> ClientHandle {
    let handle = NEXT_HANDLE.fetch_add(1, Ordering::AcqRel);
    ACTIVE_CLIENTS.fetch_add(1, Ordering::AcqRel);
    CLIENTS.insert(handle, client);
    handle
}

pub fn with_client<R>(handle: ClientHandle, f: impl FnOnce(&mut Client) -> R) -> Option<R> {
    CLIENTS.get_mut(&handle).map(|mut c| f(&mut c))
}

pub fn remove_client(handle: ClientHandle) -> Option<Client> {
    let removed = CLIENTS.remove(&handle).map(|(_, c)| c);
    if removed.is_some() {
        ACTIVE_CLIENTS.fetch_sub(1, Ordering::AcqRel);
    }
    removed
}

pub fn active_client_count() -> i32 {
    ACTIVE_CLIENTS.load(Ordering::Acquire)
}

pub fn with_descriptions<R>(f: impl FnOnce(&mut DescriptionTable) -> R) -> R {
    let mut guard = DESCRIPTIONS.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pwcore::FakeCore;

    #[test]
    fn insert_lookup_remove_round_trip() {
        let client = Client::new(Box::new(FakeCore::new()), Config::default(), "t".into()).unwrap();
        let before = active_client_count();
        let handle = insert_client(client);
        assert_eq!(active_client_count(), before + 1);
        assert!(with_client(handle, |_| ()).is_some());
        assert!(remove_client(handle).is_some());
        assert_eq!(active_client_count(), before);
        assert!(with_client(handle, |_| ()).is_none());
    }
}
