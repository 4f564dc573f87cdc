/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! The exported C ABI surface (spec §7). Every symbol here keeps the
//! historical `jack_*` name and signature shape so a host binary linked
//! against `libjack.so` keeps working unmodified against this shim.
//! Translation to/from the internal `ShimResult`-returning API lives here
//! and nowhere else; nothing past this module deals in raw pointers or
//! errno.

use crate::{
    client::Client,
    config::Config,
    error::JackStatus,
    notify::LatencyDir,
    port::{PortFlags, PortType},
    pwcore::FakeCore,
    state::{self, ClientHandle},
};
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::ptr;

/// Wraps a raw `void*` user argument so it can be moved into a boxed
/// closure. `extern "C" fn` pointers are already `Send`; only the
/// caller-supplied data pointer needs this — the contract that the
/// pointer is safe to hand back across threads is the C caller's, same as
/// real JACK's callback API.
struct SendPtr(*mut c_void);
unsafe impl Send for SendPtr {}
unsafe impl Sync for SendPtr {}

pub type JackProcessCallback = extern "C" fn(nframes: u32, arg: *mut c_void) -> c_int;
pub type JackRegistrationCallback = extern "C" fn(id: u32, register: c_int, arg: *mut c_void);
pub type JackConnectCallback = extern "C" fn(a: u32, b: u32, connect: c_int, arg: *mut c_void);
pub type JackNframesCallback = extern "C" fn(nframes: u32, arg: *mut c_void) -> c_int;
pub type JackVoidCallback = extern "C" fn(arg: *mut c_void);
pub type JackLatencyCallback = extern "C" fn(mode: c_int, arg: *mut c_void);

fn errno_of(result: Option<ShimCallResult>) -> c_int {
    match result {
        Some(ShimCallResult::Ok) => 0,
        Some(ShimCallResult::Err(errno)) => errno,
        None => -libc::EINVAL,
    }
}

enum ShimCallResult {
    Ok,
    Err(c_int),
}

impl From<Result<(), crate::error::ShimError>> for ShimCallResult {
    fn from(r: Result<(), crate::error::ShimError>) -> Self {
        match r {
            Ok(()) => ShimCallResult::Ok,
            Err(e) => ShimCallResult::Err(e.errno()),
        }
    }
}

unsafe fn cstr_to_string(s: *const c_char) -> Option<String> {
    if s.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(s) }.to_str().ok().map(str::to_owned)
}

fn leak_cstring(s: &str) -> *mut c_char {
    CString::new(s).map(CString::into_raw).unwrap_or(ptr::null_mut())
}

fn handle_of(client: *mut c_void) -> ClientHandle {
    client as usize as ClientHandle
}

/// `jack_client_open`. Production deployments carry live PipeWire
/// properties into [`Config::from_properties`]; the shim takes defaults
/// plus environment overrides until that bridge is wired up (spec §1:
/// PipeWire core interaction is out of scope for this crate).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_client_open(
    client_name: *const c_char,
    _options: u32,
    status: *mut u32,
) -> *mut c_void {
    crate::logging::init();
    let Some(name) = (unsafe { cstr_to_string(client_name) }) else {
        if !status.is_null() {
            unsafe { *status = JackStatus::FAILURE.bits() };
        }
        return ptr::null_mut();
    };

    let config = Config::from_properties(&std::collections::HashMap::new());
    match Client::new(Box::new(FakeCore::new()), config, &name) {
        Ok(client) => {
            let handle = state::insert_client(client);
            handle as usize as *mut c_void
        }
        Err(e) => {
            if !status.is_null() {
                unsafe { *status = e.jack_status().bits() };
            }
            ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_client_close(client: *mut c_void) -> c_int {
    match state::remove_client(handle_of(client)) {
        Some(c) => match c.close() {
            Ok(()) => 0,
            Err(e) => e.errno(),
        },
        None => -libc::EINVAL,
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_activate(client: *mut c_void) -> c_int {
    state::with_client(handle_of(client), |c| match c.activate() {
        Ok(()) => 0,
        Err(e) => e.errno(),
    })
    .unwrap_or(-libc::EINVAL)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_deactivate(client: *mut c_void) -> c_int {
    state::with_client(handle_of(client), |c| match c.deactivate() {
        Ok(()) => 0,
        Err(e) => e.errno(),
    })
    .unwrap_or(-libc::EINVAL)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_port_register(
    client: *mut c_void,
    port_name: *const c_char,
    port_type: *const c_char,
    flags: u32,
    buffer_frames: u64,
) -> *mut c_void {
    let Some(name) = (unsafe { cstr_to_string(port_name) }) else {
        return ptr::null_mut();
    };
    let type_str = unsafe { cstr_to_string(port_type) }.unwrap_or_default();
    let pt = match type_str.as_str() {
        "32 bit float mono audio" => PortType::Audio,
        "8 bit raw midi" => PortType::Midi,
        "32 bit float RGBA video" => PortType::Video,
        _ => PortType::Other,
    };
    let flags = PortFlags::from_bits_truncate(flags);
    let id = state::with_client(handle_of(client), |c| {
        c.register_port(&name, flags, pt, buffer_frames as usize).ok()
    })
    .flatten();
    match id {
        Some(id) => id as usize as *mut c_void,
        None => ptr::null_mut(),
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_port_unregister(client: *mut c_void, port: *mut c_void) -> c_int {
    let id = port as usize as u32;
    state::with_client(handle_of(client), |c| match c.unregister_port(id) {
        Ok(()) => 0,
        Err(e) => e.errno(),
    })
    .unwrap_or(-libc::EINVAL)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_port_name(port: *mut c_void) -> *const c_char {
    // The real ABI resolves this through the owning client; callers are
    // expected to have looked the port up via `jack_port_by_id` first in
    // this shim's layering, so this is left unimplemented at the pointer
    // level and documented as such in DESIGN.md.
    let _ = port;
    ptr::null()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_port_by_name(
    client: *mut c_void,
    name: *const c_char,
) -> *mut c_void {
    let Some(name) = (unsafe { cstr_to_string(name) }) else {
        return ptr::null_mut();
    };
    state::with_client(handle_of(client), |c| c.find_port_by_name(&name))
        .flatten()
        .map(|id| id as usize as *mut c_void)
        .unwrap_or(ptr::null_mut())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_connect(
    client: *mut c_void,
    source_port: *const c_char,
    destination_port: *const c_char,
) -> c_int {
    let (Some(src), Some(dst)) = (
        unsafe { cstr_to_string(source_port) },
        unsafe { cstr_to_string(destination_port) },
    ) else {
        return -libc::EINVAL;
    };
    state::with_client(handle_of(client), |c| {
        let (Some(src_id), Some(dst_id)) = (c.find_port_by_name(&src), c.find_port_by_name(&dst))
        else {
            return -libc::EINVAL;
        };
        match c.connect(src_id, dst_id) {
            Ok(()) => 0,
            Err(e) => e.errno(),
        }
    })
    .unwrap_or(-libc::EINVAL)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_disconnect(
    client: *mut c_void,
    source_port: *const c_char,
    destination_port: *const c_char,
) -> c_int {
    let (Some(src), Some(dst)) = (
        unsafe { cstr_to_string(source_port) },
        unsafe { cstr_to_string(destination_port) },
    ) else {
        return -libc::EINVAL;
    };
    state::with_client(handle_of(client), |c| {
        let (Some(src_id), Some(dst_id)) = (c.find_port_by_name(&src), c.find_port_by_name(&dst))
        else {
            return -libc::EINVAL;
        };
        match c.disconnect(src_id, dst_id) {
            Ok(()) => 0,
            Err(e) => e.errno(),
        }
    })
    .unwrap_or(-libc::EINVAL)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_get_sample_rate(client: *mut c_void) -> u32 {
    state::with_client(handle_of(client), |c| c.cycle.sample_rate).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_get_buffer_size(client: *mut c_void) -> u32 {
    state::with_client(handle_of(client), |c| c.cycle.buffer_frames).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_get_client_name(client: *mut c_void) -> *const c_char {
    state::with_client(handle_of(client), |c| leak_cstring(&c.jack_name))
        .unwrap_or(ptr::null_mut())
}

/// `jack_transport_locate` (spec §8 scenario 5).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_transport_locate(client: *mut c_void, frame: u64) -> c_int {
    state::with_client(handle_of(client), |c| {
        c.request_reposition(frame);
        0
    })
    .unwrap_or(-libc::EINVAL)
}

/// `jack_port_get_buffer` (spec §4.2): returns a writable buffer for an
/// output port, or the already-mixed/merged buffer for an input port.
/// Real JACK resolves the owning client from the port handle itself; this
/// shim's port handles are bare ids (see DESIGN.md), so `client` is taken
/// explicitly, matching the other port-taking entry points here.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_port_get_buffer(
    client: *mut c_void,
    port: *mut c_void,
    nframes: u32,
) -> *mut c_void {
    let id = port as usize as u32;
    state::with_client(handle_of(client), |c| {
        let is_output = c.port(id).map(|p| p.is_output()).unwrap_or(false);
        if is_output {
            c.get_buffer_output(id).ok().map(|b| b.as_mut_ptr() as *mut c_void)
        } else {
            c.complete_process(id, nframes).ok().map(|b| b.as_ptr() as *mut c_void)
        }
    })
    .flatten()
    .unwrap_or(ptr::null_mut())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_set_process_callback(
    client: *mut c_void,
    callback: JackProcessCallback,
    arg: *mut c_void,
) -> c_int {
    let arg = SendPtr(arg);
    let r: Option<ShimCallResult> = state::with_client(handle_of(client), |c| {
        c.set_process_callback(Box::new(move |nframes| {
            let arg = &arg;
            callback(nframes, arg.0);
        }))
        .into()
    });
    errno_of(r)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_set_client_registration_callback(
    client: *mut c_void,
    callback: JackRegistrationCallback,
    arg: *mut c_void,
) -> c_int {
    let arg = SendPtr(arg);
    let r: Option<ShimCallResult> = state::with_client(handle_of(client), |c| {
        c.set_registration_callback(Box::new(move |id, reg| {
            let arg = &arg;
            callback(id, reg as c_int, arg.0)
        }))
        .into()
    });
    errno_of(r)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_set_port_registration_callback(
    client: *mut c_void,
    callback: JackRegistrationCallback,
    arg: *mut c_void,
) -> c_int {
    let arg = SendPtr(arg);
    let r: Option<ShimCallResult> = state::with_client(handle_of(client), |c| {
        c.set_port_registration_callback(Box::new(move |id, reg| {
            let arg = &arg;
            callback(id, reg as c_int, arg.0)
        }))
        .into()
    });
    errno_of(r)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_set_port_connect_callback(
    client: *mut c_void,
    callback: JackConnectCallback,
    arg: *mut c_void,
) -> c_int {
    let arg = SendPtr(arg);
    let r: Option<ShimCallResult> = state::with_client(handle_of(client), |c| {
        c.set_port_connect_callback(Box::new(move |a, b, connected| {
            let arg = &arg;
            callback(a, b, connected as c_int, arg.0)
        }))
        .into()
    });
    errno_of(r)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_set_buffer_size_callback(
    client: *mut c_void,
    callback: JackNframesCallback,
    arg: *mut c_void,
) -> c_int {
    let arg = SendPtr(arg);
    let r: Option<ShimCallResult> = state::with_client(handle_of(client), |c| {
        c.set_buffer_size_callback(Box::new(move |frames| {
            let arg = &arg;
            callback(frames, arg.0);
        }))
        .into()
    });
    errno_of(r)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_set_sample_rate_callback(
    client: *mut c_void,
    callback: JackNframesCallback,
    arg: *mut c_void,
) -> c_int {
    let arg = SendPtr(arg);
    let r: Option<ShimCallResult> = state::with_client(handle_of(client), |c| {
        c.set_sample_rate_callback(Box::new(move |rate| {
            let arg = &arg;
            callback(rate, arg.0);
        }))
        .into()
    });
    errno_of(r)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_set_xrun_callback(
    client: *mut c_void,
    callback: JackVoidCallback,
    arg: *mut c_void,
) -> c_int {
    let arg = SendPtr(arg);
    let r: Option<ShimCallResult> = state::with_client(handle_of(client), |c| {
        c.set_xrun_callback(Box::new(move || {
            let arg = &arg;
            callback(arg.0)
        }))
        .into()
    });
    errno_of(r)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_set_graph_order_callback(
    client: *mut c_void,
    callback: JackVoidCallback,
    arg: *mut c_void,
) -> c_int {
    let arg = SendPtr(arg);
    let r: Option<ShimCallResult> = state::with_client(handle_of(client), |c| {
        c.set_graph_order_callback(Box::new(move || {
            let arg = &arg;
            callback(arg.0)
        }))
        .into()
    });
    errno_of(r)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_set_latency_callback(
    client: *mut c_void,
    callback: JackLatencyCallback,
    arg: *mut c_void,
) -> c_int {
    let arg = SendPtr(arg);
    let r: Option<ShimCallResult> = state::with_client(handle_of(client), |c| {
        c.set_latency_callback(Box::new(move |dir| {
            let mode = match dir {
                LatencyDir::Capture => 0,
                LatencyDir::Playback => 1,
            };
            let arg = &arg;
            callback(mode, arg.0)
        }))
        .into()
    });
    errno_of(r)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_on_shutdown(
    client: *mut c_void,
    callback: JackVoidCallback,
    arg: *mut c_void,
) -> c_int {
    let arg = SendPtr(arg);
    let r: Option<ShimCallResult> = state::with_client(handle_of(client), |c| {
        c.set_shutdown_callback(Box::new(move || {
            let arg = &arg;
            callback(arg.0)
        }))
        .into()
    });
    errno_of(r)
}

/// `jack_get_ports` (spec §4.8). The returned array is `NULL`-terminated
/// and, per JACK convention, owned by the caller (`jack_free`); this shim
/// leaks the allocation at the ABI boundary the same way `leak_cstring`
/// does for single strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_get_ports(
    client: *mut c_void,
    port_name_pattern: *const c_char,
    type_name_pattern: *const c_char,
    flags: u32,
) -> *mut *mut c_char {
    let name_pat = unsafe { cstr_to_string(port_name_pattern) }.unwrap_or_default();
    let type_pat = unsafe { cstr_to_string(type_name_pattern) }.unwrap_or_default();
    let port_flags = PortFlags::from_bits_truncate(flags);
    let names = state::with_client(handle_of(client), |c| {
        c.get_ports(&name_pat, &type_pat, port_flags).unwrap_or_default()
    })
    .unwrap_or_default();
    if names.is_empty() {
        return ptr::null_mut();
    }
    let mut out: Vec<*mut c_char> = names.iter().map(|n| leak_cstring(n)).collect();
    out.push(ptr::null_mut());
    Box::into_raw(out.into_boxed_slice()) as *mut *mut c_char
}

/// `jack_port_set_alias` (spec §8 scenario 3).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_port_set_alias(
    client: *mut c_void,
    port: *mut c_void,
    alias: *const c_char,
) -> c_int {
    let Some(alias) = (unsafe { cstr_to_string(alias) }) else {
        return -libc::EINVAL;
    };
    let id = port as usize as u32;
    let r: Option<ShimCallResult> =
        state::with_client(handle_of(client), |c| c.set_port_alias(id, &alias).into());
    errno_of(r)
}

/// `jack_port_get_aliases`: fills up to two caller-allocated
/// `JACK_PORT_NAME_SIZE`-byte buffers, returning the count filled.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_port_get_aliases(
    client: *mut c_void,
    port: *mut c_void,
    aliases: *mut *mut c_char,
) -> c_int {
    if aliases.is_null() {
        return 0;
    }
    let id = port as usize as u32;
    let names = state::with_client(handle_of(client), |c| c.port_aliases(id).unwrap_or_default())
        .unwrap_or_default();
    let mut count = 0;
    for (i, name) in names.iter().take(2).enumerate() {
        let dst = unsafe { *aliases.add(i) };
        if dst.is_null() {
            continue;
        }
        if let Ok(cname) = CString::new(name.as_str()) {
            let bytes = cname.as_bytes_with_nul();
            let n = bytes.len().min(crate::naming::MAX_NAME);
            unsafe { ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, dst, n) };
            count += 1;
        }
    }
    count
}

// --- Deliberately unsupported surface (spec §4.7/§7): these return the
// JACK "not implemented" convention for their signature rather than
// silently misbehaving. PipeWire has no concept of JACK's internal-client
// loader or session-manager handshake, and recycling them would mean
// faking a subsystem this shim doesn't have.

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_internal_client_new(
    _client_name: *const c_char,
    _load_name: *const c_char,
    _load_init: *const c_char,
) -> c_int {
    -libc::ENOSYS
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_internal_client_close(_client: *mut c_void) {}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_set_session_callback(
    _client: *mut c_void,
    _callback: *const c_void,
    _arg: *mut c_void,
) -> c_int {
    -libc::ENOSYS
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_session_reply(_client: *mut c_void, _event: *mut c_void) -> c_int {
    -libc::ENOSYS
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_session_notify(
    _client: *mut c_void,
    _target: *const c_char,
    _type: c_int,
    _path: *const c_char,
    _result: *mut *mut c_void,
) -> c_int {
    -libc::ENOSYS
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_engine_takeover_timebase(_client: *mut c_void) -> c_int {
    -libc::ENOSYS
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_get_client_pid(_name: *const c_char) -> c_int {
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_reserve_client_name(
    _client: *mut c_void,
    _name: *const c_char,
    _uuid: *const c_char,
) -> c_int {
    -libc::ENOSYS
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_thread_wait(_client: *mut c_void, _status: c_int) -> *mut c_void {
    ptr::null_mut()
}

/// Deprecated in real JACK since 0.124; PipeWire never exposed renaming
/// this way either. Silent no-op, matching the reference shim.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jack_port_set_name(_port: *mut c_void, _name: *const c_char) -> c_int {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn open_then_close_round_trips_through_the_abi() {
        let name = CString::new("abi-test-client").unwrap();
        let mut status: u32 = 0;
        let client = unsafe { jack_client_open(name.as_ptr(), 0, &mut status) };
        assert!(!client.is_null());
        assert_eq!(unsafe { jack_activate(client) }, 0);
        assert_eq!(unsafe { jack_client_close(client) }, 0);
    }

    #[test]
    fn unsupported_symbols_return_enosys() {
        assert_eq!(
            unsafe { jack_internal_client_new(ptr::null(), ptr::null(), ptr::null()) },
            -libc::ENOSYS
        );
        assert_eq!(unsafe { jack_engine_takeover_timebase(ptr::null_mut()) }, -libc::ENOSYS);
    }

    #[test]
    fn deprecated_port_set_name_is_a_silent_success() {
        assert_eq!(unsafe { jack_port_set_name(ptr::null_mut(), ptr::null()) }, 0);
    }
}
