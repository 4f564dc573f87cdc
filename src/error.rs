/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! Crate-wide error type and the POSIX-errno mapping the ABI layer needs.

use miette::Diagnostic;
use thiserror::Error;

/// Every fallible internal operation returns this. The ABI layer is the
/// only place that flattens it back down to `errno`/null-return
/// conventions (spec §7).
#[derive(Error, Diagnostic, Debug)]
pub enum ShimError {
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("resource exhausted: {0}")]
    Exhausted(String),

    #[error("invalid client or port state: {0}")]
    State(String),

    #[error("PipeWire peer failure: {0}")]
    PeerFailure(String),

    #[error("self-connect policy rejected the connection")]
    SelfConnectRejected,

    #[error("failed to map buffer memory: {0}")]
    Mapping(String),

    #[error("regex compile error: {0}")]
    Regex(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("string contained an interior NUL byte")]
    NulByte(#[from] std::ffi::NulError),
}

pub type ShimResult<T> = Result<T, ShimError>;

/// The JACK status bits returned out-of-band via `jack_status_t*`.
bitflags::bitflags! {
    pub struct JackStatus: u32 {
        const FAILURE       = 0x01;
        const INVALID_OPTION = 0x02;
        const NAME_NOT_UNIQUE = 0x04;
        const SERVER_STARTED = 0x08;
        const SERVER_FAILED  = 0x10;
        const SERVER_ERROR   = 0x20;
        const NO_SUCH_CLIENT = 0x40;
        const LOAD_FAILURE   = 0x80;
        const INIT_FAILURE   = 0x100;
        const SHM_FAILURE    = 0x200;
        const VERSION_ERROR  = 0x400;
        const BACKEND_ERROR  = 0x800;
        const CLIENT_ZOMBIE  = 0x1000;
    }
}

impl ShimError {
    /// Negative POSIX `errno` value as returned by most JACK functions.
    pub fn errno(&self) -> i32 {
        match self {
            ShimError::Argument(_) => -libc::EINVAL,
            ShimError::Exhausted(_) => -libc::ENOSPC,
            ShimError::State(_) => -libc::EIO,
            ShimError::PeerFailure(_) => -libc::EPIPE,
            ShimError::SelfConnectRejected => -libc::EPERM,
            ShimError::Mapping(_) => -libc::EIO,
            ShimError::Regex(_) => -libc::EINVAL,
            ShimError::Io(_) => -libc::EIO,
            ShimError::NulByte(_) => -libc::EINVAL,
        }
    }

    pub fn jack_status(&self) -> JackStatus {
        match self {
            ShimError::PeerFailure(_) => JackStatus::FAILURE | JackStatus::SERVER_ERROR,
            ShimError::State(_) => JackStatus::FAILURE,
            _ => JackStatus::FAILURE,
        }
    }
}
