/*
 *  Copyright (C) 2026 The PipeWire JACK Shim Contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the MIT license. See the LICENSE file for details.
 */

//! One-shot logging init (SPEC_FULL §A.2). The shim is loaded into a host
//! process we don't control, so `jack_client_open` installs a subscriber
//! at most once, controlled by `PIPEWIRE_DEBUG`/`RUST_LOG`, and every
//! later `jack_client_open` call is a silent no-op.

use std::sync::Once;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

static INIT: Once = Once::new();

pub fn init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::WARN.into())
                    .with_env_var("PIPEWIRE_DEBUG")
                    .from_env_lossy(),
            )
            .try_init();
    });
}
