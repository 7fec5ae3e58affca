//! Fixed tuning constants

use std::time::Duration;

/// Longest a client waits for a pending flip before assuming it did not happen
pub const DELAYED_FLIP_MODE_TIMEOUT: Duration = Duration::from_millis(200);

/// Palette changes applied per millisecond before further changes are coalesced
pub const MAX_PALETTE_UPDATES_PER_MS: u32 = 5;

/// Number of distinct user-mode display driver modules that can be hooked
pub const MAX_USER_MODE_DISPLAY_DRIVERS: usize = 3;

/// Period of the primary surface update thread
pub const UPDATE_INTERVAL: Duration = Duration::from_millis(5);

/// Largest number of primitives merged into a single batched draw
pub const MAX_BATCH_PRIMITIVES: u32 = 0x1_0000;

/// Largest shadow vertex buffer a batch may grow to
pub const MAX_BATCH_VERTEX_BYTES: usize = 1024 * 1024;
