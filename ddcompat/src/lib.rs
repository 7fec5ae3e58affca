//! DirectDraw compatibility shim
//!
//! This crate is loaded in place of `ddraw.dll`. It forwards the library's exports to the system
//! implementation and intercepts the user-mode display driver tables behind it, so that legacy
//! DirectDraw clients keep their original surface, palette, blit and timing behavior on modern
//! drivers.
//!
//! The portable core (hooks, dispatch tables, the device proxy and the primary surface) builds
//! and tests on every platform; only the library entry in `dll` is Windows specific.

#![allow(non_snake_case)]
#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]

pub mod config;
pub mod ddi;
pub mod diag;
pub mod error;
pub mod exports;
pub mod flags;
pub mod gdi;
pub mod hook;
pub mod primary;
pub mod shim;
pub mod vtable;

#[cfg(all(windows, any(target_arch = "x86", target_arch = "x86_64")))]
mod dll;

pub use diag::{DiagnosticSink, LogOnce, RecordingSink};
pub use error::{HResult, HookError, ResourceError, ShimError, HRESULT};
pub use hook::{HookRegistry, HookTarget, InstallKind};
pub use primary::{PrimaryState, PrimarySurface};
pub use shim::Shim;
pub use vtable::{InterfaceDesc, Interceptor, Substitutes};
