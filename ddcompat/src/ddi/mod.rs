//! User-mode display driver interface
//!
//! The runtime talks to the display driver through `D3DDDI_ADAPTERFUNCS` and
//! `D3DDDI_DEVICEFUNCS`. The shim patches both tables as the driver fills them in, and every
//! patched entry point lands in [`thunks`], which routes the call to the adapter or device proxy.

mod adapter;
mod color_key;
mod device;
mod draw;
mod driver;
mod resource;
pub mod funcs;
pub mod thunks;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{Adapter, AdapterFuncs, AdapterRegistry};
pub use color_key::{emulate_src_color_key_blt, probe_src_color_key, BltSurface};
pub use device::{Device, DeviceRegistry, DeviceServices, KernelThunks, SystemKernelThunks};
pub use draw::{DrawBatcher, StreamSource};
pub use driver::{DriverDevice, DriverFuncs, StateCall};
pub use funcs::{device_funcs_index, device_funcs_layout, D3DDDI_ADAPTERFUNCS, DEVICE_FUNCS_FAMILY};
pub use resource::{CreateResourceArgs, GpuAccess, LockRecord, Resource, SurfaceInfo};
pub use types::{Handle, UINT};
