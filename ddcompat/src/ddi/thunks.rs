//! Entry points installed into driver tables
//!
//! Every function here has the exact signature of the driver entry point it replaces. They find
//! the adapter or device proxy through the global [`Shim`] and never unwind into the caller.

use super::device::Device;
use super::driver::{visit_state_entry_points, StateCall};
use super::types::*;
use crate::config::MAX_USER_MODE_DISPLAY_DRIVERS;
use crate::error::{succeeded, HResult, HRESULT};
use crate::flags::{OpenResourceFlags, ResourceFlags};
use crate::shim::Shim;
use crate::vtable::Substitutes;
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};

macro_rules! trace_call {
    ($name:literal, $handle:expr) => {
        #[cfg(feature = "trace-calls")]
        log::debug!(concat!($name, "({:?})"), $handle);
    };
}

/// Runs `f` with the global context once a call has succeeded, outside any device lock
fn after_success(hr: HRESULT, f: impl FnOnce(&Shim)) -> HRESULT {
    if succeeded(hr)
        && let Some(shim) = Shim::global()
    {
        f(shim);
    }
    hr
}

fn with_device(device: Handle, f: impl FnOnce(&mut Device) -> HRESULT) -> HRESULT {
    match Shim::global().and_then(|shim| shim.devices().get(device)) {
        Some(proxy) => f(&mut proxy.lock()),
        None => {
            log::warn!("Call on unknown device {device:?}");
            HResult::E_FAIL.0
        }
    }
}

// ============================================================================
// OpenAdapter
// ============================================================================

struct UmdSlot {
    module: AtomicUsize,
    original: AtomicUsize,
}

impl UmdSlot {
    const fn new() -> Self {
        Self {
            module: AtomicUsize::new(0),
            original: AtomicUsize::new(0),
        }
    }
}

static UMD_SLOTS: [UmdSlot; MAX_USER_MODE_DISPLAY_DRIVERS] = [const { UmdSlot::new() }; MAX_USER_MODE_DISPLAY_DRIVERS];

unsafe fn open_adapter(slot: &UmdSlot, data: *mut D3DDDIARG_OPENADAPTER) -> HRESULT {
    let original = slot.original.load(Ordering::Acquire);
    if original == 0 {
        log::error!("OpenAdapter called before its original was captured");
        return HResult::E_FAIL.0;
    }
    let hr = unsafe {
        let original = std::mem::transmute::<usize, PFND3DDDI_OPENADAPTER>(original);
        original(data)
    };
    if succeeded(hr)
        && let Some(data) = unsafe { data.as_ref() }
        && let Some(shim) = Shim::global()
    {
        unsafe { shim.on_open_adapter(slot.module.load(Ordering::Acquire), data) };
    }
    hr
}

macro_rules! open_adapter_thunks {
    ($($index:literal => $name:ident),* $(,)?) => {
        $(
            unsafe extern "system" fn $name(data: *mut D3DDDIARG_OPENADAPTER) -> HRESULT {
                unsafe { open_adapter(&UMD_SLOTS[$index], data) }
            }
        )*

        static OPEN_ADAPTER_THUNKS: [PFND3DDDI_OPENADAPTER; MAX_USER_MODE_DISPLAY_DRIVERS] = [$($name),*];
    };
}

open_adapter_thunks!(0 => open_adapter_0, 1 => open_adapter_1, 2 => open_adapter_2);

/// Binds an `OpenAdapter` substitute to `module`
///
/// Returns the slot index and the substitute's address, or `None` once every slot is bound to
/// another module. Binding the same module again returns its existing slot.
pub(crate) fn reserve_open_adapter(module: usize) -> Option<(usize, usize)> {
    let thunk = |index: usize| (index, OPEN_ADAPTER_THUNKS[index] as usize);
    if let Some(index) = UMD_SLOTS
        .iter()
        .position(|slot| slot.module.load(Ordering::Acquire) == module)
    {
        return Some(thunk(index));
    }
    UMD_SLOTS
        .iter()
        .position(|slot| {
            slot.module
                .compare_exchange(0, module, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        })
        .map(thunk)
}

pub(crate) fn set_open_adapter_original(index: usize, original: usize) {
    UMD_SLOTS[index].original.store(original, Ordering::Release);
}

// ============================================================================
// Adapter functions
// ============================================================================

pub unsafe extern "system" fn get_caps(adapter: Handle, data: *const D3DDDIARG_GETCAPS) -> HRESULT {
    trace_call!("GetCaps", adapter);
    let Some(adapter) = Shim::global().and_then(|shim| shim.adapters().get(adapter)) else {
        log::warn!("GetCaps on unknown adapter {adapter:?}");
        return HResult::E_FAIL.0;
    };
    let hr = adapter.get_caps(data);
    if succeeded(hr)
        && let Some(data) = unsafe { data.as_ref() }
        && data.Type == D3DDDICAPS_DDRAW
        && !data.pData.is_null()
        && data.DataSize as usize >= std::mem::size_of::<DDRAW_CAPS>()
    {
        unsafe {
            (*data.pData.cast::<DDRAW_CAPS>()).FxCaps =
                DDRAW_FXCAPS_BLTMIRRORLEFTRIGHT | DDRAW_FXCAPS_BLTMIRRORUPDOWN;
        }
    }
    hr
}

pub unsafe extern "system" fn create_device(adapter: Handle, data: *mut D3DDDIARG_CREATEDEVICE) -> HRESULT {
    trace_call!("CreateDevice", adapter);
    let Some(shim) = Shim::global() else {
        return HResult::E_FAIL.0;
    };
    let Some(adapter) = shim.adapters().get(adapter) else {
        log::warn!("CreateDevice on unknown adapter {adapter:?}");
        return HResult::E_FAIL.0;
    };
    let hr = adapter.create_device(data);
    if succeeded(hr)
        && let Some(data) = unsafe { data.as_ref() }
    {
        unsafe { shim.on_create_device(&adapter, data) };
    }
    hr
}

pub unsafe extern "system" fn close_adapter(adapter: Handle) -> HRESULT {
    trace_call!("CloseAdapter", adapter);
    let Some(shim) = Shim::global() else {
        return HResult::E_FAIL.0;
    };
    let Some(proxy) = shim.adapters().get(adapter) else {
        log::warn!("CloseAdapter on unknown adapter {adapter:?}");
        return HResult::E_FAIL.0;
    };
    let hr = proxy.close();
    if succeeded(hr) {
        shim.adapters().remove(adapter);
    }
    hr
}

pub fn adapter_substitutes() -> Substitutes {
    Substitutes::new()
        .with("pfnGetCaps", get_caps as PFND3DDDI_GETCAPS as usize)
        .with("pfnCreateDevice", create_device as PFND3DDDI_CREATEDEVICE as usize)
        .with("pfnCloseAdapter", close_adapter as PFND3DDDI_CLOSEADAPTER as usize)
}

// ============================================================================
// Device functions
// ============================================================================

pub unsafe extern "system" fn blt(device: Handle, data: *const D3DDDIARG_BLT) -> HRESULT {
    trace_call!("Blt", device);
    let Some(data) = (unsafe { data.as_ref() }) else {
        return HResult::E_INVALIDARG.0;
    };
    let hr = with_device(device, |d| d.blt(data));
    after_success(hr, |shim| shim.on_resource_written(data.hDstResource))
}

pub unsafe extern "system" fn clear(
    device: Handle,
    data: *const D3DDDIARG_CLEAR,
    num_rects: UINT,
    rects: *const RECT,
) -> HRESULT {
    trace_call!("Clear", device);
    let Some(data) = (unsafe { data.as_ref() }) else {
        return HResult::E_INVALIDARG.0;
    };
    let rects = if rects.is_null() || num_rects == 0 {
        &[][..]
    } else {
        unsafe { std::slice::from_raw_parts(rects, num_rects as usize) }
    };
    with_device(device, |d| d.clear(data, rects))
}

pub unsafe extern "system" fn color_fill(device: Handle, data: *const D3DDDIARG_COLORFILL) -> HRESULT {
    trace_call!("ColorFill", device);
    let Some(data) = (unsafe { data.as_ref() }) else {
        return HResult::E_INVALIDARG.0;
    };
    let hr = with_device(device, |d| d.color_fill(data));
    after_success(hr, |shim| shim.on_resource_written(data.hResource))
}

pub unsafe extern "system" fn create_resource(device: Handle, data: *mut D3DDDIARG_CREATERESOURCE) -> HRESULT {
    trace_call!("CreateResource", device);
    let Some(data) = (unsafe { data.as_mut() }) else {
        return HResult::E_INVALIDARG.0;
    };
    let hr = with_device(device, |d| d.create_resource(data));
    if data.Flags.contains(ResourceFlags::PRIMARY) {
        return after_success(hr, |shim| shim.on_primary_resource_created(data.SurfCount));
    }
    hr
}

pub unsafe extern "system" fn create_resource2(device: Handle, data: *mut D3DDDIARG_CREATERESOURCE2) -> HRESULT {
    trace_call!("CreateResource2", device);
    let Some(data) = (unsafe { data.as_mut() }) else {
        return HResult::E_INVALIDARG.0;
    };
    let hr = with_device(device, |d| d.create_resource2(data));
    if data.Flags.contains(ResourceFlags::PRIMARY) {
        return after_success(hr, |shim| shim.on_primary_resource_created(data.SurfCount));
    }
    hr
}

pub unsafe extern "system" fn destroy_device(device: Handle) -> HRESULT {
    trace_call!("DestroyDevice", device);
    let Some(shim) = Shim::global() else {
        return HResult::E_FAIL.0;
    };
    let Some(proxy) = shim.devices().get(device) else {
        log::warn!("DestroyDevice on unknown device {device:?}");
        return HResult::E_FAIL.0;
    };
    shim.on_destroy_device(&proxy);
    let hr = proxy.lock().destroy_device();
    if succeeded(hr) {
        shim.devices().remove(device);
    }
    hr
}

pub unsafe extern "system" fn destroy_resource(device: Handle, resource: Handle) -> HRESULT {
    trace_call!("DestroyResource", device);
    let mut was_shared_primary = false;
    let hr = with_device(device, |d| {
        was_shared_primary = d.shared_primary() == Some(resource);
        d.destroy_resource(resource)
    });
    after_success(hr, |shim| shim.on_resource_destroyed(resource, was_shared_primary))
}

pub unsafe extern "system" fn draw_indexed_primitive2(
    device: Handle,
    data: *const D3DDDIARG_DRAWINDEXEDPRIMITIVE2,
    indices_size: UINT,
    indices: *const c_void,
    flag_buffer: *const UINT,
) -> HRESULT {
    trace_call!("DrawIndexedPrimitive2", device);
    let Some(data) = (unsafe { data.as_ref() }) else {
        return HResult::E_INVALIDARG.0;
    };
    with_device(device, |d| d.draw_indexed_primitive2(data, indices_size, indices, flag_buffer))
}

pub unsafe extern "system" fn draw_primitive(
    device: Handle,
    data: *const D3DDDIARG_DRAWPRIMITIVE,
    flag_buffer: *const UINT,
) -> HRESULT {
    trace_call!("DrawPrimitive", device);
    let Some(data) = (unsafe { data.as_ref() }) else {
        return HResult::E_INVALIDARG.0;
    };
    with_device(device, |d| d.draw_primitive(data, flag_buffer))
}

pub unsafe extern "system" fn flush(device: Handle) -> HRESULT {
    trace_call!("Flush", device);
    with_device(device, |d| d.flush())
}

pub unsafe extern "system" fn flush1(device: Handle, flags: UINT) -> HRESULT {
    trace_call!("Flush1", device);
    with_device(device, |d| d.flush1(flags))
}

pub unsafe extern "system" fn lock(device: Handle, data: *mut D3DDDIARG_LOCK) -> HRESULT {
    trace_call!("Lock", device);
    let Some(data) = (unsafe { data.as_mut() }) else {
        return HResult::E_INVALIDARG.0;
    };
    with_device(device, |d| d.lock(data))
}

pub unsafe extern "system" fn open_resource(device: Handle, data: *mut D3DDDIARG_OPENRESOURCE) -> HRESULT {
    trace_call!("OpenResource", device);
    let Some(data) = (unsafe { data.as_mut() }) else {
        return HResult::E_INVALIDARG.0;
    };
    let hr = with_device(device, |d| d.open_resource(data));
    if data.Flags.contains(OpenResourceFlags::FULLSCREEN) {
        return after_success(hr, Shim::on_shared_primary_opened);
    }
    hr
}

pub unsafe extern "system" fn present(device: Handle, data: *const D3DDDIARG_PRESENT) -> HRESULT {
    trace_call!("Present", device);
    let Some(data) = (unsafe { data.as_ref() }) else {
        return HResult::E_INVALIDARG.0;
    };
    let hr = with_device(device, |d| d.present(data));
    after_success(hr, |shim| shim.on_present(data.hSrcResource, data.Flags))
}

pub unsafe extern "system" fn present1(device: Handle, data: *mut D3DDDIARG_PRESENT1) -> HRESULT {
    trace_call!("Present1", device);
    let Some(data) = (unsafe { data.as_mut() }) else {
        return HResult::E_INVALIDARG.0;
    };
    let hr = with_device(device, |d| d.present1(data));
    let sources = unsafe { data.sources() }.to_vec();
    after_success(hr, |shim| {
        for source in sources {
            shim.on_present(source.hResource, data.Flags);
        }
    })
}

pub unsafe extern "system" fn set_render_target(device: Handle, data: *const D3DDDIARG_SETRENDERTARGET) -> HRESULT {
    trace_call!("SetRenderTarget", device);
    let Some(data) = (unsafe { data.as_ref() }) else {
        return HResult::E_INVALIDARG.0;
    };
    with_device(device, |d| d.set_render_target(data))
}

pub unsafe extern "system" fn set_stream_source(device: Handle, data: *const D3DDDIARG_SETSTREAMSOURCE) -> HRESULT {
    trace_call!("SetStreamSource", device);
    let Some(data) = (unsafe { data.as_ref() }) else {
        return HResult::E_INVALIDARG.0;
    };
    with_device(device, |d| d.set_stream_source(data))
}

pub unsafe extern "system" fn set_stream_source_um(
    device: Handle,
    data: *const D3DDDIARG_SETSTREAMSOURCEUM,
    vertices: *const c_void,
) -> HRESULT {
    trace_call!("SetStreamSourceUm", device);
    let Some(data) = (unsafe { data.as_ref() }) else {
        return HResult::E_INVALIDARG.0;
    };
    with_device(device, |d| d.set_stream_source_um(data, vertices))
}

pub unsafe extern "system" fn unlock(device: Handle, data: *const D3DDDIARG_UNLOCK) -> HRESULT {
    trace_call!("Unlock", device);
    let Some(data) = (unsafe { data.as_ref() }) else {
        return HResult::E_INVALIDARG.0;
    };
    let hr = with_device(device, |d| d.unlock(data));
    after_success(hr, |shim| shim.on_resource_written(data.hResource))
}

macro_rules! state_thunks {
    ($($name:ident($($arg:ident),+)),* $(,)?) => {
        ::paste::paste! {
            $(
                unsafe extern "system" fn [<$name:snake>](device: Handle, $($arg: usize),+) -> HRESULT {
                    #[cfg(feature = "trace-calls")]
                    log::debug!("{}({:?})", stringify!($name), device);
                    with_device(device, |d| d.set_state(StateCall::$name, &[$($arg),+]))
                }
            )*

            fn with_state_substitutes(substitutes: Substitutes) -> Substitutes {
                substitutes $(.with(StateCall::$name.member(), [<$name:snake>] as usize))*
            }
        }
    };
}

visit_state_entry_points!(state_thunks);

/// Device substitutes, shared by every `D3DDDI_DEVICEFUNCS` layout
pub fn device_substitutes() -> Substitutes {
    with_state_substitutes(Substitutes::new())
        .with("pfnBlt", blt as PFND3DDDI_BLT as usize)
        .with("pfnClear", clear as PFND3DDDI_CLEAR as usize)
        .with("pfnColorFill", color_fill as PFND3DDDI_COLORFILL as usize)
        .with("pfnCreateResource", create_resource as PFND3DDDI_CREATERESOURCE as usize)
        .with("pfnCreateResource2", create_resource2 as PFND3DDDI_CREATERESOURCE2 as usize)
        .with("pfnDestroyDevice", destroy_device as PFND3DDDI_DESTROYDEVICE as usize)
        .with("pfnDestroyResource", destroy_resource as PFND3DDDI_DESTROYRESOURCE as usize)
        .with(
            "pfnDrawIndexedPrimitive2",
            draw_indexed_primitive2 as PFND3DDDI_DRAWINDEXEDPRIMITIVE2 as usize,
        )
        .with("pfnDrawPrimitive", draw_primitive as PFND3DDDI_DRAWPRIMITIVE as usize)
        .with("pfnFlush", flush as PFND3DDDI_FLUSH as usize)
        .with("pfnFlush1", flush1 as PFND3DDDI_FLUSH1 as usize)
        .with("pfnLock", lock as PFND3DDDI_LOCK as usize)
        .with("pfnOpenResource", open_resource as PFND3DDDI_OPENRESOURCE as usize)
        .with("pfnPresent", present as PFND3DDDI_PRESENT as usize)
        .with("pfnPresent1", present1 as PFND3DDDI_PRESENT1 as usize)
        .with("pfnSetRenderTarget", set_render_target as PFND3DDDI_SETRENDERTARGET as usize)
        .with("pfnSetStreamSource", set_stream_source as PFND3DDDI_SETSTREAMSOURCE as usize)
        .with("pfnSetStreamSourceUm", set_stream_source_um as PFND3DDDI_SETSTREAMSOURCEUM as usize)
        .with("pfnUnlock", unlock as PFND3DDDI_UNLOCK as usize)
}
