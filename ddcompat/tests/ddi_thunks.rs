//! Driver tables intercepted end to end through the process-global shim
//!
//! A simulated user-mode display driver hands out real `extern "system"` tables; every call goes
//! through the substitutes the shim installs into them.

use ddraw::ddi::types::*;
use ddraw::ddi::{thunks, device_funcs_layout, DeviceServices, SystemKernelThunks, D3DDDI_ADAPTERFUNCS};
use ddraw::error::HookError;
use ddraw::gdi::GdiInterop;
use ddraw::hook::{HookTarget, MapResolver};
use ddraw::flags::{OpenResourceFlags, ResourceFlags};
use ddraw::primary::{DevicePresenter, DisplayMode, FixedDisplayMode};
use ddraw::vtable::InterfaceDesc;
use ddraw::{HResult, PrimaryState, RecordingSink, Shim, HRESULT};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

// ============================================================================
// Simulated driver
// ============================================================================

static NEXT_HANDLE: AtomicUsize = AtomicUsize::new(0x10_0000);
static DRIVER_CALLS: LazyLock<Mutex<Vec<(Handle, &'static str)>>> = LazyLock::new(|| Mutex::new(Vec::new()));

fn next_handle() -> Handle {
    Handle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
}

fn record(handle: Handle, call: &'static str) {
    DRIVER_CALLS.lock().push((handle, call));
}

fn calls_on(handle: Handle) -> Vec<&'static str> {
    DRIVER_CALLS
        .lock()
        .iter()
        .filter(|(h, _)| *h == handle)
        .map(|&(_, call)| call)
        .collect()
}

unsafe fn fill_table(table: *mut c_void, layout: &InterfaceDesc, entries: &[(&str, usize)]) {
    let table = table.cast::<usize>();
    for &(member, address) in entries {
        if let Some(index) = layout.slot_index(member) {
            unsafe { table.add(index).write(address) };
        }
    }
}

unsafe extern "system" fn sim_open_adapter(data: *mut D3DDDIARG_OPENADAPTER) -> HRESULT {
    let data = unsafe { &mut *data };
    data.hAdapter = next_handle();
    data.DriverVersion = data.Version;
    unsafe {
        fill_table(
            data.pAdapterFuncs,
            &D3DDDI_ADAPTERFUNCS,
            &[
                ("pfnGetCaps", sim_get_caps as PFND3DDDI_GETCAPS as usize),
                ("pfnCreateDevice", sim_create_device as PFND3DDDI_CREATEDEVICE as usize),
                ("pfnCloseAdapter", sim_close_adapter as PFND3DDDI_CLOSEADAPTER as usize),
            ],
        )
    };
    0
}

unsafe extern "system" fn sim_get_caps(adapter: Handle, data: *const D3DDDIARG_GETCAPS) -> HRESULT {
    record(adapter, "GetCaps");
    let data = unsafe { &*data };
    if data.Type == D3DDDICAPS_DDRAW {
        unsafe {
            data.pData.cast::<DDRAW_CAPS>().write(DDRAW_CAPS {
                CKeyCaps: DDRAW_CKEYCAPS_SRCBLT,
                ..Default::default()
            })
        };
    }
    0
}

unsafe extern "system" fn sim_create_device(adapter: Handle, data: *mut D3DDDIARG_CREATEDEVICE) -> HRESULT {
    record(adapter, "CreateDevice");
    let data = unsafe { &mut *data };
    data.hDevice = next_handle();
    unsafe {
        fill_table(
            data.pDeviceFuncs,
            device_funcs_layout(data.Version),
            &[
                ("pfnValidateDevice", sim_unhooked as PfnUnhooked as usize),
                ("pfnSetRenderState", sim_set_render_state as PfnSetRenderState as usize),
                ("pfnSetTexture", sim_set_texture as PfnSetTexture as usize),
                ("pfnSetStreamSource", sim_set_stream_source as PFND3DDDI_SETSTREAMSOURCE as usize),
                ("pfnDrawPrimitive", sim_draw_primitive as PFND3DDDI_DRAWPRIMITIVE as usize),
                ("pfnBlt", sim_blt as PFND3DDDI_BLT as usize),
                ("pfnCreateResource", sim_create_resource as PFND3DDDI_CREATERESOURCE as usize),
                ("pfnCreateResource2", sim_create_resource2 as PFND3DDDI_CREATERESOURCE2 as usize),
                ("pfnDestroyDevice", sim_destroy_device as PFND3DDDI_DESTROYDEVICE as usize),
                ("pfnDestroyResource", sim_destroy_resource as PFND3DDDI_DESTROYRESOURCE as usize),
                ("pfnFlush", sim_flush as PFND3DDDI_FLUSH as usize),
                ("pfnLock", sim_lock as PFND3DDDI_LOCK as usize),
                ("pfnOpenResource", sim_open_resource as PFND3DDDI_OPENRESOURCE as usize),
                ("pfnPresent", sim_present as PFND3DDDI_PRESENT as usize),
                ("pfnUnlock", sim_unlock as PFND3DDDI_UNLOCK as usize),
            ],
        )
    };
    0
}

unsafe extern "system" fn sim_close_adapter(adapter: Handle) -> HRESULT {
    record(adapter, "CloseAdapter");
    0
}

type PfnUnhooked = unsafe extern "system" fn(Handle) -> HRESULT;

unsafe extern "system" fn sim_unhooked(device: Handle) -> HRESULT {
    record(device, "Unhooked");
    0
}

type PfnSetRenderState = unsafe extern "system" fn(Handle, *const [UINT; 2]) -> HRESULT;
type PfnSetTexture = unsafe extern "system" fn(Handle, UINT, Handle) -> HRESULT;

unsafe extern "system" fn sim_set_render_state(device: Handle, data: *const [UINT; 2]) -> HRESULT {
    record(device, "SetRenderState");
    // D3DRS_ZENABLE = D3DZB_TRUE
    if unsafe { *data } != [7, 1] {
        return HResult::E_INVALIDARG.0;
    }
    0
}

unsafe extern "system" fn sim_set_texture(device: Handle, stage: UINT, texture: Handle) -> HRESULT {
    record(device, "SetTexture");
    if stage != 1 || texture != Handle(0x77) {
        return HResult::E_INVALIDARG.0;
    }
    0
}

unsafe extern "system" fn sim_set_stream_source(device: Handle, _data: *const D3DDDIARG_SETSTREAMSOURCE) -> HRESULT {
    record(device, "SetStreamSource");
    0
}

unsafe extern "system" fn sim_draw_primitive(
    device: Handle,
    data: *const D3DDDIARG_DRAWPRIMITIVE,
    _flag_buffer: *const UINT,
) -> HRESULT {
    let data = unsafe { &*data };
    record(device, if data.VStart == 0 { "Draw(0)" } else { "Draw(3)" });
    0
}

unsafe extern "system" fn sim_blt(device: Handle, _data: *const D3DDDIARG_BLT) -> HRESULT {
    record(device, "Blt");
    0
}

unsafe extern "system" fn sim_create_resource(device: Handle, data: *mut D3DDDIARG_CREATERESOURCE) -> HRESULT {
    record(device, "CreateResource");
    unsafe { (*data).hResource = next_handle() };
    0
}

unsafe extern "system" fn sim_create_resource2(device: Handle, data: *mut D3DDDIARG_CREATERESOURCE2) -> HRESULT {
    record(device, "CreateResource2");
    unsafe { (*data).hResource = next_handle() };
    0
}

unsafe extern "system" fn sim_destroy_device(device: Handle) -> HRESULT {
    record(device, "DestroyDevice");
    0
}

unsafe extern "system" fn sim_destroy_resource(device: Handle, _resource: Handle) -> HRESULT {
    record(device, "DestroyResource");
    0
}

unsafe extern "system" fn sim_flush(device: Handle) -> HRESULT {
    record(device, "Flush");
    0
}

unsafe extern "system" fn sim_lock(device: Handle, data: *mut D3DDDIARG_LOCK) -> HRESULT {
    record(device, "Lock");
    let memory = Box::leak(vec![0u8; 64].into_boxed_slice());
    unsafe {
        (*data).pSurfData = memory.as_mut_ptr().cast();
        (*data).Pitch = 16;
    }
    0
}

unsafe extern "system" fn sim_open_resource(device: Handle, data: *mut D3DDDIARG_OPENRESOURCE) -> HRESULT {
    record(device, "OpenResource");
    unsafe { (*data).hResource = next_handle() };
    0
}

unsafe extern "system" fn sim_present(device: Handle, _data: *const D3DDDIARG_PRESENT) -> HRESULT {
    record(device, "Present");
    0
}

unsafe extern "system" fn sim_unlock(device: Handle, _data: *const D3DDDIARG_UNLOCK) -> HRESULT {
    record(device, "Unlock");
    0
}

// ============================================================================
// Helpers
// ============================================================================

fn shim() -> &'static Shim {
    if let Some(shim) = Shim::global() {
        return shim;
    }
    let services = DeviceServices::new(
        Arc::new(GdiInterop::new()),
        Arc::new(RecordingSink::new()),
        Arc::new(SystemKernelThunks),
    );
    let display = Arc::new(FixedDisplayMode::new(DisplayMode {
        width: 640,
        height: 480,
        bits_per_pixel: 32,
    }));
    let shim = Shim::new(MapResolver::new(), services, display, |devices| {
        Box::new(DevicePresenter::new(devices.clone()))
    });
    match shim.install() {
        Ok(shim) => shim,
        // Another test got there first
        Err(_) => Shim::global().unwrap(),
    }
}

/// An adapter table the test owns, registered with the shim as if `OpenAdapter` returned it
struct OpenedAdapter {
    handle: Handle,
    table: Vec<usize>,
}

impl OpenedAdapter {
    fn open(module: usize, version: UINT) -> Self {
        let mut table = vec![0usize; D3DDDI_ADAPTERFUNCS.slot_count()];
        let mut data = open_args(version, &mut table);
        assert_eq!(unsafe { sim_open_adapter(&mut data) }, 0);
        unsafe { shim().on_open_adapter(module, &data) };
        Self {
            handle: data.hAdapter,
            table,
        }
    }

    fn slot(&self, member: &str) -> usize {
        self.table[D3DDDI_ADAPTERFUNCS.slot_index(member).unwrap()]
    }

    fn get_caps(&self) -> DDRAW_CAPS {
        let mut caps = DDRAW_CAPS::default();
        let data = D3DDDIARG_GETCAPS {
            Type: D3DDDICAPS_DDRAW,
            pInfo: std::ptr::null_mut(),
            pData: (&mut caps as *mut DDRAW_CAPS).cast(),
            DataSize: std::mem::size_of::<DDRAW_CAPS>() as UINT,
        };
        let get_caps = unsafe { std::mem::transmute::<usize, PFND3DDDI_GETCAPS>(self.slot("pfnGetCaps")) };
        assert_eq!(unsafe { get_caps(self.handle, &data) }, 0);
        caps
    }

    fn create_device(&self, version: UINT) -> (Handle, Vec<usize>) {
        let mut table = vec![0usize; device_funcs_layout(version).slot_count()];
        let mut data = D3DDDIARG_CREATEDEVICE {
            hDevice: Handle::NULL,
            Interface: 0,
            Version: version,
            pCallbacks: std::ptr::null(),
            pCommandBuffer: std::ptr::null_mut(),
            CommandBufferSize: 0,
            pAllocationList: std::ptr::null_mut(),
            AllocationListSize: 0,
            pPatchLocationList: std::ptr::null_mut(),
            PatchLocationListSize: 0,
            pDeviceFuncs: table.as_mut_ptr().cast(),
            Flags: 0,
        };
        let create_device =
            unsafe { std::mem::transmute::<usize, PFND3DDDI_CREATEDEVICE>(self.slot("pfnCreateDevice")) };
        assert_eq!(unsafe { create_device(self.handle, &mut data) }, 0);
        (data.hDevice, table)
    }
}

fn open_args(version: UINT, table: &mut [usize]) -> D3DDDIARG_OPENADAPTER {
    D3DDDIARG_OPENADAPTER {
        hAdapter: Handle::NULL,
        Interface: 9,
        Version: version,
        pAdapterCallbacks: std::ptr::null(),
        pAdapterFuncs: table.as_mut_ptr().cast(),
        DriverVersion: 0,
    }
}

fn device_slot<F: Copy>(table: &[usize], version: UINT, member: &str) -> F {
    let address = table[device_funcs_layout(version).slot_index(member).unwrap()];
    unsafe { std::mem::transmute_copy::<usize, F>(&address) }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_get_caps_adds_mirror_caps() {
    let adapter = OpenedAdapter::open(0x5100_0000, 0x2003);
    assert_eq!(adapter.slot("pfnGetCaps"), thunks::get_caps as PFND3DDDI_GETCAPS as usize);

    let caps = adapter.get_caps();
    assert_eq!(caps.CKeyCaps, DDRAW_CKEYCAPS_SRCBLT);
    assert_eq!(
        caps.FxCaps,
        DDRAW_FXCAPS_BLTMIRRORLEFTRIGHT | DDRAW_FXCAPS_BLTMIRRORUPDOWN
    );
    assert!(calls_on(adapter.handle).contains(&"GetCaps"));
}

#[test]
fn test_device_calls_reach_the_proxy() {
    const VERSION: UINT = 0x4002;
    let adapter = OpenedAdapter::open(0x5200_0000, VERSION);
    assert_eq!(shim().adapters().get(adapter.handle).unwrap().interface_version(), VERSION);

    let (device, table) = adapter.create_device(VERSION);
    let proxy = shim().devices().get(device).expect("device registered");
    assert_eq!(proxy.lock().adapter(), adapter.handle);

    // Intercepted members point at the substitutes, the rest keep the driver's entry points
    let layout = device_funcs_layout(VERSION);
    assert_eq!(table[layout.slot_index("pfnBlt").unwrap()], thunks::blt as PFND3DDDI_BLT as usize);
    let validate_device: PfnUnhooked = device_slot(&table, VERSION, "pfnValidateDevice");
    assert_eq!(unsafe { validate_device(device) }, 0);
    // Members the driver left empty stay empty
    assert_eq!(table[layout.slot_index("pfnPresent1").unwrap()], 0);

    let surfaces = [D3DDDI_SURFACEINFO {
        Width: 4,
        Height: 4,
        ..Default::default()
    }];
    let mut create = D3DDDIARG_CREATERESOURCE2::new(
        D3DDDIFMT_X8R8G8B8,
        D3DDDIPOOL_VIDEOMEMORY,
        ResourceFlags::empty(),
        &surfaces,
    );
    let create_resource2: PFND3DDDI_CREATERESOURCE2 = device_slot(&table, VERSION, "pfnCreateResource2");
    assert_eq!(unsafe { create_resource2(device, &mut create) }, 0);
    let resource = create.hResource;
    assert_eq!(proxy.lock().resource(resource).unwrap().surfaces()[0].width, 4);

    let mut lock = D3DDDIARG_LOCK::new(resource, 0, ddraw::flags::LockFlags::empty());
    let lock_fn: PFND3DDDI_LOCK = device_slot(&table, VERSION, "pfnLock");
    assert_eq!(unsafe { lock_fn(device, &mut lock) }, 0);
    assert_eq!(proxy.lock().resource(resource).unwrap().locks().len(), 1);

    // Destroying a locked resource unlocks it first
    let destroy_resource: PFND3DDDI_DESTROYRESOURCE = device_slot(&table, VERSION, "pfnDestroyResource");
    assert_eq!(unsafe { destroy_resource(device, resource) }, 0);
    assert!(proxy.lock().resource(resource).is_none());

    let destroy_device: PFND3DDDI_DESTROYDEVICE = device_slot(&table, VERSION, "pfnDestroyDevice");
    assert_eq!(unsafe { destroy_device(device) }, 0);
    assert!(shim().devices().get(device).is_none());

    assert_eq!(
        calls_on(device),
        vec![
            "Unhooked",
            "CreateResource2",
            "Lock",
            "Unlock",
            "DestroyResource",
            "DestroyDevice",
        ]
    );
}

#[test]
fn test_pending_draws_reach_the_driver_before_state_changes() {
    const VERSION: UINT = 0x4002;
    let adapter = OpenedAdapter::open(0x5400_0000, VERSION);
    let (device, table) = adapter.create_device(VERSION);

    let set_stream_source: PFND3DDDI_SETSTREAMSOURCE = device_slot(&table, VERSION, "pfnSetStreamSource");
    let draw_primitive: PFND3DDDI_DRAWPRIMITIVE = device_slot(&table, VERSION, "pfnDrawPrimitive");
    let set_texture: PfnSetTexture = device_slot(&table, VERSION, "pfnSetTexture");
    let set_render_state: PfnSetRenderState = device_slot(&table, VERSION, "pfnSetRenderState");
    let flush: PFND3DDDI_FLUSH = device_slot(&table, VERSION, "pfnFlush");

    let stream = D3DDDIARG_SETSTREAMSOURCE {
        Stream: 0,
        hVertexBuffer: Handle(0x66),
        Offset: 0,
        Stride: 16,
    };
    let triangle = |start| D3DDDIARG_DRAWPRIMITIVE {
        PrimitiveType: D3DPT_TRIANGLELIST,
        VStart: start,
        PrimitiveCount: 1,
    };
    unsafe {
        assert_eq!(set_stream_source(device, &stream), 0);
        assert_eq!(draw_primitive(device, &triangle(0), std::ptr::null()), 0);
        assert_eq!(set_texture(device, 1, Handle(0x77)), 0);
        assert_eq!(draw_primitive(device, &triangle(3), std::ptr::null()), 0);
        assert_eq!(set_render_state(device, &[7, 1]), 0);
        assert_eq!(flush(device), 0);
    }

    assert_eq!(
        calls_on(device),
        vec![
            "SetStreamSource",
            "Draw(0)",
            "SetTexture",
            "Draw(3)",
            "SetRenderState",
            "Flush",
        ]
    );
}

/// The only test in this binary that creates a runtime primary, since the primary is per process
#[test]
fn test_runtime_primary_drives_the_primary_surface() {
    const VERSION: UINT = 0x4002;
    let adapter = OpenedAdapter::open(0x5500_0000, VERSION);
    let (device, table) = adapter.create_device(VERSION);
    let proxy = shim().devices().get(device).expect("device registered");
    let primary = shim().primary();

    let create_resource2: PFND3DDDI_CREATERESOURCE2 = device_slot(&table, VERSION, "pfnCreateResource2");
    let open_resource: PFND3DDDI_OPENRESOURCE = device_slot(&table, VERSION, "pfnOpenResource");
    let blt: PFND3DDDI_BLT = device_slot(&table, VERSION, "pfnBlt");
    let destroy_resource: PFND3DDDI_DESTROYRESOURCE = device_slot(&table, VERSION, "pfnDestroyResource");
    let surfaces = [D3DDDI_SURFACEINFO {
        Width: 640,
        Height: 480,
        ..Default::default()
    }];
    let create = |flags| {
        let mut data = D3DDDIARG_CREATERESOURCE2::new(D3DDDIFMT_X8R8G8B8, D3DDDIPOOL_VIDEOMEMORY, flags, &surfaces);
        assert_eq!(unsafe { create_resource2(device, &mut data) }, 0);
        data.hResource
    };

    let scratch = create(ResourceFlags::empty());
    assert_eq!(primary.state(), PrimaryState::Absent);
    let runtime_primary = create(ResourceFlags::PRIMARY);
    assert_eq!(primary.state(), PrimaryState::Created);
    assert_eq!(primary.front(), Some(runtime_primary));
    assert!(proxy.lock().resource(runtime_primary).unwrap().is_gdi_resource());

    let mut open = D3DDDIARG_OPENRESOURCE {
        Flags: OpenResourceFlags::FULLSCREEN,
        ..Default::default()
    };
    assert_eq!(unsafe { open_resource(device, &mut open) }, 0);
    assert_eq!(primary.state(), PrimaryState::FullScreen);
    assert_eq!(primary.flush(), 0);
    assert!(!primary.is_update_pending());

    // Writing to the front buffer schedules a copy to the screen
    let rect = RECT::new(0, 0, 640, 480);
    let write = D3DDDIARG_BLT {
        hSrcResource: scratch,
        SrcRect: rect,
        hDstResource: runtime_primary,
        DstRect: rect,
        ..Default::default()
    };
    assert_eq!(unsafe { blt(device, &write) }, 0);
    assert!(primary.is_update_pending());
    assert_eq!(primary.flush(), 0);
    assert_eq!(
        calls_on(device),
        vec!["CreateResource2", "CreateResource2", "OpenResource", "Blt", "Blt", "Blt"]
    );

    // The primary goes away with the runtime's, and comes back with the next one
    assert_eq!(unsafe { destroy_resource(device, runtime_primary) }, 0);
    assert_eq!(primary.state(), PrimaryState::Released);
    assert_eq!(shim().services().gdi.resource(), None);
    let next_primary = create(ResourceFlags::PRIMARY);
    assert_eq!(primary.front(), Some(next_primary));

    let destroy_device: PFND3DDDI_DESTROYDEVICE = device_slot(&table, VERSION, "pfnDestroyDevice");
    assert_eq!(unsafe { destroy_device(device) }, 0);
    assert_eq!(primary.state(), PrimaryState::Released);
}

#[test]
fn test_calls_on_unknown_device_fail() {
    shim();
    let flush = thunks::flush as PFND3DDDI_FLUSH;
    assert!(unsafe { flush(Handle(0xdead_0000)) } < 0);
}

#[test]
fn test_close_adapter_unregisters() {
    let adapter = OpenedAdapter::open(0x5300_0000, 0x000C);
    let close: PFND3DDDI_CLOSEADAPTER =
        unsafe { std::mem::transmute::<usize, PFND3DDDI_CLOSEADAPTER>(adapter.slot("pfnCloseAdapter")) };
    assert_eq!(unsafe { close(adapter.handle) }, 0);
    assert!(shim().adapters().get(adapter.handle).is_none());
    assert_eq!(calls_on(adapter.handle), vec!["CloseAdapter"]);
}

/// Every `OpenAdapter` hook shares a fixed pool of substitutes, so the whole pool is exercised by
/// one test
#[test]
fn test_open_adapter_hooks() {
    let shim = shim();
    let mut slots = Vec::new();
    for module in [0x6100_0000usize, 0x6200_0000, 0x6300_0000] {
        let slot = Box::into_raw(Box::new(sim_open_adapter as PFND3DDDI_OPENADAPTER as usize));
        unsafe { shim.hook_user_mode_driver(module, HookTarget::ImportSlot(slot as usize)) }.unwrap();
        assert_ne!(unsafe { *slot }, sim_open_adapter as PFND3DDDI_OPENADAPTER as usize);
        slots.push((module, slot));
    }

    // Hooking a module again reuses its substitute
    let (module, slot) = slots[1];
    unsafe { shim.hook_user_mode_driver(module, HookTarget::ImportSlot(slot as usize)) }.unwrap();

    let spare = Box::into_raw(Box::new(sim_open_adapter as PFND3DDDI_OPENADAPTER as usize));
    let result = unsafe { shim.hook_user_mode_driver(0x6400_0000, HookTarget::ImportSlot(spare as usize)) };
    assert!(matches!(result, Err(HookError::NoFreeSlot(_))));
    assert_eq!(unsafe { *spare }, sim_open_adapter as PFND3DDDI_OPENADAPTER as usize);

    // Opening through the hooked slot registers the adapter against its module
    let (module, slot) = slots[2];
    let open = unsafe { std::mem::transmute::<usize, PFND3DDDI_OPENADAPTER>(*slot) };
    let mut table = vec![0usize; D3DDDI_ADAPTERFUNCS.slot_count()];
    let mut data = open_args(0x5002, &mut table);
    assert_eq!(unsafe { open(&mut data) }, 0);

    let adapter = shim.adapters().get(data.hAdapter).expect("adapter registered");
    assert_eq!(adapter.module(), module);
    assert_eq!(adapter.interface_version(), 0x5002);
    assert_eq!(table[0], thunks::get_caps as PFND3DDDI_GETCAPS as usize);
}
