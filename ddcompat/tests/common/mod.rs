//! Simulated driver device shared by the integration tests

#![allow(dead_code)]

use ddraw::ddi::types::*;
use ddraw::ddi::{Device, DeviceServices, DriverDevice, KernelThunks, StateCall};
use ddraw::flags::{BltFlags, ResourceFlags};
use ddraw::gdi::GdiInterop;
use ddraw::{HResult, RecordingSink, HRESULT};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Blt(Handle, Handle),
    Clear,
    ColorFill(Handle),
    CreateResource(Handle),
    DestroyDevice,
    DestroyResource(Handle),
    DrawIndexed,
    Draw { start: UINT, count: UINT },
    Flush,
    Flush1(UINT),
    Lock(Handle, UINT),
    OpenResource(Handle),
    Present,
    Present1,
    SetRenderTarget(Handle),
    SetState(StateCall),
    SetStreamSource(Handle),
    SetStreamSourceUm,
    Unlock(Handle, UINT),
}

struct Surface {
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
    memory: Vec<u8>,
}

impl Surface {
    fn pitch(&self) -> usize {
        self.width * self.bytes_per_pixel
    }

    fn pixel(&self, x: usize, y: usize) -> u32 {
        let offset = y * self.pitch() + x * self.bytes_per_pixel;
        let mut bytes = [0u8; 4];
        bytes[..self.bytes_per_pixel].copy_from_slice(&self.memory[offset..offset + self.bytes_per_pixel]);
        u32::from_le_bytes(bytes)
    }

    fn set_pixel(&mut self, x: usize, y: usize, value: u32) {
        let offset = y * self.pitch() + x * self.bytes_per_pixel;
        let bytes = value.to_le_bytes();
        self.memory[offset..offset + self.bytes_per_pixel].copy_from_slice(&bytes[..self.bytes_per_pixel]);
    }
}

#[derive(Default)]
struct SimState {
    calls: Vec<Call>,
    next_handle: usize,
    surfaces: HashMap<Handle, Surface>,
}

/// Driver device that keeps surfaces in memory and records every call
///
/// Clones share state, so a test can keep one while a [`Device`] owns another.
#[derive(Clone)]
pub struct SimDriver {
    state: Arc<Mutex<SimState>>,
    honors_color_key: bool,
}

impl SimDriver {
    pub fn new(honors_color_key: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            honors_color_key,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn surface_count(&self) -> usize {
        self.state.lock().surfaces.len()
    }

    pub fn pixel(&self, resource: Handle, x: usize, y: usize) -> u32 {
        self.state.lock().surfaces[&resource].pixel(x, y)
    }

    pub fn fill(&self, resource: Handle, value: u32) {
        let mut state = self.state.lock();
        let surface = state.surfaces.get_mut(&resource).expect("unknown surface");
        for y in 0..surface.height {
            for x in 0..surface.width {
                surface.set_pixel(x, y, value);
            }
        }
    }

    pub fn set_pixel(&self, resource: Handle, x: usize, y: usize, value: u32) {
        let mut state = self.state.lock();
        state.surfaces.get_mut(&resource).expect("unknown surface").set_pixel(x, y, value);
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }

    fn allocate(&self, format: UINT, surfaces: *const D3DDDI_SURFACEINFO, count: UINT) -> Handle {
        let mut state = self.state.lock();
        state.next_handle += 1;
        let handle = Handle(0x1000 + state.next_handle);
        let info = if surfaces.is_null() || count == 0 {
            D3DDDI_SURFACEINFO::default()
        } else {
            unsafe { *surfaces }
        };
        let bytes_per_pixel = format_bytes_per_pixel(format).unwrap_or(4);
        let width = info.Width.max(1) as usize;
        let height = info.Height.max(1) as usize;
        state.surfaces.insert(
            handle,
            Surface {
                width,
                height,
                bytes_per_pixel,
                memory: vec![0; (width * height * bytes_per_pixel).max(4)],
            },
        );
        state.calls.push(Call::CreateResource(handle));
        handle
    }
}

impl DriverDevice for SimDriver {
    fn blt(&self, data: &D3DDDIARG_BLT) -> HRESULT {
        let mut state = self.state.lock();
        state.calls.push(Call::Blt(data.hSrcResource, data.hDstResource));
        let Some(src) = state.surfaces.get(&data.hSrcResource) else {
            return HResult::E_INVALIDARG.0;
        };
        let keyed = self.honors_color_key && data.Flags.contains(BltFlags::SRC_COLOR_KEY);
        let mask = if src.bytes_per_pixel == 4 { u32::MAX } else { (1u32 << (src.bytes_per_pixel * 8)) - 1 };
        let mut pixels = Vec::new();
        for y in 0..data.SrcRect.height() as usize {
            for x in 0..data.SrcRect.width() as usize {
                let value = src.pixel(data.SrcRect.left as usize + x, data.SrcRect.top as usize + y);
                if !(keyed && value == data.ColorKey & mask) {
                    pixels.push((x, y, value));
                }
            }
        }
        let Some(dst) = state.surfaces.get_mut(&data.hDstResource) else {
            return HResult::E_INVALIDARG.0;
        };
        if data.DstRect.right as usize > dst.width || data.DstRect.bottom as usize > dst.height {
            return HResult::E_INVALIDARG.0;
        }
        for (x, y, value) in pixels {
            dst.set_pixel(data.DstRect.left as usize + x, data.DstRect.top as usize + y, value);
        }
        0
    }

    fn clear(&self, _: &D3DDDIARG_CLEAR, _: &[RECT]) -> HRESULT {
        self.record(Call::Clear);
        0
    }

    fn color_fill(&self, data: &D3DDDIARG_COLORFILL) -> HRESULT {
        self.record(Call::ColorFill(data.hResource));
        0
    }

    fn create_resource(&self, data: &mut D3DDDIARG_CREATERESOURCE) -> HRESULT {
        data.hResource = self.allocate(data.Format, data.pSurfList, data.SurfCount);
        0
    }

    fn create_resource2(&self, data: &mut D3DDDIARG_CREATERESOURCE2) -> HRESULT {
        data.hResource = self.allocate(data.Format, data.pSurfList, data.SurfCount);
        0
    }

    fn has_create_resource2(&self) -> bool {
        true
    }

    fn destroy_device(&self) -> HRESULT {
        self.record(Call::DestroyDevice);
        0
    }

    fn destroy_resource(&self, resource: Handle) -> HRESULT {
        let mut state = self.state.lock();
        state.calls.push(Call::DestroyResource(resource));
        state.surfaces.remove(&resource);
        0
    }

    fn draw_indexed_primitive2(
        &self,
        _: &D3DDDIARG_DRAWINDEXEDPRIMITIVE2,
        _: UINT,
        _: *const c_void,
        _: *const UINT,
    ) -> HRESULT {
        self.record(Call::DrawIndexed);
        0
    }

    fn draw_primitive(&self, data: &D3DDDIARG_DRAWPRIMITIVE, _: *const UINT) -> HRESULT {
        self.record(Call::Draw {
            start: data.VStart,
            count: data.PrimitiveCount,
        });
        0
    }

    fn flush(&self) -> HRESULT {
        self.record(Call::Flush);
        0
    }

    fn flush1(&self, flags: UINT) -> HRESULT {
        self.record(Call::Flush1(flags));
        0
    }

    fn lock(&self, data: &mut D3DDDIARG_LOCK) -> HRESULT {
        let mut state = self.state.lock();
        state.calls.push(Call::Lock(data.hResource, data.SubResourceIndex));
        let Some(surface) = state.surfaces.get_mut(&data.hResource) else {
            return HResult::E_INVALIDARG.0;
        };
        data.pSurfData = surface.memory.as_mut_ptr().cast();
        data.Pitch = surface.pitch() as UINT;
        0
    }

    fn open_resource(&self, data: &mut D3DDDIARG_OPENRESOURCE) -> HRESULT {
        let screen = D3DDDI_SURFACEINFO {
            Width: 64,
            Height: 64,
            ..Default::default()
        };
        data.hResource = self.allocate(D3DDDIFMT_X8R8G8B8, &screen, 1);
        let mut state = self.state.lock();
        state.calls.pop();
        state.calls.push(Call::OpenResource(data.hResource));
        0
    }

    fn present(&self, _: &D3DDDIARG_PRESENT) -> HRESULT {
        self.record(Call::Present);
        0
    }

    fn present1(&self, _: &mut D3DDDIARG_PRESENT1) -> HRESULT {
        self.record(Call::Present1);
        0
    }

    fn set_render_target(&self, data: &D3DDDIARG_SETRENDERTARGET) -> HRESULT {
        self.record(Call::SetRenderTarget(data.hRenderTarget));
        0
    }

    fn set_stream_source(&self, data: &D3DDDIARG_SETSTREAMSOURCE) -> HRESULT {
        self.record(Call::SetStreamSource(data.hVertexBuffer));
        0
    }

    fn set_stream_source_um(&self, _: &D3DDDIARG_SETSTREAMSOURCEUM, _: *const c_void) -> HRESULT {
        self.record(Call::SetStreamSourceUm);
        0
    }

    fn unlock(&self, data: &D3DDDIARG_UNLOCK) -> HRESULT {
        self.record(Call::Unlock(data.hResource, data.SubResourceIndex));
        0
    }

    fn set_state(&self, call: StateCall, _args: &[usize]) -> HRESULT {
        self.record(Call::SetState(call));
        0
    }
}

/// Counts releases of display source ownership
#[derive(Default)]
pub struct CountingKernel {
    releases: AtomicUsize,
}

impl CountingKernel {
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl KernelThunks for CountingKernel {
    fn release_process_vidpn_source_owners(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Collaborators of a test device, kept so tests can inspect them
pub struct Fixture {
    pub driver: SimDriver,
    pub sink: Arc<RecordingSink>,
    pub kernel: Arc<CountingKernel>,
    pub services: DeviceServices,
}

impl Fixture {
    pub fn new(honors_color_key: bool) -> Self {
        let sink = Arc::new(RecordingSink::new());
        let kernel = Arc::new(CountingKernel::default());
        let services = DeviceServices::new(Arc::new(GdiInterop::new()), sink.clone(), kernel.clone());
        Self {
            driver: SimDriver::new(honors_color_key),
            sink,
            kernel,
            services,
        }
    }

    pub fn device(&self, handle: Handle, caps: DDRAW_CAPS) -> Device {
        Device::new(
            handle,
            Handle(0xADA),
            Box::new(self.driver.clone()),
            caps,
            self.services.clone(),
        )
    }
}

/// Capabilities of a driver that advertises source color keyed blits
pub fn color_key_caps() -> DDRAW_CAPS {
    DDRAW_CAPS {
        CKeyCaps: DDRAW_CKEYCAPS_SRCBLT,
        ..Default::default()
    }
}

pub fn create_surface(device: &mut Device, width: UINT, height: UINT, flags: ResourceFlags) -> Handle {
    let surfaces = [D3DDDI_SURFACEINFO {
        Width: width,
        Height: height,
        ..Default::default()
    }];
    let mut data = D3DDDIARG_CREATERESOURCE2::new(D3DDDIFMT_R5G6B5, D3DDDIPOOL_VIDEOMEMORY, flags, &surfaces);
    assert_eq!(device.create_resource2(&mut data), 0);
    data.hResource
}

pub fn triangles(start: UINT, count: UINT) -> D3DDDIARG_DRAWPRIMITIVE {
    D3DDDIARG_DRAWPRIMITIVE {
        PrimitiveType: D3DPT_TRIANGLELIST,
        VStart: start,
        PrimitiveCount: count,
    }
}
