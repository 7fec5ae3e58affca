//! Device proxy
//!
//! A [`Device`] stands in front of one driver device. It owns the shadow of every resource the
//! device created, batches draws, and forwards everything else to the original entry points
//! captured when the device was created.

use super::color_key::{emulate_src_color_key_blt, probe_src_color_key, BltSurface};
use super::draw::DrawBatcher;
use super::driver::{DriverDevice, StateCall};
use super::resource::{CreateResourceArgs, Resource};
use super::types::*;
use crate::diag::DiagnosticSink;
use crate::error::{failed, succeeded, HResult, HRESULT};
use crate::flags::{BltFlags, ClearFlags, LockFlags, OpenResourceFlags, ResourceFlags};
use crate::gdi::{GdiDesignation, GdiInterop};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Kernel display calls a device needs outside the driver tables
pub trait KernelThunks: Send + Sync {
    /// Gives up this process's ownership of the display sources it drove full screen
    fn release_process_vidpn_source_owners(&self);
}

/// [`KernelThunks`] backed by the system's `gdi32.dll`
#[derive(Default, Clone, Copy, Debug)]
pub struct SystemKernelThunks;

impl KernelThunks for SystemKernelThunks {
    #[cfg(windows)]
    fn release_process_vidpn_source_owners(&self) {
        use crate::hook::{SymbolResolver, SystemResolver};
        use winapi::um::processthreadsapi::GetCurrentProcess;

        type ReleaseOwners = unsafe extern "system" fn(*mut c_void) -> i32;

        let Some(address) = SystemResolver.resolve("gdi32.dll", "D3DKMTReleaseProcessVidPnSourceOwners")
        else {
            log::warn!("D3DKMTReleaseProcessVidPnSourceOwners is not available");
            return;
        };
        let status = unsafe {
            let release = std::mem::transmute::<usize, ReleaseOwners>(address);
            release(GetCurrentProcess().cast())
        };
        if status != 0 {
            log::warn!("D3DKMTReleaseProcessVidPnSourceOwners failed: 0x{:08x}", status as u32);
        }
    }

    #[cfg(not(windows))]
    fn release_process_vidpn_source_owners(&self) {
        log::debug!("No display source ownership to release on this platform");
    }
}

/// Process-wide collaborators shared by every device
#[derive(Clone)]
pub struct DeviceServices {
    pub gdi: Arc<GdiInterop>,
    pub diagnostics: Arc<dyn DiagnosticSink>,
    pub kernel: Arc<dyn KernelThunks>,
    pub flush_enabled: Arc<AtomicBool>,
}

impl DeviceServices {
    pub fn new(gdi: Arc<GdiInterop>, diagnostics: Arc<dyn DiagnosticSink>, kernel: Arc<dyn KernelThunks>) -> Self {
        Self {
            gdi,
            diagnostics,
            kernel,
            flush_enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_flush_enabled(&self) -> bool {
        self.flush_enabled.load(Ordering::Acquire)
    }

    pub fn set_flush_enabled(&self, enabled: bool) {
        self.flush_enabled.store(enabled, Ordering::Release);
    }
}

/// Proxy state of one driver device
pub struct Device {
    handle: Handle,
    adapter: Handle,
    driver: Box<dyn DriverDevice>,
    ddraw_caps: DDRAW_CAPS,
    services: DeviceServices,
    resources: HashMap<Handle, Resource>,
    batcher: DrawBatcher,
    render_target: Option<(Handle, UINT)>,
    shared_primary: Option<Handle>,
    /// Resources created with the primary flag, oldest first
    primaries: Vec<Handle>,
    src_color_key_supported: Option<bool>,
}

impl Device {
    pub fn new(
        handle: Handle,
        adapter: Handle,
        driver: Box<dyn DriverDevice>,
        ddraw_caps: DDRAW_CAPS,
        services: DeviceServices,
    ) -> Self {
        Self {
            handle,
            adapter,
            driver,
            ddraw_caps,
            services,
            resources: HashMap::new(),
            batcher: DrawBatcher::new(),
            render_target: None,
            shared_primary: None,
            primaries: Vec::new(),
            src_color_key_supported: None,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn adapter(&self) -> Handle {
        self.adapter
    }

    pub fn driver(&self) -> &dyn DriverDevice {
        self.driver.as_ref()
    }

    pub fn resource(&self, resource: Handle) -> Option<&Resource> {
        self.resources.get(&resource)
    }

    pub fn resource_mut(&mut self, resource: Handle) -> Option<&mut Resource> {
        self.resources.get_mut(&resource)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Render target 0 and its sub-resource
    pub fn render_target(&self) -> Option<(Handle, UINT)> {
        self.render_target
    }

    pub fn shared_primary(&self) -> Option<Handle> {
        self.shared_primary
    }

    /// Live resources the runtime created as primaries, oldest first
    pub fn primary_resources(&self) -> &[Handle] {
        &self.primaries
    }

    pub fn batcher(&self) -> &DrawBatcher {
        &self.batcher
    }

    /// Whether the driver really honors source color keys, probed on first use
    pub fn is_src_color_key_supported(&mut self) -> bool {
        if let Some(supported) = self.src_color_key_supported {
            return supported;
        }
        let supported = probe_src_color_key(
            self.driver.as_ref(),
            &self.ddraw_caps,
            self.services.diagnostics.as_ref(),
        );
        self.src_color_key_supported = Some(supported);
        supported
    }

    /// Submits any batched draws
    pub fn flush_primitives(&mut self) -> HRESULT {
        self.batcher.flush(self.driver.as_ref())
    }

    fn prepare_for_rendering(&mut self, resource: Handle, sub_resource: UINT, is_read_only: bool) {
        if let Some(resource) = self.resources.get_mut(&resource) {
            resource.prepare_for_rendering(sub_resource, is_read_only);
        }
    }

    fn prepare_render_target(&mut self) {
        if let Some((resource, sub_resource)) = self.render_target {
            self.prepare_for_rendering(resource, sub_resource, false);
        }
    }

    fn add_resource(&mut self, resource: Resource) {
        if let Some((vertices, stride)) = resource.sys_mem_vertex_buffer() {
            self.batcher.add_sys_mem_vertex_buffer(resource.handle(), vertices, stride);
        }
        if resource.flags().contains(ResourceFlags::PRIMARY) {
            self.primaries.push(resource.handle());
        }
        self.resources.insert(resource.handle(), resource);
    }

    fn create_resource_from<A: CreateResourceArgs>(&mut self, data: &mut A) -> HRESULT {
        match Resource::create(self.driver.as_ref(), data) {
            Ok(resource) => {
                self.add_resource(resource);
                HResult::S_OK.0
            }
            Err(e) => {
                log::debug!("Resource creation failed: {e}");
                e.hresult()
            }
        }
    }

    pub fn create_resource(&mut self, data: &mut D3DDDIARG_CREATERESOURCE) -> HRESULT {
        self.create_resource_from(data)
    }

    pub fn create_resource2(&mut self, data: &mut D3DDDIARG_CREATERESOURCE2) -> HRESULT {
        self.create_resource_from(data)
    }

    pub fn destroy_resource(&mut self, resource: Handle) -> HRESULT {
        self.flush_primitives();

        if self.services.gdi.is_gdi_resource(resource) {
            let mut lock = D3DDDIARG_LOCK::new(resource, 0, LockFlags::empty());
            if succeeded(self.lock(&mut lock)) {
                self.unlock(&D3DDDIARG_UNLOCK::new(resource, 0));
            }
        }

        if let Some(shadow) = self.resources.get_mut(&resource) {
            shadow.release_locks(self.driver.as_ref());
        }

        if self.shared_primary == Some(resource) {
            self.services.kernel.release_process_vidpn_source_owners();
        }

        let hr = self.driver.destroy_resource(resource);
        if succeeded(hr) {
            self.resources.remove(&resource);
            self.primaries.retain(|&primary| primary != resource);
            self.batcher.remove_resource(resource);
            if self.shared_primary == Some(resource) {
                self.shared_primary = None;
            }
            self.services.gdi.clear_if(resource);
            if matches!(self.render_target, Some((target, _)) if target == resource) {
                self.render_target = None;
            }
        }
        hr
    }

    fn emulate_color_key_blt(&self, data: &D3DDDIARG_BLT) -> Option<HRESULT> {
        if data.Flags.intersects(
            BltFlags::DST_COLOR_KEY | BltFlags::MIRROR_LEFT_RIGHT | BltFlags::MIRROR_UP_DOWN | BltFlags::ROTATE,
        ) {
            return None;
        }
        let src = self.resources.get(&data.hSrcResource)?;
        let dst = self.resources.get(&data.hDstResource)?;
        let src_surface = src.surface(data.SrcSubResourceIndex)?;
        let dst_surface = dst.surface(data.DstSubResourceIndex)?;
        emulate_src_color_key_blt(
            self.driver.as_ref(),
            &BltSurface {
                handle: src.handle(),
                sub_resource: data.SrcSubResourceIndex,
                format: src.format(),
                width: src_surface.width,
                height: src_surface.height,
                rect: data.SrcRect,
            },
            &BltSurface {
                handle: dst.handle(),
                sub_resource: data.DstSubResourceIndex,
                format: dst.format(),
                width: dst_surface.width,
                height: dst_surface.height,
                rect: data.DstRect,
            },
            data.ColorKey,
        )
    }

    pub fn blt(&mut self, data: &D3DDDIARG_BLT) -> HRESULT {
        self.flush_primitives();

        if data.Flags.contains(BltFlags::SRC_COLOR_KEY) && !self.is_src_color_key_supported() {
            if let Some(hr) = self.emulate_color_key_blt(data) {
                return hr;
            }
            self.services
                .diagnostics
                .log_once("Source color keyed blt is not emulated for these surfaces, forwarding it");
        }

        self.prepare_for_rendering(data.hSrcResource, data.SrcSubResourceIndex, true);
        match self.resources.get_mut(&data.hDstResource) {
            Some(dst) => dst.blt(self.driver.as_ref(), data),
            None => self.driver.blt(data),
        }
    }

    pub fn clear(&mut self, data: &D3DDDIARG_CLEAR, rects: &[RECT]) -> HRESULT {
        self.flush_primitives();
        if data.Flags.contains(ClearFlags::TARGET) {
            self.prepare_render_target();
        }
        self.driver.clear(data, rects)
    }

    pub fn color_fill(&mut self, data: &D3DDDIARG_COLORFILL) -> HRESULT {
        self.flush_primitives();
        match self.resources.get_mut(&data.hResource) {
            Some(resource) => resource.color_fill(self.driver.as_ref(), data),
            None => self.driver.color_fill(data),
        }
    }

    pub fn lock(&mut self, data: &mut D3DDDIARG_LOCK) -> HRESULT {
        self.flush_primitives();
        let read_only_gdi = self.services.gdi.read_only_lock();
        match self.resources.get_mut(&data.hResource) {
            Some(resource) => resource.lock(self.driver.as_ref(), data, read_only_gdi),
            None => self.driver.lock(data),
        }
    }

    pub fn unlock(&mut self, data: &D3DDDIARG_UNLOCK) -> HRESULT {
        self.flush_primitives();
        match self.resources.get_mut(&data.hResource) {
            Some(resource) => resource.unlock(self.driver.as_ref(), data),
            None => self.driver.unlock(data),
        }
    }

    pub fn draw_primitive(&mut self, data: &D3DDDIARG_DRAWPRIMITIVE, flag_buffer: *const UINT) -> HRESULT {
        self.prepare_render_target();
        self.batcher.draw_primitive(self.driver.as_ref(), data, flag_buffer)
    }

    pub fn draw_indexed_primitive2(
        &mut self,
        data: &D3DDDIARG_DRAWINDEXEDPRIMITIVE2,
        indices_size: UINT,
        indices: *const c_void,
        flag_buffer: *const UINT,
    ) -> HRESULT {
        self.prepare_render_target();
        self.batcher
            .draw_indexed_primitive2(self.driver.as_ref(), data, indices_size, indices, flag_buffer)
    }

    pub fn present(&mut self, data: &D3DDDIARG_PRESENT) -> HRESULT {
        self.flush_primitives();
        self.prepare_for_rendering(data.hSrcResource, data.SrcSubResourceIndex, true);
        self.driver.present(data)
    }

    pub fn present1(&mut self, data: &mut D3DDDIARG_PRESENT1) -> HRESULT {
        self.flush_primitives();
        let sources = unsafe { data.sources() }.to_vec();
        for source in sources {
            self.prepare_for_rendering(source.hResource, source.SubResourceIndex, true);
        }
        self.driver.present1(data)
    }

    pub fn flush(&mut self) -> HRESULT {
        if !self.services.is_flush_enabled() {
            return HResult::S_OK.0;
        }
        self.flush_primitives();
        self.driver.flush()
    }

    pub fn flush1(&mut self, flags: UINT) -> HRESULT {
        if flags == 0 && !self.services.is_flush_enabled() {
            return HResult::S_OK.0;
        }
        self.flush_primitives();
        self.driver.flush1(flags)
    }

    pub fn set_render_target(&mut self, data: &D3DDDIARG_SETRENDERTARGET) -> HRESULT {
        self.flush_primitives();
        let hr = self.driver.set_render_target(data);
        if succeeded(hr) && data.RenderTargetIndex == 0 {
            self.render_target = (!data.hRenderTarget.is_null()).then_some((data.hRenderTarget, data.SubResourceIndex));
        }
        hr
    }

    /// Submits batched draws, then forwards a state change
    pub fn set_state(&mut self, call: StateCall, args: &[usize]) -> HRESULT {
        self.flush_primitives();
        self.driver.set_state(call, args)
    }

    pub fn set_stream_source(&mut self, data: &D3DDDIARG_SETSTREAMSOURCE) -> HRESULT {
        self.batcher.set_stream_source(self.driver.as_ref(), data)
    }

    pub fn set_stream_source_um(&mut self, data: &D3DDDIARG_SETSTREAMSOURCEUM, vertices: *const c_void) -> HRESULT {
        self.batcher.set_stream_source_um(self.driver.as_ref(), data, vertices)
    }

    pub fn open_resource(&mut self, data: &mut D3DDDIARG_OPENRESOURCE) -> HRESULT {
        let hr = self.driver.open_resource(data);
        if succeeded(hr) {
            self.resources
                .entry(data.hResource)
                .or_insert_with(|| Resource::opened(data.hResource));
            if data.Flags.contains(OpenResourceFlags::FULLSCREEN) {
                self.shared_primary = Some(data.hResource);
            }
        }
        hr
    }

    /// Releases every outstanding lock and destroys the driver device
    pub fn destroy_device(&mut self) -> HRESULT {
        self.flush_primitives();
        let driver = self.driver.as_ref();
        for resource in self.resources.values_mut() {
            resource.release_locks(driver);
        }
        let hr = driver.destroy_device();
        if failed(hr) {
            log::warn!("Destroying device {:?} failed: {}", self.handle, HResult(hr));
        }
        hr
    }
}

/// Every live device, by handle
pub struct DeviceRegistry {
    gdi: Arc<GdiInterop>,
    devices: Mutex<HashMap<Handle, Arc<Mutex<Device>>>>,
}

impl DeviceRegistry {
    pub fn new(gdi: Arc<GdiInterop>) -> Self {
        Self {
            gdi,
            devices: Mutex::new(HashMap::new()),
        }
    }

    pub fn add(&self, device: Device) -> Arc<Mutex<Device>> {
        let handle = device.handle();
        let device = Arc::new(Mutex::new(device));
        if self.devices.lock().insert(handle, Arc::clone(&device)).is_some() {
            log::warn!("Device {handle:?} registered twice, replacing the stale entry");
        }
        device
    }

    pub fn get(&self, device: Handle) -> Option<Arc<Mutex<Device>>> {
        self.devices.lock().get(&device).cloned()
    }

    pub fn remove(&self, device: Handle) -> Option<Arc<Mutex<Device>>> {
        self.devices.lock().remove(&device)
    }

    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The device owning `resource`
    ///
    /// Locks each device in turn; must not be called while holding a device lock.
    pub fn find_resource_device(&self, resource: Handle) -> Option<Arc<Mutex<Device>>> {
        let devices: Vec<_> = self.devices.lock().values().cloned().collect();
        devices
            .into_iter()
            .find(|device| device.lock().resource(resource).is_some())
    }

    /// The device the primary is best presented through
    ///
    /// Prefers a device that opened the shared full-screen primary, then one holding primary
    /// resources. Locks each device in turn; must not be called while holding a device lock.
    pub fn find_display_device(&self) -> Option<Arc<Mutex<Device>>> {
        let devices: Vec<_> = self.devices.lock().values().cloned().collect();
        devices
            .into_iter()
            .filter_map(|device| {
                let rank = {
                    let device = device.lock();
                    if device.shared_primary().is_some() {
                        2
                    } else if !device.primary_resources().is_empty() {
                        1
                    } else {
                        0
                    }
                };
                (rank > 0).then_some((rank, device))
            })
            .max_by_key(|(rank, _)| *rank)
            .map(|(_, device)| device)
    }

    fn set_gdi_flag(&self, resource: Handle, is_gdi_resource: bool) {
        if let Some(device) = self.find_resource_device(resource)
            && let Some(shadow) = device.lock().resource_mut(resource)
        {
            shadow.set_as_gdi_resource(is_gdi_resource);
        }
    }
}

impl GdiDesignation for DeviceRegistry {
    fn set_gdi_resource_handle(&self, resource: Option<Handle>) {
        let previous = self.gdi.replace_resource(resource);
        if previous == resource {
            return;
        }
        if let Some(previous) = previous {
            self.set_gdi_flag(previous, false);
        }
        if let Some(resource) = resource {
            self.set_gdi_flag(resource, true);
        }
    }
}
