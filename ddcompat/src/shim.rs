//! The shim context
//!
//! [`Shim`] owns every registry: installed hooks, opened adapters, live devices, and the primary
//! surface. It is created when the library attaches to a process and installed into one
//! process-global slot, which is how the driver thunks find it.

use crate::ddi::types::{D3DDDIARG_CREATEDEVICE, D3DDDIARG_OPENADAPTER, D3DDDI_PRESENTFLAG_FLIP};
use crate::ddi::{
    device_funcs_index, thunks, Adapter, AdapterFuncs, AdapterRegistry, Device, DeviceRegistry,
    DeviceServices, DriverFuncs, Handle, SystemKernelThunks, D3DDDI_ADAPTERFUNCS, DEVICE_FUNCS_FAMILY,
};
use crate::diag::LogOnce;
use crate::error::{failed, HResult, HookError, ShimError};
use crate::flags::FlipFlags;
use crate::gdi::GdiInterop;
use crate::hook::{HookRegistry, HookTarget, SymbolResolver, SystemResolver};
use crate::primary::{
    DevicePresenter, DisplayModeSource, PrimaryPresenter, PrimaryState, PrimarySurface, SurfaceDesc,
    SystemDisplayMode,
};
use crate::vtable::Interceptor;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};

static SHIM: OnceLock<Shim> = OnceLock::new();

pub struct Shim {
    hooks: HookRegistry,
    adapters: AdapterRegistry,
    devices: Arc<DeviceRegistry>,
    services: DeviceServices,
    primary: Arc<PrimarySurface>,
    adapter_funcs: Interceptor,
    /// One interceptor per `D3DDDI_DEVICEFUNCS` layout, smallest first
    device_funcs: Vec<Interceptor>,
}

impl Shim {
    pub fn new(
        resolver: impl SymbolResolver + 'static,
        services: DeviceServices,
        display: Arc<dyn DisplayModeSource>,
        presenter: impl FnOnce(&Arc<DeviceRegistry>) -> Box<dyn PrimaryPresenter>,
    ) -> Self {
        let devices = Arc::new(DeviceRegistry::new(Arc::clone(&services.gdi)));
        let primary = Arc::new(PrimarySurface::new(presenter(&devices), display, devices.clone()));
        let device_substitutes = thunks::device_substitutes();
        Self {
            hooks: HookRegistry::new(resolver),
            adapters: AdapterRegistry::new(),
            devices,
            services,
            primary,
            adapter_funcs: Interceptor::new(&D3DDDI_ADAPTERFUNCS, thunks::adapter_substitutes()),
            device_funcs: DEVICE_FUNCS_FAMILY
                .iter()
                .map(|&layout| Interceptor::new(layout, device_substitutes.clone()))
                .collect(),
        }
    }

    /// A context wired to the running system
    pub fn with_system_defaults() -> Self {
        let services = DeviceServices::new(
            Arc::new(GdiInterop::new()),
            Arc::new(LogOnce::new()),
            Arc::new(SystemKernelThunks),
        );
        Self::new(
            SystemResolver,
            services,
            Arc::new(SystemDisplayMode),
            |devices| Box::new(DevicePresenter::new(Arc::clone(devices))),
        )
    }

    /// Makes this the process-global context
    ///
    /// Only the first call succeeds; the context then lives for the rest of the process.
    pub fn install(self) -> Result<&'static Shim, ShimError> {
        SHIM.set(self).map_err(|_| ShimError::AlreadyInstalled)?;
        SHIM.get().ok_or(ShimError::AlreadyInstalled)
    }

    /// The process-global context, once installed
    pub fn global() -> Option<&'static Shim> {
        SHIM.get()
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    pub fn devices(&self) -> &Arc<DeviceRegistry> {
        &self.devices
    }

    pub fn services(&self) -> &DeviceServices {
        &self.services
    }

    pub fn primary(&self) -> &Arc<PrimarySurface> {
        &self.primary
    }

    pub fn adapter_interceptor(&self) -> &Interceptor {
        &self.adapter_funcs
    }

    /// Interceptor for the device table layout of `interface_version`
    pub fn device_interceptor(&self, interface_version: u32) -> &Interceptor {
        &self.device_funcs[device_funcs_index(interface_version)]
    }

    /// Starts the primary surface update thread
    pub fn start(&self) -> Result<(), ShimError> {
        self.primary.start_update_thread()?;
        Ok(())
    }

    /// Redirects the `OpenAdapter` entry point of user-mode display driver `module`
    ///
    /// Hooking a module that is already hooked is a no-op. At most
    /// [`MAX_USER_MODE_DISPLAY_DRIVERS`](crate::config::MAX_USER_MODE_DISPLAY_DRIVERS) modules can
    /// be hooked.
    ///
    /// # Safety
    /// `target` must name the module's `OpenAdapter` export or a pointer slot holding it.
    pub unsafe fn hook_user_mode_driver(&self, module: usize, target: HookTarget) -> Result<(), HookError> {
        let (index, thunk) =
            thunks::reserve_open_adapter(module).ok_or_else(|| HookError::NoFreeSlot(target.to_string()))?;
        let description = target.to_string();
        let original = unsafe { self.hooks.install(target, thunk)? };
        thunks::set_open_adapter_original(index, original);
        log::info!("Hooked user-mode display driver {description} (module 0x{module:x})");
        Ok(())
    }

    /// Intercepts the adapter table the driver just filled in and registers the adapter
    ///
    /// # Safety
    /// `data` must be the arguments of a successful `OpenAdapter` call of `module`.
    pub unsafe fn on_open_adapter(&self, module: usize, data: &D3DDDIARG_OPENADAPTER) {
        if data.pAdapterFuncs.is_null() {
            log::warn!("OpenAdapter returned no adapter functions");
            return;
        }
        let originals = unsafe { self.adapter_funcs.install_in_place(module, data.pAdapterFuncs.cast()) };
        let funcs = unsafe { AdapterFuncs::capture(&originals) };
        self.adapters
            .add(Adapter::new(data.hAdapter, module, data.Version, funcs));
        log::info!(
            "Opened adapter {:?} (interface {}, version 0x{:x})",
            data.hAdapter,
            data.Interface,
            data.Version
        );
    }

    /// Intercepts the device table the driver just filled in and registers the device
    ///
    /// # Safety
    /// `data` must be the arguments of a successful `CreateDevice` call on `adapter`.
    pub unsafe fn on_create_device(&self, adapter: &Adapter, data: &D3DDDIARG_CREATEDEVICE) {
        if data.pDeviceFuncs.is_null() {
            log::warn!("CreateDevice returned no device functions");
            return;
        }
        let interceptor = self.device_interceptor(adapter.interface_version());
        let originals = unsafe { interceptor.install_in_place(adapter.module(), data.pDeviceFuncs.cast()) };
        let driver = unsafe { DriverFuncs::capture(data.hDevice, &originals) };
        let device = Device::new(
            data.hDevice,
            adapter.handle(),
            Box::new(driver),
            adapter.ddraw_caps(),
            self.services.clone(),
        );
        self.devices.add(device);
        log::debug!(
            "Created device {:?} on adapter {:?} ({})",
            data.hDevice,
            adapter.handle(),
            interceptor.interface().name
        );
    }

    /// The runtime created a primary resource
    ///
    /// Brings the primary up on it, or restores a lost one. Must not be called while holding a
    /// device lock.
    pub fn on_primary_resource_created(&self, surface_count: u32) {
        let hr = match self.primary.state() {
            PrimaryState::Lost => self.primary.restore(),
            state if state.is_live() => return,
            _ => self
                .primary
                .create(&SurfaceDesc::primary(surface_count.saturating_sub(1))),
        };
        if failed(hr) {
            log::warn!("Primary surface did not follow the runtime's primary: {}", HResult(hr));
        }
    }

    /// `resource` was destroyed; takes the primary down with its front buffer
    pub fn on_resource_destroyed(&self, resource: Handle, was_shared_primary: bool) {
        if was_shared_primary {
            self.primary.set_full_screen(false);
        }
        if self.primary.front() == Some(resource) {
            self.primary.release();
        }
    }

    /// The runtime opened the shared full-screen primary
    pub fn on_shared_primary_opened(&self) {
        self.primary.set_full_screen(true);
    }

    /// `resource` was written to; schedules a screen update when it is the front buffer
    pub fn on_resource_written(&self, resource: Handle) {
        if self.primary.front() == Some(resource) {
            self.primary.schedule_update();
        }
    }

    /// The runtime presented `source`
    ///
    /// A flip to one of the primary's back buffers flips the primary with it.
    pub fn on_present(&self, source: Handle, flags: u32) {
        let Some(chain) = self.primary.chain() else {
            return;
        };
        if source == chain.front {
            self.primary.schedule_update();
        } else if flags & D3DDDI_PRESENTFLAG_FLIP != 0 && chain.contains(source) {
            let hr = self.primary.flip(Some(source), FlipFlags::DONOTWAIT);
            if failed(hr) {
                log::debug!("Primary surface did not follow the runtime's flip: {}", HResult(hr));
            }
        }
    }

    /// Releases the primary if its surfaces live on `device`, before the device goes away
    pub fn on_destroy_device(&self, device: &Mutex<Device>) {
        let Some(front) = self.primary.front() else {
            return;
        };
        let presents = device.lock().resource(front).is_some();
        if presents {
            self.primary.release();
        }
    }

    /// Stops background work and removes every hook
    ///
    /// # Safety
    /// No thread may be executing inside a hooked function.
    pub unsafe fn shutdown(&self) {
        self.primary.stop_update_thread();
        self.primary.release();
        unsafe { self.hooks.uninstall_all() };
        log::info!("Shim shut down");
    }
}
