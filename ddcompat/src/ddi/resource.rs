//! Per-resource shadow state

use super::driver::DriverDevice;
use super::types::*;
use crate::error::{failed, succeeded, HResult, ResourceError, HRESULT};
use crate::flags::{LockFlags, ResourceFlags, UnlockFlags};
use std::ffi::c_void;

/// One surface of a resource, as described at creation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub width: UINT,
    pub height: UINT,
    pub depth: UINT,
    /// Caller-provided system memory, 0 when the driver allocates
    pub sys_mem: usize,
    pub sys_mem_pitch: UINT,
}

impl From<&D3DDDI_SURFACEINFO> for SurfaceInfo {
    fn from(info: &D3DDDI_SURFACEINFO) -> Self {
        Self {
            width: info.Width,
            height: info.Height,
            depth: info.Depth,
            sys_mem: info.pSysMem as usize,
            sys_mem_pitch: info.SysMemPitch,
        }
    }
}

/// An outstanding driver lock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockRecord {
    pub sub_resource: UINT,
    pub address: usize,
    pub pitch: UINT,
}

/// Last way the GPU touched a resource
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GpuAccess {
    #[default]
    None,
    Read,
    Write,
}

/// Creation arguments accepted by [`Resource::create`]
pub trait CreateResourceArgs {
    fn format(&self) -> UINT;
    fn pool(&self) -> UINT;
    fn flags(&self) -> ResourceFlags;
    fn fvf(&self) -> UINT;
    fn resource(&self) -> Handle;
    fn surface_list(&self) -> (*const D3DDDI_SURFACEINFO, UINT);
    /// Forwards the creation to the driver, which fills in the resource handle
    fn create_with(&mut self, driver: &dyn DriverDevice) -> HRESULT;
}

macro_rules! impl_create_resource_args {
    ($ty:ty, $create:ident) => {
        impl CreateResourceArgs for $ty {
            fn format(&self) -> UINT {
                self.Format
            }

            fn pool(&self) -> UINT {
                self.Pool
            }

            fn flags(&self) -> ResourceFlags {
                self.Flags
            }

            fn fvf(&self) -> UINT {
                self.Fvf
            }

            fn resource(&self) -> Handle {
                self.hResource
            }

            fn surface_list(&self) -> (*const D3DDDI_SURFACEINFO, UINT) {
                (self.pSurfList, self.SurfCount)
            }

            fn create_with(&mut self, driver: &dyn DriverDevice) -> HRESULT {
                driver.$create(self)
            }
        }
    };
}

impl_create_resource_args!(D3DDDIARG_CREATERESOURCE, create_resource);
impl_create_resource_args!(D3DDDIARG_CREATERESOURCE2, create_resource2);

/// Shadow state of one driver resource
#[derive(Debug)]
pub struct Resource {
    handle: Handle,
    format: UINT,
    pool: UINT,
    flags: ResourceFlags,
    fvf: UINT,
    surfaces: Vec<SurfaceInfo>,
    is_gdi_resource: bool,
    locks: Vec<LockRecord>,
    last_gpu_access: GpuAccess,
}

impl Resource {
    /// Creates the driver resource described by `data` and its shadow
    ///
    /// Nothing is kept when the driver refuses; the driver's code comes back inside
    /// [`ResourceError::Driver`].
    pub fn create<A: CreateResourceArgs>(
        driver: &dyn DriverDevice,
        data: &mut A,
    ) -> Result<Resource, ResourceError> {
        let (list, count) = data.surface_list();
        if count > 0 && list.is_null() {
            return Err(ResourceError::InvalidArguments("surface list is null"));
        }
        let surfaces = if count == 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(list, count as usize) }
                .iter()
                .map(SurfaceInfo::from)
                .collect()
        };

        let hr = data.create_with(driver);
        if failed(hr) {
            return Err(ResourceError::Driver(HResult(hr)));
        }

        Ok(Resource {
            handle: data.resource(),
            format: data.format(),
            pool: data.pool(),
            flags: data.flags(),
            fvf: data.fvf(),
            surfaces,
            is_gdi_resource: false,
            locks: Vec::new(),
            last_gpu_access: GpuAccess::None,
        })
    }

    /// Shadow for a resource opened rather than created; the driver owns its description
    pub fn opened(handle: Handle) -> Resource {
        Resource {
            handle,
            format: D3DDDIFMT_UNKNOWN,
            pool: D3DDDIPOOL_VIDEOMEMORY,
            flags: ResourceFlags::SHARED_RESOURCE,
            fvf: 0,
            surfaces: Vec::new(),
            is_gdi_resource: false,
            locks: Vec::new(),
            last_gpu_access: GpuAccess::None,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn format(&self) -> UINT {
        self.format
    }

    pub fn pool(&self) -> UINT {
        self.pool
    }

    pub fn flags(&self) -> ResourceFlags {
        self.flags
    }

    pub fn surfaces(&self) -> &[SurfaceInfo] {
        &self.surfaces
    }

    pub fn surface(&self, sub_resource: UINT) -> Option<&SurfaceInfo> {
        self.surfaces.get(sub_resource as usize)
    }

    pub fn is_gdi_resource(&self) -> bool {
        self.is_gdi_resource
    }

    pub fn set_as_gdi_resource(&mut self, is_gdi_resource: bool) {
        self.is_gdi_resource = is_gdi_resource;
    }

    pub fn locks(&self) -> &[LockRecord] {
        &self.locks
    }

    pub fn last_gpu_access(&self) -> GpuAccess {
        self.last_gpu_access
    }

    /// Caller memory and vertex stride of a system-memory vertex buffer
    pub fn sys_mem_vertex_buffer(&self) -> Option<(*const c_void, UINT)> {
        if !self.flags.contains(ResourceFlags::VERTEX_BUFFER) || self.pool != D3DDDIPOOL_SYSTEMMEM {
            return None;
        }
        let surface = self.surfaces.first().filter(|s| s.sys_mem != 0)?;
        Some((surface.sys_mem as *const c_void, fvf_stride(self.fvf)))
    }

    pub fn lock(&mut self, driver: &dyn DriverDevice, data: &mut D3DDDIARG_LOCK, read_only_gdi: bool) -> HRESULT {
        if self.is_gdi_resource && read_only_gdi {
            data.Flags.insert(LockFlags::READ_ONLY);
        }
        let hr = driver.lock(data);
        if succeeded(hr) && !data.Flags.contains(LockFlags::NOTIFY_ONLY) {
            self.locks.push(LockRecord {
                sub_resource: data.SubResourceIndex,
                address: data.pSurfData as usize,
                pitch: data.Pitch,
            });
        }
        hr
    }

    pub fn unlock(&mut self, driver: &dyn DriverDevice, data: &D3DDDIARG_UNLOCK) -> HRESULT {
        let hr = driver.unlock(data);
        if succeeded(hr)
            && !data.Flags.contains(UnlockFlags::NOTIFY_ONLY)
            && let Some(index) = self
                .locks
                .iter()
                .rposition(|lock| lock.sub_resource == data.SubResourceIndex)
        {
            self.locks.remove(index);
        }
        hr
    }

    /// Unlocks every outstanding lock, newest first
    pub fn release_locks(&mut self, driver: &dyn DriverDevice) {
        while let Some(lock) = self.locks.pop() {
            let hr = driver.unlock(&D3DDDIARG_UNLOCK::new(self.handle, lock.sub_resource));
            if failed(hr) {
                log::warn!(
                    "Failed to release lock on resource {:?}/{}: {}",
                    self.handle,
                    lock.sub_resource,
                    HResult(hr)
                );
            }
        }
    }

    /// Notes that the GPU is about to read or write this resource
    pub fn prepare_for_rendering(&mut self, sub_resource: UINT, is_read_only: bool) {
        if self.locks.iter().any(|lock| lock.sub_resource == sub_resource) {
            log::debug!(
                "Resource {:?}/{} used by the GPU while locked",
                self.handle,
                sub_resource
            );
        }
        self.last_gpu_access = if is_read_only {
            GpuAccess::Read
        } else {
            GpuAccess::Write
        };
    }

    pub fn blt(&mut self, driver: &dyn DriverDevice, data: &D3DDDIARG_BLT) -> HRESULT {
        self.prepare_for_rendering(data.DstSubResourceIndex, false);
        driver.blt(data)
    }

    pub fn color_fill(&mut self, driver: &dyn DriverDevice, data: &D3DDDIARG_COLORFILL) -> HRESULT {
        self.prepare_for_rendering(data.SubResourceIndex, false);
        driver.color_fill(data)
    }
}
