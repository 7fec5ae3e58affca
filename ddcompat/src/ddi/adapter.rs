//! Opened driver adapters

use super::types::*;
use crate::error::{failed, HResult, HRESULT};
use crate::vtable::OriginalTable;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Typed originals of an adapter's function table
#[derive(Clone, Copy, Default)]
pub struct AdapterFuncs {
    pub get_caps: Option<PFND3DDDI_GETCAPS>,
    pub create_device: Option<PFND3DDDI_CREATEDEVICE>,
    pub close_adapter: Option<PFND3DDDI_CLOSEADAPTER>,
}

impl AdapterFuncs {
    /// # Safety
    /// `originals` must have been captured from a genuine `D3DDDI_ADAPTERFUNCS` table.
    pub unsafe fn capture(originals: &OriginalTable) -> Self {
        unsafe {
            Self {
                get_caps: originals.typed("pfnGetCaps"),
                create_device: originals.typed("pfnCreateDevice"),
                close_adapter: originals.typed("pfnCloseAdapter"),
            }
        }
    }
}

/// One opened adapter
pub struct Adapter {
    handle: Handle,
    module: usize,
    interface_version: UINT,
    funcs: AdapterFuncs,
}

impl Adapter {
    pub fn new(handle: Handle, module: usize, interface_version: UINT, funcs: AdapterFuncs) -> Self {
        Self {
            handle,
            module,
            interface_version,
            funcs,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// The driver module that opened this adapter
    pub fn module(&self) -> usize {
        self.module
    }

    /// DDI interface version the runtime opened the adapter with
    pub fn interface_version(&self) -> UINT {
        self.interface_version
    }

    pub fn get_caps(&self, data: *const D3DDDIARG_GETCAPS) -> HRESULT {
        match self.funcs.get_caps {
            Some(get_caps) => unsafe { get_caps(self.handle, data) },
            None => HResult::E_NOTIMPL.0,
        }
    }

    pub fn create_device(&self, data: *mut D3DDDIARG_CREATEDEVICE) -> HRESULT {
        match self.funcs.create_device {
            Some(create_device) => unsafe { create_device(self.handle, data) },
            None => HResult::E_NOTIMPL.0,
        }
    }

    pub fn close(&self) -> HRESULT {
        match self.funcs.close_adapter {
            Some(close_adapter) => unsafe { close_adapter(self.handle) },
            None => HResult::E_NOTIMPL.0,
        }
    }

    /// DirectDraw capabilities as the driver reports them
    pub fn ddraw_caps(&self) -> DDRAW_CAPS {
        let mut caps = DDRAW_CAPS::default();
        let data = D3DDDIARG_GETCAPS {
            Type: D3DDDICAPS_DDRAW,
            pInfo: std::ptr::null_mut(),
            pData: (&mut caps as *mut DDRAW_CAPS).cast(),
            DataSize: std::mem::size_of::<DDRAW_CAPS>() as UINT,
        };
        let hr = self.get_caps(&data);
        if failed(hr) {
            log::warn!("Failed to query DirectDraw caps of adapter {:?}: {}", self.handle, HResult(hr));
            return DDRAW_CAPS::default();
        }
        caps
    }
}

/// Every opened adapter, by handle
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Mutex<HashMap<Handle, Arc<Adapter>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, adapter: Adapter) -> Arc<Adapter> {
        let adapter = Arc::new(adapter);
        self.adapters.lock().insert(adapter.handle(), Arc::clone(&adapter));
        adapter
    }

    pub fn get(&self, adapter: Handle) -> Option<Arc<Adapter>> {
        self.adapters.lock().get(&adapter).cloned()
    }

    pub fn remove(&self, adapter: Handle) -> Option<Arc<Adapter>> {
        self.adapters.lock().remove(&adapter)
    }

    pub fn len(&self) -> usize {
        self.adapters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddi::funcs::D3DDDI_ADAPTERFUNCS;
    use pretty_assertions::assert_eq;

    unsafe extern "system" fn get_caps(_: Handle, data: *const D3DDDIARG_GETCAPS) -> HRESULT {
        let data = unsafe { &*data };
        if data.Type != D3DDDICAPS_DDRAW {
            return HResult::E_INVALIDARG.0;
        }
        unsafe {
            (*data.pData.cast::<DDRAW_CAPS>()).CKeyCaps = DDRAW_CKEYCAPS_SRCBLT;
        }
        0
    }

    #[test]
    fn test_ddraw_caps_through_captured_original() {
        let slots: Box<[usize]> = vec![get_caps as PFND3DDDI_GETCAPS as usize, 0, 0].into();
        let originals = OriginalTable::new(&D3DDDI_ADAPTERFUNCS, slots);
        let funcs = unsafe { AdapterFuncs::capture(&originals) };
        assert!(funcs.create_device.is_none());

        let adapter = Adapter::new(Handle(1), 0x1000, 0x4002, funcs);
        assert_eq!(adapter.ddraw_caps().CKeyCaps, DDRAW_CKEYCAPS_SRCBLT);
        assert_eq!(adapter.close(), HResult::E_NOTIMPL.0);
    }

    #[test]
    fn test_registry_round_trip() {
        let registry = AdapterRegistry::new();
        registry.add(Adapter::new(Handle(5), 0x1000, 0x2003, AdapterFuncs::default()));
        assert_eq!(registry.get(Handle(5)).map(|a| a.interface_version()), Some(0x2003));
        assert!(registry.remove(Handle(5)).is_some());
        assert!(registry.is_empty());
    }
}
