//! GDI interop state
//!
//! GDI draws into one driver resource (normally the primary's front buffer). Which resource that
//! is, and whether GDI's locks on it must be read-only, is process-wide state shared by every
//! device.

mod palette;

pub use palette::{PaletteEntry, PaletteTables, SystemPaletteUse, PC_EXPLICIT, PC_NOCOLLAPSE, PC_RESERVED};

use crate::ddi::Handle;
use parking_lot::Mutex;

#[derive(Default, Debug)]
struct GdiState {
    resource: Option<Handle>,
    read_only_lock: bool,
}

/// Moves the GDI designation between driver resources
///
/// Implemented by whatever can reach every device's resources, so the flag on the resource
/// shadows follows the designation.
pub trait GdiDesignation: Send + Sync {
    fn set_gdi_resource_handle(&self, resource: Option<Handle>);
}

/// Current GDI resource designation
#[derive(Default, Debug)]
pub struct GdiInterop {
    state: Mutex<GdiState>,
}

impl GdiInterop {
    pub fn new() -> Self {
        Self::default()
    }

    /// The designated GDI resource, if any
    pub fn resource(&self) -> Option<Handle> {
        self.state.lock().resource
    }

    pub fn is_gdi_resource(&self, resource: Handle) -> bool {
        self.resource() == Some(resource)
    }

    /// Designates `resource` and returns the previous designation
    pub fn replace_resource(&self, resource: Option<Handle>) -> Option<Handle> {
        std::mem::replace(&mut self.state.lock().resource, resource)
    }

    /// Drops the designation if it names `resource`
    pub fn clear_if(&self, resource: Handle) {
        let mut state = self.state.lock();
        if state.resource == Some(resource) {
            state.resource = None;
        }
    }

    pub fn read_only_lock(&self) -> bool {
        self.state.lock().read_only_lock
    }

    /// Makes GDI's locks of the designated resource read-only
    pub fn set_read_only_lock(&self, read_only: bool) {
        self.state.lock().read_only_lock = read_only;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_and_clear() {
        let gdi = GdiInterop::new();
        assert_eq!(gdi.replace_resource(Some(Handle(1))), None);
        assert_eq!(gdi.replace_resource(Some(Handle(2))), Some(Handle(1)));
        gdi.clear_if(Handle(1));
        assert!(gdi.is_gdi_resource(Handle(2)));
        gdi.clear_if(Handle(2));
        assert_eq!(gdi.resource(), None);
    }
}
