//! Declarative dispatch table layouts
//!
//! An interface version is its base's slot list followed by its own trailing members, so a
//! larger version's leading slots are layout-identical to every smaller version it extends.

use std::fmt;

/// Ordered slot list of one interface version
pub struct InterfaceDesc {
    pub name: &'static str,
    pub base: Option<&'static InterfaceDesc>,
    /// Members this version appends to its base, in table order
    pub members: &'static [&'static str],
}

impl InterfaceDesc {
    /// Total number of slots, including every base's
    pub const fn slot_count(&self) -> usize {
        let inherited = match self.base {
            Some(base) => base.slot_count(),
            None => 0,
        };
        inherited + self.members.len()
    }

    /// Every slot name in table order
    pub fn slots(&self) -> Vec<&'static str> {
        let mut slots = self.base.map(|base| base.slots()).unwrap_or_default();
        slots.extend_from_slice(self.members);
        slots
    }

    /// Table index of `member`
    pub fn slot_index(&self, member: &str) -> Option<usize> {
        self.slots().iter().position(|&slot| slot == member)
    }

    /// Name of the version that introduced slot `index`
    pub fn introduced_by(&'static self, index: usize) -> Option<&'static str> {
        let inherited = self.base.map_or(0, |base| base.slot_count());
        if index < inherited {
            self.base.and_then(|base| base.introduced_by(index))
        } else if index < self.slot_count() {
            Some(self.name)
        } else {
            None
        }
    }

    /// True when `self` is `other` or extends it
    pub fn extends(&self, other: &InterfaceDesc) -> bool {
        std::ptr::eq(self, other) || self.base.is_some_and(|base| base.extends(other))
    }

    pub fn has_member(&self, member: &str) -> bool {
        self.slot_index(member).is_some()
    }
}

impl fmt::Debug for InterfaceDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceDesc")
            .field("name", &self.name)
            .field("base", &self.base.map(|base| base.name))
            .field("slots", &self.slot_count())
            .finish()
    }
}

/// Declares an interface version as a `static InterfaceDesc`
///
/// ```ignore
/// interface!(pub IUNKNOWN = "IUnknown" { QueryInterface, AddRef, Release });
/// interface!(pub IDIRECT3DMATERIAL: IUNKNOWN = "IDirect3DMaterial" { Initialize, ... });
/// ```
#[macro_export]
macro_rules! interface {
    ($vis:vis $ident:ident = $name:literal { $($member:ident),* $(,)? }) => {
        $vis static $ident: $crate::vtable::InterfaceDesc = $crate::vtable::InterfaceDesc {
            name: $name,
            base: None,
            members: &[$(stringify!($member)),*],
        };
    };
    ($vis:vis $ident:ident : $base:path = $name:literal { $($member:ident),* $(,)? }) => {
        $vis static $ident: $crate::vtable::InterfaceDesc = $crate::vtable::InterfaceDesc {
            name: $name,
            base: Some(&$base),
            members: &[$(stringify!($member)),*],
        };
    };
}

// ============================================================================
// COM interfaces
// ============================================================================

interface!(pub IUNKNOWN = "IUnknown" { QueryInterface, AddRef, Release });

interface!(pub IDIRECT3DMATERIAL: IUNKNOWN = "IDirect3DMaterial" {
    Initialize,
    SetMaterial,
    GetMaterial,
    GetHandle,
    Reserve,
    Unreserve,
});

interface!(pub IDIRECT3DMATERIAL2: IUNKNOWN = "IDirect3DMaterial2" {
    SetMaterial,
    GetMaterial,
    GetHandle,
});

interface!(pub IDIRECT3DMATERIAL3: IDIRECT3DMATERIAL2 = "IDirect3DMaterial3" {});

interface!(pub IDIRECTDRAWSURFACE: IUNKNOWN = "IDirectDrawSurface" {
    AddAttachedSurface,
    AddOverlayDirtyRect,
    Blt,
    BltBatch,
    BltFast,
    DeleteAttachedSurface,
    EnumAttachedSurfaces,
    EnumOverlayZOrders,
    Flip,
    GetAttachedSurface,
    GetBltStatus,
    GetCaps,
    GetClipper,
    GetColorKey,
    GetDC,
    GetFlipStatus,
    GetOverlayPosition,
    GetPalette,
    GetPixelFormat,
    GetSurfaceDesc,
    Initialize,
    IsLost,
    Lock,
    ReleaseDC,
    Restore,
    SetClipper,
    SetColorKey,
    SetOverlayPosition,
    SetPalette,
    Unlock,
    UpdateOverlay,
    UpdateOverlayDisplay,
    UpdateOverlayZOrder,
});

interface!(pub IDIRECTDRAWSURFACE2: IDIRECTDRAWSURFACE = "IDirectDrawSurface2" {
    GetDDInterface,
    PageLock,
    PageUnlock,
});

interface!(pub IDIRECTDRAWSURFACE3: IDIRECTDRAWSURFACE2 = "IDirectDrawSurface3" {
    SetSurfaceDesc,
});

interface!(pub IDIRECTDRAWSURFACE4: IDIRECTDRAWSURFACE3 = "IDirectDrawSurface4" {
    SetPrivateData,
    GetPrivateData,
    FreePrivateData,
    GetUniquenessValue,
    ChangeUniquenessValue,
});

interface!(pub IDIRECTDRAWSURFACE7: IDIRECTDRAWSURFACE4 = "IDirectDrawSurface7" {
    SetPriority,
    GetPriority,
    SetLOD,
    GetLOD,
});
