//! User-mode display driver argument structures
//!
//! Layouts follow `d3dumddi.h`; every structure crossing the driver boundary is `repr(C)`.

use crate::error::HRESULT;
use crate::flags::{BltFlags, ClearFlags, LockFlags, OpenResourceFlags, ResourceFlags, UnlockFlags};
use std::ffi::c_void;

pub type UINT = u32;

/// Opaque driver or runtime handle
///
/// Stored as an integer so registries keyed by handles stay `Send`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, PartialOrd, Ord)]
pub struct Handle(pub usize);

impl Handle {
    pub const NULL: Handle = Handle(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    pub fn from_ptr(ptr: *mut c_void) -> Self {
        Handle(ptr as usize)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct RECT {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl RECT {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

// ============================================================================
// Formats and pools
// ============================================================================

pub const D3DDDIFMT_UNKNOWN: UINT = 0;
pub const D3DDDIFMT_R8G8B8: UINT = 20;
pub const D3DDDIFMT_A8R8G8B8: UINT = 21;
pub const D3DDDIFMT_X8R8G8B8: UINT = 22;
pub const D3DDDIFMT_R5G6B5: UINT = 23;
pub const D3DDDIFMT_X1R5G5B5: UINT = 24;
pub const D3DDDIFMT_A1R5G5B5: UINT = 25;
pub const D3DDDIFMT_A4R4G4B4: UINT = 26;
pub const D3DDDIFMT_P8: UINT = 41;
pub const D3DDDIFMT_L8: UINT = 50;
pub const D3DDDIFMT_VERTEXDATA: UINT = 100;

pub const D3DDDIPOOL_SYSTEMMEM: UINT = 1;
pub const D3DDDIPOOL_VIDEOMEMORY: UINT = 2;
pub const D3DDDIPOOL_LOCALVIDMEM: UINT = 3;
pub const D3DDDIPOOL_NONLOCALVIDMEM: UINT = 4;

pub const D3DDDI_ROTATION_IDENTITY: UINT = 1;

/// Bytes per pixel of the formats the shim reads or writes on the CPU
pub fn format_bytes_per_pixel(format: UINT) -> Option<usize> {
    match format {
        D3DDDIFMT_A8R8G8B8 | D3DDDIFMT_X8R8G8B8 => Some(4),
        D3DDDIFMT_R8G8B8 => Some(3),
        D3DDDIFMT_R5G6B5 | D3DDDIFMT_X1R5G5B5 | D3DDDIFMT_A1R5G5B5 | D3DDDIFMT_A4R4G4B4 => Some(2),
        D3DDDIFMT_P8 | D3DDDIFMT_L8 => Some(1),
        _ => None,
    }
}

// ============================================================================
// Primitive types
// ============================================================================

pub const D3DPT_POINTLIST: UINT = 1;
pub const D3DPT_LINELIST: UINT = 2;
pub const D3DPT_LINESTRIP: UINT = 3;
pub const D3DPT_TRIANGLELIST: UINT = 4;
pub const D3DPT_TRIANGLESTRIP: UINT = 5;
pub const D3DPT_TRIANGLEFAN: UINT = 6;

// ============================================================================
// Resources
// ============================================================================

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct D3DDDI_SURFACEINFO {
    pub Width: UINT,
    pub Height: UINT,
    pub Depth: UINT,
    pub pSysMem: *const c_void,
    pub SysMemPitch: UINT,
    pub SysMemSlicePitch: UINT,
}

impl Default for D3DDDI_SURFACEINFO {
    fn default() -> Self {
        Self {
            Width: 0,
            Height: 0,
            Depth: 0,
            pSysMem: std::ptr::null(),
            SysMemPitch: 0,
            SysMemSlicePitch: 0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct D3DDDI_RATIONAL {
    pub Numerator: UINT,
    pub Denominator: UINT,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct D3DDDIARG_CREATERESOURCE {
    pub Format: UINT,
    pub Pool: UINT,
    pub MultisampleType: UINT,
    pub MultisampleQuality: UINT,
    pub pSurfList: *const D3DDDI_SURFACEINFO,
    pub SurfCount: UINT,
    pub MipLevels: UINT,
    pub Fvf: UINT,
    pub VidPnSourceId: UINT,
    pub RefreshRate: D3DDDI_RATIONAL,
    pub hResource: Handle,
    pub Flags: ResourceFlags,
    pub Rotation: UINT,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct D3DDDIARG_CREATERESOURCE2 {
    pub Format: UINT,
    pub Pool: UINT,
    pub MultisampleType: UINT,
    pub MultisampleQuality: UINT,
    pub pSurfList: *const D3DDDI_SURFACEINFO,
    pub SurfCount: UINT,
    pub MipLevels: UINT,
    pub Fvf: UINT,
    pub VidPnSourceId: UINT,
    pub RefreshRate: D3DDDI_RATIONAL,
    pub hResource: Handle,
    pub Flags: ResourceFlags,
    pub Rotation: UINT,
    pub Flags2: UINT,
}

impl D3DDDIARG_CREATERESOURCE2 {
    /// Builds arguments for `surfaces` with every other field defaulted
    pub fn new(format: UINT, pool: UINT, flags: ResourceFlags, surfaces: &[D3DDDI_SURFACEINFO]) -> Self {
        Self {
            Format: format,
            Pool: pool,
            MultisampleType: 0,
            MultisampleQuality: 0,
            pSurfList: surfaces.as_ptr(),
            SurfCount: surfaces.len() as UINT,
            MipLevels: 1,
            Fvf: 0,
            VidPnSourceId: 0,
            RefreshRate: D3DDDI_RATIONAL::default(),
            hResource: Handle::NULL,
            Flags: flags,
            Rotation: D3DDDI_ROTATION_IDENTITY,
            Flags2: 0,
        }
    }
}

impl D3DDDIARG_CREATERESOURCE {
    pub fn new(format: UINT, pool: UINT, flags: ResourceFlags, surfaces: &[D3DDDI_SURFACEINFO]) -> Self {
        Self {
            Format: format,
            Pool: pool,
            MultisampleType: 0,
            MultisampleQuality: 0,
            pSurfList: surfaces.as_ptr(),
            SurfCount: surfaces.len() as UINT,
            MipLevels: 1,
            Fvf: 0,
            VidPnSourceId: 0,
            RefreshRate: D3DDDI_RATIONAL::default(),
            hResource: Handle::NULL,
            Flags: flags,
            Rotation: D3DDDI_ROTATION_IDENTITY,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct D3DDDI_OPENALLOCATIONINFO {
    pub hKMAllocation: UINT,
    pub pPrivateDriverData: *const c_void,
    pub PrivateDriverDataSize: UINT,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct D3DDDIARG_OPENRESOURCE {
    pub NumAllocations: UINT,
    pub pOpenAllocationInfo: *mut D3DDDI_OPENALLOCATIONINFO,
    pub hKMResource: UINT,
    pub pPrivateDriverData: *mut c_void,
    pub PrivateDriverDataSize: UINT,
    pub hResource: Handle,
    pub Rotation: UINT,
    pub Flags: OpenResourceFlags,
}

impl Default for D3DDDIARG_OPENRESOURCE {
    fn default() -> Self {
        Self {
            NumAllocations: 0,
            pOpenAllocationInfo: std::ptr::null_mut(),
            hKMResource: 0,
            pPrivateDriverData: std::ptr::null_mut(),
            PrivateDriverDataSize: 0,
            hResource: Handle::NULL,
            Rotation: D3DDDI_ROTATION_IDENTITY,
            Flags: OpenResourceFlags::empty(),
        }
    }
}

// ============================================================================
// Lock / unlock
// ============================================================================

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct D3DDDIBOX {
    pub Left: UINT,
    pub Top: UINT,
    pub Right: UINT,
    pub Bottom: UINT,
    pub Front: UINT,
    pub Back: UINT,
}

/// Locked region: a byte range, a rectangle, or a box
#[repr(C)]
#[derive(Clone, Copy)]
pub union D3DDDI_LOCKREGION {
    pub Range: D3DDDIRANGE,
    pub Area: RECT,
    pub Box: D3DDDIBOX,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct D3DDDIRANGE {
    pub Offset: UINT,
    pub Size: UINT,
}

impl Default for D3DDDI_LOCKREGION {
    fn default() -> Self {
        D3DDDI_LOCKREGION {
            Box: D3DDDIBOX::default(),
        }
    }
}

impl std::fmt::Debug for D3DDDI_LOCKREGION {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("D3DDDI_LOCKREGION")
            .field("Box", unsafe { &self.Box })
            .finish()
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct D3DDDIARG_LOCK {
    pub hResource: Handle,
    pub SubResourceIndex: UINT,
    pub Region: D3DDDI_LOCKREGION,
    pub pSurfData: *mut c_void,
    pub Pitch: UINT,
    pub SlicePitch: UINT,
    pub Flags: LockFlags,
}

impl D3DDDIARG_LOCK {
    pub fn new(resource: Handle, sub_resource: UINT, flags: LockFlags) -> Self {
        Self {
            hResource: resource,
            SubResourceIndex: sub_resource,
            Region: D3DDDI_LOCKREGION::default(),
            pSurfData: std::ptr::null_mut(),
            Pitch: 0,
            SlicePitch: 0,
            Flags: flags,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct D3DDDIARG_UNLOCK {
    pub hResource: Handle,
    pub SubResourceIndex: UINT,
    pub Flags: UnlockFlags,
}

impl D3DDDIARG_UNLOCK {
    pub fn new(resource: Handle, sub_resource: UINT) -> Self {
        Self {
            hResource: resource,
            SubResourceIndex: sub_resource,
            Flags: UnlockFlags::empty(),
        }
    }
}

// ============================================================================
// Blt / fill / clear
// ============================================================================

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct D3DDDIARG_BLT {
    pub hSrcResource: Handle,
    pub SrcSubResourceIndex: UINT,
    pub SrcRect: RECT,
    pub hDstResource: Handle,
    pub DstSubResourceIndex: UINT,
    pub DstRect: RECT,
    pub Flags: BltFlags,
    pub ColorKey: UINT,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct D3DDDIARG_COLORFILL {
    pub hResource: Handle,
    pub SubResourceIndex: UINT,
    pub DstRect: RECT,
    pub Color: UINT,
    pub Flags: UINT,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct D3DDDIARG_CLEAR {
    pub Flags: ClearFlags,
    pub FillColor: UINT,
    pub FillDepth: f32,
    pub FillStencil: UINT,
}

// ============================================================================
// Draw
// ============================================================================

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct D3DDDIARG_DRAWPRIMITIVE {
    pub PrimitiveType: UINT,
    pub VStart: UINT,
    pub PrimitiveCount: UINT,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct D3DDDIARG_DRAWINDEXEDPRIMITIVE2 {
    pub PrimitiveType: UINT,
    pub BaseVertexOffset: i32,
    pub MinIndex: UINT,
    pub NumVertices: UINT,
    pub StartIndexOffset: UINT,
    pub PrimitiveCount: UINT,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct D3DDDIARG_SETSTREAMSOURCE {
    pub Stream: UINT,
    pub hVertexBuffer: Handle,
    pub Offset: UINT,
    pub Stride: UINT,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct D3DDDIARG_SETSTREAMSOURCEUM {
    pub Stream: UINT,
    pub Stride: UINT,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct D3DDDIARG_SETRENDERTARGET {
    pub RenderTargetIndex: UINT,
    pub hRenderTarget: Handle,
    pub SubResourceIndex: UINT,
}

// ============================================================================
// Present
// ============================================================================

/// D3DDDIARG_PRESENT flag: copy the source to the destination
pub const D3DDDI_PRESENTFLAG_BLT: UINT = 1 << 0;
/// D3DDDIARG_PRESENT flag: make the source the scanned-out surface
pub const D3DDDI_PRESENTFLAG_FLIP: UINT = 1 << 2;

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct D3DDDIARG_PRESENT {
    pub hSrcResource: Handle,
    pub SrcSubResourceIndex: UINT,
    pub hDstResource: Handle,
    pub DstSubResourceIndex: UINT,
    pub hContext: Handle,
    pub Flags: UINT,
    pub FlipInterval: UINT,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct D3DDDIARG_PRESENTSURFACE {
    pub hResource: Handle,
    pub SubResourceIndex: UINT,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct D3DDDIARG_PRESENT1 {
    pub phSrcResources: *const D3DDDIARG_PRESENTSURFACE,
    pub SrcResources: UINT,
    pub hDstResource: Handle,
    pub DstSubResourceIndex: UINT,
    pub hContext: Handle,
    pub Flags: UINT,
    pub FlipInterval: UINT,
    pub Reserved: UINT,
    pub pDirtyRects: *const RECT,
    pub DirtyRects: UINT,
}

impl D3DDDIARG_PRESENT1 {
    /// Source surfaces named by this present
    ///
    /// # Safety
    /// `phSrcResources` must point to `SrcResources` valid entries.
    pub unsafe fn sources(&self) -> &[D3DDDIARG_PRESENTSURFACE] {
        if self.phSrcResources.is_null() || self.SrcResources == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.phSrcResources, self.SrcResources as usize) }
    }
}

// ============================================================================
// Adapter / device creation
// ============================================================================

pub const D3DDDICAPS_DDRAW: UINT = 1;

pub const DDRAW_CKEYCAPS_SRCBLT: UINT = 0x0000_0002;
pub const DDRAW_FXCAPS_BLTMIRRORLEFTRIGHT: UINT = 0x0000_0001;
pub const DDRAW_FXCAPS_BLTMIRRORUPDOWN: UINT = 0x0000_0002;

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct DDRAW_CAPS {
    pub Caps: UINT,
    pub Caps2: UINT,
    pub CKeyCaps: UINT,
    pub FxCaps: UINT,
    pub MaxVideoPorts: UINT,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct D3DDDIARG_GETCAPS {
    pub Type: UINT,
    pub pInfo: *mut c_void,
    pub pData: *mut c_void,
    pub DataSize: UINT,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct D3DDDIARG_CREATEDEVICE {
    pub hDevice: Handle,
    pub Interface: UINT,
    pub Version: UINT,
    pub pCallbacks: *const c_void,
    pub pCommandBuffer: *mut c_void,
    pub CommandBufferSize: UINT,
    pub pAllocationList: *mut c_void,
    pub AllocationListSize: UINT,
    pub pPatchLocationList: *mut c_void,
    pub PatchLocationListSize: UINT,
    pub pDeviceFuncs: *mut c_void,
    pub Flags: UINT,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct D3DDDIARG_OPENADAPTER {
    pub hAdapter: Handle,
    pub Interface: UINT,
    pub Version: UINT,
    pub pAdapterCallbacks: *const c_void,
    pub pAdapterFuncs: *mut c_void,
    pub DriverVersion: UINT,
}

// ============================================================================
// Driver entry point signatures
// ============================================================================

pub type PFND3DDDI_OPENADAPTER = unsafe extern "system" fn(*mut D3DDDIARG_OPENADAPTER) -> HRESULT;

pub type PFND3DDDI_GETCAPS = unsafe extern "system" fn(Handle, *const D3DDDIARG_GETCAPS) -> HRESULT;
pub type PFND3DDDI_CREATEDEVICE =
    unsafe extern "system" fn(Handle, *mut D3DDDIARG_CREATEDEVICE) -> HRESULT;
pub type PFND3DDDI_CLOSEADAPTER = unsafe extern "system" fn(Handle) -> HRESULT;

pub type PFND3DDDI_BLT = unsafe extern "system" fn(Handle, *const D3DDDIARG_BLT) -> HRESULT;
pub type PFND3DDDI_CLEAR =
    unsafe extern "system" fn(Handle, *const D3DDDIARG_CLEAR, UINT, *const RECT) -> HRESULT;
pub type PFND3DDDI_COLORFILL =
    unsafe extern "system" fn(Handle, *const D3DDDIARG_COLORFILL) -> HRESULT;
pub type PFND3DDDI_CREATERESOURCE =
    unsafe extern "system" fn(Handle, *mut D3DDDIARG_CREATERESOURCE) -> HRESULT;
pub type PFND3DDDI_CREATERESOURCE2 =
    unsafe extern "system" fn(Handle, *mut D3DDDIARG_CREATERESOURCE2) -> HRESULT;
pub type PFND3DDDI_DESTROYDEVICE = unsafe extern "system" fn(Handle) -> HRESULT;
pub type PFND3DDDI_DESTROYRESOURCE = unsafe extern "system" fn(Handle, Handle) -> HRESULT;
pub type PFND3DDDI_DRAWINDEXEDPRIMITIVE2 = unsafe extern "system" fn(
    Handle,
    *const D3DDDIARG_DRAWINDEXEDPRIMITIVE2,
    UINT,
    *const c_void,
    *const UINT,
) -> HRESULT;
pub type PFND3DDDI_DRAWPRIMITIVE =
    unsafe extern "system" fn(Handle, *const D3DDDIARG_DRAWPRIMITIVE, *const UINT) -> HRESULT;
pub type PFND3DDDI_FLUSH = unsafe extern "system" fn(Handle) -> HRESULT;
pub type PFND3DDDI_FLUSH1 = unsafe extern "system" fn(Handle, UINT) -> HRESULT;
pub type PFND3DDDI_LOCK = unsafe extern "system" fn(Handle, *mut D3DDDIARG_LOCK) -> HRESULT;
pub type PFND3DDDI_OPENRESOURCE =
    unsafe extern "system" fn(Handle, *mut D3DDDIARG_OPENRESOURCE) -> HRESULT;
pub type PFND3DDDI_PRESENT = unsafe extern "system" fn(Handle, *const D3DDDIARG_PRESENT) -> HRESULT;
pub type PFND3DDDI_PRESENT1 = unsafe extern "system" fn(Handle, *mut D3DDDIARG_PRESENT1) -> HRESULT;
pub type PFND3DDDI_SETRENDERTARGET =
    unsafe extern "system" fn(Handle, *const D3DDDIARG_SETRENDERTARGET) -> HRESULT;
pub type PFND3DDDI_SETSTREAMSOURCE =
    unsafe extern "system" fn(Handle, *const D3DDDIARG_SETSTREAMSOURCE) -> HRESULT;
pub type PFND3DDDI_SETSTREAMSOURCEUM =
    unsafe extern "system" fn(Handle, *const D3DDDIARG_SETSTREAMSOURCEUM, *const c_void) -> HRESULT;
pub type PFND3DDDI_UNLOCK = unsafe extern "system" fn(Handle, *const D3DDDIARG_UNLOCK) -> HRESULT;

// ============================================================================
// Vertex formats
// ============================================================================

pub const D3DFVF_POSITION_MASK: UINT = 0x400E;
pub const D3DFVF_XYZ: UINT = 0x002;
pub const D3DFVF_XYZRHW: UINT = 0x004;
pub const D3DFVF_XYZB1: UINT = 0x006;
pub const D3DFVF_XYZB2: UINT = 0x008;
pub const D3DFVF_XYZB3: UINT = 0x00a;
pub const D3DFVF_XYZB4: UINT = 0x00c;
pub const D3DFVF_XYZB5: UINT = 0x00e;
pub const D3DFVF_XYZW: UINT = 0x4002;
pub const D3DFVF_NORMAL: UINT = 0x010;
pub const D3DFVF_PSIZE: UINT = 0x020;
pub const D3DFVF_DIFFUSE: UINT = 0x040;
pub const D3DFVF_SPECULAR: UINT = 0x080;
pub const D3DFVF_TEXCOUNT_MASK: UINT = 0xf00;
pub const D3DFVF_TEXCOUNT_SHIFT: UINT = 8;

/// Vertex stride in bytes described by a flexible vertex format code
pub fn fvf_stride(fvf: UINT) -> UINT {
    let position = match fvf & D3DFVF_POSITION_MASK {
        D3DFVF_XYZ => 12,
        D3DFVF_XYZRHW | D3DFVF_XYZW | D3DFVF_XYZB1 => 16,
        D3DFVF_XYZB2 => 20,
        D3DFVF_XYZB3 => 24,
        D3DFVF_XYZB4 => 28,
        D3DFVF_XYZB5 => 32,
        _ => 0,
    };

    let mut stride = position;
    if fvf & D3DFVF_NORMAL != 0 {
        stride += 12;
    }
    if fvf & D3DFVF_PSIZE != 0 {
        stride += 4;
    }
    if fvf & D3DFVF_DIFFUSE != 0 {
        stride += 4;
    }
    if fvf & D3DFVF_SPECULAR != 0 {
        stride += 4;
    }

    let tex_count = (fvf & D3DFVF_TEXCOUNT_MASK) >> D3DFVF_TEXCOUNT_SHIFT;
    for i in 0..tex_count.min(8) {
        // Two size bits per coordinate set, 0 meaning two floats
        let floats = match (fvf >> (16 + 2 * i)) & 3 {
            0 => 2,
            1 => 3,
            2 => 4,
            _ => 1,
        };
        stride += floats * 4;
    }
    stride
}

/// Vertices consumed by `count` primitives of `primitive_type`
///
/// `None` if the count does not fit in a `UINT`.
pub fn vertex_count(primitive_type: UINT, count: UINT) -> Option<UINT> {
    match primitive_type {
        D3DPT_POINTLIST => Some(count),
        D3DPT_LINELIST => count.checked_mul(2),
        D3DPT_LINESTRIP => count.checked_add(1),
        D3DPT_TRIANGLELIST => count.checked_mul(3),
        D3DPT_TRIANGLESTRIP | D3DPT_TRIANGLEFAN => count.checked_add(2),
        _ => Some(0),
    }
}

/// True for primitive types whose primitives are independent and can be concatenated
pub fn is_list_primitive(primitive_type: UINT) -> bool {
    matches!(
        primitive_type,
        D3DPT_POINTLIST | D3DPT_LINELIST | D3DPT_TRIANGLELIST
    )
}
