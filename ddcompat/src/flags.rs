//! Driver and DirectDraw flag words

use bitflags::bitflags;

bitflags! {
    /// D3DDDI_RESOURCEFLAGS bit field
    ///
    /// Only the bits the shim inspects are named; all other bits pass through untouched.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceFlags: u32 {
        const RENDER_TARGET = 1 << 0;
        const ZBUFFER = 1 << 1;
        const DYNAMIC = 1 << 2;
        const HINT_STATIC = 1 << 3;
        const AUTO_GEN_MIPMAP = 1 << 4;
        const DMAP = 1 << 5;
        const WRITE_ONLY = 1 << 6;
        const NOT_LOCKABLE = 1 << 7;
        const POINTS = 1 << 8;
        const RT_PATCHES = 1 << 9;
        const NPATCHES = 1 << 10;
        const SHARED_RESOURCE = 1 << 11;
        const DISCARD_RENDER_TARGET = 1 << 12;
        const FLIPPABLE = 1 << 13;
        const CAPTURE_BUFFER = 1 << 14;
        /// The resource is the on-screen primary
        const PRIMARY = 1 << 15;
        const TEXTURE = 1 << 16;
        const CUBE_MAP = 1 << 17;
        const VOLUME = 1 << 18;
        const VERTEX_BUFFER = 1 << 19;
        const INDEX_BUFFER = 1 << 20;

        const _ = !0;
    }
}

impl Default for ResourceFlags {
    fn default() -> Self {
        ResourceFlags::empty()
    }
}

bitflags! {
    /// D3DDDI_LOCKFLAGS bit field
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LockFlags: u32 {
        const READ_ONLY = 1 << 0;
        const WRITE_ONLY = 1 << 1;
        const NO_OVERWRITE = 1 << 2;
        const DISCARD = 1 << 3;
        const RANGE_LOCKED = 1 << 4;
        const AREA_LOCKED = 1 << 5;
        const BOX_LOCKED = 1 << 6;
        const LOCK_MACRO_PIXELS = 1 << 7;
        const NOTIFY_ONLY = 1 << 8;
        const DONOT_WAIT = 1 << 9;

        const _ = !0;
    }
}

impl Default for LockFlags {
    fn default() -> Self {
        LockFlags::empty()
    }
}

bitflags! {
    /// D3DDDI_UNLOCKFLAGS bit field
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UnlockFlags: u32 {
        const NOTIFY_ONLY = 1 << 0;

        const _ = !0;
    }
}

impl Default for UnlockFlags {
    fn default() -> Self {
        UnlockFlags::empty()
    }
}

bitflags! {
    /// D3DDDIARG_BLT flags
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BltFlags: u32 {
        const POINT = 1 << 0;
        const LINEAR = 1 << 1;
        const SRC_COLOR_KEY = 1 << 2;
        const DST_COLOR_KEY = 1 << 3;
        const MIRROR_LEFT_RIGHT = 1 << 4;
        const MIRROR_UP_DOWN = 1 << 5;
        const ROTATE = 1 << 6;
        const PRESENT = 1 << 7;

        const _ = !0;
    }
}

impl Default for BltFlags {
    fn default() -> Self {
        BltFlags::empty()
    }
}

bitflags! {
    /// D3DDDIARG_OPENRESOURCE flags
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenResourceFlags: u32 {
        /// The opened resource is the shared full-screen primary
        const FULLSCREEN = 1 << 0;

        const _ = !0;
    }
}

impl Default for OpenResourceFlags {
    fn default() -> Self {
        OpenResourceFlags::empty()
    }
}

bitflags! {
    /// D3DCLEAR flags
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const TARGET = 1 << 0;
        const ZBUFFER = 1 << 1;
        const STENCIL = 1 << 2;

        const _ = !0;
    }
}

impl Default for ClearFlags {
    fn default() -> Self {
        ClearFlags::empty()
    }
}

bitflags! {
    /// DDSCAPS surface capabilities
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SurfaceCaps: u32 {
        const BACKBUFFER = 0x0000_0004;
        const COMPLEX = 0x0000_0008;
        const FLIP = 0x0000_0010;
        const FRONTBUFFER = 0x0000_0020;
        const OFFSCREENPLAIN = 0x0000_0040;
        const PRIMARYSURFACE = 0x0000_0200;
        const SYSTEMMEMORY = 0x0000_0800;
        const TEXTURE = 0x0000_1000;
        const THREEDDEVICE = 0x0000_2000;
        const VIDEOMEMORY = 0x0000_4000;
        const LOCALVIDMEM = 0x1000_0000;
        const NONLOCALVIDMEM = 0x2000_0000;

        const _ = !0;
    }
}

impl Default for SurfaceCaps {
    fn default() -> Self {
        SurfaceCaps::empty()
    }
}

bitflags! {
    /// DDSD valid-field flags of a surface description
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SurfaceDescFlags: u32 {
        const CAPS = 0x0000_0001;
        const HEIGHT = 0x0000_0002;
        const WIDTH = 0x0000_0004;
        const PITCH = 0x0000_0008;
        const BACKBUFFERCOUNT = 0x0000_0020;
        const PIXELFORMAT = 0x0000_1000;

        const _ = !0;
    }
}

impl Default for SurfaceDescFlags {
    fn default() -> Self {
        SurfaceDescFlags::empty()
    }
}

bitflags! {
    /// DDFLIP flags
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FlipFlags: u32 {
        const WAIT = 0x0000_0001;
        const EVEN = 0x0000_0002;
        const ODD = 0x0000_0004;
        const NOVSYNC = 0x0000_0008;
        const DONOTWAIT = 0x0000_0020;

        const _ = !0;
    }
}

impl Default for FlipFlags {
    fn default() -> Self {
        FlipFlags::empty()
    }
}
