//! Primary surface descriptions and the display mode they are sized to

use crate::flags::{SurfaceCaps, SurfaceDescFlags};

/// DDPIXELFORMAT flag: 8-bit palettized
pub const DDPF_PALETTEINDEXED8: u32 = 0x0000_0020;
/// DDPIXELFORMAT flag: RGB masks are valid
pub const DDPF_RGB: u32 = 0x0000_0040;

/// The parts of DDPIXELFORMAT the primary needs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelFormat {
    pub flags: u32,
    pub rgb_bit_count: u32,
    pub r_mask: u32,
    pub g_mask: u32,
    pub b_mask: u32,
    pub a_mask: u32,
}

impl PixelFormat {
    /// Pixel format a display mode of the given depth scans out
    pub fn for_bpp(bits_per_pixel: u32) -> Self {
        match bits_per_pixel {
            0..=8 => Self {
                flags: DDPF_RGB | DDPF_PALETTEINDEXED8,
                rgb_bit_count: bits_per_pixel,
                ..Self::default()
            },
            16 => Self {
                flags: DDPF_RGB,
                rgb_bit_count: 16,
                r_mask: 0xF800,
                g_mask: 0x07E0,
                b_mask: 0x001F,
                a_mask: 0,
            },
            bpp => Self {
                flags: DDPF_RGB,
                rgb_bit_count: bpp,
                r_mask: 0x00FF_0000,
                g_mask: 0x0000_FF00,
                b_mask: 0x0000_00FF,
                a_mask: 0,
            },
        }
    }
}

/// A client's request for a surface, reduced to what the primary path reads and writes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceDesc {
    pub flags: SurfaceDescFlags,
    pub width: u32,
    pub height: u32,
    pub back_buffer_count: u32,
    pub caps: SurfaceCaps,
    pub pixel_format: PixelFormat,
}

impl SurfaceDesc {
    /// Description of a primary surface with `back_buffers` attached back buffers
    pub fn primary(back_buffers: u32) -> Self {
        let mut desc = Self {
            flags: SurfaceDescFlags::CAPS,
            caps: SurfaceCaps::PRIMARYSURFACE,
            ..Self::default()
        };
        if back_buffers > 0 {
            desc.flags |= SurfaceDescFlags::BACKBUFFERCOUNT;
            desc.caps |= SurfaceCaps::FLIP | SurfaceCaps::COMPLEX;
            desc.back_buffer_count = back_buffers;
        }
        desc
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
}

/// Reports the mode the display is currently in
pub trait DisplayModeSource: Send + Sync {
    fn current_mode(&self) -> DisplayMode;
}

/// A display mode that only changes when told to
pub struct FixedDisplayMode {
    mode: parking_lot::Mutex<DisplayMode>,
}

impl FixedDisplayMode {
    pub fn new(mode: DisplayMode) -> Self {
        Self {
            mode: parking_lot::Mutex::new(mode),
        }
    }

    pub fn set(&self, mode: DisplayMode) {
        *self.mode.lock() = mode;
    }
}

impl DisplayModeSource for FixedDisplayMode {
    fn current_mode(&self) -> DisplayMode {
        *self.mode.lock()
    }
}

/// The desktop mode of the primary display adapter
pub struct SystemDisplayMode;

#[cfg(windows)]
impl DisplayModeSource for SystemDisplayMode {
    fn current_mode(&self) -> DisplayMode {
        use winapi::um::wingdi::DEVMODEW;
        use winapi::um::winuser::{EnumDisplaySettingsW, ENUM_CURRENT_SETTINGS};

        let mut dm: DEVMODEW = unsafe { std::mem::zeroed() };
        dm.dmSize = std::mem::size_of::<DEVMODEW>() as u16;
        let ok = unsafe { EnumDisplaySettingsW(std::ptr::null(), ENUM_CURRENT_SETTINGS, &mut dm) };
        if ok == 0 {
            log::warn!("Failed to query the current display mode");
            return FALLBACK_MODE;
        }
        DisplayMode {
            width: dm.dmPelsWidth,
            height: dm.dmPelsHeight,
            bits_per_pixel: dm.dmBitsPerPel,
        }
    }
}

#[cfg(not(windows))]
impl DisplayModeSource for SystemDisplayMode {
    fn current_mode(&self) -> DisplayMode {
        FALLBACK_MODE
    }
}

const FALLBACK_MODE: DisplayMode = DisplayMode {
    width: 640,
    height: 480,
    bits_per_pixel: 32,
};

/// Turns a primary surface request into the off-screen surface that backs it
///
/// The backing surface is sized to the display mode and carries its pixel format. Placement caps
/// are left to the runtime, except that a 3D-capable palettized surface is moved to system
/// memory.
pub fn convert_primary_desc(desc: &SurfaceDesc, mode: &DisplayMode) -> SurfaceDesc {
    let mut converted = *desc;
    converted.flags |= SurfaceDescFlags::WIDTH | SurfaceDescFlags::HEIGHT | SurfaceDescFlags::PIXELFORMAT;
    converted.width = mode.width;
    converted.height = mode.height;
    converted.caps.remove(
        SurfaceCaps::PRIMARYSURFACE
            | SurfaceCaps::SYSTEMMEMORY
            | SurfaceCaps::VIDEOMEMORY
            | SurfaceCaps::LOCALVIDMEM
            | SurfaceCaps::NONLOCALVIDMEM,
    );
    converted.caps |= SurfaceCaps::OFFSCREENPLAIN;
    converted.pixel_format = PixelFormat::for_bpp(mode.bits_per_pixel);
    if converted.pixel_format.rgb_bit_count <= 8 && converted.caps.contains(SurfaceCaps::THREEDDEVICE) {
        converted.caps.remove(SurfaceCaps::THREEDDEVICE);
        converted.caps |= SurfaceCaps::SYSTEMMEMORY;
    }
    converted
}
