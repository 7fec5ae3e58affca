//! Source color key support
//!
//! Some drivers advertise source color keyed blits but ignore the key. Each device runs a small
//! blit once to find out, and keyed blits on devices that fail are done on the CPU.

use super::driver::DriverDevice;
use super::types::*;
use crate::diag::DiagnosticSink;
use crate::error::{failed, HResult, HRESULT};
use crate::flags::{BltFlags, LockFlags, ResourceFlags};
use std::fmt;

const SOURCE_PATTERN: u32 = 0xFA9F;
const DESTINATION_PATTERN: u32 = 0xFFFF_FFFF;
const EXPECTED_PATTERN: u32 = 0xFFFF;

#[derive(Debug)]
struct ProbeFailure {
    stage: &'static str,
    code: Option<HRESULT>,
}

impl ProbeFailure {
    fn at(stage: &'static str) -> impl FnOnce(HRESULT) -> ProbeFailure {
        move |hr| ProbeFailure { stage, code: Some(hr) }
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{}: {}", self.stage, HResult(code)),
            None => f.write_str(self.stage),
        }
    }
}

/// Destroys a probe resource when dropped
struct PrivateResource<'a> {
    driver: &'a dyn DriverDevice,
    handle: Handle,
}

impl Drop for PrivateResource<'_> {
    fn drop(&mut self) {
        self.driver.destroy_resource(self.handle);
    }
}

fn create_private_resource<'a>(
    driver: &'a dyn DriverDevice,
    flags: ResourceFlags,
) -> Result<PrivateResource<'a>, HRESULT> {
    let surfaces = [D3DDDI_SURFACEINFO {
        Width: 2,
        Height: 1,
        ..Default::default()
    }];

    let (hr, handle) = if driver.has_create_resource2() {
        let mut data = D3DDDIARG_CREATERESOURCE2::new(D3DDDIFMT_R5G6B5, D3DDDIPOOL_VIDEOMEMORY, flags, &surfaces);
        (driver.create_resource2(&mut data), data.hResource)
    } else {
        let mut data = D3DDDIARG_CREATERESOURCE::new(D3DDDIFMT_R5G6B5, D3DDDIPOOL_VIDEOMEMORY, flags, &surfaces);
        (driver.create_resource(&mut data), data.hResource)
    };

    if failed(hr) {
        return Err(hr);
    }
    Ok(PrivateResource { driver, handle })
}

fn write_pattern(driver: &dyn DriverDevice, resource: Handle, pattern: u32) -> Result<(), HRESULT> {
    let mut lock = D3DDDIARG_LOCK::new(resource, 0, LockFlags::WRITE_ONLY);
    let hr = driver.lock(&mut lock);
    if failed(hr) {
        return Err(hr);
    }
    unsafe { lock.pSurfData.cast::<u32>().write_unaligned(pattern) };
    driver.unlock(&D3DDDIARG_UNLOCK::new(resource, 0));
    Ok(())
}

fn read_pattern(driver: &dyn DriverDevice, resource: Handle) -> Result<u32, HRESULT> {
    let mut lock = D3DDDIARG_LOCK::new(resource, 0, LockFlags::READ_ONLY);
    let hr = driver.lock(&mut lock);
    if failed(hr) {
        return Err(hr);
    }
    let value = unsafe { lock.pSurfData.cast::<u32>().read_unaligned() };
    driver.unlock(&D3DDDIARG_UNLOCK::new(resource, 0));
    Ok(value)
}

fn run_probe(driver: &dyn DriverDevice, caps: &DDRAW_CAPS) -> Result<(), ProbeFailure> {
    if caps.CKeyCaps & DDRAW_CKEYCAPS_SRCBLT == 0 {
        return Err(ProbeFailure {
            stage: "driver indicates no support",
            code: None,
        });
    }

    let src = create_private_resource(driver, ResourceFlags::empty())
        .map_err(ProbeFailure::at("error creating source resource"))?;
    let dst = create_private_resource(driver, ResourceFlags::RENDER_TARGET)
        .map_err(ProbeFailure::at("error creating destination resource"))?;

    write_pattern(driver, src.handle, SOURCE_PATTERN)
        .map_err(ProbeFailure::at("error locking source resource"))?;
    write_pattern(driver, dst.handle, DESTINATION_PATTERN)
        .map_err(ProbeFailure::at("error locking destination resource"))?;

    let blt = D3DDDIARG_BLT {
        hSrcResource: src.handle,
        SrcSubResourceIndex: 0,
        SrcRect: RECT::new(0, 0, 2, 1),
        hDstResource: dst.handle,
        DstSubResourceIndex: 0,
        DstRect: RECT::new(0, 0, 2, 1),
        Flags: BltFlags::SRC_COLOR_KEY,
        ColorKey: SOURCE_PATTERN,
    };
    let hr = driver.blt(&blt);
    if failed(hr) {
        return Err(ProbeFailure::at("blt error")(hr));
    }

    let result = read_pattern(driver, dst.handle)
        .map_err(ProbeFailure::at("error locking destination resource after blt"))?;
    if result != EXPECTED_PATTERN {
        return Err(ProbeFailure {
            stage: "test result pattern is incorrect",
            code: Some(result as HRESULT),
        });
    }
    Ok(())
}

/// Checks whether the driver honors source color keys
///
/// The outcome is reported through `diagnostics` once per distinct message; failures never
/// propagate.
pub fn probe_src_color_key(driver: &dyn DriverDevice, caps: &DDRAW_CAPS, diagnostics: &dyn DiagnosticSink) -> bool {
    match run_probe(driver, caps) {
        Ok(()) => {
            diagnostics.log_once("Checking source color key support: passed");
            true
        }
        Err(failure) => {
            diagnostics.log_once(&format!("Checking source color key support: failed ({failure})"));
            false
        }
    }
}

/// Describes a resource taking part in an emulated blit
#[derive(Clone, Copy, Debug)]
pub struct BltSurface {
    pub handle: Handle,
    pub sub_resource: UINT,
    pub format: UINT,
    /// Size of the sub-resource in pixels
    pub width: UINT,
    pub height: UINT,
    pub rect: RECT,
}

impl BltSurface {
    fn contains_rect(&self) -> bool {
        self.rect.left >= 0
            && self.rect.top >= 0
            && self.rect.right as i64 <= self.width as i64
            && self.rect.bottom as i64 <= self.height as i64
    }
}

/// Performs a source color keyed copy on the CPU
///
/// Returns `None` when the blit cannot be emulated and the caller should forward it. That is the
/// case for different formats, scaling, the same resource on both sides, a rect outside its
/// surface, or a pixel size other than 16 or 32 bits.
pub fn emulate_src_color_key_blt(
    driver: &dyn DriverDevice,
    src: &BltSurface,
    dst: &BltSurface,
    color_key: u32,
) -> Option<HRESULT> {
    if src.format != dst.format
        || src.handle == dst.handle
        || src.rect.width() != dst.rect.width()
        || src.rect.height() != dst.rect.height()
        || src.rect.width() <= 0
        || src.rect.height() <= 0
        || !src.contains_rect()
        || !dst.contains_rect()
    {
        return None;
    }
    let bpp = format_bytes_per_pixel(src.format).filter(|&bpp| bpp == 2 || bpp == 4)?;

    let mut src_lock = D3DDDIARG_LOCK::new(src.handle, src.sub_resource, LockFlags::READ_ONLY);
    let hr = driver.lock(&mut src_lock);
    if failed(hr) {
        return Some(hr);
    }
    let mut dst_lock = D3DDDIARG_LOCK::new(dst.handle, dst.sub_resource, LockFlags::empty());
    let hr = driver.lock(&mut dst_lock);
    if failed(hr) {
        driver.unlock(&D3DDDIARG_UNLOCK::new(src.handle, src.sub_resource));
        return Some(hr);
    }

    let width = src.rect.width() as usize;
    for row in 0..src.rect.height() as usize {
        let src_row = src_lock.pSurfData as usize
            + (src.rect.top as usize + row) * src_lock.Pitch as usize
            + src.rect.left as usize * bpp;
        let dst_row = dst_lock.pSurfData as usize
            + (dst.rect.top as usize + row) * dst_lock.Pitch as usize
            + dst.rect.left as usize * bpp;
        unsafe {
            match bpp {
                2 => copy_row::<u16>(src_row, dst_row, width, color_key as u16),
                _ => copy_row::<u32>(src_row, dst_row, width, color_key),
            }
        }
    }

    driver.unlock(&D3DDDIARG_UNLOCK::new(dst.handle, dst.sub_resource));
    driver.unlock(&D3DDDIARG_UNLOCK::new(src.handle, src.sub_resource));
    Some(HResult::S_OK.0)
}

unsafe fn copy_row<T: Copy + PartialEq>(src: usize, dst: usize, width: usize, key: T) {
    let src = src as *const T;
    let dst = dst as *mut T;
    for x in 0..width {
        unsafe {
            let pixel = src.add(x).read_unaligned();
            if pixel != key {
                dst.add(x).write_unaligned(pixel);
            }
        }
    }
}
