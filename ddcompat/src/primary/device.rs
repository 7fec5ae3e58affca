//! Primary surfaces that live on a proxied driver device

use super::desc::{PixelFormat, SurfaceDesc};
use super::presenter::{FlipChain, GammaRamp, PrimaryPresenter};
use crate::ddi::types::*;
use crate::ddi::{Device, DeviceRegistry};
use crate::error::{failed, HResult, HRESULT};
use crate::flags::{BltFlags, FlipFlags, ResourceFlags, SurfaceCaps};
use crate::gdi::PaletteEntry;
use parking_lot::Mutex;
use std::sync::Arc;

/// Driver format matching a primary's pixel format
fn driver_format(format: &PixelFormat) -> UINT {
    match format.rgb_bit_count {
        0..=8 => D3DDDIFMT_P8,
        16 if format.g_mask == 0x03E0 => D3DDDIFMT_X1R5G5B5,
        16 => D3DDDIFMT_R5G6B5,
        24 => D3DDDIFMT_R8G8B8,
        _ => D3DDDIFMT_X8R8G8B8,
    }
}

/// Presenter backed by the display device's resources
///
/// The front buffer is the primary the runtime created on that device, when there is one; the
/// remaining buffers are created here and destroyed with the chain. Updates copy the front
/// buffer to the shared full-screen primary, or present it when the device has none.
pub struct DevicePresenter {
    devices: Arc<DeviceRegistry>,
    device: Option<Arc<Mutex<Device>>>,
    /// Buffers created by this presenter rather than adopted from the runtime
    owned: Vec<Handle>,
    gamma: GammaRamp,
    palette: Option<Box<[PaletteEntry; 256]>>,
}

impl DevicePresenter {
    pub fn new(devices: Arc<DeviceRegistry>) -> Self {
        Self {
            devices,
            device: None,
            owned: Vec::new(),
            gamma: GammaRamp::identity(),
            palette: None,
        }
    }

    pub fn hardware_palette(&self) -> Option<&[PaletteEntry; 256]> {
        self.palette.as_deref()
    }

    fn create_buffer(device: &mut Device, desc: &SurfaceDesc) -> Result<Handle, HRESULT> {
        let surfaces = [D3DDDI_SURFACEINFO {
            Width: desc.width,
            Height: desc.height,
            ..Default::default()
        }];
        let pool = if desc.caps.contains(SurfaceCaps::SYSTEMMEMORY) {
            D3DDDIPOOL_SYSTEMMEM
        } else {
            D3DDDIPOOL_VIDEOMEMORY
        };
        let mut data = D3DDDIARG_CREATERESOURCE2::new(
            driver_format(&desc.pixel_format),
            pool,
            ResourceFlags::empty(),
            &surfaces,
        );
        let hr = device.create_resource2(&mut data);
        if failed(hr) {
            return Err(hr);
        }
        Ok(data.hResource)
    }

    fn destroy_owned(&mut self, device: &mut Device) {
        for surface in self.owned.drain(..) {
            let hr = device.destroy_resource(surface);
            if failed(hr) {
                log::warn!("Destroying primary buffer {surface:?} failed: {}", HResult(hr));
            }
        }
    }
}

impl PrimaryPresenter for DevicePresenter {
    fn create(&mut self, desc: &SurfaceDesc) -> Result<FlipChain, HRESULT> {
        if desc.width == 0 || desc.height == 0 {
            return Err(HResult::DDERR_INVALIDPARAMS.0);
        }
        let Some(proxy) = self.devices.find_display_device() else {
            log::warn!("No device to present the primary surface through");
            return Err(HResult::DDERR_NODIRECTDRAWHW.0);
        };
        let wanted = 1 + if desc.caps.contains(SurfaceCaps::FLIP) {
            desc.back_buffer_count as usize
        } else {
            0
        };

        let mut device = proxy.lock();
        let mut surfaces: Vec<Handle> = device.primary_resources().iter().rev().take(wanted).copied().collect();
        while surfaces.len() < wanted {
            match Self::create_buffer(&mut device, desc) {
                Ok(surface) => {
                    self.owned.push(surface);
                    surfaces.push(surface);
                }
                Err(hr) => {
                    self.destroy_owned(&mut device);
                    return Err(hr);
                }
            }
        }
        log::debug!(
            "Primary chain on device {:?}: {} adopted, {} created",
            device.handle(),
            wanted - self.owned.len(),
            self.owned.len()
        );
        drop(device);

        self.device = Some(proxy);
        let front = surfaces.remove(0);
        Ok(FlipChain {
            front,
            back_buffers: surfaces,
        })
    }

    fn release(&mut self, _chain: &FlipChain) {
        if let Some(proxy) = self.device.take() {
            self.destroy_owned(&mut proxy.lock());
        }
    }

    fn flip(&mut self, _chain: &FlipChain, _flags: FlipFlags) -> HRESULT {
        HResult::S_OK.0
    }

    fn update(&mut self, front: Handle) -> HRESULT {
        let Some(proxy) = &self.device else {
            return HResult::DDERR_INVALIDOBJECT.0;
        };
        let mut device = proxy.lock();
        let Some(size) = device
            .resource(front)
            .and_then(|resource| resource.surface(0))
            .map(|surface| (surface.width as i32, surface.height as i32))
        else {
            return HResult::DDERR_SURFACELOST.0;
        };

        match device.shared_primary() {
            Some(screen) => {
                let rect = RECT::new(0, 0, size.0, size.1);
                device.blt(&D3DDDIARG_BLT {
                    hSrcResource: front,
                    SrcSubResourceIndex: 0,
                    SrcRect: rect,
                    hDstResource: screen,
                    DstSubResourceIndex: 0,
                    DstRect: rect,
                    Flags: BltFlags::PRESENT,
                    ColorKey: 0,
                })
            }
            None => device.present(&D3DDDIARG_PRESENT {
                hSrcResource: front,
                Flags: D3DDDI_PRESENTFLAG_BLT,
                ..Default::default()
            }),
        }
    }

    fn gamma_ramp(&mut self) -> Result<GammaRamp, HRESULT> {
        Ok(self.gamma.clone())
    }

    fn set_gamma_ramp(&mut self, ramp: &GammaRamp) -> HRESULT {
        self.gamma = ramp.clone();
        HResult::S_OK.0
    }

    fn set_hardware_palette(&mut self, entries: &[PaletteEntry; 256]) {
        self.palette = Some(Box::new(*entries));
    }
}
