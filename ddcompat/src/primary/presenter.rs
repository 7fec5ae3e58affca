//! The surfaces behind the primary and the path that puts them on screen

use super::desc::SurfaceDesc;
use crate::ddi::Handle;
use crate::error::{HResult, HRESULT};
use crate::flags::{FlipFlags, SurfaceCaps};
use crate::gdi::PaletteEntry;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The front buffer and its back buffers, in flip order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlipChain {
    pub front: Handle,
    pub back_buffers: Vec<Handle>,
}

impl FlipChain {
    pub fn contains(&self, surface: Handle) -> bool {
        self.front == surface || self.back_buffers.contains(&surface)
    }

    /// Makes `target` (or the first back buffer) the front buffer
    ///
    /// Without a target the chain rotates: every back buffer moves one step towards the front and
    /// the old front becomes the last back buffer. With a target the two surfaces swap places.
    /// Returns false if `target` is not a back buffer of this chain.
    pub fn rotate(&mut self, target: Option<Handle>) -> bool {
        match target {
            Some(target) => match self.back_buffers.iter().position(|&h| h == target) {
                Some(index) => {
                    std::mem::swap(&mut self.front, &mut self.back_buffers[index]);
                    true
                }
                None => false,
            },
            None if self.back_buffers.is_empty() => false,
            None => {
                let next = self.back_buffers.remove(0);
                self.back_buffers.push(std::mem::replace(&mut self.front, next));
                true
            }
        }
    }
}

/// D3DGAMMARAMP / DDGAMMARAMP
#[repr(C)]
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GammaRamp {
    pub red: [u16; 256],
    pub green: [u16; 256],
    pub blue: [u16; 256],
}

impl GammaRamp {
    /// The ramp that leaves colors unchanged
    pub fn identity() -> Self {
        let mut channel = [0u16; 256];
        for (i, value) in channel.iter_mut().enumerate() {
            *value = (i as u16) << 8 | i as u16;
        }
        Self {
            red: channel,
            green: channel,
            blue: channel,
        }
    }
}

impl Default for GammaRamp {
    fn default() -> Self {
        Self::identity()
    }
}

/// Creates, flips and scans out the primary's surfaces
///
/// Every call is made with the primary's critical section held.
pub trait PrimaryPresenter: Send {
    fn create(&mut self, desc: &SurfaceDesc) -> Result<FlipChain, HRESULT>;
    fn release(&mut self, chain: &FlipChain);
    /// `chain` is already in its new order
    fn flip(&mut self, chain: &FlipChain, flags: FlipFlags) -> HRESULT;
    /// Copies the current front buffer to the screen
    fn update(&mut self, front: Handle) -> HRESULT;
    fn gamma_ramp(&mut self) -> Result<GammaRamp, HRESULT>;
    fn set_gamma_ramp(&mut self, ramp: &GammaRamp) -> HRESULT;
    fn set_hardware_palette(&mut self, entries: &[PaletteEntry; 256]);
}

static NEXT_SURFACE: AtomicUsize = AtomicUsize::new(0x5000);

/// Presenter whose surfaces never reach a display
///
/// For hosts with no driver device to present through. Keeps the gamma ramp and hardware palette
/// so clients that read them back see what they wrote.
#[derive(Default)]
pub struct OffscreenPresenter {
    gamma: GammaRamp,
    palette: Option<Box<[PaletteEntry; 256]>>,
}

impl OffscreenPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hardware_palette(&self) -> Option<&[PaletteEntry; 256]> {
        self.palette.as_deref()
    }
}

impl PrimaryPresenter for OffscreenPresenter {
    fn create(&mut self, desc: &SurfaceDesc) -> Result<FlipChain, HRESULT> {
        if desc.width == 0 || desc.height == 0 {
            return Err(HResult::DDERR_INVALIDPARAMS.0);
        }
        let back_buffers = if desc.caps.contains(SurfaceCaps::FLIP) {
            desc.back_buffer_count as usize
        } else {
            0
        };
        let next = || Handle(NEXT_SURFACE.fetch_add(1, Ordering::Relaxed));
        let front = next();
        let back_buffers = (0..back_buffers).map(|_| next()).collect();
        log::debug!("Created off-screen primary {front:?} ({}x{})", desc.width, desc.height);
        Ok(FlipChain { front, back_buffers })
    }

    fn release(&mut self, chain: &FlipChain) {
        log::debug!("Released off-screen primary {:?}", chain.front);
    }

    fn flip(&mut self, _chain: &FlipChain, _flags: FlipFlags) -> HRESULT {
        HResult::S_OK.0
    }

    fn update(&mut self, _front: Handle) -> HRESULT {
        HResult::S_OK.0
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
