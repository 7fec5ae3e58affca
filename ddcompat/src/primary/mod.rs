//! The process-wide primary surface
//!
//! One primary exists per process. Client threads flip and update it while a background thread
//! completes pending flips and copies the front buffer to the screen. Everything that touches the
//! primary goes through a single critical section, which also guards the palette tables.
//!
//! Lock order: primary, then GDI designation, then devices.

mod desc;
mod device;
mod presenter;

pub use desc::{
    convert_primary_desc, DisplayMode, DisplayModeSource, FixedDisplayMode, PixelFormat, SurfaceDesc,
    SystemDisplayMode, DDPF_PALETTEINDEXED8, DDPF_RGB,
};
pub use device::DevicePresenter;
pub use presenter::{FlipChain, GammaRamp, OffscreenPresenter, PrimaryPresenter};

use crate::config::{DELAYED_FLIP_MODE_TIMEOUT, UPDATE_INTERVAL};
use crate::ddi::Handle;
use crate::error::{failed, HResult, HRESULT};
use crate::flags::{FlipFlags, SurfaceCaps};
use crate::gdi::{GdiDesignation, PaletteEntry, PaletteTables, SystemPaletteUse};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimaryState {
    /// Never created
    Absent,
    /// Created, cooperative level not yet known
    Created,
    FullScreen,
    Windowed,
    /// The display mode changed or the device was lost
    Lost,
    Restored,
    Released,
}

impl PrimaryState {
    /// A surface exists and can be drawn to
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            PrimaryState::Created | PrimaryState::FullScreen | PrimaryState::Windowed | PrimaryState::Restored
        )
    }

    fn exists(&self) -> bool {
        self.is_live() || *self == PrimaryState::Lost
    }
}

struct Inner {
    state: PrimaryState,
    presenter: Box<dyn PrimaryPresenter>,
    chain: Option<FlipChain>,
    requested: SurfaceDesc,
    desc: SurfaceDesc,
    full_screen: bool,
    palette: Option<Vec<PaletteEntry>>,
    palette_dirty: bool,
    tables: PaletteTables,
    flip_pending: bool,
    update_pending: bool,
}

impl Inner {
    fn check_live(&self) -> Result<(), HRESULT> {
        match self.state {
            PrimaryState::Lost => Err(HResult::DDERR_SURFACELOST.0),
            state if state.is_live() => Ok(()),
            _ => Err(HResult::DDERR_INVALIDOBJECT.0),
        }
    }

    fn front(&self) -> Option<Handle> {
        self.chain.as_ref().map(|chain| chain.front)
    }
}

/// Coordinates the primary surface between client threads and the update thread
pub struct PrimarySurface {
    inner: Mutex<Inner>,
    /// Signaled when a pending flip completes or the primary goes away
    flip_done: Condvar,
    /// Wakes the update thread early
    wake: Condvar,
    display: Arc<dyn DisplayModeSource>,
    gdi: Arc<dyn GdiDesignation>,
    thread: Mutex<Option<JoinHandle<()>>>,
    stop: AtomicBool,
}

impl PrimarySurface {
    pub fn new(
        presenter: Box<dyn PrimaryPresenter>,
        display: Arc<dyn DisplayModeSource>,
        gdi: Arc<dyn GdiDesignation>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: PrimaryState::Absent,
                presenter,
                chain: None,
                requested: SurfaceDesc::default(),
                desc: SurfaceDesc::default(),
                full_screen: false,
                palette: None,
                palette_dirty: false,
                tables: PaletteTables::new(),
                flip_pending: false,
                update_pending: false,
            }),
            flip_done: Condvar::new(),
            wake: Condvar::new(),
            display,
            gdi,
            thread: Mutex::new(None),
            stop: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> PrimaryState {
        self.inner.lock().state
    }

    pub fn is_full_screen(&self) -> bool {
        let inner = self.inner.lock();
        inner.state.exists() && inner.full_screen
    }

    pub fn is_lost(&self) -> bool {
        self.inner.lock().state == PrimaryState::Lost
    }

    pub fn front(&self) -> Option<Handle> {
        self.inner.lock().front()
    }

    pub fn chain(&self) -> Option<FlipChain> {
        self.inner.lock().chain.clone()
    }

    /// Description of the surface backing the primary
    pub fn desc(&self) -> Option<SurfaceDesc> {
        let inner = self.inner.lock();
        inner.chain.as_ref().map(|_| inner.desc)
    }

    /// Caps the client originally asked for
    pub fn orig_caps(&self) -> SurfaceCaps {
        self.inner.lock().requested.caps
    }

    pub fn is_flip_pending(&self) -> bool {
        self.inner.lock().flip_pending
    }

    pub fn is_update_pending(&self) -> bool {
        self.inner.lock().update_pending
    }

    /// Creates the primary from a client's surface request
    pub fn create(&self, desc: &SurfaceDesc) -> HRESULT {
        let mut inner = self.inner.lock();
        if inner.state.exists() {
            return HResult::DDERR_PRIMARYSURFACEALREADYEXISTS.0;
        }

        let converted = convert_primary_desc(desc, &self.display.current_mode());
        let chain = match inner.presenter.create(&converted) {
            Ok(chain) => chain,
            Err(hr) => {
                log::error!("Failed to create the primary surface: {}", HResult(hr));
                return hr;
            }
        };
        log::info!(
            "Created primary surface {:?} ({}x{}x{}, {} back buffers)",
            chain.front,
            converted.width,
            converted.height,
            converted.pixel_format.rgb_bit_count,
            chain.back_buffers.len()
        );

        self.gdi.set_gdi_resource_handle(Some(chain.front));
        inner.requested = *desc;
        inner.desc = converted;
        inner.chain = Some(chain);
        inner.state = PrimaryState::Created;
        inner.full_screen = false;
        inner.flip_pending = false;
        self.apply_palette(&mut inner);
        HResult::S_OK.0
    }

    /// Records the cooperative level the primary is used with
    pub fn set_full_screen(&self, full_screen: bool) {
        let mut inner = self.inner.lock();
        inner.full_screen = full_screen;
        if inner.state.is_live() {
            inner.state = if full_screen {
                PrimaryState::FullScreen
            } else {
                PrimaryState::Windowed
            };
            self.apply_palette(&mut inner);
        }
    }

    /// Marks the surface lost after a mode change or device loss
    pub fn mark_lost(&self) {
        let mut inner = self.inner.lock();
        self.mark_lost_locked(&mut inner);
    }

    fn mark_lost_locked(&self, inner: &mut Inner) {
        if !inner.state.is_live() {
            return;
        }
        log::info!("Primary surface lost");
        inner.state = PrimaryState::Lost;
        inner.update_pending = false;
        inner.flip_pending = false;
        self.flip_done.notify_all();
    }

    /// Re-creates the backing surfaces for the current display mode
    pub fn restore(&self) -> HRESULT {
        let mut inner = self.inner.lock();
        if !inner.state.exists() {
            return HResult::DDERR_INVALIDOBJECT.0;
        }

        let converted = convert_primary_desc(&inner.requested, &self.display.current_mode());
        if let Some(chain) = inner.chain.take() {
            inner.presenter.release(&chain);
        }
        let chain = match inner.presenter.create(&converted) {
            Ok(chain) => chain,
            Err(hr) => {
                log::error!("Failed to restore the primary surface: {}", HResult(hr));
                inner.state = PrimaryState::Lost;
                self.gdi.set_gdi_resource_handle(None);
                return hr;
            }
        };

        self.gdi.set_gdi_resource_handle(Some(chain.front));
        inner.desc = converted;
        inner.chain = Some(chain);
        inner.state = PrimaryState::Restored;
        self.apply_palette(&mut inner);
        HResult::S_OK.0
    }

    /// Tears the primary down
    ///
    /// Safe to call in any state, any number of times.
    pub fn release(&self) {
        let mut inner = self.inner.lock();
        if let Some(chain) = inner.chain.take() {
            inner.presenter.release(&chain);
            self.gdi.set_gdi_resource_handle(None);
            log::info!("Released primary surface {:?}", chain.front);
        }
        if inner.state != PrimaryState::Absent {
            inner.state = PrimaryState::Released;
        }
        inner.palette = None;
        inner.palette_dirty = false;
        inner.flip_pending = false;
        inner.update_pending = false;
        self.flip_done.notify_all();
    }

    /// Flips the chain, to `target` if given
    pub fn flip(&self, target: Option<Handle>, flags: FlipFlags) -> HRESULT {
        let mut inner = self.inner.lock();
        if let Err(hr) = inner.check_live() {
            return hr;
        }
        if inner.chain.as_ref().is_some_and(|chain| chain.back_buffers.is_empty()) {
            return HResult::DDERR_NOTFLIPPABLE.0;
        }

        if inner.flip_pending {
            if flags.contains(FlipFlags::DONOTWAIT) {
                return HResult::DDERR_WASSTILLDRAWING.0;
            }
            self.wait_locked(&mut inner);
            if let Err(hr) = inner.check_live() {
                return hr;
            }
        }

        let Some(mut chain) = inner.chain.clone() else {
            return HResult::DDERR_INVALIDOBJECT.0;
        };
        if !chain.rotate(target) {
            return HResult::DDERR_INVALIDPARAMS.0;
        }
        let hr = inner.presenter.flip(&chain, flags);
        if failed(hr) {
            return hr;
        }

        self.gdi.set_gdi_resource_handle(Some(chain.front));
        inner.chain = Some(chain);
        inner.flip_pending = true;
        inner.update_pending = true;
        self.wake.notify_one();
        hr
    }

    /// Waits for the pending flip that involves `surface`
    ///
    /// Returns true if no such flip is pending anymore. With `wait` unset this only checks;
    /// otherwise it blocks for at most [`DELAYED_FLIP_MODE_TIMEOUT`] and reports false on timeout.
    pub fn wait_for_flip(&self, surface: Option<Handle>, wait: bool) -> bool {
        let mut inner = self.inner.lock();
        if !inner.flip_pending {
            return true;
        }
        if let Some(surface) = surface
            && !inner.chain.as_ref().is_some_and(|chain| chain.contains(surface))
        {
            return true;
        }
        if !wait {
            return false;
        }
        self.wait_locked(&mut inner)
    }

    fn wait_locked(&self, inner: &mut MutexGuard<'_, Inner>) -> bool {
        let deadline = Instant::now() + DELAYED_FLIP_MODE_TIMEOUT;
        while inner.flip_pending {
            if self.flip_done.wait_until(inner, deadline).timed_out() {
                return !inner.flip_pending;
            }
        }
        true
    }

    /// Requests a screen update at the next tick
    pub fn schedule_update(&self) {
        let mut inner = self.inner.lock();
        if inner.state.is_live() {
            inner.update_pending = true;
            self.wake.notify_one();
        }
    }

    /// Copies the front buffer to the screen now
    pub fn update(&self) -> HRESULT {
        let mut inner = self.inner.lock();
        Self::update_locked(&mut inner)
    }

    /// Performs a scheduled update, if there is one, on the calling thread
    pub fn flush(&self) -> HRESULT {
        let mut inner = self.inner.lock();
        if !inner.update_pending {
            return HResult::S_OK.0;
        }
        Self::update_locked(&mut inner)
    }

    fn update_locked(inner: &mut Inner) -> HRESULT {
        if let Err(hr) = inner.check_live() {
            return hr;
        }
        let Some(front) = inner.front() else {
            return HResult::DDERR_INVALIDOBJECT.0;
        };
        inner.update_pending = false;
        let hr = inner.presenter.update(front);
        if failed(hr) {
            log::warn!("Primary surface update failed: {}", HResult(hr));
        }
        hr
    }

    /// One iteration of the update thread
    pub fn tick(&self) {
        let mut inner = self.inner.lock();
        self.tick_locked(&mut inner);
    }

    /// The display left the mode the primary was sized to
    fn mode_changed(&self, inner: &Inner) -> bool {
        let mode = self.display.current_mode();
        (mode.width, mode.height, mode.bits_per_pixel)
            != (inner.desc.width, inner.desc.height, inner.desc.pixel_format.rgb_bit_count)
    }

    fn tick_locked(&self, inner: &mut Inner) {
        if inner.state.is_live() && self.mode_changed(inner) {
            self.mark_lost_locked(inner);
        }
        if inner.flip_pending {
            inner.flip_pending = false;
            self.flip_done.notify_all();
        }
        if inner.palette_dirty && inner.state.is_live() {
            self.apply_palette(inner);
        }
        if inner.update_pending && inner.state.is_live() {
            Self::update_locked(inner);
        }
    }

    pub fn gamma_ramp(&self) -> Result<GammaRamp, HRESULT> {
        self.inner.lock().presenter.gamma_ramp()
    }

    pub fn set_gamma_ramp(&self, ramp: &GammaRamp) -> HRESULT {
        self.inner.lock().presenter.set_gamma_ramp(ramp)
    }

    /// Attaches a palette to the primary, or detaches it with `None`
    pub fn set_palette(&self, entries: Option<&[PaletteEntry]>) {
        let mut inner = self.inner.lock();
        inner.palette = entries.map(|entries| entries.iter().take(256).copied().collect());
        if inner.state.is_live() {
            self.apply_palette(&mut inner);
        }
    }

    /// Changes entries of the attached palette
    ///
    /// Changes beyond the per-millisecond budget are applied at the next tick.
    pub fn update_palette(&self, start: usize, entries: &[PaletteEntry]) -> HRESULT {
        let mut inner = self.inner.lock();
        let Some(palette) = inner.palette.as_mut() else {
            return HResult::DDERR_NOTFOUND.0;
        };
        if start + entries.len() > 256 {
            return HResult::DDERR_INVALIDPARAMS.0;
        }
        if palette.len() < start + entries.len() {
            palette.resize(start + entries.len(), PaletteEntry::default());
        }
        palette[start..start + entries.len()].copy_from_slice(entries);

        if !inner.state.is_live() {
            return HResult::S_OK.0;
        }
        if inner.tables.admit_update(Instant::now()) {
            self.apply_palette(&mut inner);
        } else {
            inner.palette_dirty = true;
            self.wake.notify_one();
        }
        HResult::S_OK.0
    }

    pub fn system_palette_entries(&self, start: usize, count: usize) -> Vec<PaletteEntry> {
        self.inner.lock().tables.system_entries(start, count).to_vec()
    }

    pub fn hardware_palette(&self) -> [PaletteEntry; 256] {
        *self.inner.lock().tables.hardware()
    }

    pub fn set_system_palette_use(&self, palette_use: SystemPaletteUse) -> SystemPaletteUse {
        self.inner.lock().tables.set_system_palette_use(palette_use)
    }

    fn apply_palette(&self, inner: &mut Inner) {
        inner.palette_dirty = false;
        if inner.full_screen {
            let mut hardware = *inner.tables.system();
            if let Some(palette) = &inner.palette {
                hardware[..palette.len()].copy_from_slice(palette);
            }
            inner.tables.set_hardware(&hardware);
            inner.presenter.set_hardware_palette(&hardware);
        } else if let Some(palette) = &inner.palette {
            inner.tables.realize(palette);
        }
        if inner.state.is_live() {
            inner.update_pending = true;
            self.wake.notify_one();
        }
    }

    /// Starts the background update thread
    pub fn start_update_thread(self: &Arc<Self>) -> std::io::Result<()> {
        let mut thread = self.thread.lock();
        if thread.is_some() {
            return Ok(());
        }
        self.stop.store(false, Ordering::Release);
        let weak = Arc::downgrade(self);
        *thread = Some(
            std::thread::Builder::new()
                .name("ddcompat-primary".into())
                .spawn(move || update_thread(weak))?,
        );
        Ok(())
    }

    /// Stops the background update thread and waits for it to exit
    pub fn stop_update_thread(&self) {
        let Some(thread) = self.thread.lock().take() else {
            return;
        };
        {
            let _inner = self.inner.lock();
            self.stop.store(true, Ordering::Release);
            self.wake.notify_all();
        }
        if thread.join().is_err() {
            log::error!("Primary surface update thread panicked");
        }
    }
}

fn update_thread(primary: Weak<PrimarySurface>) {
    log::debug!("Primary surface update thread started");
    while let Some(primary) = primary.upgrade() {
        let mut inner = primary.inner.lock();
        if primary.stop.load(Ordering::Acquire) {
            break;
        }
        primary.wake.wait_for(&mut inner, UPDATE_INTERVAL);
        if primary.stop.load(Ordering::Acquire) {
            break;
        }
        primary.tick_locked(&mut inner);
    }
    log::debug!("Primary surface update thread stopped");
}
