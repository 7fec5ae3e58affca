//! System and hardware palette tables

use crate::config::MAX_PALETTE_UPDATES_PER_MS;
use std::time::{Duration, Instant};

pub const PC_RESERVED: u8 = 0x01;
pub const PC_EXPLICIT: u8 = 0x02;
pub const PC_NOCOLLAPSE: u8 = 0x04;

/// PALETTEENTRY
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
pub struct PaletteEntry {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub flags: u8,
}

impl PaletteEntry {
    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red,
            green,
            blue,
            flags: 0,
        }
    }
}

/// Which system palette entries applications may change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemPaletteUse {
    /// The first and last 10 entries are reserved
    Static,
    /// Only black and white are reserved
    NoStatic,
    /// Every entry is available
    NoStatic256,
}

impl SystemPaletteUse {
    /// Entries an application palette is realized into
    pub fn free_range(&self) -> std::ops::Range<usize> {
        match self {
            SystemPaletteUse::Static => STATIC_ENTRIES..256 - STATIC_ENTRIES,
            SystemPaletteUse::NoStatic => 1..255,
            SystemPaletteUse::NoStatic256 => 0..256,
        }
    }
}

const STATIC_ENTRIES: usize = 10;

const DEFAULT_STATIC_FRONT: [PaletteEntry; STATIC_ENTRIES] = [
    PaletteEntry::rgb(0x00, 0x00, 0x00),
    PaletteEntry::rgb(0x80, 0x00, 0x00),
    PaletteEntry::rgb(0x00, 0x80, 0x00),
    PaletteEntry::rgb(0x80, 0x80, 0x00),
    PaletteEntry::rgb(0x00, 0x00, 0x80),
    PaletteEntry::rgb(0x80, 0x00, 0x80),
    PaletteEntry::rgb(0x00, 0x80, 0x80),
    PaletteEntry::rgb(0xc0, 0xc0, 0xc0),
    PaletteEntry::rgb(0xc0, 0xdc, 0xc0),
    PaletteEntry::rgb(0xa6, 0xca, 0xf0),
];

const DEFAULT_STATIC_BACK: [PaletteEntry; STATIC_ENTRIES] = [
    PaletteEntry::rgb(0xff, 0xfb, 0xf0),
    PaletteEntry::rgb(0xa0, 0xa0, 0xa4),
    PaletteEntry::rgb(0x80, 0x80, 0x80),
    PaletteEntry::rgb(0xff, 0x00, 0x00),
    PaletteEntry::rgb(0x00, 0xff, 0x00),
    PaletteEntry::rgb(0xff, 0xff, 0x00),
    PaletteEntry::rgb(0x00, 0x00, 0xff),
    PaletteEntry::rgb(0xff, 0x00, 0xff),
    PaletteEntry::rgb(0x00, 0xff, 0xff),
    PaletteEntry::rgb(0xff, 0xff, 0xff),
];

/// The emulated 8-bit system palette and the palette last sent to the display
pub struct PaletteTables {
    system: [PaletteEntry; 256],
    hardware: [PaletteEntry; 256],
    system_palette_use: SystemPaletteUse,
    window_start: Instant,
    updates_in_window: u32,
}

impl Default for PaletteTables {
    fn default() -> Self {
        Self::new()
    }
}

impl PaletteTables {
    pub fn new() -> Self {
        let mut system = [PaletteEntry::default(); 256];
        system[..STATIC_ENTRIES].copy_from_slice(&DEFAULT_STATIC_FRONT);
        system[256 - STATIC_ENTRIES..].copy_from_slice(&DEFAULT_STATIC_BACK);
        Self {
            system,
            hardware: system,
            system_palette_use: SystemPaletteUse::Static,
            window_start: Instant::now(),
            updates_in_window: 0,
        }
    }

    pub fn system(&self) -> &[PaletteEntry; 256] {
        &self.system
    }

    pub fn hardware(&self) -> &[PaletteEntry; 256] {
        &self.hardware
    }

    pub fn set_hardware(&mut self, entries: &[PaletteEntry; 256]) {
        self.hardware = *entries;
    }

    pub fn system_palette_use(&self) -> SystemPaletteUse {
        self.system_palette_use
    }

    /// Changes which entries are reserved and returns the previous setting
    pub fn set_system_palette_use(&mut self, palette_use: SystemPaletteUse) -> SystemPaletteUse {
        let previous = std::mem::replace(&mut self.system_palette_use, palette_use);
        if palette_use == SystemPaletteUse::Static {
            self.system[..STATIC_ENTRIES].copy_from_slice(&DEFAULT_STATIC_FRONT);
            self.system[256 - STATIC_ENTRIES..].copy_from_slice(&DEFAULT_STATIC_BACK);
        }
        previous
    }

    /// Realizes an application palette into the free system palette entries
    ///
    /// Entries are placed in order starting at the first free entry; explicit entries (indices
    /// into the system palette rather than colors) are skipped. Returns the number of entries
    /// written.
    pub fn realize(&mut self, entries: &[PaletteEntry]) -> usize {
        let range = self.system_palette_use.free_range();
        let mut written = 0;
        for (slot, entry) in range
            .zip(entries.iter())
            .filter(|(_, entry)| entry.flags & PC_EXPLICIT == 0)
        {
            self.system[slot] = PaletteEntry {
                flags: 0,
                ..*entry
            };
            written += 1;
        }
        written
    }

    pub fn system_entries(&self, start: usize, count: usize) -> &[PaletteEntry] {
        let start = start.min(256);
        let end = start.saturating_add(count).min(256);
        &self.system[start..end]
    }

    /// Admits one palette update, refusing once the per-millisecond budget is spent
    pub fn admit_update(&mut self, now: Instant) -> bool {
        if now.duration_since(self.window_start) >= Duration::from_millis(1) {
            self.window_start = now;
            self.updates_in_window = 0;
        }
        if self.updates_in_window >= MAX_PALETTE_UPDATES_PER_MS {
            return false;
        }
        self.updates_in_window += 1;
        true
    }
}
