//! Import address table lookup for loaded PE images

use crate::error::{HookError, Result};
use object::LittleEndian as LE;
use object::pe::{IMAGE_DIRECTORY_ENTRY_IMPORT, ImageDosHeader};
use object::read::pe::{ImageNtHeaders, ImageOptionalHeader, ImageThunkData, ImportTable};

#[cfg(target_pointer_width = "64")]
pub type NativeNtHeaders = object::pe::ImageNtHeaders64;
#[cfg(target_pointer_width = "32")]
pub type NativeNtHeaders = object::pe::ImageNtHeaders32;

/// A mapped PE image, addressed by RVA from `base`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleImage {
    base: usize,
    len: usize,
}

impl ModuleImage {
    /// Wraps `len` readable bytes at `base`
    ///
    /// # Safety
    /// The range must stay mapped and readable while the image is used.
    pub unsafe fn new(base: *const u8, len: usize) -> Self {
        Self {
            base: base as usize,
            len,
        }
    }

    /// Wraps a module mapped by the loader, sizing it from its own headers
    ///
    /// # Safety
    /// `base` must be the base address of a loaded module.
    pub unsafe fn from_loaded(base: *const u8) -> Result<Self> {
        let headers = unsafe { std::slice::from_raw_parts(base, 0x1000) };
        let dos = ImageDosHeader::parse(headers).map_err(|e| HookError::Parse(e.to_string()))?;
        let mut offset = dos.nt_headers_offset().into();
        let (nt, _) = NativeNtHeaders::parse(headers, &mut offset)
            .map_err(|e| HookError::Parse(e.to_string()))?;
        Ok(unsafe { Self::new(base, nt.optional_header().size_of_image() as usize) })
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.base as *const u8, self.len) }
    }
}

/// Finds the RVA of the import slot through which `image` calls `module!symbol`
///
/// Module names compare case-insensitively. Imports by ordinal are skipped.
pub fn find_import_slot<Pe: ImageNtHeaders>(
    image: &[u8],
    module: &str,
    symbol: &str,
) -> Result<u32> {
    let parse_err = |e: object::Error| HookError::Parse(e.to_string());

    let dos = ImageDosHeader::parse(image).map_err(parse_err)?;
    let mut offset = dos.nt_headers_offset().into();
    let (_nt, dirs) = Pe::parse(image, &mut offset).map_err(parse_err)?;
    let import_va = dirs
        .get(IMAGE_DIRECTORY_ENTRY_IMPORT)
        .map(|dir| dir.virtual_address.get(LE))
        .filter(|&va| va != 0)
        .ok_or_else(|| HookError::Unresolved(format!("{module}!{symbol}: no import directory")))?;

    let table = ImportTable::new(image, 0, import_va);
    let mut descriptors = table.descriptors().map_err(parse_err)?;
    let thunk_size = std::mem::size_of::<Pe::ImageThunkData>() as u32;

    while let Some(desc) = descriptors.next().map_err(parse_err)? {
        let dll_name = table.name(desc.name.get(LE)).map_err(parse_err)?;
        if !dll_name.eq_ignore_ascii_case(module.as_bytes()) {
            continue;
        }

        // Some linkers leave the lookup table empty and only fill the address table
        let first_thunk = desc.first_thunk.get(LE);
        let lookup = match desc.original_first_thunk.get(LE) {
            0 => first_thunk,
            rva => rva,
        };
        let mut thunks = table.thunks(lookup).map_err(parse_err)?;
        let mut index = 0u32;
        while let Some(thunk) = thunks.next::<Pe>().map_err(parse_err)? {
            if !thunk.is_ordinal()
                && let Ok((_hint, name)) = table.hint_name(thunk.address())
                && name == symbol.as_bytes()
            {
                return Ok(first_thunk + index * thunk_size);
            }
            index += 1;
        }
    }

    Err(HookError::Unresolved(format!(
        "{module}!{symbol}: not imported"
    )))
}
