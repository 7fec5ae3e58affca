//! Pointer-slot writes across page protection

use crate::error::{HookError, Result};

/// Stores `value` into `slot`, making the page writable for the duration of the write
///
/// On failure the slot is left untouched.
#[cfg(windows)]
pub(crate) unsafe fn write_slot(slot: *mut usize, value: usize) -> Result<()> {
    use winapi::um::errhandlingapi::GetLastError;
    use winapi::um::memoryapi::VirtualProtect;
    use winapi::um::winnt::PAGE_READWRITE;

    let size = std::mem::size_of::<usize>();
    let mut old_protect = 0u32;
    if unsafe { VirtualProtect(slot.cast(), size, PAGE_READWRITE, &mut old_protect) } == 0 {
        return Err(HookError::Protect {
            address: slot as usize,
            code: unsafe { GetLastError() } as i32,
        });
    }
    let mut ignored = 0u32;
    unsafe {
        std::ptr::write_volatile(slot, value);
        VirtualProtect(slot.cast(), size, old_protect, &mut ignored);
    }
    Ok(())
}

/// Stores `value` into `slot`, making the page writable for the duration of the write
///
/// Where the page's protection cannot be read back from `/proc/self/maps` it stays read-write
/// afterwards.
#[cfg(unix)]
pub(crate) unsafe fn write_slot(slot: *mut usize, value: usize) -> Result<()> {
    let page_size = match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        size if size > 0 => size as usize,
        _ => 4096,
    };
    let page = (slot as usize) & !(page_size - 1);
    let previous = std::fs::read_to_string("/proc/self/maps")
        .ok()
        .and_then(|maps| page_protection(&maps, page));
    if previous.is_some_and(|prot| prot & libc::PROT_WRITE != 0) {
        unsafe { std::ptr::write_volatile(slot, value) };
        return Ok(());
    }

    let writable = previous.unwrap_or(0) | libc::PROT_READ | libc::PROT_WRITE;
    if unsafe { libc::mprotect(page as *mut libc::c_void, page_size, writable) } != 0 {
        return Err(HookError::Protect {
            address: slot as usize,
            code: std::io::Error::last_os_error().raw_os_error().unwrap_or(0),
        });
    }
    unsafe { std::ptr::write_volatile(slot, value) };

    match previous {
        Some(prot) => {
            if unsafe { libc::mprotect(page as *mut libc::c_void, page_size, prot) } != 0 {
                log::warn!(
                    "Failed to restore protection of page 0x{page:x}: {}",
                    std::io::Error::last_os_error()
                );
            }
        }
        None => log::debug!("Protection of page 0x{page:x} unknown, leaving it read-write"),
    }
    Ok(())
}

/// Protection of the mapping containing `address`, from the text of `/proc/self/maps`
#[cfg(unix)]
fn page_protection(maps: &str, address: usize) -> Option<libc::c_int> {
    maps.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let (start, end) = fields.next()?.split_once('-')?;
        let start = usize::from_str_radix(start, 16).ok()?;
        let end = usize::from_str_radix(end, 16).ok()?;
        if !(start..end).contains(&address) {
            return None;
        }
        let perms = fields.next()?.as_bytes();
        let mut prot = libc::PROT_NONE;
        for (flag, bit) in [(b'r', libc::PROT_READ), (b'w', libc::PROT_WRITE), (b'x', libc::PROT_EXEC)] {
            if perms.contains(&flag) {
                prot |= bit;
            }
        }
        Some(prot)
    })
}

#[inline]
pub(crate) unsafe fn read_slot(slot: *const usize) -> usize {
    unsafe { std::ptr::read_volatile(slot) }
}
