//! Entry-point detours

use crate::error::Result;

/// An enabled detour from a function entry point to a substitute
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub(crate) struct DirectPatch {
    detour: retour::RawDetour,
}

// The detour only refers to code addresses, which are valid on every thread
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
unsafe impl Send for DirectPatch {}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl DirectPatch {
    /// Patches `target` to jump to `substitute`, returning the patch and the trampoline that
    /// runs the original code
    pub(crate) unsafe fn install(target: usize, substitute: usize) -> Result<(Self, usize)> {
        let detour = unsafe { retour::RawDetour::new(target as *const (), substitute as *const ())? };
        unsafe { detour.enable()? };
        let trampoline = detour.trampoline() as *const () as usize;
        Ok((Self { detour }, trampoline))
    }

    pub(crate) unsafe fn remove(self) -> Result<()> {
        unsafe { self.detour.disable()? };
        Ok(())
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub(crate) struct DirectPatch;

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
impl DirectPatch {
    pub(crate) unsafe fn install(_target: usize, _substitute: usize) -> Result<(Self, usize)> {
        Err(crate::error::HookError::Unsupported)
    }

    pub(crate) unsafe fn remove(self) -> Result<()> {
        Ok(())
    }
}
