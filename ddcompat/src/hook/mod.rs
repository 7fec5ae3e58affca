//! Process-wide function hooks
//!
//! A [`HookRegistry`] redirects a function (named by address, by module export, or by a module's
//! import of it) to a substitute and keeps the original reachable. Every active patch is owned by
//! the registry and is undone by [`HookRegistry::uninstall_all`] or when the registry is dropped.

mod detour;
mod imports;
mod protect;
mod resolve;

pub use imports::{ModuleImage, NativeNtHeaders, find_import_slot};
pub use resolve::{MapResolver, SymbolResolver, SystemResolver};

use crate::error::{HookError, Result};
use detour::DirectPatch;
use parking_lot::Mutex;
use std::fmt;

/// What to redirect
#[derive(Clone, Debug)]
pub enum HookTarget {
    /// A function entry point
    Address(usize),
    /// A function exported by a module, patched at its entry point
    Export { module: String, symbol: String },
    /// The import slot through which `importer` calls `module!symbol`
    Import {
        importer: ModuleImage,
        module: String,
        symbol: String,
    },
    /// An explicit process-global function pointer slot
    ImportSlot(usize),
}

impl HookTarget {
    pub fn export(module: &str, symbol: &str) -> Self {
        HookTarget::Export {
            module: module.to_owned(),
            symbol: symbol.to_owned(),
        }
    }

    pub fn import(importer: ModuleImage, module: &str, symbol: &str) -> Self {
        HookTarget::Import {
            importer,
            module: module.to_owned(),
            symbol: symbol.to_owned(),
        }
    }

    /// How a hook on this target is installed
    pub fn kind(&self) -> InstallKind {
        match self {
            HookTarget::Address(_) | HookTarget::Export { .. } => InstallKind::DirectPatch,
            HookTarget::Import { .. } | HookTarget::ImportSlot(_) => InstallKind::ImportTable,
        }
    }
}

impl fmt::Display for HookTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookTarget::Address(address) => write!(f, "0x{address:x}"),
            HookTarget::Export { module, symbol } => write!(f, "{module}!{symbol}"),
            HookTarget::Import {
                importer,
                module,
                symbol,
            } => write!(f, "import of {module}!{symbol} in 0x{:x}", importer.base()),
            HookTarget::ImportSlot(slot) => write!(f, "slot 0x{slot:x}"),
        }
    }
}

/// Patch strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallKind {
    /// Rewrite the function entry point; all callers are redirected
    DirectPatch,
    /// Rewrite one pointer slot; only callers going through that slot are redirected
    ImportTable,
}

enum Patch {
    Direct(DirectPatch),
    Slot,
}

struct HookEntry {
    description: String,
    /// Resolved function address for direct patches, slot address for import patches
    key: usize,
    original: usize,
    substitute: usize,
    patch: Patch,
}

impl HookEntry {
    unsafe fn restore(self) -> Result<()> {
        match self.patch {
            Patch::Direct(patch) => unsafe { patch.remove() },
            Patch::Slot => {
                let slot = self.key as *mut usize;
                if unsafe { protect::read_slot(slot) } != self.substitute {
                    log::warn!(
                        "Hook slot for {} was overwritten since install, restoring anyway",
                        self.description
                    );
                }
                unsafe { protect::write_slot(slot, self.original) }
            }
        }
    }
}

/// Owner of every installed hook
pub struct HookRegistry {
    resolver: Box<dyn SymbolResolver>,
    entries: Mutex<Vec<HookEntry>>,
}

impl HookRegistry {
    pub fn new(resolver: impl SymbolResolver + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn resolver(&self) -> &dyn SymbolResolver {
        self.resolver.as_ref()
    }

    fn resolve(&self, target: &HookTarget) -> Result<usize> {
        match target {
            HookTarget::Address(address) => Ok(*address),
            HookTarget::ImportSlot(slot) => Ok(*slot),
            HookTarget::Export { module, symbol } => self
                .resolver
                .resolve(module, symbol)
                .ok_or_else(|| HookError::Unresolved(target.to_string())),
            HookTarget::Import {
                importer,
                module,
                symbol,
            } => {
                let rva = find_import_slot::<NativeNtHeaders>(importer.bytes(), module, symbol)?;
                Ok(importer.base() + rva as usize)
            }
        }
    }

    /// Redirects `target` to `substitute` and returns the address that reaches the original
    ///
    /// Installing the same substitute twice returns the first original without patching again.
    /// A different substitute on an already hooked target is refused. On any error nothing is
    /// modified.
    ///
    /// # Safety
    /// `substitute` must be a function with the target's exact signature and calling
    /// convention, and the target memory must not be executing a partially patched prologue.
    pub unsafe fn install(&self, target: HookTarget, substitute: usize) -> Result<usize> {
        let key = self.resolve(&target)?;
        let mut entries = self.entries.lock();

        if let Some(existing) = entries.iter().find(|entry| entry.key == key) {
            if existing.substitute == substitute {
                return Ok(existing.original);
            }
            return Err(HookError::AlreadyHooked { address: key });
        }

        let (patch, original) = match target.kind() {
            InstallKind::DirectPatch => {
                let (patch, trampoline) = unsafe { DirectPatch::install(key, substitute)? };
                (Patch::Direct(patch), trampoline)
            }
            InstallKind::ImportTable => {
                let slot = key as *mut usize;
                let original = unsafe { protect::read_slot(slot) };
                if original == 0 {
                    return Err(HookError::UnexpectedContents {
                        address: key,
                        reason: "empty import slot",
                    });
                }
                unsafe { protect::write_slot(slot, substitute)? };
                (Patch::Slot, original)
            }
        };

        log::debug!("Hooked {target} (0x{key:x} -> 0x{substitute:x})");
        entries.push(HookEntry {
            description: target.to_string(),
            key,
            original,
            substitute,
            patch,
        });
        Ok(original)
    }

    /// Address reaching the original behavior of a hooked target
    pub fn original(&self, target: &HookTarget) -> Option<usize> {
        let key = self.resolve(target).ok()?;
        self.entries
            .lock()
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.original)
    }

    /// Typed access to the original of a hooked target
    ///
    /// # Safety
    /// `F` must be the function pointer type of the target.
    pub unsafe fn original_fn<F: Copy>(&self, target: &HookTarget) -> Option<F> {
        assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<usize>());
        self.original(target)
            .map(|address| unsafe { std::mem::transmute_copy::<usize, F>(&address) })
    }

    pub fn is_installed(&self, target: &HookTarget) -> bool {
        self.original(target).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes the hook on `target`, restoring its pristine state
    ///
    /// # Safety
    /// No thread may be executing the patched prologue.
    pub unsafe fn uninstall(&self, target: &HookTarget) -> Result<()> {
        let key = self.resolve(target)?;
        let entry = {
            let mut entries = self.entries.lock();
            let index = entries
                .iter()
                .position(|entry| entry.key == key)
                .ok_or_else(|| HookError::NotInstalled(target.to_string()))?;
            entries.remove(index)
        };
        log::debug!("Unhooked {}", entry.description);
        unsafe { entry.restore() }
    }

    /// Removes every hook in reverse install order
    ///
    /// Failures are logged and do not stop the remaining restores.
    ///
    /// # Safety
    /// No thread may be executing a patched prologue.
    pub unsafe fn uninstall_all(&self) {
        let entries = std::mem::take(&mut *self.entries.lock());
        for entry in entries.into_iter().rev() {
            let description = entry.description.clone();
            if let Err(e) = unsafe { entry.restore() } {
                log::error!("Failed to unhook {description}: {e}");
            }
        }
    }
}

impl Drop for HookRegistry {
    fn drop(&mut self) {
        unsafe { self.uninstall_all() };
    }
}
