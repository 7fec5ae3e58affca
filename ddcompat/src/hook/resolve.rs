//! Module/export symbol resolution

use std::collections::HashMap;

/// Maps a (module, export) pair to the address of the export in this process
pub trait SymbolResolver: Send + Sync {
    fn resolve(&self, module: &str, symbol: &str) -> Option<usize>;
}

/// Resolver backed by the platform loader
///
/// On Windows the module is looked up among loaded modules first and loaded on demand; on Unix
/// it goes through `dlopen`/`dlsym`, with an empty module name meaning the main program.
#[derive(Default, Clone, Copy, Debug)]
pub struct SystemResolver;

#[cfg(windows)]
impl SymbolResolver for SystemResolver {
    fn resolve(&self, module: &str, symbol: &str) -> Option<usize> {
        use std::ffi::CString;
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::libloaderapi::{GetModuleHandleW, GetProcAddress, LoadLibraryW};

        let wide: Vec<u16> = std::ffi::OsStr::new(module)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();
        let symbol = CString::new(symbol).ok()?;
        unsafe {
            let mut handle = GetModuleHandleW(wide.as_ptr());
            if handle.is_null() {
                handle = LoadLibraryW(wide.as_ptr());
            }
            if handle.is_null() {
                return None;
            }
            let address = GetProcAddress(handle, symbol.as_ptr());
            (!address.is_null()).then_some(address as usize)
        }
    }
}

#[cfg(unix)]
impl SymbolResolver for SystemResolver {
    fn resolve(&self, module: &str, symbol: &str) -> Option<usize> {
        use std::ffi::CString;

        let symbol = CString::new(symbol).ok()?;
        unsafe {
            let handle = if module.is_empty() {
                libc::dlopen(std::ptr::null(), libc::RTLD_NOW)
            } else {
                let module = CString::new(module).ok()?;
                libc::dlopen(module.as_ptr(), libc::RTLD_NOW)
            };
            if handle.is_null() {
                return None;
            }
            let address = libc::dlsym(handle, symbol.as_ptr());
            (!address.is_null()).then_some(address as usize)
        }
    }
}

/// Resolver over a fixed table, for injecting known addresses
///
/// Module names compare case-insensitively like Windows module names do.
#[derive(Default, Clone, Debug)]
pub struct MapResolver {
    entries: HashMap<(String, String), usize>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, module: &str, symbol: &str, address: usize) -> Self {
        self.insert(module, symbol, address);
        self
    }

    pub fn insert(&mut self, module: &str, symbol: &str, address: usize) {
        self.entries
            .insert((module.to_ascii_lowercase(), symbol.to_owned()), address);
    }
}

impl SymbolResolver for MapResolver {
    fn resolve(&self, module: &str, symbol: &str) -> Option<usize> {
        self.entries
            .get(&(module.to_ascii_lowercase(), symbol.to_owned()))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_resolver_ignores_module_case() {
        let resolver = MapResolver::new().with("GDI32.dll", "D3DKMTQueryAdapterInfo", 0x1000);
        assert_eq!(
            resolver.resolve("gdi32.DLL", "D3DKMTQueryAdapterInfo"),
            Some(0x1000)
        );
        assert_eq!(resolver.resolve("gdi32.dll", "d3dkmtqueryadapterinfo"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_resolver_finds_libc_symbol() {
        let resolver = SystemResolver;
        assert!(resolver.resolve("", "malloc").is_some());
        assert!(resolver.resolve("", "definitely_not_a_symbol_4711").is_none());
        assert!(resolver.resolve("libdoes-not-exist.so.9", "malloc").is_none());
    }
}
