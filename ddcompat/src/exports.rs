//! Entry points the shim exports in place of the system libraries
//!
//! Every name listed here is exported by the shim and forwards to the same export of the system
//! library it replaces.

/// Invokes `$visit!` with every forwarded export, grouped by the system library providing it
#[macro_export]
macro_rules! visit_procs {
    ($visit:ident) => {
        $visit! {
            ddraw: [
                // Public
                DirectDrawCreate,
                DirectDrawCreateClipper,
                DirectDrawCreateEx,
                DirectDrawEnumerateA,
                DirectDrawEnumerateExA,
                DirectDrawEnumerateExW,
                DirectDrawEnumerateW,
                DllGetClassObject,
                // Private
                AcquireDDThreadLock,
                CompleteCreateSysmemSurface,
                D3DParseUnknownCommand,
                DDGetAttachedSurfaceLcl,
                DDInternalLock,
                DDInternalUnlock,
                DSoundHelp,
                DllCanUnloadNow,
                GetDDSurfaceLocal,
                GetOLEThunkData,
                GetSurfaceFromDC,
                RegisterSpecialCase,
                ReleaseDDThreadLock,
                SetAppCompatData,
            ],
            dciman32: [
                DCIBeginAccess,
                DCICloseProvider,
                DCICreateOffscreen,
                DCICreateOverlay,
                DCICreatePrimary,
                DCIDestroy,
                DCIDraw,
                DCIEndAccess,
                DCIEnum,
                DCIOpenProvider,
                DCISetClipList,
                DCISetDestination,
                DCISetSrcDestClip,
                GetDCRegionData,
                GetWindowRegionData,
                WinWatchClose,
                WinWatchDidStatusChange,
                WinWatchGetClipList,
                WinWatchNotify,
                WinWatchOpen,
            ],
        }
    };
}

/// A system library and the exports forwarded to it
#[derive(Debug, Clone, Copy)]
pub struct ForwardedModule {
    pub module: &'static str,
    pub procs: &'static [&'static str],
}

macro_rules! forwarded_modules {
    (ddraw: [$($ddraw:ident),* $(,)?], dciman32: [$($dci:ident),* $(,)?] $(,)?) => {
        /// Every forwarded export, by providing library
        pub static FORWARDED_MODULES: [ForwardedModule; 2] = [
            ForwardedModule {
                module: "ddraw.dll",
                procs: &[$(stringify!($ddraw)),*],
            },
            ForwardedModule {
                module: "dciman32.dll",
                procs: &[$(stringify!($dci)),*],
            },
        ];
    };
}

visit_procs!(forwarded_modules);

/// Total number of forwarded exports
pub fn proc_count() -> usize {
    FORWARDED_MODULES.iter().map(|module| module.procs.len()).sum()
}

/// The library providing export `name`
pub fn providing_module(name: &str) -> Option<&'static str> {
    FORWARDED_MODULES
        .iter()
        .find(|module| module.procs.contains(&name))
        .map(|module| module.module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn test_export_counts() {
        assert_eq!(FORWARDED_MODULES[0].procs.len(), 22);
        assert_eq!(FORWARDED_MODULES[1].procs.len(), 20);
        assert_eq!(proc_count(), 42);
    }

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<_> = FORWARDED_MODULES.iter().flat_map(|m| m.procs.iter()).collect();
        assert_eq!(names.len(), proc_count());
    }

    #[test]
    fn test_providing_module() {
        assert_eq!(providing_module("DirectDrawCreateEx"), Some("ddraw.dll"));
        assert_eq!(providing_module("DCIOpenProvider"), Some("dciman32.dll"));
        assert_eq!(providing_module("Direct3DCreate9"), None);
    }
}
