//! Windows library entry
//!
//! The shim is loaded as `ddraw.dll`. On attach it loads the system libraries it stands in for,
//! points its forwarded exports at them, installs the [`Shim`] context and hooks the kernel thunk
//! through which the runtime learns the user-mode display driver's file name.

use crate::exports::FORWARDED_MODULES;
use crate::hook::{HookTarget, SymbolResolver, SystemResolver};
use crate::shim::Shim;
use std::ffi::c_void;
use std::os::windows::ffi::OsStringExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use winapi::shared::minwindef::{BOOL, DWORD, HINSTANCE, LPVOID, TRUE};
use winapi::shared::ntdef::NTSTATUS;
use winapi::um::libloaderapi::LoadLibraryW;
use winapi::um::sysinfoapi::GetSystemDirectoryW;
use winapi::um::winnt::{DLL_PROCESS_ATTACH, DLL_PROCESS_DETACH};

const LOG_FILE: &str = "ddcompat.log";

// ============================================================================
// Forwarded exports
// ============================================================================

#[cfg(target_arch = "x86_64")]
macro_rules! jump_through {
    ($slot:path) => {
        std::arch::naked_asm!("jmp qword ptr [rip + {slot}]", slot = sym $slot)
    };
}

#[cfg(target_arch = "x86")]
macro_rules! jump_through {
    ($slot:path) => {
        std::arch::naked_asm!("jmp dword ptr [{slot}]", slot = sym $slot)
    };
}

macro_rules! forwarded_exports {
    (ddraw: [$($ddraw:ident),* $(,)?], dciman32: [$($dci:ident),* $(,)?] $(,)?) => {
        ::paste::paste! {
            $(
                #[allow(non_upper_case_globals)]
                static [<ORIG_ $ddraw>]: AtomicUsize = AtomicUsize::new(0);

                #[unsafe(no_mangle)]
                #[unsafe(naked)]
                pub unsafe extern "C" fn $ddraw() {
                    jump_through!([<ORIG_ $ddraw>])
                }
            )*
            $(
                #[allow(non_upper_case_globals)]
                static [<ORIG_ $dci>]: AtomicUsize = AtomicUsize::new(0);

                #[unsafe(no_mangle)]
                #[unsafe(naked)]
                pub unsafe extern "C" fn $dci() {
                    jump_through!([<ORIG_ $dci>])
                }
            )*

            /// Jump slot of every forwarded export, by name
            fn forward_slot(name: &str) -> Option<&'static AtomicUsize> {
                match name {
                    $(stringify!($ddraw) => Some(&[<ORIG_ $ddraw>]),)*
                    $(stringify!($dci) => Some(&[<ORIG_ $dci>]),)*
                    _ => None,
                }
            }
        }
    };
}

crate::visit_procs!(forwarded_exports);

fn system_directory() -> Option<PathBuf> {
    let mut buffer = [0u16; 260];
    let len = unsafe { GetSystemDirectoryW(buffer.as_mut_ptr(), buffer.len() as u32) } as usize;
    if len == 0 || len > buffer.len() {
        return None;
    }
    Some(std::ffi::OsString::from_wide(&buffer[..len]).into())
}

/// Points every forwarded export at the system library's implementation
fn load_forwarded_exports() {
    let Some(system) = system_directory() else {
        log::error!("Failed to locate the system directory");
        return;
    };
    for forwarded in &FORWARDED_MODULES {
        let path = system.join(forwarded.module);
        let path = path.to_string_lossy();
        let mut missing = 0;
        for &name in forwarded.procs {
            let address = SystemResolver.resolve(&path, name);
            if let Some(slot) = forward_slot(name) {
                slot.store(address.unwrap_or(0), Ordering::Release);
            }
            if address.is_none() {
                missing += 1;
            }
        }
        if missing > 0 {
            log::warn!("{missing} exports of {path} are unavailable");
        }
    }
}

// ============================================================================
// User-mode display driver discovery
// ============================================================================

const KMTQAITYPE_UMDRIVERNAME: u32 = 1;
const MAX_PATH: usize = 260;

#[repr(C)]
struct D3DKMT_QUERYADAPTERINFO {
    hAdapter: u32,
    Type: u32,
    pPrivateDriverData: *mut c_void,
    PrivateDriverDataSize: u32,
}

#[repr(C)]
struct D3DKMT_UMDFILENAMEINFO {
    Version: u32,
    UmdFileName: [u16; MAX_PATH],
}

type PFND3DKMT_QUERYADAPTERINFO = unsafe extern "system" fn(*const D3DKMT_QUERYADAPTERINFO) -> NTSTATUS;

static ORIG_QUERY_ADAPTER_INFO: AtomicUsize = AtomicUsize::new(0);

unsafe extern "system" fn query_adapter_info(data: *const D3DKMT_QUERYADAPTERINFO) -> NTSTATUS {
    let original = ORIG_QUERY_ADAPTER_INFO.load(Ordering::Acquire);
    if original == 0 {
        return winapi::shared::ntstatus::STATUS_NOT_SUPPORTED;
    }
    let status = unsafe {
        let original = std::mem::transmute::<usize, PFND3DKMT_QUERYADAPTERINFO>(original);
        original(data)
    };
    if status >= 0
        && let Some(data) = unsafe { data.as_ref() }
        && data.Type == KMTQAITYPE_UMDRIVERNAME
        && !data.pPrivateDriverData.is_null()
        && data.PrivateDriverDataSize as usize >= std::mem::size_of::<D3DKMT_UMDFILENAMEINFO>()
    {
        let info = unsafe { &*data.pPrivateDriverData.cast::<D3DKMT_UMDFILENAMEINFO>() };
        unsafe { hook_user_mode_driver(&info.UmdFileName) };
    }
    status
}

unsafe fn hook_user_mode_driver(file_name: &[u16; MAX_PATH]) {
    let Some(shim) = Shim::global() else {
        return;
    };
    let len = file_name.iter().position(|&c| c == 0).unwrap_or(MAX_PATH);
    let path = String::from_utf16_lossy(&file_name[..len]);
    let mut wide = file_name[..len].to_vec();
    wide.push(0);

    let module = unsafe { LoadLibraryW(wide.as_ptr()) } as usize;
    if module == 0 {
        log::warn!("Failed to load user-mode display driver {path}");
        return;
    }
    if let Err(e) = unsafe { shim.hook_user_mode_driver(module, HookTarget::export(&path, "OpenAdapter")) } {
        log::error!("Failed to hook user-mode display driver {path}: {e}");
    }
}

// ============================================================================
// Entry
// ============================================================================

fn init_logging() {
    let path = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(LOG_FILE)))
        .unwrap_or_else(|| PathBuf::from(LOG_FILE));
    let Ok(file) = std::fs::File::create(&path) else {
        return;
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init();
}

fn attach() {
    init_logging();
    log::info!("ddcompat {} attached", env!("CARGO_PKG_VERSION"));
    load_forwarded_exports();

    let shim = match Shim::with_system_defaults().install() {
        Ok(shim) => shim,
        Err(e) => {
            log::error!("Failed to install the shim: {e}");
            return;
        }
    };
    if let Err(e) = shim.start() {
        log::error!("Failed to start the primary surface update thread: {e}");
    }
    let target = HookTarget::export("gdi32.dll", "D3DKMTQueryAdapterInfo");
    match unsafe { shim.hooks().install(target, query_adapter_info as PFND3DKMT_QUERYADAPTERINFO as usize) } {
        Ok(original) => ORIG_QUERY_ADAPTER_INFO.store(original, Ordering::Release),
        Err(e) => log::error!("Failed to hook D3DKMTQueryAdapterInfo: {e}"),
    }
}

fn detach() {
    let Some(shim) = Shim::global() else {
        return;
    };
    // Joining the update thread under the loader lock would deadlock; it stops with the process.
    shim.primary().release();
    unsafe { shim.hooks().uninstall_all() };
    log::info!("ddcompat detached");
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn DllMain(_module: HINSTANCE, reason: DWORD, _reserved: LPVOID) -> BOOL {
    match reason {
        DLL_PROCESS_ATTACH => attach(),
        DLL_PROCESS_DETACH => detach(),
        _ => {}
    }
    TRUE
}
