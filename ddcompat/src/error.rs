//! Error types for the shim

use std::fmt;
use thiserror::Error;

/// Raw result code exchanged with the runtime and the driver
pub type HRESULT = i32;

/// Builds a DirectDraw facility error code
const fn make_ddhresult(code: u32) -> HRESULT {
    (0x8876_0000u32 | code) as i32
}

/// HRESULT codes seen across the DirectDraw and DDI boundaries
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(pub i32);

impl HResult {
    /// Success
    pub const S_OK: HResult = HResult(0);
    /// Success, boolean false
    pub const S_FALSE: HResult = HResult(1);
    /// Generic failure
    pub const E_FAIL: HResult = HResult(0x80004005u32 as i32);
    /// Invalid argument
    pub const E_INVALIDARG: HResult = HResult(0x80070057u32 as i32);
    /// Not implemented
    pub const E_NOTIMPL: HResult = HResult(0x80004001u32 as i32);
    /// Out of memory
    pub const E_OUTOFMEMORY: HResult = HResult(0x8007000Eu32 as i32);

    /// The surface memory has been freed and must be restored
    pub const DDERR_SURFACELOST: HResult = HResult(make_ddhresult(450));
    /// The requested item was not found
    pub const DDERR_NOTFOUND: HResult = HResult(make_ddhresult(255));
    /// The object was released or never created
    pub const DDERR_INVALIDOBJECT: HResult = HResult(make_ddhresult(130));
    /// A previous operation is still in progress
    pub const DDERR_WASSTILLDRAWING: HResult = HResult(make_ddhresult(540));
    /// The surface is not attached to a flip chain
    pub const DDERR_NOTFLIPPABLE: HResult = HResult(make_ddhresult(582));
    /// A primary surface already exists
    pub const DDERR_PRIMARYSURFACEALREADYEXISTS: HResult = HResult(make_ddhresult(564));
    /// No display hardware is available
    pub const DDERR_NODIRECTDRAWHW: HResult = HResult(make_ddhresult(567));
    /// One or more arguments are invalid
    pub const DDERR_INVALIDPARAMS: HResult = HResult::E_INVALIDARG;

    /// Returns true if the result indicates success
    #[inline]
    pub fn is_success(&self) -> bool {
        self.0 >= 0
    }

    /// Returns true if the result indicates an error
    #[inline]
    pub fn is_error(&self) -> bool {
        self.0 < 0
    }

    /// Returns the raw HRESULT value
    #[inline]
    pub fn code(&self) -> HRESULT {
        self.0
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HResult(0x{:08x})", self.0 as u32)
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0 as u32)
    }
}

impl From<i32> for HResult {
    fn from(hr: i32) -> Self {
        HResult(hr)
    }
}

impl From<HResult> for HRESULT {
    fn from(hr: HResult) -> Self {
        hr.0
    }
}

#[inline]
pub fn succeeded(hr: HRESULT) -> bool {
    hr >= 0
}

#[inline]
pub fn failed(hr: HRESULT) -> bool {
    hr < 0
}

/// Error raised while installing or removing a hook
#[derive(Error, Debug)]
pub enum HookError {
    /// The module or symbol could not be found
    #[error("Unresolved hook target: {0}")]
    Unresolved(String),

    /// The target is already hooked by a different substitute
    #[error("Target 0x{address:x} is already hooked by a different substitute")]
    AlreadyHooked {
        /// Resolved target address
        address: usize,
    },

    /// The import slot or table did not hold what the hook expected
    #[error("Unexpected contents at 0x{address:x}: {reason}")]
    UnexpectedContents {
        /// Address that was inspected
        address: usize,
        /// What was wrong with it
        reason: &'static str,
    },

    /// The page protection could not be changed
    #[error("Failed to change memory protection at 0x{address:x} (os error {code})")]
    Protect {
        /// Address of the page being made writable
        address: usize,
        /// Operating system error code
        code: i32,
    },

    /// The PE image could not be parsed
    #[error("PE parse error: {0}")]
    Parse(String),

    /// The detour engine rejected the patch
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    #[error("Detour failed: {0}")]
    Detour(#[from] retour::Error),

    /// Direct entry-point patching is not available on this architecture
    #[error("Direct patching is not supported on this architecture")]
    Unsupported,

    /// Every substitute of a fixed pool is already bound to another target
    #[error("No free substitute slot for {0}")]
    NoFreeSlot(String),

    /// No hook is installed for the target
    #[error("No hook installed for {0}")]
    NotInstalled(String),
}

/// Error raised when a driver resource cannot be constructed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The driver refused to create the resource
    #[error("Driver failed to create resource (HRESULT: {0})")]
    Driver(HResult),

    /// The creation arguments are inconsistent
    #[error("Invalid resource arguments: {0}")]
    InvalidArguments(&'static str),
}

impl ResourceError {
    /// Converts the error back into the code the driver contract expects
    pub fn hresult(&self) -> HRESULT {
        match self {
            ResourceError::Driver(hr) => hr.0,
            ResourceError::InvalidArguments(_) => HResult::E_INVALIDARG.0,
        }
    }
}

/// Error raised while setting up the shim context
#[derive(Error, Debug)]
pub enum ShimError {
    /// A hook could not be installed
    #[error(transparent)]
    Hook(#[from] HookError),

    /// The process-global context was already installed
    #[error("Shim context already installed")]
    AlreadyInstalled,

    /// The system library could not be loaded
    #[error("Failed to load system library: {0}")]
    LoadLibrary(String),

    /// IO error while setting up logging
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for hook operations
pub type Result<T> = std::result::Result<T, HookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddraw_codes() {
        assert_eq!(HResult::DDERR_SURFACELOST.0 as u32, 0x887601C2);
        assert_eq!(HResult::DDERR_NOTFOUND.0 as u32, 0x887600FF);
        assert!(HResult::DDERR_WASSTILLDRAWING.is_error());
        assert!(HResult::S_FALSE.is_success());
    }

    #[test]
    fn test_resource_error_roundtrips_driver_code() {
        let err = ResourceError::Driver(HResult(0x8876_086Cu32 as i32));
        assert_eq!(err.hresult() as u32, 0x8876_086C);
        assert_eq!(
            ResourceError::InvalidArguments("no surfaces").hresult(),
            HResult::E_INVALIDARG.0
        );
    }

    #[test]
    fn test_display_is_hex() {
        assert_eq!(format!("{}", HResult::E_FAIL), "0x80004005");
        assert_eq!(format!("{:?}", HResult::S_OK), "HResult(0x00000000)");
    }
}
