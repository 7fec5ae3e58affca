//! The original driver entry points a device forwards to

use super::types::*;
use crate::error::{HResult, HRESULT};
use crate::vtable::OriginalTable;
use std::ffi::c_void;

/// Invokes `$visit!` with every state-setting device entry point and the arguments it takes
/// after the device handle
macro_rules! visit_state_entry_points {
    ($visit:ident) => {
        $visit! {
            SetRenderState(data),
            UpdateWInfo(data),
            SetTextureStageState(data),
            SetTexture(stage, texture),
            SetPixelShader(shader),
            SetPixelShaderConst(data, registers),
            SetIndices(data),
            SetIndicesUm(index_size, indices),
            StateSet(data),
            UpdatePalette(data, entries),
            SetPalette(data),
            SetVertexShaderConst(data, registers),
            MultiplyTransform(data),
            SetTransform(data),
            SetViewport(data),
            SetZRange(data),
            SetMaterial(data),
            SetLight(data, light),
            CreateLight(data),
            DestroyLight(data),
            SetClipPlane(data),
            SetVertexShaderFunc(shader),
            SetVertexShaderDecl(shader),
            SetVertexShaderConstI(data, registers),
            SetVertexShaderConstB(data, registers),
            SetScissorRect(rect),
            SetStreamSourceFreq(data),
            SetDepthStencil(data),
            SetPixelShaderConstI(data, registers),
            SetPixelShaderConstB(data, registers),
        }
    };
}

pub(crate) use visit_state_entry_points;

macro_rules! define_state_calls {
    ($($name:ident($($arg:ident),+)),* $(,)?) => {
        /// Device entry points that change rendering state
        ///
        /// Draws queued before one of these must reach the driver first.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum StateCall {
            $($name,)*
        }

        impl StateCall {
            pub const COUNT: usize = [$(stringify!($name)),*].len();
            pub const ALL: [StateCall; Self::COUNT] = [$(StateCall::$name),*];

            /// The `D3DDDI_DEVICEFUNCS` member this call arrives through
            pub fn member(self) -> &'static str {
                match self {
                    $(StateCall::$name => concat!("pfn", stringify!($name)),)*
                }
            }

            /// Number of arguments after the device handle
            pub fn arity(self) -> usize {
                match self {
                    $(StateCall::$name => [$(stringify!($arg)),+].len(),)*
                }
            }
        }
    };
}

visit_state_entry_points!(define_state_calls);

/// Every state entry point takes pointer-sized arguments after the device handle
type PfnState1 = unsafe extern "system" fn(Handle, usize) -> HRESULT;
type PfnState2 = unsafe extern "system" fn(Handle, usize, usize) -> HRESULT;

/// Original device entry points of one driver device
///
/// Every method passes its arguments through unchanged and returns the driver's code. Entry
/// points the driver left null report `E_NOTIMPL`.
pub trait DriverDevice: Send {
    fn blt(&self, data: &D3DDDIARG_BLT) -> HRESULT;
    fn clear(&self, data: &D3DDDIARG_CLEAR, rects: &[RECT]) -> HRESULT;
    fn color_fill(&self, data: &D3DDDIARG_COLORFILL) -> HRESULT;
    fn create_resource(&self, data: &mut D3DDDIARG_CREATERESOURCE) -> HRESULT;
    fn create_resource2(&self, data: &mut D3DDDIARG_CREATERESOURCE2) -> HRESULT;
    /// True when the driver implements `pfnCreateResource2`
    fn has_create_resource2(&self) -> bool;
    fn destroy_device(&self) -> HRESULT;
    fn destroy_resource(&self, resource: Handle) -> HRESULT;
    fn draw_indexed_primitive2(
        &self,
        data: &D3DDDIARG_DRAWINDEXEDPRIMITIVE2,
        indices_size: UINT,
        indices: *const c_void,
        flag_buffer: *const UINT,
    ) -> HRESULT;
    fn draw_primitive(&self, data: &D3DDDIARG_DRAWPRIMITIVE, flag_buffer: *const UINT) -> HRESULT;
    fn flush(&self) -> HRESULT;
    fn flush1(&self, flags: UINT) -> HRESULT;
    fn lock(&self, data: &mut D3DDDIARG_LOCK) -> HRESULT;
    fn open_resource(&self, data: &mut D3DDDIARG_OPENRESOURCE) -> HRESULT;
    fn present(&self, data: &D3DDDIARG_PRESENT) -> HRESULT;
    fn present1(&self, data: &mut D3DDDIARG_PRESENT1) -> HRESULT;
    fn set_render_target(&self, data: &D3DDDIARG_SETRENDERTARGET) -> HRESULT;
    fn set_stream_source(&self, data: &D3DDDIARG_SETSTREAMSOURCE) -> HRESULT;
    fn set_stream_source_um(&self, data: &D3DDDIARG_SETSTREAMSOURCEUM, vertices: *const c_void) -> HRESULT;
    fn unlock(&self, data: &D3DDDIARG_UNLOCK) -> HRESULT;
    /// Forwards one of the state-setting entry points with its raw arguments
    fn set_state(&self, call: StateCall, args: &[usize]) -> HRESULT;
}

/// Typed originals captured from a device's function table
#[derive(Clone, Copy, Default)]
pub struct DriverFuncs {
    device: Handle,
    blt: Option<PFND3DDDI_BLT>,
    clear: Option<PFND3DDDI_CLEAR>,
    color_fill: Option<PFND3DDDI_COLORFILL>,
    create_resource: Option<PFND3DDDI_CREATERESOURCE>,
    create_resource2: Option<PFND3DDDI_CREATERESOURCE2>,
    destroy_device: Option<PFND3DDDI_DESTROYDEVICE>,
    destroy_resource: Option<PFND3DDDI_DESTROYRESOURCE>,
    draw_indexed_primitive2: Option<PFND3DDDI_DRAWINDEXEDPRIMITIVE2>,
    draw_primitive: Option<PFND3DDDI_DRAWPRIMITIVE>,
    flush: Option<PFND3DDDI_FLUSH>,
    flush1: Option<PFND3DDDI_FLUSH1>,
    lock: Option<PFND3DDDI_LOCK>,
    open_resource: Option<PFND3DDDI_OPENRESOURCE>,
    present: Option<PFND3DDDI_PRESENT>,
    present1: Option<PFND3DDDI_PRESENT1>,
    set_render_target: Option<PFND3DDDI_SETRENDERTARGET>,
    set_stream_source: Option<PFND3DDDI_SETSTREAMSOURCE>,
    set_stream_source_um: Option<PFND3DDDI_SETSTREAMSOURCEUM>,
    unlock: Option<PFND3DDDI_UNLOCK>,
    state: [Option<usize>; StateCall::COUNT],
}

impl DriverFuncs {
    /// Binds the originals captured for a table to `device`
    ///
    /// # Safety
    /// `originals` must have been captured from a genuine `D3DDDI_DEVICEFUNCS` table.
    pub unsafe fn capture(device: Handle, originals: &OriginalTable) -> Self {
        unsafe {
            Self {
                device,
                blt: originals.typed("pfnBlt"),
                clear: originals.typed("pfnClear"),
                color_fill: originals.typed("pfnColorFill"),
                create_resource: originals.typed("pfnCreateResource"),
                create_resource2: originals.typed("pfnCreateResource2"),
                destroy_device: originals.typed("pfnDestroyDevice"),
                destroy_resource: originals.typed("pfnDestroyResource"),
                draw_indexed_primitive2: originals.typed("pfnDrawIndexedPrimitive2"),
                draw_primitive: originals.typed("pfnDrawPrimitive"),
                flush: originals.typed("pfnFlush"),
                flush1: originals.typed("pfnFlush1"),
                lock: originals.typed("pfnLock"),
                open_resource: originals.typed("pfnOpenResource"),
                present: originals.typed("pfnPresent"),
                present1: originals.typed("pfnPresent1"),
                set_render_target: originals.typed("pfnSetRenderTarget"),
                set_stream_source: originals.typed("pfnSetStreamSource"),
                set_stream_source_um: originals.typed("pfnSetStreamSourceUm"),
                unlock: originals.typed("pfnUnlock"),
                state: StateCall::ALL.map(|call| originals.get(call.member())),
            }
        }
    }

    pub fn device(&self) -> Handle {
        self.device
    }
}

macro_rules! forward {
    ($self:ident . $field:ident ( $($arg:expr),* )) => {
        match $self.$field {
            Some(func) => unsafe { func($self.device, $($arg),*) },
            None => HResult::E_NOTIMPL.0,
        }
    };
}

impl DriverDevice for DriverFuncs {
    fn blt(&self, data: &D3DDDIARG_BLT) -> HRESULT {
        forward!(self.blt(data))
    }

    fn clear(&self, data: &D3DDDIARG_CLEAR, rects: &[RECT]) -> HRESULT {
        let rects_ptr = if rects.is_empty() { std::ptr::null() } else { rects.as_ptr() };
        forward!(self.clear(data, rects.len() as UINT, rects_ptr))
    }

    fn color_fill(&self, data: &D3DDDIARG_COLORFILL) -> HRESULT {
        forward!(self.color_fill(data))
    }

    fn create_resource(&self, data: &mut D3DDDIARG_CREATERESOURCE) -> HRESULT {
        forward!(self.create_resource(data))
    }

    fn create_resource2(&self, data: &mut D3DDDIARG_CREATERESOURCE2) -> HRESULT {
        forward!(self.create_resource2(data))
    }

    fn has_create_resource2(&self) -> bool {
        self.create_resource2.is_some()
    }

    fn destroy_device(&self) -> HRESULT {
        forward!(self.destroy_device())
    }

    fn destroy_resource(&self, resource: Handle) -> HRESULT {
        forward!(self.destroy_resource(resource))
    }

    fn draw_indexed_primitive2(
        &self,
        data: &D3DDDIARG_DRAWINDEXEDPRIMITIVE2,
        indices_size: UINT,
        indices: *const c_void,
        flag_buffer: *const UINT,
    ) -> HRESULT {
        forward!(self.draw_indexed_primitive2(data, indices_size, indices, flag_buffer))
    }

    fn draw_primitive(&self, data: &D3DDDIARG_DRAWPRIMITIVE, flag_buffer: *const UINT) -> HRESULT {
        forward!(self.draw_primitive(data, flag_buffer))
    }

    fn flush(&self) -> HRESULT {
        forward!(self.flush())
    }

    fn flush1(&self, flags: UINT) -> HRESULT {
        forward!(self.flush1(flags))
    }

    fn lock(&self, data: &mut D3DDDIARG_LOCK) -> HRESULT {
        forward!(self.lock(data))
    }

    fn open_resource(&self, data: &mut D3DDDIARG_OPENRESOURCE) -> HRESULT {
        forward!(self.open_resource(data))
    }

    fn present(&self, data: &D3DDDIARG_PRESENT) -> HRESULT {
        forward!(self.present(data))
    }

    fn present1(&self, data: &mut D3DDDIARG_PRESENT1) -> HRESULT {
        forward!(self.present1(data))
    }

    fn set_render_target(&self, data: &D3DDDIARG_SETRENDERTARGET) -> HRESULT {
        forward!(self.set_render_target(data))
    }

    fn set_stream_source(&self, data: &D3DDDIARG_SETSTREAMSOURCE) -> HRESULT {
        forward!(self.set_stream_source(data))
    }

    fn set_stream_source_um(&self, data: &D3DDDIARG_SETSTREAMSOURCEUM, vertices: *const c_void) -> HRESULT {
        forward!(self.set_stream_source_um(data, vertices))
    }

    fn unlock(&self, data: &D3DDDIARG_UNLOCK) -> HRESULT {
        forward!(self.unlock(data))
    }

    fn set_state(&self, call: StateCall, args: &[usize]) -> HRESULT {
        let Some(func) = self.state[call as usize] else {
            return HResult::E_NOTIMPL.0;
        };
        let arg = |index: usize| args.get(index).copied().unwrap_or(0);
        unsafe {
            if call.arity() == 1 {
                std::mem::transmute::<usize, PfnState1>(func)(self.device, arg(0))
            } else {
                std::mem::transmute::<usize, PfnState2>(func)(self.device, arg(0), arg(1))
            }
        }
    }
}
