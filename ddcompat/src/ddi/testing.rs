//! Recording driver for unit tests

use super::driver::{DriverDevice, StateCall};
use super::types::*;
use crate::error::{HResult, HRESULT};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::c_void;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Blt(Handle, Handle),
    Clear,
    ColorFill(Handle),
    CreateResource(Handle),
    DestroyDevice,
    DestroyResource(Handle),
    DrawIndexed,
    Draw { primitive_type: UINT, start: UINT, count: UINT },
    Flush,
    Flush1(UINT),
    Lock(Handle, UINT),
    OpenResource,
    Present,
    Present1,
    SetRenderTarget(Handle),
    SetState(StateCall),
    SetStreamSource(Handle),
    SetStreamSourceUm(usize),
    Unlock(Handle, UINT),
}

#[derive(Default)]
pub(crate) struct RecordingDriver {
    pub calls: RefCell<Vec<Call>>,
    pub next_handle: Cell<usize>,
    pub fail_create: Cell<Option<HRESULT>>,
    pub no_create_resource2: Cell<bool>,
    memory: RefCell<HashMap<Handle, Vec<u8>>>,
    stream_um: Cell<Option<(usize, UINT)>>,
    /// Vertices read from the user-memory stream by each draw
    pub drawn_vertices: RefCell<Vec<Vec<u8>>>,
}

impl RecordingDriver {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn allocate(&self) -> Handle {
        self.next_handle.set(self.next_handle.get() + 1);
        Handle(0x100 + self.next_handle.get())
    }
}

impl DriverDevice for RecordingDriver {
    fn blt(&self, data: &D3DDDIARG_BLT) -> HRESULT {
        self.record(Call::Blt(data.hSrcResource, data.hDstResource));
        0
    }

    fn clear(&self, _: &D3DDDIARG_CLEAR, _: &[RECT]) -> HRESULT {
        self.record(Call::Clear);
        0
    }

    fn color_fill(&self, data: &D3DDDIARG_COLORFILL) -> HRESULT {
        self.record(Call::ColorFill(data.hResource));
        0
    }

    fn create_resource(&self, data: &mut D3DDDIARG_CREATERESOURCE) -> HRESULT {
        if let Some(hr) = self.fail_create.get() {
            return hr;
        }
        data.hResource = self.allocate();
        self.record(Call::CreateResource(data.hResource));
        0
    }

    fn create_resource2(&self, data: &mut D3DDDIARG_CREATERESOURCE2) -> HRESULT {
        if self.no_create_resource2.get() {
            return HResult::E_NOTIMPL.0;
        }
        if let Some(hr) = self.fail_create.get() {
            return hr;
        }
        data.hResource = self.allocate();
        self.record(Call::CreateResource(data.hResource));
        0
    }

    fn has_create_resource2(&self) -> bool {
        !self.no_create_resource2.get()
    }

    fn destroy_device(&self) -> HRESULT {
        self.record(Call::DestroyDevice);
        0
    }

    fn destroy_resource(&self, resource: Handle) -> HRESULT {
        self.record(Call::DestroyResource(resource));
        0
    }

    fn draw_indexed_primitive2(
        &self,
        _: &D3DDDIARG_DRAWINDEXEDPRIMITIVE2,
        _: UINT,
        _: *const c_void,
        _: *const UINT,
    ) -> HRESULT {
        self.record(Call::DrawIndexed);
        0
    }

    fn draw_primitive(&self, data: &D3DDDIARG_DRAWPRIMITIVE, _: *const UINT) -> HRESULT {
        self.record(Call::Draw {
            primitive_type: data.PrimitiveType,
            start: data.VStart,
            count: data.PrimitiveCount,
        });
        if let Some((base, stride)) = self.stream_um.get() {
            let start = base + (data.VStart * stride) as usize;
            let len = vertex_count(data.PrimitiveType, data.PrimitiveCount).unwrap_or(0) as usize * stride as usize;
            let bytes = unsafe { std::slice::from_raw_parts(start as *const u8, len) };
            self.drawn_vertices.borrow_mut().push(bytes.to_vec());
        }
        0
    }

    fn flush(&self) -> HRESULT {
        self.record(Call::Flush);
        0
    }

    fn flush1(&self, flags: UINT) -> HRESULT {
        self.record(Call::Flush1(flags));
        0
    }

    fn lock(&self, data: &mut D3DDDIARG_LOCK) -> HRESULT {
        self.record(Call::Lock(data.hResource, data.SubResourceIndex));
        let mut memory = self.memory.borrow_mut();
        let buffer = memory.entry(data.hResource).or_insert_with(|| vec![0; 64]);
        data.pSurfData = buffer.as_mut_ptr().cast();
        data.Pitch = 8;
        0
    }

    fn open_resource(&self, data: &mut D3DDDIARG_OPENRESOURCE) -> HRESULT {
        data.hResource = self.allocate();
        self.record(Call::OpenResource);
        0
    }

    fn present(&self, _: &D3DDDIARG_PRESENT) -> HRESULT {
        self.record(Call::Present);
        0
    }

    fn present1(&self, _: &mut D3DDDIARG_PRESENT1) -> HRESULT {
        self.record(Call::Present1);
        0
    }

    fn set_render_target(&self, data: &D3DDDIARG_SETRENDERTARGET) -> HRESULT {
        self.record(Call::SetRenderTarget(data.hRenderTarget));
        0
    }

    fn set_stream_source(&self, data: &D3DDDIARG_SETSTREAMSOURCE) -> HRESULT {
        self.record(Call::SetStreamSource(data.hVertexBuffer));
        self.stream_um.set(None);
        0
    }

    fn set_stream_source_um(&self, data: &D3DDDIARG_SETSTREAMSOURCEUM, vertices: *const c_void) -> HRESULT {
        self.record(Call::SetStreamSourceUm(vertices as usize));
        self.stream_um.set(Some((vertices as usize, data.Stride)));
        0
    }

    fn unlock(&self, data: &D3DDDIARG_UNLOCK) -> HRESULT {
        self.record(Call::Unlock(data.hResource, data.SubResourceIndex));
        0
    }

    fn set_state(&self, call: StateCall, _: &[usize]) -> HRESULT {
        self.record(Call::SetState(call));
        0
    }
}
