//! Draw call batching
//!
//! Legacy clients issue many tiny non-indexed draws. Consecutive list draws are merged into one
//! driver call. Vertices read from client memory are copied into the batch, so a client that
//! rewrites its buffer after a draw call cannot change geometry that is still queued.

use super::driver::DriverDevice;
use super::types::*;
use crate::config::{MAX_BATCH_PRIMITIVES, MAX_BATCH_VERTEX_BYTES};
use crate::error::{failed, succeeded, HResult, HRESULT};
use std::collections::HashMap;
use std::ffi::c_void;

/// What stream 0 is bound to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamSource {
    Unbound,
    /// Driver vertex buffer
    Buffer { handle: Handle, offset: UINT, stride: UINT },
    /// Vertices in client memory
    UserMemory { data: usize, stride: UINT },
}

#[derive(Clone, Copy, Debug)]
struct SysMemVertexBuffer {
    data: usize,
    stride: UINT,
}

#[derive(Clone, Copy, Debug)]
struct PendingDraw {
    primitive_type: UINT,
    start_vertex: UINT,
    primitive_count: UINT,
    /// Vertices live in the batch's own buffer
    shadowed: bool,
}

/// Per-device draw batch state
pub struct DrawBatcher {
    sys_mem_vertex_buffers: HashMap<Handle, SysMemVertexBuffer>,
    stream: StreamSource,
    pending: Option<PendingDraw>,
    vertices: Vec<u8>,
}

impl Default for DrawBatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawBatcher {
    pub fn new() -> Self {
        Self {
            sys_mem_vertex_buffers: HashMap::new(),
            stream: StreamSource::Unbound,
            pending: None,
            vertices: Vec::new(),
        }
    }

    pub fn stream(&self) -> StreamSource {
        self.stream
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_primitives(&self) -> UINT {
        self.pending.map_or(0, |p| p.primitive_count)
    }

    /// Remembers a system-memory vertex buffer so binding it becomes a user-memory binding
    pub fn add_sys_mem_vertex_buffer(&mut self, handle: Handle, data: *const c_void, stride: UINT) {
        self.sys_mem_vertex_buffers.insert(
            handle,
            SysMemVertexBuffer {
                data: data as usize,
                stride,
            },
        );
    }

    /// Forgets a destroyed resource; a stream bound to it becomes unbound
    pub fn remove_resource(&mut self, handle: Handle) {
        self.sys_mem_vertex_buffers.remove(&handle);
        if let StreamSource::Buffer { handle: bound, .. } = self.stream
            && bound == handle
        {
            self.stream = StreamSource::Unbound;
        }
    }

    pub fn is_sys_mem_vertex_buffer(&self, handle: Handle) -> bool {
        self.sys_mem_vertex_buffers.contains_key(&handle)
    }

    pub fn set_stream_source(&mut self, driver: &dyn DriverDevice, data: &D3DDDIARG_SETSTREAMSOURCE) -> HRESULT {
        self.flush(driver);

        if let Some(vb) = self.sys_mem_vertex_buffers.get(&data.hVertexBuffer).copied() {
            let stride = if data.Stride != 0 { data.Stride } else { vb.stride };
            let vertices = vb.data + data.Offset as usize;
            let um = D3DDDIARG_SETSTREAMSOURCEUM {
                Stream: data.Stream,
                Stride: stride,
            };
            let hr = driver.set_stream_source_um(&um, vertices as *const c_void);
            if succeeded(hr) && data.Stream == 0 {
                self.stream = StreamSource::UserMemory { data: vertices, stride };
            }
            return hr;
        }

        let hr = driver.set_stream_source(data);
        if succeeded(hr) && data.Stream == 0 {
            self.stream = if data.hVertexBuffer.is_null() {
                StreamSource::Unbound
            } else {
                StreamSource::Buffer {
                    handle: data.hVertexBuffer,
                    offset: data.Offset,
                    stride: data.Stride,
                }
            };
        }
        hr
    }

    pub fn set_stream_source_um(
        &mut self,
        driver: &dyn DriverDevice,
        data: &D3DDDIARG_SETSTREAMSOURCEUM,
        vertices: *const c_void,
    ) -> HRESULT {
        self.flush(driver);
        let hr = driver.set_stream_source_um(data, vertices);
        if succeeded(hr) && data.Stream == 0 {
            self.stream = if vertices.is_null() {
                StreamSource::Unbound
            } else {
                StreamSource::UserMemory {
                    data: vertices as usize,
                    stride: data.Stride,
                }
            };
        }
        hr
    }

    pub fn draw_primitive(
        &mut self,
        driver: &dyn DriverDevice,
        data: &D3DDDIARG_DRAWPRIMITIVE,
        flag_buffer: *const UINT,
    ) -> HRESULT {
        if !flag_buffer.is_null() || !is_list_primitive(data.PrimitiveType) || data.PrimitiveCount == 0 {
            self.flush(driver);
            return driver.draw_primitive(data, flag_buffer);
        }

        let Some(vertices) = vertex_count(data.PrimitiveType, data.PrimitiveCount)
            .filter(|_| data.PrimitiveCount <= MAX_BATCH_PRIMITIVES)
        else {
            self.flush(driver);
            return driver.draw_primitive(data, flag_buffer);
        };

        match self.stream {
            StreamSource::UserMemory { data: base, stride } if stride != 0 => {
                self.queue_shadowed(driver, data, vertices, base, stride)
            }
            StreamSource::Buffer { .. } => self.queue_range(driver, data),
            _ => {
                self.flush(driver);
                driver.draw_primitive(data, flag_buffer)
            }
        }
    }

    pub fn draw_indexed_primitive2(
        &mut self,
        driver: &dyn DriverDevice,
        data: &D3DDDIARG_DRAWINDEXEDPRIMITIVE2,
        indices_size: UINT,
        indices: *const c_void,
        flag_buffer: *const UINT,
    ) -> HRESULT {
        self.flush(driver);
        driver.draw_indexed_primitive2(data, indices_size, indices, flag_buffer)
    }

    fn queue_range(&mut self, driver: &dyn DriverDevice, data: &D3DDDIARG_DRAWPRIMITIVE) -> HRESULT {
        if let Some(pending) = self.pending.as_mut()
            && !pending.shadowed
            && pending.primitive_type == data.PrimitiveType
            && vertex_count(pending.primitive_type, pending.primitive_count)
                .and_then(|count| pending.start_vertex.checked_add(count))
                == Some(data.VStart)
            && pending.primitive_count + data.PrimitiveCount <= MAX_BATCH_PRIMITIVES
        {
            pending.primitive_count += data.PrimitiveCount;
            return HResult::S_OK.0;
        }

        let hr = self.flush(driver);
        self.pending = Some(PendingDraw {
            primitive_type: data.PrimitiveType,
            start_vertex: data.VStart,
            primitive_count: data.PrimitiveCount,
            shadowed: false,
        });
        hr
    }

    fn queue_shadowed(
        &mut self,
        driver: &dyn DriverDevice,
        data: &D3DDDIARG_DRAWPRIMITIVE,
        vertex_count: UINT,
        base: usize,
        stride: UINT,
    ) -> HRESULT {
        let bytes = (vertex_count as usize).checked_mul(stride as usize);
        let source = (data.VStart as usize)
            .checked_mul(stride as usize)
            .and_then(|offset| base.checked_add(offset));
        let (Some(bytes), Some(source)) = (bytes, source) else {
            self.flush(driver);
            return driver.draw_primitive(data, std::ptr::null());
        };
        if bytes > MAX_BATCH_VERTEX_BYTES {
            self.flush(driver);
            return driver.draw_primitive(data, std::ptr::null());
        }

        let mergeable = matches!(
            self.pending,
            Some(pending) if pending.shadowed
                && pending.primitive_type == data.PrimitiveType
                && pending.primitive_count + data.PrimitiveCount <= MAX_BATCH_PRIMITIVES
                && self.vertices.len() + bytes <= MAX_BATCH_VERTEX_BYTES
        );

        let mut hr = HResult::S_OK.0;
        if !mergeable {
            hr = self.flush(driver);
            self.pending = Some(PendingDraw {
                primitive_type: data.PrimitiveType,
                start_vertex: 0,
                primitive_count: 0,
                shadowed: true,
            });
        }

        let vertices = unsafe { std::slice::from_raw_parts(source as *const u8, bytes) };
        self.vertices.extend_from_slice(vertices);
        if let Some(pending) = self.pending.as_mut() {
            pending.primitive_count += data.PrimitiveCount;
        }
        hr
    }

    /// Submits the pending batch, if any
    pub fn flush(&mut self, driver: &dyn DriverDevice) -> HRESULT {
        let Some(pending) = self.pending.take() else {
            return HResult::S_OK.0;
        };

        let draw = D3DDDIARG_DRAWPRIMITIVE {
            PrimitiveType: pending.primitive_type,
            VStart: pending.start_vertex,
            PrimitiveCount: pending.primitive_count,
        };
        if !pending.shadowed {
            return driver.draw_primitive(&draw, std::ptr::null());
        }

        let StreamSource::UserMemory { data: client, stride } = self.stream else {
            log::error!("Batched draw pending without a user-memory stream");
            self.vertices.clear();
            return HResult::E_FAIL.0;
        };

        let um = D3DDDIARG_SETSTREAMSOURCEUM { Stream: 0, Stride: stride };
        let mut hr = driver.set_stream_source_um(&um, self.vertices.as_ptr().cast());
        if succeeded(hr) {
            hr = driver.draw_primitive(&draw, std::ptr::null());
        }
        let restored = driver.set_stream_source_um(&um, client as *const c_void);
        self.vertices.clear();

        if failed(hr) {
            log::warn!(
                "Batched draw of {} primitives failed: {}",
                pending.primitive_count,
                HResult(hr)
            );
        }
        if failed(restored) {
            log::warn!("Failed to restore stream 0 after batched draw: {}", HResult(restored));
        }
        hr
    }
}
