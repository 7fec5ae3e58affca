//! Device proxy behavior against a simulated driver

mod common;

use common::{color_key_caps, create_surface, triangles, Call, Fixture};
use ddraw::ddi::types::*;
use ddraw::ddi::{DeviceRegistry, GpuAccess, StateCall};
use ddraw::flags::{BltFlags, LockFlags, OpenResourceFlags, ResourceFlags};
use ddraw::gdi::{GdiDesignation, GdiInterop};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn copy(src: Handle, dst: Handle) -> D3DDDIARG_BLT {
    D3DDDIARG_BLT {
        hSrcResource: src,
        SrcRect: RECT::new(0, 0, 2, 2),
        hDstResource: dst,
        DstRect: RECT::new(0, 0, 2, 2),
        ..Default::default()
    }
}

fn bind_vertex_buffer(device: &mut ddraw::ddi::Device) {
    let stream = D3DDDIARG_SETSTREAMSOURCE {
        Stream: 0,
        hVertexBuffer: Handle(0x77),
        Offset: 0,
        Stride: 16,
    };
    assert_eq!(device.set_stream_source(&stream), 0);
}

#[test]
fn test_registry_finds_resource_owner() {
    let gdi = Arc::new(GdiInterop::new());
    let registry = DeviceRegistry::new(gdi);
    let first = Fixture::new(true);
    let second = Fixture::new(true);

    let mut device = first.device(Handle(1), color_key_caps());
    let surface = create_surface(&mut device, 4, 4, ResourceFlags::empty());
    registry.add(device);
    registry.add(second.device(Handle(2), color_key_caps()));
    assert_eq!(registry.len(), 2);

    let owner = registry.find_resource_device(surface).unwrap();
    assert_eq!(owner.lock().handle(), Handle(1));
    assert!(registry.find_resource_device(Handle(0xdead)).is_none());

    assert!(registry.remove(Handle(1)).is_some());
    assert!(registry.get(Handle(1)).is_none());
    assert!(registry.find_resource_device(surface).is_none());
}

#[test]
fn test_gdi_designation_follows_registry() {
    let gdi = Arc::new(GdiInterop::new());
    let registry = DeviceRegistry::new(gdi.clone());
    let fixture = Fixture::new(true);
    let mut device = fixture.device(Handle(1), color_key_caps());
    let front = create_surface(&mut device, 4, 4, ResourceFlags::PRIMARY);
    let back = create_surface(&mut device, 4, 4, ResourceFlags::PRIMARY);
    let device = registry.add(device);

    registry.set_gdi_resource_handle(Some(front));
    assert_eq!(gdi.resource(), Some(front));
    assert!(device.lock().resource(front).unwrap().is_gdi_resource());

    registry.set_gdi_resource_handle(Some(back));
    assert!(!device.lock().resource(front).unwrap().is_gdi_resource());
    assert!(device.lock().resource(back).unwrap().is_gdi_resource());

    registry.set_gdi_resource_handle(None);
    assert_eq!(gdi.resource(), None);
    assert!(!device.lock().resource(back).unwrap().is_gdi_resource());
}

#[test]
fn test_lock_submits_batched_draws_first() {
    let fixture = Fixture::new(true);
    let mut device = fixture.device(Handle(1), color_key_caps());
    let surface = create_surface(&mut device, 2, 2, ResourceFlags::empty());
    bind_vertex_buffer(&mut device);
    fixture.driver.clear_calls();

    device.draw_primitive(&triangles(0, 1), std::ptr::null());
    device.draw_primitive(&triangles(3, 1), std::ptr::null());
    assert_eq!(device.batcher().pending_primitives(), 2);
    assert!(fixture.driver.calls().is_empty());

    let mut lock = D3DDDIARG_LOCK::new(surface, 0, LockFlags::empty());
    assert_eq!(device.lock(&mut lock), 0);
    assert_eq!(
        fixture.driver.calls(),
        vec![Call::Draw { start: 0, count: 2 }, Call::Lock(surface, 0)]
    );
    assert_eq!(device.resource(surface).unwrap().locks().len(), 1);

    assert_eq!(device.unlock(&D3DDDIARG_UNLOCK::new(surface, 0)), 0);
    assert!(device.resource(surface).unwrap().locks().is_empty());
}

#[test]
fn test_state_changes_submit_batched_draws_first() {
    let fixture = Fixture::new(true);
    let mut device = fixture.device(Handle(1), color_key_caps());
    bind_vertex_buffer(&mut device);
    fixture.driver.clear_calls();

    device.draw_primitive(&triangles(0, 1), std::ptr::null());
    assert_eq!(device.set_state(StateCall::SetTexture, &[0, 0x77]), 0);
    device.draw_primitive(&triangles(3, 1), std::ptr::null());
    assert_eq!(device.set_state(StateCall::SetTransform, &[0x1000]), 0);
    // Nothing queued, so nothing to submit
    assert_eq!(device.set_state(StateCall::SetViewport, &[0x2000]), 0);
    device.draw_primitive(&triangles(6, 1), std::ptr::null());
    assert_eq!(device.flush(), 0);
    assert_eq!(
        fixture.driver.calls(),
        vec![
            Call::Draw { start: 0, count: 1 },
            Call::SetState(StateCall::SetTexture),
            Call::Draw { start: 3, count: 1 },
            Call::SetState(StateCall::SetTransform),
            Call::SetState(StateCall::SetViewport),
            Call::Draw { start: 6, count: 1 },
            Call::Flush,
        ]
    );
}

#[test]
fn test_blt_submits_batched_draws_first() {
    let fixture = Fixture::new(true);
    let mut device = fixture.device(Handle(1), color_key_caps());
    let src = create_surface(&mut device, 2, 2, ResourceFlags::empty());
    let dst = create_surface(&mut device, 2, 2, ResourceFlags::RENDER_TARGET);
    bind_vertex_buffer(&mut device);
    device.draw_primitive(&triangles(0, 4), std::ptr::null());
    fixture.driver.clear_calls();

    assert_eq!(device.blt(&copy(src, dst)), 0);
    assert_eq!(
        fixture.driver.calls(),
        vec![Call::Draw { start: 0, count: 4 }, Call::Blt(src, dst)]
    );
    assert_eq!(device.resource(src).unwrap().last_gpu_access(), GpuAccess::Read);
    assert_eq!(device.resource(dst).unwrap().last_gpu_access(), GpuAccess::Write);
}

#[test]
fn test_destroy_gdi_resource_cycles_a_lock() {
    let fixture = Fixture::new(true);
    let mut device = fixture.device(Handle(1), color_key_caps());
    let surface = create_surface(&mut device, 2, 2, ResourceFlags::PRIMARY);
    fixture.services.gdi.replace_resource(Some(surface));
    fixture.driver.clear_calls();

    assert_eq!(device.destroy_resource(surface), 0);
    assert_eq!(
        fixture.driver.calls(),
        vec![
            Call::Lock(surface, 0),
            Call::Unlock(surface, 0),
            Call::DestroyResource(surface),
        ]
    );
    assert_eq!(fixture.services.gdi.resource(), None);
    assert!(device.resource(surface).is_none());
    assert_eq!(fixture.kernel.releases(), 0);
}

#[test]
fn test_destroy_releases_outstanding_locks() {
    let fixture = Fixture::new(true);
    let mut device = fixture.device(Handle(1), color_key_caps());
    let surface = create_surface(&mut device, 2, 2, ResourceFlags::empty());
    let mut lock = D3DDDIARG_LOCK::new(surface, 0, LockFlags::empty());
    device.lock(&mut lock);
    fixture.driver.clear_calls();

    device.destroy_resource(surface);
    assert_eq!(
        fixture.driver.calls(),
        vec![Call::Unlock(surface, 0), Call::DestroyResource(surface)]
    );
    assert_eq!(device.resource_count(), 0);
}

#[test]
fn test_destroy_shared_primary_releases_display_ownership() {
    let fixture = Fixture::new(true);
    let mut device = fixture.device(Handle(1), color_key_caps());
    let mut open = D3DDDIARG_OPENRESOURCE {
        Flags: OpenResourceFlags::FULLSCREEN,
        ..Default::default()
    };
    assert_eq!(device.open_resource(&mut open), 0);
    let primary = open.hResource;
    assert_eq!(device.shared_primary(), Some(primary));
    assert!(device.resource(primary).is_some());

    device.destroy_resource(primary);
    assert_eq!(fixture.kernel.releases(), 1);
    assert_eq!(device.shared_primary(), None);
}

#[test]
fn test_open_without_fullscreen_is_not_the_primary() {
    let fixture = Fixture::new(true);
    let mut device = fixture.device(Handle(1), color_key_caps());
    let mut open = D3DDDIARG_OPENRESOURCE::default();
    device.open_resource(&mut open);
    assert_eq!(device.shared_primary(), None);
    assert_eq!(fixture.driver.calls(), vec![Call::OpenResource(open.hResource)]);
}

#[test]
fn test_destroyed_render_target_is_forgotten() {
    let fixture = Fixture::new(true);
    let mut device = fixture.device(Handle(1), color_key_caps());
    let target = create_surface(&mut device, 2, 2, ResourceFlags::RENDER_TARGET);

    let data = D3DDDIARG_SETRENDERTARGET {
        RenderTargetIndex: 0,
        hRenderTarget: target,
        SubResourceIndex: 0,
    };
    assert_eq!(device.set_render_target(&data), 0);
    assert_eq!(device.render_target(), Some((target, 0)));

    // Secondary targets are not tracked
    let secondary = D3DDDIARG_SETRENDERTARGET {
        RenderTargetIndex: 1,
        hRenderTarget: Handle(0x99),
        SubResourceIndex: 0,
    };
    device.set_render_target(&secondary);
    assert_eq!(device.render_target(), Some((target, 0)));

    device.destroy_resource(target);
    assert_eq!(device.render_target(), None);
}

#[test]
fn test_flush_can_be_disabled() {
    let fixture = Fixture::new(true);
    let mut device = fixture.device(Handle(1), color_key_caps());
    bind_vertex_buffer(&mut device);
    fixture.driver.clear_calls();

    fixture.services.set_flush_enabled(false);
    device.draw_primitive(&triangles(0, 1), std::ptr::null());
    assert_eq!(device.flush(), 0);
    assert_eq!(device.flush1(0), 0);
    assert!(fixture.driver.calls().is_empty());
    assert_eq!(device.batcher().pending_primitives(), 1);

    // Flush1 with flags always reaches the driver
    device.flush1(1);
    assert_eq!(
        fixture.driver.calls(),
        vec![Call::Draw { start: 0, count: 1 }, Call::Flush1(1)]
    );

    fixture.services.set_flush_enabled(true);
    fixture.driver.clear_calls();
    device.flush();
    assert_eq!(fixture.driver.calls(), vec![Call::Flush]);
}

#[test]
fn test_gdi_lock_is_read_only_when_requested() {
    let fixture = Fixture::new(true);
    let gdi = Arc::new(GdiInterop::new());
    let registry = DeviceRegistry::new(gdi.clone());
    let services = ddraw::ddi::DeviceServices::new(gdi.clone(), fixture.sink.clone(), fixture.kernel.clone());
    let mut device = ddraw::ddi::Device::new(
        Handle(1),
        Handle(0xADA),
        Box::new(fixture.driver.clone()),
        color_key_caps(),
        services,
    );
    let surface = create_surface(&mut device, 2, 2, ResourceFlags::PRIMARY);
    let device = registry.add(device);
    registry.set_gdi_resource_handle(Some(surface));
    gdi.set_read_only_lock(true);

    let mut lock = D3DDDIARG_LOCK::new(surface, 0, LockFlags::empty());
    device.lock().lock(&mut lock);
    assert!(lock.Flags.contains(LockFlags::READ_ONLY));
}

#[test]
fn test_destroy_device_releases_every_lock() {
    let fixture = Fixture::new(true);
    let mut device = fixture.device(Handle(1), color_key_caps());
    let first = create_surface(&mut device, 2, 2, ResourceFlags::empty());
    let second = create_surface(&mut device, 2, 2, ResourceFlags::empty());
    device.lock(&mut D3DDDIARG_LOCK::new(first, 0, LockFlags::empty()));
    device.lock(&mut D3DDDIARG_LOCK::new(second, 0, LockFlags::empty()));
    fixture.driver.clear_calls();

    assert_eq!(device.destroy_device(), 0);
    let calls = fixture.driver.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.contains(&Call::Unlock(first, 0)));
    assert!(calls.contains(&Call::Unlock(second, 0)));
    assert_eq!(calls.last(), Some(&Call::DestroyDevice));
}

#[test]
fn test_keyed_blt_on_honoring_driver_is_forwarded() {
    let fixture = Fixture::new(true);
    let mut device = fixture.device(Handle(1), color_key_caps());
    let src = create_surface(&mut device, 2, 2, ResourceFlags::empty());
    let dst = create_surface(&mut device, 2, 2, ResourceFlags::RENDER_TARGET);
    fixture.driver.fill(src, 0x1234);
    fixture.driver.set_pixel(src, 1, 1, 0xF81F);
    fixture.driver.fill(dst, 0x0000);

    let blt = D3DDDIARG_BLT {
        Flags: BltFlags::SRC_COLOR_KEY,
        ColorKey: 0xF81F,
        ..copy(src, dst)
    };
    assert_eq!(device.blt(&blt), 0);
    assert!(fixture.driver.calls().contains(&Call::Blt(src, dst)));
    assert_eq!(fixture.driver.pixel(dst, 0, 0), 0x1234);
    assert_eq!(fixture.driver.pixel(dst, 1, 1), 0x0000);
}
