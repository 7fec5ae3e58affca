//! Driver function table layouts
//!
//! `D3DDDI_DEVICEFUNCS` grew with every runtime release; each release's table starts with the
//! previous one's slots. The runtime announces the layout it allocated through the interface
//! version passed to `OpenAdapter`/`CreateDevice`.

use crate::interface;
use crate::vtable::InterfaceDesc;

interface!(pub D3DDDI_ADAPTERFUNCS = "D3DDDI_ADAPTERFUNCS" {
    pfnGetCaps,
    pfnCreateDevice,
    pfnCloseAdapter,
});

interface!(pub D3DDDI_DEVICEFUNCS_VISTA = "D3DDDI_DEVICEFUNCS" {
    pfnSetRenderState,
    pfnUpdateWInfo,
    pfnValidateDevice,
    pfnSetTextureStageState,
    pfnSetTexture,
    pfnSetPixelShader,
    pfnSetPixelShaderConst,
    pfnSetStreamSourceUm,
    pfnSetIndices,
    pfnSetIndicesUm,
    pfnDrawPrimitive,
    pfnDrawIndexedPrimitive,
    pfnDrawRectPatch,
    pfnDrawTriPatch,
    pfnDrawPrimitive2,
    pfnDrawIndexedPrimitive2,
    pfnVolBlt,
    pfnBufBlt,
    pfnTexBlt,
    pfnStateSet,
    pfnSetPriority,
    pfnClear,
    pfnUpdatePalette,
    pfnSetPalette,
    pfnSetVertexShaderConst,
    pfnMultiplyTransform,
    pfnSetTransform,
    pfnSetViewport,
    pfnSetZRange,
    pfnSetMaterial,
    pfnSetLight,
    pfnCreateLight,
    pfnDestroyLight,
    pfnSetClipPlane,
    pfnGetInfo,
    pfnLock,
    pfnUnlock,
    pfnCreateResource,
    pfnDestroyResource,
    pfnSetDisplayMode,
    pfnPresent,
    pfnFlush,
    pfnCreateVertexShaderFunc,
    pfnDeleteVertexShaderFunc,
    pfnSetVertexShaderFunc,
    pfnCreateVertexShaderDecl,
    pfnDeleteVertexShaderDecl,
    pfnSetVertexShaderDecl,
    pfnSetVertexShaderConstI,
    pfnSetVertexShaderConstB,
    pfnSetScissorRect,
    pfnSetStreamSource,
    pfnSetStreamSourceFreq,
    pfnSetConvolutionKernelMono,
    pfnComposeRects,
    pfnBlt,
    pfnColorFill,
    pfnDepthFill,
    pfnCreateQuery,
    pfnDestroyQuery,
    pfnIssueQuery,
    pfnGetQueryData,
    pfnSetRenderTarget,
    pfnSetDepthStencil,
    pfnGenerateMipSubLevels,
    pfnSetPixelShaderConstI,
    pfnSetPixelShaderConstB,
    pfnCreatePixelShader,
    pfnDeletePixelShader,
    pfnCreateDecodeDevice,
    pfnDestroyDecodeDevice,
    pfnSetDecodeRenderTarget,
    pfnDecodeBeginFrame,
    pfnDecodeEndFrame,
    pfnDecodeExecute,
    pfnDecodeExtensionExecute,
    pfnCreateVideoProcessDevice,
    pfnDestroyVideoProcessDevice,
    pfnVideoProcessBeginFrame,
    pfnVideoProcessEndFrame,
    pfnSetVideoProcessRenderTarget,
    pfnVideoProcessBlt,
    pfnCreateExtensionDevice,
    pfnDestroyExtensionDevice,
    pfnExtensionExecute,
    pfnCreateOverlay,
    pfnUpdateOverlay,
    pfnFlipOverlay,
    pfnGetOverlayColorControls,
    pfnSetOverlayColorControls,
    pfnDestroyOverlay,
    pfnDestroyDevice,
    pfnQueryResourceResidency,
    pfnOpenResource,
    pfnGetCaptureAllocationHandle,
    pfnCaptureToSysMem,
    pfnLockAsync,
    pfnUnlockAsync,
    pfnRename,
});

interface!(pub D3DDDI_DEVICEFUNCS_WIN7: D3DDDI_DEVICEFUNCS_VISTA = "D3DDDI_DEVICEFUNCS (Win7)" {
    pfnCreateVideoProcessor,
    pfnSetVideoProcessBltState,
    pfnGetVideoProcessBltStatePrivate,
    pfnSetVideoProcessStreamState,
    pfnGetVideoProcessStreamStatePrivate,
    pfnVideoProcessBltHD,
    pfnDestroyVideoProcessor,
    pfnCreateAuthenticatedChannel,
    pfnAuthenticatedChannelKeyExchange,
    pfnQueryAuthenticatedChannel,
    pfnConfigureAuthenticatedChannel,
    pfnDestroyAuthenticatedChannel,
    pfnCreateCryptoSession,
    pfnCryptoSessionKeyExchange,
    pfnDestroyCryptoSession,
    pfnEncryptionBlt,
    pfnGetPitch,
    pfnStartSessionKeyRefresh,
    pfnFinishSessionKeyRefresh,
    pfnGetEncryptionBltKey,
    pfnDecryptionBlt,
    pfnResolveSharedResource,
});

interface!(pub D3DDDI_DEVICEFUNCS_WIN8: D3DDDI_DEVICEFUNCS_WIN7 = "D3DDDI_DEVICEFUNCS (Win8)" {
    pfnVolBlt1,
    pfnBufBlt1,
    pfnTexBlt1,
    pfnDiscard,
    pfnOfferResources,
    pfnReclaimResources,
    pfnCheckDirectFlipSupport,
    pfnCreateResource2,
    pfnCheckMultiPlaneOverlaySupport,
    pfnPresentMultiPlaneOverlay,
});

interface!(pub D3DDDI_DEVICEFUNCS_WDDM1_3: D3DDDI_DEVICEFUNCS_WIN8 = "D3DDDI_DEVICEFUNCS (WDDM 1.3)" {
    pfnReserved1,
    pfnFlush1,
    pfnCheckCounterInfo,
    pfnCheckCounter,
    pfnUpdateSubresourceUP,
    pfnPresent1,
    pfnCheckPresentDurationSupport,
});

interface!(pub D3DDDI_DEVICEFUNCS_WDDM2_0: D3DDDI_DEVICEFUNCS_WDDM1_3 = "D3DDDI_DEVICEFUNCS (WDDM 2.0)" {
    pfnSetMarker,
    pfnSetMarkerMode,
});

/// Every device table layout, smallest first
pub static DEVICE_FUNCS_FAMILY: [&InterfaceDesc; 5] = [
    &D3DDDI_DEVICEFUNCS_VISTA,
    &D3DDDI_DEVICEFUNCS_WIN7,
    &D3DDDI_DEVICEFUNCS_WIN8,
    &D3DDDI_DEVICEFUNCS_WDDM1_3,
    &D3DDDI_DEVICEFUNCS_WDDM2_0,
];

/// Index into [`DEVICE_FUNCS_FAMILY`] of the layout a runtime of `interface_version` allocates
pub fn device_funcs_index(interface_version: u32) -> usize {
    match interface_version {
        0..0x2000 => 0,
        0x2000..0x3000 => 1,
        0x3000..0x4000 => 2,
        0x4000..0x5000 => 3,
        _ => 4,
    }
}

/// Layout a runtime of `interface_version` allocates
pub fn device_funcs_layout(interface_version: u32) -> &'static InterfaceDesc {
    DEVICE_FUNCS_FAMILY[device_funcs_index(interface_version)]
}
