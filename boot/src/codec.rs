//! Binding to the external LZMA decoder.
//!
//! The entropy decoding itself comes from the vendor SDK object linked into
//! the final image; this module only adapts its C callback interface to the
//! loader's [`LzmaDecode`] seam. The SDK pulls compressed bytes through a
//! read callback and writes decompressed output straight to the destination
//! pointer, which on this target is the physical load address.

use core::ffi::c_void;

use muon_loader::error::{DecodeError, LoadError};
use muon_loader::lzma::{LzmaDecode, PullSource, LZMA_PROPS_SIZE};
use muon_loader::mem::LoadTarget;

const SDK_RESULT_OK: i32 = 0;
const SDK_RESULT_DATA_ERROR: i32 = 1;

unsafe extern "C" {
    /// Decodes the 5-byte properties block into the SDK's opaque state.
    fn LzmaDecodeProperties(state: *mut c_void, props: *const u8, size: u32) -> i32;

    /// Runs the decode, pulling input through `read` and writing `out_size`
    /// bytes at `dst`.
    fn LzmaDecodeCallback(
        read: extern "C" fn(object: *mut c_void, buffer: *mut *const u8, size: *mut u32) -> i32,
        object: *mut c_void,
        props: *const u8,
        props_size: u32,
        dst: *mut u8,
        out_size: u32,
        out_processed: *mut u32,
    ) -> i32;
}

/// Trampoline: the SDK's pull callback, forwarding to the [`PullSource`]
/// smuggled through `object`.
extern "C" fn read_trampoline(object: *mut c_void, buffer: *mut *const u8, size: *mut u32) -> i32 {
    // SAFETY: `object` is the `&mut dyn PullSource` passed to
    // `LzmaDecodeCallback` below, alive for the whole decode.
    let src = unsafe { &mut **object.cast::<&mut dyn PullSource>() };
    match src.next_chunk() {
        Ok(chunk) => {
            // SAFETY: out-pointers supplied by the SDK.
            unsafe {
                *buffer = chunk.as_ptr();
                *size = chunk.len() as u32;
            }
            SDK_RESULT_OK
        }
        Err(_) => SDK_RESULT_DATA_ERROR,
    }
}

/// The SDK-backed decoder.
pub struct SdkDecoder;

impl SdkDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl LzmaDecode for SdkDecoder {
    fn decode(
        &mut self,
        props: &[u8; LZMA_PROPS_SIZE],
        src: &mut dyn PullSource,
        _target: &mut dyn LoadTarget,
        dst_addr: u64,
        out_size: u32,
    ) -> Result<(), LoadError> {
        let mut state = [0u8; 64];
        // SAFETY: props is the fixed-size block the SDK expects.
        let rc = unsafe {
            LzmaDecodeProperties(
                state.as_mut_ptr().cast(),
                props.as_ptr(),
                LZMA_PROPS_SIZE as u32,
            )
        };
        if rc != SDK_RESULT_OK {
            return Err(DecodeError::BadProperties.into());
        }

        let mut src_obj: &mut dyn PullSource = src;
        let mut out_processed: u32 = 0;
        // SAFETY: destination is the physical load address, already vetted
        // by the caller; the callback object outlives the call.
        let rc = unsafe {
            LzmaDecodeCallback(
                read_trampoline,
                core::ptr::from_mut(&mut src_obj).cast(),
                props.as_ptr(),
                LZMA_PROPS_SIZE as u32,
                dst_addr as usize as *mut u8,
                out_size,
                &raw mut out_processed,
            )
        };
        if rc != SDK_RESULT_OK || out_processed != out_size {
            return Err(DecodeError::Data.into());
        }
        Ok(())
    }
}
