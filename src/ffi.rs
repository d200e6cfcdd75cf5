//! C boundary
//!
//! Every conversion entry point returns a pointer into the process-wide
//! [`RESULT_CACHE`] or null on failure. Pointers stay valid until the next
//! successful conversion producing the same kind of output. After a failure,
//! [`shaderbridge_last_diagnostics`] returns the rendered records.
//!
//! Binary inputs and outputs are counted in 32-bit words. Text inputs are
//! taken as `len` bytes of UTF-8 and need no terminator; text outputs are
//! NUL-terminated.
//!
//! Hosts converting from several threads at once should use
//! [`shaderbridge_convert_owned`], which hands back a buffer the caller frees.

use crate::cache::{OwnedBuffer, RESULT_CACHE};
use crate::config::PipelineOptions;
use crate::pipeline::{Conversion, Payload, Pipeline};
use crate::{Error, Result};
use std::ffi::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// Borrow a host buffer; null is only allowed with a zero length
unsafe fn host_slice<'a, T>(data: *const T, len: usize) -> Result<&'a [T]> {
    if data.is_null() {
        if len == 0 {
            return Ok(&[]);
        }
        return Err(Error::invalid_input(format!(
            "null input pointer with length {}",
            len
        )));
    }
    Ok(unsafe { std::slice::from_raw_parts(data, len) })
}

/// Run a conversion against the shared cache and return the slot pointer
fn publish(conversion: Conversion, input: Result<Payload<'_>>) -> *const u8 {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let payload = match input {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(%conversion, "rejected input: {}", error);
                RESULT_CACHE.record_failure(&format!("{}: {}", conversion, error));
                return ptr::null();
            }
        };

        match Pipeline::default().convert(conversion, payload) {
            Ok(view) => view.as_ptr(),
            // Already logged and recorded by the pipeline
            Err(_) => ptr::null(),
        }
    }));

    outcome.unwrap_or_else(|_| {
        tracing::warn!(%conversion, "conversion panicked");
        RESULT_CACHE.record_failure(&format!("{}: internal error", conversion));
        ptr::null()
    })
}

/// SPIR-V binary → SPIR-V assembly
///
/// # Safety
/// `words` must point to `word_count` readable words, or be null with a zero count.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shaderbridge_spv_to_spvasm(
    words: *const u32,
    word_count: usize,
) -> *const c_char {
    let input = unsafe { host_slice(words, word_count) }.map(Payload::Words);
    publish(Conversion::BinaryToAssembly, input).cast()
}

/// SPIR-V assembly → SPIR-V binary
///
/// The word count of the result is returned by [`shaderbridge_last_spv_size`].
///
/// # Safety
/// `text` must point to `len` readable bytes, or be null with a zero length.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shaderbridge_spvasm_to_spv(text: *const c_char, len: usize) -> *const u32 {
    let input = unsafe { host_slice(text.cast::<u8>(), len) }.map(Payload::Bytes);
    publish(Conversion::AssemblyToBinary, input).cast()
}

/// SPIR-V binary → WGSL
///
/// # Safety
/// `words` must point to `word_count` readable words, or be null with a zero count.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shaderbridge_spv_to_wgsl(
    words: *const u32,
    word_count: usize,
) -> *const c_char {
    let input = unsafe { host_slice(words, word_count) }.map(Payload::Words);
    publish(Conversion::BinaryToSource, input).cast()
}

/// SPIR-V assembly → WGSL
///
/// # Safety
/// `text` must point to `len` readable bytes, or be null with a zero length.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shaderbridge_spvasm_to_wgsl(
    text: *const c_char,
    len: usize,
) -> *const c_char {
    let input = unsafe { host_slice(text.cast::<u8>(), len) }.map(Payload::Bytes);
    publish(Conversion::AssemblyToSource, input).cast()
}

/// WGSL → SPIR-V binary
///
/// # Safety
/// `text` must point to `len` readable bytes, or be null with a zero length.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shaderbridge_wgsl_to_spv(text: *const c_char, len: usize) -> *const u32 {
    let input = unsafe { host_slice(text.cast::<u8>(), len) }.map(Payload::Bytes);
    publish(Conversion::SourceToBinary, input).cast()
}

/// WGSL → SPIR-V assembly
///
/// # Safety
/// `text` must point to `len` readable bytes, or be null with a zero length.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shaderbridge_wgsl_to_spvasm(
    text: *const c_char,
    len: usize,
) -> *const c_char {
    let input = unsafe { host_slice(text.cast::<u8>(), len) }.map(Payload::Bytes);
    publish(Conversion::SourceToAssembly, input).cast()
}

/// Word count of the binary slot, zero if nothing was published
#[unsafe(no_mangle)]
pub extern "C" fn shaderbridge_last_spv_size() -> usize {
    RESULT_CACHE.binary_len()
}

/// Rendered diagnostics of the last failed call, or null if the last call succeeded
#[unsafe(no_mangle)]
pub extern "C" fn shaderbridge_last_diagnostics() -> *const c_char {
    RESULT_CACHE
        .last_diagnostics()
        .map_or(ptr::null(), |p| p.cast())
}

/// Convert into a caller-owned buffer
///
/// `conversion` is a [`Conversion`] code (0-5). Binary input is passed as
/// little-endian bytes. `options_json` may be null for defaults. Returns null
/// on failure; the shared slots are never touched. When `error_out` is not
/// null, a failure stores an owned buffer with the rendered diagnostics there
/// and a success stores null.
///
/// # Safety
/// `input` must point to `len` readable bytes and `options_json` to
/// `options_len` readable bytes, each possibly null with a zero length.
/// `error_out` must be null or point to writable storage for one pointer.
/// Every returned buffer must be released with [`shaderbridge_buffer_free`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shaderbridge_convert_owned(
    conversion: u32,
    input: *const u8,
    len: usize,
    options_json: *const c_char,
    options_len: usize,
    error_out: *mut *mut OwnedBuffer,
) -> *mut OwnedBuffer {
    let input = unsafe { host_slice(input, len) };
    let options = unsafe { host_slice(options_json.cast::<u8>(), options_len) };

    // Failures carry their rendered diagnostics
    type Owned = std::result::Result<OwnedBuffer, String>;

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Owned {
        let conversion = Conversion::try_from(conversion).map_err(|e| e.to_string())?;
        let options = match options.map_err(|e| e.to_string())? {
            [] => PipelineOptions::default(),
            json => std::str::from_utf8(json)
                .map_err(|e| Error::Config(format!("options are not UTF-8: {}", e)))
                .and_then(PipelineOptions::from_json)
                .map_err(|e| format!("{}: {}", conversion, e))?,
        };

        let payload = Payload::Bytes(input.map_err(|e| format!("{}: {}", conversion, e))?);
        let translation = Pipeline::new(options)
            .run(conversion, payload)
            .map_err(|failure| failure.render_with_input(payload))?;
        Ok(OwnedBuffer::from_artifact(translation.artifact))
    }));

    let rendered = match outcome {
        Ok(Ok(buffer)) => {
            unsafe { store_error(error_out, None) };
            return Box::into_raw(Box::new(buffer));
        }
        Ok(Err(rendered)) => rendered,
        Err(_) => "owned conversion panicked".to_string(),
    };
    tracing::warn!(
        "owned conversion failed: {}",
        rendered.lines().next().unwrap_or_default()
    );
    unsafe { store_error(error_out, Some(OwnedBuffer::diagnostics(&rendered))) };
    ptr::null_mut()
}

/// Hand a diagnostics buffer (or null) to the caller's out-parameter
unsafe fn store_error(error_out: *mut *mut OwnedBuffer, diagnostics: Option<OwnedBuffer>) {
    if error_out.is_null() {
        return;
    }
    let value = diagnostics.map_or(ptr::null_mut(), |buffer| Box::into_raw(Box::new(buffer)));
    unsafe { error_out.write(value) };
}

/// Start of an owned buffer; text buffers are NUL-terminated
///
/// # Safety
/// `buffer` must come from [`shaderbridge_convert_owned`] and not be freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shaderbridge_buffer_data(buffer: *const OwnedBuffer) -> *const u8 {
    match unsafe { buffer.as_ref() } {
        Some(buffer) => buffer.as_ptr(),
        None => ptr::null(),
    }
}

/// Payload length of an owned buffer in bytes
///
/// # Safety
/// `buffer` must come from [`shaderbridge_convert_owned`] and not be freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shaderbridge_buffer_len(buffer: *const OwnedBuffer) -> usize {
    unsafe { buffer.as_ref() }.map_or(0, OwnedBuffer::len)
}

/// Release an owned buffer; null is ignored
///
/// # Safety
/// `buffer` must come from [`shaderbridge_convert_owned`] and be freed once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shaderbridge_buffer_free(buffer: *mut OwnedBuffer) {
    if !buffer.is_null() {
        drop(unsafe { Box::from_raw(buffer) });
    }
}
