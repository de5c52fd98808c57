//! String marshaling between Rust and the engine

use std::ffi::CString;
use std::slice;

use rquickjs_sys as qjs;

use crate::error::{Error, Result};

/// Convert a Rust string into a C string for engine APIs taking names
pub(crate) fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::binding(format!("invalid name {:?}: contains NUL", name)))
}

/// Copy source bytes into a NUL-terminated buffer
///
/// The engine reads `len` bytes but requires `input[len] == 0`; interior NUL
/// bytes are passed through unchanged.
pub(crate) fn nul_terminated(code: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(code.len() + 1);
    buf.extend_from_slice(code);
    buf.push(0);
    buf
}

/// Convert any engine value to a Rust string using the engine's string coercion
///
/// Returns `None` if the coercion throws; the pending exception is discarded.
///
/// # Safety
/// `ctx` must be a live context and `value` must belong to it.
pub(crate) unsafe fn to_rust_string(ctx: *mut qjs::JSContext, value: qjs::JSValue) -> Option<String> {
    // SAFETY: ctx and value are valid per caller contract
    unsafe {
        let mut len = 0;
        let ptr = qjs::JS_ToCStringLen(ctx, &mut len, value);
        if ptr.is_null() {
            discard_exception(ctx);
            return None;
        }
        let bytes = slice::from_raw_parts(ptr as *const u8, len as usize);
        let result = String::from_utf8_lossy(bytes).into_owned();
        qjs::JS_FreeCString(ctx, ptr);
        Some(result)
    }
}

/// Create an engine string; returns the exception marker on failure
///
/// # Safety
/// `ctx` must be a live context.
pub(crate) unsafe fn new_js_string(ctx: *mut qjs::JSContext, s: &str) -> qjs::JSValue {
    // SAFETY: the pointer and length describe a valid UTF-8 buffer
    unsafe { qjs::JS_NewStringLen(ctx, s.as_ptr() as *const _, s.len() as _) }
}

/// Drop the pending exception, if any
///
/// # Safety
/// `ctx` must be a live context.
pub(crate) unsafe fn discard_exception(ctx: *mut qjs::JSContext) {
    // SAFETY: ctx is valid; JS_GetException transfers ownership of the exception
    unsafe {
        if qjs::JS_HasException(ctx) {
            let exception = qjs::JS_GetException(ctx);
            qjs::JS_FreeValue(ctx, exception);
        }
    }
}
