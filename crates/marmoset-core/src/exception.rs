//! Conversion of pending engine exceptions into [`Error`]s

use std::ffi::CStr;

use rquickjs_sys as qjs;

use crate::error::{Error, ErrorKind, JsError};
use crate::string::{discard_exception, to_rust_string};

/// Take the pending exception out of the engine and convert it
///
/// The exception value is freed exactly once, here.
///
/// # Safety
/// `ctx` must be a live context.
pub(crate) unsafe fn take_exception(ctx: *mut qjs::JSContext) -> Error {
    // SAFETY: ctx is valid per caller contract
    unsafe {
        if !qjs::JS_HasException(ctx) {
            return JsError::new(ErrorKind::InternalError, "unknown engine error").into();
        }
        let exception = qjs::JS_GetException(ctx);
        let error = describe(ctx, exception);
        qjs::JS_FreeValue(ctx, exception);
        error.into()
    }
}

/// Build a [`JsError`] from a thrown value without taking ownership of it
///
/// # Safety
/// `ctx` must be a live context and `exception` must belong to it.
pub(crate) unsafe fn describe(ctx: *mut qjs::JSContext, exception: qjs::JSValue) -> JsError {
    // SAFETY: ctx and exception are valid per caller contract
    unsafe {
        if !qjs::JS_IsError(exception) {
            // throw "string", throw 42, throw {}
            let message =
                to_rust_string(ctx, exception).unwrap_or_else(|| "uncaught exception".to_string());
            return JsError::new(ErrorKind::Error, message);
        }

        let name = string_property(ctx, exception, c"name").unwrap_or_else(|| "Error".to_string());
        let message = string_property(ctx, exception, c"message")
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| name.clone());
        let stack = string_property(ctx, exception, c"stack").filter(|s| !s.is_empty());

        JsError::new(ErrorKind::from_name(&name), message).with_stack(stack)
    }
}

/// Read a property and coerce it to a string; `None` if absent or if reading throws
unsafe fn string_property(
    ctx: *mut qjs::JSContext,
    object: qjs::JSValue,
    name: &CStr,
) -> Option<String> {
    // SAFETY: ctx and object are valid per caller contract
    unsafe {
        let value = qjs::JS_GetPropertyStr(ctx, object, name.as_ptr());
        if qjs::JS_IsException(value) {
            discard_exception(ctx);
            return None;
        }
        let result = if qjs::JS_IsUndefined(value) || qjs::JS_IsNull(value) {
            None
        } else {
            to_rust_string(ctx, value)
        };
        qjs::JS_FreeValue(ctx, value);
        result
    }
}
