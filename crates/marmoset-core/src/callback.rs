//! Host functions callable from script
//!
//! Every host function object created by this crate shares one native
//! trampoline. The function object carries two data slots: the reference of
//! the owning context and the name the callback is registered under. On each
//! call the trampoline resolves the context through the registry, looks the
//! callback up by name and converts its result back into an engine value or
//! a thrown error.

use std::ffi::CString;
use std::os::raw::c_int;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rquickjs_sys as qjs;
use tracing::{trace, warn};

use crate::context::Context;
use crate::error::Result;
use crate::exception::take_exception;
use crate::registry::Registry;
use crate::string::{c_name, new_js_string, to_rust_string};
use crate::value::Value;

/// A host function registered on a context
///
/// Receives the calling context and the call arguments. Returning
/// `Ok(None)` yields `undefined` to the script; returning an error throws
/// an `Error` whose message is the error's display text.
pub type Callback =
    Arc<dyn for<'c> Fn(&'c Context, &[Value<'c>]) -> Result<Option<Value<'c>>> + Send + Sync>;

/// Create a function object dispatching to the callback registered under `name`
///
/// The callback itself is not registered here.
pub(crate) fn new_function_object(ctx: &Context, name: &str, length: u32) -> Result<qjs::JSValue> {
    let c_name = c_name(name)?;
    let raw = ctx.raw();
    // SAFETY: raw is live for the duration of the borrow; JS_NewCFunctionData2
    // duplicates the data slots, so the name string is freed here
    unsafe {
        let name_value = new_js_string(raw, name);
        if qjs::JS_IsException(name_value) {
            return Err(take_exception(raw));
        }
        let mut data = [qjs::JS_MKVAL(qjs::JS_TAG_INT, ctx.id() as i32), name_value];
        let function = qjs::JS_NewCFunctionData2(
            raw,
            Some(dispatch),
            c_name.as_ptr(),
            length as c_int,
            0,
            data.len() as c_int,
            data.as_mut_ptr(),
        );
        qjs::JS_FreeValue(raw, name_value);
        if qjs::JS_IsException(function) {
            return Err(take_exception(raw));
        }
        Ok(function)
    }
}

unsafe extern "C" fn dispatch(
    ctx: *mut qjs::JSContext,
    _this: qjs::JSValue,
    argc: c_int,
    argv: *mut qjs::JSValue,
    _magic: c_int,
    data: *mut qjs::JSValue,
) -> qjs::JSValue {
    // SAFETY: the engine passes the live context and the two data slots set up
    // by new_function_object
    unsafe {
        let registry = qjs::JS_GetRuntimeOpaque(qjs::JS_GetRuntime(ctx)) as *const Registry;
        let id = qjs::JS_VALUE_GET_INT(*data) as u32;
        let Some(state) = registry.as_ref().and_then(|r| r.lookup(id)) else {
            warn!(context_ref = id, "host function called on unknown context");
            return throw_internal(ctx, "invalid context reference");
        };
        if !state.is_owner_thread() {
            warn!(context_ref = id, "host function called off the owning thread");
            return throw_internal(ctx, "context used outside its owning thread");
        }

        let name = to_rust_string(ctx, *data.add(1)).unwrap_or_default();
        let Some(callback) = state.callback(&name) else {
            return throw_internal(ctx, "invalid function name");
        };
        let Some(context) = Context::from_raw(ctx) else {
            return throw_internal(ctx, "invalid context reference");
        };

        trace!(context_ref = id, function = %name, argc, "dispatching host function");
        invoke(&context, &callback, &name, argc, argv)
    }
}

/// Run a callback and convert its outcome into an engine return value
///
/// # Safety
/// `argv` must point at `argc` values owned by the engine for the duration of the call.
unsafe fn invoke(
    context: &Context,
    callback: &Callback,
    name: &str,
    argc: c_int,
    argv: *mut qjs::JSValue,
) -> qjs::JSValue {
    let args: Vec<Value<'_>> = (0..argc.max(0) as usize)
        // SAFETY: argv holds at least argc entries, borrowed from the engine
        .map(|i| unsafe { Value::from_borrowed(context, *argv.add(i)) })
        .collect();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(context, &args)));
    drop(args);

    let result = match outcome {
        Ok(result) => result,
        Err(_) => {
            warn!(function = %name, "host function panicked");
            // SAFETY: context is live
            return unsafe { throw_internal(context.raw(), "host function panicked") };
        }
    };

    match result {
        Ok(Some(value)) => match context.ensure_owns(&value) {
            Ok(()) => value.into_raw(),
            // SAFETY: context is live
            Err(err) => unsafe { throw_plain(context.raw(), &err.to_string()) },
        },
        Ok(None) => qjs::JS_UNDEFINED,
        Err(err) => {
            warn!(function = %name, error = %err, "host function failed");
            // SAFETY: context is live
            unsafe { throw_plain(context.raw(), &err.to_string()) }
        }
    }
}

fn throw_message(message: &str) -> CString {
    CString::new(message.replace('\0', " ")).unwrap_or_default()
}

unsafe fn throw_plain(ctx: *mut qjs::JSContext, message: &str) -> qjs::JSValue {
    let message = throw_message(message);
    // SAFETY: the format string consumes exactly one C string argument
    unsafe { qjs::JS_ThrowPlainError(ctx, c"%s".as_ptr(), message.as_ptr()) }
}

unsafe fn throw_internal(ctx: *mut qjs::JSContext, message: &str) -> qjs::JSValue {
    let message = throw_message(message);
    // SAFETY: the format string consumes exactly one C string argument
    unsafe { qjs::JS_ThrowInternalError(ctx, c"%s".as_ptr(), message.as_ptr()) }
}
