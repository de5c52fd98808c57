//! JSON pass-throughs to the engine's `JSON.parse` and `JSON.stringify`

use rquickjs_sys as qjs;

use crate::context::Context;
use crate::error::{Result, ResultExt};
use crate::object::Object;
use crate::string::{c_name, nul_terminated, to_rust_string};
use crate::value::Value;

const JSON_FILENAME: &str = "<json>";

/// Parse JSON text into an object
///
/// Top-level arrays parse to an array object; top-level primitives fail with
/// a cast error.
pub fn parse<'ctx>(ctx: &'ctx Context, text: &str) -> Result<Object<'ctx>> {
    let buf = nul_terminated(text.as_bytes());
    let filename = c_name(JSON_FILENAME)?;
    // SAFETY: buf is NUL-terminated at text.len()
    let raw = unsafe {
        qjs::JS_ParseJSON(
            ctx.raw(),
            buf.as_ptr() as *const _,
            text.len() as _,
            filename.as_ptr(),
        )
    };
    ctx.value_from(raw)
        .and_then(Value::into_object)
        .op("JSON parse")
}

/// Serialize a value to JSON text
///
/// Values JSON cannot represent (`undefined`, functions, symbols) produce an
/// empty string.
pub fn stringify(value: &Value<'_>) -> Result<String> {
    let ctx = value.context();
    // SAFETY: value is live in ctx; replacer and space are undefined
    let raw = unsafe {
        qjs::JS_JSONStringify(ctx.raw(), value.raw(), qjs::JS_UNDEFINED, qjs::JS_UNDEFINED)
    };
    let text = ctx.value_from(raw).op("JSON stringify")?;
    if text.is_undefined() {
        return Ok(String::new());
    }
    // SAFETY: text is a live string value of ctx
    Ok(unsafe { to_rust_string(ctx.raw(), text.raw()) }.unwrap_or_default())
}
