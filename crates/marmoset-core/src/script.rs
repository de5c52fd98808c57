//! Compiled scripts bound to the context that compiled them

use std::fmt;
use std::os::raw::c_int;

use rquickjs_sys as qjs;

use crate::context::Context;
use crate::error::Result;
use crate::exception::take_exception;
use crate::string::{c_name, nul_terminated};

/// Compile global code into function bytecode without running it
///
/// # Safety
/// `ctx` must be a live context used on its owning thread.
pub(crate) unsafe fn compile(
    ctx: *mut qjs::JSContext,
    name: &str,
    code: &[u8],
) -> Result<qjs::JSValue> {
    let source = nul_terminated(code);
    let filename = c_name(name)?;
    let flags = (qjs::JS_EVAL_TYPE_GLOBAL | qjs::JS_EVAL_FLAG_COMPILE_ONLY) as c_int;
    // SAFETY: ctx is live per caller contract; source is NUL-terminated at code.len()
    unsafe {
        let raw = qjs::JS_Eval(
            ctx,
            source.as_ptr() as *const _,
            code.len() as _,
            filename.as_ptr(),
            flags,
        );
        if qjs::JS_IsException(raw) {
            return Err(take_exception(ctx));
        }
        Ok(raw)
    }
}

/// A script compiled by [`Context::compile_script`]
///
/// Holds the compiled function bytecode. It can be executed any number of
/// times, but only by the context that compiled it.
pub struct Script<'ctx> {
    raw: qjs::JSValue,
    ctx: &'ctx Context,
}

impl<'ctx> Script<'ctx> {
    /// # Safety
    /// `raw` must be an owned function-bytecode value belonging to `ctx`.
    pub(crate) unsafe fn from_raw(ctx: &'ctx Context, raw: qjs::JSValue) -> Self {
        Self { raw, ctx }
    }

    pub(crate) fn raw(&self) -> qjs::JSValue {
        self.raw
    }

    /// The context that compiled this script
    pub fn context(&self) -> &'ctx Context {
        self.ctx
    }

    /// Release the script now instead of at end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Script<'_> {
    fn drop(&mut self) {
        // SAFETY: the script owns one reference to its bytecode
        unsafe { qjs::JS_FreeValue(self.ctx.raw(), self.raw) }
    }
}

impl fmt::Debug for Script<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("context_ref", &self.ctx.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_and_execute_repeatedly() {
        let ctx = Context::new().unwrap();
        let script = ctx
            .compile_script("counter.js", b"globalThis.n = (globalThis.n || 0) + 1; n")
            .unwrap();

        for expected in 1..=3 {
            assert_eq!(ctx.execute_script(&script).unwrap().to_int32(), expected);
        }
        script.release();
    }

    #[test]
    fn test_compile_error_has_location() {
        let ctx = Context::new().unwrap();
        let err = ctx.compile_script("broken.js", b"let x = ;").unwrap_err();
        let js = err.js_error().unwrap();
        assert_eq!(js.kind, crate::ErrorKind::SyntaxError);
        assert_eq!(js.filename, "broken.js");
        assert_eq!(js.line, 1);
    }

    #[test]
    fn test_runtime_error_has_location() {
        let ctx = Context::new().unwrap();
        let script = ctx
            .compile_script("main.js", b"const a = 1;\nconst b = 2;\nc + a + b;")
            .unwrap();
        let err = ctx.execute_script(&script).unwrap_err();
        let js = err.js_error().unwrap();
        assert_eq!(js.kind, crate::ErrorKind::ReferenceError);
        assert_eq!(js.filename, "main.js");
        assert_eq!(js.line, 3);
    }

    #[test]
    fn test_foreign_context_is_rejected() {
        let ctx = Context::new().unwrap();
        let other = Context::new().unwrap();
        let script = ctx.compile_script("a.js", b"1").unwrap();
        let err = other.execute_script(&script).unwrap_err();
        assert_eq!(err.to_string(), "script belongs to a different context");
    }
}
