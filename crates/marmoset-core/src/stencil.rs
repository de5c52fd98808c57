//! Context-independent compiled code
//!
//! A [`FrontendContext`] compiles source into a [`Stencil`]: a serialized
//! bytecode buffer with no ties to any execution context. Stencils are
//! `Send + Sync`, so one thread can compile while others execute.

use std::ffi::c_void;
use std::fmt;
use std::os::raw::c_int;
use std::slice;
use std::sync::Arc;

use rquickjs_sys as qjs;
use tracing::{debug, trace};

use crate::config::FrontendOptions;
use crate::error::{Error, Result, ResultExt};
use crate::exception::take_exception;
use crate::script::compile;

/// Compiled code that any execution context can run
///
/// Clones share one buffer; the buffer is freed when the last clone is
/// dropped.
#[derive(Clone)]
pub struct Stencil {
    bytes: Arc<[u8]>,
}

impl Stencil {
    /// Size of the serialized bytecode
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Release this handle; the buffer lives on while other clones exist
    pub fn release(self) {
        drop(self);
    }

    /// Load the bytecode into `ctx` as a function ready for evaluation
    ///
    /// # Safety
    /// `ctx` must be a live context used on its owning thread.
    pub(crate) unsafe fn instantiate(&self, ctx: *mut qjs::JSContext) -> Result<qjs::JSValue> {
        // SAFETY: the buffer was produced by JS_WriteObject of the same engine build
        unsafe {
            let function = qjs::JS_ReadObject(
                ctx,
                self.bytes.as_ptr(),
                self.bytes.len() as _,
                qjs::JS_READ_OBJ_BYTECODE as c_int,
            );
            if qjs::JS_IsException(function) {
                return Err(take_exception(ctx));
            }
            Ok(function)
        }
    }
}

impl fmt::Debug for Stencil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stencil").field("len", &self.len()).finish()
    }
}

/// A compile-only engine instance producing [`Stencil`]s
///
/// Has no registry entry and no host functions. Like [`Context`](crate::Context)
/// it stays on the thread that created it; only the stencils it produces
/// cross threads.
///
/// ```compile_fail
/// use marmoset_core::FrontendContext;
/// use std::thread;
///
/// let frontend = FrontendContext::new().unwrap();
/// thread::spawn(move || {
///     let _ = frontend.compile_to_stencil("a.js", b"1"); // Error: FrontendContext is !Send
/// });
/// ```
pub struct FrontendContext {
    raw: *mut qjs::JSContext,
    rt: *mut qjs::JSRuntime,
    options: FrontendOptions,
}

impl FrontendContext {
    pub fn new() -> Result<Self> {
        Self::with_options(FrontendOptions::default())
    }

    pub fn with_options(options: FrontendOptions) -> Result<Self> {
        options.validate()?;
        // SAFETY: each pointer is checked before use and freed on failure
        unsafe {
            let rt = qjs::JS_NewRuntime();
            if rt.is_null() {
                return Err(Error::binding("new frontend context"));
            }
            let raw = qjs::JS_NewContext(rt);
            if raw.is_null() {
                qjs::JS_FreeRuntime(rt);
                return Err(Error::binding("new frontend context"));
            }
            if options.native_stack_size != 0 {
                qjs::JS_SetMaxStackSize(rt, options.native_stack_size as _);
            }
            debug!(native_stack_size = options.native_stack_size, "frontend context created");
            Ok(Self { raw, rt, options })
        }
    }

    pub fn options(&self) -> &FrontendOptions {
        &self.options
    }

    /// Compile source into a stencil
    ///
    /// `name` is the filename reported in errors raised while the stencil runs.
    pub fn compile_to_stencil(&self, name: &str, code: &[u8]) -> Result<Stencil> {
        // SAFETY: raw and rt are live and used on the owning thread
        unsafe {
            qjs::JS_UpdateStackTop(self.rt);
            let function = compile(self.raw, name, code).op("compile script")?;

            let mut len = 0;
            let ptr = qjs::JS_WriteObject(
                self.raw,
                &mut len,
                function,
                qjs::JS_WRITE_OBJ_BYTECODE as c_int,
            );
            qjs::JS_FreeValue(self.raw, function);
            if ptr.is_null() {
                return Err(take_exception(self.raw)).op("compile script");
            }

            let bytes: Arc<[u8]> = Arc::from(slice::from_raw_parts(ptr, len as usize));
            qjs::js_free(self.raw, ptr as *mut c_void);

            trace!(name, bytes = bytes.len(), "stencil compiled");
            Ok(Stencil { bytes })
        }
    }

    /// Destroy the frontend context; stencils it produced stay valid
    pub fn destroy(self) {
        drop(self);
    }
}

impl Drop for FrontendContext {
    fn drop(&mut self) {
        // SAFETY: compiled functions are freed as soon as they are serialized,
        // so nothing on the host side references the context
        unsafe {
            qjs::JS_FreeContext(self.raw);
            qjs::JS_FreeRuntime(self.rt);
        }
    }
}

impl fmt::Debug for FrontendContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrontendContext")
            .field("raw", &self.raw)
            .field("options", &self.options)
            .finish()
    }
}
