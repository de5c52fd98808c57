//! Execution context: one engine instance plus its host-callback table

use std::cell::Cell;
use std::ffi::c_void;
use std::os::raw::c_int;
use std::rc::Rc;
use std::sync::Arc;

use rquickjs_sys as qjs;
use tracing::{debug, trace};

use crate::attributes::PropertyAttributes;
use crate::builtins::Builtins;
use crate::callback;
use crate::config::ContextOptions;
use crate::error::{Error, Result};
use crate::exception::take_exception;
use crate::object::Object;
use crate::registry::{ContextRef, ContextState, Registry};
use crate::script::Script;
use crate::stencil::Stencil;
use crate::string::{c_name, nul_terminated};
use crate::value::Value;

/// Filename reported in errors raised by [`Context::evaluate`]
pub const EVALUATE_FILENAME: &str = "<evaluate>";

pub(crate) struct ContextInner {
    raw: *mut qjs::JSContext,
    rt: *mut qjs::JSRuntime,
    state: Arc<ContextState>,
    registry: Arc<Registry>,
    options: ContextOptions,
    builtins: Builtins,
    depth: Cell<u32>,
}

impl ContextInner {
    /// Allocate the engine runtime and context for an already registered state
    fn allocate(
        state: Arc<ContextState>,
        registry: Arc<Registry>,
        options: ContextOptions,
    ) -> Result<Rc<Self>> {
        // SAFETY: each pointer is checked before use; on failure everything
        // allocated so far is freed before returning
        unsafe {
            let rt = qjs::JS_NewRuntime();
            if rt.is_null() {
                return Err(Error::binding("new context"));
            }
            let raw = qjs::JS_NewContext(rt);
            if raw.is_null() {
                qjs::JS_FreeRuntime(rt);
                return Err(Error::binding("new context"));
            }

            // Captured before any limit or user script can interfere
            let builtins = match Builtins::capture(raw) {
                Ok(builtins) => builtins,
                Err(err) => {
                    qjs::JS_FreeContext(raw);
                    qjs::JS_FreeRuntime(rt);
                    return Err(err);
                }
            };

            // Limits go on after the intrinsics exist so a tiny heap ceiling
            // cannot leave a half-initialized global object behind.
            if options.heap_max_bytes != 0 {
                qjs::JS_SetMemoryLimit(rt, options.heap_max_bytes as _);
            }
            if options.gc_max_bytes != 0 {
                qjs::JS_SetGCThreshold(rt, options.gc_max_bytes as _);
            }
            if options.native_stack_size != 0 {
                qjs::JS_SetMaxStackSize(rt, options.native_stack_size as _);
            }

            let inner = Rc::new(Self {
                raw,
                rt,
                state,
                registry,
                options,
                builtins,
                depth: Cell::new(0),
            });

            qjs::JS_SetContextOpaque(raw, Rc::as_ptr(&inner) as *mut c_void);
            qjs::JS_SetRuntimeOpaque(rt, Arc::as_ptr(&inner.registry) as *mut c_void);
            qjs::JS_SetInterruptHandler(
                rt,
                Some(interrupt_handler),
                Arc::as_ptr(&inner.state) as *mut c_void,
            );

            Ok(inner)
        }
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        // SAFETY: every handle borrowing this context has been dropped, so the
        // engine holds no references from the host side
        unsafe {
            self.builtins.free(self.raw);
            qjs::JS_FreeContext(self.raw);
            qjs::JS_FreeRuntime(self.rt);
        }
        self.registry.remove(self.state.id());
        debug!(context_ref = self.state.id(), "context destroyed");
    }
}

/// Polled by the engine at its interruption checkpoints
unsafe extern "C" fn interrupt_handler(_rt: *mut qjs::JSRuntime, opaque: *mut c_void) -> c_int {
    // SAFETY: opaque is the ContextState owned by the ContextInner that owns this runtime
    let state = unsafe { &*(opaque as *const ContextState) };
    c_int::from(state.take_interrupt())
}

/// A JavaScript execution context
///
/// Owns one engine instance (heap, native stack limit, GC policy) and the
/// table of host functions callable from it. Every handle created from a
/// context borrows it, so the context cannot be destroyed while any handle
/// is alive.
///
/// # Thread Safety
///
/// This type is `!Send` and `!Sync`: a context is used from the thread that
/// created it, for its whole lifetime. The only cross-thread operation is
/// interruption, through an [`InterruptHandle`].
///
/// ```compile_fail
/// use marmoset_core::Context;
/// use std::sync::Arc;
///
/// let ctx = Arc::new(Context::new().unwrap());
/// let shared = ctx.clone();
/// std::thread::spawn(move || {
///     let _shared = shared; // Error: Context is !Sync
/// });
/// ```
pub struct Context {
    inner: Rc<ContextInner>,
}

impl Context {
    /// Create a context with default options in the process-wide registry
    pub fn new() -> Result<Self> {
        Self::with_options(ContextOptions::default())
    }

    /// Create a context with the given options in the process-wide registry
    pub fn with_options(options: ContextOptions) -> Result<Self> {
        Self::with_registry(options, Registry::global())
    }

    /// Create a context registered in an explicit registry
    ///
    /// Options are validated before anything is allocated. The context is
    /// registered before the engine instance is allocated; if allocation
    /// fails the registration is rolled back.
    pub fn with_registry(options: ContextOptions, registry: Arc<Registry>) -> Result<Self> {
        options.validate()?;

        if options.gc_incremental_enabled || !options.gc_slice_time_budget.is_zero() {
            debug!(
                incremental = options.gc_incremental_enabled,
                slice_budget_ms = options.gc_slice_time_budget.as_millis() as u64,
                "incremental GC options recorded; the engine collects non-incrementally"
            );
        }

        let inner = registry.register_with(|state| {
            ContextInner::allocate(state, registry.clone(), options.clone())
        })?;

        debug!(
            context_ref = inner.state.id(),
            heap_max_bytes = inner.options.heap_max_bytes,
            native_stack_size = inner.options.native_stack_size,
            gc_max_bytes = inner.options.gc_max_bytes,
            "context created"
        );

        Ok(Self { inner })
    }

    /// Rebuild a handle to a live context from its engine pointer
    ///
    /// # Safety
    /// `raw` must be a context created by [`Context::with_registry`] whose
    /// owning `Context` is still alive.
    pub(crate) unsafe fn from_raw(raw: *mut qjs::JSContext) -> Option<Self> {
        // SAFETY: the opaque pointer was set from Rc::as_ptr in allocate and the
        // owning Context keeps that allocation alive
        unsafe {
            let ptr = qjs::JS_GetContextOpaque(raw) as *const ContextInner;
            if ptr.is_null() {
                return None;
            }
            Rc::increment_strong_count(ptr);
            Some(Self {
                inner: Rc::from_raw(ptr),
            })
        }
    }

    /// Destroy the context
    ///
    /// Frees the engine instance, then removes the registry entry. Dropping
    /// the context does the same.
    pub fn destroy(self) {
        drop(self);
    }

    /// Get the raw engine context pointer
    pub fn raw(&self) -> *mut qjs::JSContext {
        self.inner.raw
    }

    /// Reference under which this context is registered
    pub fn id(&self) -> ContextRef {
        self.inner.state.id()
    }

    /// Options captured at construction
    pub fn options(&self) -> &ContextOptions {
        &self.inner.options
    }

    pub(crate) fn state(&self) -> &Arc<ContextState> {
        &self.inner.state
    }

    /// Whether two handles refer to the same engine context
    pub fn same(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Ask the running evaluation to abort at its next interruption checkpoint
    ///
    /// The aborted call returns an engine error with message `"interrupted"`;
    /// the context stays usable. A request made while nothing runs is
    /// discarded when the next top-level evaluation starts.
    pub fn request_interrupt(&self) {
        debug!(context_ref = self.id(), "interrupt requested");
        self.inner.state.request_interrupt();
    }

    /// Get a thread-safe handle that can interrupt this context from another thread
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            state: self.inner.state.clone(),
        }
    }

    /// Force a garbage collection
    pub fn run_gc(&self) {
        // SAFETY: rt is valid for the lifetime of self
        unsafe { qjs::JS_RunGC(self.inner.rt) }
    }

    /// Get the global object
    pub fn global(&self) -> Result<Object<'_>> {
        // SAFETY: ctx is valid; JS_GetGlobalObject returns an owned reference
        let raw = unsafe { qjs::JS_GetGlobalObject(self.inner.raw) };
        self.value_from(raw)?.into_object()
    }

    /// Create a new plain object and define it as a property of `object`
    pub fn define_object<'a>(
        &'a self,
        object: &Object<'a>,
        name: &str,
        attrs: PropertyAttributes,
    ) -> Result<Object<'a>> {
        let child = Object::new(self)?;
        self.define_property(object, name, &child, attrs)?;
        Ok(child)
    }

    /// Define a data property on `object`
    pub fn define_property(
        &self,
        object: &Object<'_>,
        name: &str,
        value: &Value<'_>,
        attrs: PropertyAttributes,
    ) -> Result<()> {
        self.ensure_owns(object)?;
        self.ensure_owns(value)?;
        let name = c_name(name)?;
        // SAFETY: both values belong to this context; the define call consumes
        // the duplicated reference
        let rc = unsafe {
            qjs::JS_DefinePropertyValueStr(
                self.inner.raw,
                object.raw(),
                name.as_ptr(),
                qjs::JS_DupValue(self.inner.raw, value.raw()),
                attrs.engine_flags(),
            )
        };
        self.status(rc)
    }

    /// Define an indexed element on `object`
    pub fn define_element(
        &self,
        object: &Object<'_>,
        index: u32,
        value: &Value<'_>,
        attrs: PropertyAttributes,
    ) -> Result<()> {
        self.ensure_owns(object)?;
        self.ensure_owns(value)?;
        // SAFETY: both values belong to this context; the define call consumes
        // the duplicated reference
        let rc = unsafe {
            qjs::JS_DefinePropertyValueUint32(
                self.inner.raw,
                object.raw(),
                index,
                qjs::JS_DupValue(self.inner.raw, value.raw()),
                attrs.engine_flags(),
            )
        };
        self.status(rc)
    }

    /// Define a host function as a property of `object`
    ///
    /// `nargs` is the function's declared `length`. The callback is registered
    /// under `name` only after the property is defined.
    pub fn define_function<F>(
        &self,
        object: &Object<'_>,
        name: &str,
        callback: F,
        nargs: u32,
        attrs: PropertyAttributes,
    ) -> Result<()>
    where
        F: for<'c> Fn(&'c Context, &[Value<'c>]) -> Result<Option<Value<'c>>>
            + Send
            + Sync
            + 'static,
    {
        self.ensure_owns(object)?;
        let c_name = c_name(name)?;
        let function = callback::new_function_object(self, name, nargs)?;
        // SAFETY: object belongs to this context; the define call consumes function
        let rc = unsafe {
            qjs::JS_DefinePropertyValueStr(
                self.inner.raw,
                object.raw(),
                c_name.as_ptr(),
                function,
                attrs.engine_flags(),
            )
        };
        self.status(rc)?;
        self.inner.state.register_callback(name, Arc::new(callback));
        trace!(context_ref = self.id(), function = name, "host function defined");
        Ok(())
    }

    /// Call the function stored under `name` on `receiver`
    pub fn call_function_name<'a>(
        &'a self,
        name: &str,
        receiver: &Value<'a>,
        args: &[&Value<'a>],
    ) -> Result<Value<'a>> {
        self.ensure_owns(receiver)?;
        let c_name = c_name(name)?;
        // SAFETY: receiver belongs to this context; the property read returns an owned value
        let function = self.value_from(unsafe {
            qjs::JS_GetPropertyStr(self.inner.raw, receiver.raw(), c_name.as_ptr())
        })?;
        self.call_function_value(&function, receiver, args)
    }

    /// Call `function` with an explicit receiver
    pub fn call_function_value<'a>(
        &'a self,
        function: &Value<'a>,
        receiver: &Value<'a>,
        args: &[&Value<'a>],
    ) -> Result<Value<'a>> {
        self.ensure_owns(function)?;
        self.call_raw(function.raw(), receiver, args)
    }

    /// Call a raw function value of this context with an explicit receiver
    pub(crate) fn call_raw<'a>(
        &'a self,
        function: qjs::JSValue,
        receiver: &Value<'a>,
        args: &[&Value<'a>],
    ) -> Result<Value<'a>> {
        self.ensure_owns(receiver)?;
        let mut argv = Vec::with_capacity(args.len());
        for arg in args {
            self.ensure_owns(arg)?;
            argv.push(arg.raw());
        }

        let _entered = self.enter();
        // SAFETY: all values belong to this context and stay alive for the call;
        // JS_Call borrows its arguments
        let raw = unsafe {
            qjs::JS_Call(
                self.inner.raw,
                function,
                receiver.raw(),
                argv.len() as c_int,
                argv.as_mut_ptr(),
            )
        };
        self.value_from(raw)
    }

    /// Run `new constructor()` for a raw constructor of this context
    pub(crate) fn construct_raw(&self, constructor: qjs::JSValue) -> Result<Value<'_>> {
        let _entered = self.enter();
        // SAFETY: the constructor belongs to this context; no arguments are passed
        let raw = unsafe {
            qjs::JS_CallConstructor(self.inner.raw, constructor, 0, std::ptr::null_mut())
        };
        self.value_from(raw)
    }

    pub(crate) fn builtins(&self) -> &Builtins {
        &self.inner.builtins
    }

    /// Parse and run source code in the global scope
    pub fn evaluate(&self, code: &[u8]) -> Result<Value<'_>> {
        let source = nul_terminated(code);
        let filename = c_name(EVALUATE_FILENAME)?;
        let _entered = self.enter();
        // SAFETY: source is NUL-terminated at code.len()
        let raw = unsafe {
            qjs::JS_Eval(
                self.inner.raw,
                source.as_ptr() as *const _,
                code.len() as _,
                filename.as_ptr(),
                qjs::JS_EVAL_TYPE_GLOBAL as c_int,
            )
        };
        self.value_from(raw)
    }

    /// Compile source code into a script bound to this context
    pub fn compile_script(&self, name: &str, code: &[u8]) -> Result<Script<'_>> {
        let _entered = self.enter();
        // SAFETY: ctx is valid for the lifetime of self
        let raw = unsafe { crate::script::compile(self.inner.raw, name, code)? };
        // SAFETY: compile returned an owned function-bytecode value of this context
        Ok(unsafe { Script::from_raw(self, raw) })
    }

    /// Run a script compiled by this context
    pub fn execute_script(&self, script: &Script<'_>) -> Result<Value<'_>> {
        if !self.same(script.context()) {
            return Err(Error::binding("script belongs to a different context"));
        }
        let _entered = self.enter();
        // SAFETY: the bytecode belongs to this context; JS_EvalFunction consumes
        // the duplicated reference
        let raw = unsafe {
            qjs::JS_EvalFunction(self.inner.raw, qjs::JS_DupValue(self.inner.raw, script.raw()))
        };
        self.value_from(raw)
    }

    /// Run a precompiled stencil in this context
    pub fn execute_stencil(&self, stencil: &Stencil) -> Result<Value<'_>> {
        let _entered = self.enter();
        // SAFETY: ctx is valid for the lifetime of self
        let function = unsafe { stencil.instantiate(self.inner.raw)? };
        trace!(context_ref = self.id(), bytes = stencil.len(), "executing stencil");
        // SAFETY: JS_EvalFunction consumes the freshly read bytecode
        let raw = unsafe { qjs::JS_EvalFunction(self.inner.raw, function) };
        self.value_from(raw)
    }

    /// Wrap an owned engine result, converting the exception marker into an error
    pub(crate) fn value_from(&self, raw: qjs::JSValue) -> Result<Value<'_>> {
        // SAFETY: raw was returned by an engine call on this context
        unsafe {
            if qjs::JS_IsException(raw) {
                return Err(take_exception(self.inner.raw));
            }
            Ok(Value::from_raw(self, raw))
        }
    }

    /// Convert a negative engine status code into an error
    pub(crate) fn status(&self, rc: c_int) -> Result<()> {
        if rc < 0 {
            // SAFETY: a negative status means an exception is pending on this context
            return Err(unsafe { take_exception(self.inner.raw) });
        }
        Ok(())
    }

    /// Drop whatever exception an infallible accessor left behind
    pub(crate) fn discard_exception(&self) {
        // SAFETY: ctx is valid for the lifetime of self
        unsafe { crate::string::discard_exception(self.inner.raw) }
    }

    pub(crate) fn ensure_owns(&self, value: &Value<'_>) -> Result<()> {
        if self.same(value.context()) {
            Ok(())
        } else {
            Err(Error::binding("value belongs to a different context"))
        }
    }

    /// Mark the start of a top-level or nested engine entry
    ///
    /// Entering at depth zero discards stale interrupt requests and records
    /// the current native stack position for overflow checks.
    fn enter(&self) -> Entered<'_> {
        let depth = self.inner.depth.get();
        if depth == 0 {
            self.inner.state.clear_interrupt();
            // SAFETY: rt is valid and used on its owning thread
            unsafe { qjs::JS_UpdateStackTop(self.inner.rt) };
        }
        self.inner.depth.set(depth + 1);
        Entered { inner: &self.inner }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id())
            .field("raw", &self.inner.raw)
            .finish()
    }
}

struct Entered<'a> {
    inner: &'a ContextInner,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.inner.depth.set(self.inner.depth.get() - 1);
    }
}

/// Thread-safe handle for interrupting a context
///
/// Obtained from [`Context::interrupt_handle`]. Requests made after the
/// context is destroyed have no effect.
#[derive(Clone)]
pub struct InterruptHandle {
    state: Arc<ContextState>,
}

impl InterruptHandle {
    /// Ask the context's running evaluation to abort
    pub fn request_interrupt(&self) {
        debug!(context_ref = self.state.id(), "interrupt requested from handle");
        self.state.request_interrupt();
    }

    /// Reference of the context this handle interrupts
    pub fn context_ref(&self) -> ContextRef {
        self.state.id()
    }
}

impl std::fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("context_ref", &self.state.id())
            .finish()
    }
}
