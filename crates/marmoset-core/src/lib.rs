// Allow raw pointer accessors in public functions - this is an FFI wrapper
// and `raw()` pointers are only handed out for direct engine access.
#![allow(clippy::not_unsafe_ptr_arg_deref)]

//! Safe bindings for an embedded QuickJS engine.
//!
//! This crate wraps the raw engine FFI in lifetime-checked handles: an
//! execution [`Context`] owns one engine instance, and every [`Value`],
//! [`Object`], [`Function`], [`Array`], [`Map`], [`Set`] and [`Script`]
//! borrows the context it belongs to. Host functions are plain Rust closures
//! dispatched through a per-context callback table.
//!
//! # Example
//!
//! ```
//! use marmoset_core::{Context, PropertyAttributes, Value};
//!
//! let ctx = Context::new().unwrap();
//! let global = ctx.global().unwrap();
//! ctx.define_function(
//!     &global,
//!     "add",
//!     |ctx, args| Ok(Some(Value::int32(ctx, args[0].to_int32() + args[1].to_int32()))),
//!     2,
//!     PropertyAttributes::DEFAULT,
//! )
//! .unwrap();
//!
//! let result = ctx.evaluate(b"add(1, 2)").unwrap();
//! assert_eq!(result.to_int32(), 3);
//! ```
//!
//! # Thread Safety
//!
//! [`Context`] and every handle are `!Send` and `!Sync`: a context is used
//! from the thread that created it, for its whole lifetime. Two things cross
//! threads:
//!
//! - [`InterruptHandle`] aborts a running evaluation from another thread.
//! - [`Stencil`] carries compiled code from a [`FrontendContext`] to any
//!   number of executing threads.
//!
//! ## Example: Wrong (won't compile)
//!
//! ```compile_fail
//! use marmoset_core::Context;
//! use std::thread;
//!
//! let ctx = Context::new().unwrap();
//! thread::spawn(move || {
//!     ctx.evaluate(b"1 + 1"); // Error: Context is !Send
//! });
//! ```
//!
//! ## Example: Correct
//!
//! ```
//! use marmoset_core::{Context, FrontendContext};
//! use std::thread;
//!
//! let frontend = FrontendContext::new().unwrap();
//! let stencil = frontend.compile_to_stencil("add.js", b"1 + 2").unwrap();
//!
//! thread::spawn(move || {
//!     let ctx = Context::new().unwrap();
//!     assert_eq!(ctx.execute_stencil(&stencil).unwrap().to_int32(), 3);
//! })
//! .join()
//! .unwrap();
//! ```

mod array;
mod attributes;
mod builtins;
mod callback;
pub mod config;
mod context;
mod error;
mod exception;
mod function;
pub mod json;
mod map;
mod object;
pub mod registry;
mod script;
mod set;
mod stencil;
mod string;
mod value;

use std::ffi::CStr;

pub use array::Array;
pub use attributes::PropertyAttributes;
pub use callback::Callback;
pub use config::{ContextOptions, FrontendOptions};
pub use context::{Context, EVALUATE_FILENAME, InterruptHandle};
pub use error::{Error, ErrorKind, JsError, Result};
pub use function::Function;
pub use map::Map;
pub use object::Object;
pub use registry::{ContextRef, Registry};
pub use script::Script;
pub use set::Set;
pub use stencil::{FrontendContext, Stencil};
pub use value::Value;

// Re-export the raw bindings for direct FFI access when needed
pub use rquickjs_sys;

/// Engine version string
pub fn version() -> String {
    // SAFETY: the engine returns a static NUL-terminated string
    unsafe { CStr::from_ptr(rquickjs_sys::JS_GetVersion()) }
        .to_string_lossy()
        .into_owned()
}

/// Process-level engine initialization
///
/// The engine keeps no process-wide state, so this does nothing. It exists
/// so embedders can keep an init/shutdown pair around the engine's lifetime.
pub fn init() {}

/// Process-level engine shutdown; see [`init`]
pub fn shutdown() {}
