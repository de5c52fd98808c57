//! Built-in collection functions captured when a context is created
//!
//! `Map` and `Set` handles call these captured functions directly with the
//! collection as receiver. Script can reassign `globalThis.Map` or shadow
//! `has` on an instance without changing what the host observes.

use rquickjs_sys as qjs;
use scopeguard::ScopeGuard;

use crate::error::{Error, Result};
use crate::exception::take_exception;
use crate::string::c_name;

const MAP_METHODS: &[&str] = &["has", "get", "set", "delete", "clear", "keys", "values", "entries"];
const SET_METHODS: &[&str] = &["has", "add", "delete", "clear", "keys", "values", "entries"];

/// Constructor, `size` getter and prototype methods of one collection type
pub(crate) struct Collection {
    name: &'static str,
    constructor: qjs::JSValue,
    size: qjs::JSValue,
    methods: Vec<(&'static str, qjs::JSValue)>,
}

impl Collection {
    /// # Safety
    /// `ctx` must be a live context whose global object has not been touched
    /// by user script.
    unsafe fn capture(
        ctx: *mut qjs::JSContext,
        global: qjs::JSValue,
        name: &'static str,
        methods: &[&'static str],
    ) -> Result<Self> {
        let mut collection = scopeguard::guard(
            Collection {
                name,
                constructor: qjs::JS_UNDEFINED,
                size: qjs::JS_UNDEFINED,
                methods: Vec::with_capacity(methods.len()),
            },
            // SAFETY: everything captured so far belongs to ctx
            |partial| unsafe { partial.free(ctx) },
        );

        // SAFETY: ctx is live; every value read here is owned and tracked by
        // the guard until capture completes
        unsafe {
            collection.constructor = property(ctx, global, name)?;
            let prototype = property(ctx, collection.constructor, "prototype")?;
            let prototype = scopeguard::guard(prototype, |p| qjs::JS_FreeValue(ctx, p));

            collection.size = getter(ctx, *prototype, "size")?;
            for method in methods {
                let function = property(ctx, *prototype, method)?;
                collection.methods.push((*method, function));
            }
        }

        Ok(ScopeGuard::into_inner(collection))
    }

    pub(crate) fn constructor(&self) -> qjs::JSValue {
        self.constructor
    }

    pub(crate) fn size(&self) -> qjs::JSValue {
        self.size
    }

    pub(crate) fn method(&self, name: &str) -> Result<qjs::JSValue> {
        self.methods
            .iter()
            .find(|(method, _)| *method == name)
            .map(|(_, function)| *function)
            .ok_or_else(|| Error::binding(format!("{}.prototype.{} is not captured", self.name, name)))
    }

    /// # Safety
    /// `ctx` must be the context the functions were captured from.
    unsafe fn free(&self, ctx: *mut qjs::JSContext) {
        // SAFETY: each captured value holds one reference owned by this struct
        unsafe {
            qjs::JS_FreeValue(ctx, self.constructor);
            qjs::JS_FreeValue(ctx, self.size);
            for (_, function) in &self.methods {
                qjs::JS_FreeValue(ctx, *function);
            }
        }
    }
}

/// Pristine `Map` and `Set` functions of one context
pub(crate) struct Builtins {
    pub(crate) map: Collection,
    pub(crate) set: Collection,
}

impl Builtins {
    /// Capture the collection built-ins of a freshly created context
    ///
    /// # Safety
    /// `ctx` must be live and must not have run any user script yet.
    pub(crate) unsafe fn capture(ctx: *mut qjs::JSContext) -> Result<Self> {
        // SAFETY: the global object reference is released before returning
        unsafe {
            let global = qjs::JS_GetGlobalObject(ctx);
            let global = scopeguard::guard(global, |g| qjs::JS_FreeValue(ctx, g));
            let map = Collection::capture(ctx, *global, "Map", MAP_METHODS)?;
            let map = scopeguard::guard(map, |m| m.free(ctx));
            let set = Collection::capture(ctx, *global, "Set", SET_METHODS)?;
            Ok(Self {
                map: ScopeGuard::into_inner(map),
                set,
            })
        }
    }

    /// Release every captured function; must run before the context is freed
    ///
    /// # Safety
    /// `ctx` must be the context the built-ins were captured from.
    pub(crate) unsafe fn free(&self, ctx: *mut qjs::JSContext) {
        // SAFETY: forwarded from the caller
        unsafe {
            self.map.free(ctx);
            self.set.free(ctx);
        }
    }
}

unsafe fn property(ctx: *mut qjs::JSContext, object: qjs::JSValue, name: &str) -> Result<qjs::JSValue> {
    let name = c_name(name)?;
    // SAFETY: ctx and object are live; the result is owned by the caller
    unsafe {
        let value = qjs::JS_GetPropertyStr(ctx, object, name.as_ptr());
        if qjs::JS_IsException(value) {
            return Err(take_exception(ctx));
        }
        Ok(value)
    }
}

/// Read the getter of an own accessor property
unsafe fn getter(ctx: *mut qjs::JSContext, object: qjs::JSValue, name: &str) -> Result<qjs::JSValue> {
    let atom_name = c_name(name)?;
    // SAFETY: a zeroed descriptor holds only int-tagged values; the engine
    // fills every field on success and value and setter are released here
    unsafe {
        let atom = qjs::JS_NewAtom(ctx, atom_name.as_ptr());
        let mut desc: qjs::JSPropertyDescriptor = std::mem::zeroed();
        let rc = qjs::JS_GetOwnProperty(ctx, &mut desc, object, atom);
        qjs::JS_FreeAtom(ctx, atom);
        if rc < 0 {
            return Err(take_exception(ctx));
        }
        if rc == 0 {
            return Err(Error::binding(format!("missing accessor {}", name)));
        }
        qjs::JS_FreeValue(ctx, desc.value);
        qjs::JS_FreeValue(ctx, desc.setter);
        Ok(desc.getter)
    }
}
