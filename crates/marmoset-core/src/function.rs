//! Function handles and host function construction

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use tracing::trace;

use crate::callback::new_function_object;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::value::Value;

/// A callable JavaScript object
#[repr(transparent)]
pub struct Function<'ctx> {
    object: Object<'ctx>,
}

impl<'ctx> Function<'ctx> {
    /// Create a host function object backed by `callback`
    ///
    /// The callback is registered in the context's callback table under
    /// `name`; a later registration under the same name replaces it for every
    /// function object created with that name.
    pub fn new<F>(ctx: &'ctx Context, name: &str, callback: F) -> Result<Self>
    where
        F: for<'c> Fn(&'c Context, &[Value<'c>]) -> Result<Option<Value<'c>>>
            + Send
            + Sync
            + 'static,
    {
        let raw = new_function_object(ctx, name, 0)?;
        // SAFETY: raw is an owned function object of ctx
        let value = unsafe { Value::from_raw(ctx, raw) };
        ctx.state().register_callback(name, Arc::new(callback));
        trace!(context_ref = ctx.id(), function = name, "host function created");
        Ok(Self::from_object(Object::from_value(value)))
    }

    pub(crate) fn from_object(object: Object<'ctx>) -> Self {
        Self { object }
    }

    /// Reinterpret a value reference as a function reference
    ///
    /// # Safety
    /// `value` must hold a function.
    pub(crate) unsafe fn from_value_ref<'a>(value: &'a Value<'ctx>) -> &'a Self {
        // SAFETY: Function and Object are both repr(transparent) over Value
        unsafe { &*(value as *const Value<'ctx> as *const Self) }
    }

    /// Call the function with an explicit receiver
    pub fn call(&self, receiver: &Value<'ctx>, args: &[&Value<'ctx>]) -> Result<Value<'ctx>> {
        self.context().call_function_value(self, receiver, args)
    }

    /// View as an object
    pub fn as_object(&self) -> &Object<'ctx> {
        &self.object
    }

    pub fn into_object(self) -> Object<'ctx> {
        self.object
    }

    /// Release the handle now instead of at end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl<'ctx> Deref for Function<'ctx> {
    type Target = Object<'ctx>;

    fn deref(&self) -> &Object<'ctx> {
        &self.object
    }
}

impl<'ctx> From<Function<'ctx>> for Value<'ctx> {
    fn from(function: Function<'ctx>) -> Self {
        function.object.into_value()
    }
}

impl<'ctx> TryFrom<Value<'ctx>> for Function<'ctx> {
    type Error = Error;

    fn try_from(value: Value<'ctx>) -> Result<Self> {
        value.into_function()
    }
}

impl Clone for Function<'_> {
    fn clone(&self) -> Self {
        Self {
            object: self.object.clone(),
        }
    }
}

impl fmt::Debug for Function<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .get("name")
            .map(|name| name.to_js_string())
            .unwrap_or_default();
        write!(f, "Function({})", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_function_call() {
        let ctx = Context::new().unwrap();
        let add = Function::new(&ctx, "add", |ctx, args| {
            Ok(Some(Value::int32(ctx, args[0].to_int32() + args[1].to_int32())))
        })
        .unwrap();

        let a = Value::int32(&ctx, 1);
        let b = Value::int32(&ctx, 2);
        let undefined = Value::undefined(&ctx);
        assert_eq!(add.call(&undefined, &[&a, &b]).unwrap().to_int32(), 3);
        assert!(add.is_function());
        assert_eq!(format!("{:?}", add), "Function(add)");
    }

    #[test]
    fn test_script_function_call() {
        let ctx = Context::new().unwrap();
        let function = ctx
            .evaluate(b"(function greet(name) { return 'hi ' + name; })")
            .unwrap()
            .into_function()
            .unwrap();

        let name = Value::string(&ctx, "there").unwrap();
        let receiver = Value::null(&ctx);
        assert_eq!(function.call(&receiver, &[&name]).unwrap().to_js_string(), "hi there");
    }

    #[test]
    fn test_thrown_error_surfaces() {
        let ctx = Context::new().unwrap();
        let function = ctx
            .evaluate(b"(() => { throw new RangeError('out of range'); })")
            .unwrap()
            .into_function()
            .unwrap();

        let receiver = Value::undefined(&ctx);
        let err = function.call(&receiver, &[]).unwrap_err();
        let js = err.js_error().unwrap();
        assert_eq!(js.message, "out of range");
        assert_eq!(js.code, 1);
    }
}
