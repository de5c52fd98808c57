//! Object handles and property access

use std::fmt;
use std::ops::Deref;

use rquickjs_sys as qjs;

use crate::context::Context;
use crate::error::{Error, Result, ResultExt};
use crate::string::c_name;
use crate::value::Value;

/// A JavaScript object
///
/// A checked view over a [`Value`] known to be an object. Derefs to
/// [`Value`], so every predicate and conversion is available.
///
/// Like every handle it stays on the context's thread:
///
/// ```compile_fail
/// use marmoset_core::{Context, Object};
///
/// fn assert_send<T: Send>(_: T) {}
///
/// let ctx = Context::new().unwrap();
/// let object = Object::new(&ctx).unwrap();
/// assert_send(object); // Error: Object is !Send
/// ```
#[repr(transparent)]
pub struct Object<'ctx> {
    value: Value<'ctx>,
}

impl<'ctx> Object<'ctx> {
    /// Create an empty plain object
    pub fn new(ctx: &'ctx Context) -> Result<Self> {
        // SAFETY: ctx is live; JS_NewObject returns an owned reference
        let raw = unsafe { qjs::JS_NewObject(ctx.raw()) };
        ctx.value_from(raw).map(Self::from_value)
    }

    pub(crate) fn from_value(value: Value<'ctx>) -> Self {
        Self { value }
    }

    /// Reinterpret a value reference as an object reference
    ///
    /// # Safety
    /// `value` must hold an object.
    pub(crate) unsafe fn from_value_ref<'a>(value: &'a Value<'ctx>) -> &'a Self {
        // SAFETY: Object is repr(transparent) over Value
        unsafe { &*(value as *const Value<'ctx> as *const Self) }
    }

    /// View as a plain value
    pub fn as_value(&self) -> &Value<'ctx> {
        &self.value
    }

    /// Convert back into a plain value
    pub fn into_value(self) -> Value<'ctx> {
        self.value
    }

    /// Release the handle now instead of at end of scope
    pub fn release(self) {
        drop(self);
    }

    fn ctx(&self) -> &'ctx Context {
        self.value.context()
    }

    /// Check if the object has a property, own or inherited
    ///
    /// Returns `false` if the lookup throws (for example on a revoked proxy).
    pub fn has(&self, name: &str) -> bool {
        let Ok(name) = c_name(name) else {
            return false;
        };
        let ctx = self.ctx();
        // SAFETY: ctx and the object are live; the atom is freed before returning
        let rc = unsafe {
            let atom = qjs::JS_NewAtom(ctx.raw(), name.as_ptr());
            let rc = qjs::JS_HasProperty(ctx.raw(), self.raw(), atom);
            qjs::JS_FreeAtom(ctx.raw(), atom);
            rc
        };
        self.presence(rc)
    }

    /// Get a property value
    pub fn get(&self, name: &str) -> Result<Value<'ctx>> {
        let ctx = self.ctx();
        let name = c_name(name).op("get property")?;
        // SAFETY: ctx and the object are live
        let raw = unsafe { qjs::JS_GetPropertyStr(ctx.raw(), self.raw(), name.as_ptr()) };
        ctx.value_from(raw).op("get property")
    }

    /// Set a property value
    pub fn set(&self, name: &str, value: &Value<'_>) -> Result<()> {
        let ctx = self.ctx();
        ctx.ensure_owns(value).op("set property")?;
        let name = c_name(name).op("set property")?;
        // SAFETY: both values are live in ctx; the setter consumes the duplicate
        let rc = unsafe {
            qjs::JS_SetPropertyStr(
                ctx.raw(),
                self.raw(),
                name.as_ptr(),
                qjs::JS_DupValue(ctx.raw(), value.raw()),
            )
        };
        ctx.status(rc).op("set property")
    }

    /// Delete a property; deleting a missing property succeeds
    ///
    /// Like a sloppy-mode `delete`, a permanent property is left in place
    /// without an error.
    pub fn delete(&self, name: &str) -> Result<()> {
        let ctx = self.ctx();
        let name = c_name(name).op("delete property")?;
        // SAFETY: ctx and the object are live; the atom is freed before returning
        let rc = unsafe {
            let atom = qjs::JS_NewAtom(ctx.raw(), name.as_ptr());
            let rc = qjs::JS_DeleteProperty(ctx.raw(), self.raw(), atom, 0);
            qjs::JS_FreeAtom(ctx.raw(), atom);
            rc
        };
        ctx.status(rc).op("delete property")
    }

    /// Call the method stored under `name` with this object as receiver
    pub fn call(&self, name: &str, args: &[&Value<'ctx>]) -> Result<Value<'ctx>> {
        let property = self.get(name)?;
        let function = property.as_function().op("get function")?;
        function.call(self, args)
    }

    /// Check if the object has an indexed element
    pub fn has_element(&self, index: u32) -> bool {
        let ctx = self.ctx();
        // SAFETY: ctx and the object are live; the atom is freed before returning
        let rc = unsafe {
            let atom = qjs::JS_NewAtomUInt32(ctx.raw(), index);
            let rc = qjs::JS_HasProperty(ctx.raw(), self.raw(), atom);
            qjs::JS_FreeAtom(ctx.raw(), atom);
            rc
        };
        self.presence(rc)
    }

    /// Get an indexed element
    pub fn get_element(&self, index: u32) -> Result<Value<'ctx>> {
        let ctx = self.ctx();
        // SAFETY: ctx and the object are live
        let raw = unsafe { qjs::JS_GetPropertyUint32(ctx.raw(), self.raw(), index) };
        ctx.value_from(raw).op("get element")
    }

    /// Set an indexed element
    pub fn set_element(&self, index: u32, value: &Value<'_>) -> Result<()> {
        let ctx = self.ctx();
        ctx.ensure_owns(value).op("set element")?;
        // SAFETY: both values are live in ctx; the setter consumes the duplicate
        let rc = unsafe {
            qjs::JS_SetPropertyUint32(
                ctx.raw(),
                self.raw(),
                index,
                qjs::JS_DupValue(ctx.raw(), value.raw()),
            )
        };
        ctx.status(rc).op("set element")
    }

    /// Delete an indexed element; deleting a missing element succeeds
    pub fn delete_element(&self, index: u32) -> Result<()> {
        let ctx = self.ctx();
        // SAFETY: ctx and the object are live; the atom is freed before returning
        let rc = unsafe {
            let atom = qjs::JS_NewAtomUInt32(ctx.raw(), index);
            let rc = qjs::JS_DeleteProperty(ctx.raw(), self.raw(), atom, 0);
            qjs::JS_FreeAtom(ctx.raw(), atom);
            rc
        };
        ctx.status(rc).op("delete element")
    }

    fn presence(&self, rc: i32) -> bool {
        if rc < 0 {
            self.ctx().discard_exception();
            return false;
        }
        rc != 0
    }
}

impl<'ctx> Deref for Object<'ctx> {
    type Target = Value<'ctx>;

    fn deref(&self) -> &Value<'ctx> {
        &self.value
    }
}

impl<'ctx> From<Object<'ctx>> for Value<'ctx> {
    fn from(object: Object<'ctx>) -> Self {
        object.value
    }
}

impl<'ctx> TryFrom<Value<'ctx>> for Object<'ctx> {
    type Error = Error;

    fn try_from(value: Value<'ctx>) -> Result<Self> {
        value.into_object()
    }
}

impl Clone for Object<'_> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
        }
    }
}

impl fmt::Debug for Object<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PropertyAttributes;

    #[test]
    fn test_get_set_has_delete() {
        let ctx = Context::new().unwrap();
        let object = Object::new(&ctx).unwrap();
        assert!(!object.has("name"));

        let value = Value::string(&ctx, "marmoset").unwrap();
        object.set("name", &value).unwrap();
        assert!(object.has("name"));
        assert_eq!(object.get("name").unwrap().to_js_string(), "marmoset");

        object.delete("name").unwrap();
        assert!(!object.has("name"));
        assert!(object.get("name").unwrap().is_undefined());
    }

    #[test]
    fn test_delete_missing_property() {
        let ctx = Context::new().unwrap();
        let object = Object::new(&ctx).unwrap();
        object.delete("missing").unwrap();
        assert!(!object.has("missing"));
        object.delete_element(7).unwrap();
    }

    #[test]
    fn test_inherited_property() {
        let ctx = Context::new().unwrap();
        let object = Object::new(&ctx).unwrap();
        assert!(object.has("toString"));
    }

    #[test]
    fn test_elements() {
        let ctx = Context::new().unwrap();
        let object = Object::new(&ctx).unwrap();
        let value = Value::int32(&ctx, 10);
        object.set_element(3, &value).unwrap();

        assert!(object.has_element(3));
        assert!(!object.has_element(0));
        assert_eq!(object.get_element(3).unwrap().to_int32(), 10);

        object.delete_element(3).unwrap();
        assert!(!object.has_element(3));
    }

    #[test]
    fn test_getter_error_is_prefixed() {
        let ctx = Context::new().unwrap();
        let object = ctx
            .evaluate(b"({ get broken() { throw new TypeError('nope'); } })")
            .unwrap()
            .into_object()
            .unwrap();

        let err = object.get("broken").unwrap_err();
        assert_eq!(err.to_string(), "get property: nope");
        assert_eq!(err.js_error().unwrap().kind, crate::ErrorKind::TypeError);
    }

    #[test]
    fn test_call_method() {
        let ctx = Context::new().unwrap();
        let object = ctx
            .evaluate(b"({ base: 10, add(x) { return this.base + x; } })")
            .unwrap()
            .into_object()
            .unwrap();

        let arg = Value::int32(&ctx, 5);
        assert_eq!(object.call("add", &[&arg]).unwrap().to_int32(), 15);
    }

    #[test]
    fn test_call_non_function() {
        let ctx = Context::new().unwrap();
        let object = ctx.evaluate(b"({ value: 1 })").unwrap().into_object().unwrap();

        let err = object.call("value", &[]).unwrap_err();
        assert_eq!(err.to_string(), "get function: not a JS::Function");

        let err = object.call("missing", &[]).unwrap_err();
        assert_eq!(err.to_string(), "get function: not a JS::Function");
    }

    #[test]
    fn test_conversions() {
        let ctx = Context::new().unwrap();
        let object = Object::new(&ctx).unwrap();
        let value: Value = object.clone().into();
        assert!(value.is(&object));
        assert!(Object::try_from(Value::int32(&ctx, 1)).is_err());
        assert!(object.as_value().is_object());
    }

    #[test]
    fn test_call_reports_getter_error_unprefixed() {
        let ctx = Context::new().unwrap();
        let object = ctx
            .evaluate(b"({ get method() { throw new Error('no method'); } })")
            .unwrap()
            .into_object()
            .unwrap();

        let err = object.call("method", &[]).unwrap_err();
        assert_eq!(err.to_string(), "get property: no method");
    }

    #[test]
    fn test_delete_permanent_property() {
        let ctx = Context::new().unwrap();
        let object = Object::new(&ctx).unwrap();
        let value = Value::int32(&ctx, 1);
        ctx.define_property(&object, "fixed", &value, PropertyAttributes::PERMANENT)
            .unwrap();
        ctx.define_element(&object, 0, &value, PropertyAttributes::PERMANENT)
            .unwrap();

        object.delete("fixed").unwrap();
        object.delete_element(0).unwrap();
        assert!(object.has("fixed"));
        assert!(object.has_element(0));
    }
}
