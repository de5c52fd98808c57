//! Reference-counted handles to engine values

use std::fmt;
use std::mem::ManuallyDrop;

use rquickjs_sys as qjs;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::function::Function;
use crate::json;
use crate::object::Object;
use crate::string::{new_js_string, to_rust_string};

/// A JavaScript value
///
/// Holds one engine reference, which keeps the value alive across garbage
/// collections. Dropping the handle (or calling [`Value::release`]) gives the
/// reference back. The handle borrows its [`Context`], so it can never
/// outlive it.
///
/// # Thread Safety
///
/// This type is `!Send` and `!Sync` because it borrows a `!Sync` context.
///
/// ```compile_fail
/// use marmoset_core::{Context, Value};
///
/// fn assert_send<T: Send>(_: T) {}
///
/// let ctx = Context::new().unwrap();
/// let value = Value::int32(&ctx, 42);
/// assert_send(value); // Error: Value is !Send
/// ```
///
/// A value cannot outlive the context it belongs to:
///
/// ```compile_fail
/// use marmoset_core::Context;
///
/// let value = {
///     let ctx = Context::new().unwrap();
///     ctx.evaluate(b"1").unwrap()
/// }; // Error: `ctx` does not live long enough
/// ```
pub struct Value<'ctx> {
    raw: qjs::JSValue,
    ctx: &'ctx Context,
}

impl<'ctx> Value<'ctx> {
    /// Take ownership of an engine reference
    ///
    /// # Safety
    /// `raw` must be an owned reference belonging to `ctx`.
    pub(crate) unsafe fn from_raw(ctx: &'ctx Context, raw: qjs::JSValue) -> Self {
        Self { raw, ctx }
    }

    /// Add a reference to a borrowed engine value
    ///
    /// # Safety
    /// `raw` must be a live value belonging to `ctx`.
    pub(crate) unsafe fn from_borrowed(ctx: &'ctx Context, raw: qjs::JSValue) -> Self {
        // SAFETY: raw is live per caller contract
        let raw = unsafe { qjs::JS_DupValue(ctx.raw(), raw) };
        Self { raw, ctx }
    }

    /// Give up the handle without releasing its reference
    pub(crate) fn into_raw(self) -> qjs::JSValue {
        let this = ManuallyDrop::new(self);
        this.raw
    }

    /// Create `null`
    pub fn null(ctx: &'ctx Context) -> Self {
        Self { raw: qjs::JS_NULL, ctx }
    }

    /// Create `undefined`
    pub fn undefined(ctx: &'ctx Context) -> Self {
        Self {
            raw: qjs::JS_UNDEFINED,
            ctx,
        }
    }

    /// Create a boolean
    pub fn boolean(ctx: &'ctx Context, b: bool) -> Self {
        Self {
            raw: qjs::JS_MKVAL(qjs::JS_TAG_BOOL, i32::from(b)),
            ctx,
        }
    }

    /// Create a number
    ///
    /// Integral values in the int32 range are stored as int32.
    pub fn number(ctx: &'ctx Context, n: f64) -> Self {
        Self {
            raw: qjs::JS_NewFloat64(n),
            ctx,
        }
    }

    /// Create an int32 number
    pub fn int32(ctx: &'ctx Context, n: i32) -> Self {
        Self {
            raw: qjs::JS_MKVAL(qjs::JS_TAG_INT, n),
            ctx,
        }
    }

    /// Create a string
    pub fn string(ctx: &'ctx Context, s: &str) -> Result<Self> {
        // SAFETY: ctx is live for 'ctx
        let raw = unsafe { new_js_string(ctx.raw(), s) };
        ctx.value_from(raw)
    }

    /// Get the raw engine value
    pub fn raw(&self) -> qjs::JSValue {
        self.raw
    }

    /// Get the context this value belongs to
    pub fn context(&self) -> &'ctx Context {
        self.ctx
    }

    /// Release the handle now instead of at end of scope
    pub fn release(self) {
        drop(self);
    }

    fn tag(&self) -> i32 {
        // SAFETY: reading the tag of a live value
        unsafe { qjs::JS_VALUE_GET_TAG(self.raw) }
    }

    fn int_payload(&self) -> i32 {
        // SAFETY: only called on int and bool tagged values
        unsafe { qjs::JS_VALUE_GET_INT(self.raw) }
    }

    pub fn is_undefined(&self) -> bool {
        // SAFETY: raw is a live value
        unsafe { qjs::JS_IsUndefined(self.raw) }
    }

    pub fn is_null(&self) -> bool {
        // SAFETY: raw is a live value
        unsafe { qjs::JS_IsNull(self.raw) }
    }

    pub fn is_null_or_undefined(&self) -> bool {
        self.is_null() || self.is_undefined()
    }

    pub fn is_boolean(&self) -> bool {
        // SAFETY: raw is a live value
        unsafe { qjs::JS_IsBool(self.raw) }
    }

    /// Check if the value is the boolean `true`
    pub fn is_true(&self) -> bool {
        self.is_boolean() && self.int_payload() != 0
    }

    /// Check if the value is the boolean `false`
    pub fn is_false(&self) -> bool {
        self.is_boolean() && self.int_payload() == 0
    }

    pub fn is_number(&self) -> bool {
        // SAFETY: raw is a live value
        unsafe { qjs::JS_IsNumber(self.raw) }
    }

    /// Check if the value is a number stored as int32
    pub fn is_int32(&self) -> bool {
        self.tag() == qjs::JS_TAG_INT
    }

    pub fn is_string(&self) -> bool {
        // SAFETY: raw is a live value
        unsafe { qjs::JS_IsString(self.raw) }
    }

    pub fn is_symbol(&self) -> bool {
        // SAFETY: raw is a live value
        unsafe { qjs::JS_IsSymbol(self.raw) }
    }

    pub fn is_object(&self) -> bool {
        // SAFETY: raw is a live value
        unsafe { qjs::JS_IsObject(self.raw) }
    }

    pub fn is_function(&self) -> bool {
        // SAFETY: ctx and raw are live
        unsafe { qjs::JS_IsFunction(self.ctx.raw(), self.raw) }
    }

    pub fn is_array(&self) -> bool {
        // SAFETY: raw is a live value
        unsafe { qjs::JS_IsArray(self.raw) }
    }

    /// Check if two handles refer to the same value (SameValue semantics)
    pub fn is(&self, other: &Value<'_>) -> bool {
        if !self.ctx.same(other.ctx) {
            return false;
        }
        // SAFETY: both values belong to the same live context
        unsafe { qjs::JS_IsSameValue(self.ctx.raw(), self.raw, other.raw) }
    }

    /// Convert to a string using JS coercion; empty if coercion throws
    pub fn to_js_string(&self) -> String {
        // SAFETY: ctx and raw are live
        unsafe { to_rust_string(self.ctx.raw(), self.raw) }.unwrap_or_default()
    }

    /// Convert to a boolean using JS coercion
    pub fn to_boolean(&self) -> bool {
        // SAFETY: ctx and raw are live
        let rc = unsafe { qjs::JS_ToBool(self.ctx.raw(), self.raw) };
        if rc < 0 {
            self.ctx.discard_exception();
            return false;
        }
        rc != 0
    }

    /// Convert to a number using JS coercion; zero if coercion throws
    pub fn to_number(&self) -> f64 {
        let mut n = 0.0;
        // SAFETY: ctx and raw are live; n is a valid out pointer
        let rc = unsafe { qjs::JS_ToFloat64(self.ctx.raw(), &mut n, self.raw) };
        if rc < 0 {
            self.ctx.discard_exception();
            return 0.0;
        }
        n
    }

    /// Convert to an int32 using JS coercion; zero if coercion throws
    pub fn to_int32(&self) -> i32 {
        let mut n = 0;
        // SAFETY: ctx and raw are live; n is a valid out pointer
        let rc = unsafe { qjs::JS_ToInt32(self.ctx.raw(), &mut n, self.raw) };
        if rc < 0 {
            self.ctx.discard_exception();
            return 0;
        }
        n
    }

    /// JSON text of the value; empty for values JSON cannot represent
    pub fn to_json(&self) -> Result<String> {
        json::stringify(self)
    }

    /// Decode the value into a Rust type through its JSON form
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let text = self.to_json()?;
        Ok(serde_json::from_str(&text)?)
    }

    /// View this value as an object
    pub fn as_object(&self) -> Result<&Object<'ctx>> {
        if !self.is_object() {
            return Err(Error::not_object());
        }
        // SAFETY: Object is a transparent wrapper around Value
        Ok(unsafe { Object::from_value_ref(self) })
    }

    /// View this value as a function
    pub fn as_function(&self) -> Result<&Function<'ctx>> {
        if !self.is_function() {
            return Err(Error::not_function());
        }
        // SAFETY: Function is a transparent wrapper around Object, itself
        // transparent around Value
        Ok(unsafe { Function::from_value_ref(self) })
    }

    /// Convert into an object handle
    pub fn into_object(self) -> Result<Object<'ctx>> {
        if !self.is_object() {
            return Err(Error::not_object());
        }
        Ok(Object::from_value(self))
    }

    /// Convert into a function handle
    pub fn into_function(self) -> Result<Function<'ctx>> {
        if !self.is_function() {
            return Err(Error::not_function());
        }
        Ok(Function::from_object(Object::from_value(self)))
    }
}

impl Clone for Value<'_> {
    fn clone(&self) -> Self {
        // SAFETY: raw is live; the duplicate is an owned reference
        unsafe { Self::from_borrowed(self.ctx, self.raw) }
    }
}

impl Drop for Value<'_> {
    fn drop(&mut self) {
        // SAFETY: the handle owns exactly one reference to raw
        unsafe { qjs::JS_FreeValue(self.ctx.raw(), self.raw) }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_js_string())
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_string() {
            write!(f, "Value({:?})", self.to_js_string())
        } else if self.is_symbol() {
            write!(f, "Value(<symbol>)")
        } else {
            write!(f, "Value({})", self.to_js_string())
        }
    }
}

impl Serialize for Value<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let text = self.to_json().map_err(serde::ser::Error::custom)?;
        if text.is_empty() {
            return serializer.serialize_unit();
        }
        let value: serde_json::Value = serde_json::from_str(&text).map_err(serde::ser::Error::custom)?;
        value.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_and_predicates() {
        let ctx = Context::new().unwrap();

        assert!(Value::null(&ctx).is_null());
        assert!(Value::null(&ctx).is_null_or_undefined());
        assert!(Value::undefined(&ctx).is_undefined());
        assert!(Value::boolean(&ctx, true).is_true());
        assert!(Value::boolean(&ctx, false).is_false());
        assert!(!Value::int32(&ctx, 1).is_true());
        assert!(Value::int32(&ctx, 5).is_int32());
        assert!(Value::number(&ctx, 1.5).is_number());
        assert!(!Value::number(&ctx, 1.5).is_int32());
        assert!(Value::string(&ctx, "s").unwrap().is_string());
    }

    #[test]
    fn test_integral_number_is_int32() {
        let ctx = Context::new().unwrap();
        let two = Value::number(&ctx, 2.0);
        assert!(two.is_int32());
        assert_eq!(two.to_int32(), 2);
        assert!(!Value::number(&ctx, 2.5).is_int32());
        assert!(!Value::number(&ctx, 1e12).is_int32());
    }

    #[test]
    fn test_conversions() {
        let ctx = Context::new().unwrap();

        assert_eq!(Value::int32(&ctx, 123).to_int32(), 123);
        assert_eq!(Value::number(&ctx, 123.456).to_number(), 123.456);
        assert!(Value::boolean(&ctx, true).to_boolean());
        assert_eq!(Value::string(&ctx, "test").unwrap().to_js_string(), "test");

        // coercion, not validation
        assert_eq!(Value::string(&ctx, "42").unwrap().to_int32(), 42);
        assert!(!Value::string(&ctx, "").unwrap().to_boolean());
        assert_eq!(Value::null(&ctx).to_js_string(), "null");
        assert!(Value::undefined(&ctx).to_number().is_nan());
    }

    #[test]
    fn test_symbol_coercion_degrades() {
        let ctx = Context::new().unwrap();
        let symbol = ctx.evaluate(b"Symbol('s')").unwrap();
        assert!(symbol.is_symbol());
        assert_eq!(symbol.to_number(), 0.0);
        assert_eq!(symbol.to_int32(), 0);

        // the swallowed coercion error must not leak into the next call
        assert_eq!(ctx.evaluate(b"1").unwrap().to_int32(), 1);
    }

    #[test]
    fn test_display_and_debug() {
        let ctx = Context::new().unwrap();
        let value = Value::string(&ctx, "hello").unwrap();
        assert_eq!(format!("{}", value), "hello");
        assert_eq!(format!("{:?}", value), "Value(\"hello\")");
        assert_eq!(format!("{:?}", Value::int32(&ctx, 3)), "Value(3)");
    }

    #[test]
    fn test_is_identity() {
        let ctx = Context::new().unwrap();
        let a = ctx.evaluate(b"globalThis.shared = {}; shared").unwrap();
        let b = ctx.evaluate(b"shared").unwrap();
        let c = ctx.evaluate(b"({})").unwrap();
        assert!(a.is(&b));
        assert!(!a.is(&c));
        assert!(a.is(&a.clone()));
    }

    #[test]
    fn test_casts() {
        let ctx = Context::new().unwrap();
        let number = Value::int32(&ctx, 1);
        assert_eq!(number.as_object().unwrap_err().to_string(), "not an JS::Object");

        let object = ctx.evaluate(b"({})").unwrap();
        assert!(object.as_object().is_ok());
        assert_eq!(object.as_function().unwrap_err().to_string(), "not a JS::Function");

        let function = ctx.evaluate(b"(() => 1)").unwrap();
        assert!(function.as_function().is_ok());
        assert!(function.into_function().is_ok());
    }

    #[test]
    fn test_json_and_serde() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Point {
            x: i32,
            y: i32,
        }

        let ctx = Context::new().unwrap();
        let value = ctx.evaluate(b"({ x: 1, y: 2 })").unwrap();
        assert_eq!(value.to_json().unwrap(), r#"{"x":1,"y":2}"#);
        assert_eq!(value.deserialize::<Point>().unwrap(), Point { x: 1, y: 2 });

        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, serde_json::json!({ "x": 1, "y": 2 }));
        assert_eq!(serde_json::to_value(Value::undefined(&ctx)).unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn test_release_and_clone() {
        let ctx = Context::new().unwrap();
        let value = ctx.evaluate(b"[1, 2, 3]").unwrap();
        let copy = value.clone();
        value.release();
        assert_eq!(copy.to_js_string(), "1,2,3");
    }
}
