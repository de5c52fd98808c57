//! Array handles

use std::fmt;
use std::ops::Deref;

use rquickjs_sys as qjs;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::value::Value;

/// A JavaScript array
#[repr(transparent)]
pub struct Array<'ctx> {
    object: Object<'ctx>,
}

impl<'ctx> Array<'ctx> {
    /// Create an array holding `values` in order
    pub fn new(ctx: &'ctx Context, values: &[&Value<'_>]) -> Result<Self> {
        for value in values {
            ctx.ensure_owns(value)?;
        }
        let items: Vec<qjs::JSValue> = values
            .iter()
            // SAFETY: value is live in ctx; the array takes the duplicate
            .map(|value| unsafe { qjs::JS_DupValue(ctx.raw(), value.raw()) })
            .collect();
        // SAFETY: items holds owned references, all consumed by the call
        let raw = unsafe { qjs::JS_NewArrayFrom(ctx.raw(), items.len() as _, items.as_ptr()) };
        let object = ctx.value_from(raw)?.into_object()?;
        Ok(Self { object })
    }

    /// Number of elements; zero if the length cannot be read
    pub fn length(&self) -> usize {
        let ctx = self.context();
        let mut length: i64 = 0;
        // SAFETY: ctx and the array are live; length is a valid out pointer
        let rc = unsafe { qjs::JS_GetLength(ctx.raw(), self.raw(), &mut length) };
        if rc < 0 {
            ctx.discard_exception();
            return 0;
        }
        length.max(0) as usize
    }

    /// View as an object
    pub fn as_object(&self) -> &Object<'ctx> {
        &self.object
    }

    pub fn into_object(self) -> Object<'ctx> {
        self.object
    }

    pub fn release(self) {
        drop(self);
    }
}

impl<'ctx> Deref for Array<'ctx> {
    type Target = Object<'ctx>;

    fn deref(&self) -> &Object<'ctx> {
        &self.object
    }
}

impl<'ctx> TryFrom<Value<'ctx>> for Array<'ctx> {
    type Error = Error;

    fn try_from(value: Value<'ctx>) -> Result<Self> {
        if !value.is_array() {
            return Err(Error::Cast {
                expected: "an Array",
            });
        }
        Ok(Self {
            object: value.into_object()?,
        })
    }
}

impl<'ctx> From<Array<'ctx>> for Value<'ctx> {
    fn from(array: Array<'ctx>) -> Self {
        array.object.into_value()
    }
}

impl fmt::Debug for Array<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Array(len={})", self.length())
    }
}
