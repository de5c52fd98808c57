//! `Map` collection handles

use std::fmt;
use std::ops::Deref;

use rquickjs_sys as qjs;

use crate::builtins::Collection;
use crate::context::Context;
use crate::error::{Error, Result, ResultExt};
use crate::object::Object;
use crate::value::Value;

/// A JavaScript `Map`
///
/// Every operation calls the built-in `Map.prototype` method captured when
/// the context was created, so keys compare with SameValueZero exactly as
/// they do in script and script-side overrides are not observed.
#[repr(transparent)]
pub struct Map<'ctx> {
    object: Object<'ctx>,
}

impl<'ctx> Map<'ctx> {
    /// Create an empty map
    pub fn new(ctx: &'ctx Context) -> Result<Self> {
        let value = ctx.construct_raw(ctx.builtins().map.constructor())?;
        Self::try_from(value)
    }

    fn builtins(&self) -> &'ctx Collection {
        &self.object.context().builtins().map
    }

    /// Call a captured `Map.prototype` method with this collection as receiver
    fn invoke(&self, method: &str, args: &[&Value<'ctx>]) -> Result<Value<'ctx>> {
        let function = self.builtins().method(method)?;
        self.object.context().call_raw(function, self.object.as_value(), args)
    }

    /// Number of entries; zero if it cannot be read
    pub fn size(&self) -> usize {
        let ctx = self.object.context();
        ctx.call_raw(self.builtins().size(), self.object.as_value(), &[])
            .map(|size| size.to_number().max(0.0) as usize)
            .unwrap_or(0)
    }

    /// Check if a key is present; `false` if the lookup fails
    pub fn has(&self, key: &Value<'ctx>) -> bool {
        self.invoke("has", &[key])
            .map(|found| found.to_boolean())
            .unwrap_or(false)
    }

    /// Get the value stored under `key`, `undefined` if absent
    pub fn get(&self, key: &Value<'ctx>) -> Result<Value<'ctx>> {
        self.invoke("get", &[key]).op("get map value")
    }

    /// Store `value` under `key`
    pub fn set(&self, key: &Value<'ctx>, value: &Value<'ctx>) -> Result<()> {
        self.invoke("set", &[key, value])
            .op("set map value")
            .map(drop)
    }

    /// Remove `key`; removing an absent key succeeds
    pub fn delete(&self, key: &Value<'ctx>) -> Result<()> {
        self.invoke("delete", &[key])
            .op("delete map value")
            .map(drop)
    }

    /// Remove every entry
    pub fn clear(&self) -> Result<()> {
        self.invoke("clear", &[]).op("clear map").map(drop)
    }

    /// Iterator over the keys, in insertion order
    pub fn keys(&self) -> Result<Value<'ctx>> {
        self.invoke("keys", &[]).op("map keys")
    }

    /// Iterator over the values, in insertion order
    pub fn values(&self) -> Result<Value<'ctx>> {
        self.invoke("values", &[]).op("map values")
    }

    /// Iterator over `[key, value]` pairs, in insertion order
    pub fn entries(&self) -> Result<Value<'ctx>> {
        self.invoke("entries", &[]).op("map entries")
    }

    pub fn as_object(&self) -> &Object<'ctx> {
        &self.object
    }

    pub fn as_value(&self) -> &Value<'ctx> {
        self.object.as_value()
    }

    pub fn release(self) {
        drop(self);
    }
}

impl<'ctx> Deref for Map<'ctx> {
    type Target = Object<'ctx>;

    fn deref(&self) -> &Object<'ctx> {
        &self.object
    }
}

impl<'ctx> From<Map<'ctx>> for Value<'ctx> {
    fn from(map: Map<'ctx>) -> Self {
        map.object.into_value()
    }
}

impl<'ctx> TryFrom<Value<'ctx>> for Map<'ctx> {
    type Error = Error;

    fn try_from(value: Value<'ctx>) -> Result<Self> {
        // SAFETY: reading the class of a live value
        if !unsafe { qjs::JS_IsMap(value.raw()) } {
            return Err(Error::Cast {
                expected: "a Map",
            });
        }
        Ok(Self {
            object: Object::from_value(value),
        })
    }
}

impl fmt::Debug for Map<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Map(size={})", self.size())
    }
}
