//! `Set` collection handles

use std::fmt;
use std::ops::Deref;

use rquickjs_sys as qjs;

use crate::builtins::Collection;
use crate::context::Context;
use crate::error::{Error, Result, ResultExt};
use crate::object::Object;
use crate::value::Value;

/// A JavaScript `Set`
///
/// Operations use the built-in `Set.prototype` methods captured when the
/// context was created.
#[repr(transparent)]
pub struct Set<'ctx> {
    object: Object<'ctx>,
}

impl<'ctx> Set<'ctx> {
    /// Create an empty set
    pub fn new(ctx: &'ctx Context) -> Result<Self> {
        let value = ctx.construct_raw(ctx.builtins().set.constructor())?;
        Self::try_from(value)
    }

    fn builtins(&self) -> &'ctx Collection {
        &self.object.context().builtins().set
    }

    /// Call a captured `Set.prototype` method with this collection as receiver
    fn invoke(&self, method: &str, args: &[&Value<'ctx>]) -> Result<Value<'ctx>> {
        let function = self.builtins().method(method)?;
        self.object.context().call_raw(function, self.object.as_value(), args)
    }

    /// Number of members; zero if it cannot be read
    pub fn size(&self) -> usize {
        let ctx = self.object.context();
        ctx.call_raw(self.builtins().size(), self.object.as_value(), &[])
            .map(|size| size.to_number().max(0.0) as usize)
            .unwrap_or(0)
    }

    /// Check membership; `false` if the lookup fails
    pub fn has(&self, value: &Value<'ctx>) -> bool {
        self.invoke("has", &[value])
            .map(|found| found.to_boolean())
            .unwrap_or(false)
    }

    pub fn add(&self, value: &Value<'ctx>) -> Result<()> {
        self.invoke("add", &[value]).op("add set").map(drop)
    }

    /// Remove a member; removing an absent member succeeds
    pub fn delete(&self, value: &Value<'ctx>) -> Result<()> {
        self.invoke("delete", &[value])
            .op("delete set")
            .map(drop)
    }

    pub fn clear(&self) -> Result<()> {
        self.invoke("clear", &[]).op("clear set").map(drop)
    }

    /// Iterator over the members; same as [`Set::values`]
    pub fn keys(&self) -> Result<Value<'ctx>> {
        self.invoke("keys", &[]).op("set keys")
    }

    pub fn values(&self) -> Result<Value<'ctx>> {
        self.invoke("values", &[]).op("set values")
    }

    /// Iterator over `[member, member]` pairs
    pub fn entries(&self) -> Result<Value<'ctx>> {
        self.invoke("entries", &[]).op("set entries")
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

impl<'ctx> Deref for Set<'ctx> {
    type Target = Object<'ctx>;

    fn deref(&self) -> &Object<'ctx> {
        &self.object
    }
}

impl<'ctx> From<Set<'ctx>> for Value<'ctx> {
    fn from(set: Set<'ctx>) -> Self {
        set.object.into_value()
    }
}

impl<'ctx> TryFrom<Value<'ctx>> for Set<'ctx> {
    type Error = Error;

    fn try_from(value: Value<'ctx>) -> Result<Self> {
        // SAFETY: reading the class of a live value
        if !unsafe { qjs::JS_IsSet(value.raw()) } {
            return Err(Error::Cast {
                expected: "a Set",
            });
        }
        Ok(Self {
            object: Object::from_value(value),
        })
    }
}

impl fmt::Debug for Set<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Set(size={})", self.size())
    }
}
