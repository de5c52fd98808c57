//! Property attribute flags used by the `define_*` operations

use std::os::raw::c_int;

use bitflags::bitflags;
use rquickjs_sys as qjs;

bitflags! {
    /// Attributes of a defined property
    ///
    /// The empty set (`DEFAULT`) defines a writable, configurable,
    /// non-enumerable property.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyAttributes: u8 {
        /// Visible to `for..in` and `Object.keys`
        const ENUMERATE = 1 << 1;
        /// Assignments fail
        const READ_ONLY = 1 << 2;
        /// Cannot be deleted or redefined
        const PERMANENT = 1 << 3;
    }
}

impl PropertyAttributes {
    pub const DEFAULT: Self = Self::empty();

    /// Check if an attribute is set
    pub fn has(self, attr: Self) -> bool {
        self.intersects(attr)
    }

    /// Engine define flags; failures always throw instead of returning false
    pub(crate) fn engine_flags(self) -> c_int {
        let mut flags = qjs::JS_PROP_THROW;
        if !self.contains(Self::READ_ONLY) {
            flags |= qjs::JS_PROP_WRITABLE;
        }
        if !self.contains(Self::PERMANENT) {
            flags |= qjs::JS_PROP_CONFIGURABLE;
        }
        if self.contains(Self::ENUMERATE) {
            flags |= qjs::JS_PROP_ENUMERABLE;
        }
        flags as c_int
    }
}
