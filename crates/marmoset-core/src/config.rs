//! Construction options for execution and frontend contexts.
//!
//! Options are captured when a context is created and never change
//! afterwards. A value of `0` leaves the engine default in place.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Smallest native stack size accepted when one is configured.
pub const MIN_NATIVE_STACK_SIZE: usize = 16 * 1024;

/// Options applied before an execution context is allocated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    /// Heap ceiling in bytes. Allocation beyond it fails with an out-of-memory error.
    /// Default: 0 (unlimited)
    pub heap_max_bytes: usize,

    /// Native stack size in bytes available to the engine.
    /// Default: 0 (engine default, 1 MiB)
    pub native_stack_size: usize,

    /// Heap size in bytes that triggers a garbage collection.
    /// Default: 0 (engine default)
    pub gc_max_bytes: usize,

    /// Enable incremental garbage collection.
    /// Default: false
    pub gc_incremental_enabled: bool,

    /// Time budget of one incremental GC slice.
    /// Default: zero (engine default)
    #[serde(with = "millis")]
    pub gc_slice_time_budget: Duration,
}

impl ContextOptions {
    /// Create options with engine defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heap_max_bytes(mut self, max: usize) -> Self {
        self.heap_max_bytes = max;
        self
    }

    pub fn native_stack_size(mut self, size: usize) -> Self {
        self.native_stack_size = size;
        self
    }

    pub fn gc_max_bytes(mut self, max: usize) -> Self {
        self.gc_max_bytes = max;
        self
    }

    pub fn gc_incremental_enabled(mut self, enabled: bool) -> Self {
        self.gc_incremental_enabled = enabled;
        self
    }

    pub fn gc_slice_time_budget(mut self, budget: Duration) -> Self {
        self.gc_slice_time_budget = budget;
        self
    }

    /// Check the options before any engine resource is allocated.
    pub fn validate(&self) -> Result<()> {
        validate_stack_size(self.native_stack_size)?;
        if self.heap_max_bytes != 0 && self.gc_max_bytes > self.heap_max_bytes {
            return Err(Error::binding(format!(
                "invalid options: GC ceiling ({} bytes) exceeds heap ceiling ({} bytes)",
                self.gc_max_bytes, self.heap_max_bytes
            )));
        }
        Ok(())
    }
}

/// Options applied before a frontend (compile-only) context is allocated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FrontendOptions {
    /// Native stack size in bytes available to the compiler.
    /// Default: 0 (engine default)
    pub native_stack_size: usize,
}

impl FrontendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn native_stack_size(mut self, size: usize) -> Self {
        self.native_stack_size = size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_stack_size(self.native_stack_size)
    }
}

fn validate_stack_size(size: usize) -> Result<()> {
    if size != 0 && size < MIN_NATIVE_STACK_SIZE {
        return Err(Error::binding(format!(
            "invalid options: native stack size {} is below {} bytes",
            size, MIN_NATIVE_STACK_SIZE
        )));
    }
    Ok(())
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
