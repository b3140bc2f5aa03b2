//! Opaque handles crossing the script boundary
//!
//! Scripts only ever see plain numbers; these newtypes keep the host side
//! from confusing one kind of handle with another.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies the interpreter runtime a call is executing in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeHandle(u64);

static NEXT_RUNTIME: AtomicU64 = AtomicU64::new(1);

impl RuntimeHandle {
    /// Sentinel used by every session in shared-runtime mode.
    pub const SHARED: RuntimeHandle = RuntimeHandle(0);

    /// Allocate a handle that has never been used in this process.
    pub fn next() -> Self {
        RuntimeHandle(NEXT_RUNTIME.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_shared(self) -> bool {
        self == Self::SHARED
    }
}

impl fmt::Display for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_shared() {
            f.write_str("shared")
        } else {
            write!(f, "rt#{}", self.0)
        }
    }
}

/// Handle to a snapshot buffer owned by a session.
///
/// Allocated from a per-registry counter and never reused, so a stale
/// handle can never match a later registration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotHandle(u32);

impl SnapshotHandle {
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Value handed to scripts.
    #[inline]
    pub fn to_raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SnapshotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a script loaded into a [`crate::ScriptManager`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(pub u32);

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "script#{}", self.0)
    }
}
