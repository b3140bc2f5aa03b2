//! Deferred save-state loads
//!
//! A script may ask for a state load at any time, but the load is only
//! applied from the host's memory-access hook, once the emulated CPU is
//! at a consistent boundary. One slot: a newer request replaces an older
//! one that has not been applied yet.

use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct DeferredMutation {
    pending: Option<PathBuf>,
    hook_armed: bool,
}

impl DeferredMutation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `path` as the pending load.
    ///
    /// Returns `true` when the access hook must be armed by the caller.
    pub fn request(&mut self, path: PathBuf) -> bool {
        self.pending = Some(path);
        let arm = !self.hook_armed;
        self.hook_armed = true;
        arm
    }

    /// Take the pending load and mark the hook disarmed in the same step.
    pub fn take(&mut self) -> Option<PathBuf> {
        let path = self.pending.take()?;
        self.hook_armed = false;
        Some(path)
    }

    /// Drop any pending request. Returns `true` if the hook was armed.
    pub fn cancel(&mut self) -> bool {
        self.pending = None;
        std::mem::replace(&mut self.hook_armed, false)
    }

    pub fn pending(&self) -> Option<&Path> {
        self.pending.as_deref()
    }
}
