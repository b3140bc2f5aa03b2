//! Process-wide session registry
//!
//! Native entry points carry no session parameter. While the bridge runs
//! interpreter code it marks the runtime as active on the calling thread;
//! entry points then look the active runtime up here.
//!
//! Entries hold weak references: the host's script manager owns sessions,
//! and a session that is being dropped can no longer be resolved.

use crate::ffi::RuntimeHandle;
use crate::BridgeError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::cell::Cell;
use std::sync::{Arc, Weak};

pub struct SessionRegistry<T> {
    entries: DashMap<RuntimeHandle, Weak<T>>,
}

impl<T> SessionRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Associate `handle` with `session`.
    ///
    /// Fails if the handle already belongs to another live session.
    pub fn register(&self, handle: RuntimeHandle, session: &Weak<T>) -> Result<(), BridgeError> {
        match self.entries.entry(handle) {
            Entry::Occupied(mut occupied) => {
                let owner = occupied.get();
                if owner.strong_count() > 0 && !owner.ptr_eq(session) {
                    return Err(BridgeError::RuntimeBusy { handle });
                }
                occupied.insert(session.clone());
            }
            Entry::Vacant(vacant) => {
                vacant.insert(session.clone());
            }
        }
        Ok(())
    }

    /// Remove every entry owned by `session`, whatever its handle.
    pub fn unregister(&self, session: *const T) {
        self.entries
            .retain(|_, owner| !std::ptr::eq(owner.as_ptr(), session));
    }

    pub fn resolve(&self, handle: RuntimeHandle) -> Option<Arc<T>> {
        self.entries.get(&handle).and_then(|owner| owner.upgrade())
    }
}

impl<T> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

static SESSIONS: Lazy<SessionRegistry<crate::Session>> = Lazy::new(SessionRegistry::new);

/// The registry shared by every session in the process.
pub fn sessions() -> &'static SessionRegistry<crate::Session> {
    &SESSIONS
}

thread_local! {
    static ACTIVE: Cell<Option<RuntimeHandle>> = const { Cell::new(None) };
}

/// Runtime whose code is executing on this thread, if any.
pub fn active_handle() -> Option<RuntimeHandle> {
    ACTIVE.with(Cell::get)
}

/// Session of the script currently calling into the bridge on this thread.
pub fn current() -> Option<Arc<crate::Session>> {
    active_handle().and_then(|handle| sessions().resolve(handle))
}

/// Marks a runtime active on this thread until dropped.
///
/// Scopes nest: dropping restores whatever was active before.
pub(crate) struct ActiveScope {
    previous: Option<RuntimeHandle>,
}

impl ActiveScope {
    pub(crate) fn enter(handle: RuntimeHandle) -> Self {
        let previous = ACTIVE.with(|active| active.replace(Some(handle)));
        Self { previous }
    }
}

impl Drop for ActiveScope {
    fn drop(&mut self) {
        ACTIVE.with(|active| active.set(self.previous));
    }
}
