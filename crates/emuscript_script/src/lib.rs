//! Emuscript Scripting Bridge
//!
//! Embeds JavaScript (QuickJS) in the emulator's debugger and lets scripts
//! observe and influence emulation state.
//!
//! ## Architecture
//!
//! - **Session:** one loaded script; lazily starts its interpreter on the
//!   first frame and tears it down when the script ends.
//! - **Registry:** maps the runtime executing on this thread back to its
//!   session, so native entry points need no session parameter.
//! - **Snapshots:** frame-memory and screen buffers refreshed once per frame.
//! - **Deferred loads:** save-state loads requested by scripts are applied
//!   from the host's memory-access hook, never on the script's stack.
//! - **API:** the `emu` object scripts call into (see `api`).

pub mod adapter;
pub mod api;
pub mod callbacks;
pub mod deferred;
mod error;
pub mod ffi;
pub mod input;
pub mod log_sink;
pub mod manager;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod snapshot;

pub use error::BridgeError;
pub use ffi::{RuntimeHandle, ScriptId, SnapshotHandle};
pub use manager::ScriptManager;
pub use session::{Session, SessionState};

pub use rquickjs;
