use crate::ffi::{RuntimeHandle, ScriptId};
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to the host by the scripting bridge.
///
/// Failures inside script code are not errors at this level; they are
/// captured and written to the session log.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("script '{name}' is already loaded in this session")]
    AlreadyLoaded { name: String },

    #[error("runtime {handle} is already owned by another live session")]
    RuntimeBusy { handle: RuntimeHandle },

    #[error("interpreter error: {0}")]
    Interpreter(#[from] rquickjs::Error),

    #[error("failed to read script '{path}': {source}")]
    ReadScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rendered frame {width}x{height} exceeds the screen buffer capacity of {capacity} pixels")]
    ScreenOverflow {
        width: u32,
        height: u32,
        capacity: usize,
    },

    #[error("{0} is not loaded")]
    UnknownScript(ScriptId),
}
