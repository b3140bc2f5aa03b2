//! Bridge configuration

use serde::{Deserialize, Serialize};

/// Default number of retained log entries per session.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Default screen buffer capacity in pixels. Large enough for the widest
/// filter output at the tallest supported frame.
pub const DEFAULT_SCREEN_CAPACITY: usize = 1024 * 960;

/// How sessions map onto interpreter runtimes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    /// One runtime per session; sessions may be live at the same time.
    #[default]
    Isolated,
    /// One process-wide runtime; only one session may hold it at a time.
    Shared,
}

/// Scripting bridge settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    pub log_capacity: usize,
    pub runtime_mode: RuntimeMode,
    /// Interpreter heap limit in bytes.
    pub memory_limit: Option<usize>,
    /// Interpreter stack limit in bytes.
    pub max_stack_size: Option<usize>,
    /// Fixed size of the shared screen buffer in pixels.
    pub screen_capacity: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_LOG_CAPACITY,
            runtime_mode: RuntimeMode::Isolated,
            memory_limit: None,
            max_stack_size: None,
            screen_capacity: DEFAULT_SCREEN_CAPACITY,
        }
    }
}
