//! Emuscript Core
//!
//! The vocabulary shared by the scripting bridge and the host emulator:
//! - Event kinds, memory kinds and CPU discriminators
//! - Video frame types handed from the PPU to the post-processing filter
//! - The external services the bridge consumes (`host`)
//! - Bridge configuration

pub mod error;
pub mod host;
pub mod settings;
pub mod types;
pub mod video;

pub use error::CoreError;
pub use host::{
    AccessHookToggle, ButtonName, ControlDevice, ControllerService, HostServices, MemoryReader,
    SaveStateService, VideoSource,
};
pub use settings::{BridgeSettings, RuntimeMode};
pub use types::{CpuType, EventKind, MemoryKind};
pub use video::{FrameSize, PpuFrame, RenderedFrame, VideoFilter};

/// Bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
