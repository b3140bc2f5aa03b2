//! External services the bridge consumes from the host emulator
//!
//! The bridge treats the emulation core as opaque: it only ever talks to
//! these traits. Implementations must be callable from the thread that
//! drives the frame loop and from script calls made on that thread.

use crate::{FrameSize, MemoryKind, PpuFrame, VideoFilter};
use std::path::Path;
use std::sync::Arc;

/// Debugger memory inspection backend.
pub trait MemoryReader: Send + Sync {
    /// Read one byte without side effects on the emulated hardware.
    fn read_byte(&self, kind: MemoryKind, address: u32) -> u8;
}

/// Save-state manager. The state format is the host's business.
pub trait SaveStateService: Send + Sync {
    fn load_state(&self, path: &Path) -> bool;
}

/// Source of decoded PPU frames and of the filter that post-processes them.
pub trait VideoSource: Send + Sync {
    fn current_frame(&self) -> PpuFrame;

    /// A fresh filter instance matching the host's video configuration.
    fn create_filter(&self) -> Box<dyn VideoFilter>;
}

/// Button exposed by a control device.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ButtonName {
    pub id: u8,
    /// Numeric (analog/encoded) buttons are never mapped to script booleans.
    pub is_numeric: bool,
}

impl ButtonName {
    pub const fn digital(id: u8) -> Self {
        Self { id, is_numeric: false }
    }

    pub const fn numeric(id: u8) -> Self {
        Self { id, is_numeric: true }
    }
}

/// A controller plugged into a port/subport.
pub trait ControlDevice: Send + Sync {
    fn is_pressed(&self, button: u8) -> bool;
    fn set_button(&self, button: u8, pressed: bool);
    /// Buttons in the device's canonical order.
    fn buttons(&self) -> Vec<ButtonName>;
}

/// Input/controller subsystem.
pub trait ControllerService: Send + Sync {
    fn device(&self, port: u8, subport: u8) -> Option<Arc<dyn ControlDevice>>;
}

/// Arms and disarms the low-level memory-access hook used as a safe point.
pub trait AccessHookToggle: Send + Sync {
    fn enable_access_hook(&self);
    fn disable_access_hook(&self);
}

/// Bundle of every external service a session needs.
#[derive(Clone)]
pub struct HostServices {
    pub memory: Arc<dyn MemoryReader>,
    pub save_states: Arc<dyn SaveStateService>,
    pub video: Arc<dyn VideoSource>,
    pub controllers: Arc<dyn ControllerService>,
    pub access_hook: Arc<dyn AccessHookToggle>,
}

impl HostServices {
    /// Use a single host object for every service.
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: MemoryReader
            + SaveStateService
            + VideoSource
            + ControllerService
            + AccessHookToggle
            + 'static,
    {
        Self {
            memory: host.clone(),
            save_states: host.clone(),
            video: host.clone(),
            controllers: host.clone(),
            access_hook: host,
        }
    }

    /// Current frame run through a freshly configured filter.
    pub fn render_current_frame(&self) -> crate::RenderedFrame {
        let frame = self.video.current_frame();
        let mut filter = self.video.create_filter();
        filter.configure(FrameSize::new(frame.size.width, frame.size.height));
        filter.render(&frame)
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices").finish_non_exhaustive()
    }
}
