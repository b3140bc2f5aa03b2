//! Headless emulator
//!
//! A stand-in for the real emulation core: flat RAM per memory kind, an
//! in-memory save-state store, a synthetic PPU frame, standard controllers
//! and the access-hook flag. Used by the CLI runner and by tests.

use crate::input::StandardController;
use crate::settings::HeadlessSettings;
use emuscript_core::{
    AccessHookToggle, ControlDevice, ControllerService, FrameSize, MemoryKind, MemoryReader,
    PpuFrame, RenderedFrame, SaveStateService, VideoFilter, VideoSource,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

type Ram = BTreeMap<MemoryKind, Vec<u8>>;

pub struct HeadlessEmulator {
    settings: HeadlessSettings,
    ram: RwLock<Ram>,
    states: Mutex<HashMap<PathBuf, Ram>>,
    loaded: Mutex<Vec<PathBuf>>,
    frame_count: AtomicU32,
    controllers: HashMap<(u8, u8), Arc<StandardController>>,
    hook_armed: AtomicBool,
    hook_toggles: AtomicU32,
}

impl HeadlessEmulator {
    pub fn new(settings: HeadlessSettings) -> Self {
        let controllers = (0..settings.controller_ports)
            .map(|port| ((port, 0), Arc::new(StandardController::new())))
            .collect();
        Self {
            settings,
            ram: RwLock::new(Ram::new()),
            states: Mutex::new(HashMap::new()),
            loaded: Mutex::new(Vec::new()),
            frame_count: AtomicU32::new(0),
            controllers,
            hook_armed: AtomicBool::new(false),
            hook_toggles: AtomicU32::new(0),
        }
    }

    /// Write one byte; addresses beyond the configured RAM are ignored.
    pub fn write_byte(&self, kind: MemoryKind, address: u32, value: u8) {
        let size = self.settings.ram_size;
        let mut ram = self.ram.write();
        let bank = ram.entry(kind).or_insert_with(|| vec![0; size]);
        if let Some(slot) = bank.get_mut(address as usize) {
            *slot = value;
        }
    }

    /// Snapshot all RAM under `path`.
    pub fn save_state(&self, path: impl Into<PathBuf>) {
        let snapshot = self.ram.read().clone();
        self.states.lock().insert(path.into(), snapshot);
    }

    /// Every path successfully loaded so far, oldest first.
    pub fn loaded_states(&self) -> Vec<PathBuf> {
        self.loaded.lock().clone()
    }

    pub fn advance_frame(&self) -> u32 {
        self.frame_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count.load(Ordering::Acquire)
    }

    pub fn is_access_hook_armed(&self) -> bool {
        self.hook_armed.load(Ordering::Acquire)
    }

    /// Number of enable/disable calls received.
    pub fn access_hook_toggles(&self) -> u32 {
        self.hook_toggles.load(Ordering::Acquire)
    }

    pub fn controller(&self, port: u8) -> Option<Arc<StandardController>> {
        self.controllers.get(&(port, 0)).cloned()
    }

    fn frame_size(&self) -> FrameSize {
        FrameSize::new(self.settings.frame_width, self.settings.frame_height)
    }
}

impl Default for HeadlessEmulator {
    fn default() -> Self {
        Self::new(HeadlessSettings::default())
    }
}

impl MemoryReader for HeadlessEmulator {
    fn read_byte(&self, kind: MemoryKind, address: u32) -> u8 {
        self.ram
            .read()
            .get(&kind)
            .and_then(|bank| bank.get(address as usize).copied())
            .unwrap_or(0)
    }
}

impl SaveStateService for HeadlessEmulator {
    fn load_state(&self, path: &Path) -> bool {
        let Some(snapshot) = self.states.lock().get(path).cloned() else {
            debug!(path = %path.display(), "no such save state");
            return false;
        };
        *self.ram.write() = snapshot;
        self.loaded.lock().push(path.to_path_buf());
        true
    }
}

impl VideoSource for HeadlessEmulator {
    /// Diagonal stripes that scroll by one pixel per frame.
    fn current_frame(&self) -> PpuFrame {
        let size = self.frame_size();
        let frame_count = self.frame_count();
        let buffer = (0..size.height)
            .flat_map(|y| (0..size.width).map(move |x| ((x + y + frame_count) & 0x3F) as u16))
            .collect();
        PpuFrame {
            size,
            frame_count,
            buffer,
        }
    }

    fn create_filter(&self) -> Box<dyn VideoFilter> {
        Box::new(GrayscaleFilter::default())
    }
}

impl ControllerService for HeadlessEmulator {
    fn device(&self, port: u8, subport: u8) -> Option<Arc<dyn ControlDevice>> {
        self.controllers
            .get(&(port, subport))
            .map(|pad| pad.clone() as Arc<dyn ControlDevice>)
    }
}

impl AccessHookToggle for HeadlessEmulator {
    fn enable_access_hook(&self) {
        self.hook_toggles.fetch_add(1, Ordering::AcqRel);
        self.hook_armed.store(true, Ordering::Release);
    }

    fn disable_access_hook(&self) {
        self.hook_toggles.fetch_add(1, Ordering::AcqRel);
        self.hook_armed.store(false, Ordering::Release);
    }
}

/// Maps 6-bit palette indices to opaque gray levels.
#[derive(Debug, Default)]
pub struct GrayscaleFilter {
    size: FrameSize,
}

impl VideoFilter for GrayscaleFilter {
    fn configure(&mut self, size: FrameSize) {
        self.size = size;
    }

    fn render(&mut self, frame: &PpuFrame) -> RenderedFrame {
        let pixels = frame
            .buffer
            .iter()
            .take(self.size.pixel_count())
            .map(|&index| {
                let level = u32::from(index & 0x3F) * 4;
                0xFF00_0000 | level << 16 | level << 8 | level
            })
            .collect();
        RenderedFrame {
            size: self.size,
            pixels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAM: MemoryKind = MemoryKind(7);

    #[test]
    fn test_ram_reads_back_and_defaults_to_zero() {
        let emu = HeadlessEmulator::default();
        emu.write_byte(RAM, 0x10, 0x42);
        assert_eq!(emu.read_byte(RAM, 0x10), 0x42);
        assert_eq!(emu.read_byte(RAM, 0x11), 0);
        assert_eq!(emu.read_byte(MemoryKind(8), 0x10), 0);

        emu.write_byte(RAM, 0x10_0000, 1);
        assert_eq!(emu.read_byte(RAM, 0x10_0000), 0);
    }

    #[test]
    fn test_save_and_load_state() {
        let emu = HeadlessEmulator::default();
        emu.write_byte(RAM, 0, 1);
        emu.save_state("one.mss");
        emu.write_byte(RAM, 0, 2);

        assert!(!emu.load_state(Path::new("missing.mss")));
        assert!(emu.load_state(Path::new("one.mss")));
        assert_eq!(emu.read_byte(RAM, 0), 1);
        assert_eq!(emu.loaded_states(), vec![PathBuf::from("one.mss")]);
    }

    #[test]
    fn test_filter_output_matches_frame_size() {
        let emu = HeadlessEmulator::default();
        emu.advance_frame();
        let frame = emu.current_frame();
        assert_eq!(frame.frame_count, 1);

        let mut filter = emu.create_filter();
        filter.configure(frame.size);
        let rendered = filter.render(&frame);
        assert_eq!(rendered.size, FrameSize::new(256, 240));
        assert_eq!(rendered.pixels.len(), 256 * 240);
        assert_eq!(rendered.pixels[0], 0xFF04_0404);
    }

    #[test]
    fn test_controllers_on_configured_ports_only() {
        let emu = HeadlessEmulator::default();
        assert!(emu.device(0, 0).is_some());
        assert!(emu.device(1, 0).is_some());
        assert!(emu.device(2, 0).is_none());
        assert!(emu.device(0, 1).is_none());
    }

    #[test]
    fn test_access_hook_toggle() {
        let emu = HeadlessEmulator::default();
        emu.enable_access_hook();
        assert!(emu.is_access_hook_armed());
        emu.disable_access_hook();
        assert!(!emu.is_access_hook_armed());
        assert_eq!(emu.access_hook_toggles(), 2);
    }
}
