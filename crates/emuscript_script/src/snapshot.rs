//! Memory snapshots refreshed once per frame
//!
//! Frame-memory registrations sample a list of addresses into an owned
//! byte buffer. The screen snapshot is a single pre-allocated pixel buffer
//! shared by every registrant and refreshed only while someone holds it;
//! only the pixels of the last rendered frame are exposed.
//!
//! Buffers are addressed by [`SnapshotHandle`]; unregistration matches the
//! handle against the live set only, so double release and use after
//! release are impossible.

use crate::ffi::SnapshotHandle;
use crate::BridgeError;
use emuscript_core::{FrameSize, MemoryKind, MemoryReader, RenderedFrame};
use tracing::{debug, warn};

struct FrameMemory {
    handle: SnapshotHandle,
    kind: MemoryKind,
    addresses: Vec<u32>,
    buffer: Vec<u8>,
}

impl FrameMemory {
    fn fill(&mut self, reader: &dyn MemoryReader) {
        for (slot, &address) in self.buffer.iter_mut().zip(&self.addresses) {
            *slot = reader.read_byte(self.kind, address);
        }
    }
}

struct ScreenMemory {
    handle: SnapshotHandle,
    refs: u32,
    buffer: Vec<u32>,
    size: FrameSize,
    valid: usize,
}

pub struct MemorySnapshotRegistry {
    next_handle: u32,
    frame_memory: Vec<FrameMemory>,
    screen: ScreenMemory,
}

impl MemorySnapshotRegistry {
    pub fn new(screen_capacity: usize) -> Self {
        Self {
            next_handle: 2,
            frame_memory: Vec::new(),
            screen: ScreenMemory {
                handle: SnapshotHandle::new(1),
                refs: 0,
                buffer: vec![0; screen_capacity],
                size: FrameSize::default(),
                valid: 0,
            },
        }
    }

    fn allocate_handle(&mut self) -> SnapshotHandle {
        let handle = SnapshotHandle::new(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1).max(2);
        handle
    }

    /// Watch `addresses` of `kind`. The buffer is filled immediately.
    ///
    /// An empty address list registers nothing and returns `None`.
    pub fn register_frame_memory(
        &mut self,
        kind: MemoryKind,
        addresses: Vec<u32>,
        reader: &dyn MemoryReader,
    ) -> Option<SnapshotHandle> {
        if addresses.is_empty() {
            return None;
        }

        let handle = self.allocate_handle();
        let mut registration = FrameMemory {
            handle,
            kind,
            buffer: vec![0; addresses.len()],
            addresses,
        };
        registration.fill(reader);
        debug!(%handle, %kind, len = registration.buffer.len(), "frame memory registered");
        self.frame_memory.push(registration);
        Some(handle)
    }

    pub fn unregister_frame_memory(&mut self, handle: SnapshotHandle) -> bool {
        match self.frame_memory.iter().position(|reg| reg.handle == handle) {
            Some(index) => {
                self.frame_memory.remove(index);
                debug!(%handle, "frame memory released");
                true
            }
            None => false,
        }
    }

    pub fn frame_memory(&self, handle: SnapshotHandle) -> Option<&[u8]> {
        self.frame_memory
            .iter()
            .find(|reg| reg.handle == handle)
            .map(|reg| reg.buffer.as_slice())
    }

    pub fn frame_registrations(&self) -> usize {
        self.frame_memory.len()
    }

    pub fn register_screen_memory(&mut self) -> SnapshotHandle {
        self.screen.refs += 1;
        self.screen.handle
    }

    pub fn unregister_screen_memory(&mut self, handle: SnapshotHandle) -> bool {
        if handle == self.screen.handle && self.screen.refs > 0 {
            self.screen.refs -= 1;
            true
        } else {
            false
        }
    }

    fn is_live_screen(&self, handle: SnapshotHandle) -> bool {
        handle == self.screen.handle && self.screen.refs > 0
    }

    /// Pixels of the last rendered frame, while at least one registration
    /// holds the screen. Empty until the first refresh.
    pub fn screen_memory(&self, handle: SnapshotHandle) -> Option<&[u32]> {
        self.is_live_screen(handle)
            .then(|| &self.screen.buffer[..self.screen.valid])
    }

    /// Dimensions of the last rendered frame. A truncated frame reports its
    /// full size but exposes fewer pixels.
    pub fn screen_size(&self, handle: SnapshotHandle) -> Option<FrameSize> {
        self.is_live_screen(handle).then_some(self.screen.size)
    }

    pub fn screen_refs(&self) -> u32 {
        self.screen.refs
    }

    /// Re-read every watched address into its buffer.
    pub fn update_frame_memory(&mut self, reader: &dyn MemoryReader) {
        for registration in &mut self.frame_memory {
            registration.fill(reader);
        }
    }

    /// Copy a freshly rendered frame into the screen buffer.
    ///
    /// `render` is only invoked while the screen is registered. Output that
    /// does not fit is truncated to the buffer and reported as an error.
    pub fn update_screen_memory<F>(&mut self, render: F) -> Result<(), BridgeError>
    where
        F: FnOnce() -> RenderedFrame,
    {
        if self.screen.refs == 0 {
            return Ok(());
        }

        let frame = render();
        let wanted = frame.size.pixel_count().min(frame.pixels.len());
        let capacity = self.screen.buffer.len();
        let copied = wanted.min(capacity);
        self.screen.buffer[..copied].copy_from_slice(&frame.pixels[..copied]);
        self.screen.size = frame.size;
        self.screen.valid = copied;

        if wanted > capacity {
            warn!(
                width = frame.size.width,
                height = frame.size.height,
                capacity,
                "screen frame truncated"
            );
            return Err(BridgeError::ScreenOverflow {
                width: frame.size.width,
                height: frame.size.height,
                capacity,
            });
        }
        Ok(())
    }

    /// Release every frame-memory registration and drop all screen references.
    pub fn clear(&mut self) {
        self.frame_memory.clear();
        self.screen.refs = 0;
        self.screen.size = FrameSize::default();
        self.screen.valid = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct TestMemory {
        bytes: Mutex<HashMap<(MemoryKind, u32), u8>>,
    }

    impl TestMemory {
        fn set(&self, kind: MemoryKind, address: u32, value: u8) {
            self.bytes.lock().insert((kind, address), value);
        }
    }

    impl MemoryReader for TestMemory {
        fn read_byte(&self, kind: MemoryKind, address: u32) -> u8 {
            self.bytes.lock().get(&(kind, address)).copied().unwrap_or(0)
        }
    }

    const RAM: MemoryKind = MemoryKind(7);

    fn frame(width: u32, height: u32, fill: u32) -> RenderedFrame {
        let size = FrameSize::new(width, height);
        RenderedFrame {
            size,
            pixels: vec![fill; size.pixel_count()],
        }
    }

    #[test]
    fn test_register_fills_immediately_and_refreshes() {
        let memory = TestMemory::default();
        memory.set(RAM, 0x10, 0xAA);
        memory.set(RAM, 0x20, 0x55);

        let mut registry = MemorySnapshotRegistry::new(16);
        let handle = registry
            .register_frame_memory(RAM, vec![0x10, 0x20], &memory)
            .unwrap();
        assert_eq!(registry.frame_memory(handle), Some(&[0xAA, 0x55][..]));

        memory.set(RAM, 0x20, 0x01);
        assert_eq!(registry.frame_memory(handle), Some(&[0xAA, 0x55][..]));
        registry.update_frame_memory(&memory);
        assert_eq!(registry.frame_memory(handle), Some(&[0xAA, 0x01][..]));
    }

    #[test]
    fn test_empty_address_list_registers_nothing() {
        let memory = TestMemory::default();
        let mut registry = MemorySnapshotRegistry::new(16);
        for _ in 0..3 {
            assert_eq!(registry.register_frame_memory(RAM, Vec::new(), &memory), None);
        }
        assert_eq!(registry.frame_registrations(), 0);
    }

    #[test]
    fn test_unregister_unknown_handle_leaves_registrations() {
        let memory = TestMemory::default();
        let mut registry = MemorySnapshotRegistry::new(16);
        let a = registry.register_frame_memory(RAM, vec![1], &memory).unwrap();
        let b = registry.register_frame_memory(RAM, vec![2, 3], &memory).unwrap();

        assert!(!registry.unregister_frame_memory(SnapshotHandle::from_raw(9999)));
        assert_eq!(registry.frame_registrations(), 2);

        assert!(registry.unregister_frame_memory(a));
        assert!(!registry.unregister_frame_memory(a));
        assert_eq!(registry.frame_memory(a), None);
        assert_eq!(registry.frame_memory(b).map(<[u8]>::len), Some(2));
    }

    #[test]
    fn test_handles_are_not_reused() {
        let memory = TestMemory::default();
        let mut registry = MemorySnapshotRegistry::new(16);
        let first = registry.register_frame_memory(RAM, vec![1], &memory).unwrap();
        registry.unregister_frame_memory(first);
        let second = registry.register_frame_memory(RAM, vec![1], &memory).unwrap();
        assert_ne!(first, second);
        assert!(!registry.unregister_frame_memory(first));
    }

    #[test]
    fn test_screen_reference_count() {
        let mut registry = MemorySnapshotRegistry::new(16);
        let handles: Vec<_> = (0..3).map(|_| registry.register_screen_memory()).collect();
        assert!(handles.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(registry.screen_refs(), 3);

        let unrelated = SnapshotHandle::from_raw(handles[0].to_raw() + 100);
        assert!(!registry.unregister_screen_memory(unrelated));
        assert_eq!(registry.screen_refs(), 3);

        assert!(registry.unregister_screen_memory(handles[0]));
        assert!(registry.unregister_screen_memory(handles[0]));
        assert_eq!(registry.screen_refs(), 1);
        assert!(registry.unregister_screen_memory(handles[0]));
        assert!(!registry.unregister_screen_memory(handles[0]));
        assert_eq!(registry.screen_refs(), 0);
    }

    #[test]
    fn test_screen_refreshes_only_while_registered() {
        let mut registry = MemorySnapshotRegistry::new(16);
        let mut rendered = false;
        registry
            .update_screen_memory(|| {
                rendered = true;
                frame(4, 4, 1)
            })
            .unwrap();
        assert!(!rendered);

        let handle = registry.register_screen_memory();
        registry.update_screen_memory(|| frame(4, 4, 0xFF00FF00)).unwrap();
        let screen = registry.screen_memory(handle).unwrap();
        assert!(screen.iter().all(|&px| px == 0xFF00FF00));

        registry.unregister_screen_memory(handle);
        assert_eq!(registry.screen_memory(handle), None);
    }

    #[test]
    fn test_oversized_screen_frame_is_truncated() {
        let mut registry = MemorySnapshotRegistry::new(8);
        let handle = registry.register_screen_memory();
        let result = registry.update_screen_memory(|| frame(4, 4, 7));
        assert!(matches!(
            result,
            Err(BridgeError::ScreenOverflow { width: 4, height: 4, capacity: 8 })
        ));
        assert_eq!(registry.screen_memory(handle), Some(&[7u32; 8][..]));
        assert_eq!(registry.screen_size(handle), Some(FrameSize::new(4, 4)));
    }

    #[test]
    fn test_screen_exposes_only_the_last_frame() {
        let mut registry = MemorySnapshotRegistry::new(64);
        let handle = registry.register_screen_memory();
        assert_eq!(registry.screen_memory(handle), Some(&[][..]));
        assert_eq!(registry.screen_size(handle), Some(FrameSize::default()));

        registry.update_screen_memory(|| frame(8, 4, 1)).unwrap();
        assert_eq!(registry.screen_memory(handle).map(<[u32]>::len), Some(32));

        registry.update_screen_memory(|| frame(2, 3, 9)).unwrap();
        assert_eq!(registry.screen_memory(handle), Some(&[9u32; 6][..]));
        assert_eq!(registry.screen_size(handle), Some(FrameSize::new(2, 3)));

        registry.unregister_screen_memory(handle);
        assert_eq!(registry.screen_size(handle), None);
    }

    #[test]
    fn test_clear_releases_everything() {
        let memory = TestMemory::default();
        let mut registry = MemorySnapshotRegistry::new(16);
        let frame_handle = registry.register_frame_memory(RAM, vec![1, 2], &memory).unwrap();
        let screen = registry.register_screen_memory();
        registry.update_screen_memory(|| frame(2, 2, 5)).unwrap();

        registry.clear();
        assert_eq!(registry.frame_registrations(), 0);
        assert_eq!(registry.frame_memory(frame_handle), None);
        assert_eq!(registry.screen_refs(), 0);
        assert_eq!(registry.screen_memory(screen), None);

        let screen = registry.register_screen_memory();
        assert_eq!(registry.screen_memory(screen), Some(&[][..]));
    }
}
