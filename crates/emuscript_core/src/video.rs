//! Video frames as produced by the PPU and consumed by the post-processing filter

/// Dimensions of a frame in pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Raw decoded frame (palette indices) as reported by the PPU.
#[derive(Debug, Clone, Default)]
pub struct PpuFrame {
    pub size: FrameSize,
    pub frame_count: u32,
    pub buffer: Vec<u16>,
}

/// Output of a video filter: 32-bit ARGB pixels, row-major.
#[derive(Debug, Clone, Default)]
pub struct RenderedFrame {
    pub size: FrameSize,
    pub pixels: Vec<u32>,
}

/// Post-processing filter turning a PPU frame into displayable pixels.
///
/// Output dimensions may differ from the input (e.g. NTSC filters widen
/// the frame), so consumers must size their buffers from `RenderedFrame::size`.
pub trait VideoFilter {
    fn configure(&mut self, size: FrameSize);
    fn render(&mut self, frame: &PpuFrame) -> RenderedFrame;
}
