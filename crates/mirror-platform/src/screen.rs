use anyhow::Result;

use crate::display::DisplayHandle;
use crate::geometry::{Affine, Point, Size};

/// Raw pixel data sampled from a screen or window
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Stride (bytes per row)
    pub stride: u32,
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            // saturates for widths no buffer can hold; such a buffer reports empty
            stride: width.saturating_mul(4),
            data,
        }
    }

    /// A buffer with no usable pixels
    pub fn is_empty(&self) -> bool {
        if self.width == 0 || self.height == 0 {
            return true;
        }
        let row_bytes = (self.width as usize).checked_mul(4);
        let needed = row_bytes.and_then(|row| {
            (self.stride as usize)
                .checked_mul(self.height as usize - 1)?
                .checked_add(row)
        });
        match (row_bytes, needed) {
            (Some(row), Some(needed)) => (self.stride as usize) < row || self.data.len() < needed,
            _ => true,
        }
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Samples every visual layer of the main display, overlays included
pub trait ScreenGrabber: Send + Sync {
    /// Capture the current main display contents. `Ok(None)` when no pixels are available.
    fn capture_screen(&self) -> Result<Option<PixelBuffer>>;
}

/// A visible application window as seen by the compositor
#[derive(Debug, Clone)]
pub struct AppWindow {
    /// Display the window is attached to. `None` when the window cannot tell.
    pub screen: Option<DisplayHandle>,
    /// Window center in main display coordinates
    pub center: Point,
    /// Window bounds size
    pub bounds: Size,
    /// Anchor point in unit coordinates (0.5, 0.5 is the middle)
    pub anchor: Point,
    /// Transform applied to the window around its anchor
    pub transform: Affine,
    /// Rendered window contents
    pub content: PixelBuffer,
}

pub trait WindowSource: Send + Sync {
    /// Visible application windows, back to front
    fn windows(&self) -> Result<Vec<AppWindow>>;

    /// Size of the main display canvas windows are composited into
    fn canvas_size(&self) -> Size;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffers() {
        assert!(PixelBuffer::new(0, 4, vec![]).is_empty());
        assert!(PixelBuffer::new(2, 2, vec![0; 15]).is_empty());
        assert!(!PixelBuffer::new(2, 2, vec![0; 16]).is_empty());
    }

    #[test]
    fn test_short_stride_is_empty() {
        let mut buffer = PixelBuffer::new(2, 2, vec![0; 16]);
        buffer.stride = 4;
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_huge_width_does_not_overflow() {
        let buffer = PixelBuffer::new(1 << 30, 1, vec![0; 16]);
        assert_eq!(buffer.stride, u32::MAX);
        assert!(buffer.is_empty());

        let buffer = PixelBuffer::new(u32::MAX, 2, Vec::new());
        assert!(buffer.is_empty());
    }
}
