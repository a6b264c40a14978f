use image::RgbImage;

use crate::error::EngineError;

/// One rendered instant of the animation: tightly packed RGB8, row-major.
///
/// Frames are immutable once built; the generator hands out a fresh one per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub const CHANNELS: u8 = 3;

    /// Wrap an RGB8 buffer. `pixels.len()` must equal `width * height * 3`.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, EngineError> {
        let len = pixels.len();
        RgbImage::from_raw(width, height, pixels)
            .map(|image| Self { image })
            .ok_or_else(|| {
                EngineError::Codec(format!(
                    "rgb buffer of {len} bytes does not fit {width}x{height}x{}",
                    Self::CHANNELS
                ))
            })
    }

    pub(crate) fn from_image(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn channels(&self) -> u8 {
        Self::CHANNELS
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.image.get_pixel(x, y).0
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_checks_buffer_length() {
        assert!(Frame::from_rgb(2, 2, vec![0; 12]).is_ok());
        assert!(Frame::from_rgb(2, 2, vec![0; 11]).is_err());
    }

    #[test]
    fn pixel_reads_row_major() {
        let mut px = vec![0u8; 2 * 2 * 3];
        // (x=1, y=1) is the last pixel
        px[9..12].copy_from_slice(&[10, 20, 30]);
        let f = Frame::from_rgb(2, 2, px).unwrap();
        assert_eq!(f.pixel(1, 1), [10, 20, 30]);
        assert_eq!(f.pixel(0, 0), [0, 0, 0]);
        assert_eq!(f.channels(), 3);
    }
}
