//! PNG encode/decode for frames, entirely in memory.

use std::io::Cursor;

use image::{ColorType, ImageFormat};

use crate::error::EngineError;
use crate::frame::Frame;

/// First eight bytes of every PNG stream.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Lossless PNG bytes for `frame`.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>, EngineError> {
    let mut out = Cursor::new(Vec::with_capacity(frame.pixels().len() / 4));
    frame.as_image().write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Decode PNG bytes back into a frame. Anything other than 8-bit RGB is rejected
/// rather than silently converted.
pub fn decode_png(bytes: &[u8]) -> Result<Frame, EngineError> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
    if img.color() != ColorType::Rgb8 {
        return Err(EngineError::Codec(format!(
            "expected Rgb8 png, got {:?}",
            img.color()
        )));
    }
    Ok(Frame::from_image(img.into_rgb8()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> Frame {
        let mut px = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                px.extend_from_slice(&[(x * 7) as u8, (y * 13) as u8, ((x + y) * 3) as u8]);
            }
        }
        Frame::from_rgb(w, h, px).unwrap()
    }

    #[test]
    fn encoded_bytes_are_png() {
        let bytes = encode_png(&gradient(16, 9)).unwrap();
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);
    }

    #[test]
    fn round_trip_is_lossless() {
        let frame = gradient(33, 17);
        let back = decode_png(&encode_png(&frame).unwrap()).unwrap();
        assert_eq!((back.width(), back.height(), back.channels()), (33, 17, 3));
        assert_eq!(back, frame);
    }

    #[test]
    fn garbage_is_a_codec_error() {
        assert!(matches!(decode_png(b"not a png"), Err(EngineError::Codec(_))));
    }

    #[test]
    fn rgba_png_is_rejected() {
        let rgba = image::RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 4]));
        let mut buf = Cursor::new(Vec::new());
        rgba.write_to(&mut buf, ImageFormat::Png).unwrap();
        assert!(matches!(decode_png(buf.get_ref()), Err(EngineError::Codec(_))));
    }
}
