//! Camera payload decoding
//!
//! The sim sends each camera frame as a base64-encoded compressed image
//! inside the telemetry packet. This wrapper decodes it once; sinks save
//! the pixels back out as PNG and the feature pipeline consumes them as a
//! tensor.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;

use robocar_core::config::ImageChannels;
use robocar_core::features::ImageTensor;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("image payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image payload did not decode: {0}")]
    Image(#[from] image::ImageError),
}

/// Decoded pixels with the channel selection already applied.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    /// Interleaved 8-bit samples, row-major
    pub pixels: Vec<u8>,
}

/// Decode one frame's camera payload.
///
/// Mono mode keeps a single channel of the source image (the sim's
/// grayscale scenes carry the same value in every channel); RGB mode keeps
/// all three interleaved.
pub fn decode_frame_image(
    payload: &str,
    channels: ImageChannels,
) -> Result<DecodedImage, DecodeError> {
    let bytes = BASE64.decode(payload.trim())?;
    let img = image::load_from_memory(&bytes)?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let pixels = match channels {
        ImageChannels::Mono => rgb.pixels().map(|px| px.0[1]).collect(),
        ImageChannels::Rgb => rgb.into_raw(),
    };

    Ok(DecodedImage {
        width,
        height,
        channels: channels.count(),
        pixels,
    })
}

impl DecodedImage {
    /// Raw 0-255 samples as floats; normalization is the pipeline's call.
    pub fn to_tensor(&self) -> ImageTensor {
        ImageTensor {
            width: self.width,
            height: self.height,
            channels: self.channels,
            pixels: self.pixels.iter().map(|&px| px as f32).collect(),
        }
    }

    pub fn save_png(&self, path: &Path) -> Result<(), DecodeError> {
        let color = match self.channels {
            1 => image::ExtendedColorType::L8,
            _ => image::ExtendedColorType::Rgb8,
        };
        image::save_buffer(path, &self.pixels, self.width, self.height, color)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x2 RGB PNG with distinct channel values, base64-encoded
    fn test_payload() -> String {
        let mut img = image::RgbImage::new(2, 2);
        for px in img.pixels_mut() {
            px.0 = [10, 20, 30];
        }
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
        BASE64.encode(&bytes)
    }

    #[test]
    fn test_mono_selects_single_channel() {
        let decoded = decode_frame_image(&test_payload(), ImageChannels::Mono).unwrap();
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.pixels, vec![20; 4]);
    }

    #[test]
    fn test_rgb_keeps_interleaved_channels() {
        let decoded = decode_frame_image(&test_payload(), ImageChannels::Rgb).unwrap();
        assert_eq!(decoded.channels, 3);
        assert_eq!(decoded.pixels.len(), 12);
        assert_eq!(&decoded.pixels[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_tensor_keeps_raw_sample_range() {
        let decoded = decode_frame_image(&test_payload(), ImageChannels::Mono).unwrap();
        let tensor = decoded.to_tensor();
        assert_eq!(tensor.pixels, vec![20.0; 4]);
    }

    #[test]
    fn test_garbage_payload_is_an_error() {
        assert!(decode_frame_image("not base64!!!", ImageChannels::Mono).is_err());
        let valid_b64_bad_image = BASE64.encode(b"nope");
        assert!(decode_frame_image(&valid_b64_bad_image, ImageChannels::Mono).is_err());
    }
}
