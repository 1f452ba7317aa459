use crate::config::EncoderConfig;
use crate::error::EncodeError;
use crate::frame::{Frame, PixelFormat};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use tracing::trace;

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Textual transport encoding applied to the compressed bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    Base64,
}

/// Compressed image ready for transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    /// JPEG bytes
    pub bytes: Vec<u8>,
    pub encoding: TransferEncoding,
}

impl EncodedPayload {
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Render the compressed bytes in the transfer encoding
    pub fn transport_text(&self) -> String {
        match self.encoding {
            TransferEncoding::Base64 => STANDARD.encode(&self.bytes),
        }
    }
}

/// Compresses frames to JPEG. Same frame in, same payload out.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    quality: u8,
}

impl FrameEncoder {
    pub fn new(config: &EncoderConfig) -> Self {
        Self::with_quality(config.jpeg_quality)
    }

    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Consume a frame and produce its transport payload
    pub fn encode(&self, frame: Frame) -> Result<EncodedPayload, EncodeError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(EncodeError::InvalidBuffer {
                details: format!("frame {} has zero dimensions", frame.id),
            });
        }

        if !frame.validate_size() {
            return Err(EncodeError::InvalidBuffer {
                details: format!(
                    "frame {} is {} bytes, expected {} for {}x{} {:?}",
                    frame.id,
                    frame.data.len(),
                    frame
                        .expected_size()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "non-empty".to_string()),
                    frame.width,
                    frame.height,
                    frame.format
                ),
            });
        }

        let bytes = match frame.format {
            PixelFormat::Mjpeg => {
                if !frame.data.starts_with(&JPEG_SOI) {
                    return Err(EncodeError::InvalidBuffer {
                        details: format!("frame {} is missing the JPEG start marker", frame.id),
                    });
                }
                // Some UVC devices pad the buffer with zeros after EOI
                let end = frame
                    .data
                    .iter()
                    .rposition(|b| *b != 0x00)
                    .map_or(0, |i| i + 1);
                if !frame.data[..end].ends_with(&JPEG_EOI) {
                    return Err(EncodeError::InvalidBuffer {
                        details: format!(
                            "frame {} is missing the JPEG end marker (truncated capture)",
                            frame.id
                        ),
                    });
                }
                frame.data
            }
            PixelFormat::Rgb24 => {
                self.encode_jpeg(&frame.data, frame.width, frame.height, ColorType::Rgb8)?
            }
            PixelFormat::Gray8 => {
                self.encode_jpeg(&frame.data, frame.width, frame.height, ColorType::L8)?
            }
            PixelFormat::Yuyv => {
                let rgb = yuyv_to_rgb(&frame.data, frame.width, frame.height)?;
                self.encode_jpeg(&rgb, frame.width, frame.height, ColorType::Rgb8)?
            }
        };

        trace!(
            "Encoded frame {} ({:?}) into {} JPEG bytes",
            frame.id,
            frame.format,
            bytes.len()
        );

        Ok(EncodedPayload {
            bytes,
            encoding: TransferEncoding::Base64,
        })
    }

    fn encode_jpeg(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        color_type: ColorType,
    ) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, self.quality);
        encoder
            .encode(data, width, height, color_type)
            .map_err(|e| EncodeError::Jpeg {
                details: e.to_string(),
            })?;
        Ok(buf)
    }
}

/// Convert packed YUYV 4:2:2 to RGB24 (BT.601, studio swing)
fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, EncodeError> {
    if width % 2 != 0 {
        return Err(EncodeError::InvalidBuffer {
            details: format!("YUYV frame width {} is not even", width),
        });
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for chunk in data.chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&yuv_pixel(y0, u, v));
        rgb.extend_from_slice(&yuv_pixel(y1, u, v));
    }
    Ok(rgb)
}

fn yuv_pixel(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let clamp = |value: i32| value.clamp(0, 255) as u8;
    [
        clamp((298 * c + 409 * e + 128) >> 8),
        clamp((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp((298 * c + 516 * d + 128) >> 8),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_frame(width: u32, height: u32) -> Frame {
        let data = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
        Frame::new(1, data, width, height, PixelFormat::Rgb24)
    }

    #[test]
    fn test_rgb_frame_encodes_to_jpeg() {
        let encoder = FrameEncoder::with_quality(80);
        let payload = encoder.encode(rgb_frame(32, 24)).unwrap();

        assert!(payload.bytes.starts_with(&JPEG_SOI));
        assert_eq!(payload.encoding, TransferEncoding::Base64);
        assert_eq!(payload.size_bytes(), payload.bytes.len());
        assert_eq!(
            STANDARD.decode(payload.transport_text()).unwrap(),
            payload.bytes
        );
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let encoder = FrameEncoder::with_quality(90);
        let first = encoder.encode(rgb_frame(16, 16)).unwrap();
        let second = encoder.encode(rgb_frame(16, 16)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_mjpeg_passthrough() {
        let data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9];
        let frame = Frame::new(7, data.clone(), 640, 480, PixelFormat::Mjpeg);

        let payload = FrameEncoder::with_quality(90).encode(frame).unwrap();
        assert_eq!(payload.bytes, data);
    }

    #[test]
    fn test_corrupt_mjpeg_rejected() {
        let frame = Frame::new(7, vec![0x00, 0x01, 0x02], 640, 480, PixelFormat::Mjpeg);
        let err = FrameEncoder::with_quality(90).encode(frame).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidBuffer { .. }));
    }

    #[test]
    fn test_truncated_mjpeg_rejected() {
        let data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
        let frame = Frame::new(8, data, 640, 480, PixelFormat::Mjpeg);
        let err = FrameEncoder::with_quality(90).encode(frame).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidBuffer { .. }));
    }

    #[test]
    fn test_mjpeg_with_trailing_padding_accepted() {
        let data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0xFF, 0xD9, 0x00, 0x00];
        let frame = Frame::new(9, data.clone(), 640, 480, PixelFormat::Mjpeg);
        let payload = FrameEncoder::with_quality(90).encode(frame).unwrap();
        assert_eq!(payload.bytes, data);
    }

    #[test]
    fn test_short_raw_buffer_rejected() {
        let frame = Frame::new(3, vec![0u8; 10], 32, 24, PixelFormat::Rgb24);
        let err = FrameEncoder::with_quality(90).encode(frame).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidBuffer { .. }));

        let frame = Frame::new(4, Vec::new(), 0, 0, PixelFormat::Rgb24);
        assert!(FrameEncoder::with_quality(90).encode(frame).is_err());
    }

    #[test]
    fn test_yuyv_and_gray_frames_encode() {
        let yuyv = Frame::new(5, vec![128u8; 16 * 8 * 2], 16, 8, PixelFormat::Yuyv);
        assert!(FrameEncoder::with_quality(75).encode(yuyv).is_ok());

        let gray = Frame::new(6, vec![200u8; 16 * 8], 16, 8, PixelFormat::Gray8);
        assert!(FrameEncoder::with_quality(75).encode(gray).is_ok());

        let odd = Frame::new(7, vec![128u8; 15 * 8 * 2], 15, 8, PixelFormat::Yuyv);
        assert!(FrameEncoder::with_quality(75).encode(odd).is_err());
    }

    #[test]
    fn test_yuv_conversion_reference_points() {
        assert_eq!(yuv_pixel(16, 128, 128), [0, 0, 0]);
        assert_eq!(yuv_pixel(235, 128, 128), [255, 255, 255]);
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(FrameEncoder::with_quality(0).quality(), 1);
        assert_eq!(FrameEncoder::with_quality(200).quality(), 100);
    }
}
