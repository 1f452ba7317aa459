use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Pixel layout of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Motion JPEG format - compressed JPEG frames
    Mjpeg,
    /// YUV 4:2:2 format - uncompressed YUV data
    Yuyv,
    /// RGB24 format - uncompressed RGB data
    Rgb24,
    /// 8-bit grayscale
    Gray8,
}

impl PixelFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Mjpeg => 0, // Variable size, compressed
            PixelFormat::Yuyv => 2,
            PixelFormat::Rgb24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }

    /// Channels carried once decoded
    pub fn channels(&self) -> u8 {
        match self {
            PixelFormat::Mjpeg | PixelFormat::Yuyv | PixelFormat::Rgb24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }

    /// Check if format is compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, PixelFormat::Mjpeg)
    }
}

/// A single captured image. Owned by the iteration that captured it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Sequence number assigned by the source
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    pub format: PixelFormat,
}

impl Frame {
    pub fn new(id: u64, data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            id,
            timestamp: SystemTime::now(),
            data,
            width,
            height,
            format,
        }
    }

    pub fn channels(&self) -> u8 {
        self.format.channels()
    }

    /// Get the expected frame size for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
        }
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => !self.data.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_properties() {
        assert_eq!(PixelFormat::Mjpeg.bytes_per_pixel(), 0);
        assert_eq!(PixelFormat::Yuyv.bytes_per_pixel(), 2);
        assert_eq!(PixelFormat::Rgb24.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Gray8.channels(), 1);

        assert!(PixelFormat::Mjpeg.is_compressed());
        assert!(!PixelFormat::Yuyv.is_compressed());
        assert!(!PixelFormat::Rgb24.is_compressed());
    }

    #[test]
    fn test_frame_size_validation() {
        let valid = Frame::new(1, vec![0u8; 640 * 480 * 2], 640, 480, PixelFormat::Yuyv);
        assert!(valid.validate_size());

        let invalid = Frame::new(2, vec![0u8; 100], 640, 480, PixelFormat::Yuyv);
        assert!(!invalid.validate_size());

        let mjpeg = Frame::new(3, vec![0u8; 5000], 640, 480, PixelFormat::Mjpeg);
        assert!(mjpeg.validate_size());

        let empty_mjpeg = Frame::new(4, Vec::new(), 640, 480, PixelFormat::Mjpeg);
        assert!(!empty_mjpeg.validate_size());
    }
}
