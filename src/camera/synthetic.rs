use super::source::FrameSource;
use crate::error::CameraError;
use crate::frame::{Frame, PixelFormat};
use tracing::trace;

/// Deterministic RGB test pattern, used when no capture hardware is present
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    frame_counter: u64,
    released: bool,
}

impl SyntheticFrameSource {
    pub fn new(resolution: (u32, u32)) -> Self {
        Self {
            width: resolution.0,
            height: resolution.1,
            frame_counter: 0,
            released: false,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    fn render(&self, frame_id: u64) -> Vec<u8> {
        let (width, height) = (self.width as usize, self.height as usize);
        let shift = (frame_id % 256) as usize;
        let mut data = Vec::with_capacity(width * height * 3);

        for y in 0..height {
            for x in 0..width {
                let r = ((x * 255) / width.max(1) + shift) % 256;
                let g = ((y * 255) / height.max(1) + shift) % 256;
                let b = (r + g) / 2;
                data.extend_from_slice(&[r as u8, g as u8, b as u8]);
            }
        }

        data
    }
}

impl FrameSource for SyntheticFrameSource {
    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        if self.released {
            return Err(CameraError::NoFrame {
                details: "synthetic source has been released".to_string(),
            });
        }

        let frame_id = self.frame_counter;
        self.frame_counter += 1;

        let data = self.render(frame_id);
        trace!(
            "Generated synthetic frame {} ({}x{}, {} bytes)",
            frame_id,
            self.width,
            self.height,
            data.len()
        );

        Ok(Frame::new(
            frame_id,
            data,
            self.width,
            self.height,
            PixelFormat::Rgb24,
        ))
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn describe(&self) -> String {
        format!("synthetic {}x{}", self.width, self.height)
    }
}
