use crate::error::CameraError;
use crate::frame::Frame;

/// Producer of raw frames for the capture loop.
///
/// `next_frame` must return within a bounded time. A transient lack of data is
/// reported as [`CameraError::NoFrame`] so the caller can skip the cycle; the
/// source stays usable afterwards.
pub trait FrameSource: Send {
    /// Pull the most recent frame from the device
    fn next_frame(&mut self) -> Result<Frame, CameraError>;

    /// Release the underlying device. Called once when the loop stops.
    fn release(&mut self) {}

    /// Human-readable device name for logs
    fn describe(&self) -> String;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        (**self).next_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Copy `height` rows of `row_bytes` out of a buffer whose rows are `stride`
/// bytes apart. Returns `None` when the buffer is too short.
pub fn strip_row_padding(
    data: &[u8],
    row_bytes: usize,
    stride: usize,
    height: usize,
) -> Option<Vec<u8>> {
    if stride < row_bytes {
        return None;
    }
    if height == 0 {
        return Some(Vec::new());
    }

    let required = stride * (height - 1) + row_bytes;
    if data.len() < required {
        return None;
    }

    if stride == row_bytes {
        return Some(data[..row_bytes * height].to_vec());
    }

    let mut packed = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        packed.extend_from_slice(&data[start..start + row_bytes]);
    }
    Some(packed)
}
