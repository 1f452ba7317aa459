use super::source::FrameSource;
use super::synthetic::SyntheticFrameSource;
use crate::config::{CameraConfig, CameraSource};
use crate::error::{RobowatchError, Result};
use tracing::info;

/// Builder that acquires the configured frame source.
///
/// Acquisition failure is fatal for the process: the loop never starts
/// without a source.
pub struct FrameSourceBuilder {
    config: Option<CameraConfig>,
    force_synthetic: bool,
}

impl FrameSourceBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            force_synthetic: false,
        }
    }

    pub fn config(mut self, config: CameraConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use the synthetic pattern regardless of `camera.source`
    pub fn synthetic(mut self, force: bool) -> Self {
        self.force_synthetic = force;
        self
    }

    pub fn build(self) -> Result<Box<dyn FrameSource>> {
        let config = self
            .config
            .ok_or_else(|| RobowatchError::system("Camera configuration must be specified"))?;

        let source = if self.force_synthetic {
            CameraSource::Synthetic
        } else {
            config.source
        };

        match source {
            CameraSource::Synthetic => {
                info!(
                    "Using synthetic frame source ({}x{})",
                    config.resolution.0, config.resolution.1
                );
                Ok(Box::new(SyntheticFrameSource::new(config.resolution)))
            }
            CameraSource::Device => open_device(config),
        }
    }
}

impl Default for FrameSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(target_os = "linux", feature = "camera"))]
fn open_device(config: CameraConfig) -> Result<Box<dyn FrameSource>> {
    let camera = super::interface::CameraInterface::open(config)?;
    Ok(Box::new(camera))
}

#[cfg(not(all(target_os = "linux", feature = "camera")))]
fn open_device(config: CameraConfig) -> Result<Box<dyn FrameSource>> {
    Err(crate::error::CameraError::DeviceOpen {
        device: format!("/dev/video{}", config.index),
        details: "built without camera support (enable the `camera` feature on Linux)"
            .to_string(),
    }
    .into())
}
