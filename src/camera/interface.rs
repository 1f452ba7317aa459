use super::source::{strip_row_padding, FrameSource};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{Frame, PixelFormat};
use tracing::{debug, info, trace, warn};

use gstreamer::prelude::*;
use gstreamer::{ClockTime, MessageView, Pipeline, State};
use gstreamer_app::AppSink;
use gstreamer_video::{VideoFormat, VideoInfo};

/// How long acquisition waits for the pipeline to reach `Playing`
const STARTUP_TIMEOUT_SECONDS: u64 = 5;

/// GStreamer-based V4L2 camera. The appsink keeps only the newest buffer so
/// every pull returns a fresh frame.
pub struct CameraInterface {
    config: CameraConfig,
    device: String,
    pipeline: Pipeline,
    appsink: AppSink,
    frame_counter: u64,
    released: bool,
}

impl CameraInterface {
    /// Build the pipeline and bring it to `Playing`
    pub fn open(config: CameraConfig) -> Result<Self, CameraError> {
        let device = format!("/dev/video{}", config.index);
        info!(
            "Opening camera {} ({}x{} @ {}fps, {})",
            device, config.resolution.0, config.resolution.1, config.fps, config.format
        );

        gstreamer::init().map_err(|e| CameraError::Configuration {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        let pipeline_desc = build_pipeline_string(&config)?;
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CameraError::Configuration {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::Configuration {
                details: "Pipeline has no element named 'sink'".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::Configuration {
                details: "Element 'sink' is not an appsink".to_string(),
            })?;

        if let Err(e) = pipeline.set_state(State::Playing) {
            let details = pending_bus_error(&pipeline).unwrap_or_else(|| e.to_string());
            let _ = pipeline.set_state(State::Null);
            return Err(CameraError::DeviceOpen { device, details });
        }

        let (result, current, _pending) =
            pipeline.state(ClockTime::from_seconds(STARTUP_TIMEOUT_SECONDS));
        if let Err(e) = result {
            let details = pending_bus_error(&pipeline).unwrap_or_else(|| e.to_string());
            let _ = pipeline.set_state(State::Null);
            return Err(CameraError::DeviceOpen { device, details });
        }

        info!("Camera {} acquired (pipeline state {:?})", device, current);

        Ok(Self {
            config,
            device,
            pipeline,
            appsink,
            frame_counter: 0,
            released: false,
        })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Get current frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    fn sample_to_frame(&mut self, sample: gstreamer::Sample) -> Result<Frame, CameraError> {
        let buffer = sample.buffer().ok_or_else(|| CameraError::CaptureStream {
            details: "No buffer in sample".to_string(),
        })?;

        let caps = sample.caps().ok_or_else(|| CameraError::CaptureStream {
            details: "No caps in sample".to_string(),
        })?;

        let structure = caps.structure(0).ok_or_else(|| CameraError::CaptureStream {
            details: "Empty caps in sample".to_string(),
        })?;

        let map = buffer
            .map_readable()
            .map_err(|e| CameraError::CaptureStream {
                details: format!("Failed to map buffer: {}", e),
            })?;

        let frame_id = self.frame_counter;
        self.frame_counter += 1;

        if structure.has_name("image/jpeg") {
            let width = caps_dimension(structure, "width")?;
            let height = caps_dimension(structure, "height")?;

            trace!(
                "Captured MJPEG frame {} ({}x{}, {} bytes)",
                frame_id,
                width,
                height,
                map.len()
            );

            return Ok(Frame::new(
                frame_id,
                map.as_slice().to_vec(),
                width,
                height,
                PixelFormat::Mjpeg,
            ));
        }

        let video_info = VideoInfo::from_caps(caps).map_err(|e| CameraError::CaptureStream {
            details: format!("Failed to get video info: {}", e),
        })?;

        let format = match video_info.format() {
            VideoFormat::Rgb => PixelFormat::Rgb24,
            VideoFormat::Yuy2 => PixelFormat::Yuyv,
            VideoFormat::Gray8 => PixelFormat::Gray8,
            other => {
                return Err(CameraError::CaptureStream {
                    details: format!("Unsupported raw video format {:?}", other),
                })
            }
        };

        let width = video_info.width();
        let height = video_info.height();
        let row_bytes = width as usize * format.bytes_per_pixel();
        let stride = video_info.stride()[0].max(0) as usize;

        let data = strip_row_padding(map.as_slice(), row_bytes, stride, height as usize)
            .ok_or_else(|| CameraError::CaptureStream {
                details: format!(
                    "Buffer of {} bytes too short for {}x{} {:?} (stride {})",
                    map.len(),
                    width,
                    height,
                    format,
                    stride
                ),
            })?;

        trace!(
            "Captured raw frame {} ({}x{} {:?}, {} bytes)",
            frame_id,
            width,
            height,
            format,
            data.len()
        );

        Ok(Frame::new(frame_id, data, width, height, format))
    }
}

impl FrameSource for CameraInterface {
    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        if self.released {
            return Err(CameraError::NoFrame {
                details: format!("{} has been released", self.device),
            });
        }

        let timeout = ClockTime::from_mseconds(self.config.pull_timeout_ms);
        match self.appsink.try_pull_sample(timeout) {
            Some(sample) => self.sample_to_frame(sample),
            None => {
                let details = pending_bus_error(&self.pipeline).unwrap_or_else(|| {
                    if self.appsink.is_eos() {
                        format!("{} reached end of stream", self.device)
                    } else {
                        format!(
                            "no sample from {} within {}ms",
                            self.device, self.config.pull_timeout_ms
                        )
                    }
                });
                Err(CameraError::NoFrame { details })
            }
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Err(e) = self.pipeline.set_state(State::Null) {
            warn!("Failed to stop GStreamer pipeline for {}: {}", self.device, e);
        } else {
            info!("Camera {} released", self.device);
        }
    }

    fn describe(&self) -> String {
        self.device.clone()
    }
}

impl Drop for CameraInterface {
    fn drop(&mut self) {
        if !self.released {
            debug!("Releasing camera {} on drop", self.device);
            self.release();
        }
    }
}

/// Build GStreamer pipeline string for the configured capture format
fn build_pipeline_string(config: &CameraConfig) -> Result<String, CameraError> {
    if let Some(pipeline) = &config.pipeline {
        return Ok(pipeline.clone());
    }

    let (width, height) = config.resolution;
    let fps = config.fps;
    let device_index = config.index;
    let sink = "appsink name=sink sync=false max-buffers=1 drop=true emit-signals=false";

    let pipeline = match config.format.to_ascii_uppercase().as_str() {
        "MJPG" | "MJPEG" => format!(
            "v4l2src device=/dev/video{} io-mode=mmap do-timestamp=true ! \
             image/jpeg,width={},height={},framerate={}/1 ! {}",
            device_index, width, height, fps, sink
        ),
        "RGB" => format!(
            "v4l2src device=/dev/video{} do-timestamp=true ! \
             video/x-raw,width={},height={},framerate={}/1 ! \
             videoconvert ! video/x-raw,format=RGB ! {}",
            device_index, width, height, fps, sink
        ),
        "YUYV" => format!(
            "v4l2src device=/dev/video{} do-timestamp=true ! \
             video/x-raw,format=YUY2,width={},height={},framerate={}/1 ! {}",
            device_index, width, height, fps, sink
        ),
        other => {
            return Err(CameraError::Configuration {
                details: format!("Unsupported camera format '{}'", other),
            })
        }
    };

    Ok(pipeline)
}

fn caps_dimension(structure: &gstreamer::StructureRef, field: &str) -> Result<u32, CameraError> {
    structure
        .get::<i32>(field)
        .map(|value| value.max(0) as u32)
        .map_err(|e| CameraError::CaptureStream {
            details: format!("Missing {} in caps: {}", field, e),
        })
}

/// Drain the bus and return the first error message, if any
fn pending_bus_error(pipeline: &Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    while let Some(message) = bus.pop_filtered(&[gstreamer::MessageType::Error]) {
        if let MessageView::Error(err) = message.view() {
            return Some(match err.debug() {
                Some(debug) => format!("{} ({})", err.error(), debug),
                None => err.error().to_string(),
            });
        }
    }
    None
}
