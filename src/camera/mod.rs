mod builder;
#[cfg(all(target_os = "linux", feature = "camera"))]
mod interface;
mod source;
mod synthetic;

pub use builder::FrameSourceBuilder;
#[cfg(all(target_os = "linux", feature = "camera"))]
pub use interface::CameraInterface;
pub use source::{strip_row_padding, FrameSource};
pub use synthetic::SyntheticFrameSource;
