pub mod analysis;
pub mod app;
pub mod camera;
pub mod config;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod normalize;
pub mod presenter;

pub use analysis::{AnalysisClient, AnalysisRequest, McpAnalysisClient, RawReply};
pub use app::{
    build_controller, install_signal_handlers, run, DefaultController, FailureStage,
    IterationFailure, IterationOutcome, LoopController, LoopState, LoopStats, Pacer,
    ShutdownReason, StartupOptions,
};
pub use camera::{FrameSource, FrameSourceBuilder, SyntheticFrameSource};
pub use config::RobowatchConfig;
pub use encoder::{EncodedPayload, FrameEncoder, TransferEncoding};
pub use error::{AnalysisError, CameraError, EncodeError, Result, RobowatchError};
pub use frame::{Frame, PixelFormat};
pub use normalize::{normalize, AnalysisResult};
pub use presenter::{stdout_presenter, ConsolePresenter, JsonPresenter, Presenter};
