use super::controller::LoopController;
use super::runtime::install_signal_handlers;
use super::stats::LoopStats;
use crate::analysis::McpAnalysisClient;
use crate::camera::{FrameSource, FrameSourceBuilder};
use crate::config::RobowatchConfig;
use crate::error::Result;
use crate::presenter::Presenter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Controller wired to the real device source and MCP client
pub type DefaultController =
    LoopController<Box<dyn FrameSource>, McpAnalysisClient, Box<dyn Presenter>>;

/// Command-line overrides applied at startup
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    pub synthetic_camera: bool,
    pub max_iterations: Option<u64>,
}

/// Validate the configuration and acquire every collaborator.
///
/// Any error here is fatal: the loop never starts.
pub fn build_controller(
    config: Arc<RobowatchConfig>,
    options: &StartupOptions,
    presenter: Box<dyn Presenter>,
) -> Result<DefaultController> {
    info!("Initializing robowatch components");

    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    let source = FrameSourceBuilder::new()
        .config(config.camera.clone())
        .synthetic(options.synthetic_camera)
        .build()
        .map_err(|e| {
            error!("Failed to acquire frame source: {}", e);
            e
        })?;

    let client = McpAnalysisClient::new(&config.analysis).map_err(|e| {
        error!("Failed to create analysis client: {}", e);
        e
    })?;

    info!(
        "Components ready: source {}, agent {}, endpoint {}",
        source.describe(),
        config.analysis.agent_id,
        config.analysis.endpoint
    );

    Ok(LoopController::new(config, source, client, presenter)
        .with_max_iterations(options.max_iterations))
}

/// Build the controller, wire SIGINT/SIGTERM to cancellation and run the
/// loop to completion
pub async fn run(
    config: Arc<RobowatchConfig>,
    options: StartupOptions,
    presenter: Box<dyn Presenter>,
) -> Result<LoopStats> {
    let controller = build_controller(config, &options, presenter)?;

    let cancel = CancellationToken::new();
    install_signal_handlers(cancel.clone());

    Ok(controller.run(cancel).await)
}
