mod controller;
mod pacing;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod stats;
mod types;


pub use controller::LoopController;
pub use pacing::Pacer;
pub use runtime::install_signal_handlers;
pub use startup::{build_controller, run, DefaultController, StartupOptions};
pub use state::LoopState;
pub use stats::LoopStats;
pub use types::{FailureStage, IterationFailure, IterationOutcome, ShutdownReason};
