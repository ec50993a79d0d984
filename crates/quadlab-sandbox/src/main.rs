//! Opens a window and renders a quad whose red channel pulses over time.
//!
//! Press Q to quit. `RUST_LOG` controls log output.

mod app;
mod config;
mod lifecycle;
mod pulse;
mod scene;

use anyhow::Result;
use quadlab_engine::logging::{init_logging, LoggingConfig};
use quadlab_engine::window::Runtime;

use crate::app::Sandbox;
use crate::config::SandboxConfig;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = SandboxConfig::default();
    Runtime::run(config.runtime_config(), Sandbox::new(config))
}
