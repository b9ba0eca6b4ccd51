pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod history;
pub mod layout;
pub mod loader;
pub mod logging;
pub mod render;
pub mod storage;
pub mod template;

pub use error::{EngineError, EngineResult};

/// Entrypoint used by the `memeforge` binary.
pub fn run(cli: cli::Cli) -> anyhow::Result<()> {
    logging::init();
    tracing::info!("starting memeforge");
    cli::run(cli)
}
