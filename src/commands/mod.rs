use crate::cli::Cmd;
use crate::core::config::default_config_path;
use std::path::{Path, PathBuf};

pub mod enrich;
pub mod models;
pub mod render;
pub mod schema;

/// Dispatches the parsed command to the appropriate handler.
pub async fn dispatch(command: Cmd) -> Result<(), String> {
    match command {
        Cmd::Enrich(args) => enrich::run(&args).await,
        Cmd::Render { preset, input, row } => render::run(&preset, &input, row),
        Cmd::Schema { preset } => schema::run(&preset),
        Cmd::Models {
            integration,
            integrations,
        } => models::run(integrations.as_deref(), integration.as_deref()),
    }
}

/// Integrations file given on the command line, or the default one.
fn integrations_path(explicit: Option<&Path>) -> Result<PathBuf, String> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path(),
    }
}
