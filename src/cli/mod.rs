//! Command-line interface for questline.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use crate::domain::errors::DomainError;

/// Print a failed command's error and exit non-zero.
///
/// Domain errors carry their kind so scripts can tell a missing record from a
/// lost race.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let kind = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<DomainError>())
        .map(|e| e.kind().as_str());

    if json_mode {
        let body = serde_json::json!({
            "error": format!("{err:#}"),
            "kind": kind,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
