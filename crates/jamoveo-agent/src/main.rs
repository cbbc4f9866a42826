//! # jamoveo
//!
//! Server binary: loads settings, installs logging, then serves, mints a
//! token or imports songs.

#![deny(unsafe_code)]

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use jamoveo_settings::{load_settings_from_path, settings_path};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    let command = cli.command();
    if let Command::Serve(args) = &command {
        commands::apply_serve_args(&mut settings, args);
    }

    jamoveo_logging::init_logging(&settings.logging).context("Failed to initialize logging")?;
    tracing::debug!(path = %path.display(), "settings loaded");

    match command {
        Command::Serve(_) => commands::serve(&settings).await,
        Command::Token(args) => {
            let token = commands::issue_token(&settings, &args)?;
            println!("{token}");
            Ok(())
        }
        Command::Import(args) => {
            let count = commands::import(&settings, &args)?;
            println!("imported {count} songs");
            Ok(())
        }
    }
}
