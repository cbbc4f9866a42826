//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use jamoveo_core::Role;

/// JaMoveo rehearsal server.
#[derive(Parser, Debug)]
#[command(name = "jamoveo", version, about = "JaMoveo rehearsal server")]
pub struct Cli {
    /// Settings file (default `~/.jamoveo/settings.json`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// What to do; `serve` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The requested command, defaulting to `serve`.
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Serve(ServeArgs::default()))
    }
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP + WebSocket server.
    Serve(ServeArgs),
    /// Print a signed access token.
    Token(TokenArgs),
    /// Load song documents into the catalog.
    Import(ImportArgs),
}

/// Overrides for `serve`.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeArgs {
    /// Host to bind.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    pub port: Option<u16>,

    /// Path to the `SQLite` song catalog.
    #[arg(long)]
    pub catalog_db: Option<PathBuf>,
}

/// Arguments for `token`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct TokenArgs {
    /// Username (token subject).
    #[arg(long)]
    pub username: String,

    /// Role granted by the token.
    #[arg(long, value_enum, default_value_t = RoleArg::Member)]
    pub role: RoleArg,

    /// Instrument; defaults to vocals.
    #[arg(long)]
    pub instrument: Option<String>,

    /// Lifetime in minutes (overrides settings).
    #[arg(long)]
    pub ttl_minutes: Option<u64>,
}

/// Arguments for `import`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ImportArgs {
    /// JSON files holding one song or an array of songs.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Path to the `SQLite` song catalog.
    #[arg(long)]
    pub catalog_db: Option<PathBuf>,
}

/// `--role` values.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleArg {
    /// Band leader.
    Admin,
    /// Observer.
    Member,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Admin => Self::Admin,
            RoleArg::Member => Self::Member,
        }
    }
}
