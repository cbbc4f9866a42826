//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use jamoveo_auth::{JwtAuthenticator, TokenIssuer};
use jamoveo_catalog::{SongCatalog, SqliteCatalog};
use jamoveo_core::{DEFAULT_INSTRUMENT, Identity, Role};
use jamoveo_server::{JamServer, ServerConfig, ShutdownCoordinator};
use jamoveo_session::{ServiceConfig, SessionService};
use jamoveo_settings::{CatalogSettings, JamoveoSettings, jamoveo_home};
use tracing::info;

use crate::cli::{ImportArgs, ServeArgs, TokenArgs};

/// Fold `serve` flags into loaded settings. Flags win.
pub fn apply_serve_args(settings: &mut JamoveoSettings, args: &ServeArgs) {
    if let Some(host) = &args.host {
        settings.server.host.clone_from(host);
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(path) = &args.catalog_db {
        settings.catalog.db_path = path.display().to_string();
    }
}

/// Catalog file location; relative paths live under `~/.jamoveo`.
pub fn catalog_path(catalog: &CatalogSettings) -> PathBuf {
    resolve_under(&jamoveo_home(), Path::new(&catalog.db_path))
}

fn resolve_under(home: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        home.join(path)
    }
}

fn open_catalog(settings: &CatalogSettings) -> Result<SqliteCatalog> {
    let path = catalog_path(settings);
    let catalog = SqliteCatalog::open(&path)
        .with_context(|| format!("Failed to open song catalog at {}", path.display()))?;
    Ok(catalog.with_search_limit(settings.search_limit))
}

/// Run the server until Ctrl-C.
pub async fn serve(settings: &JamoveoSettings) -> Result<()> {
    let authenticator = JwtAuthenticator::new(&settings.auth.jwt_secret)
        .context("Cannot verify tokens")?;

    let catalog = open_catalog(&settings.catalog)?;
    info!(
        path = %catalog.path().display(),
        songs = catalog.count().context("Failed to count songs")?,
        "catalog ready"
    );
    let catalog: Arc<dyn SongCatalog> = Arc::new(catalog);

    let metrics = jamoveo_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let shutdown = Arc::new(ShutdownCoordinator::new());
    let (session, session_task) = SessionService::spawn(
        ServiceConfig::from(&settings.session),
        Arc::clone(&catalog),
        shutdown.child_token(),
    );

    let server = JamServer::new(
        ServerConfig::from(settings),
        session,
        Arc::new(authenticator),
        catalog,
        metrics,
    )
    .with_shutdown(Arc::clone(&shutdown));
    let (addr, http_task) = server.listen().await.context("Failed to start server")?;
    info!(%addr, "jamoveo ready");

    shutdown.cancel_on_ctrl_c().await;
    shutdown.drain(vec![http_task, session_task], None).await;
    info!("shutdown complete");
    Ok(())
}

/// Mint a token for the given identity.
pub fn issue_token(settings: &JamoveoSettings, args: &TokenArgs) -> Result<String> {
    let issuer = TokenIssuer::new(&settings.auth.jwt_secret).context("Cannot sign tokens")?;
    let identity = Identity::new(
        args.username.trim(),
        Role::from(args.role),
        args.instrument.as_deref().unwrap_or(DEFAULT_INSTRUMENT),
    );
    let minutes = args.ttl_minutes.unwrap_or(settings.auth.token_ttl_minutes);
    let minutes = i64::try_from(minutes).context("--ttl-minutes is too large")?;
    let ttl = chrono::Duration::try_minutes(minutes).context("--ttl-minutes is too large")?;
    issuer.issue(&identity, ttl).context("Failed to sign token")
}

/// Import every file; stops at the first bad one.
pub fn import(settings: &JamoveoSettings, args: &ImportArgs) -> Result<usize> {
    let mut catalog_settings = settings.catalog.clone();
    if let Some(path) = &args.catalog_db {
        catalog_settings.db_path = path.display().to_string();
    }
    let catalog = open_catalog(&catalog_settings)?;

    let mut total = 0;
    for file in &args.files {
        let imported = catalog
            .import_file(file)
            .with_context(|| format!("Failed to import {}", file.display()))?;
        info!(file = %file.display(), count = imported.len(), "imported");
        total += imported.len();
    }
    Ok(total)
}
