//! # Command Dispatch
//!
//! Startup order matters: replay the journal first (records), then open the
//! registry (catalog, shard versions, unique indexes), and only then bind
//! the HTTP surface: a half-recovered engine must never accept requests.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::config::EngineConfig;
use crate::events::EventBus;
use crate::executor::CrudExecutor;
use crate::http::{AppState, HttpServer};
use crate::observability::{log, Severity};
use crate::schema::{CatalogStore, RecordInventory, SchemaRegistry};
use crate::store::RecordStore;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Parse arguments and run the selected command.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    match cli.command {
        Command::Init { config } => init(&config),
        Command::Serve { config } => serve(&config),
    }
}

fn init(config_path: &Path) -> CliResult<()> {
    let mut config = EngineConfig::default();
    // The data directory lives next to the config file by default.
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            config.data_dir = parent.join("lodestone_data");
        }
    }
    config.save(config_path)?;
    fs::create_dir_all(&config.data_dir)?;
    log(
        Severity::Info,
        "init.done",
        &[
            ("config", &config_path.display().to_string()),
            ("data_dir", &config.data_dir.display().to_string()),
        ],
    );
    Ok(())
}

fn serve(config_path: &Path) -> CliResult<()> {
    let config = EngineConfig::load(config_path)?;
    let state = build_state(&config)?;
    let server = HttpServer::new(config.http.clone(), state);

    let runtime = tokio::runtime::Runtime::new().map_err(|e| CliError::Server(e.to_string()))?;
    runtime
        .block_on(server.start())
        .map_err(|e| CliError::Server(e.to_string()))
}

/// Wire the engine: store (journal replay), registry (catalog), bus,
/// executor, identity boundary.
pub fn build_state(config: &EngineConfig) -> CliResult<Arc<AppState>> {
    fs::create_dir_all(&config.data_dir)?;

    let store = Arc::new(RecordStore::open(&config.data_dir)?);
    let registry = Arc::new(SchemaRegistry::open(
        CatalogStore::new(&config.data_dir),
        Arc::clone(&store) as Arc<dyn RecordInventory>,
    )?);
    let bus = Arc::new(EventBus::new(
        Arc::clone(&registry),
        config.limits.subscriber_queue_capacity,
    ));
    let executor = Arc::new(CrudExecutor::new(
        registry,
        store,
        Arc::clone(&bus),
        config.limits.clone(),
    ));

    log(
        Severity::Info,
        "engine.ready",
        &[("data_dir", &config.data_dir.display().to_string())],
    );

    Ok(Arc::new(AppState::new(
        executor,
        bus,
        TokenVerifier::new(&config.auth.token_secret),
    )))
}
