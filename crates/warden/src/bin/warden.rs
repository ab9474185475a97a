//! Warden - moderation log and appeal console
//!
//! Command-line interface over the moderation log and appeal stores.

use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, warn};
use warden::{
    cli::{Cli, commands, format as fmt},
    platform::{ChatRuntime, OfflineExecutor, RestExecutor},
    telemetry,
};
use warden_config::{FileProvider, WardenConfig};
use warden_moderation::{ActionExecutor, ModerationStorage, ModerationSystem};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", fmt::error(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<String> {
    // the configured subscriber does not exist yet; report loading problems
    // through a temporary one
    let bootstrap = tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || {
        FileProvider::new(&cli.config).try_load_config()
    })
    .context("Failed to load configuration")?;

    telemetry::init_subscriber(&config.logging).context("Failed to initialize logging")?;
    debug!(log_type = "config", "Running with {:?}", config);

    let (chat_runtime, executor) = connect_platform(&cli, &config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let output = runtime.block_on(async {
        let storage = ModerationStorage::new(&config.storage)
            .await
            .context("Failed to open moderation storage")?;
        let system = ModerationSystem::new(storage, executor, config.moderation_config());
        let output = commands::execute(&cli.command, &system).await;

        // a timed-out action may still land; let it journal before the
        // runtimes go away
        system.settle(config.executor.bridge_timeout()).await;
        output.map_err(anyhow::Error::from)
    });

    if let Some(chat_runtime) = chat_runtime {
        chat_runtime.shutdown();
    }
    output
}

/// Starts the platform client on its own runtime when the command needs it.
fn connect_platform(
    cli: &Cli,
    config: &WardenConfig,
) -> Result<(Option<ChatRuntime>, Arc<dyn ActionExecutor>)> {
    if !cli.command.uses_platform() {
        let offline = OfflineExecutor::new("this command does not use the chat platform");
        return Ok((None, Arc::new(offline)));
    }

    let token = match config.require_token() {
        Ok(token) => token,
        Err(e) => {
            warn!(
                log_type = "executor",
                "{}; platform actions are unavailable", e
            );
            return Ok((None, Arc::new(OfflineExecutor::new(e.to_string()))));
        }
    };

    let rest = RestExecutor::new(token, config.api_base_url.as_str())
        .context("Failed to create platform client")?;
    let (chat_runtime, bridge) =
        ChatRuntime::start(Arc::new(rest), config.executor.bridge_timeout())
            .context("Failed to start chat runtime")?;
    Ok((Some(chat_runtime), Arc::new(bridge)))
}
