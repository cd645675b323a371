//! Application orchestrator.
//! Loads settings, initializes logging, installs signal handlers, validates locations,
//! and runs the staging service until interrupted (or until drained with --once).

use anyhow::{Context, Result};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

use backup_staging::cli::Args;
use backup_staging::config::{LoadResult, default_config_path, load_or_init, validate_and_normalize};
use backup_staging::output as out;
use backup_staging::{StagingService, shutdown};

use crate::logging::init_tracing;

const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Run the CLI application.
pub fn run(args: Args) -> Result<()> {
    // Handle --print-config before logging init
    if args.print_config {
        print_config_location(&args);
        return Ok(());
    }

    let loaded = load_or_init(args.config.as_deref())?;
    if let LoadResult::CreatedDefault { path, .. } = &loaded {
        out::print_success(&format!("Default settings were written to: {}", path.display()));
        out::print_info("Edit the <locations> section to map staging directories onto backup directories.");
    }
    let settings_path = loaded.path().to_path_buf();
    let mut cfg = loaded.into_config();
    args.apply_overrides(&mut cfg);

    // Held until return so buffered file logs are flushed.
    let _guard = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), cfg.append_log, args.json)
        .inspect_err(|e| out::print_error(&format!("Failed to initialize logging: {e}")))?;

    ctrlc::set_handler(|| {
        shutdown::request();
        out::print_warn("Received interrupt; shutting down gracefully...");
    })
    .context("install signal handler")?;

    info!(settings = %settings_path.display(), "Starting backup_staging");
    debug!("{:?}", args);

    let result = (|| -> Result<()> {
        validate_and_normalize(&mut cfg)?;
        let mut service = StagingService::start(cfg)?;

        if args.once {
            while !shutdown::is_requested() && !service.wait_idle(SHUTDOWN_POLL) {}
            let reaped = service.reap_now();
            debug!(visited = reaped.visited, removed = reaped.removed, "Final reap");
        } else {
            while !shutdown::is_requested() {
                thread::sleep(SHUTDOWN_POLL);
            }
        }

        service.stop();
        Ok(())
    })();

    if let Err(e) = &result {
        error!(error = ?e, "backup_staging failed");
    }
    result
}

fn print_config_location(args: &Args) {
    let (path, origin) = match &args.config {
        Some(p) => (Some(p.clone()), "--config"),
        None if std::env::var_os(backup_staging::config::CONFIG_ENV).is_some() => {
            (default_config_path(), "BACKUP_STAGING_CONFIG")
        }
        None => (default_config_path(), "default location"),
    };
    match path {
        Some(p) => {
            out::print_info(&format!("Settings file ({origin}):\n  {}\n", p.display()));
            if p.exists() {
                out::print_info("A settings file already exists at that location.");
            } else {
                out::print_info("No settings file exists there yet. Run without --print-config to create one.");
            }
        }
        None => out::print_error("Could not determine a settings file location"),
    }
}
