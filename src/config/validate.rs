//! Config validation logic.
//! Verifies retry settings, source/destination existence, and that no destination
//! lives inside its own source tree. Canonicalizes location roots in place.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

use super::types::Config;
use crate::errors::StagingError;

/// Validate settings and rewrite every location root to its canonical form.
/// Missing source and destination roots are created.
pub fn validate_and_normalize(cfg: &mut Config) -> Result<()> {
    if cfg.move_retry_count < 1 {
        return Err(StagingError::InvalidSetting {
            name: "move_retry_count",
            reason: "must be at least 1".into(),
        }
        .into());
    }
    if cfg.locations.is_empty() {
        warn!("No locations configured; nothing will be watched");
    }

    let mut normalized = Vec::with_capacity(cfg.locations.len());
    for loc in &cfg.locations {
        ensure_dir_is_or_create(loc.source(), "source")?;
        ensure_dir_is_or_create(loc.destination(), "destination")?;

        let src_real = dunce::canonicalize(loc.source())
            .with_context(|| format!("canonicalize source '{}'", loc.source().display()))?;
        let dst_real = dunce::canonicalize(loc.destination()).with_context(|| {
            format!("canonicalize destination '{}'", loc.destination().display())
        })?;

        if src_real != dst_real && dst_real.starts_with(&src_real) {
            bail!(
                "destination '{}' must not be inside source '{}'",
                dst_real.display(),
                src_real.display()
            );
        }

        debug!(source = %src_real.display(), destination = %dst_real.display(), "Location validated");
        normalized.push(loc.with_roots(src_real, dst_real));
    }
    cfg.locations = normalized;

    info!(
        locations = cfg.locations.len(),
        retry_count = cfg.move_retry_count,
        retry_wait_secs = cfg.move_retry_wait.as_secs(),
        workers = cfg.worker_count(),
        "Config validated"
    );
    Ok(())
}

/// Ensure directory exists (create if missing). If it exists, it must be a directory.
fn ensure_dir_is_or_create(path: &Path, name: &str) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            error!("{name} exists but isn't a directory: {}", path.display());
            bail!("{name} exists but isn't a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path).with_context(|| {
            format!("Failed to create {name} directory '{}'", path.display())
        })?;
        info!("Created {name} directory: {}", path.display());
    }
    Ok(())
}
