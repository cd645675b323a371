//! XML settings support.
//! - Loads settings.xml (quick_xml + serde) into a Config.
//! - Writes a default settings file when none exists, so the next run finds it.
//!
//! Notes:
//! - This module only reads/writes the settings file; directory validation happens elsewhere.
//! - Unknown XML fields are rejected so misconfigurations surface at startup.

use anyhow::{anyhow, bail, Context, Result};
use quick_xml::de::from_str as from_xml_str;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::paths::{default_config_path, default_staging_dir, path_has_symlink_ancestor};
use super::types::{Config, Location, LogLevel, Replacement};
use crate::platform::{set_dir_mode_0700, set_file_mode_0600, write_settings_atomic_0600};

/// Struct mirroring the XML settings for (de)serialization.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename = "settings", deny_unknown_fields)]
struct XmlSettings {
    #[serde(default)]
    locations: XmlLocations,
    #[serde(default, deserialize_with = "de_trimmed_opt", skip_serializing_if = "Option::is_none")]
    move_retry_count: Option<u32>,
    /// Seconds
    #[serde(default, deserialize_with = "de_trimmed_opt", skip_serializing_if = "Option::is_none")]
    move_retry_wait: Option<u64>,
    #[serde(default, deserialize_with = "de_trimmed_opt", skip_serializing_if = "Option::is_none")]
    threads: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log_file: Option<String>,
    #[serde(default, deserialize_with = "de_trimmed_opt", skip_serializing_if = "Option::is_none")]
    append_log: Option<bool>,
    #[serde(default, deserialize_with = "de_trimmed_opt", skip_serializing_if = "Option::is_none")]
    reap_interval_seconds: Option<u64>,
    #[serde(default, deserialize_with = "de_trimmed_opt", skip_serializing_if = "Option::is_none")]
    reap_staleness_seconds: Option<u64>,
    #[serde(default, deserialize_with = "de_trimmed_opt", skip_serializing_if = "Option::is_none")]
    scan_existing: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct XmlLocations {
    #[serde(rename = "location", default)]
    items: Vec<XmlLocation>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct XmlLocation {
    source: String,
    destination: String,
    #[serde(default)]
    replacements: XmlReplacements,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct XmlReplacements {
    #[serde(rename = "replacement", default)]
    items: Vec<XmlReplacement>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct XmlReplacement {
    source_name: String,
    destination_name: String,
}

/// Outcome of resolving the settings file at startup.
#[derive(Debug)]
pub enum LoadResult {
    /// Settings were read from an existing file.
    Loaded { config: Config, path: PathBuf },
    /// No file existed; defaults were written there and returned.
    CreatedDefault { config: Config, path: PathBuf },
}

impl LoadResult {
    pub fn config(&self) -> &Config {
        match self {
            LoadResult::Loaded { config, .. } | LoadResult::CreatedDefault { config, .. } => config,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            LoadResult::Loaded { path, .. } | LoadResult::CreatedDefault { path, .. } => path,
        }
    }

    pub fn into_config(self) -> Config {
        match self {
            LoadResult::Loaded { config, .. } | LoadResult::CreatedDefault { config, .. } => config,
        }
    }
}

// Trims surrounding whitespace before parsing; empty elements count as absent.
fn de_trimmed_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    use serde::de::Error;
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(None),
        Some(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<T>()
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid value '{trimmed}': {e}")))
        }
    }
}

/// Load the settings at `explicit` (or the default path). When the file does
/// not exist, defaults are synthesized, written to that path and returned.
pub fn load_or_init(explicit: Option<&Path>) -> Result<LoadResult> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => default_config_path()
            .ok_or_else(|| anyhow!("could not determine a settings file location"))?,
    };

    if path.exists() {
        let config = load_config_from_xml_path(&path)?;
        debug!(path = %path.display(), locations = config.locations.len(), "Loaded settings");
        return Ok(LoadResult::Loaded { config, path });
    }

    let config = default_settings()?;
    save_config_to_xml_path(&config, &path)?;
    info!(path = %path.display(), "Created default settings");
    Ok(LoadResult::CreatedDefault { config, path })
}

/// Defaults used when no settings file exists: one identity location rooted
/// at the per-user staging directory.
fn default_settings() -> Result<Config> {
    let staging = default_staging_dir()
        .ok_or_else(|| anyhow!("could not determine a default staging directory"))?;
    let location = Location::new(&staging, &staging)?;
    Ok(Config::new(vec![location]))
}

/// Load a Config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read settings xml '{}'", path.display()))?;
    let parsed: XmlSettings = from_xml_str(&contents)
        .with_context(|| format!("parse settings xml '{}'", path.display()))?;
    xml_to_config(parsed).with_context(|| format!("invalid settings in '{}'", path.display()))
}

// Map XmlSettings -> Config
fn xml_to_config(parsed: XmlSettings) -> Result<Config> {
    let mut cfg = Config::default();

    for (idx, loc) in parsed.locations.items.into_iter().enumerate() {
        let replacements = loc
            .replacements
            .items
            .into_iter()
            .map(|r| Replacement::new(r.source_name, r.destination_name))
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("location #{}", idx + 1))?;
        let location = Location::new(loc.source.trim(), loc.destination.trim())
            .with_context(|| format!("location #{}", idx + 1))?
            .with_replacements(replacements);
        cfg.locations.push(location);
    }

    if let Some(n) = parsed.move_retry_count {
        cfg.move_retry_count = n;
    }
    if let Some(secs) = parsed.move_retry_wait {
        cfg.move_retry_wait = Duration::from_secs(secs);
    }
    if let Some(t) = parsed.threads {
        cfg.threads = t;
    }
    if let Some(s) = parsed.log_level.as_deref() {
        cfg.log_level = s
            .trim()
            .parse::<LogLevel>()
            .map_err(|e| anyhow!(e))?;
    }
    if let Some(s) = parsed.log_file.as_deref() {
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            cfg.log_file = Some(PathBuf::from(trimmed));
        }
    }
    if let Some(b) = parsed.append_log {
        cfg.append_log = b;
    }
    if let Some(secs) = parsed.reap_interval_seconds {
        cfg.reap_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = parsed.reap_staleness_seconds {
        cfg.reap_staleness = Duration::from_secs(secs);
    }
    if let Some(b) = parsed.scan_existing {
        cfg.scan_existing = b;
    }

    Ok(cfg)
}

fn config_to_xml(cfg: &Config) -> XmlSettings {
    let items = cfg
        .locations
        .iter()
        .map(|loc| XmlLocation {
            source: loc.source().display().to_string(),
            destination: loc.destination().display().to_string(),
            replacements: XmlReplacements {
                items: loc
                    .replacements()
                    .iter()
                    .map(|r| XmlReplacement {
                        source_name: r.source_name().to_string(),
                        destination_name: r.destination_name().to_string(),
                    })
                    .collect(),
            },
        })
        .collect();

    XmlSettings {
        locations: XmlLocations { items },
        move_retry_count: Some(cfg.move_retry_count),
        move_retry_wait: Some(cfg.move_retry_wait.as_secs()),
        threads: Some(cfg.threads),
        log_level: Some(cfg.log_level.to_string()),
        log_file: cfg.log_file.as_ref().map(|p| p.display().to_string()),
        append_log: Some(cfg.append_log),
        reap_interval_seconds: Some(cfg.reap_interval.as_secs()),
        reap_staleness_seconds: Some(cfg.reap_staleness.as_secs()),
        scan_existing: Some(cfg.scan_existing),
    }
}

const SETTINGS_HEADER: &str = "<!--\n  backup_staging settings (XML)\n\n    locations/location     -> source tree to watch and the destination tree it maps onto\n    replacements           -> ordered literal substitutions applied to destination paths\n    move_retry_count       -> attempts before a file goes back to the end of the queue\n    move_retry_wait        -> seconds to wait after a failed attempt\n    threads                -> worker threads; 0 or negative is relative to the CPU count\n    log_level              -> quiet | normal | info | debug\n    log_file               -> path to log file (optional; stdout is always used)\n    append_log             -> keep previous log contents at start (default false)\n    reap_interval_seconds  -> how often empty source directories are swept\n    reap_staleness_seconds -> minimum age of an empty directory before removal\n    scan_existing          -> move files already present when the service starts\n-->\n";

/// Serialize `cfg` and write it atomically to `path` (0600 on Unix).
pub fn save_config_to_xml_path(cfg: &Config, path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        bail!(
            "Refusing to write settings: ancestor of {} is a symlink",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        let existed = parent.exists();
        fs::create_dir_all(parent)
            .with_context(|| format!("create settings directory '{}'", parent.display()))?;
        if !existed {
            let _ = set_dir_mode_0700(parent);
        }
    }

    let mut body = String::new();
    let mut ser = quick_xml::se::Serializer::new(&mut body);
    ser.indent(' ', 2);
    config_to_xml(cfg)
        .serialize(ser)
        .context("serialize settings xml")?;

    let mut content = String::with_capacity(SETTINGS_HEADER.len() + body.len() + 1);
    content.push_str(SETTINGS_HEADER);
    content.push_str(&body);
    content.push('\n');

    write_settings_atomic_0600(path, content.as_bytes())?;
    let _ = set_file_mode_0600(path);
    Ok(())
}
