//! Core configuration types.
//! - Location and Replacement describe one source tree and how its paths map into a destination tree.
//! - Config holds the runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::StagingError;

use super::{
    DEFAULT_MOVE_RETRY_COUNT, DEFAULT_MOVE_RETRY_WAIT, DEFAULT_REAP_INTERVAL,
    DEFAULT_REAP_STALENESS, DEFAULT_THREADS,
};
use super::paths;

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// A literal name substitution applied to rewritten destination paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    source_name: String,
    destination_name: String,
}

impl Replacement {
    pub fn new(
        source_name: impl Into<String>,
        destination_name: impl Into<String>,
    ) -> Result<Self, StagingError> {
        let source_name = source_name.into();
        let destination_name = destination_name.into();
        if source_name.is_empty() {
            return Err(StagingError::EmptyField { field: "source_name" });
        }
        if destination_name.is_empty() {
            return Err(StagingError::EmptyField { field: "destination_name" });
        }
        Ok(Self {
            source_name,
            destination_name,
        })
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn destination_name(&self) -> &str {
        &self.destination_name
    }
}

/// A watched source root, the destination root it maps onto, and the
/// ordered replacements applied to every rewritten path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    source: PathBuf,
    destination: PathBuf,
    replacements: Vec<Replacement>,
}

impl Location {
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Result<Self, StagingError> {
        let source = source.into();
        let destination = destination.into();
        check_root("source", &source)?;
        check_root("destination", &destination)?;
        Ok(Self {
            source,
            destination,
            replacements: Vec::new(),
        })
    }

    /// Builder-style helper; replacements keep the order they are added in.
    pub fn with_replacements(mut self, replacements: impl IntoIterator<Item = Replacement>) -> Self {
        self.replacements.extend(replacements);
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn replacements(&self) -> &[Replacement] {
        &self.replacements
    }

    /// True when files would be rewritten onto themselves.
    pub fn is_identity(&self) -> bool {
        self.source == self.destination && self.replacements.is_empty()
    }

    /// Replace both roots, keeping replacements. Used after canonicalization.
    pub(crate) fn with_roots(&self, source: PathBuf, destination: PathBuf) -> Self {
        Self {
            source,
            destination,
            replacements: self.replacements.clone(),
        }
    }
}

fn check_root(field: &'static str, path: &Path) -> Result<(), StagingError> {
    if path.as_os_str().is_empty() {
        return Err(StagingError::EmptyField { field });
    }
    if !path.is_absolute() {
        return Err(StagingError::RelativePath {
            field,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Runtime configuration used by the staging service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Source/destination mappings, one watcher root each
    pub locations: Vec<Location>,
    /// Attempts per cycle before a task goes back to the queue
    pub move_retry_count: u32,
    /// Pause after each failed attempt
    pub move_retry_wait: Duration,
    /// Requested worker threads; values below 1 are relative to the CPU count
    pub threads: i32,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
    /// Keep the previous log file contents instead of truncating at start
    pub append_log: bool,
    /// Period between empty-directory sweeps
    pub reap_interval: Duration,
    /// Minimum age of an empty directory before it is removed
    pub reap_staleness: Duration,
    /// Enqueue files already present in source trees at start
    pub scan_existing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locations: Vec::new(),
            move_retry_count: DEFAULT_MOVE_RETRY_COUNT,
            move_retry_wait: DEFAULT_MOVE_RETRY_WAIT,
            threads: DEFAULT_THREADS,
            log_level: LogLevel::Normal,
            log_file: paths::default_log_path(),
            append_log: false,
            reap_interval: DEFAULT_REAP_INTERVAL,
            reap_staleness: DEFAULT_REAP_STALENESS,
            scan_existing: true,
        }
    }
}

impl Config {
    /// Construct a Config with explicit locations; other fields use defaults.
    pub fn new(locations: Vec<Location>) -> Self {
        Self {
            locations,
            ..Default::default()
        }
    }

    /// Number of worker threads to start for this machine.
    pub fn worker_count(&self) -> usize {
        resolve_threads(self.threads, num_cpus::get())
    }
}

/// Map the configured thread setting onto the available processors.
/// - n >= 1: n, capped at the processor count
/// - n <= 0: processors + n, never below 1
pub(crate) fn resolve_threads(requested: i32, processors: usize) -> usize {
    let processors = processors.max(1);
    if requested >= 1 {
        (requested as usize).min(processors)
    } else {
        let back_off = requested.unsigned_abs() as usize;
        if back_off >= processors {
            1
        } else {
            processors - back_off
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacement_rejects_empty_names() {
        assert!(matches!(
            Replacement::new("", "x"),
            Err(StagingError::EmptyField { field: "source_name" })
        ));
        assert!(matches!(
            Replacement::new("x", ""),
            Err(StagingError::EmptyField { field: "destination_name" })
        ));
    }

    #[test]
    fn location_requires_absolute_roots() {
        assert!(matches!(
            Location::new("", "/out"),
            Err(StagingError::EmptyField { field: "source" })
        ));
        assert!(matches!(
            Location::new("relative/src", "/out"),
            Err(StagingError::RelativePath { field: "source", .. })
        ));
        assert!(Location::new(root_path("stage"), root_path("out")).is_ok());
    }

    #[test]
    fn identity_location_detected() {
        let loc = Location::new(root_path("stage"), root_path("stage")).unwrap();
        assert!(loc.is_identity());
        let loc = loc.with_replacements([Replacement::new("a", "b").unwrap()]);
        assert!(!loc.is_identity());
    }

    #[test]
    fn threads_resolve_against_processor_count() {
        assert_eq!(resolve_threads(1, 8), 1);
        assert_eq!(resolve_threads(4, 8), 4);
        assert_eq!(resolve_threads(16, 8), 8);
        assert_eq!(resolve_threads(0, 8), 8);
        assert_eq!(resolve_threads(-1, 8), 7);
        assert_eq!(resolve_threads(-8, 8), 1);
        assert_eq!(resolve_threads(-20, 8), 1);
        assert_eq!(resolve_threads(3, 0), 1);
    }

    #[test]
    fn log_level_parses_aliases() {
        assert_eq!(LogLevel::parse("TRACE"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("verbose"), Some(LogLevel::Info));
        assert_eq!("quiet".parse::<LogLevel>().unwrap(), LogLevel::Quiet);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    fn root_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(name)
    }
}
