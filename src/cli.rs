//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - --debug is a shorthand for --log-level debug.
//! - Flags override values from the settings file; unset flags change nothing.

use clap::{Parser, ValueHint};
use std::path::PathBuf;

use crate::config::types::{Config, LogLevel};

/// Move files from staging directories into backup trees.
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Watch staging directories and move files into backup trees with verified copies"
)]
pub struct Args {
    /// Settings file to use instead of BACKUP_STAGING_CONFIG or the default location.
    #[arg(long, short = 'c', value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(short = 'd', long, help = "Enable debug logging (shorthand for --log-level debug)")]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<LogLevel>,

    /// Write logs to this file in addition to stdout.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Emit logs in structured JSON (includes timestamp, level, and structured fields).
    #[arg(long, help = "Emit logs in structured JSON")]
    pub json: bool,

    /// Print which settings file would be used, then exit.
    #[arg(long, help = "Print the settings file location and exit")]
    pub print_config: bool,

    /// Move what is already staged, reap once, and exit.
    #[arg(long, help = "Process files already present, remove empty directories once, then exit")]
    pub once: bool,
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config value).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.clone()
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(path) = &self.log_file {
            cfg.log_file = Some(path.clone());
        }
        if self.once {
            // Files are found by the sweep, not by events.
            cfg.scan_existing = true;
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_wins_over_log_level() {
        let args = Args::try_parse_from(["backup_staging", "--log-level", "quiet", "--debug"]).unwrap();
        assert_eq!(args.effective_log_level(), Some(LogLevel::Debug));
    }

    #[test]
    fn overrides_touch_only_given_flags() {
        let args = Args::try_parse_from(["backup_staging", "--log-file", "/tmp/x.log", "--once"]).unwrap();
        let mut cfg = Config {
            scan_existing: false,
            ..Config::default()
        };
        let before = cfg.log_level.clone();
        args.apply_overrides(&mut cfg);
        assert_eq!(cfg.log_level, before);
        assert_eq!(cfg.log_file, Some(PathBuf::from("/tmp/x.log")));
        assert!(cfg.scan_existing);
    }

    #[test]
    fn bad_log_level_is_rejected() {
        assert!(Args::try_parse_from(["backup_staging", "--log-level", "loud"]).is_err());
    }
}
