//! Tunable constants, with INI-file overrides for host-side tooling.
//!
//! The hard-coded defaults always match this system's designed operating
//! point; the INI file exists so a host tool can experiment without a
//! recompile.

use std::path::PathBuf;

use anyhow::{Context, Result};
use configparser::ini::Ini;

/// Tunable constants for the capture/decode/program pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Edge events per producer batch.
    pub batch_len: usize,
    /// Batches the event stream holds before the producer starts dropping.
    pub stream_capacity_batches: usize,
    /// T5577 programming time unit, in microseconds (one 125 kHz cycle).
    pub t5577_unit_us: u32,
    /// Consecutive write failures tolerated before transitioning to Error.
    pub write_error_count: u32,
    /// Directory profile (.txt tag) files are read from and written to.
    pub profile_directory: PathBuf,
}

impl Config {
    fn default_for(profile_directory: &PathBuf) -> Self {
        Self {
            batch_len: 60,
            stream_capacity_batches: 2,
            t5577_unit_us: 8,
            write_error_count: 10,
            profile_directory: profile_directory.clone(),
        }
    }

    /// Load from an INI file, falling back to defaults for any missing key.
    pub fn load_from_ini(path: &std::path::Path, profile_directory: &PathBuf) -> Result<Self> {
        let mut ini = Ini::new();
        ini.load(path)
            .map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?;

        let defaults = Config::default_for(profile_directory);

        let batch_len = ini
            .getuint("capture", "batch_len")
            .ok()
            .flatten()
            .map(|v| v as usize)
            .unwrap_or(defaults.batch_len);

        let stream_capacity_batches = ini
            .getuint("capture", "stream_capacity_batches")
            .ok()
            .flatten()
            .map(|v| v as usize)
            .unwrap_or(defaults.stream_capacity_batches);

        let t5577_unit_us = ini
            .getuint("t5577", "unit_us")
            .ok()
            .flatten()
            .map(|v| v as u32)
            .unwrap_or(defaults.t5577_unit_us);

        let write_error_count = ini
            .getuint("t5577", "write_error_count")
            .ok()
            .flatten()
            .map(|v| v as u32)
            .unwrap_or(defaults.write_error_count);

        let profile_directory = ini
            .get("profile", "directory")
            .map(PathBuf::from)
            .unwrap_or(defaults.profile_directory);

        Ok(Self {
            batch_len,
            stream_capacity_batches,
            t5577_unit_us,
            write_error_count,
            profile_directory,
        })
    }

    /// Resolve `~/.config/lf125rfid` as the default profile directory.
    pub fn resolve_profile_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("lf125rfid"))
    }

    /// Load `~/.config/lf125rfid/config.ini` if present, otherwise built-in
    /// defaults.
    pub fn load_default() -> Self {
        let dir = Self::resolve_profile_dir().unwrap_or_else(|| PathBuf::from(".lf125rfid"));
        let path = dir.join("config.ini");
        if path.exists() {
            match Self::load_from_ini(&path, &dir).context("parsing config.ini") {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!("failed to parse config.ini, using defaults: {e}");
                    Config::default_for(&dir)
                }
            }
        } else {
            Config::default_for(&dir)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let dir = Self::resolve_profile_dir().unwrap_or_else(|| PathBuf::from(".lf125rfid"));
        Config::default_for(&dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_designed_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.batch_len, 60);
        assert_eq!(cfg.stream_capacity_batches, 2);
        assert_eq!(cfg.t5577_unit_us, 8);
        assert_eq!(cfg.write_error_count, 10);
    }
}
