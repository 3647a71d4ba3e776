//! Line-oriented `key: value` tag record storage, with atomic rewrite.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Line {
    /// A comment, blank line, or anything else that isn't a recognized
    /// `key: value` pair. Preserved verbatim across rewrites.
    Raw(String),
    Pair { key: String, value: String },
}

/// A parsed profile record backed by a file on disk.
///
/// Reads preserve line order and all non-pair lines (comments, blanks);
/// `set` rewrites the file to a temp path and replaces the original
/// atomically (unlink + rename), same discipline as the original firmware's
/// `write_private_profile_string`.
pub struct ProfileStore {
    path: PathBuf,
    lines: Vec<Line>,
}

fn split_line(line: &str) -> Line {
    let trimmed = line.trim_end_matches('\r');
    if trimmed.trim_start().starts_with('#') {
        return Line::Raw(trimmed.to_string());
    }
    match trimmed.find(':') {
        Some(idx) => {
            let key = trimmed[..idx].trim().to_string();
            let value = trimmed[idx + 1..].trim().to_string();
            if key.is_empty() {
                Line::Raw(trimmed.to_string())
            } else {
                Line::Pair { key, value }
            }
        }
        None => Line::Raw(trimmed.to_string()),
    }
}

impl ProfileStore {
    /// Load a record from `path`. A missing file is treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let lines = match fs::read_to_string(&path) {
            Ok(contents) => contents.lines().map(split_line).collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(Self { path, lines })
    }

    /// Raw string value of `key`, first match wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            Line::Pair { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Set `key` to `value` and rewrite the backing file.
    ///
    /// If the key already exists, its line is replaced in place; otherwise
    /// the pair is appended. All comment/blank lines and other keys are
    /// left untouched.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut found = false;
        for line in &mut self.lines {
            if let Line::Pair { key: k, value: v } = line {
                if k == key {
                    *v = value.to_string();
                    found = true;
                    break;
                }
            }
        }
        if !found {
            self.lines.push(Line::Pair {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
        self.flush()
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Raw(s) => {
                    out.push_str(s);
                    out.push('\n');
                }
                Line::Pair { key, value } => {
                    out.push_str(key);
                    out.push_str(": ");
                    out.push_str(value);
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Write the current lines to a temp file, then unlink + rename over the
    /// original, so a crash never leaves a half-written record.
    fn flush(&self) -> Result<()> {
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, self.render())?;
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// `true` iff `Filetype` and `Version` match exactly.
    pub fn has_header(&self, filetype: &str, version: &str) -> bool {
        self.get("Filetype") == Some(filetype) && self.get("Version") == Some(version)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key)?.trim().parse().ok()
    }

    pub fn get_uint(&self, key: &str) -> Option<u64> {
        self.get(key)?.trim().parse().ok()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)?.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" => Some(true),
            "0" | "false" | "off" => Some(false),
            _ => None,
        }
    }

    /// Parse a float, truncated to milli-unit precision (matching the
    /// firmware's `trunc(f * 1000.0) / 1000.0`).
    pub fn get_float_milli(&self, key: &str) -> Option<f64> {
        let raw: f64 = self.get(key)?.trim().parse().ok()?;
        Some((raw * 1000.0).trunc() / 1000.0)
    }

    /// Space-separated hex byte array, e.g. `"DE AD BE EF 01"`.
    pub fn get_hex_array(&self, key: &str) -> Option<Vec<u8>> {
        self.get(key)?
            .split_whitespace()
            .map(|tok| u8::from_str_radix(tok, 16).ok())
            .collect()
    }

    /// Number of space-separated hex tokens, without decoding them.
    pub fn get_hex_count(&self, key: &str) -> Option<usize> {
        Some(self.get(key)?.split_whitespace().count())
    }
}

/// Build a record for a decoded [`crate::tag::TagInfo`] at `path`, matching
/// the layout in the external-interfaces section: `Filetype`, `Version`,
/// `Protocol`, `Bitrate`, `UID`.
pub fn write_tag(path: impl AsRef<Path>, tag: &crate::tag::TagInfo) -> Result<()> {
    let mut store = ProfileStore::open(path.as_ref())?;
    store.set("Filetype", "RFID Tag")?;
    store.set("Version", "0.8")?;
    store.set("Protocol", tag.protocol.name())?;
    store.set("Bitrate", &tag.bitrate.to_string())?;
    store.set("UID", &tag.uid_hex())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("lf125rfid-test-{name}-{:?}", std::thread::current().id()));
        p
    }

    #[test]
    fn set_then_get_round_trips() {
        let path = temp_path("roundtrip");
        let _ = fs::remove_file(&path);
        let mut store = ProfileStore::open(&path).unwrap();
        store.set("UID", "01 02 03 04 05").unwrap();
        let reopened = ProfileStore::open(&path).unwrap();
        assert_eq!(reopened.get("UID"), Some("01 02 03 04 05"));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn rewrite_preserves_comments_and_other_keys() {
        let path = temp_path("comments");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "# header").unwrap();
        writeln!(f, "Filetype: RFID Tag").unwrap();
        writeln!(f, "Version: 0.8").unwrap();
        writeln!(f, "UID: 01 02 03 04 05").unwrap();
        drop(f);

        let mut store = ProfileStore::open(&path).unwrap();
        store.set("UID", "AA BB CC DD EE").unwrap();

        let reopened = ProfileStore::open(&path).unwrap();
        assert_eq!(reopened.get("UID"), Some("AA BB CC DD EE"));
        assert_eq!(reopened.get("Version"), Some("0.8"));
        assert!(reopened.has_header("RFID Tag", "0.8"));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn float_values_truncate_to_milli_precision() {
        let path = temp_path("float");
        let _ = fs::remove_file(&path);
        let mut store = ProfileStore::open(&path).unwrap();
        store.set("Gain", "1.23456").unwrap();
        assert_eq!(store.get_float_milli("Gain"), Some(1.234));
        fs::remove_file(&path).ok();
    }
}
