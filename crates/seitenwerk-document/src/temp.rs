// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scoped temporary files for backends that can only read from a path.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use seitenwerk_core::PipelineConfig;
use seitenwerk_core::error::Result;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const FILE_PREFIX: &str = "seitenwerk-";

/// Outcome of a stale-file sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
}

/// Directory under which all scoped temp files are created.
#[derive(Debug, Clone)]
pub struct TempWorkspace {
    root: PathBuf,
}

impl TempWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `config.temp_dir`, or `seitenwerk/` under the OS temp directory.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config
                .temp_dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("seitenwerk")),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` to a new temp file that is deleted when the guard drops,
    /// on every exit path.
    pub fn scoped_file(&self, suffix: &str, bytes: &[u8]) -> Result<NamedTempFile> {
        fs::create_dir_all(&self.root)?;
        let mut file = tempfile::Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(suffix)
            .tempfile_in(&self.root)?;
        file.write_all(bytes)?;
        file.flush()?;
        debug!(path = %file.path().display(), bytes_len = bytes.len(), "Scoped temp file written");
        Ok(file)
    }

    /// Remove our files older than `max_age`. Backstop for guards that never
    /// ran (e.g. the process was killed).
    pub fn sweep_stale(&self, max_age: Duration) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(err) => return Err(err.into()),
        };
        let now = SystemTime::now();

        for entry in entries.flatten() {
            let path = entry.path();
            let ours = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(FILE_PREFIX));
            if !ours || !path.is_file() {
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => report.removed += 1,
                Err(err) => {
                    warn!(path = %path.display(), %err, "Could not remove stale temp file");
                    report.failed += 1;
                }
            }
        }
        if report.removed > 0 || report.failed > 0 {
            info!(removed = report.removed, failed = report.failed, "Temp sweep finished");
        }
        Ok(report)
    }
}
