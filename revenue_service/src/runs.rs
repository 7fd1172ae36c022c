//! Write-only persistence of generated forecasts

use crate::error::Result;
use crate::fallback::ForecastSource;
use chrono::{DateTime, Utc};
use revenue_forecast::models::{ForecastRecord, ModelKind};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One generated forecast as handed to a sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRun {
    /// Requested model family
    pub model_type: ModelKind,
    /// Requested horizon
    pub periods: usize,
    /// When the forecast was produced
    pub generated_at: DateTime<Utc>,
    /// Model or synthetic provenance
    pub source: ForecastSource,
    /// The forecast records
    pub records: Vec<ForecastRecord>,
}

/// Destination for generated forecasts
pub trait ForecastRunSink: Send + Sync {
    /// Persist one run
    fn record(&self, run: &ForecastRun) -> Result<()>;
}

/// Sink that drops every run
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardRuns;

impl ForecastRunSink for DiscardRuns {
    fn record(&self, _run: &ForecastRun) -> Result<()> {
        Ok(())
    }
}

/// Appends one JSON object per run to a file
#[derive(Debug)]
pub struct JsonLinesRunStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesRunStore {
    /// Store writing to `path`; parent directories are created on first write
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Log file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every run recorded so far, oldest first
    pub fn read_all(&self) -> Result<Vec<ForecastRun>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut runs = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                runs.push(serde_json::from_str(&line)?);
            }
        }
        Ok(runs)
    }
}

impl ForecastRunSink for JsonLinesRunStore {
    fn record(&self, run: &ForecastRun) -> Result<()> {
        let mut line = serde_json::to_string(run)?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
