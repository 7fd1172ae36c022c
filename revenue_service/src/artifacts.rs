//! JSON persistence of fitted models
//!
//! The sequence model is stored as two files (network state and scaler); the
//! seasonal model as one. Loading distinguishes a missing file, which is
//! reported as `Loaded::Missing`, from a file that exists but cannot be used.

use crate::error::Result;
use revenue_forecast::models::sarima::{FittedSarima, SeasonalForecaster};
use revenue_forecast::models::sequence::{SequenceForecaster, SequenceModelState};
use revenue_forecast::scaler::MinMaxScaler;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Write `value` as pretty JSON, creating parent directories
pub fn write_json<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Read JSON from `path`, or `None` when the file does not exist
pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Option<T>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let reader = BufReader::new(File::open(path)?);
    Ok(Some(serde_json::from_reader(reader)?))
}

/// Save a fitted sequence model and its scaler
pub fn save_sequence<P: AsRef<Path>, Q: AsRef<Path>>(
    model: &SequenceForecaster,
    model_path: P,
    scaler_path: Q,
) -> Result<()> {
    write_json(model_path.as_ref(), &model.model_state()?)?;
    write_json(scaler_path.as_ref(), &model.scaler()?)?;
    info!(
        model = %model_path.as_ref().display(),
        scaler = %scaler_path.as_ref().display(),
        "saved sequence model"
    );
    Ok(())
}

/// Save a fitted seasonal model
pub fn save_seasonal<P: AsRef<Path>>(model: &SeasonalForecaster, path: P) -> Result<()> {
    write_json(path.as_ref(), model.fitted_model()?)?;
    info!(path = %path.as_ref().display(), "saved seasonal model");
    Ok(())
}

/// Outcome of loading a model that needs several files
#[derive(Debug)]
pub enum Loaded<T> {
    /// Every file was present and valid
    Ready(T),
    /// These files do not exist
    Missing(Vec<String>),
}

/// Load the sequence model and its scaler
pub fn load_sequence<P: AsRef<Path>, Q: AsRef<Path>>(
    model_path: P,
    scaler_path: Q,
) -> Result<Loaded<SequenceForecaster>> {
    let state: Option<SequenceModelState> = read_json(model_path.as_ref())?;
    let scaler: Option<MinMaxScaler> = read_json(scaler_path.as_ref())?;

    match (state, scaler) {
        (Some(state), Some(scaler)) => Ok(Loaded::Ready(SequenceForecaster::from_parts(
            state, scaler,
        )?)),
        (state, scaler) => {
            let mut missing = Vec::new();
            if state.is_none() {
                missing.push(model_path.as_ref().display().to_string());
            }
            if scaler.is_none() {
                missing.push(scaler_path.as_ref().display().to_string());
            }
            Ok(Loaded::Missing(missing))
        }
    }
}

/// Load the seasonal model
pub fn load_seasonal<P: AsRef<Path>>(path: P) -> Result<Loaded<SeasonalForecaster>> {
    match read_json::<FittedSarima, _>(path.as_ref())? {
        Some(fitted) => Ok(Loaded::Ready(SeasonalForecaster::from_fitted(fitted)?)),
        None => Ok(Loaded::Missing(vec![path.as_ref().display().to_string()])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use tempfile::tempdir;

    #[test]
    fn test_missing_files_are_reported() {
        let dir = tempdir().unwrap();
        let model = dir.path().join("sequence_model.json");
        let scaler = dir.path().join("scaler.json");
        write_json(&scaler, &MinMaxScaler::fit(&[1.0, 2.0]).unwrap()).unwrap();

        match load_sequence(&model, &scaler).unwrap() {
            Loaded::Missing(missing) => {
                assert_eq!(missing.len(), 1);
                assert!(missing[0].ends_with("sequence_model.json"));
            }
            Loaded::Ready(_) => panic!("expected a missing model file"),
        }
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seasonal_model.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_seasonal(&path), Err(ServiceError::Json(_))));
    }
}
