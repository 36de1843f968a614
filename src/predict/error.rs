use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("TLE directory not found: {0}")]
    DirectoryNotFound(String),
    #[error("TLE file read error: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Propagation error: {0}")]
    Propagation(String),
    #[error("Invalid window: start {start} is not before end {end}")]
    InvalidWindow { start: String, end: String },
    #[error("Invalid minimum elevation: {0}")]
    InvalidElevation(f64),
}

/// Failure to predict passes for a single satellite. Non-fatal for a run.
#[derive(Debug, Clone, Error, Serialize)]
#[error("propagation failed for {satellite} ({norad_id}): {message}")]
pub struct PropagationError {
    pub norad_id: u32,
    pub satellite: String,
    pub message: String,
}
