use std::path::Path;

use crate::error::{CoexError, Result};

/// Histogram ceilings must leave room for at least one non-zero bucket.
pub fn check_bucket_ceiling(value: usize, name: &str) -> Result<()> {
    if value == 0 {
        return Err(CoexError::Configuration(format!(
            "Value of {name} should be positive"
        )));
    }
    Ok(())
}

/// Converts a user-supplied iteration count. Zero is allowed and means "no trials".
pub fn check_iterations(value: i64, name: &str) -> Result<usize> {
    if value < 0 {
        return Err(CoexError::Configuration(format!(
            "Value of {name} should not be negative (got {value})"
        )));
    }
    usize::try_from(value)
        .map_err(|_| CoexError::Configuration(format!("Value of {name} is too large")))
}

pub fn check_experiment_index(index: usize, n_experiments: usize) -> Result<()> {
    if index >= n_experiments {
        return Err(CoexError::Configuration(format!(
            "Experiment index {index} does not fit in a matrix sized for {n_experiments} experiments"
        )));
    }
    Ok(())
}

pub fn check_file_exists(path: &Path, name: &str) -> Result<()> {
    if !path.exists() {
        return Err(CoexError::Configuration(format!(
            "File {path:?} passed to {name} does not exist"
        )));
    }
    Ok(())
}
