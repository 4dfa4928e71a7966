//! Startup validation of a batch configuration
//!
//! Every check here is run-fatal: a run never starts on a configuration
//! that fails one of them.

use crate::config::BatchConfig;
use crate::error::{BatchError, Result};
use std::path::Path;
use tracing::warn;

/// Raster extensions accepted without a warning
pub const RASTER_EXTENSIONS: &[&str] = &["tif", "tiff", "img", "nc"];

/// Validate a configuration, creating the output folder if needed
pub fn validate(config: &BatchConfig) -> Result<()> {
    for layer in [&config.layer_a, &config.layer_b] {
        if layer.prefix.trim().is_empty() {
            return Err(BatchError::Validation(format!(
                "layer prefix for {} must not be empty",
                layer.path.display()
            )));
        }
        check_raster_path(&layer.path)?;
    }

    if config.layer_a.prefix == config.layer_b.prefix {
        return Err(BatchError::Validation(format!(
            "both layers use the prefix '{}'",
            config.layer_a.prefix
        )));
    }

    if !config.input_folder.is_dir() {
        return Err(BatchError::Validation(format!(
            "input folder {} does not exist or is not a directory",
            config.input_folder.display()
        )));
    }

    if config.output_folder.exists() && !config.output_folder.is_dir() {
        return Err(BatchError::Validation(format!(
            "output folder {} is not a directory",
            config.output_folder.display()
        )));
    }
    std::fs::create_dir_all(&config.output_folder).map_err(|e| {
        BatchError::Validation(format!(
            "cannot create output folder {}: {}",
            config.output_folder.display(),
            e
        ))
    })?;

    if config.output_suffix.contains(['/', '\\']) {
        return Err(BatchError::Validation(format!(
            "output suffix '{}' must not contain path separators",
            config.output_suffix
        )));
    }

    Ok(())
}

fn check_raster_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(BatchError::Validation(format!(
            "raster {} does not exist",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(BatchError::Validation(format!(
            "raster {} is not a file",
            path.display()
        )));
    }

    let ext = zonestat_core::io::extension_of(path).unwrap_or_default();
    if !RASTER_EXTENSIONS.contains(&ext.as_str()) {
        warn!(
            "raster {} has an unusual extension; expected one of {:?}",
            path.display(),
            RASTER_EXTENSIONS
        );
    }
    Ok(())
}
