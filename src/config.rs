//! Run descriptions for metric extraction, read from TOML or JSON files.
//!
//! A minimal TOML run description looks like this:
//!
//! ```toml
//! subject = "sub-01"
//! labels = "sub-01/aparc+aseg.nii.gz"
//! output = "sub-01_metrics.csv"
//!
//! [[scalars]]
//! name = "FA"
//! path = "sub-01/dti_FA.nii.gz"
//! ```

use serde::{Deserialize, Serialize};
use tracing::info;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::aggregate::MetricVolumes;
use crate::error::{Result, RoiMetricsError};
use crate::nifti_io::read_scalar_volume;
use crate::volume::GridTolerance;


/// A named scalar image to pool within regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarSpec {
    pub name: String,
    pub path: PathBuf,
}

/// Everything needed to extract one subject's region metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub subject: String,

    /// The label volume (atlas, segmentation) defining the regions.
    pub labels: PathBuf,

    /// Where to write the CSV table.
    pub output: PathBuf,

    pub scalars: Vec<ScalarSpec>,

    /// Optional color lookup table used to name the regions.
    #[serde(default)]
    pub lut: Option<PathBuf>,

    #[serde(default)]
    pub tolerance: GridTolerance,
}

impl RunConfig {
    /// Read and validate a run description. The format is chosen by file extension: `.toml` or `.json`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<RunConfig> {
        let path = path.as_ref();
        let cfg = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => RunConfig::from_toml_str(&fs::read_to_string(path)?)?,
            Some("json") => RunConfig::from_json_str(&fs::read_to_string(path)?)?,
            _ => {
                return Err(RoiMetricsError::InvalidConfig(format!(
                    "config file '{}' must end in .toml or .json",
                    path.display()
                )))
            }
        };
        cfg.validate()?;
        info!("Loaded run configuration for subject '{}' from '{}'.", cfg.subject, path.display());
        Ok(cfg)
    }

    pub fn from_toml_str(text: &str) -> Result<RunConfig> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<RunConfig> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(RoiMetricsError::InvalidConfig(String::from("missing or empty 'subject'")));
        }
        if self.scalars.is_empty() {
            return Err(RoiMetricsError::InvalidConfig(String::from("at least one entry in 'scalars' is required")));
        }
        let mut seen = HashSet::new();
        for sc in self.scalars.iter() {
            if !seen.insert(sc.name.as_str()) {
                return Err(RoiMetricsError::InvalidConfig(format!("scalar name '{}' is used more than once", sc.name)));
            }
        }
        if self.tolerance.rtol < 0.0 || self.tolerance.atol < 0.0 {
            return Err(RoiMetricsError::InvalidConfig(String::from("tolerances must not be negative")));
        }
        Ok(())
    }

    /// Load all scalar volumes, in configuration order.
    pub fn load_metrics(&self) -> Result<MetricVolumes> {
        let mut metrics = MetricVolumes::new();
        for sc in self.scalars.iter() {
            metrics.insert(sc.name.clone(), read_scalar_volume(&sc.path)?)?;
        }
        Ok(metrics)
    }
}
