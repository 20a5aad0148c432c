//! Pooling of scalar neuroimaging metrics within labeled brain regions.
//!
//! The focus of this package is the step at the end of a volumetric analysis pipeline: a
//! segmentation or atlas in subject space plus co-registered scalar maps (FA, T1, qT1, ...) go
//! in, a table of per-region means comes out.

pub mod aggregate;
pub mod color_lut;
pub mod config;
pub mod error;
pub mod nifti_io;
pub mod ratio;
pub mod table;
pub mod traits;
pub mod util;
pub mod volume;

pub use aggregate::{aggregate, aggregate_masks, aggregate_with_tolerance, MetricVolumes};
pub use color_lut::{ColorLut, ColorLutEntry};
pub use config::{RunConfig, ScalarSpec};
pub use error::{Result, RoiMetricsError};
pub use nifti_io::{read_label_volume, read_mask_volume, read_scalar_volume, write_scalar_volume};
pub use ratio::standardized_ratio;
pub use table::{region_label, MetricRow, ResultTable};
pub use traits::VoxelGrid;
pub use volume::{Affine, GridTolerance, LabelVolume, ScalarVolume, BACKGROUND_LABEL};
