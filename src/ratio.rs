//! Standardized T1w/T2w ratio maps.
//!
//! The T2-weighted image is first rescaled so that its median intensity in a reference tissue
//! mask (typically normal-appearing grey matter) matches that of the T1-weighted image. The
//! standardized ratio is then `(T1 - sT2) / (T1 + sT2)`, a contrast that approximates the
//! longitudinal relaxation rate R1.

use ndarray::{Array1, Axis, Zip};
use ndarray_stats::interpolate::Midpoint;
use ndarray_stats::QuantileExt;
use noisy_float::types::n64;
use tracing::debug;

use crate::aggregate::masked_values;
use crate::error::{Result, RoiMetricsError};
use crate::volume::{check_alignment, GridTolerance, LabelVolume, ScalarVolume, BACKGROUND_LABEL};


/// Median of the non-NaN values, averaging the two middle values for even counts.
///
/// Returns `None` if there is no non-NaN value.
pub fn nan_median(values: &Array1<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut values = values.clone();
    let med = values
        .quantile_axis_skipnan_mut(Axis(0), n64(0.5), &Midpoint)
        .ok()?;
    med.iter().next().copied().filter(|v| !v.is_nan())
}

/// Compute the standardized T1w/T2w ratio map.
///
/// The `t2` image and the `mask` must lie on the grid of `t1`. Voxels where the ratio is not
/// finite (e.g. background where both images are zero) are set to `0`. The result carries the
/// affine of `t1`.
pub fn standardized_ratio(t1: &ScalarVolume, t2: &ScalarVolume, mask: &LabelVolume) -> Result<ScalarVolume> {
    let tol = GridTolerance::default();
    check_alignment(t1, "T2", t2, &tol)?;
    check_alignment(t1, "mask", mask, &tol)?;

    let selected = mask.data.mapv(|v| v != BACKGROUND_LABEL);
    let t1_median = nan_median(&masked_values(&t1.data, &selected))
        .ok_or_else(|| RoiMetricsError::DegenerateScale(String::from("no usable T1 voxels in mask")))?;
    let t2_median = nan_median(&masked_values(&t2.data, &selected))
        .ok_or_else(|| RoiMetricsError::DegenerateScale(String::from("no usable T2 voxels in mask")))?;
    if t2_median == 0.0 {
        return Err(RoiMetricsError::DegenerateScale(String::from("median T2 intensity in mask is zero")));
    }

    let scale = t1_median / t2_median;
    debug!("T1 median {}, T2 median {}, scale factor {}.", t1_median, t2_median, scale);

    let ratio = Zip::from(&t1.data).and(&t2.data).map_collect(|&a, &b| {
        let scaled = b * scale;
        let r = (a - scaled) / (a + scaled);
        if r.is_finite() {
            r
        } else {
            0.0
        }
    });
    Ok(ScalarVolume::new(ratio, t1.affine))
}
