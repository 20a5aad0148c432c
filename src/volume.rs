//! In-memory brain volumes: label volumes, scalar volumes and the affine that places them in space.
//!
//! A volume is an N-D array of voxel values plus a 4x4 affine mapping voxel indices to
//! physical (scanner or template) coordinates. Two volumes are in the same space when
//! their shapes are identical and their affines agree within a [`GridTolerance`].

use approx::abs_diff_eq;
use ndarray::{Array, ArrayD, Dimension};
use tracing::debug;

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Result, RoiMetricsError};
use crate::traits::VoxelGrid;

/// The value reserved for background (unlabeled) voxels in a label volume.
pub const BACKGROUND_LABEL: i64 = 0;

/// A 4x4 voxel-to-world transform, stored row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine(pub [[f64; 4]; 4]);

impl Default for Affine {
    fn default() -> Affine {
        Affine::identity()
    }
}

impl Affine {
    pub fn identity() -> Affine {
        let mut m = [[0.0; 4]; 4];
        for (idx, row) in m.iter_mut().enumerate() {
            row[idx] = 1.0;
        }
        Affine(m)
    }

    /// An affine that only scales voxel indices by the given voxel sizes.
    pub fn from_voxel_sizes(sizes: [f64; 3]) -> Affine {
        let mut aff = Affine::identity();
        for idx in 0..3 {
            aff.0[idx][idx] = sizes[idx];
        }
        aff
    }

    /// Build an affine from its first three rows. The last row is fixed to `[0, 0, 0, 1]`.
    pub fn from_rows(rows: [[f64; 4]; 3]) -> Affine {
        Affine([rows[0], rows[1], rows[2], [0.0, 0.0, 0.0, 1.0]])
    }

    /// Element-wise comparison in the style of `|a - b| <= atol + rtol * |b|`, with `other` as `b`.
    pub fn approx_eq(&self, other: &Affine, tol: &GridTolerance) -> bool {
        self.0.iter().flatten().zip(other.0.iter().flatten()).all(|(a, b)| {
            abs_diff_eq!(*a, *b, epsilon = tol.atol + tol.rtol * b.abs())
        })
    }
}

impl fmt::Display for Affine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in self.0.iter() {
            writeln!(f, "[{:>10.4} {:>10.4} {:>10.4} {:>10.4}]", row[0], row[1], row[2], row[3])?;
        }
        Ok(())
    }
}


/// Tolerances used when comparing two affines.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct GridTolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for GridTolerance {
    fn default() -> GridTolerance {
        GridTolerance {
            rtol: 1e-5,
            atol: 1e-8,
        }
    }
}


/// A volume of integer region identifiers. The value [`BACKGROUND_LABEL`] marks unlabeled voxels.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVolume {
    pub data: ArrayD<i64>,
    pub affine: Affine,
}

impl LabelVolume {
    pub fn new<D: Dimension>(data: Array<i64, D>, affine: Affine) -> LabelVolume {
        LabelVolume {
            data: data.into_dyn(),
            affine,
        }
    }

    /// Build a label volume from floating point voxel values, as they come out of most image loaders.
    ///
    /// Every value must be an exact integer. Values are never rounded or floored: the first
    /// value that is not finite, has a fractional part, or is out of `i64` range is reported
    /// as [`RoiMetricsError::InvalidLabelValue`].
    pub fn from_float<D: Dimension>(data: Array<f64, D>, affine: Affine) -> Result<LabelVolume> {
        if let Some(bad) = data.iter().find(|v| !is_integral(**v)) {
            return Err(RoiMetricsError::InvalidLabelValue(*bad));
        }
        Ok(LabelVolume {
            data: data.mapv(|v| v as i64).into_dyn(),
            affine,
        })
    }

    /// Build a single-region volume from a mask: values above `0` become `1`, everything else
    /// (including NaN and negative values) becomes background.
    pub fn from_mask<D: Dimension>(data: Array<f64, D>, affine: Affine) -> LabelVolume {
        LabelVolume {
            data: data.mapv(|v| if v > 0.0 { 1 } else { BACKGROUND_LABEL }).into_dyn(),
            affine,
        }
    }

    /// The distinct region identifiers in this volume, ascending, background excluded.
    pub fn region_ids(&self) -> Vec<i64> {
        let ids: BTreeSet<i64> = self
            .data
            .iter()
            .copied()
            .filter(|v| *v != BACKGROUND_LABEL)
            .collect();
        ids.into_iter().collect()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
}

// 2^63 is the first f64 beyond i64::MAX.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn is_integral(v: f64) -> bool {
    v.is_finite() && v.fract() == 0.0 && v >= -I64_BOUND && v < I64_BOUND
}

impl VoxelGrid for LabelVolume {
    fn grid_shape(&self) -> &[usize] {
        self.data.shape()
    }

    fn grid_affine(&self) -> &Affine {
        &self.affine
    }
}

impl fmt::Display for LabelVolume {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Label volume with shape {:?} and {} regions.", self.shape(), self.region_ids().len())
    }
}


/// A volume of continuous measurements, e.g. fractional anisotropy or T1 relaxation time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarVolume {
    pub data: ArrayD<f64>,
    pub affine: Affine,
}

impl ScalarVolume {
    pub fn new<D: Dimension>(data: Array<f64, D>, affine: Affine) -> ScalarVolume {
        ScalarVolume {
            data: data.into_dyn(),
            affine,
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
}

impl VoxelGrid for ScalarVolume {
    fn grid_shape(&self) -> &[usize] {
        self.data.shape()
    }

    fn grid_affine(&self) -> &Affine {
        &self.affine
    }
}

impl fmt::Display for ScalarVolume {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Scalar volume with shape {:?}.", self.shape())
    }
}


/// Check that the volume called `name` has the array shape of the reference volume.
pub fn check_shape<R, G>(reference: &R, name: &str, other: &G) -> Result<()>
where
    R: VoxelGrid + ?Sized,
    G: VoxelGrid + ?Sized,
{
    if reference.grid_shape() != other.grid_shape() {
        return Err(RoiMetricsError::Shape(
            name.to_string(),
            reference.grid_shape().to_vec(),
            other.grid_shape().to_vec(),
        ));
    }
    Ok(())
}

/// Check that the volume called `name` lies on the reference grid.
///
/// The shape is compared first, so a structural mismatch is reported as
/// [`RoiMetricsError::Shape`] even when the affines also differ.
pub fn check_alignment<R, G>(reference: &R, name: &str, other: &G, tol: &GridTolerance) -> Result<()>
where
    R: VoxelGrid + ?Sized,
    G: VoxelGrid + ?Sized,
{
    check_shape(reference, name, other)?;
    if !reference.same_grid(other, tol) {
        debug!("Reference affine:\n{}Affine of '{}':\n{}", reference.grid_affine(), name, other.grid_affine());
        return Err(RoiMetricsError::Alignment(name.to_string()));
    }
    Ok(())
}
