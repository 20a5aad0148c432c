//! Functions for loading and saving brain volumes in NIfTI-1 files (`.nii`, `.nii.gz`).
//!
//! Loading yields the voxel array together with the affine described by the header. The
//! sform is preferred when its code is set, then the qform, then plain voxel size scaling.

use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use tracing::debug;

use std::path::Path;

use crate::error::{Result, RoiMetricsError};
use crate::volume::{Affine, LabelVolume, ScalarVolume};

/// NIfTI allows at most 7 data dimensions.
pub const NIFTI_MAX_DIMS: usize = 7;

/// `NIFTI_XFORM_ALIGNED_ANAT`, the sform code written for volumes saved by this crate.
pub const SFORM_ALIGNED_ANAT: i16 = 2;


/// Compute the voxel-to-world affine described by a NIfTI header.
pub fn header_affine(hdr: &NiftiHeader) -> Affine {
    if hdr.sform_code > 0 {
        let row = |r: &[f32; 4]| [r[0] as f64, r[1] as f64, r[2] as f64, r[3] as f64];
        Affine::from_rows([row(&hdr.srow_x), row(&hdr.srow_y), row(&hdr.srow_z)])
    } else if hdr.qform_code > 0 {
        qform_affine(hdr)
    } else {
        Affine::from_voxel_sizes(voxel_sizes(hdr))
    }
}

fn voxel_sizes(hdr: &NiftiHeader) -> [f64; 3] {
    let mut sizes = [1.0; 3];
    for (idx, size) in sizes.iter_mut().enumerate() {
        let pd = hdr.pixdim[idx + 1] as f64;
        if pd > 0.0 {
            *size = pd;
        }
    }
    sizes
}

/// The affine encoded by the quaternion parameters of a NIfTI header.
fn qform_affine(hdr: &NiftiHeader) -> Affine {
    let b = hdr.quatern_b as f64;
    let c = hdr.quatern_c as f64;
    let d = hdr.quatern_d as f64;
    let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();

    let rot = [
        [a * a + b * b - c * c - d * d, 2.0 * (b * c - a * d), 2.0 * (b * d + a * c)],
        [2.0 * (b * c + a * d), a * a + c * c - b * b - d * d, 2.0 * (c * d - a * b)],
        [2.0 * (b * d - a * c), 2.0 * (c * d + a * b), a * a + d * d - b * b - c * c],
    ];

    let qfac = if hdr.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
    let sizes = voxel_sizes(hdr);
    let scale = [sizes[0], sizes[1], sizes[2] * qfac];
    let offset = [hdr.quatern_x as f64, hdr.quatern_y as f64, hdr.quatern_z as f64];

    let mut rows = [[0.0; 4]; 3];
    for r in 0..3 {
        for col in 0..3 {
            rows[r][col] = rot[r][col] * scale[col];
        }
        rows[r][3] = offset[r];
    }
    Affine::from_rows(rows)
}

fn read_volume<P: AsRef<Path>>(path: P) -> Result<(ndarray::ArrayD<f64>, Affine)> {
    let obj = ReaderOptions::new().read_file(path.as_ref())?;
    let affine = header_affine(obj.header());
    let data = obj.into_volume().into_ndarray::<f64>()?;
    debug!("Read volume '{}' with shape {:?}.", path.as_ref().display(), data.shape());
    Ok((data, affine))
}

/// Read a label volume (segmentation, atlas or ROI mask) from a NIfTI file.
///
/// Voxel values must be exact integers after header scaling has been applied.
pub fn read_label_volume<P: AsRef<Path>>(path: P) -> Result<LabelVolume> {
    let (data, affine) = read_volume(path)?;
    LabelVolume::from_float(data, affine)
}

/// Read a binary ROI mask from a NIfTI file.
///
/// Voxels with a value above `0` become `1`, all others background. Fractional values, as found
/// at the edges of masks that were resampled or warped, are accepted.
pub fn read_mask_volume<P: AsRef<Path>>(path: P) -> Result<LabelVolume> {
    let (data, affine) = read_volume(path)?;
    Ok(LabelVolume::from_mask(data, affine))
}

/// Read a scalar volume from a NIfTI file.
pub fn read_scalar_volume<P: AsRef<Path>>(path: P) -> Result<ScalarVolume> {
    let (data, affine) = read_volume(path)?;
    Ok(ScalarVolume::new(data, affine))
}

/// Write a scalar volume to a NIfTI file as 32 bit floats. A file name ending in ".gz" gets compressed.
///
/// The affine is stored as the sform; the qform is left unset.
pub fn write_scalar_volume<P: AsRef<Path>>(path: P, volume: &ScalarVolume) -> Result<()> {
    let ndim = volume.data.ndim();
    if ndim == 0 || ndim > NIFTI_MAX_DIMS {
        return Err(RoiMetricsError::UnsupportedDimensionality(ndim));
    }

    let mut hdr = NiftiHeader::default();
    let aff = &volume.affine.0;
    let row = |r: &[f64; 4]| [r[0] as f32, r[1] as f32, r[2] as f32, r[3] as f32];
    hdr.srow_x = row(&aff[0]);
    hdr.srow_y = row(&aff[1]);
    hdr.srow_z = row(&aff[2]);
    hdr.sform_code = SFORM_ALIGNED_ANAT;
    hdr.qform_code = 0;
    for col in 0..3 {
        let norm = (0..3).map(|r| aff[r][col] * aff[r][col]).sum::<f64>().sqrt();
        hdr.pixdim[col + 1] = norm as f32;
    }

    let data = volume.data.mapv(|v| v as f32);
    WriterOptions::new(path.as_ref()).reference_header(&hdr).write_nifti(&data)?;
    debug!("Wrote volume '{}' with shape {:?}.", path.as_ref().display(), volume.shape());
    Ok(())
}
