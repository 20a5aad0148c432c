//! Utility functions used in all other roimetrics modules.

use std::path::Path;

/// Check whether the file extension ends with ".gz".
pub fn is_gz_file<P>(path: P) -> bool
where
    P: AsRef<Path>,
{
    path.as_ref()
        .file_name()
        .map(|a| a.to_string_lossy().ends_with(".gz"))
        .unwrap_or(false)
}

/// The file name of a volume without its `.nii`, `.nii.gz` or `.mgz` extension.
///
/// Used to name a region after the mask file it was loaded from.
pub fn volume_stem<P>(path: P) -> String
where
    P: AsRef<Path>,
{
    let name = path
        .as_ref()
        .file_name()
        .map(|a| a.to_string_lossy().into_owned())
        .unwrap_or_default();
    for ext in [".nii.gz", ".nii", ".mgz", ".mgh", ".gz"].iter() {
        if let Some(stem) = name.strip_suffix(ext) {
            if !stem.is_empty() {
                return stem.to_string();
            }
        }
    }
    name
}
