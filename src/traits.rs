use crate::volume::{Affine, GridTolerance};

/// Anything that occupies a voxel grid: an array shape plus a voxel-to-world affine.
pub trait VoxelGrid {
    fn grid_shape(&self) -> &[usize];
    fn grid_affine(&self) -> &Affine;

    /// Whether `other` has the same shape and an affine equal within `tol`.
    fn same_grid<G: VoxelGrid + ?Sized>(&self, other: &G, tol: &GridTolerance) -> bool {
        self.grid_shape() == other.grid_shape()
            && self.grid_affine().approx_eq(other.grid_affine(), tol)
    }
}
