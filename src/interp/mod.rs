//! Interpolation between grids: the 1D bracketing helper, full horizontal
//! regridding and boundary transects.

pub mod boundary;
pub mod helper;
pub mod regrid;

pub use {
    boundary::{interp_bdry, Boundary, BoundarySlicer},
    helper::{interp_slice_helper, SliceWeights},
    regrid::{interp_reg, RegridDim, Regridder},
};
