//! Horizontal regridding between two logically rectangular grids.
//!
//! Interpolation is separable: one pass along longitude for every source row,
//! then one pass along latitude. Both passes carry a numerator and a
//! denominator so invalid donors drop out and the remaining weights are
//! renormalised, which on a fully valid rectangular grid reduces to bilinear
//! interpolation.

use {
    crate::{
        error::{Error, Result},
        field::Masked,
        grid::{Grid, Stagger},
        interp::helper::{weights_along, SliceWeights},
    },
    log::debug,
    ndarray::{
        Array2, Array3, ArrayD, ArrayView2, ArrayView3, Axis, Ix2, Ix3, IxDyn, ShapeError,
    },
    rayon::prelude::*,
};

/// Whether a field is horizontal only or has a vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegridDim {
    Two,
    Three,
}

/// Precomputed weights from one grid to another, reusable across fields.
#[derive(Debug, Clone)]
pub struct Regridder {
    wx: Vec<Option<SliceWeights>>,
    wy: Vec<Option<SliceWeights>>,
    source_shape: (usize, usize),
    source_nz: usize,
    target_nz: usize,
}

impl Regridder {
    pub fn new(source: &Grid, target: &Grid, stagger: Stagger) -> Result<Self> {
        let (source_lon, source_lat) = source.lon_lat_1d(stagger);
        let (target_lon, target_lat) = target.lon_lat_1d(stagger);

        let wx = weights_along(source_lon.view(), target_lon.view(), true)?;
        let wy = weights_along(source_lat.view(), target_lat.view(), false)?;

        debug!(
            "Regridder: {} of {} target columns and {} of {} target rows inside the source grid",
            wx.iter().filter(|w| w.is_some()).count(),
            wx.len(),
            wy.iter().filter(|w| w.is_some()).count(),
            wy.len()
        );

        Ok(Regridder {
            wx,
            wy,
            source_shape: (source.ny, source.nx),
            source_nz: source.nz,
            target_nz: target.nz,
        })
    }

    pub fn target_shape(&self) -> (usize, usize) {
        (self.wy.len(), self.wx.len())
    }

    /// Regrids one horizontal slice. Target points with no valid donor, or
    /// outside the source grid, get `fill_value`.
    pub fn apply_2d(
        &self,
        values: ArrayView2<f64>,
        valid: ArrayView2<bool>,
        fill_value: f64,
    ) -> Result<Array2<f64>> {
        if values.dim() != self.source_shape || valid.dim() != self.source_shape {
            return Err(Error::config(format!(
                "field has shape {:?} (mask {:?}) but the source grid is {:?}",
                values.dim(),
                valid.dim(),
                self.source_shape
            )));
        }

        let (ny, _) = self.source_shape;
        let (nyt, nxt) = self.target_shape();

        // Pass 1: along x, for every source row
        let mut num = Array2::<f64>::zeros((ny, nxt));
        let mut den = Array2::<f64>::zeros((ny, nxt));
        for j in 0..ny {
            for (it, w) in self.wx.iter().enumerate() {
                if let Some(w) = w {
                    for (i, c) in w.donors() {
                        if valid[[j, i]] {
                            num[[j, it]] += c * values[[j, i]];
                            den[[j, it]] += c;
                        }
                    }
                }
            }
        }

        // Pass 2: along y
        let mut out = Array2::from_elem((nyt, nxt), fill_value);
        for (jt, w) in self.wy.iter().enumerate() {
            if let Some(w) = w {
                for it in 0..nxt {
                    let (mut n, mut d) = (0.0, 0.0);
                    for (j, c) in w.donors() {
                        n += c * num[[j, it]];
                        d += c * den[[j, it]];
                    }
                    if d > 0.0 {
                        out[[jt, it]] = n / d;
                    }
                }
            }
        }

        Ok(out)
    }

    /// Regrids every level independently. Levels are processed in parallel.
    pub fn apply_3d(
        &self,
        values: ArrayView3<f64>,
        valid: ArrayView3<bool>,
        fill_value: f64,
    ) -> Result<Array3<f64>> {
        let nz = values.len_of(Axis(0));
        if nz != self.source_nz || nz != self.target_nz || valid.len_of(Axis(0)) != nz {
            return Err(Error::config(format!(
                "3D regridding needs matching levels: field has {}, source grid {}, target grid {}",
                nz, self.source_nz, self.target_nz
            )));
        }

        let (nyt, nxt) = self.target_shape();
        let mut out = Array3::zeros((nz, nyt, nxt));
        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(values.axis_iter(Axis(0)).into_par_iter())
            .zip(valid.axis_iter(Axis(0)).into_par_iter())
            .map(|((mut level, values), valid)| {
                level.assign(&self.apply_2d(values, valid, fill_value)?);
                Ok(())
            })
            .collect::<Result<()>>()?;
        Ok(out)
    }
}

/// Regrids a tracer-point field from `source` to `target`.
///
/// Donors are weighted by the field's validity (build it with
/// [`Masked::from_hfac`] to use `ceil(hfac)`), target points with no valid
/// donor get `fill_value`, and every cell that is dry on the target grid is
/// set to exactly zero.
pub fn interp_reg(
    source: &Grid,
    target: &Grid,
    field: &Masked<IxDyn>,
    fill_value: f64,
    dim: RegridDim,
) -> Result<ArrayD<f64>> {
    let regridder = Regridder::new(source, target, Stagger::T)?;
    let rank_error = |e: ShapeError| {
        Error::config(format!(
            "field of rank {} cannot be regridded as {:?}: {}",
            field.values.ndim(),
            dim,
            e
        ))
    };

    match dim {
        RegridDim::Two => {
            let values = field
                .values
                .view()
                .into_dimensionality::<Ix2>()
                .map_err(rank_error)?;
            let valid = field
                .valid
                .view()
                .into_dimensionality::<Ix2>()
                .map_err(rank_error)?;
            let mut out = regridder.apply_2d(values, valid, fill_value)?;
            let surface = target.hfac.index_axis(Axis(0), 0);
            out.iter_mut()
                .zip(surface.iter())
                .filter(|(_, h)| **h == 0.0)
                .for_each(|(x, _)| *x = 0.0);
            Ok(out.into_dyn())
        }
        RegridDim::Three => {
            let values = field
                .values
                .view()
                .into_dimensionality::<Ix3>()
                .map_err(rank_error)?;
            let valid = field
                .valid
                .view()
                .into_dimensionality::<Ix3>()
                .map_err(rank_error)?;
            let mut out = regridder.apply_3d(values, valid, fill_value)?;
            out.iter_mut()
                .zip(target.hfac.iter())
                .filter(|(_, h)| **h == 0.0)
                .for_each(|(x, _)| *x = 0.0);
            Ok(out.into_dyn())
        }
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::grid::GridArrays,
        approx::assert_abs_diff_eq,
        ndarray::{s, Array3},
    };

    fn grid(lon: &[f64], lat: &[f64], hfac: Array3<f64>) -> Grid {
        let nz = hfac.len_of(Axis(0));
        let z_edges = (0..=nz).map(|k| -10.0 * k as f64).collect::<Vec<f64>>();
        Grid::from_arrays(
            GridArrays::rectangular(lon, lat, &z_edges, hfac).unwrap(),
            180.0,
        )
        .unwrap()
    }

    fn lons(n: usize, start: f64, step: f64) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn identity_on_same_grid() {
        let mut hfac = Array3::ones((2, 4, 5));
        hfac.slice_mut(s![1, .., 0]).fill(0.0);
        hfac[[1, 3, 4]] = 0.4;
        let g = grid(&lons(5, 0.0, 1.0), &lons(4, -70.0, 0.5), hfac.clone());

        let values = Array3::from_shape_fn((2, 4, 5), |(k, j, i)| {
            (k * 100 + j * 10 + i) as f64 + 0.25
        });
        let field = Masked::from_hfac(values.clone(), &hfac).unwrap().into_dyn();
        let out = interp_reg(&g, &g, &field, -999.0, RegridDim::Three).unwrap();

        for ((idx, x), h) in out.indexed_iter().zip(hfac.iter()) {
            if *h > 0.0 {
                assert_abs_diff_eq!(*x, values[[idx[0], idx[1], idx[2]]], epsilon = 1.0e-12);
            } else {
                assert_eq!(*x, 0.0);
            }
        }
    }

    #[test]
    fn dry_donors_are_excluded() {
        let hfac = Array3::ones((1, 2, 2));
        let source = grid(&[0.0, 1.0], &[0.0, 1.0], hfac);
        let target = grid(&[0.25, 0.75], &[0.5, 0.6], Array3::ones((1, 2, 2)));

        let values = ndarray::arr3(&[[[1.0, 0.0], [1.0, 3.0]]]);
        let valid = ndarray::arr3(&[[[true, false], [true, true]]]);
        let field = Masked::new(values, valid).unwrap().into_dyn();
        let out = interp_reg(&source, &target, &field, -1.0, RegridDim::Three).unwrap();

        // The dry donor's weight is dropped and the remaining three renormalised
        let expected = (0.375 * 1.0 + 0.375 * 1.0 + 0.125 * 3.0) / (0.375 + 0.375 + 0.125);
        assert_abs_diff_eq!(out[[0, 0, 0]], expected, epsilon = 1.0e-12);
    }

    #[test]
    fn fill_value_where_no_donor() {
        let source = grid(&[0.0, 1.0], &[0.0, 1.0], Array3::ones((1, 2, 2)));
        let target = grid(&[0.5, 5.0], &[0.5, 0.7], Array3::ones((1, 2, 2)));

        let values = ndarray::arr2(&[[1.0, 1.0], [1.0, 1.0]]);
        let valid = ndarray::arr2(&[[false, false], [true, true]]);
        let field = Masked::new(values, valid).unwrap().into_dyn();
        let out = interp_reg(&source, &target, &field, -9.0, RegridDim::Two).unwrap();

        // Outside the source grid in x
        assert_eq!(out[[0, 1]], -9.0);
        assert_eq!(out[[1, 1]], -9.0);
        assert_abs_diff_eq!(out[[0, 0]], 1.0, epsilon = 1.0e-12);

        // Only the invalid row contributes at the exact southern edge
        let target = grid(&[0.5, 0.6], &[0.0, 0.5], Array3::ones((1, 2, 2)));
        let out = interp_reg(&source, &target, &field, -9.0, RegridDim::Two).unwrap();
        assert_eq!(out[[0, 0]], -9.0);
        assert_eq!(out[[1, 0]], 1.0);
    }

    #[test]
    fn target_land_is_zero() {
        let source = grid(&[0.0, 1.0], &[0.0, 1.0], Array3::ones((2, 2, 2)));
        let mut hfac = Array3::ones((2, 2, 2));
        hfac[[1, 0, 1]] = 0.0;
        let target = grid(&[0.2, 0.8], &[0.2, 0.8], hfac);

        let field = Masked::all_valid(Array3::from_elem((2, 2, 2), 7.0)).into_dyn();
        let out = interp_reg(&source, &target, &field, 1.0, RegridDim::Three).unwrap();
        assert_eq!(out[[1, 0, 1]], 0.0);
        assert_abs_diff_eq!(out[[0, 0, 1]], 7.0, epsilon = 1.0e-12);
    }

    #[test]
    fn rank_and_level_mismatch() {
        let source = grid(&[0.0, 1.0], &[0.0, 1.0], Array3::ones((2, 2, 2)));
        let target = grid(&[0.0, 1.0], &[0.0, 1.0], Array3::ones((3, 2, 2)));
        let field = Masked::all_valid(Array3::zeros((2, 2, 2))).into_dyn();

        assert!(matches!(
            interp_reg(&source, &source, &field, 0.0, RegridDim::Two),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            interp_reg(&source, &target, &field, 0.0, RegridDim::Three),
            Err(Error::Configuration(_))
        ));
    }
}
