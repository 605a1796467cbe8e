//! Open boundary transects: locating the boundary, slicing source data along
//! it, and interpolating onto the target's boundary points and levels.

use {
    crate::{
        error::{Error, Result},
        field::Masked,
        grid::{Grid, Stagger},
        interp::helper::{interp_slice_helper, weights_along, SliceWeights},
    },
    ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayView3, Axis, Ix1, Ix2},
    serde::{Deserialize, Serialize},
    std::{fmt, str::FromStr},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Boundary {
    #[serde(rename = "W")]
    West,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "N")]
    North,
}

impl Boundary {
    pub const ALL: [Boundary; 4] = [
        Boundary::West,
        Boundary::East,
        Boundary::South,
        Boundary::North,
    ];

    /// Multiplies the normal velocity to give flow into the domain.
    pub fn sign(self) -> f64 {
        match self {
            Boundary::West | Boundary::South => 1.0,
            Boundary::East | Boundary::North => -1.0,
        }
    }

    /// Northern and southern boundaries run along longitude.
    pub fn is_zonal(self) -> bool {
        matches!(self, Boundary::North | Boundary::South)
    }

    /// Stagger of the velocity component normal to this boundary.
    pub fn normal_stagger(self) -> Stagger {
        if self.is_zonal() {
            Stagger::V
        } else {
            Stagger::U
        }
    }

    /// True when `stagger` lives on the faces that make up this boundary.
    pub fn on_edge(self, stagger: Stagger) -> bool {
        stagger == self.normal_stagger()
    }
}

impl FromStr for Boundary {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "N" => Ok(Boundary::North),
            "S" => Ok(Boundary::South),
            "E" => Ok(Boundary::East),
            "W" => Ok(Boundary::West),
            _ => Err(Error::config(format!(
                "invalid boundary {:?}, must be one of N, S, E, W",
                s
            ))),
        }
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Boundary::North => "N",
            Boundary::South => "S",
            Boundary::East => "E",
            Boundary::West => "W",
        })
    }
}

/// Latitude or longitude of the boundary at the outermost cell centres and
/// at the outer edge of those cells.
pub fn find_obcs_boundary(grid: &Grid, boundary: Boundary) -> (f64, f64) {
    let outer = |corners: &Array1<f64>| {
        let n = corners.len();
        2.0 * corners[n - 1] - corners[n - 2]
    };
    match boundary {
        Boundary::South => (grid.lat_1d[0], grid.lat_corners_1d[0]),
        Boundary::North => (
            grid.lat_1d[grid.ny - 1],
            outer(&grid.lat_corners_1d),
        ),
        Boundary::West => (grid.lon_1d[0], grid.lon_corners_1d[0]),
        Boundary::East => (
            grid.lon_1d[grid.nx - 1],
            outer(&grid.lon_corners_1d),
        ),
    }
}

/// Coordinate along the boundary on the given grid.
pub fn boundary_axis(grid: &Grid, boundary: Boundary, stagger: Stagger) -> Array1<f64> {
    let (lon, lat) = grid.lon_lat_1d(stagger);
    if boundary.is_zonal() {
        lon
    } else {
        lat
    }
}

/// hFac of the outermost row or column, shaped `(nz, n)`.
pub fn boundary_hfac(grid: &Grid, boundary: Boundary, stagger: Stagger) -> Array2<f64> {
    let hfac = grid.hfac_view(stagger);
    match boundary {
        Boundary::South => hfac.slice(s![.., 0, ..]).to_owned(),
        Boundary::North => hfac.slice(s![.., grid.ny - 1, ..]).to_owned(),
        Boundary::West => hfac.slice(s![.., .., 0]).to_owned(),
        Boundary::East => hfac.slice(s![.., .., grid.nx - 1]).to_owned(),
    }
}

/// Source data interpolated onto the boundary line, still on source points
/// along the boundary and source levels.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSlice {
    pub haxis: Array1<f64>,
    /// `(nz, n)`
    pub data: Array2<f64>,
    /// `(nz, n)`; zero marks land
    pub hfac: Array2<f64>,
}

impl SourceSlice {
    /// Prepends a copy of the first point just before `target_start` when the
    /// target boundary begins outside the source. Returns whether it did.
    pub fn extend_to(&mut self, target_start: f64) -> bool {
        if target_start >= self.haxis[0] {
            return false;
        }
        let prepend = |a: &Array2<f64>| {
            let (nz, n) = a.dim();
            Array2::from_shape_fn((nz, n + 1), |(k, i)| a[[k, i.saturating_sub(1)]])
        };
        let mut haxis = vec![target_start - 0.1];
        haxis.extend(self.haxis.iter());
        self.haxis = Array1::from(haxis);
        self.data = prepend(&self.data);
        self.hfac = prepend(&self.hfac);
        true
    }
}

/// Weights locating a target boundary on a regular source grid. Computed once
/// and reused for every field and month.
#[derive(Debug, Clone)]
pub struct BoundarySlicer {
    boundary: Boundary,
    centre: SliceWeights,
    edge: SliceWeights,
}

impl BoundarySlicer {
    pub fn new(source: &Grid, target: &Grid, boundary: Boundary) -> Result<Self> {
        let (loc0, loc0_e) = find_obcs_boundary(target, boundary);
        let (centre, edge) = if boundary.is_zonal() {
            (
                interp_slice_helper(source.lat_1d.view(), loc0, false)?,
                interp_slice_helper(source.lat_corners_1d.view(), loc0_e, false)?,
            )
        } else {
            (
                interp_slice_helper(source.lon_1d.view(), loc0, true)?,
                interp_slice_helper(source.lon_corners_1d.view(), loc0_e, true)?,
            )
        };
        Ok(BoundarySlicer {
            boundary,
            centre,
            edge,
        })
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    /// Edge weights for the velocity normal to the boundary, centre weights otherwise.
    pub fn weights(&self, stagger: Stagger) -> SliceWeights {
        if self.boundary.on_edge(stagger) {
            self.edge
        } else {
            self.centre
        }
    }

    fn line<'a>(&self, data: ArrayView3<'a, f64>, index: usize) -> ArrayView2<'a, f64> {
        if self.boundary.is_zonal() {
            data.slice_move(s![.., index, ..])
        } else {
            data.slice_move(s![.., .., index])
        }
    }

    /// Slices a `(nz, ny, nx)` source field and its hFac along the boundary;
    /// horizontal fields come in as a single level.
    /// The sliced hFac is multiplied by the ceiling of both donors, so a
    /// boundary next to land is treated as land rather than averaged with it.
    pub fn slice(
        &self,
        source: &Grid,
        data: ArrayView3<f64>,
        hfac: ArrayView3<f64>,
        stagger: Stagger,
    ) -> Result<SourceSlice> {
        let (_, ny, nx) = data.dim();
        if data.dim() != hfac.dim() || (ny, nx) != (source.ny, source.nx) {
            return Err(Error::config(format!(
                "boundary slice needs (nz, {}, {}) arrays, got data {:?} and hfac {:?}",
                source.ny,
                source.nx,
                data.dim(),
                hfac.dim()
            )));
        }

        let w = self.weights(stagger);
        let (d1, d2) = (self.line(data.view(), w.i1), self.line(data.view(), w.i2));
        let (h1, h2) = (self.line(hfac.view(), w.i1), self.line(hfac.view(), w.i2));

        let data = Array2::from_shape_fn(d1.dim(), |idx| w.c1 * d1[idx] + w.c2 * d2[idx]);
        let hfac = Array2::from_shape_fn(h1.dim(), |idx| {
            (w.c1 * h1[idx] + w.c2 * h2[idx]) * h1[idx].ceil() * h2[idx].ceil()
        });

        Ok(SourceSlice {
            haxis: boundary_axis(source, self.boundary, stagger),
            data,
            hfac,
        })
    }
}

/// Interpolates a boundary transect onto target boundary points and levels.
///
/// `source_data` and `source_hfac` are `(nz, n)`, with `nz == 1` when
/// `depth_dependent` is false. The horizontal pass renormalises over wet
/// donors; the vertical pass uses only source levels that came out wet,
/// holding the shallowest or deepest wet value beyond their range. A target
/// column with no wet donor at all is zero. Output cells are valid where the
/// column had donors and the target is wet.
#[allow(clippy::too_many_arguments)]
pub fn interp_bdry(
    source_h: ArrayView1<f64>,
    source_z: ArrayView1<f64>,
    source_data: ArrayView2<f64>,
    source_hfac: ArrayView2<f64>,
    target_h: ArrayView1<f64>,
    target_z: ArrayView1<f64>,
    target_hfac: ArrayView2<f64>,
    depth_dependent: bool,
    is_longitude: bool,
) -> Result<Masked<Ix2>> {
    let (nzs, nhs) = source_data.dim();
    let nht = target_h.len();
    let nzt = if depth_dependent { target_z.len() } else { 1 };

    if source_hfac.dim() != (nzs, nhs) || source_h.len() != nhs {
        return Err(Error::config(format!(
            "source transect has data {:?}, hfac {:?} and {} points",
            source_data.dim(),
            source_hfac.dim(),
            source_h.len()
        )));
    }
    if target_hfac.dim() != (nzt, nht) {
        return Err(Error::config(format!(
            "target hfac has shape {:?}, expected {:?}",
            target_hfac.dim(),
            (nzt, nht)
        )));
    }
    if depth_dependent && source_z.len() != nzs {
        return Err(Error::config(format!(
            "source transect has {} levels but {} depths",
            nzs,
            source_z.len()
        )));
    }
    if !depth_dependent && nzs != 1 {
        return Err(Error::config(
            "a depth-independent transect must have a single level",
        ));
    }

    // Horizontal
    let wh = weights_along(source_h, target_h, is_longitude)?;
    let mut h_values = Array2::<f64>::zeros((nzs, nht));
    let mut h_valid = Array2::from_elem((nzs, nht), false);
    for k in 0..nzs {
        for (it, w) in wh.iter().enumerate() {
            if let Some(w) = w {
                let (mut num, mut den) = (0.0, 0.0);
                for (i, c) in w.donors() {
                    if source_hfac[[k, i]] > 0.0 {
                        num += c * source_data[[k, i]];
                        den += c;
                    }
                }
                if den > 0.0 {
                    h_values[[k, it]] = num / den;
                    h_valid[[k, it]] = true;
                }
            }
        }
    }

    let mut values = Array2::<f64>::zeros((nzt, nht));
    let mut valid = Array2::from_elem((nzt, nht), false);

    for it in 0..nht {
        let wet = (0..nzs).filter(|&k| h_valid[[k, it]]).collect::<Vec<usize>>();
        if wet.is_empty() {
            continue;
        }

        for kt in 0..nzt {
            values[[kt, it]] = if depth_dependent {
                vertical_value(source_z, h_values.column(it), &wet, target_z[kt])
            } else {
                h_values[[0, it]]
            };
            valid[[kt, it]] = target_hfac[[kt, it]] > 0.0;
        }
    }

    Ok(Masked { values, valid })
}

/// Linear interpolation in depth between wet levels, clamped at the ends.
/// Depths are negative downwards, so `z` decreases with level index.
fn vertical_value(source_z: ArrayView1<f64>, profile: ArrayView1<f64>, wet: &[usize], z: f64) -> f64 {
    let top = wet[0];
    let bottom = wet[wet.len() - 1];
    if z >= source_z[top] {
        return profile[top];
    }
    if z <= source_z[bottom] {
        return profile[bottom];
    }
    for pair in wet.windows(2) {
        let (ka, kb) = (pair[0], pair[1]);
        let (za, zb) = (source_z[ka], source_z[kb]);
        if z <= za && z >= zb {
            let c = (z - zb) / (za - zb);
            return c * profile[ka] + (1.0 - c) * profile[kb];
        }
    }
    profile[bottom]
}

/// Boundary weights on a curvilinear source grid.
#[derive(Debug, Clone)]
pub struct CurvilinearSlice {
    pub boundary: Boundary,
    /// `(ny, nx)` weights, non-zero only next to the boundary line
    pub weights: Array2<f64>,
    /// Coordinate along the boundary, interpolated onto the boundary line
    pub haxis: Masked<Ix1>,
}

/// Computes weights row by row (E/W) or column by column (N/S) so a
/// structured but irregular source grid can be sliced along the target
/// boundary.
pub fn find_slice_weights(
    source: &Grid,
    target: &Grid,
    boundary: Boundary,
    stagger: Stagger,
) -> Result<CurvilinearSlice> {
    let (centre, edge) = find_obcs_boundary(target, boundary);
    let loc0 = if boundary.on_edge(stagger) {
        edge
    } else {
        centre
    };
    let (lon, lat) = source.lon_lat_2d(stagger);
    let mut weights = Array2::<f64>::zeros(lon.dim());

    let (haxis, n, sum_axis) = if boundary.is_zonal() {
        for i in 0..source.nx {
            // Lines that miss the boundary are caught by the coverage check
            if let Some(w) = line_weights(interp_slice_helper(lat.column(i), loc0, false))? {
                for (j, c) in w.donors() {
                    weights[[j, i]] += c;
                }
            }
        }
        let haxis = extract_slice_2d(lon.view(), None, weights.view(), boundary)?;
        (haxis, source.nx, Axis(0))
    } else {
        for j in 0..source.ny {
            if let Some(w) = line_weights(interp_slice_helper(lon.row(j), loc0, true))? {
                for (i, c) in w.donors() {
                    weights[[j, i]] += c;
                }
            }
        }
        let haxis = extract_slice_2d(lat.view(), None, weights.view(), boundary)?;
        (haxis, source.ny, Axis(1))
    };

    let covered = weights
        .sum_axis(sum_axis)
        .iter()
        .filter(|&&w| w != 0.0)
        .count();
    if covered != n {
        return Err(Error::consistency(format!(
            "only {} of {} source lines cross the {} boundary",
            covered, n, boundary
        )));
    }

    Ok(CurvilinearSlice {
        boundary,
        weights,
        haxis,
    })
}

fn line_weights(weights: Result<SliceWeights>) -> Result<Option<SliceWeights>> {
    match weights {
        Ok(w) => Ok(Some(w)),
        Err(Error::OutOfRange { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Applies slice weights to one `(ny, nx)` level. Invalid donors are dropped
/// and the remaining weights renormalised; points with no valid donor are
/// masked.
pub fn extract_slice_2d(
    data: ArrayView2<f64>,
    valid: Option<ArrayView2<bool>>,
    weights: ArrayView2<f64>,
    boundary: Boundary,
) -> Result<Masked<Ix1>> {
    if data.dim() != weights.dim() || valid.map_or(false, |v| v.dim() != data.dim()) {
        return Err(Error::config(format!(
            "slice weights {:?} do not match data {:?}",
            weights.dim(),
            data.dim()
        )));
    }

    let (ny, nx) = data.dim();
    let (n, m) = if boundary.is_zonal() { (nx, ny) } else { (ny, nx) };
    let mut values = Array1::<f64>::zeros(n);
    let mut mask = Array1::from_elem(n, false);

    for p in 0..n {
        let (mut num, mut den) = (0.0, 0.0);
        for q in 0..m {
            let (j, i) = if boundary.is_zonal() { (q, p) } else { (p, q) };
            let w = weights[[j, i]];
            if w != 0.0 && valid.map_or(true, |v| v[[j, i]]) {
                num += w * data[[j, i]];
                den += w;
            }
        }
        if den > 0.0 {
            values[p] = num / den;
            mask[p] = true;
        }
    }

    Ok(Masked {
        values,
        valid: mask,
    })
}

/// Level-by-level [`extract_slice_2d`] of a `(nz, ny, nx)` field, giving `(nz, n)`.
pub fn extract_slice(
    data: &Masked<ndarray::Ix3>,
    weights: ArrayView2<f64>,
    boundary: Boundary,
) -> Result<Masked<Ix2>> {
    let nz = data.values.len_of(Axis(0));
    let levels = (0..nz)
        .map(|k| {
            extract_slice_2d(
                data.values.index_axis(Axis(0), k),
                Some(data.valid.index_axis(Axis(0), k)),
                weights,
                boundary,
            )
        })
        .collect::<Result<Vec<Masked<Ix1>>>>()?;

    let n = levels.first().map_or(0, |l| l.values.len());
    let mut values = Array2::zeros((nz, n));
    let mut valid = Array2::from_elem((nz, n), false);
    for (k, level) in levels.iter().enumerate() {
        values.row_mut(k).assign(&level.values);
        valid.row_mut(k).assign(&level.valid);
    }
    Ok(Masked { values, valid })
}

impl SourceSlice {
    /// Builds a transect from a curvilinear slice of `(nz, ny, nx)` data.
    pub fn from_curvilinear(slice: &CurvilinearSlice, data: &Masked<ndarray::Ix3>) -> Result<Self> {
        let sliced = extract_slice(data, slice.weights.view(), slice.boundary)?;
        Ok(SourceSlice {
            haxis: slice.haxis.values.clone(),
            hfac: sliced.valid.mapv(|v| if v { 1.0 } else { 0.0 }),
            data: sliced.values,
        })
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::grid::GridArrays,
        approx::assert_abs_diff_eq,
        ndarray::{arr1, arr2, Array3},
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

    #[test]
    fn boundary_codes() {
        assert_eq!("N".parse::<Boundary>().unwrap(), Boundary::North);
        assert!("NE".parse::<Boundary>().is_err());
        assert_eq!(Boundary::West.sign(), 1.0);
        assert_eq!(Boundary::North.sign(), -1.0);
        assert!(Boundary::South.on_edge(Stagger::V));
        assert!(!Boundary::South.on_edge(Stagger::U));
    }

    #[test]
    fn boundary_locations() {
        let g = grid(&[0.0, 1.0, 2.0], &[-70.0, -69.5], Array3::ones((1, 2, 3)));
        assert_eq!(find_obcs_boundary(&g, Boundary::South), (-70.0, -70.25));
        assert_eq!(find_obcs_boundary(&g, Boundary::North), (-69.5, -69.25));
        assert_eq!(find_obcs_boundary(&g, Boundary::West), (0.0, -0.5));
        assert_eq!(find_obcs_boundary(&g, Boundary::East), (2.0, 2.5));
    }

    #[test]
    fn slice_uses_edges_for_normal_velocity() {
        let source = grid(
            &[0.0, 1.0, 2.0, 3.0],
            &[-72.0, -71.0, -70.0, -69.0],
            Array3::ones((1, 4, 4)),
        );
        let target = grid(&[0.5, 1.5], &[-70.5, -70.0], Array3::ones((1, 2, 2)));
        let slicer = BoundarySlicer::new(&source, &target, Boundary::South).unwrap();

        let data = Array3::from_shape_fn((1, 4, 4), |(_, j, _)| j as f64);
        let hfac = source.get_hfac(Stagger::T);

        // Centre -70.5 sits between rows 1 and 2
        let t = slicer.slice(&source, data.view(), hfac.view(), Stagger::T).unwrap();
        assert_abs_diff_eq!(t.data[[0, 0]], 1.5, epsilon = 1.0e-12);

        // Edge -70.75 sits between source corners -71.5 (row 1) and -70.5 (row 2)
        let v = slicer
            .slice(&source, data.view(), source.get_hfac(Stagger::V).view(), Stagger::V)
            .unwrap();
        assert_abs_diff_eq!(v.data[[0, 0]], 1.75, epsilon = 1.0e-12);
        assert_eq!(v.haxis.to_vec(), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn sliced_hfac_respects_land_on_either_side() {
        let mut hfac = Array3::ones((2, 3, 2));
        hfac[[1, 1, 0]] = 0.0;
        hfac[[1, 2, 0]] = 0.0;
        let source = grid(&[0.0, 1.0], &[0.0, 1.0, 2.0], hfac.clone());
        let target = grid(&[0.0, 1.0], &[0.5, 0.7], Array3::ones((2, 2, 2)));
        let slicer = BoundarySlicer::new(&source, &target, Boundary::South).unwrap();

        let data = Array3::ones((2, 3, 2));
        let s = slicer.slice(&source, data.view(), hfac.view(), Stagger::T).unwrap();
        assert_eq!(s.hfac[[0, 0]], 1.0);
        assert_eq!(s.hfac[[1, 0]], 0.0);
        assert_eq!(s.hfac[[1, 1]], 1.0);
    }

    #[test]
    fn extension_duplicates_first_point() {
        let mut t = SourceSlice {
            haxis: arr1(&[-70.0, -69.0]),
            data: arr2(&[[1.0, 2.0]]),
            hfac: arr2(&[[1.0, 0.5]]),
        };
        assert!(!t.extend_to(-69.5));
        assert!(t.extend_to(-71.0));
        assert_abs_diff_eq!(t.haxis[0], -71.1, epsilon = 1.0e-12);
        assert_eq!(t.haxis.slice(s![1..]).to_vec(), vec![-70.0, -69.0]);
        assert_eq!(t.data, arr2(&[[1.0, 1.0, 2.0]]));
        assert_eq!(t.hfac, arr2(&[[1.0, 1.0, 0.5]]));
    }

    #[test]
    fn vertical_skips_dry_levels() {
        let source_h = arr1(&[0.0, 1.0]);
        let source_z = arr1(&[-5.0, -15.0, -25.0]);
        let data = arr2(&[[1.0, 1.0], [2.0, 2.0], [100.0, 3.0]]);
        let hfac = arr2(&[[1.0, 1.0], [1.0, 1.0], [0.0, 1.0]]);

        let target_h = arr1(&[0.0, 1.0]);
        let target_z = arr1(&[-2.0, -10.0, -20.0, -30.0]);
        let target_hfac = arr2(&[[1.0, 1.0], [1.0, 1.0], [1.0, 1.0], [0.0, 1.0]]);

        let out = interp_bdry(
            source_h.view(),
            source_z.view(),
            data.view(),
            hfac.view(),
            target_h.view(),
            target_z.view(),
            target_hfac.view(),
            true,
            false,
        )
        .unwrap();

        // Column 0 only has two wet levels, so the deep value never leaks in
        assert_eq!(out.values.column(0).to_vec(), vec![1.0, 1.5, 2.0, 2.0]);
        assert_eq!(out.values.column(1).to_vec(), vec![1.0, 1.5, 2.5, 3.0]);
        assert!(!out.valid[[3, 0]] && out.valid[[3, 1]]);
    }

    #[test]
    fn dry_columns_are_zero_and_masked() {
        let out = interp_bdry(
            arr1(&[0.0, 1.0]).view(),
            arr1(&[0.0]).view(),
            arr2(&[[5.0, 6.0]]).view(),
            arr2(&[[0.0, 1.0]]).view(),
            arr1(&[0.0, 0.5]).view(),
            arr1(&[0.0]).view(),
            arr2(&[[1.0, 1.0]]).view(),
            false,
            false,
        )
        .unwrap();
        assert_eq!(out.values[[0, 0]], 0.0);
        assert!(!out.valid[[0, 0]]);
        // Only the wet donor contributes halfway between the two
        assert_eq!(out.values[[0, 1]], 6.0);
        assert!(out.valid[[0, 1]]);
    }

    #[test]
    fn curvilinear_weights() {
        // Rows of a rotated grid: longitude shifts by half a degree per row
        let mut arrays =
            GridArrays::rectangular(&[0.0, 1.0, 2.0, 3.0], &[0.0, 1.0, 2.0], &[0.0, -10.0], Array3::ones((1, 3, 4)))
                .unwrap();
        arrays.lon_2d = Array2::from_shape_fn((3, 4), |(j, i)| i as f64 + 0.5 * j as f64);
        arrays.lon_corners_2d = arrays.lon_2d.mapv(|x| x - 0.5);
        let source = Grid::from_arrays(arrays, 180.0).unwrap();

        let target = grid(&[1.5, 1.75], &[0.0, 1.0, 2.0], Array3::ones((1, 3, 2)));
        let slice = find_slice_weights(&source, &target, Boundary::West, Stagger::T).unwrap();

        // Row 0 brackets 1.5 with columns 1 and 2, row 1 hits column 1 exactly
        assert_eq!(slice.weights.row(0).to_vec(), vec![0.0, 0.5, 0.5, 0.0]);
        assert_eq!(slice.weights.row(1).to_vec(), vec![0.0, 1.0, 0.0, 0.0]);
        assert_eq!(slice.haxis.values.to_vec(), vec![0.0, 1.0, 2.0]);

        let data = Masked::all_valid(Array3::from_shape_fn((1, 3, 4), |(_, _, i)| i as f64));
        let transect = SourceSlice::from_curvilinear(&slice, &data).unwrap();
        assert_eq!(transect.data.row(0).to_vec(), vec![1.5, 1.0, 0.5]);
        assert!(transect.hfac.iter().all(|&h| h == 1.0));
    }

    #[test]
    fn curvilinear_line_short_of_boundary() {
        let mut arrays =
            GridArrays::rectangular(&[0.0, 1.0, 2.0, 3.0], &[0.0, 1.0, 2.0], &[0.0, -10.0], Array3::ones((1, 3, 4)))
                .unwrap();
        // Last column stops at 1 degree, below the northern boundary at 2
        arrays.lat_2d = Array2::from_shape_fn((3, 4), |(j, i)| if i == 3 { 0.5 * j as f64 } else { j as f64 });
        arrays.lat_corners_2d = arrays.lat_2d.mapv(|y| y - 0.5);
        let source = Grid::from_arrays(arrays, 180.0).unwrap();

        let target = grid(&[0.0, 1.0, 2.0], &[1.0, 2.0], Array3::ones((1, 2, 3)));
        assert!(matches!(
            find_slice_weights(&source, &target, Boundary::North, Stagger::T),
            Err(Error::DataConsistency(_))
        ));
        // The southern boundary is crossed by every column
        assert!(find_slice_weights(&source, &target, Boundary::South, Stagger::T).is_ok());
    }
}
