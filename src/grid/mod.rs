//! Structured Arakawa C-grid with partial cells.
//!
//! Horizontal arrays are stored `(ny, nx)` and 3D arrays `(nz, ny, nx)`.
//! Depths are negative downwards, thicknesses positive.

pub mod files;

use {
    crate::{
        constants::{DEG2RAD, R_EARTH},
        error::{Error, Result},
        io::GridDims,
        utils::fix_lon_range,
    },
    log::debug,
    ndarray::{s, Array1, Array2, Array3, ArrayD, ArrayView1, ArrayView2, ArrayView3, Axis},
    serde::{Deserialize, Serialize},
    std::{
        collections::BTreeMap,
        fmt,
        fs::File,
        io::{BufReader, BufWriter},
        path::Path,
        str::FromStr,
    },
};

/// C-grid staggering of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stagger {
    /// Tracer points at cell centres
    #[serde(rename = "t")]
    T,
    /// West/east faces
    #[serde(rename = "u")]
    U,
    /// South/north faces
    #[serde(rename = "v")]
    V,
}

impl FromStr for Stagger {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "t" => Ok(Stagger::T),
            "u" => Ok(Stagger::U),
            "v" => Ok(Stagger::V),
            _ => Err(Error::config(format!(
                "invalid grid type {:?}, must be one of t, u, v",
                s
            ))),
        }
    }
}

impl fmt::Display for Stagger {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Stagger::T => "t",
            Stagger::U => "u",
            Stagger::V => "v",
        })
    }
}

/// Longitude/latitude box used for named region masks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

/// Raw inputs for [`Grid::from_arrays`]. Optional members are derived when absent.
#[derive(Debug, Clone)]
pub struct GridArrays {
    pub lon_2d: Array2<f64>,
    pub lat_2d: Array2<f64>,
    pub lon_corners_2d: Array2<f64>,
    pub lat_corners_2d: Array2<f64>,
    pub z: Array1<f64>,
    pub z_edges: Array1<f64>,
    pub hfac: Array3<f64>,
    pub hfac_w: Option<Array3<f64>>,
    pub hfac_s: Option<Array3<f64>>,
    pub dx_s: Option<Array2<f64>>,
    pub dy_w: Option<Array2<f64>>,
    pub d_a: Option<Array2<f64>>,
}

impl GridArrays {
    /// Regular lon-lat grid from cell-centre axes and depth edges (negative down).
    /// Corners sit halfway between centres.
    pub fn rectangular(
        lon: &[f64],
        lat: &[f64],
        z_edges: &[f64],
        hfac: Array3<f64>,
    ) -> Result<Self> {
        if lon.len() < 2 || lat.len() < 2 || z_edges.len() < 2 {
            return Err(Error::config(
                "a rectangular grid needs at least two points along each horizontal axis and one level",
            ));
        }

        let corners = |c: &[f64]| -> Vec<f64> {
            (0..c.len())
                .map(|i| {
                    if i == 0 {
                        c[0] - 0.5 * (c[1] - c[0])
                    } else {
                        0.5 * (c[i - 1] + c[i])
                    }
                })
                .collect()
        };
        let lon_c = corners(lon);
        let lat_c = corners(lat);
        let (ny, nx) = (lat.len(), lon.len());

        Ok(GridArrays {
            lon_2d: Array2::from_shape_fn((ny, nx), |(_, i)| lon[i]),
            lat_2d: Array2::from_shape_fn((ny, nx), |(j, _)| lat[j]),
            lon_corners_2d: Array2::from_shape_fn((ny, nx), |(_, i)| lon_c[i]),
            lat_corners_2d: Array2::from_shape_fn((ny, nx), |(j, _)| lat_c[j]),
            z: (0..z_edges.len() - 1)
                .map(|k| 0.5 * (z_edges[k] + z_edges[k + 1]))
                .collect(),
            z_edges: Array1::from(z_edges.to_vec()),
            hfac,
            hfac_w: None,
            hfac_s: None,
            dx_s: None,
            dy_w: None,
            d_a: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub(crate) nx: usize,
    pub(crate) ny: usize,
    pub(crate) nz: usize,

    // Cell centres and south-west corners
    pub(crate) lon_2d: Array2<f64>,
    pub(crate) lat_2d: Array2<f64>,
    pub(crate) lon_corners_2d: Array2<f64>,
    pub(crate) lat_corners_2d: Array2<f64>,
    pub(crate) lon_1d: Array1<f64>,
    pub(crate) lat_1d: Array1<f64>,
    pub(crate) lon_corners_1d: Array1<f64>,
    pub(crate) lat_corners_1d: Array1<f64>,

    pub(crate) z: Array1<f64>,
    pub(crate) z_edges: Array1<f64>,
    pub(crate) dz: Array1<f64>,

    pub(crate) hfac: Array3<f64>,
    pub(crate) hfac_w: Array3<f64>,
    pub(crate) hfac_s: Array3<f64>,

    pub(crate) dx_s: Array2<f64>,
    pub(crate) dy_w: Array2<f64>,
    pub(crate) d_a: Array2<f64>,

    pub(crate) land_mask: Array2<bool>,
    pub(crate) ice_mask: Array2<bool>,

    pub(crate) split: f64,
    pub(crate) regions: BTreeMap<String, Region>,
}

impl Grid {
    /// Builds a grid from raw arrays, wrapping longitudes into the `split`
    /// convention (180 or 0) and validating shapes and the hFac column structure.
    pub fn from_arrays(arrays: GridArrays, split: f64) -> Result<Self> {
        if split != 180.0 && split != 0.0 {
            return Err(Error::config(format!(
                "invalid split {}, must be 180 or 0",
                split
            )));
        }

        let GridArrays {
            lon_2d,
            lat_2d,
            lon_corners_2d,
            lat_corners_2d,
            z,
            z_edges,
            hfac,
            hfac_w,
            hfac_s,
            dx_s,
            dy_w,
            d_a,
        } = arrays;

        let (nz, ny, nx) = hfac.dim();
        let shape2 = (ny, nx);
        let shape3 = (nz, ny, nx);

        for (name, arr) in &[
            ("lon", &lon_2d),
            ("lat", &lat_2d),
            ("lon_corners", &lon_corners_2d),
            ("lat_corners", &lat_corners_2d),
        ] {
            check_shape2(name, arr, shape2)?;
        }
        for (name, arr) in &[("dx_s", &dx_s), ("dy_w", &dy_w), ("dA", &d_a)] {
            if let Some(arr) = arr {
                check_shape2(name, arr, shape2)?;
            }
        }
        for (name, arr) in &[("hfac_w", &hfac_w), ("hfac_s", &hfac_s)] {
            if let Some(arr) = arr {
                if arr.dim() != shape3 {
                    return Err(Error::config(format!(
                        "{} has shape {:?}, expected {:?}",
                        name,
                        arr.dim(),
                        shape3
                    )));
                }
            }
        }
        if z.len() != nz || z_edges.len() != nz + 1 {
            return Err(Error::config(format!(
                "vertical axes have {} centres and {} edges, expected {} and {}",
                z.len(),
                z_edges.len(),
                nz,
                nz + 1
            )));
        }
        check_hfac(hfac.view())?;

        let lon_2d = lon_2d.mapv(|x| fix_lon_range(x, split));
        let lon_corners_2d = lon_corners_2d.mapv(|x| fix_lon_range(x, split));

        let lon_1d = lon_2d.row(0).to_owned();
        let lat_1d = lat_2d.column(0).to_owned();
        let lon_corners_1d = lon_corners_2d.row(0).to_owned();
        let lat_corners_1d = lat_corners_2d.column(0).to_owned();

        check_split(&lon_1d, split)?;
        check_split(&lon_corners_1d, split)?;

        let dz = (0..nz)
            .map(|k| (z_edges[k] - z_edges[k + 1]).abs())
            .collect::<Array1<f64>>();

        let hfac_w = hfac_w.unwrap_or_else(|| shift_min(hfac.view(), Axis(2)));
        let hfac_s = hfac_s.unwrap_or_else(|| shift_min(hfac.view(), Axis(1)));

        let dx_s = dx_s.unwrap_or_else(|| {
            Array2::from_shape_fn(shape2, |(j, i)| {
                R_EARTH
                    * (lat_corners_2d[[j, i]] * DEG2RAD).cos()
                    * spacing(lon_corners_2d.row(j), i)
                    * DEG2RAD
            })
        });
        let dy_w = dy_w.unwrap_or_else(|| {
            Array2::from_shape_fn(shape2, |(j, i)| {
                R_EARTH * spacing(lat_corners_2d.column(i), j) * DEG2RAD
            })
        });
        let d_a = d_a.unwrap_or_else(|| {
            Array2::from_shape_fn(shape2, |(j, i)| {
                R_EARTH.powi(2)
                    * (lat_2d[[j, i]] * DEG2RAD).cos()
                    * spacing(lon_corners_2d.row(j), i)
                    * spacing(lat_corners_2d.column(i), j)
                    * DEG2RAD.powi(2)
            })
        });

        let land_mask = Array2::from_shape_fn(shape2, |(j, i)| {
            hfac.slice(s![.., j, i]).iter().all(|&h| h == 0.0)
        });
        let ice_mask = Array2::from_shape_fn(shape2, |(j, i)| {
            !land_mask[[j, i]] && hfac[[0, j, i]] == 0.0
        });

        debug!(
            "Built {}x{}x{} grid, {} land columns, {} ice shelf columns",
            nx,
            ny,
            nz,
            land_mask.iter().filter(|&&m| m).count(),
            ice_mask.iter().filter(|&&m| m).count()
        );

        Ok(Grid {
            nx,
            ny,
            nz,
            lon_2d,
            lat_2d,
            lon_corners_2d,
            lat_corners_2d,
            lon_1d,
            lat_1d,
            lon_corners_1d,
            lat_corners_1d,
            z,
            z_edges,
            dz,
            hfac,
            hfac_w,
            hfac_s,
            dx_s,
            dy_w,
            d_a,
            land_mask,
            ice_mask,
            split,
            regions: BTreeMap::new(),
        })
    }

    /// Registers a named lon/lat box for [`Grid::get_region_mask`].
    pub fn with_region(mut self, name: &str, region: Region) -> Self {
        self.regions.insert(name.to_owned(), region);
        self
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn nz(&self) -> usize {
        self.nz
    }

    pub fn split(&self) -> f64 {
        self.split
    }

    pub fn dims(&self) -> GridDims {
        GridDims {
            nx: self.nx,
            ny: self.ny,
            nz: self.nz,
        }
    }

    pub fn z(&self) -> ArrayView1<f64> {
        self.z.view()
    }

    pub fn z_edges(&self) -> ArrayView1<f64> {
        self.z_edges.view()
    }

    pub fn dz(&self) -> ArrayView1<f64> {
        self.dz.view()
    }

    pub fn hfac(&self) -> ArrayView3<f64> {
        self.hfac.view()
    }

    pub fn dx_s(&self) -> ArrayView2<f64> {
        self.dx_s.view()
    }

    pub fn dy_w(&self) -> ArrayView2<f64> {
        self.dy_w.view()
    }

    pub fn d_a(&self) -> ArrayView2<f64> {
        self.d_a.view()
    }

    pub fn lon_corners_1d(&self) -> ArrayView1<f64> {
        self.lon_corners_1d.view()
    }

    pub fn lat_corners_1d(&self) -> ArrayView1<f64> {
        self.lat_corners_1d.view()
    }

    /// 1D coordinate axes for the given stagger.
    pub fn lon_lat_1d(&self, stagger: Stagger) -> (Array1<f64>, Array1<f64>) {
        match stagger {
            Stagger::T => (self.lon_1d.clone(), self.lat_1d.clone()),
            Stagger::U => (self.lon_corners_1d.clone(), self.lat_1d.clone()),
            Stagger::V => (self.lon_1d.clone(), self.lat_corners_1d.clone()),
        }
    }

    /// 2D coordinate arrays for the given stagger.
    pub fn lon_lat_2d(&self, stagger: Stagger) -> (Array2<f64>, Array2<f64>) {
        match stagger {
            Stagger::T => (self.lon_2d.clone(), self.lat_2d.clone()),
            Stagger::U => (self.lon_corners_2d.clone(), self.lat_2d.clone()),
            Stagger::V => (self.lon_2d.clone(), self.lat_corners_2d.clone()),
        }
    }

    /// Coordinates as 1D (`dim == 1`) or 2D (`dim == 2`) arrays.
    pub fn get_lon_lat(&self, stagger: Stagger, dim: usize) -> Result<(ArrayD<f64>, ArrayD<f64>)> {
        match dim {
            1 => {
                let (lon, lat) = self.lon_lat_1d(stagger);
                Ok((lon.into_dyn(), lat.into_dyn()))
            }
            2 => {
                let (lon, lat) = self.lon_lat_2d(stagger);
                Ok((lon.into_dyn(), lat.into_dyn()))
            }
            _ => Err(Error::config(format!(
                "invalid coordinate dimension {}, must be 1 or 2",
                dim
            ))),
        }
    }

    pub fn get_hfac(&self, stagger: Stagger) -> Array3<f64> {
        match stagger {
            Stagger::T => self.hfac.clone(),
            Stagger::U => self.hfac_w.clone(),
            Stagger::V => self.hfac_s.clone(),
        }
    }

    pub(crate) fn hfac_view(&self, stagger: Stagger) -> ArrayView3<f64> {
        match stagger {
            Stagger::T => self.hfac.view(),
            Stagger::U => self.hfac_w.view(),
            Stagger::V => self.hfac_s.view(),
        }
    }

    /// Columns with open ocean beneath a dry surface cell.
    pub fn get_ice_mask(&self) -> Array2<bool> {
        self.ice_mask.clone()
    }

    /// Columns with no wet cells at all.
    pub fn get_land_mask(&self) -> Array2<bool> {
        self.land_mask.clone()
    }

    /// Wet columns whose centres fall inside the named region.
    pub fn get_region_mask(&self, name: &str) -> Result<Array2<bool>> {
        let region = self
            .regions
            .get(name)
            .ok_or_else(|| Error::config(format!("unknown region {:?}", name)))?;
        let lon_min = fix_lon_range(region.lon_min, self.split);
        let lon_max = fix_lon_range(region.lon_max, self.split);

        Ok(Array2::from_shape_fn((self.ny, self.nx), |(j, i)| {
            let lon = self.lon_2d[[j, i]];
            let lat = self.lat_2d[[j, i]];
            let in_lon = if lon_min <= lon_max {
                lon >= lon_min && lon <= lon_max
            } else {
                // Box straddles the seam of this grid's convention
                lon >= lon_min || lon <= lon_max
            };
            in_lon && lat >= region.lat_min && lat <= region.lat_max && !self.land_mask[[j, i]]
        }))
    }

    /// Saves the grid so expensive construction can be skipped next time.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let f = BufWriter::new(File::create(path)?);
        bincode::serialize_into(f, self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(f)?)
    }
}

fn check_shape2(name: &str, arr: &Array2<f64>, shape: (usize, usize)) -> Result<()> {
    if arr.dim() != shape {
        return Err(Error::config(format!(
            "{} has shape {:?}, expected {:?}",
            name,
            arr.dim(),
            shape
        )));
    }
    Ok(())
}

/// hFac must lie in [0, 1] and the wet cells of each column must be contiguous.
fn check_hfac(hfac: ArrayView3<f64>) -> Result<()> {
    if let Some(h) = hfac.iter().find(|&&h| !(0.0..=1.0).contains(&h)) {
        return Err(Error::config(format!("hfac value {} outside [0, 1]", h)));
    }

    let (_, ny, nx) = hfac.dim();
    for j in 0..ny {
        for i in 0..nx {
            let column = hfac.slice(s![.., j, i]);
            let mut seen_wet = false;
            let mut hit_bottom = false;
            for &h in column.iter() {
                if h > 0.0 {
                    if hit_bottom {
                        return Err(Error::config(format!(
                            "wet cell below the sea floor in column (j={}, i={})",
                            j, i
                        )));
                    }
                    seen_wet = true;
                } else if seen_wet {
                    hit_bottom = true;
                }
            }
        }
    }
    Ok(())
}

fn check_split(lon: &Array1<f64>, split: f64) -> Result<()> {
    if lon.iter().zip(lon.iter().skip(1)).any(|(a, b)| b <= a) {
        let other = if split == 180.0 { 0 } else { 180 };
        return Err(Error::config(format!(
            "longitudes are not increasing with split={}, the domain crosses the seam; try split={}",
            split, other
        )));
    }
    Ok(())
}

/// Face hFac from the two adjacent tracer cells; the first face copies its cell.
fn shift_min(hfac: ArrayView3<f64>, axis: Axis) -> Array3<f64> {
    let mut out = hfac.to_owned();
    let n = hfac.len_of(axis);
    for idx in 1..n {
        let prev = hfac.index_axis(axis, idx - 1);
        let mut cur = out.index_axis_mut(axis, idx);
        cur.iter_mut()
            .zip(prev.iter())
            .for_each(|(c, p)| *c = c.min(*p));
    }
    out
}

/// Width of cell `i` along a corner axis; the last cell reuses the previous width.
fn spacing(corners: ArrayView1<f64>, i: usize) -> f64 {
    let n = corners.len();
    if n < 2 {
        return 0.0;
    }
    if i + 1 < n {
        corners[i + 1] - corners[i]
    } else {
        corners[n - 1] - corners[n - 2]
    }
}

#[cfg(test)]
pub(crate) mod test {
    use {super::*, approx::assert_relative_eq, tempdir::TempDir};

    /// Three columns: open ocean, ice shelf cavity, land.
    pub(crate) fn small_grid() -> Grid {
        let mut hfac = Array3::<f64>::zeros((3, 2, 3));
        for j in 0..2 {
            hfac.slice_mut(s![.., j, 0]).assign(&ndarray::arr1(&[1.0, 1.0, 0.5]));
            hfac.slice_mut(s![.., j, 1]).assign(&ndarray::arr1(&[0.0, 0.3, 1.0]));
        }
        let arrays = GridArrays::rectangular(
            &[10.0, 11.0, 12.0],
            &[-75.0, -74.0],
            &[0.0, -10.0, -30.0, -60.0],
            hfac,
        )
        .unwrap();
        Grid::from_arrays(arrays, 180.0).unwrap()
    }

    #[test]
    fn staggered_coordinates() {
        let grid = small_grid();
        let (lon_u, lat_u) = grid.lon_lat_1d(Stagger::U);
        assert_eq!(lon_u.to_vec(), vec![9.5, 10.5, 11.5]);
        assert_eq!(lat_u.to_vec(), vec![-75.0, -74.0]);

        let (lon_v, lat_v) = grid.lon_lat_1d(Stagger::V);
        assert_eq!(lon_v.to_vec(), vec![10.0, 11.0, 12.0]);
        assert_eq!(lat_v.to_vec(), vec![-75.5, -74.5]);

        let (lon, _) = grid.get_lon_lat(Stagger::T, 2).unwrap();
        assert_eq!(lon.shape(), &[2, 3]);
        assert!(grid.get_lon_lat(Stagger::T, 3).is_err());
    }

    #[test]
    fn vertical_axes() {
        let grid = small_grid();
        assert_eq!(grid.z().to_vec(), vec![-5.0, -20.0, -45.0]);
        assert_eq!(grid.dz().to_vec(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn face_hfac_is_neighbour_minimum() {
        let grid = small_grid();
        let hfac_w = grid.get_hfac(Stagger::U);
        assert_eq!(hfac_w[[0, 0, 0]], 1.0);
        assert_eq!(hfac_w[[0, 0, 1]], 0.0);
        assert_eq!(hfac_w[[1, 0, 1]], 0.3);
        assert_eq!(hfac_w[[2, 0, 1]], 0.5);
        assert_eq!(hfac_w[[2, 0, 2]], 0.0);

        // Zonally uniform, so south faces match the cells
        assert_eq!(grid.get_hfac(Stagger::V), grid.get_hfac(Stagger::T));
    }

    #[test]
    fn masks() {
        let grid = small_grid();
        assert_eq!(
            grid.get_ice_mask().row(0).to_vec(),
            vec![false, true, false]
        );
        assert_eq!(
            grid.get_land_mask().row(0).to_vec(),
            vec![false, false, true]
        );
    }

    #[test]
    fn region_mask_excludes_land() {
        let grid = small_grid().with_region(
            "east",
            Region {
                lon_min: 10.5,
                lon_max: 13.0,
                lat_min: -80.0,
                lat_max: -60.0,
            },
        );
        let mask = grid.get_region_mask("east").unwrap();
        assert_eq!(mask.row(1).to_vec(), vec![false, true, false]);
        assert!(grid.get_region_mask("west").is_err());
    }

    #[test]
    fn accessors_return_copies() {
        let grid = small_grid();
        let mut hfac = grid.get_hfac(Stagger::T);
        hfac.fill(0.0);
        assert_eq!(grid.hfac()[[0, 0, 0]], 1.0);
    }

    #[test]
    fn cell_geometry() {
        let grid = small_grid();
        let dy = R_EARTH * DEG2RAD;
        assert_relative_eq!(grid.dy_w()[[0, 0]], dy, max_relative = 1.0e-12);
        assert_relative_eq!(
            grid.dx_s()[[0, 0]],
            dy * (-75.5 * DEG2RAD).cos(),
            max_relative = 1.0e-12
        );
        assert_relative_eq!(
            grid.d_a()[[1, 2]],
            dy * dy * (-74.0 * DEG2RAD).cos(),
            max_relative = 1.0e-12
        );
    }

    #[test]
    fn invalid_inputs() {
        assert!("w".parse::<Stagger>().is_err());
        assert_eq!("v".parse::<Stagger>().unwrap(), Stagger::V);

        // Wet cell beneath the sea floor
        let mut hfac = Array3::<f64>::ones((3, 2, 2));
        hfac[[1, 0, 0]] = 0.0;
        let arrays =
            GridArrays::rectangular(&[0.0, 1.0], &[0.0, 1.0], &[0.0, -1.0, -2.0, -3.0], hfac)
                .unwrap();
        assert!(matches!(
            Grid::from_arrays(arrays, 180.0),
            Err(Error::Configuration(_))
        ));

        let arrays = GridArrays::rectangular(
            &[0.0, 1.0],
            &[0.0, 1.0],
            &[0.0, -1.0],
            Array3::ones((1, 3, 2)),
        )
        .unwrap();
        assert!(Grid::from_arrays(arrays, 180.0).is_err());
    }

    #[test]
    fn seam_crossing_needs_other_split() {
        let lon = [178.0, 179.0, 180.0, 181.0, 182.0];
        let arrays = GridArrays::rectangular(
            &lon,
            &[0.0, 1.0],
            &[0.0, -1.0],
            Array3::ones((1, 2, 5)),
        )
        .unwrap();
        assert!(Grid::from_arrays(arrays.clone(), 180.0).is_err());

        let grid = Grid::from_arrays(arrays, 0.0).unwrap();
        assert_eq!(grid.lon_lat_1d(Stagger::T).0[4], 182.0);
    }

    #[test]
    fn cache_round_trip() {
        let dir = TempDir::new("mitgcm-prep").unwrap();
        let path = dir.path().join("grid.bin");
        let grid = small_grid();
        grid.save(&path).unwrap();
        assert_eq!(Grid::load(&path).unwrap(), grid);
    }
}
