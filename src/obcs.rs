//! Open boundary conditions: monthly source fields sliced along each model
//! boundary and interpolated onto its points and levels.

use {
    crate::{
        error::{Error, Result},
        field::{Field, Masked},
        grid::{Grid, Stagger},
        interp::boundary::{
            boundary_axis, boundary_hfac, find_obcs_boundary, find_slice_weights, interp_bdry,
            Boundary, BoundarySlicer, CurvilinearSlice, SourceSlice,
        },
        io::{read_binary, write_binary, DimCode, Precision},
    },
    log::{debug, info},
    ndarray::{s, Array3, ArrayD, ArrayView3, ArrayViewD, Axis, Ix3, Ix4, ShapeError},
    serde::{Deserialize, Serialize},
    std::path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObcsVariable {
    pub name: String,
    pub depth_dependent: bool,
    pub stagger: Stagger,
}

impl ObcsVariable {
    fn new(name: &str, depth_dependent: bool, stagger: Stagger) -> Self {
        Self {
            name: name.to_owned(),
            depth_dependent,
            stagger,
        }
    }

    /// Tracers keep their extrapolated values under target land; everything
    /// else is zeroed there.
    pub fn keeps_land_values(&self) -> bool {
        self.name == "THETA" || self.name == "SALT"
    }

    pub fn is_sea_ice(&self) -> bool {
        self.name.starts_with("SI")
    }

    fn is_sea_ice_velocity(&self) -> bool {
        self.name == "SIuice" || self.name == "SIvice"
    }
}

/// Boundary fields in processing order: sea ice area comes before the sea ice
/// velocities it masks.
pub fn obcs_variables(with_snow: bool) -> Vec<ObcsVariable> {
    let mut vars = vec![
        ObcsVariable::new("THETA", true, Stagger::T),
        ObcsVariable::new("SALT", true, Stagger::T),
        ObcsVariable::new("UVEL", true, Stagger::U),
        ObcsVariable::new("VVEL", true, Stagger::V),
        ObcsVariable::new("SIarea", false, Stagger::T),
        ObcsVariable::new("SIheff", false, Stagger::T),
        ObcsVariable::new("SIuice", false, Stagger::U),
        ObcsVariable::new("SIvice", false, Stagger::V),
        ObcsVariable::new("ETAN", false, Stagger::T),
    ];
    if with_snow {
        vars.push(ObcsVariable::new("SIhsnow", false, Stagger::T));
    }
    vars
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObcsConfig {
    pub source_name: String,
    pub variables: Vec<ObcsVariable>,
    pub use_seaice: bool,
    pub input_suffix: String,
    pub input_prec: Precision,
    pub prec: Precision,
    /// Pad the source transect when the model boundary starts before it.
    pub extend_source: bool,
    /// Slice the source row by row instead of assuming a regular lon-lat grid.
    pub curvilinear: bool,
    /// Zero sea ice velocity wherever the source has no sea ice.
    pub mask_ice_velocity: bool,
    /// Appended to output file names for one-file-per-year forcing.
    pub year: Option<i32>,
}

impl Default for ObcsConfig {
    fn default() -> Self {
        Self {
            source_name: "SOSE".to_owned(),
            variables: obcs_variables(false),
            use_seaice: true,
            input_suffix: "_climatology.data".to_owned(),
            input_prec: Precision::Double,
            prec: Precision::Single,
            extend_source: false,
            curvilinear: false,
            mask_ice_velocity: true,
            year: None,
        }
    }
}

/// `{variable}_{source}.OBCS_{boundary}`, with `_{year}` appended if given.
pub fn obcs_file_name(variable: &str, source: &str, boundary: Boundary, year: Option<i32>) -> String {
    match year {
        Some(year) => format!("{}_{}.OBCS_{}_{}", variable, source, boundary, year),
        None => format!("{}_{}.OBCS_{}", variable, source, boundary),
    }
}

enum Transect {
    Regular(BoundarySlicer),
    Curvilinear(CurvilinearSlice),
}

impl Transect {
    fn new(source: &Grid, target: &Grid, boundary: Boundary, stagger: Stagger, curvilinear: bool) -> Result<Self> {
        if curvilinear {
            Ok(Transect::Curvilinear(find_slice_weights(source, target, boundary, stagger)?))
        } else {
            Ok(Transect::Regular(BoundarySlicer::new(source, target, boundary)?))
        }
    }

    fn extract(
        &self,
        source: &Grid,
        data: ArrayView3<f64>,
        hfac: ArrayView3<f64>,
        stagger: Stagger,
    ) -> Result<SourceSlice> {
        match self {
            Transect::Regular(slicer) => slicer.slice(source, data, hfac, stagger),
            Transect::Curvilinear(weights) => {
                SourceSlice::from_curvilinear(weights, &Masked::from_hfac(data.to_owned(), &hfac)?)
            }
        }
    }
}

/// Interpolates every record of a source field onto one model boundary.
///
/// `data` is `(t, nz, ny, nx)` for depth-dependent variables and `(t, ny, nx)`
/// otherwise; the result is `(t, nz, n)` or `(t, n)`.
pub fn interp_obcs_field(
    source: &Grid,
    target: &Grid,
    boundary: Boundary,
    data: ArrayViewD<f64>,
    variable: &ObcsVariable,
    config: &ObcsConfig,
) -> Result<ArrayD<f64>> {
    let rank_error = |e: ShapeError| Error::config(format!("{}: {}", variable.name, e));
    let data = if variable.depth_dependent {
        data.into_dimensionality::<Ix4>().map_err(rank_error)?
    } else {
        data.into_dimensionality::<Ix3>()
            .map_err(rank_error)?
            .insert_axis(Axis(1))
    };

    let stagger = variable.stagger;
    let (nz_s, nz_t) = if variable.depth_dependent {
        (source.nz, target.nz)
    } else {
        (1, 1)
    };
    if data.len_of(Axis(1)) != nz_s {
        return Err(Error::config(format!(
            "{} has {} levels, source grid has {}",
            variable.name,
            data.len_of(Axis(1)),
            nz_s
        )));
    }

    let source_hfac = source.hfac_view(stagger).slice_move(s![0..nz_s, .., ..]);
    let target_hfac = boundary_hfac(target, boundary, stagger).slice_move(s![0..nz_t, ..]);
    let target_haxis = boundary_axis(target, boundary, stagger);
    let transect = Transect::new(source, target, boundary, stagger, config.curvilinear)?;

    let num_time = data.len_of(Axis(0));
    let mut out = Array3::<f64>::zeros((num_time, nz_t, target_haxis.len()));
    for t in 0..num_time {
        debug!("{}: interpolating record {}", variable.name, t + 1);
        let mut slice = transect.extract(source, data.index_axis(Axis(0), t), source_hfac, stagger)?;
        if config.extend_source && slice.extend_to(target_haxis[0]) {
            debug!("{}: extended source transect to {}", variable.name, target_haxis[0]);
        }

        let result = interp_bdry(
            slice.haxis.view(),
            source.z.slice(s![0..nz_s]),
            slice.data.view(),
            slice.hfac.view(),
            target_haxis.view(),
            target.z.slice(s![0..nz_t]),
            target_hfac.view(),
            variable.depth_dependent,
            boundary.is_zonal(),
        )?;

        let mut values = result.values;
        if !variable.keeps_land_values() {
            values
                .iter_mut()
                .zip(target_hfac.iter())
                .filter(|(_, h)| **h == 0.0)
                .for_each(|(x, _)| *x = 0.0);
        }
        out.index_axis_mut(Axis(0), t).assign(&values);
    }

    if variable.depth_dependent {
        Ok(out.into_dyn())
    } else {
        Ok(out.index_axis_move(Axis(1), 0).into_dyn())
    }
}

/// Whether the grid's longitudes wrap all the way around the globe.
fn is_periodic(grid: &Grid) -> bool {
    let lon = &grid.lon_corners_1d;
    let n = lon.len();
    if n < 2 {
        return false;
    }
    let last = lon[n - 1] - lon[n - 2];
    let span = lon[n - 1] + last - lon[0];
    (span - 360.0).abs() < 0.5 * last.abs()
}

/// Sea ice area `(t, ny, nx)` averaged onto u or v points.
pub fn area_on_stagger(area: ArrayView3<f64>, stagger: Stagger, periodic: bool) -> Array3<f64> {
    let (_, _, nx) = area.dim();
    Array3::from_shape_fn(area.dim(), |(t, j, i)| match stagger {
        Stagger::T => area[[t, j, i]],
        Stagger::U => {
            let im1 = match i {
                0 if periodic => nx - 1,
                0 => 0,
                _ => i - 1,
            };
            0.5 * (area[[t, j, im1]] + area[[t, j, i]])
        }
        Stagger::V => 0.5 * (area[[t, j.saturating_sub(1), i]] + area[[t, j, i]]),
    })
}

/// Reads every variable's monthly source fields from `input_dir`, writes one
/// boundary file per variable to `output_dir`, and returns the written paths.
pub fn make_obcs(
    source: &Grid,
    target: &Grid,
    boundary: Boundary,
    input_dir: &Path,
    output_dir: &Path,
    config: &ObcsConfig,
) -> Result<Vec<PathBuf>> {
    let (loc0, loc0_e) = find_obcs_boundary(target, boundary);
    info!(
        "{} boundary at {} (cell centre), {} (cell edge)",
        boundary, loc0, loc0_e
    );

    let mut area: Option<Array3<f64>> = None;
    let mut written = Vec::new();
    for variable in &config.variables {
        if variable.is_sea_ice() && !config.use_seaice {
            continue;
        }
        info!("Processing {}", variable.name);
        let in_file = input_dir.join(format!("{}{}", variable.name, config.input_suffix));
        let code = if variable.depth_dependent {
            DimCode::Xyzt
        } else {
            DimCode::Xyt
        };
        let mut data = Field::new(
            read_binary(&in_file, source.dims(), code, config.input_prec)?,
            code,
            variable.stagger,
            source,
        )?
        .into_data();

        if config.mask_ice_velocity && variable.name == "SIarea" {
            let a = data
                .view()
                .into_dimensionality::<Ix3>()
                .map_err(|e| Error::consistency(format!("{}: {}", in_file.display(), e)))?;
            area = Some(a.to_owned());
        }
        if config.mask_ice_velocity && variable.is_sea_ice_velocity() {
            let a = area.as_ref().ok_or_else(|| {
                Error::config(format!(
                    "SIarea must be processed before {} to mask it",
                    variable.name
                ))
            })?;
            let a = area_on_stagger(a.view(), variable.stagger, is_periodic(source));
            if a.shape() != data.shape() {
                return Err(Error::consistency(format!(
                    "{} has shape {:?} but SIarea has {:?}",
                    variable.name,
                    data.shape(),
                    a.shape()
                )));
            }
            info!("Masking {} with sea ice area", variable.name);
            data.iter_mut()
                .zip(a.iter())
                .filter(|(_, a)| **a == 0.0)
                .for_each(|(x, _)| *x = 0.0);
        }

        let out = interp_obcs_field(source, target, boundary, data.view(), variable, config)?;
        let out_file = output_dir.join(obcs_file_name(
            &variable.name,
            &config.source_name,
            boundary,
            config.year,
        ));
        info!("Writing {}", out_file.display());
        write_binary(&out, &out_file, config.prec)?;
        written.push(out_file);
    }
    Ok(written)
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::grid::GridArrays,
        approx::assert_abs_diff_eq,
        ndarray::{Array4, Ix2},
        tempdir::TempDir,
    };

    fn axis(n: usize, start: f64, step: f64) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    fn source() -> Grid {
        Grid::from_arrays(
            GridArrays::rectangular(
                &axis(6, 0.0, 1.0),
                &axis(6, -75.0, 1.0),
                &[0.0, -10.0, -30.0],
                Array3::ones((2, 6, 6)),
            )
            .unwrap(),
            180.0,
        )
        .unwrap()
    }

    fn model() -> Grid {
        let mut hfac = Array3::ones((2, 6, 6));
        hfac[[1, 0, 2]] = 0.0;
        Grid::from_arrays(
            GridArrays::rectangular(
                &axis(6, 1.25, 0.5),
                &axis(6, -73.5, 0.5),
                &[0.0, -10.0, -30.0],
                hfac,
            )
            .unwrap(),
            180.0,
        )
        .unwrap()
    }

    /// Linear in the source column index, constant in latitude.
    fn ramp(nt: usize) -> Array4<f64> {
        Array4::from_shape_fn((nt, 2, 6, 6), |(t, k, _, i)| {
            i as f64 + 10.0 * k as f64 + 100.0 * t as f64
        })
    }

    #[test]
    fn file_names() {
        assert_eq!(
            obcs_file_name("UVEL", "SOSE", Boundary::East, None),
            "UVEL_SOSE.OBCS_E"
        );
        assert_eq!(
            obcs_file_name("SALT", "MIT", Boundary::South, Some(1995)),
            "SALT_MIT.OBCS_S_1995"
        );
    }

    #[test]
    fn tracers_keep_land_values_velocities_do_not() {
        let (source, model) = (source(), model());
        let config = ObcsConfig::default();
        let data = ramp(2).into_dyn();

        let theta = ObcsVariable::new("THETA", true, Stagger::T);
        let out = interp_obcs_field(&source, &model, Boundary::South, data.view(), &theta, &config).unwrap();
        assert_eq!(out.shape(), &[2, 2, 6]);
        let (lon, _) = model.lon_lat_1d(Stagger::T);
        for t in 0..2 {
            for k in 0..2 {
                for i in 0..6 {
                    let expected = lon[i] + 10.0 * k as f64 + 100.0 * t as f64;
                    assert_abs_diff_eq!(out[[t, k, i]], expected, epsilon = 1.0e-10);
                }
            }
        }

        // u points sit half a source cell west of the data's index
        let uvel = ObcsVariable::new("UVEL", true, Stagger::U);
        let out = interp_obcs_field(&source, &model, Boundary::South, data.view(), &uvel, &config).unwrap();
        let (lon_u, _) = model.lon_lat_1d(Stagger::U);
        assert_abs_diff_eq!(out[[1, 0, 4]], lon_u[4] + 0.5 + 100.0, epsilon = 1.0e-10);
        assert_eq!(out[[0, 1, 2]], 0.0);
        assert_eq!(out[[0, 1, 3]], 0.0);
    }

    #[test]
    fn horizontal_fields() {
        let (source, model) = (source(), model());
        let data = Array3::from_shape_fn((3, 6, 6), |(t, j, _)| t as f64 + j as f64);
        let etan = ObcsVariable::new("ETAN", false, Stagger::T);
        let out = interp_obcs_field(
            &source,
            &model,
            Boundary::West,
            data.into_dyn().view(),
            &etan,
            &ObcsConfig::default(),
        )
        .unwrap()
        .into_dimensionality::<Ix2>()
        .unwrap();
        assert_eq!(out.dim(), (3, 6));
        // Model latitude -73.5 is source row 1.5
        assert_abs_diff_eq!(out[[2, 0]], 3.5, epsilon = 1.0e-10);
    }

    #[test]
    fn curvilinear_matches_regular_on_rectangular_grid() {
        let (source, model) = (source(), model());
        let data = ramp(1).into_dyn();
        let salt = ObcsVariable::new("SALT", true, Stagger::T);
        let regular = ObcsConfig::default();
        let curvilinear = ObcsConfig {
            curvilinear: true,
            ..ObcsConfig::default()
        };
        for boundary in &Boundary::ALL {
            let a = interp_obcs_field(&source, &model, *boundary, data.view(), &salt, &regular).unwrap();
            let b = interp_obcs_field(&source, &model, *boundary, data.view(), &salt, &curvilinear).unwrap();
            for (x, y) in a.iter().zip(b.iter()) {
                assert_abs_diff_eq!(*x, *y, epsilon = 1.0e-10);
            }
        }
    }

    #[test]
    fn extension_covers_western_edge() {
        let source = source();
        let model = Grid::from_arrays(
            GridArrays::rectangular(
                &axis(4, -0.5, 0.5),
                &axis(4, -73.0, 0.5),
                &[0.0, -10.0, -30.0],
                Array3::ones((2, 4, 4)),
            )
            .unwrap(),
            180.0,
        )
        .unwrap();
        let theta = ObcsVariable::new("THETA", true, Stagger::T);
        let data = ramp(1).into_dyn();

        let plain = interp_obcs_field(&source, &model, Boundary::North, data.view(), &theta, &ObcsConfig::default()).unwrap();
        assert_eq!(plain[[0, 0, 0]], 0.0);

        let config = ObcsConfig {
            extend_source: true,
            ..ObcsConfig::default()
        };
        let out = interp_obcs_field(&source, &model, Boundary::North, data.view(), &theta, &config).unwrap();
        assert_abs_diff_eq!(out[[0, 0, 0]], 0.0, epsilon = 1.0e-12);
        assert_abs_diff_eq!(out[[0, 1, 0]], 10.0, epsilon = 1.0e-12);
    }

    #[test]
    fn ice_area_on_velocity_points() {
        let area = ndarray::arr3(&[[[0.0, 0.0, 1.0], [0.0, 1.0, 1.0]]]);
        let u = area_on_stagger(area.view(), Stagger::U, false);
        assert_eq!(u.index_axis(Axis(0), 0).to_owned(), ndarray::arr2(&[[0.0, 0.0, 0.5], [0.0, 0.5, 1.0]]));
        let u = area_on_stagger(area.view(), Stagger::U, true);
        assert_eq!(u[[0, 0, 0]], 0.5);
        let v = area_on_stagger(area.view(), Stagger::V, false);
        assert_eq!(v[[0, 1, 0]], 0.0);
        assert_eq!(v[[0, 1, 1]], 0.5);
    }

    #[test]
    fn driver_writes_all_boundary_files() {
        let (source, model) = (source(), model());
        let dir = TempDir::new("obcs").unwrap();
        let write = |name: &str, data: ArrayD<f64>| {
            write_binary(&data, dir.path().join(format!("{}_climatology.data", name)), Precision::Double)
                .unwrap()
        };
        write("THETA", ramp(12).into_dyn());
        let mut area = Array3::from_elem((12, 6, 6), 1.0);
        area.slice_mut(s![.., .., 0..3]).fill(0.0);
        write("SIarea", area.into_dyn());
        write("SIuice", Array3::from_elem((12, 6, 6), 0.2).into_dyn());

        let config = ObcsConfig {
            variables: vec![
                ObcsVariable::new("THETA", true, Stagger::T),
                ObcsVariable::new("SIarea", false, Stagger::T),
                ObcsVariable::new("SIuice", false, Stagger::U),
            ],
            year: Some(2001),
            ..ObcsConfig::default()
        };
        let written = make_obcs(&source, &model, Boundary::South, dir.path(), dir.path(), &config).unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(written[2], dir.path().join("SIuice_SOSE.OBCS_S_2001"));

        // (12, 6) single precision, zero where the source had no ice
        let uice = crate::io::decode(&std::fs::read(&written[2]).unwrap(), Precision::Single);
        assert_eq!(uice.len(), 12 * 6);
        assert_eq!(uice[0], 0.0);
        assert_abs_diff_eq!(uice[11 * 6 + 5], 0.2, epsilon = 1.0e-6);

        // Skipping SIarea leaves nothing to mask the velocity with
        let config = ObcsConfig {
            variables: vec![ObcsVariable::new("SIuice", false, Stagger::U)],
            ..ObcsConfig::default()
        };
        assert!(matches!(
            make_obcs(&source, &model, Boundary::South, dir.path(), dir.path(), &config),
            Err(Error::Configuration(_))
        ));
    }
}
