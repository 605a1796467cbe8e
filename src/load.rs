//! Pressure load anomaly at the base of the ice shelves, as MITgcm expects in
//! `SHELFICEloadAnomalyFile`.

use {
    crate::{
        constants::{CAVITY_SALT, CAVITY_TEMP, GRAVITY, PA_TO_DBAR},
        eos::{density_3d, EosParams, EosType},
        error::{Error, Result},
        grid::Grid,
        io::{read_binary, write_binary, DimCode, GridDims, Precision},
        utils::{rms, select_top, top_index, xy_to_xyz, z_to_xyz},
    },
    log::{debug, info},
    ndarray::{Array2, Array3, Ix3},
    serde::{Deserialize, Serialize},
    std::path::{Path, PathBuf},
};

/// Convergence tolerance on the rms pressure change (dbar).
pub const ERROR_TOL: f64 = 1.0e-13;

/// How to fill temperature and salinity inside the ice shelves, where the
/// initial conditions have no data but the pressure integral passes through.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum CavityFill {
    Constant { temp: f64, salt: f64 },
    /// Copy the first wet value below.
    Nearest,
    /// Fields already hold values everywhere.
    Precomputed,
}

impl Default for CavityFill {
    fn default() -> Self {
        CavityFill::Constant {
            temp: CAVITY_TEMP,
            salt: CAVITY_SALT,
        }
    }
}

#[derive(Debug, Clone)]
pub enum LoadAnomalyInput {
    Arrays {
        temp: Array3<f64>,
        salt: Array3<f64>,
    },
    Files {
        temp: PathBuf,
        salt: PathBuf,
        prec: Precision,
    },
}

impl LoadAnomalyInput {
    /// Chooses arrays if both are given, else files if both are given.
    pub fn from_options(
        arrays: Option<(Array3<f64>, Array3<f64>)>,
        files: Option<(PathBuf, PathBuf)>,
        prec: Precision,
    ) -> Result<Self> {
        match (arrays, files) {
            (Some((temp, salt)), _) => Ok(LoadAnomalyInput::Arrays { temp, salt }),
            (None, Some((temp, salt))) => Ok(LoadAnomalyInput::Files { temp, salt, prec }),
            (None, None) => Err(Error::config(
                "load anomaly needs either temperature and salinity arrays or files",
            )),
        }
    }

    fn load(self, grid: &Grid) -> Result<(Array3<f64>, Array3<f64>)> {
        match self {
            LoadAnomalyInput::Arrays { temp, salt } => {
                let shape = (grid.nz, grid.ny, grid.nx);
                if temp.dim() != shape || salt.dim() != shape {
                    return Err(Error::config(format!(
                        "temperature {:?} and salinity {:?} must match the grid {:?}",
                        temp.dim(),
                        salt.dim(),
                        shape
                    )));
                }
                Ok((temp, salt))
            }
            LoadAnomalyInput::Files { temp, salt, prec } => {
                let dims = grid.dims();
                let read = |path: &Path| -> Result<Array3<f64>> {
                    read_binary(path, dims, DimCode::Xyz, prec)?
                        .into_dimensionality::<Ix3>()
                        .map_err(|e| Error::consistency(format!("{}: {}", path.display(), e)))
                };
                Ok((read(&temp)?, read(&salt)?))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadAnomalyConfig {
    pub eos: EosType,
    pub params: EosParams,
    pub fill: CavityFill,
    pub max_iterations: usize,
    /// Overrides the grid's hFac, e.g. for a modified ice shelf draft.
    pub hfac: Option<Array3<f64>>,
}

impl Default for LoadAnomalyConfig {
    fn default() -> Self {
        Self {
            eos: EosType::Mdjwf,
            params: EosParams::default(),
            fill: CavityFill::default(),
            max_iterations: 100,
            hfac: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadAnomaly {
    /// Pressure load anomaly at the ice base (Pa), zero in open ocean and land.
    pub pload: Array2<f64>,
    /// Total hydrostatic pressure at the ice base (Pa).
    pub ice_base_pressure: Array2<f64>,
    pub iterations: usize,
}

fn fill_cavity(
    temp: &mut Array3<f64>,
    salt: &mut Array3<f64>,
    closed: &Array3<bool>,
    fill: CavityFill,
) -> Result<()> {
    match fill {
        CavityFill::Constant { temp: t0, salt: s0 } => {
            for ((t, s), c) in temp.iter_mut().zip(salt.iter_mut()).zip(closed.iter()) {
                if *c {
                    *t = t0;
                    *s = s0;
                }
            }
        }
        CavityFill::Nearest => {
            let nz = temp.len_of(ndarray::Axis(0));
            let temp_top = xy_to_xyz(select_top(temp.view(), closed.view()).view(), nz);
            let salt_top = xy_to_xyz(select_top(salt.view(), closed.view()).view(), nz);
            for (idx, c) in closed.indexed_iter() {
                if *c {
                    temp[idx] = temp_top[idx];
                    salt[idx] = salt_top[idx];
                }
            }
        }
        CavityFill::Precomputed => {
            for (name, data) in &[("temperature", &*temp), ("salinity", &*salt)] {
                let missing = data
                    .iter()
                    .zip(closed.iter())
                    .filter(|(x, c)| !**c && **x == 0.0)
                    .count();
                if missing > 0 {
                    return Err(Error::consistency(format!(
                        "precomputed {} has {} missing values inside the wet domain",
                        name, missing
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Iterates density and pressure to a fixed point, then interpolates the
/// integrated density anomaly to the ice shelf base.
///
/// Load samples are taken at the bottom edge of each cell, so the ice base
/// value lies between the bottom edges of the top wet cell and the one above.
pub fn calc_load_anomaly(
    grid: &Grid,
    input: LoadAnomalyInput,
    config: &LoadAnomalyConfig,
) -> Result<LoadAnomaly> {
    let hfac = match &config.hfac {
        Some(h) if h.dim() != grid.hfac.dim() => {
            return Err(Error::config(format!(
                "hfac override has shape {:?}, grid is {:?}",
                h.dim(),
                grid.hfac.dim()
            )))
        }
        Some(h) => h.clone(),
        None => grid.hfac.clone(),
    };
    let (nz, ny, nx) = hfac.dim();
    let closed = hfac.mapv(|h| h == 0.0);

    let (mut temp, mut salt) = input.load(grid)?;
    fill_cavity(&mut temp, &mut salt, &closed, config.fill)?;

    let rho_const = config.params.rho_const;
    let dz_top = grid
        .z
        .iter()
        .zip(grid.z_edges.iter())
        .map(|(z, e)| (z - e).abs())
        .collect::<Vec<f64>>();
    let dz_bottom = grid
        .z
        .iter()
        .zip(grid.z_edges.iter().skip(1))
        .map(|(z, e)| (e - z).abs())
        .collect::<Vec<f64>>();

    let depth = z_to_xyz(grid.z.view(), ny, nx).mapv(f64::abs);
    let reference = depth.mapv(|d| d * GRAVITY * rho_const);

    let mut press = reference.mapv(|p| p * PA_TO_DBAR);
    let mut press_old = Array3::<f64>::zeros(press.dim());
    let mut load_centre = Array3::<f64>::zeros(press.dim());
    let mut load_bottom = Array3::<f64>::zeros(press.dim());
    let mut rms_error = 0.0;
    let mut iterations = 0;

    loop {
        let rms_old = rms_error;
        rms_error = rms(press.view(), press_old.view());
        debug!("calc_load_anomaly: iteration {}, rms error {:e}", iterations, rms_error);
        if rms_error < ERROR_TOL || (rms_error - rms_old).abs() < 0.1 * ERROR_TOL {
            break;
        }
        if iterations == config.max_iterations {
            return Err(Error::Convergence {
                iterations,
                rms_error,
            });
        }

        press_old = press.clone();
        let drho = density_3d(config.eos, salt.view(), temp.view(), press.view(), &config.params)?
            - rho_const;

        // Integrate down each column over half cells
        for j in 0..ny {
            for i in 0..nx {
                let mut load = 0.0;
                for k in 0..nz {
                    load += drho[[k, j, i]] * GRAVITY * dz_top[k];
                    load_centre[[k, j, i]] = load;
                    load += drho[[k, j, i]] * GRAVITY * dz_bottom[k];
                    load_bottom[[k, j, i]] = load;
                }
            }
        }

        press = (&reference + &load_centre) * PA_TO_DBAR;
        iterations += 1;
    }
    info!(
        "calc_load_anomaly: converged after {} iterations with {}",
        iterations, config.eos
    );

    let top = top_index(closed.view());
    let mut pload = Array2::<f64>::zeros((ny, nx));
    let mut ice_base_pressure = Array2::<f64>::zeros((ny, nx));
    for j in 0..ny {
        for i in 0..nx {
            if let Some(k0) = top[[j, i]] {
                let above = if k0 == 0 {
                    0.0
                } else {
                    load_bottom[[k0 - 1, j, i]]
                };
                let below = load_bottom[[k0, j, i]];
                let dry = 1.0 - hfac[[k0, j, i]];
                pload[[j, i]] = above + dry * (below - above);

                let base = grid.z_edges[k0].abs() + dry * grid.dz[k0];
                ice_base_pressure[[j, i]] = rho_const * GRAVITY * base + pload[[j, i]];
            }
        }
    }

    Ok(LoadAnomaly {
        pload,
        ice_base_pressure,
        iterations,
    })
}

/// Writes the 2D load anomaly in MITgcm's binary format.
pub fn write_load_anomaly<P: AsRef<Path>>(
    anomaly: &LoadAnomaly,
    path: P,
    prec: Precision,
) -> Result<()> {
    info!("Writing {}", path.as_ref().display());
    write_binary(&anomaly.pload, path, prec)
}
