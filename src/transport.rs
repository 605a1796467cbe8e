//! Corrections to open boundary normal velocities so the net volume flux into
//! the domain is zero, matches an observed sea surface drift, or stays under
//! a ceiling.

use {
    crate::{
        constants::{DAYS_PER_MONTH, SEC_PER_DAY, SEC_PER_YEAR, SV},
        error::{Error, Result},
        grid::Grid,
        interp::Boundary,
        io::{read_binary, write_binary, DimCode, Precision},
    },
    log::info,
    ndarray::{Array2, Array3, Axis, Ix3},
    serde::{Deserialize, Serialize},
    std::{collections::BTreeMap, path::PathBuf},
};

/// Normal velocity per boundary, shaped `(t, nz, n)`.
pub type BoundaryVelocities = BTreeMap<Boundary, Array3<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "option", rename_all = "lowercase")]
pub enum BalanceMode {
    /// Remove the time-mean net inflow.
    Balance,
    /// Remove the inflow implied by a sea surface rise of `d_eta` metres over
    /// `d_t_years` in a previous run.
    Correct { d_eta: f64, d_t_years: f64 },
    /// Scale monthly net transports so none exceeds the flux that would move
    /// the sea surface by `max_deta_dt` metres per month.
    Dampen {
        max_deta_dt: f64,
        #[serde(default)]
        recentre: bool,
    },
}

impl Default for BalanceMode {
    fn default() -> Self {
        BalanceMode::Balance
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceReport {
    /// Net inflow (m³/s) per time record before correction.
    pub before: Vec<f64>,
    /// Net inflow (m³/s) per time record after correction.
    pub after: Vec<f64>,
    /// Velocity added along the inward normal (m/s) per time record.
    pub correction: Vec<f64>,
}

impl BalanceReport {
    pub fn changed(&self) -> bool {
        self.correction.iter().any(|&c| c != 0.0)
    }
}

/// Wet area of each cell face on a boundary, `(nz, n)`.
pub fn face_area(grid: &Grid, boundary: Boundary) -> Array2<f64> {
    let (nz, ny, nx) = grid.hfac.dim();
    match boundary {
        Boundary::West | Boundary::East => {
            let i = if boundary == Boundary::West { 0 } else { nx - 1 };
            Array2::from_shape_fn((nz, ny), |(k, j)| {
                grid.dy_w[[j, i]] * grid.dz[k] * grid.hfac[[k, j, i]]
            })
        }
        Boundary::South | Boundary::North => {
            let j = if boundary == Boundary::South { 0 } else { ny - 1 };
            Array2::from_shape_fn((nz, nx), |(k, i)| {
                grid.dx_s[[j, i]] * grid.dz[k] * grid.hfac[[k, j, i]]
            })
        }
    }
}

fn dim_code(boundary: Boundary) -> DimCode {
    if boundary.is_zonal() {
        DimCode::Xzt
    } else {
        DimCode::Yzt
    }
}

/// Net inflow per time record across all boundaries.
fn net_transport(
    velocities: &BoundaryVelocities,
    areas: &BTreeMap<Boundary, Array2<f64>>,
    num_time: usize,
) -> Vec<f64> {
    (0..num_time)
        .map(|t| {
            velocities
                .iter()
                .map(|(b, vel)| {
                    b.sign()
                        * vel
                            .index_axis(Axis(0), t)
                            .iter()
                            .zip(areas[b].iter())
                            .map(|(v, a)| v * a)
                            .sum::<f64>()
                })
                .sum()
        })
        .collect()
}

fn log_transport(label: &str, transport: f64) {
    let direction = if transport < 0.0 {
        "out of the domain"
    } else {
        "into the domain"
    };
    info!("{}: net transport {} Sv {}", label, (transport * SV).abs(), direction);
}

fn mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len().max(1) as f64
}

/// Dampening of monthly transports to at most `max_transport`, as a velocity
/// correction per month.
fn dampen(transport: &[f64], max_transport: f64, total_area: f64) -> Vec<f64> {
    let worst = transport.iter().fold(0.0, |m: f64, t| m.max(t.abs()));
    if worst <= max_transport {
        info!("Transports are within {} Sv, nothing to dampen", max_transport * SV);
        return vec![0.0; transport.len()];
    }
    let scale = max_transport / worst;
    info!("Scaling transports by {}", scale);
    transport
        .iter()
        .map(|t| (scale - 1.0) * t / total_area)
        .collect()
}

/// Computes and applies the correction in place.
pub fn balance_obcs(
    grid: &Grid,
    mode: BalanceMode,
    velocities: &mut BoundaryVelocities,
) -> Result<BalanceReport> {
    if velocities.is_empty() {
        return Err(Error::config("balance_obcs needs at least one boundary"));
    }

    let mut num_time = None;
    let mut areas = BTreeMap::new();
    for (b, vel) in velocities.iter() {
        let area = face_area(grid, *b);
        let (nt, nz, n) = vel.dim();
        if (nz, n) != area.dim() {
            return Err(Error::config(format!(
                "{} boundary velocity has shape {:?}, expected (t, {}, {})",
                b,
                vel.dim(),
                area.nrows(),
                area.ncols()
            )));
        }
        match num_time {
            None => num_time = Some(nt),
            Some(n0) if n0 != nt => {
                return Err(Error::consistency(format!(
                    "{} boundary has {} time records, other boundaries have {}",
                    b, nt, n0
                )))
            }
            _ => {}
        }
        areas.insert(*b, area);
    }
    let num_time = num_time.unwrap_or(0);
    let total_area = areas.values().map(|a| a.sum()).sum::<f64>();
    if total_area <= 0.0 {
        return Err(Error::consistency("open boundaries have no wet area"));
    }

    let before = net_transport(velocities, &areas, num_time);
    let surface_area = grid
        .d_a
        .iter()
        .zip(grid.land_mask.iter())
        .filter(|(_, land)| !**land)
        .map(|(a, _)| a)
        .sum::<f64>();

    let correction = match mode {
        BalanceMode::Balance => {
            let net = mean(&before);
            log_transport("Time mean", net);
            vec![-net / total_area; num_time]
        }
        BalanceMode::Correct { d_eta, d_t_years } => {
            if d_t_years == 0.0 {
                return Err(Error::config("correct needs a non-zero d_t"));
            }
            let net = d_eta * surface_area / (d_t_years * SEC_PER_YEAR);
            log_transport("Implied by sea surface change", net);
            vec![-net / total_area; num_time]
        }
        BalanceMode::Dampen {
            max_deta_dt,
            recentre,
        } => {
            for (t, x) in before.iter().enumerate() {
                log_transport(&format!("Month {}", t + 1), *x);
            }
            let max_transport = max_deta_dt * surface_area / (SEC_PER_DAY * DAYS_PER_MONTH);
            info!("Maximum allowable transport is {} Sv", max_transport * SV);
            if recentre {
                let m = mean(&before);
                let anomaly = before.iter().map(|x| x - m).collect::<Vec<f64>>();
                dampen(&anomaly, max_transport, total_area)
                    .into_iter()
                    .map(|c| c - m / total_area)
                    .collect()
            } else {
                dampen(&before, max_transport, total_area)
            }
        }
    };

    for (b, vel) in velocities.iter_mut() {
        for (t, c) in correction.iter().enumerate() {
            vel.index_axis_mut(Axis(0), t)
                .mapv_inplace(|v| v + b.sign() * c);
        }
    }

    let after = net_transport(velocities, &areas, num_time);
    info!(
        "Mean net transport {} Sv before, {} Sv after",
        mean(&before) * SV,
        mean(&after) * SV
    );

    Ok(BalanceReport {
        before,
        after,
        correction,
    })
}

/// Reads every boundary file, corrects them together, and overwrites them
/// only once all corrections have been computed.
pub fn balance_obcs_files(
    grid: &Grid,
    mode: BalanceMode,
    files: &BTreeMap<Boundary, PathBuf>,
    prec: Precision,
) -> Result<BalanceReport> {
    let mut velocities = BoundaryVelocities::new();
    for (b, path) in files {
        info!("Reading {} boundary from {}", b, path.display());
        let vel = read_binary(path, grid.dims(), dim_code(*b), prec)?
            .into_dimensionality::<Ix3>()
            .map_err(|e| Error::consistency(format!("{}: {}", path.display(), e)))?;
        velocities.insert(*b, vel);
    }

    let report = balance_obcs(grid, mode, &mut velocities)?;

    if report.changed() {
        for (b, vel) in &velocities {
            let path = &files[b];
            info!("Correcting {}", path.display());
            write_binary(vel, path, prec)?;
        }
    }
    Ok(report)
}

/// Balances one set of files per year, named `{head}{year}`.
pub fn balance_obcs_years(
    grid: &Grid,
    mode: BalanceMode,
    heads: &BTreeMap<Boundary, String>,
    start_year: i32,
    end_year: i32,
    prec: Precision,
) -> Result<Vec<BalanceReport>> {
    if end_year < start_year {
        return Err(Error::config(format!(
            "end year {} is before start year {}",
            end_year, start_year
        )));
    }
    (start_year..=end_year)
        .map(|year| {
            info!("Processing year {}", year);
            let files = heads
                .iter()
                .map(|(b, head)| (*b, PathBuf::from(format!("{}{}", head, year))))
                .collect::<BTreeMap<Boundary, PathBuf>>();
            balance_obcs_files(grid, mode, &files, prec)
        })
        .collect()
}

/// Net inflow through one boundary per time record, for diagnostics.
pub fn boundary_transport(grid: &Grid, boundary: Boundary, vel: &Array3<f64>) -> Result<Vec<f64>> {
    let area = face_area(grid, boundary);
    if (vel.len_of(Axis(1)), vel.len_of(Axis(2))) != area.dim() {
        return Err(Error::config(format!(
            "{} boundary velocity has shape {:?}",
            boundary,
            vel.dim()
        )));
    }
    let mut velocities = BoundaryVelocities::new();
    velocities.insert(boundary, vel.clone());
    let mut areas = BTreeMap::new();
    areas.insert(boundary, area);
    Ok(net_transport(&velocities, &areas, vel.len_of(Axis(0))))
}
