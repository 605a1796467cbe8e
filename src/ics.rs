//! Initial conditions: regrid a source climatology onto the model grid after
//! filling its land mask, so coastal and cavity points never sample land.

use {
    crate::{
        constants::{CAVITY_SALT, CAVITY_TEMP, MONTHS_PER_YEAR},
        error::{Error, Result},
        field::{Field, Masked},
        fill::{discard_and_fill, extend_into_mask, Neighbourhood},
        grid::{Grid, Stagger},
        interp::regrid::{interp_reg, RegridDim, Regridder},
        io::{read_binary, write_binary, DimCode, Precision},
        utils::xy_to_xyz,
    },
    log::{info, warn},
    ndarray::{Array, Array3, ArrayD, ArrayViewD, Axis, Ix2, Ix3, ShapeError},
    serde::{Deserialize, Serialize},
    std::path::{Path, PathBuf},
};

/// Marks target points the fill mask failed to reach.
pub const MISSING: f64 = -9999.0;

/// Number of times the fill region is grown past the model's open cells.
const FILL_MARGIN: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcVariable {
    pub name: String,
    pub depth_dependent: bool,
    /// Value forced inside ice shelf cavities before regridding (3D only).
    #[serde(default)]
    pub cavity_value: Option<f64>,
}

impl IcVariable {
    fn new(name: &str, depth_dependent: bool, cavity_value: Option<f64>) -> Self {
        Self {
            name: name.to_owned(),
            depth_dependent,
            cavity_value,
        }
    }
}

/// Ocean and sea ice variables from a reanalysis without cavities.
pub fn reanalysis_variables(constant_t: f64, constant_s: f64) -> Vec<IcVariable> {
    vec![
        IcVariable::new("THETA", true, Some(constant_t)),
        IcVariable::new("SALT", true, Some(constant_s)),
        IcVariable::new("SIarea", false, None),
        IcVariable::new("SIheff", false, None),
    ]
}

/// Variables from a larger MITgcm domain that already resolves the cavities.
pub fn nested_variables() -> Vec<IcVariable> {
    ["THETA", "SALT", "SIarea", "SIheff", "SIhsnow"]
        .iter()
        .enumerate()
        .map(|(n, name)| IcVariable::new(name, n < 2, None))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcConfig {
    /// Tag used in output file names.
    pub source_name: String,
    pub variables: Vec<IcVariable>,
    /// Treat model cavities as unknown in the source and fill them with constants.
    pub exclude_cavity: bool,
    /// Appended to each variable name to find its input file.
    pub input_suffix: String,
    pub input_prec: Precision,
    /// Record of the climatology to use (0 is January).
    pub time_index: usize,
    pub prec: Precision,
}

impl Default for IcConfig {
    fn default() -> Self {
        Self {
            source_name: "SOSE".to_owned(),
            variables: reanalysis_variables(CAVITY_TEMP, CAVITY_SALT),
            exclude_cavity: true,
            input_suffix: "_climatology.data".to_owned(),
            input_prec: Precision::Double,
            time_index: 0,
            prec: Precision::Double,
        }
    }
}

pub fn ic_file_name(variable: &str, source: &str) -> String {
    format!("{}_{}.ini", variable, source)
}

/// Which source cells must hold data before regridding.
#[derive(Debug, Clone)]
pub struct FillMask {
    /// Source cells the model needs, grown by a few cells.
    pub fill: Array3<bool>,
    /// Source cells inside model ice shelf cavities.
    pub cavity: Array3<bool>,
    /// Source land.
    pub discard: Array3<bool>,
}

/// Regrids the model's open cells (and optionally cavities) onto the source
/// grid, excludes the cavities and extends the result by a few cells.
pub fn build_fill_mask(source: &Grid, target: &Grid, exclude_cavity: bool) -> Result<FillMask> {
    info!("Building mask for source points to fill");
    let to_source = Regridder::new(target, source, Stagger::T)?;
    let all = Array3::from_elem(target.hfac.dim(), true);

    // Outside the model domain nothing is needed unless cavities are excluded,
    // in which case the source is assumed to cover the model.
    let outside = if exclude_cavity { 1.0 } else { 0.0 };
    let open = to_source
        .apply_3d(target.hfac.mapv(f64::ceil).view(), all.view(), outside)?
        .mapv(|x| x.ceil() > 0.0);

    let cavity = if exclude_cavity {
        let ice = xy_to_xyz(target.ice_mask.view(), target.nz).mapv(|m| if m { 1.0 } else { 0.0 });
        to_source
            .apply_3d(ice.view(), all.view(), 0.0)?
            .mapv(|x| x.ceil() > 0.0)
    } else {
        Array3::from_elem(open.dim(), false)
    };

    let needed = Array3::from_shape_fn(open.dim(), |idx| open[idx] && !cavity[idx]);
    let grown = extend_into_mask(
        Masked::new(needed.mapv(|n| if n { 1.0 } else { 0.0 }), needed)?,
        FILL_MARGIN,
        Neighbourhood::All,
    )?;

    Ok(FillMask {
        fill: grown.valid,
        cavity,
        discard: source.hfac.mapv(|h| h == 0.0),
    })
}

/// Fills and regrids one variable. `data` is `(nz, ny, nx)` or `(ny, nx)` on
/// the source grid; the result is on the target grid with land set to zero.
pub fn interp_ic_field(
    source: &Grid,
    target: &Grid,
    data: ArrayViewD<f64>,
    variable: &IcVariable,
    mask: &FillMask,
) -> Result<ArrayD<f64>> {
    let rank_error = |e: ShapeError| Error::config(format!("{}: {}", variable.name, e));

    let (filled, dim) = if variable.depth_dependent {
        let data = data.into_dimensionality::<Ix3>().map_err(rank_error)?.to_owned();
        let mut filled = discard_and_fill(data, &mask.discard, &mask.fill, Neighbourhood::All)?.field;
        if let Some(value) = variable.cavity_value {
            for ((v, ok), c) in filled
                .values
                .iter_mut()
                .zip(filled.valid.iter_mut())
                .zip(mask.cavity.iter())
            {
                if *c {
                    *v = value;
                    *ok = true;
                }
            }
        }
        (filled.into_dyn(), RegridDim::Three)
    } else {
        let data = data.into_dimensionality::<Ix2>().map_err(rank_error)?.to_owned();
        let surface = |a: &Array3<bool>| a.index_axis(Axis(0), 0).to_owned();
        let filled = discard_and_fill(
            data,
            &surface(&mask.discard),
            &surface(&mask.fill),
            Neighbourhood::Horizontal,
        )?
        .field;
        (filled.into_dyn(), RegridDim::Two)
    };

    let out = interp_reg(source, target, &filled, MISSING, dim)?;
    let missing = out.iter().filter(|&&x| x == MISSING).count();
    if missing > 0 {
        warn!(
            "{}: {} wet model points have no source data",
            variable.name, missing
        );
    }
    Ok(out)
}

/// Reads each variable's climatology from `input_dir`, regrids it and writes
/// `{variable}_{source}.ini` files to `output_dir`. Returns the written paths.
pub fn make_ics(
    source: &Grid,
    target: &Grid,
    input_dir: &Path,
    output_dir: &Path,
    config: &IcConfig,
) -> Result<Vec<PathBuf>> {
    let mask = build_fill_mask(source, target, config.exclude_cavity)?;

    config
        .variables
        .iter()
        .map(|variable| {
            info!("Processing {}", variable.name);
            let in_file = input_dir.join(format!("{}{}", variable.name, config.input_suffix));
            let code = if variable.depth_dependent {
                DimCode::Xyzt
            } else {
                DimCode::Xyt
            };
            let field = Field::new(
                read_binary(&in_file, source.dims(), code, config.input_prec)?,
                code,
                Stagger::T,
                source,
            )?;
            let num_time = field.num_time().unwrap_or(1);
            if config.time_index >= num_time {
                return Err(Error::consistency(format!(
                    "{} has {} records, record {} requested",
                    in_file.display(),
                    num_time,
                    config.time_index
                )));
            }

            let out = interp_ic_field(
                source,
                target,
                field.record(config.time_index),
                variable,
                &mask,
            )?;

            let out_file = output_dir.join(ic_file_name(&variable.name, &config.source_name));
            info!("Writing {}", out_file.display());
            write_binary(&out, &out_file, config.prec)?;
            Ok(out_file)
        })
        .collect()
}

/// Mean of every twelfth record, for monthly output spanning whole years.
pub fn monthly_climatology(data: ArrayViewD<f64>) -> Result<ArrayD<f64>> {
    let num_time = data.len_of(Axis(0));
    if num_time < MONTHS_PER_YEAR {
        return Err(Error::consistency(format!(
            "need at least {} monthly records for a climatology, got {}",
            MONTHS_PER_YEAR, num_time
        )));
    }
    if num_time % MONTHS_PER_YEAR != 0 {
        warn!(
            "{} records is not a whole number of years, later months average fewer years",
            num_time
        );
    }

    let mut shape = data.shape().to_vec();
    shape[0] = MONTHS_PER_YEAR;
    let mut out = Array::zeros(shape);
    for month in 0..MONTHS_PER_YEAR {
        let records = (month..num_time).step_by(MONTHS_PER_YEAR).collect::<Vec<usize>>();
        let mut sum = out.index_axis_mut(Axis(0), month);
        for t in &records {
            sum += &data.index_axis(Axis(0), *t);
        }
        sum /= records.len() as f64;
    }
    Ok(out)
}

/// Reads monthly output, averages it into a climatology and writes it back out.
pub fn make_climatology_file(
    in_file: &Path,
    out_file: &Path,
    grid: &Grid,
    code: DimCode,
    prec: Precision,
) -> Result<()> {
    if !code.has_time() {
        return Err(Error::config(format!(
            "climatology needs a time axis, {} has none",
            code
        )));
    }
    let data = read_binary(in_file, grid.dims(), code, prec)?;
    let climatology = monthly_climatology(data.view())?;
    info!("Writing {}", out_file.display());
    write_binary(&climatology, out_file, prec)
}
