use {
    crate::{
        eos::{EosParams, EosType},
        error::Result,
        grid::Grid,
        ics::IcConfig,
        interp::Boundary,
        io::{GridDims, Precision},
        load::{CavityFill, LoadAnomalyConfig, LoadAnomalyInput},
        obcs::ObcsConfig,
        transport::BalanceMode,
    },
    log::info,
    serde::{Deserialize, Serialize},
    std::{
        collections::BTreeMap,
        path::{Path, PathBuf},
    },
};

/// Preprocessing parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub environment: Environment,
    /// Grid the fields are interpolated onto
    pub model_grid: GridSource,
    /// Grid of the reanalysis or parent model supplying the fields
    pub source_grid: GridSource,
    pub ics: IcConfig,
    pub obcs: ObcsParameters,
    pub load_anomaly: LoadAnomalyParameters,
    pub balance: BalanceParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    /// Directory holding the source fields
    pub input_directory: PathBuf,
    /// Directory receiving the generated files
    pub output_directory: PathBuf,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            input_directory: PathBuf::from("input"),
            output_directory: PathBuf::from("output"),
        }
    }
}

/// A directory of MITgcm grid files and how to read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSource {
    pub directory: PathBuf,
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub prec: Precision,
    /// Longitude at which the grid's longitude range is split, 180 or 0
    pub split: f64,
    /// Serialized grid reused on later runs
    pub cache: Option<PathBuf>,
}

impl Default for GridSource {
    fn default() -> Self {
        GridSource {
            directory: PathBuf::from("grid"),
            nx: 0,
            ny: 0,
            nz: 0,
            prec: Precision::Double,
            split: 180.0,
            cache: None,
        }
    }
}

impl GridSource {
    pub fn dims(&self) -> GridDims {
        GridDims {
            nx: self.nx,
            ny: self.ny,
            nz: self.nz,
        }
    }

    /// Loads the cached grid if there is one, otherwise reads the grid files
    /// and writes the cache.
    pub fn load(&self) -> Result<Grid> {
        if let Some(cache) = &self.cache {
            if cache.exists() {
                info!("Loading cached grid from {}", cache.display());
                return Grid::load(cache);
            }
        }

        let grid = Grid::from_mitgcm_dir(&self.directory, self.dims(), self.prec, self.split)?;

        if let Some(cache) = &self.cache {
            info!("Caching grid in {}", cache.display());
            grid.save(cache)?;
        }
        Ok(grid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObcsParameters {
    /// Boundaries to generate conditions for
    pub boundaries: Vec<Boundary>,
    #[serde(flatten)]
    pub config: ObcsConfig,
}

impl Default for ObcsParameters {
    fn default() -> Self {
        ObcsParameters {
            boundaries: Boundary::ALL.to_vec(),
            config: ObcsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadAnomalyParameters {
    pub eos: EosType,
    pub eos_params: EosParams,
    pub cavity_fill: CavityFill,
    pub max_iterations: usize,
    /// Initial temperature on the model grid, relative to the output directory
    pub temp_file: Option<PathBuf>,
    /// Initial salinity on the model grid, relative to the output directory
    pub salt_file: Option<PathBuf>,
    pub prec: Precision,
    pub output_file: PathBuf,
}

impl Default for LoadAnomalyParameters {
    fn default() -> Self {
        LoadAnomalyParameters {
            eos: EosType::Mdjwf,
            eos_params: EosParams::default(),
            cavity_fill: CavityFill::default(),
            max_iterations: 100,
            temp_file: None,
            salt_file: None,
            prec: Precision::Double,
            output_file: PathBuf::from("pload"),
        }
    }
}

impl LoadAnomalyParameters {
    pub fn config(&self) -> LoadAnomalyConfig {
        LoadAnomalyConfig {
            eos: self.eos,
            params: self.eos_params,
            fill: self.cavity_fill,
            max_iterations: self.max_iterations,
            hfac: None,
        }
    }

    pub fn input(&self, dir: &Path) -> Result<LoadAnomalyInput> {
        let files = match (&self.temp_file, &self.salt_file) {
            (Some(temp), Some(salt)) => Some((dir.join(temp), dir.join(salt))),
            _ => None,
        };
        LoadAnomalyInput::from_options(None, files, self.prec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceParameters {
    pub mode: BalanceMode,
    /// Normal velocity file per boundary; with `years` set, a prefix to
    /// which each year is appended
    pub files: BTreeMap<Boundary, PathBuf>,
    pub years: Option<YearRange>,
    pub prec: Precision,
}

impl Default for BalanceParameters {
    fn default() -> Self {
        BalanceParameters {
            mode: BalanceMode::default(),
            files: BTreeMap::new(),
            years: None,
            prec: Precision::Single,
        }
    }
}
