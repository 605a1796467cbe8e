//! Grid construction from a directory of MITgcm binary grid files.

use {
    crate::{
        error::{Error, Result},
        grid::{Grid, GridArrays},
        io::{decode, GridDims, Precision},
    },
    log::info,
    ndarray::{Array1, Array2, Array3},
    std::{fs, path::Path},
};

fn read_values(dir: &Path, name: &str, len: usize, prec: Precision) -> Result<Vec<f64>> {
    let path = dir.join(format!("{}.data", name));
    let values = decode(&fs::read(&path)?, prec);
    if values.len() != len {
        return Err(Error::consistency(format!(
            "{} holds {} values, expected {}",
            path.display(),
            values.len(),
            len
        )));
    }
    Ok(values)
}

fn read_xy(dir: &Path, name: &str, dims: GridDims, prec: Precision) -> Result<Array2<f64>> {
    let values = read_values(dir, name, dims.nx * dims.ny, prec)?;
    Array2::from_shape_vec((dims.ny, dims.nx), values)
        .map_err(|e| Error::consistency(format!("{}: {}", name, e)))
}

fn read_xyz(dir: &Path, name: &str, dims: GridDims, prec: Precision) -> Result<Array3<f64>> {
    let values = read_values(dir, name, dims.nx * dims.ny * dims.nz, prec)?;
    Array3::from_shape_vec((dims.nz, dims.ny, dims.nx), values)
        .map_err(|e| Error::consistency(format!("{}: {}", name, e)))
}

impl Grid {
    /// Reads `XC, YC, XG, YG, RC, RF, hFacC, hFacW, hFacS, DXG, DYG, RAC`
    /// (each with a `.data` suffix) from `dir`.
    pub fn from_mitgcm_dir<P: AsRef<Path>>(
        dir: P,
        dims: GridDims,
        prec: Precision,
        split: f64,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        info!("Reading MITgcm grid from {}", dir.display());

        let arrays = GridArrays {
            lon_2d: read_xy(dir, "XC", dims, prec)?,
            lat_2d: read_xy(dir, "YC", dims, prec)?,
            lon_corners_2d: read_xy(dir, "XG", dims, prec)?,
            lat_corners_2d: read_xy(dir, "YG", dims, prec)?,
            z: Array1::from(read_values(dir, "RC", dims.nz, prec)?),
            z_edges: Array1::from(read_values(dir, "RF", dims.nz + 1, prec)?),
            hfac: read_xyz(dir, "hFacC", dims, prec)?,
            hfac_w: Some(read_xyz(dir, "hFacW", dims, prec)?),
            hfac_s: Some(read_xyz(dir, "hFacS", dims, prec)?),
            dx_s: Some(read_xy(dir, "DXG", dims, prec)?),
            dy_w: Some(read_xy(dir, "DYG", dims, prec)?),
            d_a: Some(read_xy(dir, "RAC", dims, prec)?),
        };

        Grid::from_arrays(arrays, split)
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{grid::Stagger, io::write_binary},
        ndarray::{arr1, Array},
        tempdir::TempDir,
    };

    #[test]
    fn reads_grid_directory() {
        let dir = TempDir::new("mitgcm-prep").unwrap();
        let dims = GridDims { nx: 3, ny: 2, nz: 2 };
        let prec = Precision::Single;

        let xy = |f: fn(usize, usize) -> f64| Array2::from_shape_fn((2, 3), |(j, i)| f(j, i));
        let write = |name: &str, data: ndarray::ArrayD<f64>| {
            write_binary(&data, dir.path().join(format!("{}.data", name)), prec).unwrap()
        };

        write("XC", xy(|_, i| 350.0 + 5.0 * i as f64).into_dyn());
        write("YC", xy(|j, _| -70.0 + j as f64).into_dyn());
        write("XG", xy(|_, i| 347.5 + 5.0 * i as f64).into_dyn());
        write("YG", xy(|j, _| -70.5 + j as f64).into_dyn());
        write("RC", arr1(&[-5.0, -15.0]).into_dyn());
        write("RF", arr1(&[0.0, -10.0, -20.0]).into_dyn());
        for name in &["hFacC", "hFacW", "hFacS"] {
            write(*name, Array::ones((2, 2, 3)).into_dyn());
        }
        for name in &["DXG", "DYG", "RAC"] {
            write(*name, xy(|_, _| 1000.0).into_dyn());
        }

        let grid = Grid::from_mitgcm_dir(dir.path(), dims, prec, 180.0).unwrap();
        // 350E and beyond are wrapped into (-180, 180]
        assert_eq!(
            grid.lon_lat_1d(Stagger::T).0.to_vec(),
            vec![-10.0, -5.0, 0.0]
        );
        assert_eq!(grid.d_a()[[1, 1]], 1000.0);
        assert_eq!(grid.dz().to_vec(), vec![10.0, 10.0]);

        let short = Grid::from_mitgcm_dir(
            dir.path(),
            GridDims { nx: 4, ny: 2, nz: 2 },
            prec,
            180.0,
        );
        assert!(matches!(short, Err(Error::DataConsistency(_))));
    }
}
