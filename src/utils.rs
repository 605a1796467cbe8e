use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayView3};

/// Root mean square difference between two equally sized fields.
pub fn rms(a: ArrayView3<f64>, b: ArrayView3<f64>) -> f64 {
    let n = a.len().max(1) as f64;
    (a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        / n)
        .sqrt()
}

/// Tiles a horizontal field over `nz` levels.
pub fn xy_to_xyz<T: Clone>(data: ArrayView2<T>, nz: usize) -> Array3<T> {
    let (ny, nx) = data.dim();
    Array3::from_shape_fn((nz, ny, nx), |(_, j, i)| data[[j, i]].clone())
}

/// Tiles a vertical profile over the horizontal grid.
pub fn z_to_xyz(data: ArrayView1<f64>, ny: usize, nx: usize) -> Array3<f64> {
    Array3::from_shape_fn((data.len(), ny, nx), |(k, _, _)| data[k])
}

/// Index of the first unmasked level in each column, if any.
pub fn top_index(mask: ArrayView3<bool>) -> Array2<Option<usize>> {
    let (_, ny, nx) = mask.dim();
    Array2::from_shape_fn((ny, nx), |(j, i)| {
        mask.slice(ndarray::s![.., j, i])
            .iter()
            .position(|masked| !masked)
    })
}

/// Value of the first unmasked level in each column; fully masked columns get zero.
pub fn select_top(data: ArrayView3<f64>, mask: ArrayView3<bool>) -> Array2<f64> {
    let top = top_index(mask);
    Array2::from_shape_fn(top.dim(), |(j, i)| match top[[j, i]] {
        Some(k) => data[[k, j, i]],
        None => 0.0,
    })
}

/// Wraps a longitude into the convention selected by `split`:
/// 180 gives (-180, 180], 0 gives [0, 360). Non-finite values pass through.
pub fn fix_lon_range(lon: f64, split: f64) -> f64 {
    if !lon.is_finite() {
        return lon;
    }
    if split == 0.0 {
        let lon = lon.rem_euclid(360.0);
        if lon >= 360.0 {
            0.0
        } else {
            lon
        }
    } else {
        // (-180, 180] is [-180, 180) mirrored
        let lon = -((-lon + 180.0).rem_euclid(360.0) - 180.0);
        if lon <= -180.0 {
            180.0
        } else {
            lon
        }
    }
}
