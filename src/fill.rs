//! Extrapolation of valid data into masked cells, so that later interpolation
//! never samples land.

use {
    crate::{
        error::{Error, Result},
        field::Masked,
    },
    log::{debug, warn},
    ndarray::{Array, Dimension},
};

/// Which axes count as neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbourhood {
    /// Every axis: 2 neighbours in 1D, 4 in 2D, 6 in 3D.
    All,
    /// Only the last two (horizontal) axes.
    Horizontal,
}

/// Output of [`discard_and_fill`].
#[derive(Debug, Clone)]
pub struct Filled<D: Dimension> {
    pub field: Masked<D>,
    /// Cells in the fill region that no neighbour could reach.
    pub unfilled: usize,
}

/// Row-major strides and the axes to search for neighbours.
struct Stencil {
    shape: Vec<usize>,
    strides: Vec<usize>,
    axes: Vec<usize>,
}

impl Stencil {
    fn new(shape: &[usize], neighbourhood: Neighbourhood) -> Self {
        let mut strides = vec![1; shape.len()];
        for a in (0..shape.len().saturating_sub(1)).rev() {
            strides[a] = strides[a + 1] * shape[a + 1];
        }
        let axes = match neighbourhood {
            Neighbourhood::All => (0..shape.len()).collect(),
            Neighbourhood::Horizontal => (shape.len().saturating_sub(2)..shape.len()).collect(),
        };
        Stencil {
            shape: shape.to_vec(),
            strides,
            axes,
        }
    }

    fn neighbours(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.axes.iter().flat_map(move |&a| {
            let pos = (idx / self.strides[a]) % self.shape[a];
            let below = if pos > 0 {
                Some(idx - self.strides[a])
            } else {
                None
            };
            let above = if pos + 1 < self.shape[a] {
                Some(idx + self.strides[a])
            } else {
                None
            };
            below.into_iter().chain(above)
        })
    }
}

/// One sweep over a snapshot. Returns the number of newly valid cells.
fn extend_once(values: &mut Vec<f64>, valid: &mut Vec<bool>, stencil: &Stencil) -> usize {
    let old_values = values.clone();
    let old_valid = valid.clone();
    let mut newly_valid = 0;

    for idx in 0..old_values.len() {
        if old_valid[idx] {
            continue;
        }
        let (sum, count) = stencil
            .neighbours(idx)
            .filter(|&n| old_valid[n])
            .fold((0.0, 0usize), |(s, c), n| (s + old_values[n], c + 1));
        if count > 0 {
            values[idx] = sum / count as f64;
            valid[idx] = true;
            newly_valid += 1;
        }
    }

    newly_valid
}

fn rebuild<D: Dimension>(dim: D, values: Vec<f64>, valid: Vec<bool>) -> Result<Masked<D>> {
    let values = Array::from_shape_vec(dim.clone(), values)
        .map_err(|e| Error::config(format!("fill: {}", e)))?;
    let valid =
        Array::from_shape_vec(dim, valid).map_err(|e| Error::config(format!("fill: {}", e)))?;
    Ok(Masked { values, valid })
}

/// Replaces each masked cell that touches valid data with the mean of its
/// valid neighbours, `num_iters` times. Every sweep reads only the previous
/// sweep's result, so the traversal order never matters.
pub fn extend_into_mask<D: Dimension>(
    field: Masked<D>,
    num_iters: usize,
    neighbourhood: Neighbourhood,
) -> Result<Masked<D>> {
    let dim = field.values.raw_dim();
    let stencil = Stencil::new(field.values.shape(), neighbourhood);
    let mut values = field.values.iter().cloned().collect::<Vec<f64>>();
    let mut valid = field.valid.iter().cloned().collect::<Vec<bool>>();

    for iter in 0..num_iters {
        let n = extend_once(&mut values, &mut valid, &stencil);
        debug!("extend_into_mask: iteration {} filled {} cells", iter + 1, n);
        if n == 0 {
            break;
        }
    }

    rebuild(dim, values, valid)
}

/// Throws away `discard` cells, then extends valid data until every cell of
/// `fill` is valid. Cells that cannot be reached are counted and logged, not
/// treated as an error.
pub fn discard_and_fill<D: Dimension>(
    values: Array<f64, D>,
    discard: &Array<bool, D>,
    fill: &Array<bool, D>,
    neighbourhood: Neighbourhood,
) -> Result<Filled<D>> {
    if values.shape() != discard.shape() || values.shape() != fill.shape() {
        return Err(Error::config(format!(
            "discard_and_fill: data {:?}, discard {:?} and fill {:?} shapes differ",
            values.shape(),
            discard.shape(),
            fill.shape()
        )));
    }

    let dim = values.raw_dim();
    let stencil = Stencil::new(values.shape(), neighbourhood);
    let mut values = values.iter().cloned().collect::<Vec<f64>>();
    let mut valid = discard.iter().map(|d| !d).collect::<Vec<bool>>();
    let fill = fill.iter().cloned().collect::<Vec<bool>>();

    let count_missing = |valid: &[bool]| {
        valid
            .iter()
            .zip(&fill)
            .filter(|(v, f)| !**v && **f)
            .count()
    };

    let mut missing = count_missing(&valid[..]);
    while missing > 0 {
        extend_once(&mut values, &mut valid, &stencil);
        let missing_old = missing;
        missing = count_missing(&valid[..]);
        if missing == missing_old {
            warn!(
                "discard_and_fill: {} points in the fill region cannot be filled",
                missing
            );
            break;
        }
    }

    Ok(Filled {
        field: rebuild(dim, values, valid)?,
        unfilled: missing,
    })
}

#[cfg(test)]
mod test {
    use {
        super::*,
        ndarray::{arr1, arr2, Array3},
    };

    fn strip() -> Masked<ndarray::Ix1> {
        Masked::new(
            arr1(&[1.0, 0.0, 0.0, 3.0]),
            arr1(&[true, false, false, true]),
        )
        .unwrap()
    }

    #[test]
    fn zero_iterations_is_identity() {
        let m = strip();
        assert_eq!(extend_into_mask(m.clone(), 0, Neighbourhood::All).unwrap(), m);
    }

    #[test]
    fn uses_previous_snapshot() {
        let out = extend_into_mask(strip(), 1, Neighbourhood::All).unwrap();
        assert_eq!(out.values.to_vec(), vec![1.0, 1.0, 3.0, 3.0]);
        assert!(out.valid.iter().all(|&v| v));
    }

    #[test]
    fn mean_of_valid_neighbours() {
        let m = Masked::new(
            arr2(&[[1.0, 2.0, 3.0], [4.0, 0.0, 6.0], [7.0, 8.0, 9.0]]),
            arr2(&[[true, true, true], [true, false, true], [true, true, true]]),
        )
        .unwrap();
        let out = extend_into_mask(m, 1, Neighbourhood::All).unwrap();
        assert_eq!(out.values[[1, 1]], (2.0 + 4.0 + 6.0 + 8.0) / 4.0);
    }

    #[test]
    fn isolated_cells_stay_masked() {
        let m = Masked::new(arr1(&[0.0, 0.0]), arr1(&[false, false])).unwrap();
        let out = extend_into_mask(m.clone(), 5, Neighbourhood::All).unwrap();
        assert_eq!(out, m);
    }

    #[test]
    fn reaches_fixed_point() {
        let mut valid = Array3::from_elem((3, 4, 5), false);
        valid[[0, 0, 0]] = true;
        let mut values = Array3::zeros((3, 4, 5));
        values[[0, 0, 0]] = 2.5;
        let m = Masked::new(values, valid).unwrap();

        // Farthest cell is 2 + 3 + 4 steps away
        let a = extend_into_mask(m.clone(), 9, Neighbourhood::All).unwrap();
        let b = extend_into_mask(m, 20, Neighbourhood::All).unwrap();
        assert_eq!(a, b);
        assert!(a.values.iter().all(|&x| x == 2.5));
    }

    #[test]
    fn horizontal_does_not_cross_levels() {
        let mut valid = Array3::from_elem((2, 2, 2), false);
        valid[[0, 0, 0]] = true;
        let m = Masked::new(Array3::ones((2, 2, 2)), valid).unwrap();
        let out = extend_into_mask(m, 10, Neighbourhood::Horizontal).unwrap();
        assert_eq!(out.valid.index_axis(ndarray::Axis(0), 0).iter().filter(|&&v| v).count(), 4);
        assert!(out.valid.index_axis(ndarray::Axis(0), 1).iter().all(|&v| !v));
    }

    #[test]
    fn discard_then_fill() {
        let values = arr2(&[[5.0, -1.0e20], [5.0, 7.0]]);
        let discard = arr2(&[[false, true], [false, false]]);
        let fill = arr2(&[[true, true], [true, true]]);
        let out = discard_and_fill(values, &discard, &fill, Neighbourhood::All).unwrap();
        assert_eq!(out.unfilled, 0);
        assert_eq!(out.field.values[[0, 1]], 6.0);
    }

    #[test]
    fn unreachable_points_are_reported() {
        let values = arr1(&[1.0, 2.0]);
        let discard = arr1(&[true, true]);
        let fill = arr1(&[true, false]);
        let out = discard_and_fill(values, &discard, &fill, Neighbourhood::All).unwrap();
        assert_eq!(out.unfilled, 1);
        assert!(!out.field.valid[0]);
    }
}
