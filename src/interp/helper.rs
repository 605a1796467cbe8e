use {
    crate::error::{Error, Result},
    ndarray::ArrayView1,
};

/// Bracketing indices and linear weights for one target coordinate.
///
/// `c1 + c2 == 1`; an exact hit on a source point gives `i1 == i2` and
/// `c1 == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceWeights {
    pub i1: usize,
    pub i2: usize,
    pub c1: f64,
    pub c2: f64,
}

impl SliceWeights {
    fn exact(k: usize) -> Self {
        SliceWeights {
            i1: k,
            i2: k,
            c1: 1.0,
            c2: 0.0,
        }
    }

    fn between(i1: usize, i2: usize, lower: f64, upper: f64, x: f64) -> Self {
        let c1 = (upper - x) / (upper - lower);
        SliceWeights {
            i1,
            i2,
            c1,
            c2: 1.0 - c1,
        }
    }

    /// Pairs of (index, weight) with non-zero weight.
    pub fn donors(&self) -> impl Iterator<Item = (usize, f64)> {
        let second = if self.i2 != self.i1 && self.c2 != 0.0 {
            Some((self.i2, self.c2))
        } else {
            None
        };
        std::iter::once((self.i1, self.c1)).chain(second)
    }
}

/// Finds where `target` sits on a strictly increasing `axis`.
///
/// With `is_longitude` the axis is periodic: the target is first shifted by
/// multiples of 360 degrees into `[axis[0], axis[0] + 360)`, and a target that
/// then lies past the last point is bracketed across the seam by the last and
/// first points, provided the seam gap is no wider than twice the largest
/// spacing along the axis. Regional axes therefore never wrap.
pub fn interp_slice_helper(
    axis: ArrayView1<f64>,
    target: f64,
    is_longitude: bool,
) -> Result<SliceWeights> {
    let n = axis.len();
    if n == 0 {
        return Err(Error::config("cannot interpolate on an empty axis"));
    }
    if axis.iter().zip(axis.iter().skip(1)).any(|(a, b)| b <= a) {
        return Err(Error::config("source axis must be strictly increasing"));
    }
    let first = axis[0];
    let last = axis[n - 1];
    let out_of_range = Error::OutOfRange {
        value: target,
        min: first,
        max: last,
    };

    if !target.is_finite() {
        return Err(out_of_range);
    }

    let mut x = target;
    if is_longitude && !(first..first + 360.0).contains(&x) {
        x = first + (x - first).rem_euclid(360.0);
        // rem_euclid can round up to the modulus itself
        if x >= first + 360.0 {
            x = first;
        }
    }

    if x == last {
        return Ok(SliceWeights::exact(n - 1));
    }

    if x > last {
        if !is_longitude || n < 2 {
            return Err(out_of_range);
        }
        let upper = first + 360.0;
        let max_spacing = axis
            .iter()
            .zip(axis.iter().skip(1))
            .map(|(a, b)| b - a)
            .fold(0.0, f64::max);
        if upper - last > 2.0 * max_spacing {
            return Err(out_of_range);
        }
        return Ok(SliceWeights::between(n - 1, 0, last, upper, x));
    }

    if x < first {
        return Err(out_of_range);
    }

    // axis[lo] <= x < axis[hi]
    let (mut lo, mut hi) = (0, n - 1);
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if axis[mid] <= x {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    if axis[lo] == x {
        Ok(SliceWeights::exact(lo))
    } else {
        Ok(SliceWeights::between(lo, hi, axis[lo], axis[hi], x))
    }
}

/// Weights for each target; targets outside the axis map to `None`.
pub fn weights_along(
    axis: ArrayView1<f64>,
    targets: ArrayView1<f64>,
    is_longitude: bool,
) -> Result<Vec<Option<SliceWeights>>> {
    targets
        .iter()
        .map(
            |&x| match interp_slice_helper(axis.view(), x, is_longitude) {
                Ok(w) => Ok(Some(w)),
                Err(Error::OutOfRange { .. }) => Ok(None),
                Err(e) => Err(e),
            },
        )
        .collect()
}
