//! Gridded data tagged with its layout, and value/validity pairs.

use {
    crate::{
        error::{Error, Result},
        grid::{Grid, Stagger},
        io::DimCode,
    },
    ndarray::{Array, ArrayBase, ArrayD, ArrayViewD, Axis, Data, Dimension, IxDyn},
};

/// A dense array whose shape has been checked against a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    data: ArrayD<f64>,
    dims: DimCode,
    stagger: Stagger,
}

impl Field {
    pub fn new(data: ArrayD<f64>, dims: DimCode, stagger: Stagger, grid: &Grid) -> Result<Self> {
        let spatial = dims.spatial_shape(grid.dims());
        let shape = data.shape();
        let ok = if dims.has_time() {
            shape.len() == spatial.len() + 1 && shape[1..] == spatial[..]
        } else {
            shape == &spatial[..]
        };
        if !ok {
            return Err(Error::config(format!(
                "{} field on {} points has shape {:?}, grid expects {:?}{}",
                dims,
                stagger,
                shape,
                spatial,
                if dims.has_time() { " after the time axis" } else { "" }
            )));
        }
        Ok(Field {
            data,
            dims,
            stagger,
        })
    }

    pub fn data(&self) -> ArrayViewD<f64> {
        self.data.view()
    }

    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    pub fn dims(&self) -> DimCode {
        self.dims
    }

    pub fn stagger(&self) -> Stagger {
        self.stagger
    }

    pub fn num_time(&self) -> Option<usize> {
        if self.dims.has_time() {
            Some(self.data.len_of(Axis(0)))
        } else {
            None
        }
    }

    /// A single time record, or the whole field when there is no time axis.
    pub fn record(&self, t: usize) -> ArrayViewD<f64> {
        if self.dims.has_time() {
            self.data.index_axis(Axis(0), t)
        } else {
            self.data.view()
        }
    }
}

/// Values with an explicit validity flag per element.
#[derive(Debug, Clone, PartialEq)]
pub struct Masked<D: Dimension> {
    pub values: Array<f64, D>,
    pub valid: Array<bool, D>,
}

impl<D: Dimension> Masked<D> {
    pub fn new(values: Array<f64, D>, valid: Array<bool, D>) -> Result<Self> {
        if values.shape() != valid.shape() {
            return Err(Error::config(format!(
                "values have shape {:?} but validity has shape {:?}",
                values.shape(),
                valid.shape()
            )));
        }
        Ok(Masked { values, valid })
    }

    pub fn all_valid(values: Array<f64, D>) -> Self {
        let valid = Array::from_elem(values.raw_dim(), true);
        Masked { values, valid }
    }

    /// Cells are valid where `hfac > 0`, i.e. where `ceil(hfac)` is 1.
    pub fn from_hfac<S>(values: Array<f64, D>, hfac: &ArrayBase<S, D>) -> Result<Self>
    where
        S: Data<Elem = f64>,
    {
        Masked::new(values, hfac.mapv(|h| h > 0.0))
    }

    pub fn num_masked(&self) -> usize {
        self.valid.iter().filter(|v| !**v).count()
    }

    /// Values with every invalid cell replaced by `fill`.
    pub fn filled(&self, fill: f64) -> Array<f64, D> {
        let mut out = self.values.clone();
        out.iter_mut()
            .zip(self.valid.iter())
            .filter(|(_, v)| !**v)
            .for_each(|(x, _)| *x = fill);
        out
    }

    pub fn into_dyn(self) -> Masked<IxDyn> {
        Masked {
            values: self.values.into_dyn(),
            valid: self.valid.into_dyn(),
        }
    }
}
