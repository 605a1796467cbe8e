//! Reading and writing MITgcm-style unformatted binary fields.
//!
//! Files are raw big-endian IEEE floats with no header, stored row-major with
//! axis order (time, z, y, x). The time length is never recorded, so it is
//! inferred from the file size.

use {
    crate::error::{Error, Result},
    byteorder::{BigEndian, ByteOrder},
    ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn},
    serde::{Deserialize, Serialize},
    std::{
        convert::TryFrom,
        fmt,
        fs::File,
        io::{Read, Write},
        path::Path,
        str::FromStr,
    },
};

/// Floating point precision of a binary file, as in `readBinaryPrec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Precision {
    Single,
    Double,
}

impl Precision {
    pub fn bytes(self) -> usize {
        match self {
            Precision::Single => 4,
            Precision::Double => 8,
        }
    }
}

impl TryFrom<u32> for Precision {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            32 => Ok(Precision::Single),
            64 => Ok(Precision::Double),
            _ => Err(Error::config(format!(
                "invalid precision {}, must be 32 or 64",
                bits
            ))),
        }
    }
}

impl From<Precision> for u32 {
    fn from(prec: Precision) -> u32 {
        match prec {
            Precision::Single => 32,
            Precision::Double => 64,
        }
    }
}

/// Grid extents used to interpret the shape of a binary file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

/// Which axes are present in a field, trailing `t` meaning a leading time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimCode {
    #[serde(rename = "xy")]
    Xy,
    #[serde(rename = "xyz")]
    Xyz,
    #[serde(rename = "xyt")]
    Xyt,
    #[serde(rename = "xyzt")]
    Xyzt,
    #[serde(rename = "yzt")]
    Yzt,
    #[serde(rename = "xzt")]
    Xzt,
}

impl DimCode {
    pub fn has_time(self) -> bool {
        matches!(
            self,
            DimCode::Xyt | DimCode::Xyzt | DimCode::Yzt | DimCode::Xzt
        )
    }

    pub fn has_depth(self) -> bool {
        matches!(
            self,
            DimCode::Xyz | DimCode::Xyzt | DimCode::Yzt | DimCode::Xzt
        )
    }

    /// Shape of a single time record.
    pub fn spatial_shape(self, dims: GridDims) -> Vec<usize> {
        let GridDims { nx, ny, nz } = dims;
        match self {
            DimCode::Xy | DimCode::Xyt => vec![ny, nx],
            DimCode::Xyz | DimCode::Xyzt => vec![nz, ny, nx],
            DimCode::Yzt => vec![nz, ny],
            DimCode::Xzt => vec![nz, nx],
        }
    }
}

impl FromStr for DimCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "xy" => Ok(DimCode::Xy),
            "xyz" => Ok(DimCode::Xyz),
            "xyt" => Ok(DimCode::Xyt),
            "xyzt" => Ok(DimCode::Xyzt),
            "yzt" => Ok(DimCode::Yzt),
            "xzt" => Ok(DimCode::Xzt),
            _ => Err(Error::config(format!("invalid dimension code {:?}", s))),
        }
    }
}

impl fmt::Display for DimCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            DimCode::Xy => "xy",
            DimCode::Xyz => "xyz",
            DimCode::Xyt => "xyt",
            DimCode::Xyzt => "xyzt",
            DimCode::Yzt => "yzt",
            DimCode::Xzt => "xzt",
        };
        f.write_str(s)
    }
}

pub fn decode(bytes: &[u8], prec: Precision) -> Vec<f64> {
    match prec {
        Precision::Single => bytes
            .chunks_exact(4)
            .map(|b| BigEndian::read_f32(b) as f64)
            .collect(),
        Precision::Double => bytes.chunks_exact(8).map(BigEndian::read_f64).collect(),
    }
}

pub fn encode<'a, I: IntoIterator<Item = &'a f64>>(values: I, prec: Precision) -> Vec<u8> {
    let mut bytes = vec![];
    match prec {
        Precision::Single => values.into_iter().for_each(|x| {
            let mut buf = [0u8; 4];
            BigEndian::write_f32(&mut buf, *x as f32);
            bytes.extend_from_slice(&buf);
        }),
        Precision::Double => values.into_iter().for_each(|x| {
            let mut buf = [0u8; 8];
            BigEndian::write_f64(&mut buf, *x);
            bytes.extend_from_slice(&buf);
        }),
    }
    bytes
}

/// Reads a field, checking the file length against the declared shape.
pub fn read_binary<P: AsRef<Path>>(
    path: P,
    dims: GridDims,
    code: DimCode,
    prec: Precision,
) -> Result<ArrayD<f64>> {
    let path = path.as_ref();
    let bytes = {
        let mut f = File::open(path)?;
        let mut bytes = Vec::new();
        f.read_to_end(&mut bytes)?;
        bytes
    };

    if bytes.len() % prec.bytes() != 0 {
        return Err(Error::consistency(format!(
            "{} has {} bytes, not a whole number of {}-byte values",
            path.display(),
            bytes.len(),
            prec.bytes()
        )));
    }
    let values = decode(&bytes, prec);

    let spatial = code.spatial_shape(dims);
    let record: usize = spatial.iter().product();

    let shape = if code.has_time() {
        if record == 0 || values.len() % record != 0 {
            return Err(Error::consistency(format!(
                "{} holds {} values, not a multiple of the {} record size {}",
                path.display(),
                values.len(),
                code,
                record
            )));
        }
        let mut shape = vec![values.len() / record];
        shape.extend(spatial);
        shape
    } else {
        if values.len() != record {
            return Err(Error::consistency(format!(
                "{} holds {} values, expected {} for {}",
                path.display(),
                values.len(),
                record,
                code
            )));
        }
        spatial
    };

    ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|e| Error::consistency(format!("{}: {}", path.display(), e)))
}

/// Writes a field in row-major order regardless of its memory layout.
pub fn write_binary<S, D, P>(data: &ArrayBase<S, D>, path: P, prec: Precision) -> Result<()>
where
    S: Data<Elem = f64>,
    D: Dimension,
    P: AsRef<Path>,
{
    let bytes = encode(data.iter(), prec);
    let mut f = File::create(path)?;
    f.write_all(&bytes)?;
    Ok(())
}
