//! Seawater equations of state matching the MITgcm options.
//!
//! Temperature is potential temperature in °C, salinity in psu and pressure in
//! dbar. MDJWF is McDougall et al. (2003), JMD95 is Jackett & McDougall (1995)
//! evaluated with pressure in bar, LINEAR uses the configured expansion
//! coefficients about a reference state.

use {
    crate::{
        constants::RHO_CONST,
        error::{Error, Result},
    },
    ndarray::{Array3, ArrayView3},
    serde::{Deserialize, Serialize},
    std::{fmt, str::FromStr},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EosType {
    #[serde(rename = "MDJWF")]
    Mdjwf,
    #[serde(rename = "JMD95")]
    Jmd95,
    #[serde(rename = "LINEAR")]
    Linear,
}

impl FromStr for EosType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MDJWF" => Ok(EosType::Mdjwf),
            "JMD95" => Ok(EosType::Jmd95),
            "LINEAR" => Ok(EosType::Linear),
            _ => Err(Error::config(format!(
                "invalid eosType {:?}, must be MDJWF, JMD95 or LINEAR",
                s
            ))),
        }
    }
}

impl fmt::Display for EosType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            EosType::Mdjwf => "MDJWF",
            EosType::Jmd95 => "JMD95",
            EosType::Linear => "LINEAR",
        })
    }
}

/// Reference density and, for LINEAR, the linearisation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EosParams {
    pub rho_const: f64,
    pub t_alpha: f64,
    pub s_beta: f64,
    pub t_ref: f64,
    pub s_ref: f64,
}

impl Default for EosParams {
    fn default() -> Self {
        Self {
            rho_const: RHO_CONST,
            t_alpha: 2.0e-4,
            s_beta: 7.4e-4,
            t_ref: -1.0,
            s_ref: 34.2,
        }
    }
}

const MDJWF_NUM: [f64; 12] = [
    9.99843699e+02,
    7.35212840e+00,
    -5.45928211e-02,
    3.98476704e-04,
    2.96938239e+00,
    -7.23268813e-03,
    2.12382341e-03,
    1.04004591e-02,
    1.03970529e-07,
    5.18761880e-06,
    -3.24041825e-08,
    -1.23869360e-11,
];

const MDJWF_DEN: [f64; 13] = [
    1.00000000e+00,
    7.28606739e-03,
    -4.60835542e-05,
    3.68390573e-07,
    1.80809186e-10,
    2.14691708e-03,
    -9.27062484e-06,
    -1.78343643e-10,
    4.76534122e-06,
    1.63410736e-09,
    5.30848875e-06,
    -3.03175128e-16,
    -1.27934137e-17,
];

fn density_mdjwf(s: f64, t: f64, p: f64) -> f64 {
    let n = &MDJWF_NUM;
    let d = &MDJWF_DEN;
    let t2 = t * t;
    let sp5 = s.max(0.0).sqrt();

    let num = n[0]
        + t * (n[1] + t * (n[2] + n[3] * t))
        + s * (n[4] + n[5] * t + n[6] * s)
        + p * (n[7] + n[8] * t2 + n[9] * s + p * (n[10] + n[11] * t2));
    let den = d[0]
        + t * (d[1] + t * (d[2] + t * (d[3] + t * d[4])))
        + s * (d[5] + t * (d[6] + d[7] * t2) + sp5 * (d[8] + d[9] * t2))
        + p * (d[10] + p * t * (d[11] * t2 + d[12] * p));

    num / den
}

const JMD95_FRESH: [f64; 6] = [
    999.842594,
    6.793952e-2,
    -9.095290e-3,
    1.001685e-4,
    -1.120083e-6,
    6.536332e-9,
];

const JMD95_SALT: [f64; 9] = [
    8.24493e-1,
    -4.0899e-3,
    7.6438e-5,
    -8.2467e-7,
    5.3875e-9,
    -5.72466e-3,
    1.0227e-4,
    -1.6546e-6,
    4.8314e-4,
];

const JMD95_KFW: [f64; 5] = [1.965933e4, 1.444304e2, -1.706103, 9.648704e-3, -4.190253e-5];

const JMD95_KSW: [f64; 7] = [
    5.284855e1,
    -3.101089e-1,
    6.283263e-3,
    -5.084188e-5,
    3.886640e-1,
    9.085835e-3,
    -4.619924e-4,
];

const JMD95_KP: [f64; 14] = [
    3.186519,
    2.212276e-2,
    -2.984642e-4,
    1.956415e-6,
    6.704388e-3,
    -1.847318e-4,
    2.059331e-7,
    1.480266e-4,
    2.102898e-4,
    -1.202016e-5,
    1.394680e-7,
    -2.040237e-6,
    6.128773e-8,
    6.207323e-10,
];

fn density_jmd95(s: f64, t: f64, p_dbar: f64) -> f64 {
    // bar
    let p = p_dbar * 0.1;
    let (t2, t3, t4) = (t * t, t * t * t, t * t * t * t);
    let s3o2 = s * s.max(0.0).sqrt();

    let fw = &JMD95_FRESH;
    let sf = &JMD95_SALT;
    let rho_fresh = fw[0] + fw[1] * t + fw[2] * t2 + fw[3] * t3 + fw[4] * t4 + fw[5] * t4 * t;
    let rho_surface = rho_fresh
        + s * (sf[0] + sf[1] * t + sf[2] * t2 + sf[3] * t3 + sf[4] * t4)
        + s3o2 * (sf[5] + sf[6] * t + sf[7] * t2)
        + sf[8] * s * s;

    let kf = &JMD95_KFW;
    let ks = &JMD95_KSW;
    let kp = &JMD95_KP;
    let bulk = kf[0]
        + kf[1] * t
        + kf[2] * t2
        + kf[3] * t3
        + kf[4] * t4
        + s * (ks[0] + ks[1] * t + ks[2] * t2 + ks[3] * t3)
        + s3o2 * (ks[4] + ks[5] * t + ks[6] * t2)
        + p * (kp[0] + kp[1] * t + kp[2] * t2 + kp[3] * t3)
        + p * s * (kp[4] + kp[5] * t + kp[6] * t2)
        + p * s3o2 * kp[7]
        + p * p * (kp[8] + kp[9] * t + kp[10] * t2)
        + p * p * s * (kp[11] + kp[12] * t + kp[13] * t2);

    rho_surface / (1.0 - p / bulk)
}

fn density_linear(s: f64, t: f64, params: &EosParams) -> f64 {
    params.rho_const * (1.0 - params.t_alpha * (t - params.t_ref) + params.s_beta * (s - params.s_ref))
}

/// In-situ density (kg/m³) of one cell. Pressure is ignored by LINEAR.
pub fn density(eos: EosType, salt: f64, temp: f64, press_dbar: f64, params: &EosParams) -> f64 {
    match eos {
        EosType::Mdjwf => density_mdjwf(salt, temp, press_dbar),
        EosType::Jmd95 => density_jmd95(salt, temp, press_dbar),
        EosType::Linear => density_linear(salt, temp, params),
    }
}

/// Cellwise [`density`] of `(nz, ny, nx)` arrays.
pub fn density_3d(
    eos: EosType,
    salt: ArrayView3<f64>,
    temp: ArrayView3<f64>,
    press_dbar: ArrayView3<f64>,
    params: &EosParams,
) -> Result<Array3<f64>> {
    if salt.dim() != temp.dim() || salt.dim() != press_dbar.dim() {
        return Err(Error::config(format!(
            "density needs matching arrays, got salt {:?}, temp {:?}, pressure {:?}",
            salt.dim(),
            temp.dim(),
            press_dbar.dim()
        )));
    }
    Ok(Array3::from_shape_fn(salt.dim(), |idx| {
        density(eos, salt[idx], temp[idx], press_dbar[idx], params)
    }))
}
