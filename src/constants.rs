/// Acceleration due to gravity (m/s^2)
pub const GRAVITY: f64 = 9.81;
/// Reference density of seawater (kg/m^3)
pub const RHO_CONST: f64 = 1035.0;

pub const SEC_PER_DAY: f64 = 24.0 * 60.0 * 60.0;
pub const SEC_PER_YEAR: f64 = 365.25 * SEC_PER_DAY;
pub const MONTHS_PER_YEAR: usize = 12;
/// Boundary files are monthly; a month is taken as 30 days.
pub const DAYS_PER_MONTH: f64 = 30.0;

pub const DEG2RAD: f64 = core::f64::consts::PI / 180.0;
/// Radius of the Earth (m)
pub const R_EARTH: f64 = 6.371e6;

/// Pa to dbar
pub const PA_TO_DBAR: f64 = 1.0e-4;
/// m^3/s to Sv
pub const SV: f64 = 1.0e-6;

/// Default temperature (degC) and salinity (psu) used to fill ice shelf cavities.
pub const CAVITY_TEMP: f64 = -1.9;
pub const CAVITY_SALT: f64 = 34.4;
