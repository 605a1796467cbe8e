
pub mod error;
pub mod io;

pub mod field;
pub mod grid;

pub mod fill;
pub mod interp;

pub mod eos;
pub mod ics;
pub mod load;
pub mod obcs;
pub mod transport;

pub mod parameters;

pub mod constants;
pub mod utils;
