pub mod csv;
#[cfg(feature = "netcdf")]
pub mod netcdf;
