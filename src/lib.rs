//! # Rust Scattering - 1-D wavelet scattering transform
//!
//! This library computes the scattering transform of padded 1-D signals in
//! the frequency domain: orders 0, 1 and 2, optional local averaging, and a
//! uniform output stride.

pub mod scattering;

pub use scattering::{
    scattering1d, scattering1d_channels, CascadePlan, ErrorKind, Filter, FilterBank, FilterId,
    RustFftBackend, Scattering1D, ScatteringCoefficient, ScatteringError, ScatteringOrder,
    ScatteringOutput, ScatteringParams, ScatteringPath, SpectralBackend,
};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module definition
#[cfg(feature = "python")]
#[pymodule]
fn _rust_scattering(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(scattering::scattering1d_py, m)?)?;
    Ok(())
}
