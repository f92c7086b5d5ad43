//! # Scattering1D Module
//!
//! Frequency-domain 1-D wavelet scattering transform: low-pass averaging at
//! order 0, band-pass + modulus (+ averaging) at orders 1 and 2, with the
//! subsampling and filter level of every path decided up front.

pub mod types;
pub mod filter_bank;
pub mod spectral;
pub mod policy;
pub mod assembler;
pub mod core;
#[cfg(feature = "python")]
pub mod ffi;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types and functions
pub use assembler::{PathAssembler, ScatteringOutput};
pub use self::core::{scattering1d, scattering1d_channels, Scattering1D};
pub use filter_bank::{periodize_filter_fourier, Filter, FilterBank, FilterInfo};
pub use policy::{subsampling_exponent, CascadePlan};
pub use spectral::{RustFftBackend, SpectralBackend};
pub use types::{
    ErrorKind, FilterId, ScatteringCoefficient, ScatteringError, ScatteringOrder,
    ScatteringParams, ScatteringPath,
};

#[cfg(feature = "python")]
pub use ffi::scattering1d_py;
