//! Python FFI bindings for the scattering transform
//!
//! Provides Python-callable functions using PyO3. Filters are passed as dicts
//! with keys `j`, `xi`, `sigma` and `levels` (a list of 1-D arrays).

use ndarray::Array1;
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyTuple};

use super::core::Scattering1D;
use super::filter_bank::{Filter, FilterBank};
use super::types::ScatteringParams;

fn required_item<'py>(dict: &Bound<'py, PyDict>, key: &str) -> PyResult<Bound<'py, PyAny>> {
    dict.get_item(key)?.ok_or_else(|| {
        pyo3::exceptions::PyKeyError::new_err(format!("filter dict is missing '{}'", key))
    })
}

/// Convert one filter dict into a [`Filter`]
fn filter_from_dict(dict: &Bound<'_, PyDict>) -> PyResult<Filter> {
    let j: usize = required_item(dict, "j")?.extract()?;
    let xi: f64 = match dict.get_item("xi")? {
        Some(value) => value.extract()?,
        None => 0.0,
    };
    let sigma: f64 = required_item(dict, "sigma")?.extract()?;
    let levels: Vec<PyReadonlyArray1<f64>> = required_item(dict, "levels")?.extract()?;
    let levels: Vec<Array1<f64>> = levels.iter().map(|l| l.as_array().to_owned()).collect();

    Ok(Filter::new(j, xi, sigma, levels))
}

/// Python-callable 1-D scattering transform
///
/// # Arguments
/// * `signal` - Padded input, 2D numpy array (batch, N) with N a power of two
/// * `phi` - Low-pass filter dict
/// * `psi1` - First-order filter dicts
/// * `psi2` - Second-order filter dicts (default: none, first order only)
/// * `log2_stride` - Output stride exponent (default: 0)
/// * `average_local` - Low-pass average every path (default: True)
///
/// # Returns
/// List of `(path, coefficients)` in canonical order, where `path` is a tuple
/// of filter indices and `coefficients` has shape (batch, time).
///
/// # Example (Python)
/// ```python
/// import _rust_scattering
///
/// paths = _rust_scattering.scattering1d_py(x, phi_f, psi1_f, psi2_f, log2_stride=6)
/// S0 = dict(paths)[()]
/// ```
#[pyfunction]
#[pyo3(signature = (signal, phi, psi1, psi2=None, log2_stride=0, average_local=true))]
pub fn scattering1d_py<'py>(
    py: Python<'py>,
    signal: PyReadonlyArray2<f64>,
    phi: Bound<'py, PyDict>,
    psi1: Vec<Bound<'py, PyDict>>,
    psi2: Option<Vec<Bound<'py, PyDict>>>,
    log2_stride: usize,
    average_local: bool,
) -> PyResult<Vec<(Bound<'py, PyTuple>, Bound<'py, PyArray2<f64>>)>> {
    let signal = signal.as_array().to_owned();

    let phi = filter_from_dict(&phi)?;
    let psi1 = psi1.iter().map(filter_from_dict).collect::<PyResult<Vec<_>>>()?;
    let psi2 = psi2
        .unwrap_or_default()
        .iter()
        .map(filter_from_dict)
        .collect::<PyResult<Vec<_>>>()?;

    let to_py_err = |e: super::types::ScatteringError| {
        pyo3::exceptions::PyValueError::new_err(format!("Scattering error: {}", e))
    };

    let bank = FilterBank::new(signal.ncols(), phi, psi1, psi2).map_err(to_py_err)?;
    let transform = Scattering1D::new(bank, ScatteringParams::new(log2_stride, average_local))
        .map_err(to_py_err)?;

    // 释放 GIL 并行处理
    let output = py
        .detach(|| transform.transform(signal.view()))
        .map_err(to_py_err)?;

    output
        .into_coefficients()
        .into_iter()
        .map(|c| {
            let path = PyTuple::new(py, c.path.indices())?;
            Ok((path, c.coef.into_pyarray(py)))
        })
        .collect()
}
