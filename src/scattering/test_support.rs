//! Gaussian test filter banks shared by the unit tests

use ndarray::{Array1, Array2};
use std::f64::consts::PI;

use super::filter_bank::{Filter, FilterBank};

/// Intrinsic depth of the test low-pass
pub const LOWPASS_DEPTH: usize = 3;

/// Symmetric Gaussian low-pass with unit DC gain
pub fn gaussian_lowpass(length: usize, sigma: f64) -> Array1<f64> {
    Array1::from_shape_fn(length, |m| {
        let w = m.min(length - m) as f64 / length as f64;
        (-w * w / (2.0 * sigma * sigma)).exp()
    })
}

/// Analytic Gaussian band-pass: zero on negative frequencies
pub fn analytic_bandpass(length: usize, xi: f64, sigma: f64) -> Array1<f64> {
    Array1::from_shape_fn(length, |m| {
        if m == 0 || m >= length / 2 {
            return 0.0;
        }
        let w = m as f64 / length as f64;
        (-(w - xi) * (w - xi) / (2.0 * sigma * sigma)).exp()
    })
}

/// Dyadic bank: band-pass `n` has `j = n + 1` and center `0.4 / 2^n`
pub fn gabor_bank(length: usize, num_first: usize, num_second: usize) -> FilterBank {
    let depth = length.trailing_zeros() as usize;
    let phi_sigma = 0.4 / (1 << LOWPASS_DEPTH) as f64 / 2.0;
    let phi = Filter::from_full_resolution(
        LOWPASS_DEPTH,
        0.0,
        phi_sigma,
        &gaussian_lowpass(length, phi_sigma),
        depth,
    )
    .unwrap();

    let bandpass = |n: usize| {
        let xi = 0.4 / (1 << n) as f64;
        let sigma = xi / 4.0;
        Filter::from_full_resolution(n + 1, xi, sigma, &analytic_bandpass(length, xi, sigma), depth)
            .unwrap()
    };

    let psi1 = (0..num_first).map(bandpass).collect();
    let psi2 = (0..num_second).map(bandpass).collect();
    FilterBank::new(length, phi, psi1, psi2).unwrap()
}

/// Batch of deterministic test signals, shape (batch, length)
pub fn chirp_batch(batch: usize, length: usize) -> Array2<f64> {
    Array2::from_shape_fn((batch, length), |(b, t)| {
        let x = t as f64 / length as f64;
        (2.0 * PI * (3.0 + b as f64) * x * (1.0 + 4.0 * x)).cos() + 0.25 * (b as f64 + 1.0) * x
    })
}
