//! Spectral engine
//!
//! Forward/inverse transforms and the elementwise operations the cascade
//! needs, applied row by row to `(batch, len)` arrays.

use ndarray::{Array2, ArrayView1, ArrayView2};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::collections::HashMap;
use std::sync::Arc;

/// FFT plan cache keyed by transform length
/// Arc allows zero-cost sharing across threads
pub type FftPlanCache = Arc<HashMap<usize, (Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>)>>;

/// Call contract between the cascade and a transform backend
///
/// Only the two transforms are required. The inverse transform is normalized
/// by `1 / len`, so `ifft(fft(x)) == x`.
pub trait SpectralBackend: Sync {
    /// Forward DFT of every row
    fn fft(&self, x: &ArrayView2<Complex64>) -> Array2<Complex64>;

    /// Normalized inverse DFT of every row
    fn ifft(&self, x: &ArrayView2<Complex64>) -> Array2<Complex64>;

    /// Forward DFT of a real signal
    fn rfft(&self, x: &ArrayView2<f64>) -> Array2<Complex64> {
        let complex = x.mapv(|v| Complex64::new(v, 0.0));
        self.fft(&complex.view())
    }

    /// Apply a real frequency response to every row
    fn cdgmm(&self, x: &ArrayView2<Complex64>, filter: &ArrayView1<f64>) -> Array2<Complex64> {
        debug_assert_eq!(x.ncols(), filter.len());
        let mut out = x.to_owned();
        for mut row in out.rows_mut() {
            row.zip_mut_with(filter, |z, &h| *z *= h);
        }
        out
    }

    /// Subsample by `2^log2_factor` in the frequency domain
    ///
    /// Averages the `2^log2_factor` aliased copies of each bin, which equals
    /// decimating the time-domain signal by the same factor.
    fn subsample_fourier(&self, x: &ArrayView2<Complex64>, log2_factor: usize) -> Array2<Complex64> {
        if log2_factor == 0 {
            return x.to_owned();
        }
        let factor = 1usize << log2_factor;
        let out_len = x.ncols() / factor;
        let norm = 1.0 / factor as f64;

        let mut out = Array2::zeros((x.nrows(), out_len));
        for (src, mut dst) in x.rows().into_iter().zip(out.rows_mut()) {
            for (i, &z) in src.iter().enumerate() {
                dst[i % out_len] += z;
            }
            dst.mapv_inplace(|z| z * norm);
        }
        out
    }

    /// Pointwise complex magnitude
    fn modulus(&self, x: &ArrayView2<Complex64>) -> Array2<f64> {
        x.mapv(|z| z.norm())
    }

    /// Pointwise real part
    fn real_part(&self, x: &ArrayView2<Complex64>) -> Array2<f64> {
        x.mapv(|z| z.re)
    }
}

/// rustfft-backed engine with a plan cache shared across threads
#[derive(Clone)]
pub struct RustFftBackend {
    cache: FftPlanCache,
}

impl std::fmt::Debug for RustFftBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sizes: Vec<usize> = self.cache.keys().copied().collect();
        sizes.sort_unstable();
        f.debug_struct("RustFftBackend").field("planned_sizes", &sizes).finish()
    }
}

impl Default for RustFftBackend {
    fn default() -> Self {
        Self {
            cache: Arc::new(HashMap::new()),
        }
    }
}

impl RustFftBackend {
    /// Backend without precomputed plans; every call plans on demand
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-plan every length a cascade over `length` samples can reach:
    /// `length`, `length / 2`, ..., 1
    pub fn for_length(length: usize) -> Self {
        let mut planner = FftPlanner::new();
        let mut cache = HashMap::new();
        let mut size = length;
        while size >= 1 {
            let fft = planner.plan_fft_forward(size);
            let ifft = planner.plan_fft_inverse(size);
            cache.insert(size, (fft, ifft));
            size /= 2;
        }
        Self {
            cache: Arc::new(cache),
        }
    }

    pub fn cache(&self) -> &FftPlanCache {
        &self.cache
    }

    fn plans(&self, n: usize) -> (Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>) {
        if let Some((fft_plan, ifft_plan)) = self.cache.get(&n) {
            (Arc::clone(fft_plan), Arc::clone(ifft_plan))
        } else {
            // Fallback: create on-demand if size not in cache
            let mut planner = FftPlanner::new();
            (planner.plan_fft_forward(n), planner.plan_fft_inverse(n))
        }
    }
}

/// Run `plan` over every row of `x`
fn process_rows(x: &ArrayView2<Complex64>, plan: &Arc<dyn Fft<f64>>) -> Array2<Complex64> {
    let mut out = x.to_owned();
    let mut scratch = vec![Complex64::new(0.0, 0.0); plan.get_inplace_scratch_len()];
    let mut buffer: Vec<Complex64> = Vec::with_capacity(x.ncols());

    for mut row in out.rows_mut() {
        buffer.clear();
        buffer.extend(row.iter().copied());
        plan.process_with_scratch(&mut buffer, &mut scratch);
        row.assign(&ArrayView1::from(&buffer[..]));
    }
    out
}

impl SpectralBackend for RustFftBackend {
    fn fft(&self, x: &ArrayView2<Complex64>) -> Array2<Complex64> {
        let (fft_plan, _) = self.plans(x.ncols());
        process_rows(x, &fft_plan)
    }

    fn ifft(&self, x: &ArrayView2<Complex64>) -> Array2<Complex64> {
        let n = x.ncols();
        let (_, ifft_plan) = self.plans(n);
        let mut out = process_rows(x, &ifft_plan);

        // 归一化
        let norm = 1.0 / n as f64;
        out.mapv_inplace(|z| z * norm);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2, Array1};

    #[test]
    fn test_fft_ifft_inverse() {
        let backend = RustFftBackend::for_length(4);
        let input = arr2(&[[1.0, 2.0, 3.0, 4.0], [-1.0, 0.5, 0.0, 2.0]]);

        let spectrum = backend.rfft(&input.view());
        let back = backend.ifft(&spectrum.view());

        for ((b, i), &x) in input.indexed_iter() {
            assert_relative_eq!(back[[b, i]].re, x, epsilon = 1e-12);
            assert_relative_eq!(back[[b, i]].im, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_fft_dc_bin_is_sum() {
        let backend = RustFftBackend::new();
        let input = arr2(&[[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]]);
        let spectrum = backend.rfft(&input.view());
        assert_relative_eq!(spectrum[[0, 0]].re, 36.0, epsilon = 1e-12);
    }

    #[test]
    fn test_plan_cache_covers_all_levels() {
        let backend = RustFftBackend::for_length(32);
        let mut sizes: Vec<usize> = backend.cache().keys().copied().collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 2, 4, 8, 16, 32]);
    }

    #[test]
    fn test_subsample_fourier_matches_decimation() {
        let backend = RustFftBackend::for_length(16);
        let signal = Array2::from_shape_fn((2, 16), |(b, i)| {
            ((i * (b + 3)) as f64 * 0.37).sin() + 0.1 * i as f64
        });

        let spectrum = backend.rfft(&signal.view());
        for log2_factor in 0..=3 {
            let sub = backend.subsample_fourier(&spectrum.view(), log2_factor);
            let decimated = backend.ifft(&sub.view());
            let step = 1 << log2_factor;
            assert_eq!(decimated.ncols(), 16 / step);
            for b in 0..2 {
                for i in 0..decimated.ncols() {
                    assert_relative_eq!(decimated[[b, i]].re, signal[[b, i * step]], epsilon = 1e-10);
                    assert_relative_eq!(decimated[[b, i]].im, 0.0, epsilon = 1e-10);
                }
            }
        }
    }

    #[test]
    fn test_cdgmm_modulus_real_part() {
        let backend = RustFftBackend::new();
        let x = Array2::from_shape_vec(
            (1, 3),
            vec![
                Complex64::new(3.0, 4.0),
                Complex64::new(-1.0, 2.0),
                Complex64::new(0.0, -2.0),
            ],
        )
        .unwrap();
        let filter: Array1<f64> = arr1(&[2.0, 0.0, -1.0]);

        let y = backend.cdgmm(&x.view(), &filter.view());
        assert_eq!(y[[0, 0]], Complex64::new(6.0, 8.0));
        assert_eq!(y[[0, 1]], Complex64::new(0.0, 0.0));
        assert_eq!(y[[0, 2]], Complex64::new(0.0, 2.0));

        let m = backend.modulus(&y.view());
        assert_relative_eq!(m[[0, 0]], 10.0, epsilon = 1e-12);
        assert_relative_eq!(m[[0, 2]], 2.0, epsilon = 1e-12);

        let r = backend.real_part(&y.view());
        assert_eq!(r.row(0).to_vec(), vec![6.0, 0.0, 0.0]);
    }
}
