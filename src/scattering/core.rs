//! Core scattering cascade
//!
//! Drives order 0 (low-pass averaging), order 1 (band-pass, modulus,
//! optional averaging) and order 2 (a second band-pass on the retained
//! order-1 spectrum) in the frequency domain.
//!
//! # Algorithm
//! 1. Resolve the stride/level schedule for every path (`CascadePlan`)
//! 2. Transform the signal once; the spectrum is shared by every order
//! 3. Fan first-order paths out, keeping each `|x * psi1|` spectrum when a
//!    second order exists
//! 4. Fan second-order pairs out over the retained spectra
//! 5. Assemble the paths in canonical order

use ndarray::{Array2, ArrayView2, ArrayView3, Axis};
use num_complex::Complex64;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, trace};

use super::assembler::{PathAssembler, ScatteringOutput};
use super::filter_bank::FilterBank;
use super::policy::{CascadePlan, FirstOrderPlan, SecondOrderPlan, StagePlan};
use super::spectral::{RustFftBackend, SpectralBackend};
use super::types::{
    log2_exact, ScatteringCoefficient, ScatteringError, ScatteringParams, ScatteringPath,
};

/// Read-only spectrum shared across the fan-out
type SharedSpectrum = Arc<Array2<Complex64>>;

/// Cascade position; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CascadeStage {
    Order0,
    Order1,
    Order2,
    Done,
}

impl CascadeStage {
    fn next(self, has_second_order: bool) -> Self {
        match self {
            CascadeStage::Order0 => CascadeStage::Order1,
            CascadeStage::Order1 if has_second_order => CascadeStage::Order2,
            CascadeStage::Order1 | CascadeStage::Order2 | CascadeStage::Done => CascadeStage::Done,
        }
    }
}

/// Compute the 1-D scattering transform of a (batch, length) signal
///
/// # Arguments
/// * `signal` - Real input, `length` must be a power of two equal to `bank.length()`
/// * `bank` - Low-pass and band-pass filters at every required level
/// * `params` - Output stride and local averaging switch
/// * `backend` - Spectral engine
///
/// # Returns
/// Every path `()`, `(n1,)` and `(n1, n2)` with `j2 > j1`, in canonical order.
/// Any error aborts the whole transform.
pub fn scattering1d<B: SpectralBackend>(
    signal: ArrayView2<f64>,
    bank: &FilterBank,
    params: &ScatteringParams,
    backend: &B,
) -> Result<ScatteringOutput, ScatteringError> {
    validate_signal(&signal, bank)?;
    let plan = CascadePlan::new(bank, params)?;
    run_cascade(signal, bank, &plan, params.parallel, backend)
}

/// Same as [`scattering1d`] for a (batch, 1, length) signal
pub fn scattering1d_channels<B: SpectralBackend>(
    signal: ArrayView3<f64>,
    bank: &FilterBank,
    params: &ScatteringParams,
    backend: &B,
) -> Result<ScatteringOutput, ScatteringError> {
    let channels = signal.len_of(Axis(1));
    if channels != 1 {
        return Err(ScatteringError::InvalidChannels(channels));
    }
    scattering1d(signal.index_axis(Axis(1), 0), bank, params, backend)
}

/// Reusable transform: a validated bank, its schedule and planned FFTs
#[derive(Debug, Clone)]
pub struct Scattering1D {
    bank: FilterBank,
    params: ScatteringParams,
    plan: CascadePlan,
    backend: RustFftBackend,
}

impl Scattering1D {
    pub fn new(bank: FilterBank, params: ScatteringParams) -> Result<Self, ScatteringError> {
        let plan = CascadePlan::new(&bank, &params)?;
        let backend = RustFftBackend::for_length(bank.length());
        Ok(Self {
            bank,
            params,
            plan,
            backend,
        })
    }

    pub fn transform(&self, signal: ArrayView2<f64>) -> Result<ScatteringOutput, ScatteringError> {
        validate_signal(&signal, &self.bank)?;
        run_cascade(signal, &self.bank, &self.plan, self.params.parallel, &self.backend)
    }

    pub fn bank(&self) -> &FilterBank {
        &self.bank
    }

    pub fn params(&self) -> &ScatteringParams {
        &self.params
    }

    pub fn plan(&self) -> &CascadePlan {
        &self.plan
    }

    /// Temporal length shared by every path, when averaging
    pub fn output_length(&self) -> Option<usize> {
        if self.params.average_local {
            Some(self.bank.length() >> self.params.log2_stride)
        } else {
            None
        }
    }
}

fn validate_signal(signal: &ArrayView2<f64>, bank: &FilterBank) -> Result<(), ScatteringError> {
    let (batch, length) = signal.dim();
    if batch == 0 {
        return Err(ScatteringError::EmptyBatch);
    }
    log2_exact(length)?;
    if length != bank.length() {
        return Err(ScatteringError::SignalLengthMismatch {
            signal: length,
            filters: bank.length(),
        });
    }
    Ok(())
}

fn run_cascade<B: SpectralBackend>(
    signal: ArrayView2<f64>,
    bank: &FilterBank,
    plan: &CascadePlan,
    parallel: bool,
    backend: &B,
) -> Result<ScatteringOutput, ScatteringError> {
    debug!(
        batch = signal.nrows(),
        length = signal.ncols(),
        paths = plan.num_paths(),
        parallel,
        "scattering1d start"
    );

    // Computed once, shared by all orders
    let u0_hat: SharedSpectrum = Arc::new(backend.rfft(&signal));

    let mut assembler = PathAssembler::new();
    let mut retained: Vec<SharedSpectrum> = Vec::new();
    let mut stage = CascadeStage::Order0;

    while stage != CascadeStage::Done {
        match stage {
            CascadeStage::Order0 => {
                let s0 = low_pass(backend, bank, &u0_hat.view(), &plan.zeroth)?;
                trace!(path = %ScatteringPath::Zeroth, len = s0.ncols(), "order 0");
                assembler.insert(ScatteringCoefficient {
                    path: ScatteringPath::Zeroth,
                    depths: Vec::new(),
                    coef: s0,
                })?;
            }
            CascadeStage::Order1 => {
                let results = fan_out(&plan.first, parallel, |fp| {
                    first_order(backend, bank, &u0_hat, fp, plan.retain_first_order)
                })?;
                for (coefficient, spectrum) in results {
                    assembler.insert(coefficient)?;
                    if let Some(spectrum) = spectrum {
                        retained.push(spectrum);
                    }
                }
            }
            CascadeStage::Order2 => {
                let results = fan_out(&plan.second, parallel, |sp| {
                    second_order(backend, bank, &retained[sp.n1], sp)
                })?;
                assembler.extend(results)?;
            }
            CascadeStage::Done => {}
        }
        stage = stage.next(plan.retain_first_order);
    }

    let output = assembler.finish();
    debug!(
        paths = output.len(),
        first_order = output.num_first_order(),
        second_order = output.num_second_order(),
        "scattering1d done"
    );
    Ok(output)
}

/// Map `f` over `items`, on the rayon pool when `parallel`
///
/// Results keep the order of `items` either way.
fn fan_out<T, R, F>(items: &[T], parallel: bool, f: F) -> Result<Vec<R>, ScatteringError>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R, ScatteringError> + Sync + Send,
{
    if parallel {
        items.par_iter().map(&f).collect()
    } else {
        items.iter().map(&f).collect()
    }
}

/// Filter, subsample and return to the time domain
fn filter_stage<B: SpectralBackend>(
    backend: &B,
    bank: &FilterBank,
    spectrum: &ArrayView2<Complex64>,
    stage: &StagePlan,
) -> Result<Array2<Complex64>, ScatteringError> {
    let filter = bank.level(stage.filter, stage.level)?;
    let filtered = backend.cdgmm(spectrum, &filter);
    let subsampled = backend.subsample_fourier(&filtered.view(), stage.log2_subsample);
    Ok(backend.ifft(&subsampled.view()))
}

/// `|ifft(subsample(spectrum * psi))|`
fn band_pass_modulus<B: SpectralBackend>(
    backend: &B,
    bank: &FilterBank,
    spectrum: &ArrayView2<Complex64>,
    stage: &StagePlan,
) -> Result<Array2<f64>, ScatteringError> {
    let u = filter_stage(backend, bank, spectrum, stage)?;
    Ok(backend.modulus(&u.view()))
}

/// `Re(ifft(subsample(spectrum * phi)))`
fn low_pass<B: SpectralBackend>(
    backend: &B,
    bank: &FilterBank,
    spectrum: &ArrayView2<Complex64>,
    stage: &StagePlan,
) -> Result<Array2<f64>, ScatteringError> {
    let s = filter_stage(backend, bank, spectrum, stage)?;
    Ok(backend.real_part(&s.view()))
}

fn first_order<B: SpectralBackend>(
    backend: &B,
    bank: &FilterBank,
    u0_hat: &Array2<Complex64>,
    plan: &FirstOrderPlan,
    retain: bool,
) -> Result<(ScatteringCoefficient, Option<SharedSpectrum>), ScatteringError> {
    let u1 = band_pass_modulus(backend, bank, &u0_hat.view(), &plan.band)?;

    // Unaveraged |x * psi1| spectrum, input of the second order
    let u1_hat = if plan.average.is_some() || retain {
        Some(backend.rfft(&u1.view()))
    } else {
        None
    };

    let coef = match (&plan.average, &u1_hat) {
        (Some(average), Some(hat)) => low_pass(backend, bank, &hat.view(), average)?,
        _ => u1,
    };
    trace!(path = %plan.path(), k1 = plan.band.log2_subsample, len = coef.ncols(), "order 1");

    let coefficient = ScatteringCoefficient {
        path: plan.path(),
        depths: vec![plan.j1],
        coef,
    };
    let spectrum = if retain { u1_hat.map(Arc::new) } else { None };
    Ok((coefficient, spectrum))
}

fn second_order<B: SpectralBackend>(
    backend: &B,
    bank: &FilterBank,
    u1_hat: &Array2<Complex64>,
    plan: &SecondOrderPlan,
) -> Result<ScatteringCoefficient, ScatteringError> {
    let u2 = band_pass_modulus(backend, bank, &u1_hat.view(), &plan.band)?;

    let coef = match &plan.average {
        Some(average) => {
            let u2_hat = backend.rfft(&u2.view());
            low_pass(backend, bank, &u2_hat.view(), average)?
        }
        None => u2,
    };
    trace!(path = %plan.path(), k2 = plan.band.log2_subsample, len = coef.ncols(), "order 2");

    Ok(ScatteringCoefficient {
        path: plan.path(),
        depths: vec![plan.j1, plan.j2],
        coef,
    })
}
