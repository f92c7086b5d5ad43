//! Stride/level policy
//!
//! Decides, for every path, how much to subsample after each band-pass stage,
//! which level of each filter matches the signal it is applied to, and how much
//! residual subsampling the final averaging needs. The whole cascade is
//! resolved up front so a bank that is too shallow fails before any transform
//! runs.

use tracing::debug;

use super::filter_bank::FilterBank;
use super::types::{FilterId, ScatteringError, ScatteringParams, ScatteringPath};

/// Subsampling exponent to apply after a filter of intrinsic depth `j`
///
/// Averaged paths never go below the requested output resolution; unaveraged
/// paths use the filter's full decimation.
#[inline]
pub fn subsampling_exponent(j: usize, log2_stride: usize, average_local: bool) -> usize {
    if average_local {
        j.min(log2_stride)
    } else {
        j
    }
}

/// One band-pass (or low-pass) application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePlan {
    pub filter: FilterId,
    /// Level of `filter` to fetch, equal to the subsampling already applied
    pub level: usize,
    /// Subsampling exponent applied after filtering
    pub log2_subsample: usize,
}

impl StagePlan {
    /// Cumulative subsampling after this stage
    #[inline]
    pub fn cumulative(&self) -> usize {
        self.level + self.log2_subsample
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirstOrderPlan {
    pub n1: usize,
    pub j1: usize,
    pub band: StagePlan,
    /// Low-pass averaging, present when `average_local`
    pub average: Option<StagePlan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondOrderPlan {
    pub n1: usize,
    pub n2: usize,
    pub j1: usize,
    pub j2: usize,
    pub band: StagePlan,
    pub average: Option<StagePlan>,
}

impl FirstOrderPlan {
    pub fn path(&self) -> ScatteringPath {
        ScatteringPath::First(self.n1)
    }
}

impl SecondOrderPlan {
    pub fn path(&self) -> ScatteringPath {
        ScatteringPath::Second(self.n1, self.n2)
    }
}

/// Fully resolved schedule for one transform call
#[derive(Debug, Clone)]
pub struct CascadePlan {
    pub zeroth: StagePlan,
    pub first: Vec<FirstOrderPlan>,
    /// Grouped by `n1`, then `n2`
    pub second: Vec<SecondOrderPlan>,
    /// Whether order-1 spectra must be kept for the second order
    pub retain_first_order: bool,
}

impl CascadePlan {
    pub fn new(bank: &FilterBank, params: &ScatteringParams) -> Result<Self, ScatteringError> {
        let max = bank.log2_length();
        params.validate(max)?;

        let s = params.log2_stride;
        let average = params.average_local;

        let phi_j = filter_depth(bank, FilterId::Phi)?;
        let zeroth = checked_stage(
            bank,
            FilterId::Phi,
            0,
            if average { s } else { phi_j },
        )?;

        let mut first = Vec::with_capacity(bank.num_first_order());
        for n1 in 0..bank.num_first_order() {
            let id = FilterId::Psi1(n1);
            let j1 = filter_depth(bank, id)?;
            let band = checked_stage(bank, id, 0, subsampling_exponent(j1, s, average))?;
            let averaging = averaging_stage(bank, &band, params)?;
            first.push(FirstOrderPlan {
                n1,
                j1,
                band,
                average: averaging,
            });
        }

        let mut second = Vec::new();
        for fp in &first {
            for n2 in 0..bank.num_second_order() {
                let id = FilterId::Psi2(n2);
                let j2 = filter_depth(bank, id)?;
                if j2 <= fp.j1 {
                    continue;
                }
                let k1 = fp.band.cumulative();
                let k2 = subsampling_exponent(j2, s, average) - k1;
                let band = checked_stage(bank, id, k1, k2)?;
                let averaging = averaging_stage(bank, &band, params)?;
                second.push(SecondOrderPlan {
                    n1: fp.n1,
                    n2,
                    j1: fp.j1,
                    j2,
                    band,
                    average: averaging,
                });
            }
        }

        debug!(
            log2_length = max,
            log2_stride = s,
            average_local = average,
            first_order = first.len(),
            second_order = second.len(),
            "resolved cascade plan"
        );

        Ok(Self {
            zeroth,
            first,
            retain_first_order: bank.has_second_order(),
            second,
        })
    }

    /// Number of output paths, order 0 included
    pub fn num_paths(&self) -> usize {
        1 + self.first.len() + self.second.len()
    }
}

fn filter_depth(bank: &FilterBank, id: FilterId) -> Result<usize, ScatteringError> {
    bank.info(id)
        .map(|info| info.j)
        .ok_or(ScatteringError::MissingLevel {
            filter: id,
            level: 0,
            available: 0,
        })
}

/// Build a stage, checking that the level exists and the signal is deep enough
fn checked_stage(
    bank: &FilterBank,
    filter: FilterId,
    level: usize,
    log2_subsample: usize,
) -> Result<StagePlan, ScatteringError> {
    bank.level(filter, level)?;
    let stage = StagePlan {
        filter,
        level,
        log2_subsample,
    };
    if stage.cumulative() > bank.log2_length() {
        return Err(ScatteringError::SubsamplingExceedsDepth {
            filter,
            exponent: stage.cumulative(),
            max: bank.log2_length(),
        });
    }
    Ok(stage)
}

/// Final low-pass stage bringing a band-pass output down to `log2_stride`
fn averaging_stage(
    bank: &FilterBank,
    band: &StagePlan,
    params: &ScatteringParams,
) -> Result<Option<StagePlan>, ScatteringError> {
    if !params.average_local {
        return Ok(None);
    }
    let k = band.cumulative();
    // k <= log2_stride holds by construction of subsampling_exponent
    let residual = params.log2_stride.saturating_sub(k);
    checked_stage(bank, FilterId::Phi, k, residual).map(Some)
}
