//! Shared types for the scattering cascade
//!
//! Paths, orders, parameters, filter identifiers and the error taxonomy.

use ndarray::Array2;
use std::fmt;

// ============================================================================
// Scattering paths
// ============================================================================

/// Depth of filter composition
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScatteringOrder {
    /// Plain low-pass averaging
    Zero,
    /// One band-pass stage
    One,
    /// Two cascaded band-pass stages
    Two,
}

impl ScatteringOrder {
    pub fn as_usize(self) -> usize {
        match self {
            ScatteringOrder::Zero => 0,
            ScatteringOrder::One => 1,
            ScatteringOrder::Two => 2,
        }
    }
}

/// Sequence of band-pass filter indices that produced one output
///
/// The derived `Ord` is the canonical output order: the order-0 path first,
/// then order-1 paths by `n1`, then order-2 paths by `(n1, n2)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScatteringPath {
    Zeroth,
    First(usize),
    Second(usize, usize),
}

impl ScatteringPath {
    pub fn order(&self) -> ScatteringOrder {
        match self {
            ScatteringPath::Zeroth => ScatteringOrder::Zero,
            ScatteringPath::First(_) => ScatteringOrder::One,
            ScatteringPath::Second(_, _) => ScatteringOrder::Two,
        }
    }

    /// Filter indices as a tuple-like vector (`[]`, `[n1]` or `[n1, n2]`)
    pub fn indices(&self) -> Vec<usize> {
        match *self {
            ScatteringPath::Zeroth => Vec::new(),
            ScatteringPath::First(n1) => vec![n1],
            ScatteringPath::Second(n1, n2) => vec![n1, n2],
        }
    }
}

impl fmt::Display for ScatteringPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScatteringPath::Zeroth => write!(f, "()"),
            ScatteringPath::First(n1) => write!(f, "({},)", n1),
            ScatteringPath::Second(n1, n2) => write!(f, "({}, {})", n1, n2),
        }
    }
}

/// One entry of the output collection
#[derive(Debug, Clone)]
pub struct ScatteringCoefficient {
    pub path: ScatteringPath,
    /// Intrinsic depths `j` of the band-pass filters along the path
    pub depths: Vec<usize>,
    /// Real coefficients, shape (batch, time)
    pub coef: Array2<f64>,
}

impl ScatteringCoefficient {
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.coef.nrows()
    }

    #[inline]
    pub fn temporal_len(&self) -> usize {
        self.coef.ncols()
    }
}

// ============================================================================
// Filter identifiers
// ============================================================================

/// Address of a filter inside a [`FilterBank`](super::FilterBank)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterId {
    /// The low-pass filter
    Phi,
    /// First-order band-pass filter `n1`
    Psi1(usize),
    /// Second-order band-pass filter `n2`
    Psi2(usize),
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterId::Phi => write!(f, "phi"),
            FilterId::Psi1(n) => write!(f, "psi1[{}]", n),
            FilterId::Psi2(n) => write!(f, "psi2[{}]", n),
        }
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Per-call parameters, applied uniformly to every path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScatteringParams {
    /// Output temporal stride is `2^log2_stride`
    pub log2_stride: usize,
    /// Low-pass average each path before returning it
    pub average_local: bool,
    /// Fan paths out over the rayon pool
    pub parallel: bool,
}

impl ScatteringParams {
    pub fn new(log2_stride: usize, average_local: bool) -> Self {
        Self {
            log2_stride,
            average_local,
            parallel: true,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check the stride against a signal of length `2^log2_length`
    pub fn validate(&self, log2_length: usize) -> Result<(), ScatteringError> {
        if self.log2_stride > log2_length {
            return Err(ScatteringError::StrideExceedsDepth {
                log2_stride: self.log2_stride,
                max: log2_length,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Broad class of a [`ScatteringError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Filter bank or parameters cannot serve the request
    Configuration,
    /// Input or filter shapes are inconsistent
    Shape,
}

/// Scattering transform errors
///
/// Every error is deterministic; the transform is aborted and no partial
/// output is returned.
#[derive(Debug, thiserror::Error)]
pub enum ScatteringError {
    #[error("Signal length {0} is not a power of two")]
    NotPowerOfTwo(usize),

    #[error("Signal batch is empty")]
    EmptyBatch,

    #[error("Signal has {0} channels, expected 1")]
    InvalidChannels(usize),

    #[error("Signal length {signal} does not match filter bank length {filters}")]
    SignalLengthMismatch { signal: usize, filters: usize },

    #[error("{filter} level {level} has {actual} coefficients, expected {expected}")]
    FilterLengthMismatch {
        filter: FilterId,
        level: usize,
        expected: usize,
        actual: usize,
    },

    #[error("log2_stride = {log2_stride} exceeds signal depth {max}")]
    StrideExceedsDepth { log2_stride: usize, max: usize },

    #[error("{filter} has no level {level} ({available} levels available)")]
    MissingLevel {
        filter: FilterId,
        level: usize,
        available: usize,
    },

    #[error("Subsampling by 2^{exponent} after {filter} exceeds signal depth {max}")]
    SubsamplingExceedsDepth {
        filter: FilterId,
        exponent: usize,
        max: usize,
    },

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    #[error("Path {0} was produced twice")]
    DuplicatePath(ScatteringPath),

    #[error("Paths have uneven temporal lengths ({min} to {max})")]
    UnevenPathLengths { min: usize, max: usize },
}

impl ScatteringError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScatteringError::StrideExceedsDepth { .. }
            | ScatteringError::MissingLevel { .. }
            | ScatteringError::SubsamplingExceedsDepth { .. }
            | ScatteringError::InvalidParameter { .. }
            | ScatteringError::DuplicatePath(_) => ErrorKind::Configuration,
            ScatteringError::NotPowerOfTwo(_)
            | ScatteringError::EmptyBatch
            | ScatteringError::InvalidChannels(_)
            | ScatteringError::SignalLengthMismatch { .. }
            | ScatteringError::FilterLengthMismatch { .. }
            | ScatteringError::UnevenPathLengths { .. } => ErrorKind::Shape,
        }
    }
}

/// `log2(n)` for a power-of-two `n`
pub fn log2_exact(n: usize) -> Result<usize, ScatteringError> {
    if n == 0 || !n.is_power_of_two() {
        return Err(ScatteringError::NotPowerOfTwo(n));
    }
    Ok(n.trailing_zeros() as usize)
}
