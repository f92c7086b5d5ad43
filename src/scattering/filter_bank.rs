//! Filter bank storage
//!
//! Filters arrive as `{ j, xi, sigma, levels }` records. The bank packs every
//! level of every filter into one contiguous arena addressed by
//! `(FilterId, level)`, where level `L` holds `length / 2^L` coefficients.

use ndarray::{Array1, ArrayView1};

use super::types::{log2_exact, FilterId, ScatteringError};

/// A frequency-domain filter at every precomputed resolution
#[derive(Debug, Clone)]
pub struct Filter {
    /// Intrinsic log2 decimation depth
    pub j: usize,
    /// Center frequency (0 for the low-pass)
    pub xi: f64,
    /// Bandwidth
    pub sigma: f64,
    /// `levels[L]` is the response adapted to a signal subsampled by `2^L`
    pub levels: Vec<Array1<f64>>,
}

impl Filter {
    pub fn new(j: usize, xi: f64, sigma: f64, levels: Vec<Array1<f64>>) -> Self {
        Self { j, xi, sigma, levels }
    }

    /// Build the level table from a full-resolution response
    ///
    /// Level `L` for `L` in `0..=depth` is the response periodized over
    /// `2^L` periods (see [`periodize_filter_fourier`]).
    pub fn from_full_resolution(
        j: usize,
        xi: f64,
        sigma: f64,
        response: &Array1<f64>,
        depth: usize,
    ) -> Result<Self, ScatteringError> {
        let log2_n = log2_exact(response.len())?;
        if depth > log2_n {
            return Err(ScatteringError::InvalidParameter {
                name: "depth".to_string(),
                value: depth.to_string(),
            });
        }

        let levels = (0..=depth)
            .map(|level| periodize_filter_fourier(&response.view(), 1 << level))
            .collect();

        Ok(Self::new(j, xi, sigma, levels))
    }
}

/// Fold a frequency response onto `len / nperiods` bins
///
/// Bin `m` of the result is the sum of bins `m + p * len / nperiods`. A signal
/// decimated by `nperiods` sees exactly these aliased copies, so the DC gain of
/// a band-limited low-pass is preserved.
pub fn periodize_filter_fourier(h: &ArrayView1<f64>, nperiods: usize) -> Array1<f64> {
    let out_len = h.len() / nperiods;
    let mut v = Array1::zeros(out_len);
    for (i, &x) in h.iter().enumerate() {
        v[i % out_len] += x;
    }
    v
}

#[derive(Debug, Clone, Copy)]
struct FilterMeta {
    j: usize,
    xi: f64,
    sigma: f64,
    /// Index of level 0 in `FilterBank::offsets`
    first_slot: usize,
    num_levels: usize,
}

/// Read-only view of one filter's attributes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterInfo {
    pub j: usize,
    pub xi: f64,
    pub sigma: f64,
    pub num_levels: usize,
}

/// Immutable table of the low-pass and the first/second order band-pass filters
#[derive(Debug, Clone)]
pub struct FilterBank {
    length: usize,
    log2_length: usize,
    phi: FilterMeta,
    psi1: Vec<FilterMeta>,
    psi2: Vec<FilterMeta>,
    /// Start of each (filter, level) slice in `arena`
    offsets: Vec<usize>,
    arena: Vec<f64>,
}

impl FilterBank {
    /// Validate and pack a filter bank for signals of `length` samples
    ///
    /// Every level must hold exactly `length >> L` coefficients and no filter
    /// may have more than `log2(length) + 1` levels. An empty `psi2` disables
    /// the second order.
    pub fn new(
        length: usize,
        phi: Filter,
        psi1: Vec<Filter>,
        psi2: Vec<Filter>,
    ) -> Result<Self, ScatteringError> {
        let log2_length = log2_exact(length)?;

        let mut bank = Self {
            length,
            log2_length,
            phi: FilterMeta {
                j: 0,
                xi: 0.0,
                sigma: 0.0,
                first_slot: 0,
                num_levels: 0,
            },
            psi1: Vec::with_capacity(psi1.len()),
            psi2: Vec::with_capacity(psi2.len()),
            offsets: Vec::new(),
            arena: Vec::new(),
        };

        bank.phi = bank.pack(FilterId::Phi, phi)?;
        for (n1, filter) in psi1.into_iter().enumerate() {
            let meta = bank.pack(FilterId::Psi1(n1), filter)?;
            bank.psi1.push(meta);
        }
        for (n2, filter) in psi2.into_iter().enumerate() {
            let meta = bank.pack(FilterId::Psi2(n2), filter)?;
            bank.psi2.push(meta);
        }

        Ok(bank)
    }

    fn pack(&mut self, id: FilterId, filter: Filter) -> Result<FilterMeta, ScatteringError> {
        if filter.levels.is_empty() {
            return Err(ScatteringError::MissingLevel {
                filter: id,
                level: 0,
                available: 0,
            });
        }
        if filter.levels.len() > self.log2_length + 1 {
            return Err(ScatteringError::InvalidParameter {
                name: format!("{}.levels", id),
                value: filter.levels.len().to_string(),
            });
        }

        let first_slot = self.offsets.len();
        for (level, values) in filter.levels.iter().enumerate() {
            let expected = self.length >> level;
            if values.len() != expected {
                return Err(ScatteringError::FilterLengthMismatch {
                    filter: id,
                    level,
                    expected,
                    actual: values.len(),
                });
            }
            self.offsets.push(self.arena.len());
            self.arena.extend(values.iter().copied());
        }

        Ok(FilterMeta {
            j: filter.j,
            xi: filter.xi,
            sigma: filter.sigma,
            first_slot,
            num_levels: filter.levels.len(),
        })
    }

    fn meta(&self, id: FilterId) -> Option<&FilterMeta> {
        match id {
            FilterId::Phi => Some(&self.phi),
            FilterId::Psi1(n) => self.psi1.get(n),
            FilterId::Psi2(n) => self.psi2.get(n),
        }
    }

    /// Padded signal length the bank was built for
    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn log2_length(&self) -> usize {
        self.log2_length
    }

    #[inline]
    pub fn num_first_order(&self) -> usize {
        self.psi1.len()
    }

    #[inline]
    pub fn num_second_order(&self) -> usize {
        self.psi2.len()
    }

    #[inline]
    pub fn has_second_order(&self) -> bool {
        !self.psi2.is_empty()
    }

    /// Attributes of a filter, `None` if the index is out of range
    pub fn info(&self, id: FilterId) -> Option<FilterInfo> {
        self.meta(id).map(|m| FilterInfo {
            j: m.j,
            xi: m.xi,
            sigma: m.sigma,
            num_levels: m.num_levels,
        })
    }

    /// Frequency response of `id` at `level`
    pub fn level(&self, id: FilterId, level: usize) -> Result<ArrayView1<'_, f64>, ScatteringError> {
        let meta = self.meta(id).ok_or(ScatteringError::MissingLevel {
            filter: id,
            level,
            available: 0,
        })?;
        if level >= meta.num_levels {
            return Err(ScatteringError::MissingLevel {
                filter: id,
                level,
                available: meta.num_levels,
            });
        }

        let start = self.offsets[meta.first_slot + level];
        let len = self.length >> level;
        Ok(ArrayView1::from(&self.arena[start..start + len]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;

    fn flat(len: usize, levels: usize) -> Vec<Array1<f64>> {
        (0..levels).map(|l| Array1::ones(len >> l)).collect()
    }

    #[test]
    fn test_periodize_sums_aliases() {
        let h = arr1(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let p2 = periodize_filter_fourier(&h.view(), 2);
        assert_eq!(p2.to_vec(), vec![6.0, 8.0, 10.0, 12.0]);
        let p8 = periodize_filter_fourier(&h.view(), 8);
        assert_eq!(p8.to_vec(), vec![36.0]);
    }

    #[test]
    fn test_from_full_resolution_keeps_dc_gain() {
        // Low-pass concentrated around DC: aliases are negligible
        let n = 64;
        let h = Array1::from_shape_fn(n, |m| {
            let w = m.min(n - m) as f64 / n as f64;
            (-w * w / (2.0 * 0.02 * 0.02)).exp()
        });
        let filter = Filter::from_full_resolution(3, 0.0, 0.02, &h, 3).unwrap();
        assert_eq!(filter.levels.len(), 4);
        for (level, values) in filter.levels.iter().enumerate() {
            assert_eq!(values.len(), n >> level);
            assert_relative_eq!(values[0], 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_from_full_resolution_rejects_deep_table() {
        let h = Array1::ones(8);
        assert!(Filter::from_full_resolution(1, 0.0, 1.0, &h, 4).is_err());
    }

    #[test]
    fn test_bank_arena_lookup() {
        let phi = Filter::new(2, 0.0, 0.1, vec![arr1(&[1.0, 0.5, 0.0, 0.5]), arr1(&[1.0, 1.0])]);
        let psi = Filter::new(1, 0.25, 0.1, vec![arr1(&[0.0, 1.0, 0.0, 0.0])]);
        let bank = FilterBank::new(4, phi, vec![psi], vec![]).unwrap();

        assert_eq!(bank.length(), 4);
        assert_eq!(bank.log2_length(), 2);
        assert_eq!(bank.num_first_order(), 1);
        assert!(!bank.has_second_order());

        assert_eq!(bank.level(FilterId::Phi, 1).unwrap().to_vec(), vec![1.0, 1.0]);
        assert_eq!(
            bank.level(FilterId::Psi1(0), 0).unwrap().to_vec(),
            vec![0.0, 1.0, 0.0, 0.0]
        );

        let info = bank.info(FilterId::Psi1(0)).unwrap();
        assert_eq!(info.j, 1);
        assert_eq!(info.num_levels, 1);
        assert!(bank.info(FilterId::Psi2(0)).is_none());
    }

    #[test]
    fn test_bank_missing_level() {
        let bank = FilterBank::new(8, Filter::new(1, 0.0, 0.1, flat(8, 2)), vec![], vec![]).unwrap();
        match bank.level(FilterId::Phi, 2) {
            Err(ScatteringError::MissingLevel { filter, level, available }) => {
                assert_eq!(filter, FilterId::Phi);
                assert_eq!(level, 2);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_bank_rejects_wrong_level_length() {
        let psi = Filter::new(1, 0.25, 0.1, vec![Array1::ones(8), Array1::ones(3)]);
        let err = FilterBank::new(8, Filter::new(1, 0.0, 0.1, flat(8, 1)), vec![psi], vec![])
            .unwrap_err();
        assert!(matches!(
            err,
            ScatteringError::FilterLengthMismatch {
                filter: FilterId::Psi1(0),
                level: 1,
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_bank_rejects_non_power_of_two() {
        let err = FilterBank::new(12, Filter::new(1, 0.0, 0.1, flat(12, 1)), vec![], vec![])
            .unwrap_err();
        assert!(matches!(err, ScatteringError::NotPowerOfTwo(12)));
    }
}
