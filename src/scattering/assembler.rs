//! Output assembly
//!
//! Collects per-path coefficients keyed by [`ScatteringPath`]. The map keeps
//! the canonical order no matter in which order the parallel fan-out
//! delivers results.

use ndarray::{s, Array3};
use std::collections::btree_map::{self, BTreeMap};

use super::types::{ScatteringCoefficient, ScatteringError, ScatteringOrder, ScatteringPath};

#[derive(Debug, Default)]
pub struct PathAssembler {
    paths: BTreeMap<ScatteringPath, ScatteringCoefficient>,
}

impl PathAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one path; a path may only be produced once
    pub fn insert(&mut self, coefficient: ScatteringCoefficient) -> Result<(), ScatteringError> {
        match self.paths.entry(coefficient.path) {
            btree_map::Entry::Occupied(entry) => Err(ScatteringError::DuplicatePath(*entry.key())),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(coefficient);
                Ok(())
            }
        }
    }

    pub fn extend<I>(&mut self, coefficients: I) -> Result<(), ScatteringError>
    where
        I: IntoIterator<Item = ScatteringCoefficient>,
    {
        for coefficient in coefficients {
            self.insert(coefficient)?;
        }
        Ok(())
    }

    pub fn finish(self) -> ScatteringOutput {
        ScatteringOutput { paths: self.paths }
    }
}

/// Ordered collection of scattering coefficients
#[derive(Debug, Clone)]
pub struct ScatteringOutput {
    paths: BTreeMap<ScatteringPath, ScatteringCoefficient>,
}

impl ScatteringOutput {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn get(&self, path: &ScatteringPath) -> Option<&ScatteringCoefficient> {
        self.paths.get(path)
    }

    /// Coefficients in canonical path order
    pub fn iter(&self) -> impl Iterator<Item = &ScatteringCoefficient> {
        self.paths.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &ScatteringPath> {
        self.paths.keys()
    }

    /// Coefficients of one scattering order
    pub fn order(&self, order: ScatteringOrder) -> impl Iterator<Item = &ScatteringCoefficient> {
        self.paths.values().filter(move |c| c.path.order() == order)
    }

    pub fn num_first_order(&self) -> usize {
        self.order(ScatteringOrder::One).count()
    }

    pub fn num_second_order(&self) -> usize {
        self.order(ScatteringOrder::Two).count()
    }

    /// Stack every path into a (batch, n_paths, time) array
    ///
    /// Requires a common temporal length, which holds for locally averaged
    /// transforms.
    pub fn to_array(&self) -> Result<Array3<f64>, ScatteringError> {
        let first = match self.paths.values().next() {
            Some(c) => c,
            None => return Ok(Array3::zeros((0, 0, 0))),
        };

        let lengths = self.paths.values().map(|c| c.temporal_len());
        let min = lengths.clone().min().unwrap_or(0);
        let max = lengths.max().unwrap_or(0);
        if min != max {
            return Err(ScatteringError::UnevenPathLengths { min, max });
        }

        let batch = first.batch_size();
        let mut out = Array3::zeros((batch, self.paths.len(), max));
        for (i, c) in self.paths.values().enumerate() {
            out.slice_mut(s![.., i, ..]).assign(&c.coef);
        }
        Ok(out)
    }

    pub fn into_coefficients(self) -> Vec<ScatteringCoefficient> {
        self.paths.into_values().collect()
    }
}

impl<'a> IntoIterator for &'a ScatteringOutput {
    type Item = &'a ScatteringCoefficient;
    type IntoIter = btree_map::Values<'a, ScatteringPath, ScatteringCoefficient>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn coef(path: ScatteringPath, batch: usize, len: usize, value: f64) -> ScatteringCoefficient {
        ScatteringCoefficient {
            path,
            depths: path.indices(),
            coef: Array2::from_elem((batch, len), value),
        }
    }

    #[test]
    fn test_assembler_canonical_order() {
        let mut assembler = PathAssembler::new();
        assembler
            .extend(vec![
                coef(ScatteringPath::Second(0, 2), 1, 4, 4.0),
                coef(ScatteringPath::First(1), 1, 4, 2.0),
                coef(ScatteringPath::Zeroth, 1, 4, 0.0),
                coef(ScatteringPath::First(0), 1, 4, 1.0),
            ])
            .unwrap();
        let output = assembler.finish();

        let order: Vec<ScatteringPath> = output.paths().copied().collect();
        assert_eq!(
            order,
            vec![
                ScatteringPath::Zeroth,
                ScatteringPath::First(0),
                ScatteringPath::First(1),
                ScatteringPath::Second(0, 2),
            ]
        );
        assert_eq!(output.num_first_order(), 2);
        assert_eq!(output.num_second_order(), 1);
    }

    #[test]
    fn test_assembler_rejects_duplicates() {
        let mut assembler = PathAssembler::new();
        assembler.insert(coef(ScatteringPath::First(3), 1, 2, 0.0)).unwrap();
        let err = assembler
            .insert(coef(ScatteringPath::First(3), 1, 2, 1.0))
            .unwrap_err();
        assert!(matches!(err, ScatteringError::DuplicatePath(ScatteringPath::First(3))));
    }

    #[test]
    fn test_to_array_stacks_paths() {
        let mut assembler = PathAssembler::new();
        assembler.insert(coef(ScatteringPath::First(0), 2, 3, 1.0)).unwrap();
        assembler.insert(coef(ScatteringPath::Zeroth, 2, 3, 5.0)).unwrap();
        let stacked = assembler.finish().to_array().unwrap();

        assert_eq!(stacked.shape(), &[2, 2, 3]);
        assert_eq!(stacked[[1, 0, 2]], 5.0);
        assert_eq!(stacked[[0, 1, 0]], 1.0);
    }

    #[test]
    fn test_to_array_rejects_uneven_lengths() {
        let mut assembler = PathAssembler::new();
        assembler.insert(coef(ScatteringPath::Zeroth, 1, 8, 0.0)).unwrap();
        assembler.insert(coef(ScatteringPath::First(0), 1, 2, 0.0)).unwrap();
        let err = assembler.finish().to_array().unwrap_err();
        assert!(matches!(err, ScatteringError::UnevenPathLengths { min: 2, max: 8 }));
    }
}
