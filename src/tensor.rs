use crate::error::{Error, Result};

use ndarray::prelude::*;

/// One input stream of the assembled bundle, `(num_samples, window_len, feature_dim)`.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureTensor {
    Dense(Array3<f32>),
    Ids(Array3<String>),
}

impl FeatureTensor {
    pub fn shape(&self) -> &[usize] {
        match self {
            FeatureTensor::Dense(arr) => arr.shape(),
            FeatureTensor::Ids(arr) => arr.shape(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shape()[0]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_dense(&self) -> Option<&Array3<f32>> {
        match self {
            FeatureTensor::Dense(arr) => Some(arr),
            FeatureTensor::Ids(_) => None,
        }
    }

    pub fn as_ids(&self) -> Option<&Array3<String>> {
        match self {
            FeatureTensor::Ids(arr) => Some(arr),
            FeatureTensor::Dense(_) => None,
        }
    }
}

/// Stacks `samples[i][t]` rows into a dense `(n, window_len, dim)` array.
///
/// Every sample must have `window_len` steps and every step the same width as
/// the first one; otherwise the offending `(index, len)` pairs are reported.
pub fn stack_sequences<T, R>(
    field: &'static str,
    samples: &[Vec<R>],
    window_len: usize,
) -> Result<Array3<T>>
where
    T: Clone,
    R: AsRef<[T]>,
{
    let ragged: Vec<_> = samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.len() != window_len)
        .map(|(i, s)| (i, s.len()))
        .collect();

    if !ragged.is_empty() {
        return Err(Error::RaggedField {
            field,
            expected: window_len,
            entries: ragged,
        });
    }

    let dim = samples
        .iter()
        .flat_map(|s| s.iter())
        .next()
        .map_or(0, |row| row.as_ref().len());

    let mut ragged = Vec::new();
    for (i, s) in samples.iter().enumerate() {
        if let Some(row) = s.iter().find(|row| row.as_ref().len() != dim) {
            ragged.push((i, row.as_ref().len()));
        }
    }

    if !ragged.is_empty() {
        return Err(Error::RaggedField {
            field,
            expected: dim,
            entries: ragged,
        });
    }

    let data: Vec<T> = samples
        .iter()
        .flat_map(|s| s.iter())
        .flat_map(|row| row.as_ref().iter().cloned())
        .collect();

    Ok(Array3::from_shape_vec((samples.len(), window_len, dim), data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacks_rows_in_order() {
        let samples = vec![
            vec![[1.0f32, 2.0], [3.0, 4.0]],
            vec![[5.0, 6.0], [7.0, 8.0]],
        ];
        let arr = stack_sequences::<f32, _>("center", &samples, 2).unwrap();

        assert_eq!(arr.shape(), &[2, 2, 2]);
        assert_eq!(arr[[1, 0, 1]], 6.0);
        assert_eq!(arr[[0, 1, 0]], 3.0);
    }

    #[test]
    fn reports_short_sequences() {
        let samples = vec![vec![[0.0f32]; 3], vec![[0.0]; 2], vec![[0.0]; 3], vec![[0.0]; 1]];

        match stack_sequences::<f32, _>("speed", &samples, 3) {
            Err(Error::RaggedField {
                field,
                expected,
                entries,
            }) => {
                assert_eq!(field, "speed");
                assert_eq!(expected, 3);
                assert_eq!(entries, vec![(1, 2), (3, 1)]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn reports_inhomogeneous_feature_width() {
        let samples = vec![vec![vec![0.0f32; 4]], vec![vec![0.0f32; 3]]];

        assert!(matches!(
            stack_sequences::<f32, _>("local_box", &samples, 1),
            Err(Error::RaggedField { expected: 4, ref entries, .. }) if entries == &vec![(1, 3)]
        ));
    }

    #[test]
    fn empty_batch_has_zero_rows() {
        let samples: Vec<Vec<[f32; 4]>> = Vec::new();
        let arr = stack_sequences::<f32, _>("box", &samples, 14).unwrap();

        assert_eq!(arr.shape(), &[0, 14, 0]);
    }
}
