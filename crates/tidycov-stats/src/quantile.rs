//! Order statistics over sparse samples.
//!
//! A sample is the sorted explicit values of one covariate plus a count of
//! implicit zeros. The zeros are never materialized: index lookups route
//! around them at the position where 0 sorts among the explicit values.

/// A sorted sample with a virtual block of zeros.
#[derive(Debug, Clone, Copy)]
pub struct SparseSample<'a> {
    explicit: &'a [f64],
    zeros: usize,
    zero_offset: usize,
}

impl<'a> SparseSample<'a> {
    /// Wrap sorted explicit values and a number of implicit zeros.
    ///
    /// `explicit` must be sorted ascending.
    pub fn new(explicit: &'a [f64], zeros: usize) -> Self {
        let zero_offset = explicit.partition_point(|v| *v < 0.0);
        Self {
            explicit,
            zeros,
            zero_offset,
        }
    }

    /// Number of values, zeros included.
    pub const fn len(&self) -> usize {
        self.explicit.len() + self.zeros
    }

    /// Whether the sample holds no values at all.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`-th smallest value.
    pub fn get(&self, index: usize) -> Option<f64> {
        if index >= self.len() {
            None
        } else if index < self.zero_offset {
            Some(self.explicit[index])
        } else if index < self.zero_offset + self.zeros {
            Some(0.0)
        } else {
            Some(self.explicit[index - self.zeros])
        }
    }

    /// Smallest value.
    pub fn min(&self) -> Option<f64> {
        self.get(0)
    }

    /// Largest value.
    pub fn max(&self) -> Option<f64> {
        self.len().checked_sub(1).and_then(|last| self.get(last))
    }

    /// Sample quantile with linear interpolation between order statistics
    /// (Hyndman & Fan type 7).
    ///
    /// `h = (n - 1) * p`; the result is `x[floor(h)] + (h - floor(h)) *
    /// (x[floor(h) + 1] - x[floor(h)])`.
    pub fn quantile(&self, p: f64) -> Option<f64> {
        let n = self.len();
        if n == 0 || !(0.0..=1.0).contains(&p) {
            return None;
        }
        let h = (n - 1) as f64 * p;
        let lo = h.floor() as usize;
        let hi = h.ceil() as usize;
        let x_lo = self.get(lo)?;
        let x_hi = self.get(hi)?;
        Some(x_lo + (h - lo as f64) * (x_hi - x_lo))
    }

    /// Mean and sample standard deviation.
    ///
    /// Two passes: the mean first, then squared deviations. The deviation is
    /// 0 when the sample has at most one value.
    pub fn mean_and_sd(&self) -> Option<(f64, f64)> {
        let n = self.len();
        if n == 0 {
            return None;
        }
        let mean = self.explicit.iter().sum::<f64>() / n as f64;
        if n == 1 {
            return Some((mean, 0.0));
        }
        let explicit_ss: f64 = self.explicit.iter().map(|v| (v - mean).powi(2)).sum();
        let zero_ss = self.zeros as f64 * mean * mean;
        let variance = (explicit_ss + zero_ss) / (n - 1) as f64;
        Some((mean, variance.sqrt()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(0.1, 1.4)]
    #[case(0.25, 2.0)]
    #[case(0.5, 3.0)]
    #[case(0.75, 4.0)]
    #[case(0.9, 4.6)]
    #[case(1.0, 5.0)]
    fn test_type7_quantiles(#[case] p: f64, #[case] expected: f64) {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sample = SparseSample::new(&values, 0);
        assert_relative_eq!(sample.quantile(p).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_block_sorts_between_signs() {
        let values = [-2.0, -1.0, 3.0];
        let sample = SparseSample::new(&values, 2);
        let all: Vec<f64> = (0..sample.len()).filter_map(|i| sample.get(i)).collect();
        assert_eq!(all, vec![-2.0, -1.0, 0.0, 0.0, 3.0]);
        assert_eq!(sample.min(), Some(-2.0));
        assert_eq!(sample.max(), Some(3.0));
        assert_eq!(sample.quantile(0.5), Some(0.0));
    }

    #[test]
    fn test_zeros_match_materialized_sample() {
        let explicit = [2.0, 4.0, 6.0];
        let sparse = SparseSample::new(&explicit, 7);
        let dense_values = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 4.0, 6.0];
        let dense = SparseSample::new(&dense_values, 0);

        for p in [0.1, 0.25, 0.5, 0.75, 0.9] {
            assert_relative_eq!(sparse.quantile(p).unwrap(), dense.quantile(p).unwrap());
        }
        let (mean, sd) = sparse.mean_and_sd().unwrap();
        let (dense_mean, dense_sd) = dense.mean_and_sd().unwrap();
        assert_relative_eq!(mean, dense_mean);
        assert_relative_eq!(sd, dense_sd, epsilon = 1e-12);
    }

    #[test]
    fn test_sample_standard_deviation() {
        let values = [2.0, 4.0, 6.0];
        let (mean, sd) = SparseSample::new(&values, 0).mean_and_sd().unwrap();
        assert_relative_eq!(mean, 4.0);
        assert_relative_eq!(sd, 2.0);
    }

    #[test]
    fn test_single_value_has_zero_sd() {
        let values = [7.5];
        assert_eq!(SparseSample::new(&values, 0).mean_and_sd(), Some((7.5, 0.0)));
    }

    #[test]
    fn test_empty_sample() {
        let sample = SparseSample::new(&[], 0);
        assert!(sample.is_empty());
        assert_eq!(sample.quantile(0.5), None);
        assert_eq!(sample.mean_and_sd(), None);
        assert_eq!(sample.max(), None);
    }
}
