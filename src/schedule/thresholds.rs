/// Default number of threshold buckets.
pub const DEFAULT_SLOPE_BUCKETS: usize = 25;

/// Largest compression slope a codestream can carry (16-bit COM values).
pub const MAX_SLOPE: f64 = 65535.0;

/// Smallest fraction the unit-interval thresholds resolve.
const UNIT_FLOOR: f64 = 1.0 / 1024.0;

/// Log-spaced thresholds that discretize a continuous value into buckets.
///
/// `bucket(v)` counts the thresholds not above `v`, so it runs from 0 for
/// values below the first threshold to `len()` for values at or above the
/// last one.
#[derive(Debug, Clone, PartialEq)]
pub struct SlopeThresholds {
    values: Vec<f64>,
}

impl SlopeThresholds {
    /// `count` thresholds spaced evenly on a log scale over `[min, max]`.
    pub fn log_spaced(count: usize, min: f64, max: f64) -> Self {
        let count = count.max(1);
        let (min, max) = (min.max(f64::MIN_POSITIVE), max.max(min));
        let values = if count == 1 {
            vec![max]
        } else {
            let ratio = (max / min).ln();
            (0..count)
                .map(|i| min * (ratio * i as f64 / (count - 1) as f64).exp())
                .collect()
        };
        Self { values }
    }

    /// Thresholds over the compression slope range `[1, 65535]`.
    pub fn slopes(count: usize) -> Self {
        Self::log_spaced(count, 1.0, MAX_SLOPE)
    }

    /// Thresholds over fractions in `(0, 1]`.
    pub fn unit(count: usize) -> Self {
        Self::log_spaced(count, UNIT_FLOOR, 1.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn bucket(&self, value: f64) -> usize {
        // Small relative slack so values computed at a threshold land on it
        let value = value * (1.0 + 1e-12);
        self.values.partition_point(|&t| t <= value)
    }

    /// `1 - bucket(v) / len`: 0 for a full value, 1 for a negligible one.
    pub fn penalty(&self, value: f64) -> f64 {
        1.0 - self.bucket(value) as f64 / self.len() as f64
    }
}

impl Default for SlopeThresholds {
    fn default() -> Self {
        Self::slopes(DEFAULT_SLOPE_BUCKETS)
    }
}
