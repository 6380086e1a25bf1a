use crate::evaluation::estimators::Estimator;

/// Streaming mean that ignores NaN observations.
///
/// Returns NaN until a non-NaN value has been seen.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipNanMean {
    len: f64,
    sum: f64,
}

impl Estimator for SkipNanMean {
    #[inline]
    fn add(&mut self, v: f64) {
        if v.is_nan() {
            return;
        }
        self.len += 1.0;
        self.sum += v;
    }

    #[inline]
    fn estimation(&self) -> f64 {
        if self.len > 0.0 {
            self.sum / self.len
        } else {
            f64::NAN
        }
    }
}

/// Streaming mean where a single NaN makes the result NaN.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrictMean {
    len: f64,
    sum: f64,
}

impl Estimator for StrictMean {
    #[inline]
    fn add(&mut self, v: f64) {
        self.len += 1.0;
        self.sum += v;
    }

    #[inline]
    fn estimation(&self) -> f64 {
        if self.len > 0.0 {
            self.sum / self.len
        } else {
            f64::NAN
        }
    }
}
