//! Streaming per-topic statistics
//!
//! Implements Welford's online mean/variance update so a topic's summary can
//! be computed in a single pass over scores, in O(1) state, without the
//! catastrophic cancellation that naive sum/sum-of-squares accumulation
//! suffers at large sample counts.

/// Running per-topic accumulator, rebuilt fresh every run.
///
/// Owned exclusively by the aggregator task: no other task reads or writes
/// one of these, so the hot update path needs no locking.
#[derive(Debug, Clone, Default)]
pub struct RunningAggregate {
    /// Number of samples folded so far
    pub count: i64,

    /// Running mean of all folded scores
    pub mean: f64,

    /// Sum of squared deltas from the running mean (Welford's M2 term)
    pub sum_squared_delta: f64,

    /// Highest post id observed across folded samples (the checkpoint)
    pub max_post_id_seen: i64,

    /// Normalized topic display name, recorded on fold
    pub topic: String,

    /// Search query text, recorded on fold
    pub query: String,
}

/// Reportable statistics derived from a finished accumulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalizedStats {
    pub mean: f64,
    /// Sample variance with Bessel's correction; 0.0 when count < 2
    pub variance: f64,
    /// Square root of the sample variance; 0.0 when count < 2
    pub std_dev: f64,
}

impl RunningAggregate {
    /// Fold one score into the accumulator.
    ///
    /// `mean += delta / count` followed by the M2 update against both the
    /// old and new mean. Fold order affects the result only up to
    /// floating-point rounding.
    pub fn fold(&mut self, sample: f32) {
        let sample = f64::from(sample);
        self.count += 1;
        let old_mean = self.mean;
        self.mean += (sample - old_mean) / self.count as f64;
        self.sum_squared_delta += (sample - old_mean) * (sample - self.mean);
    }

    /// Raise the checkpoint if this post id exceeds it.
    ///
    /// Max is commutative, so the checkpoint is deterministic regardless of
    /// arrival order.
    pub fn observe_post_id(&mut self, post_id: i64) {
        if post_id > self.max_post_id_seen {
            self.max_post_id_seen = post_id;
        }
    }

    /// Bessel-corrected sample variance, or None when fewer than two
    /// samples have been folded (the count − 1 division is never performed
    /// in that case).
    pub fn sample_variance(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }
        Some(self.sum_squared_delta / (self.count - 1) as f64)
    }

    /// Convert the intermediate accumulator into reportable statistics.
    ///
    /// The mean is valid once count ≥ 1; variance and std-dev fall back to
    /// 0.0 for a single sample.
    pub fn finalize(&self) -> FinalizedStats {
        let variance = self.sample_variance().unwrap_or(0.0);
        FinalizedStats {
            mean: self.mean,
            variance,
            std_dev: variance.sqrt(),
        }
    }
}
