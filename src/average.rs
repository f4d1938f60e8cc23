//! Target histograms: the distribution each picture is matched against.
//!
//! With a window of 0 every picture gets the mean of the whole sequence.
//! Otherwise picture `i` gets the mean over `[i - window, i + window]`,
//! clamped to the ends of the sequence.

use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::histogram::{Channel, Histogram, HIST_SIZE};

/// Bucket-wise running sums, wide enough for long sequences of large images.
struct BucketSums {
    channels: [Vec<u64>; 3],
}

impl BucketSums {
    fn new() -> Self {
        BucketSums {
            channels: std::array::from_fn(|_| vec![0u64; HIST_SIZE]),
        }
    }

    fn add(&mut self, histogram: &Histogram) {
        for c in Channel::ALL {
            for (sum, &n) in self.channels[c.index()].iter_mut().zip(histogram.channel(c)) {
                *sum += n as u64;
            }
        }
    }

    fn subtract(&mut self, histogram: &Histogram) {
        for c in Channel::ALL {
            for (sum, &n) in self.channels[c.index()].iter_mut().zip(histogram.channel(c)) {
                *sum -= n as u64;
            }
        }
    }

    /// Integer mean over `count` contributors; stays all-zero when `count` is 0.
    fn mean(&self, count: usize) -> Histogram {
        let mut mean = Histogram::new();
        if count == 0 {
            return mean;
        }
        for c in Channel::ALL {
            for (out, &sum) in mean.channel_mut(c).iter_mut().zip(&self.channels[c.index()]) {
                *out = (sum / count as u64) as u32;
            }
        }
        mean
    }
}

/// Indices of the pictures averaged for position `index` of a `len` long sequence.
///
/// The window is symmetric and clamped at both ends, so pictures near the
/// boundaries average over fewer neighbors instead of wrapping around.
pub fn window_bounds(index: usize, len: usize, window: usize) -> RangeInclusive<usize> {
    let start = index.saturating_sub(window);
    let end = index.saturating_add(window).min(len.saturating_sub(1));
    start..=end
}

/// Bucket-wise integer mean of all `histograms`.
pub fn global_average(histograms: &[&Histogram]) -> Histogram {
    let mut sums = BucketSums::new();
    for h in histograms {
        sums.add(h);
    }
    sums.mean(histograms.len())
}

/// Computes one target histogram per entry of `histograms`, in order.
///
/// # Arguments
/// * `histograms` - Current histograms in sequence order.
/// * `window` - Rolling half-width; 0 selects the global average.
///
/// # Returns
/// * `Vec<Arc<Histogram>>` - Targets in sequence order. In global mode all
///   entries share the same allocation.
pub fn compute_targets(histograms: &[&Histogram], window: usize) -> Vec<Arc<Histogram>> {
    if histograms.is_empty() {
        return Vec::new();
    }
    if window == 0 {
        let target = Arc::new(global_average(histograms));
        return vec![target; histograms.len()];
    }

    // Slide the window: add pictures entering on the right, drop the ones
    // leaving on the left.
    let len = histograms.len();
    let mut sums = BucketSums::new();
    let (mut lo, mut hi) = (0usize, 0usize);
    let mut targets = Vec::with_capacity(len);
    for i in 0..len {
        let bounds = window_bounds(i, len, window);
        while hi <= *bounds.end() {
            sums.add(histograms[hi]);
            hi += 1;
        }
        while lo < *bounds.start() {
            sums.subtract(histograms[lo]);
            lo += 1;
        }
        targets.push(Arc::new(sums.mean(hi - lo)));
    }
    targets
}
