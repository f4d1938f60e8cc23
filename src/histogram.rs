//! Per-channel intensity histograms over the 16-bit domain.
//!
//! Each channel is a contiguous table of [`HIST_SIZE`] counters indexed
//! directly by intensity, so building and reading a histogram never hashes
//! or allocates per pixel.

use std::fmt;

use crate::Rgba16Image;

/// Number of buckets per channel: one per 16-bit intensity value.
pub const HIST_SIZE: usize = 65536;

/// Color channel selector for histograms and lookup tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }
}

/// Intensity counts for the red, green and blue channels of one image.
///
/// The sum over a channel's buckets equals the number of pixels admitted by
/// the brightness filter when the histogram was built.
#[derive(Clone, PartialEq, Eq)]
pub struct Histogram {
    channels: [Box<[u32]>; 3],
}

impl Histogram {
    /// Creates a histogram with every bucket at zero.
    pub fn new() -> Self {
        Histogram {
            channels: std::array::from_fn(|_| vec![0u32; HIST_SIZE].into_boxed_slice()),
        }
    }

    pub fn channel(&self, channel: Channel) -> &[u32] {
        &self.channels[channel.index()]
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut [u32] {
        &mut self.channels[channel.index()]
    }

    /// Tallies one pixel into all three channels.
    #[inline]
    pub fn record(&mut self, r: u16, g: u16, b: u16) {
        self.channels[0][r as usize] += 1;
        self.channels[1][g as usize] += 1;
        self.channels[2][b as usize] += 1;
    }

    /// Total number of samples counted in `channel`.
    pub fn total(&self, channel: Channel) -> u64 {
        self.channel(channel).iter().map(|&c| c as u64).sum()
    }

    /// True when no pixel was counted in any channel.
    pub fn is_empty(&self) -> bool {
        Channel::ALL.iter().all(|&c| self.total(c) == 0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Histogram::new()
    }
}

// 65536 buckets per channel are useless in debug output; show the totals.
impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Histogram")
            .field("red_total", &self.total(Channel::Red))
            .field("green_total", &self.total(Channel::Green))
            .field("blue_total", &self.total(Channel::Blue))
            .finish()
    }
}

/// Mean of the three color components, truncated toward zero.
#[inline]
pub fn brightness(r: u16, g: u16, b: u16) -> u32 {
    (r as u32 + g as u32 + b as u32) / 3
}

/// Scans every pixel of `image` into a [`Histogram`].
///
/// A pixel whose [`brightness`] is strictly below `min_brightness` is left out
/// of all three channels at once. Alpha never takes part in the decision, and
/// a threshold of 0 admits every pixel including pure black.
///
/// # Arguments
/// * `image` - Decoded image with 16-bit components.
/// * `min_brightness` - Inclusive lower brightness bound (0 disables the filter).
///
/// # Returns
/// * `Histogram` - Per-channel intensity counts of the admitted pixels.
pub fn build_histogram(image: &Rgba16Image, min_brightness: u32) -> Histogram {
    let mut histogram = Histogram::new();
    for pixel in image.pixels() {
        let [r, g, b, _] = pixel.0;
        if brightness(r, g, b) >= min_brightness {
            histogram.record(r, g, b);
        }
    }
    histogram
}

/// Running sum of `counts` over increasing intensity.
///
/// The result is non-decreasing and its last entry equals the channel total.
/// Sums are widened to `u64` so very large images cannot overflow.
pub fn cumulative(counts: &[u32]) -> Vec<u64> {
    counts
        .iter()
        .scan(0u64, |acc, &c| {
            *acc += c as u64;
            Some(*acc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gray(level8: u16) -> Rgba<u16> {
        let v = level8 * 257;
        Rgba([v, v, v, u16::MAX])
    }

    fn row_image(pixels: &[Rgba<u16>]) -> Rgba16Image {
        Rgba16Image::from_fn(pixels.len() as u32, 1, |x, _| pixels[x as usize])
    }

    fn expected(pixels: &[Rgba<u16>]) -> Histogram {
        let mut h = Histogram::new();
        for p in pixels {
            h.record(p.0[0], p.0[1], p.0[2]);
        }
        h
    }

    fn sample() -> Vec<Rgba<u16>> {
        vec![gray(0), gray(30), gray(100), gray(200)]
    }

    #[test]
    fn brightness_cutoff_selects_pixels() {
        let pixels = sample();
        let img = row_image(&pixels);

        let cases: [(u32, Vec<Rgba<u16>>); 4] = [
            (50 * 257, vec![gray(100), gray(200)]),
            (220 * 257, vec![]),
            (0, pixels.clone()),
            (30 * 257 + 1, vec![gray(100), gray(200)]),
        ];
        for (threshold, kept) in cases {
            assert_eq!(build_histogram(&img, threshold), expected(&kept), "threshold {threshold}");
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let img = row_image(&[gray(30)]);
        let h = build_histogram(&img, 30 * 257);
        assert_eq!(h.total(Channel::Red), 1);
    }

    #[test]
    fn zero_threshold_counts_every_pixel() {
        let img = Rgba16Image::from_fn(17, 9, |x, y| {
            Rgba([(x * 3000) as u16, (y * 7000) as u16, ((x + y) * 1000) as u16, 0])
        });
        let h = build_histogram(&img, 0);
        for c in Channel::ALL {
            assert_eq!(h.total(c), 17 * 9);
        }
    }

    #[test]
    fn filter_is_atomic_across_channels_and_ignores_alpha() {
        // brightness (60000 + 0 + 0) / 3 = 20000
        let img = row_image(&[Rgba([60000, 0, 0, 0]), Rgba([60000, 0, 0, u16::MAX])]);
        let kept = build_histogram(&img, 20000);
        let dropped = build_histogram(&img, 20001);
        for c in Channel::ALL {
            assert_eq!(kept.total(c), 2);
            assert_eq!(dropped.total(c), 0);
        }
        assert_eq!(kept.channel(Channel::Green)[0], 2);
    }

    #[test]
    fn raising_threshold_never_adds_samples() {
        let img = Rgba16Image::from_fn(64, 4, |x, y| {
            let v = (x * 1000 + y * 50) as u16;
            Rgba([v, v / 2, v.saturating_add(500), u16::MAX])
        });
        let mut last = u64::MAX;
        for threshold in (0..=70000).step_by(5000) {
            let total = build_histogram(&img, threshold).total(Channel::Blue);
            assert!(total <= last);
            last = total;
        }
    }

    #[test]
    fn cumulative_is_monotonic_and_ends_at_total() {
        let img = Rgba16Image::from_fn(32, 32, |x, y| {
            Rgba([(x * y * 60) as u16, (x * 2000) as u16, 65535, 0])
        });
        let h = build_histogram(&img, 0);
        for c in Channel::ALL {
            let cum = cumulative(h.channel(c));
            assert_eq!(cum.len(), HIST_SIZE);
            assert!(cum.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(*cum.last().unwrap(), h.total(c));
        }
    }
}
