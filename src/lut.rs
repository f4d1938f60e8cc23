//! Histogram matching: lookup-table synthesis from two histograms and
//! application of a lookup table to pixel data.

use rayon::prelude::*;
use tracing::debug;

use crate::histogram::{cumulative, Channel, Histogram, HIST_SIZE};
use crate::Rgba16Image;

/// Per-channel mapping from source intensity to target intensity.
///
/// Tables built by [`synthesize_lut`] are non-decreasing in the source
/// intensity; anything else points at a synthesis defect.
#[derive(Clone, PartialEq, Eq)]
pub struct Lut {
    channels: [Box<[u16]>; 3],
}

impl Lut {
    /// The mapping that leaves every intensity unchanged.
    pub fn identity() -> Self {
        Lut {
            channels: std::array::from_fn(|_| identity_channel()),
        }
    }

    pub fn channel(&self, channel: Channel) -> &[u16] {
        &self.channels[channel.index()]
    }

    #[inline]
    pub fn map(&self, channel: Channel, value: u16) -> u16 {
        self.channels[channel.index()][value as usize]
    }

    pub fn is_monotonic(&self) -> bool {
        self.channels
            .iter()
            .all(|table| table.windows(2).all(|w| w[0] <= w[1]))
    }

    pub fn is_identity(&self) -> bool {
        self.channels
            .iter()
            .all(|table| table.iter().enumerate().all(|(i, &v)| v as usize == i))
    }
}

impl std::fmt::Debug for Lut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lut")
            .field("identity", &self.is_identity())
            .field("monotonic", &self.is_monotonic())
            .finish()
    }
}

fn identity_channel() -> Box<[u16]> {
    (0..HIST_SIZE).map(|i| i as u16).collect()
}

/// Builds the lookup table that reshapes `source` toward `target`.
///
/// Every channel is matched independently: both histograms are turned into
/// cumulative distributions, the target curve is rescaled to the source's
/// total mass, and each source intensity is mapped to the smallest target
/// intensity whose cumulative mass is not below the source's.
///
/// A channel whose source or target total is zero has no distribution to
/// match against and gets the identity mapping.
///
/// # Arguments
/// * `source` - Histogram of the image being corrected.
/// * `target` - Averaged histogram the image should resemble.
///
/// # Returns
/// * `Lut` - One monotonic mapping table per channel.
pub fn synthesize_lut(source: &Histogram, target: &Histogram) -> Lut {
    Lut {
        channels: Channel::ALL.map(|c| match_channel(source.channel(c), target.channel(c))),
    }
}

fn match_channel(source: &[u32], target: &[u32]) -> Box<[u16]> {
    let source_cum = cumulative(source);
    let mut target_cum = cumulative(target);

    let source_total = source_cum[HIST_SIZE - 1];
    let target_total = target_cum[HIST_SIZE - 1];
    if source_total == 0 || target_total == 0 {
        debug!(source_total, target_total, "empty histogram channel, using identity mapping");
        return identity_channel();
    }

    let ratio = source_total as f64 / target_total as f64;
    for c in target_cum.iter_mut() {
        *c = (*c as f64 * ratio).round() as u64;
    }

    // The cursor only moves forward, which keeps the table monotonic and the
    // whole scan linear in the number of buckets.
    let mut table = vec![0u16; HIST_SIZE];
    let mut p = 0usize;
    for (entry, &mass) in table.iter_mut().zip(source_cum.iter()) {
        while p < HIST_SIZE - 1 && target_cum[p] < mass {
            p += 1;
        }
        *entry = p as u16;
    }
    table.into_boxed_slice()
}

/// Rewrites every pixel of `image` through `lut`.
///
/// Red, green and blue go through their channel table, alpha is copied as is.
/// The result keeps the full 16-bit precision and the input is not modified.
/// Rows are processed in parallel.
pub fn apply_lut(image: &Rgba16Image, lut: &Lut) -> Rgba16Image {
    let (width, height) = image.dimensions();
    let mut output = Rgba16Image::new(width, height);
    let row_len = width as usize * 4;
    if row_len == 0 || height == 0 {
        return output;
    }

    let (red, green, blue) = (
        lut.channel(Channel::Red),
        lut.channel(Channel::Green),
        lut.channel(Channel::Blue),
    );
    let src: &[u16] = image;
    let dst: &mut [u16] = &mut output;

    dst.par_chunks_exact_mut(row_len)
        .zip(src.par_chunks_exact(row_len))
        .for_each(|(dst_row, src_row)| {
            for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                d[0] = red[s[0] as usize];
                d[1] = green[s[1] as usize];
                d[2] = blue[s[2] as usize];
                d[3] = s[3];
            }
        });

    output
}
