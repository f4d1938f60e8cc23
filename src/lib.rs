//! ---------------------------------------------------------------------------------------
//! Timelapse Deflicker
//! ---------------------------------------------------------------------------------------
//! Removes frame-to-frame brightness and color flicker from an ordered sequence of
//! photographs by matching every frame's tonal distribution to a global or rolling
//! average of its neighbors.
//!
//! The run happens in two parallel passes over the sequence:
//! 1. Analyze: decode every frame and build its 16-bit per-channel histogram.
//! 2. Adjust: match each frame's histogram to its target through a lookup table,
//!    rewrite the pixels and save the result.
//!
//! Between the passes the histograms are averaged into one target per frame.
//! ---------------------------------------------------------------------------------------

pub mod average;
pub mod codec;
pub mod config;
pub mod deflicker;
pub mod error;
pub mod histogram;
pub mod lut;
pub mod picture;
pub mod pipeline;
pub mod progress;

/// Decoded image with four 16-bit components per pixel.
pub type Rgba16Image = image::ImageBuffer<image::Rgba<u16>, Vec<u16>>;

pub use config::{DeflickerConfig, OutputFormat};
pub use deflicker::{run, RunSummary};
pub use error::{DeflickerError, Result};
pub use histogram::{build_histogram, Channel, Histogram, HIST_SIZE};
pub use lut::{apply_lut, synthesize_lut, Lut};
pub use pipeline::{run_batch, NoProgress, ProgressSink};
