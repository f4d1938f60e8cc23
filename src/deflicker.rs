//! The deflicker run: analyze every picture, average the histograms into
//! per-picture targets, then match and rewrite every picture.
//!
//! Each step finishes completely before the next one starts.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::average::compute_targets;
use crate::codec;
use crate::config::DeflickerConfig;
use crate::error::{DeflickerError, Result};
use crate::histogram::{build_histogram, Histogram};
use crate::lut::{apply_lut, synthesize_lut};
use crate::picture::{build_sequence, discover, Picture};
use crate::pipeline::{run_batch, ProgressSink};
use crate::progress::{JsonProgress, Pass};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub written: usize,
    pub destination: PathBuf,
}

/// Analyze pass: decodes every picture and stores its histogram.
pub fn analyze(
    pictures: Vec<Picture>,
    config: &DeflickerConfig,
    progress: &dyn ProgressSink,
) -> Result<Vec<Picture>> {
    let min_brightness = config.min_brightness;
    run_batch(pictures, config.threads, progress, |mut picture| {
        let image = codec::decode(picture.source())?;
        let histogram = build_histogram(&image, min_brightness);
        if histogram.is_empty() {
            warn!(
                path = %picture.source().display(),
                min_brightness,
                "no pixel passed the brightness cutoff, picture will be left unchanged"
            );
        }
        picture.current_histogram = Some(histogram);
        Ok(picture)
    })
}

/// Fills in the target histogram of every analyzed picture.
///
/// `window` is the rolling half-width, 0 for one global average.
pub fn assign_targets(pictures: &mut [Picture], window: usize) -> Result<()> {
    let targets = {
        let histograms = pictures
            .iter()
            .map(|p| {
                p.current_histogram.as_ref().ok_or_else(|| {
                    DeflickerError::Task(format!("{} | picture was not analyzed", p.source().display()))
                })
            })
            .collect::<Result<Vec<&Histogram>>>()?;
        compute_targets(&histograms, window)
    };

    for (picture, target) in pictures.iter_mut().zip(targets) {
        picture.target_histogram = Some(target);
    }
    Ok(())
}

/// Adjust pass: matches every picture to its target and writes the result.
///
/// Histograms are released once a picture has been written.
pub fn adjust(
    pictures: Vec<Picture>,
    config: &DeflickerConfig,
    progress: &dyn ProgressSink,
) -> Result<Vec<Picture>> {
    run_batch(pictures, config.threads, progress, |mut picture| {
        let (Some(current), Some(target)) = (&picture.current_histogram, &picture.target_histogram) else {
            return Err(DeflickerError::Task(format!(
                "{} | picture has no target histogram",
                picture.source().display()
            )));
        };
        let lut = synthesize_lut(current, target);

        let image = codec::decode(picture.source())?;
        let corrected = apply_lut(&image, &lut);
        codec::encode(&corrected, &picture.target, config.format, config.jpeg_quality)?;

        picture.current_histogram = None;
        picture.target_histogram = None;
        Ok(picture)
    })
}

/// Runs the whole deflicker process for `config`, reporting progress as
/// JSON lines on stdout.
///
/// Output files written before a failure in the adjust pass are kept.
pub fn run(config: &DeflickerConfig) -> Result<RunSummary> {
    config.validate()?;
    std::fs::create_dir_all(&config.destination)
        .map_err(|e| DeflickerError::io(&config.destination, e))?;

    let paths = discover(&config.source)?;
    let pictures = build_sequence(paths, &config.destination, config.format)?;
    let total = pictures.len();
    info!(
        pictures = total,
        threads = config.threads,
        rolling_average = config.window(),
        min_brightness = config.min_brightness,
        "starting deflicker"
    );

    let mut pictures = analyze(pictures, config, &JsonProgress::new(Pass::Analyze, total))?;
    info!("analysis finished, computing target histograms");

    assign_targets(&mut pictures, config.window())?;

    let pictures = adjust(pictures, config, &JsonProgress::new(Pass::Adjust, total))?;
    info!(written = pictures.len(), destination = %config.destination.display(), "deflicker finished");

    Ok(RunSummary {
        written: pictures.len(),
        destination: config.destination.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::NoProgress;

    #[test]
    fn targets_require_analysis() {
        let mut pictures = vec![Picture::new("/in/a.png", "/out/a.png")];
        assert!(matches!(assign_targets(&mut pictures, 0), Err(DeflickerError::Task(_))));
    }

    #[test]
    fn adjust_requires_targets() {
        let config = DeflickerConfig { threads: 2, ..DeflickerConfig::default() };
        let mut picture = Picture::new("/in/a.png", "/out/a.png");
        picture.current_histogram = Some(Histogram::new());
        assert!(adjust(vec![picture], &config, &NoProgress).is_err());
    }

    #[test]
    fn assigned_targets_follow_window() {
        let mut pictures: Vec<Picture> = (0..5)
            .map(|i| {
                let mut p = Picture::new(format!("/in/{i}.png"), format!("/out/{i}.png"));
                let mut h = Histogram::new();
                h.record(i * 1000, 0, 0);
                p.current_histogram = Some(h);
                p
            })
            .collect();

        assign_targets(&mut pictures, 1).unwrap();
        // the only nonzero buckets are single pixels, so a window of 3 rounds them away
        let first = pictures[0].target_histogram.as_ref().unwrap();
        assert_eq!(first.channel(crate::histogram::Channel::Green)[0], 1);
        let middle = pictures[2].target_histogram.as_ref().unwrap();
        assert_eq!(middle.channel(crate::histogram::Channel::Green)[0], 1);
        assert_eq!(middle.channel(crate::histogram::Channel::Red)[2000], 0);
    }

    #[test]
    fn analyze_fails_on_unreadable_picture() {
        let dir = tempfile::tempdir().unwrap();
        let config = DeflickerConfig { threads: 2, ..DeflickerConfig::default() };
        let pictures = vec![Picture::new(dir.path().join("missing.png"), dir.path().join("o.png"))];
        match analyze(pictures, &config, &NoProgress) {
            Err(DeflickerError::Decode { path, .. }) => assert!(path.ends_with("missing.png")),
            other => panic!("expected decode error, got {other:?}"),
        }
    }
}
