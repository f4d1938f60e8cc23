//! Run configuration: CLI schema, JSON form and validation.
//!
//! The configuration is built once at startup and handed to the run by
//! reference. Nothing in the library reads global state.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::{DeflickerError, Result};

pub const DEFAULT_ROLLING_AVERAGE: i64 = 15;
pub const DEFAULT_JPEG_QUALITY: u32 = 95;
pub const MAX_BRIGHTNESS: u32 = 65535;

/// Encoding used for the corrected images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 16-bit PNG.
    #[default]
    Png,
    /// 16-bit TIFF.
    Tiff,
    /// 8-bit JPEG, see `jpeg_quality`.
    Jpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Tiff => "tif",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

/// Command-line argument schema.
#[derive(Parser, Debug)]
#[command(author, version, about = "Removes flicker from timelapse image sequences", long_about = None)]
pub struct Args {
    /// Directory with the images to process, or a JSON manifest (array of paths).
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Directory to put the processed images in.
    #[arg(short, long)]
    pub destination: Option<PathBuf>,

    /// Number of neighboring frames on each side used for the rolling average. 0 disables it.
    #[arg(short, long, default_value_t = DEFAULT_ROLLING_AVERAGE, allow_negative_numbers = true)]
    pub rolling_average: i64,

    /// Minimum brightness cutoff (0-65535). Darker pixels are ignored when building histograms.
    #[arg(short, long, default_value_t = 0)]
    pub min_brightness: u32,

    /// Number of worker threads. Defaults to the number of cores.
    #[arg(short, long, default_value_t = num_cpus::get())]
    pub threads: usize,

    /// Output image format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Png)]
    pub format: OutputFormat,

    /// JPEG quality (1-100), only used with `--format jpeg`.
    #[arg(short = 'q', long, default_value_t = DEFAULT_JPEG_QUALITY)]
    pub jpeg_quality: u32,

    /// Whole configuration as a JSON object. Fields that are left out take their defaults.
    /// Cannot be combined with any other flag.
    #[arg(
        short,
        long,
        conflicts_with_all = [
            "source", "destination", "rolling_average", "min_brightness",
            "threads", "format", "jpeg_quality",
        ]
    )]
    pub options: Option<String>,
}

impl Args {
    /// Turns parsed arguments into a configuration. Does not validate.
    pub fn into_config(self) -> Result<DeflickerConfig> {
        if let Some(json) = self.options {
            return serde_json::from_str(&json)
                .map_err(|e| DeflickerError::Configuration(format!("invalid --options JSON: {e}")));
        }
        Ok(DeflickerConfig {
            source: self.source.unwrap_or_default(),
            destination: self.destination.unwrap_or_default(),
            rolling_average: self.rolling_average,
            min_brightness: self.min_brightness,
            threads: self.threads,
            format: self.format,
            jpeg_quality: self.jpeg_quality,
        })
    }
}

fn default_rolling_average() -> i64 {
    DEFAULT_ROLLING_AVERAGE
}

fn default_threads() -> usize {
    num_cpus::get()
}

fn default_jpeg_quality() -> u32 {
    DEFAULT_JPEG_QUALITY
}

/// Settings of one deflicker run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeflickerConfig {
    pub source: PathBuf,
    pub destination: PathBuf,
    #[serde(default = "default_rolling_average")]
    pub rolling_average: i64,
    #[serde(default)]
    pub min_brightness: u32,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u32,
}

impl Default for DeflickerConfig {
    fn default() -> Self {
        DeflickerConfig {
            source: PathBuf::new(),
            destination: PathBuf::new(),
            rolling_average: DEFAULT_ROLLING_AVERAGE,
            min_brightness: 0,
            threads: default_threads(),
            format: OutputFormat::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl DeflickerConfig {
    /// Checks every setting and reports all problems at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if !(1..=100).contains(&self.jpeg_quality) {
            problems.push("Invalid JPEG quality. Value must be between 1 and 100 (inclusive).");
        }
        if self.threads < 1 {
            problems.push("Invalid number of threads. There must be at least one thread.");
        }
        if self.rolling_average < 0 {
            problems.push("Invalid rolling average. Value must be 0 (disabled) or greater.");
        }
        if self.min_brightness > MAX_BRIGHTNESS {
            problems.push("Invalid minimum brightness. Value must be between 0 and 65535.");
        }
        if self.source.as_os_str().is_empty() {
            problems.push("No source directory specified.");
        } else if !self.source.exists() {
            problems.push("The source directory could not be found.");
        }
        if self.destination.as_os_str().is_empty() {
            problems.push("No destination directory specified.");
        } else if self.destination.exists() && !self.destination.is_dir() {
            problems.push("The destination exists but is not a directory.");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(DeflickerError::Configuration(problems.join("\n")))
        }
    }

    /// Rolling window half-width, 0 meaning a global average.
    pub fn window(&self) -> usize {
        self.rolling_average.max(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(dir: &std::path::Path) -> DeflickerConfig {
        DeflickerConfig {
            source: dir.to_path_buf(),
            destination: dir.join("out"),
            ..DeflickerConfig::default()
        }
    }

    #[test]
    fn defaults_follow_cli_defaults() {
        let args = Args::try_parse_from(["deflicker", "-s", "in", "-d", "out"]).unwrap();
        let config = args.into_config().unwrap();
        assert_eq!(config.rolling_average, 15);
        assert_eq!(config.min_brightness, 0);
        assert_eq!(config.jpeg_quality, 95);
        assert_eq!(config.format, OutputFormat::Png);
        assert_eq!(config.threads, num_cpus::get());
        assert_eq!(config.source, PathBuf::from("in"));
    }

    #[test]
    fn cli_flags_are_parsed() {
        let args = Args::try_parse_from([
            "deflicker", "--source", "a", "--destination", "b", "--rolling-average", "0",
            "--min-brightness", "1000", "--threads", "3", "--format", "jpeg", "-q", "80",
        ])
        .unwrap();
        let config = args.into_config().unwrap();
        assert_eq!(config.window(), 0);
        assert_eq!(config.min_brightness, 1000);
        assert_eq!(config.threads, 3);
        assert_eq!(config.format, OutputFormat::Jpeg);
        assert_eq!(config.jpeg_quality, 80);
    }

    #[test]
    fn json_options_fill_defaults() {
        let args = Args::try_parse_from([
            "deflicker",
            "--options",
            r#"{"source":"frames","destination":"fixed","format":"tiff"}"#,
        ])
        .unwrap();
        let config = args.into_config().unwrap();
        assert_eq!(config.format, OutputFormat::Tiff);
        assert_eq!(config.rolling_average, DEFAULT_ROLLING_AVERAGE);
        assert_eq!(config.destination, PathBuf::from("fixed"));
    }

    #[test]
    fn json_options_cannot_be_mixed_with_flags() {
        let json = r#"{"source":"frames","destination":"fixed"}"#;
        for flags in [
            &["-r", "3"][..],
            &["-m", "1000"],
            &["--threads", "2"],
            &["--format", "jpeg"],
            &["-q", "50"],
            &["--source", "x"],
        ] {
            let mut argv = vec!["deflicker", "--options", json];
            argv.extend_from_slice(flags);
            let err = Args::try_parse_from(argv).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict, "flags {flags:?}");
        }
    }

    #[test]
    fn malformed_json_options_are_rejected() {
        let args = Args::try_parse_from(["deflicker", "--options", "{not json"]).unwrap();
        assert!(matches!(args.into_config(), Err(DeflickerError::Configuration(_))));
    }

    #[test]
    fn valid_config_passes() {
        let dir = tempfile::tempdir().unwrap();
        valid(dir.path()).validate().unwrap();
    }

    #[test]
    fn validation_reports_every_problem() {
        let config = DeflickerConfig {
            rolling_average: -1,
            threads: 0,
            jpeg_quality: 0,
            min_brightness: 70000,
            ..DeflickerConfig::default()
        };
        let Err(DeflickerError::Configuration(msg)) = config.validate() else {
            panic!("expected configuration error");
        };
        assert_eq!(msg.lines().count(), 6);
        assert!(msg.contains("rolling average"));
        assert!(msg.contains("No source directory"));
        assert!(msg.contains("No destination directory"));
    }

    #[test]
    fn missing_source_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = DeflickerConfig {
            source: dir.path().join("nope"),
            ..valid(dir.path())
        };
        assert!(config.validate().is_err());
    }
}
