//! Picture records and discovery of the input sequence.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::OutputFormat;
use crate::error::{DeflickerError, Result};
use crate::histogram::Histogram;

/// File extensions picked up when scanning a source directory.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "tif", "tiff", "webp", "arw", "cr2", "nef", "dng",
];

/// One image of the sequence and the state gathered for it during a run.
///
/// The analyze pass fills `current_histogram`, target averaging fills
/// `target_histogram`. Records are never reordered once created.
#[derive(Debug)]
pub struct Picture {
    source: PathBuf,
    pub target: PathBuf,
    pub current_histogram: Option<Histogram>,
    pub target_histogram: Option<Arc<Histogram>>,
}

impl Picture {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Picture {
            source: source.into(),
            target: target.into(),
            current_histogram: None,
            target_histogram: None,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

pub fn is_supported(path: &Path) -> bool {
    extension_lowercase(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Resolves the ordered list of input files.
///
/// `source` is either a directory, scanned non-recursively for supported
/// images and sorted by file name, or a `.json` manifest holding an array of
/// paths that is taken in the given order.
pub fn discover(source: &Path) -> Result<Vec<PathBuf>> {
    let paths = if source.is_file() && extension_lowercase(source).as_deref() == Some("json") {
        let file = File::open(source).map_err(|e| DeflickerError::io(source, e))?;
        let reader = BufReader::new(file);
        serde_json::from_reader::<_, Vec<PathBuf>>(reader).map_err(|e| DeflickerError::Manifest {
            path: source.to_path_buf(),
            source: e,
        })?
    } else {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(source).map_err(|e| DeflickerError::io(source, e))? {
            let path = entry.map_err(|e| DeflickerError::io(source, e))?.path();
            if path.is_file() && is_supported(&path) {
                paths.push(path);
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        paths
    };

    if paths.is_empty() {
        return Err(DeflickerError::Configuration(format!(
            "no supported images found in {}",
            source.display()
        )));
    }
    debug!(count = paths.len(), "discovered input images");
    Ok(paths)
}

/// Output location for `source`: same stem, inside `destination`, with the
/// extension of `format`.
pub fn output_path(destination: &Path, source: &Path, format: OutputFormat) -> PathBuf {
    let mut name = source.file_stem().unwrap_or(source.as_os_str()).to_os_string();
    name.push(".");
    name.push(format.extension());
    destination.join(name)
}

/// Creates the picture records for `paths`, keeping their order.
///
/// Fails when two sources would be written to the same output file, or when
/// an output file would replace one of the sources.
pub fn build_sequence(paths: Vec<PathBuf>, destination: &Path, format: OutputFormat) -> Result<Vec<Picture>> {
    let sources: HashSet<&Path> = paths.iter().map(PathBuf::as_path).collect();
    let mut claimed: HashMap<PathBuf, &Path> = HashMap::with_capacity(paths.len());
    let mut clashes = Vec::new();

    for source in &paths {
        let target = output_path(destination, source, format);
        if sources.contains(target.as_path()) {
            clashes.push(format!("{} would overwrite a source image", target.display()));
        } else if let Some(previous) = claimed.get(&target) {
            clashes.push(format!(
                "{} and {} would both be written to {}",
                previous.display(),
                source.display(),
                target.display()
            ));
        } else {
            claimed.insert(target, source);
        }
    }
    if !clashes.is_empty() {
        return Err(DeflickerError::Configuration(clashes.join("\n")));
    }

    Ok(paths
        .into_iter()
        .map(|source| {
            let target = output_path(destination, &source, format);
            Picture::new(source, target)
        })
        .collect())
}
