use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AudioSegError;

/// Name of the directory created next to the source when no output
/// directory is configured.
pub const DEFAULT_SUBDIR: &str = "split";

/// Extension of every encoded segment.
pub const OUTPUT_EXTENSION: &str = "wav";

const MIN_INDEX_WIDTH: usize = 3;

/// How segment files of one job are named.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputNaming {
    pub dir: PathBuf,
    pub stem: String,
    pub width: usize,
}

impl OutputNaming {
    /// Naming for a job of `segments` outputs; indices are padded to at
    /// least three digits and widened when there are more than 999.
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>, segments: u64) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
            width: num_width(segments).max(MIN_INDEX_WIDTH),
        }
    }

    pub fn file_name(&self, index: u32) -> String {
        format!(
            "{index:0width$}_{stem}.{OUTPUT_EXTENSION}",
            width = self.width,
            stem = self.stem
        )
    }

    pub fn path_for(&self, index: u32) -> PathBuf {
        self.dir.join(self.file_name(index))
    }
}

/// Base name of `path` without its extension.
pub fn source_stem(path: &Path) -> Result<String, AudioSegError> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| AudioSegError::InvalidInputName(path.to_path_buf()))
}

/// `<source dir>/split`
pub fn default_output_dir(source: &Path) -> PathBuf {
    source
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(DEFAULT_SUBDIR)
}

/// Create `dir` and its parents.
///
/// Succeeds when the directory already exists, including when another
/// worker creates it concurrently.
pub fn ensure_dir(dir: &Path) -> Result<(), AudioSegError> {
    fs::create_dir_all(dir).map_err(|source| AudioSegError::CreateDirectory {
        path: dir.to_path_buf(),
        source,
    })
}

fn num_width(mut value: u64) -> usize {
    if value == 0 {
        return 1;
    }

    let mut width = 0;
    while value > 0 {
        value /= 10;
        width += 1;
    }
    width
}
