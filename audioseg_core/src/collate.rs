//! Concatenation of a directory of same-format recordings into one file.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::AudioSegError;
use crate::sink::{self, CreateMode, WavEncoding, WavSink};
use crate::source::{self, FrameSource};

#[derive(Clone, Debug)]
pub struct CollateConfig {
    pub input_dir: PathBuf,
    pub output_path: PathBuf,
    pub encoding: WavEncoding,
    pub overwrite: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollateSummary {
    pub inputs: usize,
    pub frames: u64,
}

/// Every regular file below `dir`, in lexicographic path order.
pub fn collect_inputs(dir: &Path) -> Result<Vec<PathBuf>, AudioSegError> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = fs::read_dir(&current).map_err(|source| AudioSegError::Open {
            path: current.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| AudioSegError::Open {
                path: current.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Decode every file in the input directory and append them, in path order,
/// to a single WAV file.
///
/// All inputs must share the format of the first one.
pub fn collate(config: &CollateConfig) -> Result<CollateSummary, AudioSegError> {
    let output = fs::canonicalize(&config.output_path).ok();
    let inputs: Vec<PathBuf> = collect_inputs(&config.input_dir)?
        .into_iter()
        .filter(|path| output.is_none() || fs::canonicalize(path).ok() != output)
        .collect();

    let Some(first) = inputs.first() else {
        return Err(AudioSegError::NoInputFiles(config.input_dir.clone()));
    };

    let format = source::open(first)?.format();
    let mut sink = WavSink::create(
        &config.output_path,
        format,
        config.encoding,
        CreateMode::from_overwrite(config.overwrite),
    )?;

    let appended = append_all(&inputs, &mut sink);
    let frames = match appended.and_then(|()| sink.finalize()) {
        Ok(frames) => frames,
        Err(err) => {
            sink::discard(&config.output_path);
            return Err(err);
        }
    };

    info!(
        "collated {} file(s) ({frames} frames) into '{}'",
        inputs.len(),
        config.output_path.display()
    );
    Ok(CollateSummary {
        inputs: inputs.len(),
        frames,
    })
}

fn append_all(inputs: &[PathBuf], sink: &mut WavSink) -> Result<(), AudioSegError> {
    let mut expected = None;

    for path in inputs {
        let mut stream = source::open(path)?;
        let format = stream.format();
        match expected {
            None => expected = Some(format),
            Some(expected) if expected != format => {
                return Err(AudioSegError::FormatMismatch {
                    path: path.clone(),
                    expected,
                    found: format,
                });
            }
            Some(_) => {}
        }

        let before = sink.frames();
        while let Some(chunk) = stream.next_chunk()? {
            sink.write_chunk(chunk)?;
        }
        debug!(
            "appended '{}' ({} frames)",
            path.display(),
            sink.frames() - before
        );
    }

    Ok(())
}
