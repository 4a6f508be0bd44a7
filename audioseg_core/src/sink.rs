//! WAV encoding of [`FrameSource`]s.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use hound::{SampleFormat, WavSpec, WavWriter};
use log::debug;

use crate::error::AudioSegError;
use crate::source::{AudioFormat, FrameSource};

/// Sample representation written to the WAV container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WavEncoding {
    /// 16-bit signed integer PCM.
    #[default]
    Pcm16,
    /// 32-bit IEEE float.
    Float32,
}

impl WavEncoding {
    pub const NAMES: [&'static str; 2] = ["pcm16", "float32"];

    fn spec(self, format: AudioFormat) -> WavSpec {
        let (bits_per_sample, sample_format) = match self {
            Self::Pcm16 => (16, SampleFormat::Int),
            Self::Float32 => (32, SampleFormat::Float),
        };
        WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

impl fmt::Display for WavEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pcm16 => "pcm16",
            Self::Float32 => "float32",
        })
    }
}

impl FromStr for WavEncoding {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pcm16" => Ok(Self::Pcm16),
            "float32" => Ok(Self::Float32),
            other => Err(format!(
                "unknown encoding '{other}', expected one of: {}",
                Self::NAMES.join(", ")
            )),
        }
    }
}

/// What to do when the destination already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateMode {
    /// Fail with [`AudioSegError::OutputExists`].
    CreateNew,
    /// Truncate and replace the existing file.
    Overwrite,
}

impl CreateMode {
    pub fn from_overwrite(overwrite: bool) -> Self {
        if overwrite {
            Self::Overwrite
        } else {
            Self::CreateNew
        }
    }
}

/// An open WAV file receiving interleaved `f32` chunks.
pub struct WavSink {
    path: PathBuf,
    writer: WavWriter<BufWriter<File>>,
    encoding: WavEncoding,
    channels: usize,
    frames: u64,
}

impl WavSink {
    pub fn create(
        path: &Path,
        format: AudioFormat,
        encoding: WavEncoding,
        mode: CreateMode,
    ) -> Result<Self, AudioSegError> {
        let mut options = OpenOptions::new();
        options.write(true);
        match mode {
            CreateMode::CreateNew => options.create_new(true),
            CreateMode::Overwrite => options.create(true).truncate(true),
        };

        let file = options.open(path).map_err(|source| {
            if source.kind() == io::ErrorKind::AlreadyExists {
                AudioSegError::OutputExists(path.to_path_buf())
            } else {
                AudioSegError::CreateFile {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let writer = WavWriter::new(BufWriter::new(file), encoding.spec(format))
            .map_err(|err| AudioSegError::encode(path, err))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            encoding,
            channels: usize::from(format.channels),
            frames: 0,
        })
    }

    pub fn write_chunk(&mut self, samples: &[f32]) -> Result<(), AudioSegError> {
        for &sample in samples {
            let written = match self.encoding {
                WavEncoding::Pcm16 => self.writer.write_sample(to_pcm16(sample)),
                WavEncoding::Float32 => self.writer.write_sample(sample),
            };
            written.map_err(|err| AudioSegError::encode(&self.path, err))?;
        }
        self.frames += (samples.len() / self.channels) as u64;
        Ok(())
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Flush the header and return the number of frames written.
    pub fn finalize(self) -> Result<u64, AudioSegError> {
        let Self {
            path,
            writer,
            frames,
            ..
        } = self;
        writer
            .finalize()
            .map_err(|err| AudioSegError::encode(path, err))?;
        Ok(frames)
    }
}

/// Drain `source` into a new WAV file at `path`.
///
/// A partially written file is removed when encoding fails.
pub fn write_wav(
    path: &Path,
    source: &mut dyn FrameSource,
    encoding: WavEncoding,
    mode: CreateMode,
) -> Result<u64, AudioSegError> {
    let mut sink = WavSink::create(path, source.format(), encoding, mode)?;

    match drain(source, &mut sink).and_then(|()| sink.finalize()) {
        Ok(frames) => Ok(frames),
        Err(err) => {
            discard(path);
            Err(err)
        }
    }
}

fn drain(source: &mut dyn FrameSource, sink: &mut WavSink) -> Result<(), AudioSegError> {
    while let Some(chunk) = source.next_chunk()? {
        sink.write_chunk(chunk)?;
    }
    Ok(())
}

/// Remove a partially written output.
pub(crate) fn discard(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        debug!("could not remove partial output '{}': {err}", path.display());
    }
}

fn to_pcm16(sample: f32) -> i16 {
    (sample * 32_768.0).round().clamp(-32_768.0, 32_767.0) as i16
}
