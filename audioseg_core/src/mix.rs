//! Volume scaling of a single file.

use std::path::PathBuf;

use log::info;

use crate::error::AudioSegError;
use crate::sink::{self, CreateMode, WavEncoding};
use crate::source::{self, AudioFormat, FrameSource};

/// Base of the logarithmic volume scale: each unit doubles or halves the
/// amplitude.
pub const VOLUME_BASE: f64 = 2.0;

#[derive(Clone, Debug)]
pub struct MixConfig {
    pub input: PathBuf,
    pub output_path: PathBuf,
    /// Exponent applied to [`VOLUME_BASE`]; 0 leaves the signal unchanged.
    pub volume: f64,
    pub encoding: WavEncoding,
    pub overwrite: bool,
}

/// Linear gain for a logarithmic `volume`.
pub fn gain_for(volume: f64) -> Result<f32, AudioSegError> {
    if !volume.is_finite() {
        return Err(AudioSegError::InvalidVolume(volume));
    }
    Ok(VOLUME_BASE.powf(volume) as f32)
}

/// Multiplies every sample of the inner source by a fixed gain.
pub struct Volume<S> {
    inner: S,
    gain: f32,
    scratch: Vec<f32>,
}

impl<S> Volume<S> {
    pub fn new(inner: S, gain: f32) -> Self {
        Self {
            inner,
            gain,
            scratch: Vec::new(),
        }
    }
}

impl<S: FrameSource> FrameSource for Volume<S> {
    fn format(&self) -> AudioFormat {
        self.inner.format()
    }

    fn next_chunk(&mut self) -> Result<Option<&[f32]>, AudioSegError> {
        let Some(chunk) = self.inner.next_chunk()? else {
            return Ok(None);
        };
        self.scratch.clear();
        self.scratch.extend(
            chunk
                .iter()
                .map(|sample| (sample * self.gain).clamp(-1.0, 1.0)),
        );
        Ok(Some(&self.scratch))
    }
}

/// Write the input scaled by `2^volume`. Returns the frames written.
pub fn mix(config: &MixConfig) -> Result<u64, AudioSegError> {
    let gain = gain_for(config.volume)?;
    let stream = source::open(&config.input)?;
    let mut scaled = Volume::new(stream, gain);

    let frames = sink::write_wav(
        &config.output_path,
        &mut scaled,
        config.encoding,
        CreateMode::from_overwrite(config.overwrite),
    )?;

    info!(
        "mixed '{}' with gain {gain:.3} into '{}'",
        config.input.display(),
        config.output_path.display()
    );
    Ok(frames)
}
