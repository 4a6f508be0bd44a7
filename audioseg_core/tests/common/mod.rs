#![allow(dead_code)]

use std::error::Error;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Sample written at `frame` on `channel` by [`write_ramp`].
///
/// The pattern never repeats within a few seconds of audio, so the first
/// sample of a segment identifies where it was cut.
pub fn ramp_sample(frame: u64, channel: u16) -> i16 {
    ((frame % 30_000) as i16) - 15_000 + channel as i16
}

/// Write a 16-bit PCM file of `frames` frames following [`ramp_sample`].
///
/// Fixtures are generated at runtime so no binary assets are stored in the
/// repository.
pub fn write_ramp<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    frames: u64,
) -> Result<(), Box<dyn Error>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for frame in 0..frames {
        for channel in 0..channels {
            writer.write_sample(ramp_sample(frame, channel))?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// All samples of a 16-bit PCM file together with its spec.
pub fn read_samples<P: AsRef<Path>>(path: P) -> Result<(WavSpec, Vec<i16>), Box<dyn Error>> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
    Ok((spec, samples))
}

/// Number of frames in a WAV file.
pub fn frame_count<P: AsRef<Path>>(path: P) -> Result<u64, Box<dyn Error>> {
    Ok(u64::from(WavReader::open(path)?.duration()))
}
