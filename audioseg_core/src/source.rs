//! Decoding of source files into interleaved `f32` frames.
//!
//! Every call to [`open`] probes the file from scratch. A [`DecodedStream`]
//! owns its reader, decoder and position, and is never handed to another
//! worker, so segments can be cut concurrently out of the same file.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::{Error as SymphoniaError, SeekErrorKind};
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;
use symphonia::default::{get_codecs, get_probe};

use crate::error::AudioSegError;

/// Sample rate and channel count of a decoded stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz, {} channel(s)", self.sample_rate, self.channels)
    }
}

/// What a single probe of a file reveals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    pub format: AudioFormat,
    pub total_frames: u64,
}

/// A finite sequence of interleaved sample frames.
pub trait FrameSource {
    fn format(&self) -> AudioFormat;

    /// Return the next run of interleaved samples, or `None` at end of stream.
    ///
    /// Chunks always hold a whole number of frames.
    fn next_chunk(&mut self) -> Result<Option<&[f32]>, AudioSegError>;

    /// Bound this source to at most `frames` frames.
    fn take(self, frames: u64) -> Take<Self>
    where
        Self: Sized,
    {
        Take {
            inner: self,
            remaining: frames,
        }
    }
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn format(&self) -> AudioFormat {
        (**self).format()
    }

    fn next_chunk(&mut self) -> Result<Option<&[f32]>, AudioSegError> {
        (**self).next_chunk()
    }
}

/// Adapter returned by [`FrameSource::take`].
///
/// Running out of input before `remaining` reaches zero simply ends the stream.
#[derive(Debug)]
pub struct Take<S> {
    inner: S,
    remaining: u64,
}

impl<S> Take<S> {
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<S: FrameSource> FrameSource for Take<S> {
    fn format(&self) -> AudioFormat {
        self.inner.format()
    }

    fn next_chunk(&mut self) -> Result<Option<&[f32]>, AudioSegError> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let channels = usize::from(self.inner.format().channels);
        match self.inner.next_chunk()? {
            None => Ok(None),
            Some(chunk) => {
                let frames = (chunk.len() / channels) as u64;
                let keep = frames.min(self.remaining);
                self.remaining -= keep;
                Ok(Some(&chunk[..keep as usize * channels]))
            }
        }
    }
}

/// A freshly opened, exclusively owned decode of one file.
pub struct DecodedStream {
    path: PathBuf,
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    format: AudioFormat,
    total_frames: Option<u64>,
    /// First frame the consumer still wants; earlier frames are discarded.
    cursor: u64,
    buffer: Option<SampleBuffer<f32>>,
}

impl fmt::Debug for DecodedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedStream")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("total_frames", &self.total_frames)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

/// Open `path` and prepare a decoder for its default track.
pub fn open(path: &Path) -> Result<DecodedStream, AudioSegError> {
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let file = File::open(path).map_err(|source| AudioSegError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let format_opts = FormatOptions {
        enable_gapless: true,
        ..Default::default()
    };
    let probed = get_probe()
        .format(&hint, mss, &format_opts, &MetadataOptions::default())
        .map_err(|err| AudioSegError::decode(path, err))?;
    let reader = probed.format;

    let track = reader
        .default_track()
        .ok_or_else(|| AudioSegError::MissingDefaultTrack(path.to_path_buf()))?;
    if track.codec_params.codec == CODEC_TYPE_NULL {
        return Err(AudioSegError::UnsupportedCodec(path.to_path_buf()));
    }

    let params = track.codec_params.clone();
    let track_id = track.id;

    let sample_rate = params
        .sample_rate
        .ok_or_else(|| AudioSegError::MissingSampleRate(path.to_path_buf()))?;
    let channels = params
        .channels
        .map(|channels| channels.count() as u16)
        .filter(|&count| count > 0)
        .ok_or_else(|| AudioSegError::MissingChannels(path.to_path_buf()))?;

    let decoder = get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|err| AudioSegError::decode(path, err))?;

    Ok(DecodedStream {
        path: path.to_path_buf(),
        reader,
        decoder,
        track_id,
        time_base: params.time_base,
        format: AudioFormat {
            sample_rate,
            channels,
        },
        total_frames: params.n_frames,
        cursor: 0,
        buffer: None,
    })
}

/// Learn the format and length of `path`.
///
/// Containers that do not record their length are decoded to the end.
pub fn probe(path: &Path) -> Result<SourceInfo, AudioSegError> {
    let mut stream = open(path)?;
    let total_frames = match stream.total_frames() {
        Some(frames) => frames,
        None => {
            debug!("'{}' has no frame count, decoding to measure", path.display());
            stream.count_remaining()?
        }
    };

    Ok(SourceInfo {
        format: stream.format(),
        total_frames,
    })
}

impl DecodedStream {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length in frames as recorded by the container, if any.
    pub fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    /// Position the stream so the next chunk starts exactly at `frame`.
    pub fn seek(&mut self, frame: u64) -> Result<(), AudioSegError> {
        if let Some(total) = self.total_frames {
            if frame >= total {
                return Err(self.out_of_range(frame, total));
            }
        }

        if frame > 0 {
            let ts = self.frame_to_ts(frame);
            let seek = self.reader.seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts,
                    track_id: self.track_id,
                },
            );
            match seek {
                Ok(seeked) => {
                    debug!(
                        "seeked '{}' to ts {} for frame {frame}",
                        self.path.display(),
                        seeked.actual_ts
                    );
                    self.decoder.reset();
                }
                Err(SymphoniaError::SeekError(SeekErrorKind::OutOfRange)) => {
                    let available = self.total_frames.unwrap_or(frame);
                    return Err(self.out_of_range(frame, available));
                }
                Err(SymphoniaError::SeekError(_)) | Err(SymphoniaError::Unsupported(_)) => {
                    debug!(
                        "'{}' is not seekable, discarding frames up to {frame}",
                        self.path.display()
                    );
                }
                Err(err) => return Err(AudioSegError::decode(&self.path, err)),
            }
        }

        self.cursor = frame;
        Ok(())
    }

    fn out_of_range(&self, requested: u64, available: u64) -> AudioSegError {
        AudioSegError::SeekOutOfRange {
            path: self.path.clone(),
            requested,
            available,
        }
    }

    fn count_remaining(&mut self) -> Result<u64, AudioSegError> {
        let channels = usize::from(self.format.channels);
        let mut frames = 0u64;
        while let Some(chunk) = self.next_chunk()? {
            frames += (chunk.len() / channels) as u64;
        }
        Ok(frames)
    }

    fn ts_to_frame(&self, ts: u64) -> u64 {
        match self.time_base {
            Some(tb) if !(tb.numer == 1 && tb.denom == self.format.sample_rate) => {
                let scaled = u128::from(ts) * u128::from(tb.numer) * u128::from(self.format.sample_rate);
                (scaled / u128::from(tb.denom.max(1))) as u64
            }
            _ => ts,
        }
    }

    fn frame_to_ts(&self, frame: u64) -> u64 {
        match self.time_base {
            Some(tb) if !(tb.numer == 1 && tb.denom == self.format.sample_rate) => {
                let scaled = u128::from(frame) * u128::from(tb.denom);
                let per = u128::from(tb.numer) * u128::from(self.format.sample_rate);
                (scaled / per.max(1)) as u64
            }
            _ => frame,
        }
    }
}

impl FrameSource for DecodedStream {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn next_chunk(&mut self) -> Result<Option<&[f32]>, AudioSegError> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(err) => return Err(AudioSegError::decode(&self.path, err)),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let start = self.ts_to_frame(packet.ts());
            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(reason)) => {
                    warn!(
                        "skipping corrupt packet in '{}': {reason}",
                        self.path.display()
                    );
                    continue;
                }
                Err(err) => return Err(AudioSegError::decode(&self.path, err)),
            };

            let frames = decoded.frames() as u64;
            let end = start + frames;
            if frames == 0 || end <= self.cursor {
                continue;
            }

            let spec = *decoded.spec();
            let capacity = decoded.capacity();
            let needed = capacity * spec.channels.count();
            if self
                .buffer
                .as_ref()
                .is_some_and(|buffer| buffer.capacity() < needed)
            {
                self.buffer = None;
            }
            let buffer = self
                .buffer
                .get_or_insert_with(|| SampleBuffer::new(capacity as u64, spec));
            buffer.copy_interleaved_ref(decoded);

            let skip = self.cursor.saturating_sub(start) as usize;
            self.cursor = end;
            let channels = usize::from(self.format.channels);
            return Ok(Some(&buffer.samples()[skip * channels..]));
        }
    }
}
