use std::path::PathBuf;
use std::time::Duration;

use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

use crate::source::AudioFormat;

/// Errors that can occur while segmenting, collating or mixing audio files.
#[derive(Debug, Error)]
pub enum AudioSegError {
    /// The requested segment length is zero or rounds down to zero frames.
    #[error("segment length must be greater than zero")]
    InvalidSegmentLength,

    /// The overlap would make consecutive windows overlap entirely.
    #[error("overlap of {overlap_frames} frames must be shorter than the segment length of {segment_frames} frames")]
    OverlapExceedsSegment {
        overlap_frames: u64,
        segment_frames: u64,
    },

    /// Same check as [`AudioSegError::OverlapExceedsSegment`], before the
    /// sample rate is known.
    #[error("overlap of {overlap:?} must be shorter than the segment length of {segment:?}")]
    OverlapTooLong { overlap: Duration, segment: Duration },

    /// A file name cannot be derived from the input path.
    #[error("failed to derive a base name for '{}'", .0.display())]
    InvalidInputName(PathBuf),

    /// The source decodes to zero frames.
    #[error("'{}' contains no audio frames", .0.display())]
    EmptySource(PathBuf),

    /// Splitting would produce more segments than the configured limit.
    #[error("splitting would produce {planned} segments, more than the limit of {limit}")]
    SegmentLimitExceeded { planned: u64, limit: u64 },

    /// The volume passed to mix is NaN or infinite.
    #[error("volume must be a finite number, got {0}")]
    InvalidVolume(f64),

    /// Collate found nothing to concatenate.
    #[error("no input files found in '{}'", .0.display())]
    NoInputFiles(PathBuf),

    /// Collate inputs disagree on sample rate or channel count.
    #[error("'{}' is {found} but the collation is {expected}", .path.display())]
    FormatMismatch {
        path: PathBuf,
        expected: AudioFormat,
        found: AudioFormat,
    },

    #[error("failed to open '{}'", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode '{}'", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: SymphoniaError,
    },

    #[error("'{}' does not provide a default track", .0.display())]
    MissingDefaultTrack(PathBuf),

    #[error("'{}' uses an unsupported codec", .0.display())]
    UnsupportedCodec(PathBuf),

    #[error("'{}' does not advertise a sample rate", .0.display())]
    MissingSampleRate(PathBuf),

    #[error("'{}' does not advertise a channel layout", .0.display())]
    MissingChannels(PathBuf),

    /// The requested start lies at or beyond the end of the stream.
    #[error("cannot seek '{}' to frame {requested}: stream ends at frame {available}", .path.display())]
    SeekOutOfRange {
        path: PathBuf,
        requested: u64,
        available: u64,
    },

    #[error("failed to create directory '{}'", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The destination exists and overwriting was not requested.
    #[error("output file '{}' already exists (use --overwrite to replace it)", .0.display())]
    OutputExists(PathBuf),

    #[error("failed to create '{}'", .path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode '{}'", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    /// The job was cancelled before or while this segment was processed.
    #[error("segment {0} was cancelled")]
    Cancelled(u32),

    #[error("segment {index} exceeded the timeout of {timeout_ms}ms")]
    TimedOut { index: u32, timeout_ms: u128 },

    #[error("failed to start the worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Coarse classification of [`AudioSegError`] used for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    SourceAccess,
    SeekOutOfRange,
    Encode,
    Interrupted,
    Internal,
}

impl AudioSegError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSegmentLength
            | Self::OverlapExceedsSegment { .. }
            | Self::OverlapTooLong { .. }
            | Self::InvalidInputName(_)
            | Self::EmptySource(_)
            | Self::SegmentLimitExceeded { .. }
            | Self::InvalidVolume(_)
            | Self::NoInputFiles(_)
            | Self::FormatMismatch { .. } => ErrorKind::Configuration,
            Self::Open { .. }
            | Self::Decode { .. }
            | Self::MissingDefaultTrack(_)
            | Self::UnsupportedCodec(_)
            | Self::MissingSampleRate(_)
            | Self::MissingChannels(_) => ErrorKind::SourceAccess,
            Self::SeekOutOfRange { .. } => ErrorKind::SeekOutOfRange,
            Self::CreateDirectory { .. }
            | Self::OutputExists(_)
            | Self::CreateFile { .. }
            | Self::Encode { .. } => ErrorKind::Encode,
            Self::Cancelled(_) | Self::TimedOut { .. } => ErrorKind::Interrupted,
            Self::ThreadPool(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, source: SymphoniaError) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn encode(path: impl Into<PathBuf>, source: hound::Error) -> Self {
        match source {
            hound::Error::IoError(err) => Self::CreateFile {
                path: path.into(),
                source: err,
            },
            other => Self::Encode {
                path: path.into(),
                source: other,
            },
        }
    }
}
