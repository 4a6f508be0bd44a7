//! Split long recordings into fixed-length, slightly overlapping clips.
//!
//! The source is probed once to learn its format and length, planned into
//! windows by [`plan_windows`], and each window is then re-decoded and
//! encoded by its own worker on a bounded thread pool.

mod collate;
mod coordinator;
mod error;
mod mix;
mod naming;
mod plan;
mod sink;
mod source;
mod worker;

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::debug;

pub use collate::{collate, collect_inputs, CollateConfig, CollateSummary};
pub use coordinator::{
    execute, CancelToken, ExecuteSettings, NoProgress, ProgressEvent, ProgressReporter,
    SegmentOutcome, SegmentationJob, SplitReport,
};
pub use error::{AudioSegError, ErrorKind};
pub use mix::{gain_for, mix, MixConfig, Volume, VOLUME_BASE};
pub use naming::{default_output_dir, ensure_dir, OutputNaming, DEFAULT_SUBDIR};
pub use plan::{frames_for, plan_windows, SegmentPlan};
pub use sink::{write_wav, CreateMode, WavEncoding, WavSink};
pub use source::{open, probe, AudioFormat, DecodedStream, FrameSource, SourceInfo, Take};

/// Lead-in shared by consecutive segments unless configured otherwise.
pub const DEFAULT_OVERLAP: Duration = Duration::from_secs(3);

/// Upper bound on the number of segments a single run may produce.
pub const DEFAULT_MAX_SEGMENTS: u64 = 50_000;

/// Configuration for the audio splitting operation.
#[derive(Clone, Debug)]
pub struct Config {
    /// Canonicalized path of the source file to split.
    pub input_path: PathBuf,
    /// Directory into which the segments are written.
    pub output_dir: PathBuf,
    /// Nominal length of each segment.
    pub segment_length: Duration,
    /// How far every segment but the first starts before its boundary.
    pub overlap: Duration,
    /// Maximum number of segments processed at once.
    pub threads: NonZeroUsize,
    /// Replace existing output files instead of failing those segments.
    pub overwrite: bool,
    /// Cancel the remaining segments after the first failure.
    pub fail_fast: bool,
    /// Sample format of the written WAV files.
    pub encoding: WavEncoding,
    /// Longest a single segment may take before it is abandoned.
    pub segment_timeout: Option<Duration>,
    /// Refuse to run when the plan would produce more segments than this.
    pub max_segments: u64,
}

impl Config {
    /// Build a configuration with every optional setting at its default.
    pub fn new<P: AsRef<Path>>(input: P, segment_length: Duration) -> Result<Self, AudioSegError> {
        Self::builder(input, segment_length).build()
    }

    pub fn builder<P: AsRef<Path>>(input: P, segment_length: Duration) -> ConfigBuilder {
        ConfigBuilder {
            input: input.as_ref().to_path_buf(),
            output_dir: None,
            segment_length,
            overlap: DEFAULT_OVERLAP,
            threads: None,
            overwrite: false,
            fail_fast: false,
            encoding: WavEncoding::default(),
            segment_timeout: None,
            max_segments: DEFAULT_MAX_SEGMENTS,
        }
    }

    /// File stem used in every output name.
    pub fn stem(&self) -> Result<String, AudioSegError> {
        naming::source_stem(&self.input_path)
    }

    fn execute_settings(&self) -> ExecuteSettings {
        ExecuteSettings {
            threads: self.threads,
            fail_fast: self.fail_fast,
            segment_timeout: self.segment_timeout,
        }
    }
}

/// Builder returned by [`Config::builder`].
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    input: PathBuf,
    output_dir: Option<PathBuf>,
    segment_length: Duration,
    overlap: Duration,
    threads: Option<NonZeroUsize>,
    overwrite: bool,
    fail_fast: bool,
    encoding: WavEncoding,
    segment_timeout: Option<Duration>,
    max_segments: u64,
}

impl ConfigBuilder {
    /// Write segments here instead of `<source dir>/split`.
    pub fn output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.output_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn overlap(mut self, overlap: Duration) -> Self {
        self.overlap = overlap;
        self
    }

    /// Cap on concurrently processed segments. Defaults to the available
    /// parallelism of the machine.
    pub fn threads(mut self, threads: NonZeroUsize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn encoding(mut self, encoding: WavEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn segment_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.segment_timeout = timeout;
        self
    }

    pub fn max_segments(mut self, max_segments: u64) -> Self {
        self.max_segments = max_segments;
        self
    }

    pub fn build(self) -> Result<Config, AudioSegError> {
        if self.segment_length.is_zero() {
            return Err(AudioSegError::InvalidSegmentLength);
        }
        if self.overlap >= self.segment_length {
            return Err(AudioSegError::OverlapTooLong {
                overlap: self.overlap,
                segment: self.segment_length,
            });
        }

        let input_path = fs::canonicalize(&self.input).map_err(|source| AudioSegError::Open {
            path: self.input.clone(),
            source,
        })?;
        naming::source_stem(&input_path)?;

        let output_dir = self
            .output_dir
            .unwrap_or_else(|| naming::default_output_dir(&input_path));
        let threads = self.threads.unwrap_or_else(|| {
            thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
        });

        Ok(Config {
            input_path,
            output_dir,
            segment_length: self.segment_length,
            overlap: self.overlap,
            threads,
            overwrite: self.overwrite,
            fail_fast: self.fail_fast,
            encoding: self.encoding,
            segment_timeout: self.segment_timeout,
            max_segments: self.max_segments,
        })
    }
}

/// A planned segment together with the file it will be written to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedSegment {
    pub plan: SegmentPlan,
    pub path: PathBuf,
}

/// Probe the source and compute the job without writing anything.
pub fn prepare(config: &Config) -> Result<SegmentationJob, AudioSegError> {
    let info = probe(&config.input_path)?;
    if info.total_frames == 0 {
        return Err(AudioSegError::EmptySource(config.input_path.clone()));
    }

    let segment_frames = frames_for(config.segment_length, info.format.sample_rate);
    let overlap_frames = frames_for(config.overlap, info.format.sample_rate);

    let planned = info.total_frames.div_ceil(segment_frames.max(1));
    if planned > config.max_segments {
        return Err(AudioSegError::SegmentLimitExceeded {
            planned,
            limit: config.max_segments,
        });
    }

    let plans = plan_windows(info.total_frames, segment_frames, overlap_frames)?;
    debug!(
        "planned {} segment(s) of {segment_frames} frames with {overlap_frames} frames of overlap over {} frames ({})",
        plans.len(),
        info.total_frames,
        info.format
    );

    Ok(SegmentationJob {
        source: config.input_path.clone(),
        format: info.format,
        total_frames: info.total_frames,
        naming: OutputNaming::new(&config.output_dir, config.stem()?, plans.len() as u64),
        plans,
        encoding: config.encoding,
        overwrite: config.overwrite,
    })
}

/// Output paths that a run with `config` would produce.
pub fn plan_segments(config: &Config) -> Result<Vec<PlannedSegment>, AudioSegError> {
    let job = prepare(config)?;
    Ok(job
        .plans
        .iter()
        .map(|plan| PlannedSegment {
            plan: *plan,
            path: job.output_path(plan),
        })
        .collect())
}

/// Perform the splitting operation using the supplied [`Config`].
///
/// Errors before any segment is dispatched are returned directly; failures
/// of individual segments are collected in the [`SplitReport`].
pub fn run(config: Config) -> Result<SplitReport, AudioSegError> {
    run_with_progress(config, &NoProgress)
}

pub fn run_with_progress(
    config: Config,
    reporter: &dyn ProgressReporter,
) -> Result<SplitReport, AudioSegError> {
    let job = prepare(&config)?;
    execute(&job, &config.execute_settings(), reporter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_zero_length() {
        let err = Config::builder("whatever.wav", Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, AudioSegError::InvalidSegmentLength));
    }

    #[test]
    fn builder_rejects_overlap_not_shorter_than_segment() {
        let err = Config::builder("whatever.wav", Duration::from_secs(3))
            .build()
            .unwrap_err();
        assert!(matches!(err, AudioSegError::OverlapTooLong { .. }));
    }

    #[test]
    fn builder_reports_missing_input() {
        let err = Config::new("/definitely/missing.mp3", Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, AudioSegError::Open { .. }));
    }

    #[test]
    fn builder_defaults_output_next_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("show.mp3");
        fs::write(&input, b"").unwrap();

        let config = Config::new(&input, Duration::from_secs(300)).unwrap();
        let canonical = fs::canonicalize(dir.path()).unwrap();
        assert_eq!(config.output_dir, canonical.join(DEFAULT_SUBDIR));
        assert_eq!(config.overlap, DEFAULT_OVERLAP);
        assert_eq!(config.stem().unwrap(), "show");
        assert!(!config.overwrite);
    }
}
