//! Concurrent execution of a [`SegmentationJob`].

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use rayon::prelude::*;

use crate::error::AudioSegError;
use crate::naming::OutputNaming;
use crate::plan::SegmentPlan;
use crate::sink::WavEncoding;
use crate::source::AudioFormat;
use crate::worker;

/// Everything the workers of one split share, read-only.
#[derive(Clone, Debug)]
pub struct SegmentationJob {
    pub source: PathBuf,
    pub format: AudioFormat,
    pub total_frames: u64,
    pub plans: Vec<SegmentPlan>,
    pub naming: OutputNaming,
    pub encoding: WavEncoding,
    pub overwrite: bool,
}

impl SegmentationJob {
    pub fn output_path(&self, plan: &SegmentPlan) -> PathBuf {
        self.naming.path_for(plan.index)
    }

    pub fn total_duration(&self) -> Duration {
        Duration::from_secs_f64(self.total_frames as f64 / f64::from(self.format.sample_rate))
    }
}

/// Shared flag telling workers to stop.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Knobs controlling how a job is executed.
#[derive(Clone, Debug)]
pub struct ExecuteSettings {
    /// Maximum number of segments processed at once.
    pub threads: NonZeroUsize,
    /// Cancel the remaining segments after the first failure.
    pub fail_fast: bool,
    pub segment_timeout: Option<Duration>,
}

/// Result of one worker.
#[derive(Debug)]
pub struct SegmentOutcome {
    pub plan: SegmentPlan,
    pub path: PathBuf,
    /// Frames written, or why the segment failed.
    pub result: Result<u64, AudioSegError>,
}

impl SegmentOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of every segment of a job, ordered by index.
#[derive(Debug)]
pub struct SplitReport {
    pub outcomes: Vec<SegmentOutcome>,
}

impl SplitReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = (&SegmentOutcome, &AudioSegError)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().err().map(|err| (outcome, err)))
    }
}

/// Notification emitted while a job runs.
///
/// Events may arrive from several worker threads at once.
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    Start {
        segments: usize,
        total_duration: Duration,
    },
    SegmentStarted {
        plan: &'a SegmentPlan,
    },
    SegmentFinished {
        outcome: &'a SegmentOutcome,
    },
    Finish {
        report: &'a SplitReport,
    },
}

pub trait ProgressReporter: Sync {
    fn report(&self, _event: ProgressEvent<'_>) {}
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Run one worker per plan, at most `settings.threads` at a time, and wait
/// for all of them.
///
/// A failing segment never aborts its siblings unless `fail_fast` is set, in
/// which case segments that have not finished report
/// [`AudioSegError::Cancelled`].
pub fn execute(
    job: &SegmentationJob,
    settings: &ExecuteSettings,
    reporter: &dyn ProgressReporter,
) -> Result<SplitReport, AudioSegError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.threads.get())
        .thread_name(|n| format!("segment-worker-{n}"))
        .build()?;

    let cancel = CancelToken::new();
    reporter.report(ProgressEvent::Start {
        segments: job.plans.len(),
        total_duration: job.total_duration(),
    });

    let outcomes: Vec<SegmentOutcome> = pool.install(|| {
        job.plans
            .par_iter()
            .map(|plan| {
                reporter.report(ProgressEvent::SegmentStarted { plan });
                let result = worker::run_segment(job, plan, &cancel, settings.segment_timeout);

                if let Err(err) = &result {
                    warn!("segment {} failed: {err}", plan.index);
                    if settings.fail_fast && !matches!(err, AudioSegError::Cancelled(_)) {
                        cancel.cancel();
                    }
                }

                let outcome = SegmentOutcome {
                    plan: *plan,
                    path: job.output_path(plan),
                    result,
                };
                reporter.report(ProgressEvent::SegmentFinished { outcome: &outcome });
                outcome
            })
            .collect()
    });

    let report = SplitReport { outcomes };
    info!(
        "wrote {} of {} segment(s) of '{}'",
        report.succeeded(),
        report.total(),
        job.source.display()
    );
    reporter.report(ProgressEvent::Finish { report: &report });

    Ok(report)
}
