use std::time::{Duration, Instant};

use log::info;

use crate::coordinator::{CancelToken, SegmentationJob};
use crate::error::AudioSegError;
use crate::naming;
use crate::plan::SegmentPlan;
use crate::sink::{self, CreateMode};
use crate::source::{self, AudioFormat, FrameSource};

/// Stops a stream once the job is cancelled or the segment runs too long.
///
/// Both checks run between chunks. A read that blocks inside the decoder is
/// not interrupted, so the deadline can be overshot by one packet's decode.
struct Guarded<S> {
    inner: S,
    index: u32,
    cancel: CancelToken,
    deadline: Option<(Instant, Duration)>,
}

impl<S: FrameSource> FrameSource for Guarded<S> {
    fn format(&self) -> AudioFormat {
        self.inner.format()
    }

    fn next_chunk(&mut self) -> Result<Option<&[f32]>, AudioSegError> {
        if self.cancel.is_cancelled() {
            return Err(AudioSegError::Cancelled(self.index));
        }
        if let Some((deadline, timeout)) = self.deadline {
            if Instant::now() >= deadline {
                return Err(AudioSegError::TimedOut {
                    index: self.index,
                    timeout_ms: timeout.as_millis(),
                });
            }
        }
        self.inner.next_chunk()
    }
}

/// Extract `plan` from the job's source into its own file.
///
/// The source is decoded afresh, so nothing here is shared with sibling
/// workers except the read-only job and the cancellation flag. Returns the
/// number of frames written.
pub(crate) fn run_segment(
    job: &SegmentationJob,
    plan: &SegmentPlan,
    cancel: &CancelToken,
    timeout: Option<Duration>,
) -> Result<u64, AudioSegError> {
    if cancel.is_cancelled() {
        return Err(AudioSegError::Cancelled(plan.index));
    }

    let started = Instant::now();
    info!(
        "started segment {} from frame {} ({} frames)",
        plan.index, plan.start_frame, plan.length_frames
    );

    let mut stream = source::open(&job.source)?;
    stream.seek(plan.start_frame)?;

    let mut clip = Guarded {
        inner: stream.take(plan.length_frames),
        index: plan.index,
        cancel: cancel.clone(),
        deadline: timeout.map(|timeout| (started + timeout, timeout)),
    };

    naming::ensure_dir(&job.naming.dir)?;
    let path = job.naming.path_for(plan.index);
    info!("encoding segment {} to '{}'", plan.index, path.display());

    let frames = sink::write_wav(
        &path,
        &mut clip,
        job.encoding,
        CreateMode::from_overwrite(job.overwrite),
    )?;

    if frames == 0 {
        // Only reachable when the container did not record its length.
        sink::discard(&path);
        return Err(AudioSegError::SeekOutOfRange {
            path: job.source.clone(),
            requested: plan.start_frame,
            available: job.total_frames,
        });
    }

    info!(
        "finished segment {} ({frames} frames) in {:.2?}",
        plan.index,
        started.elapsed()
    );
    Ok(frames)
}
