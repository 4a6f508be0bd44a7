//! Window arithmetic for splitting a stream into overlapping segments.

use std::time::Duration;

use crate::error::AudioSegError;

/// One window of the source that a single worker extracts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SegmentPlan {
    /// 1-based position of the segment in the output sequence.
    pub index: u32,
    pub start_frame: u64,
    /// Requested length; the final segment may encode fewer frames.
    pub length_frames: u64,
}

/// Convert `duration` into a frame count at `sample_rate`, rounding up.
pub fn frames_for(duration: Duration, sample_rate: u32) -> u64 {
    let nanos = duration.as_nanos() * u128::from(sample_rate);
    nanos.div_ceil(1_000_000_000).min(u128::from(u64::MAX)) as u64
}

/// Compute the ordered windows covering `total_frames`.
///
/// There are `ceil(total / segment)` windows. Window `i` nominally starts at
/// `(i - 1) * segment_frames` and is pulled back by `overlap_frames`, except
/// that no window starts before frame 0. Every window requests
/// `segment_frames`; the worker truncates the tail.
pub fn plan_windows(
    total_frames: u64,
    segment_frames: u64,
    overlap_frames: u64,
) -> Result<Vec<SegmentPlan>, AudioSegError> {
    if segment_frames == 0 {
        return Err(AudioSegError::InvalidSegmentLength);
    }
    if overlap_frames >= segment_frames {
        return Err(AudioSegError::OverlapExceedsSegment {
            overlap_frames,
            segment_frames,
        });
    }

    let count = total_frames.div_ceil(segment_frames);
    let plans = (0..count)
        .map(|n| SegmentPlan {
            index: (n + 1) as u32,
            start_frame: (n * segment_frames).saturating_sub(overlap_frames),
            length_frames: segment_frames,
        })
        .collect();

    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 44_100;

    fn minutes(m: u64) -> u64 {
        frames_for(Duration::from_secs(m * 60), RATE)
    }

    fn seconds(s: u64) -> u64 {
        frames_for(Duration::from_secs(s), RATE)
    }

    #[test]
    fn twelve_minutes_in_five_minute_windows() {
        let plans = plan_windows(minutes(12), minutes(5), seconds(3)).unwrap();
        assert_eq!(
            plans,
            vec![
                SegmentPlan {
                    index: 1,
                    start_frame: 0,
                    length_frames: minutes(5),
                },
                SegmentPlan {
                    index: 2,
                    start_frame: minutes(5) - seconds(3),
                    length_frames: minutes(5),
                },
                SegmentPlan {
                    index: 3,
                    start_frame: minutes(10) - seconds(3),
                    length_frames: minutes(5),
                },
            ]
        );
    }

    #[test]
    fn short_source_gets_single_window() {
        let plans = plan_windows(minutes(4), minutes(5), seconds(3)).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].start_frame, 0);
        assert_eq!(plans[0].length_frames, minutes(5));
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let plans = plan_windows(300, 100, 10).unwrap();
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[2].start_frame, 190);
    }

    #[test]
    fn count_and_starts_hold_across_inputs() {
        for total in [1u64, 7, 99, 100, 101, 1_000, 12_345] {
            for segment in [1u64, 2, 10, 100, 333] {
                for overlap in [0u64, 1, segment / 2, segment - 1] {
                    if overlap >= segment {
                        continue;
                    }
                    let plans = plan_windows(total, segment, overlap).unwrap();
                    assert_eq!(plans.len() as u64, total.div_ceil(segment));
                    assert_eq!(plans[0].start_frame, 0);
                    for (n, plan) in plans.iter().enumerate() {
                        let nominal = n as u64 * segment;
                        assert_eq!(plan.index as usize, n + 1);
                        assert_eq!(plan.start_frame, nominal.saturating_sub(overlap));
                        assert!(plan.start_frame < total);
                    }
                }
            }
        }
    }

    #[test]
    fn planning_is_deterministic() {
        let first = plan_windows(minutes(61), minutes(5), seconds(3)).unwrap();
        let second = plan_windows(minutes(61), minutes(5), seconds(3)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_overlap_not_shorter_than_segment() {
        assert!(matches!(
            plan_windows(1_000, 100, 100),
            Err(AudioSegError::OverlapExceedsSegment {
                overlap_frames: 100,
                segment_frames: 100
            })
        ));
        assert!(matches!(
            plan_windows(1_000, 100, 250),
            Err(AudioSegError::OverlapExceedsSegment { .. })
        ));
    }

    #[test]
    fn rejects_zero_segment() {
        assert!(matches!(
            plan_windows(1_000, 0, 0),
            Err(AudioSegError::InvalidSegmentLength)
        ));
    }

    #[test]
    fn frames_round_up() {
        assert_eq!(frames_for(Duration::from_secs(3), 8_000), 24_000);
        assert_eq!(frames_for(Duration::from_millis(1), 44_100), 45);
        assert_eq!(frames_for(Duration::ZERO, 44_100), 0);
    }
}
