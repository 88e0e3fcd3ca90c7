// src/analysis/flow_estimator.rs
//
// Per-frame hand displacement from sparse optical flow over the anchor set.
//
// The anchors of the previous call are tracked into the current frame;
// each axis is aggregated with an IQR-fenced median so a single anchor
// latching onto background texture cannot drag the estimate.
//
// The estimator always keeps the current frame and anchors as "previous"
// for the next call, whether tracking succeeded or not.

use super::point_tracker::PointTracker;
use super::robust_stats::robust_median;
use crate::frame::GrayFrame;
use crate::landmarks::AnchorSet;
use anyhow::{Context, Result};
use tracing::debug;

/// Robust per-axis displacement in pixels between two consecutive frames
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowSample {
    pub dx: f32,
    pub dy: f32,
    /// Anchors that survived tracking
    pub tracked: usize,
}

impl FlowSample {
    pub fn zero() -> Self {
        Self::default()
    }
}

pub struct FlowEstimator<T: PointTracker> {
    tracker: T,
    prev_frame: Option<GrayFrame>,
    prev_anchors: Option<AnchorSet>,
}

impl<T: PointTracker> FlowEstimator<T> {
    pub fn new(tracker: T) -> Self {
        Self {
            tracker,
            prev_frame: None,
            prev_anchors: None,
        }
    }

    /// Track the previous anchors into `frame`.
    ///
    /// `Ok(None)` while priming (no previous frame yet). A tracker failure
    /// is returned as an error after the previous state has been replaced
    /// by the current frame; callers substitute a zero sample.
    pub fn estimate(
        &mut self,
        frame: &GrayFrame,
        anchors: &AnchorSet,
    ) -> Result<Option<FlowSample>> {
        let Some(prev_anchors) = self.prev_anchors else {
            self.store(frame, anchors);
            return Ok(None);
        };
        let Some(prev_frame) = self.prev_frame.as_ref() else {
            self.store(frame, anchors);
            return Ok(None);
        };

        let result = self
            .tracker
            .track(prev_frame, frame, &prev_anchors.points)
            .with_context(|| format!("{} tracker failed", self.tracker.name()));
        self.store(frame, anchors);
        let tracked = result?;

        let mut dxs = Vec::with_capacity(tracked.len());
        let mut dys = Vec::with_capacity(tracked.len());
        for (old, new) in prev_anchors.points.iter().zip(tracked.iter()) {
            if new.is_tracked() {
                dxs.push(new.position.x - old.x);
                dys.push(new.position.y - old.y);
            }
        }

        if dxs.is_empty() {
            debug!("flow: no anchors survived tracking");
            return Ok(Some(FlowSample::zero()));
        }

        Ok(Some(FlowSample {
            dx: robust_median(&dxs),
            dy: robust_median(&dys),
            tracked: dxs.len(),
        }))
    }

    /// Forget the previous frame so the next call primes again
    pub fn reset(&mut self) {
        self.prev_frame = None;
        self.prev_anchors = None;
    }

    pub fn is_primed(&self) -> bool {
        self.prev_frame.is_some() && self.prev_anchors.is_some()
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    fn store(&mut self, frame: &GrayFrame, anchors: &AnchorSet) {
        match self.prev_frame.as_mut() {
            // reuse the allocation when the size is unchanged
            Some(prev) if prev.data.len() == frame.data.len() => {
                prev.data.copy_from_slice(&frame.data);
                prev.width = frame.width;
                prev.height = frame.height;
            }
            _ => self.prev_frame = Some(frame.clone()),
        }
        self.prev_anchors = Some(*anchors);
    }
}

#[cfg(test)]
mod tests {
    use super::super::point_tracker::testing::{ScriptedTracker, ShiftTracker};
    use super::super::point_tracker::TrackedPoint;
    use super::*;
    use crate::landmarks::synthetic::pointing_hand;
    use crate::types::Point2;

    fn anchors_at(ox: f32, oy: f32) -> AnchorSet {
        let h = pointing_hand(ox, oy);
        h.anchors(h.palm_center())
    }

    #[test]
    fn test_first_call_primes() {
        let (tracker, _shift) = ShiftTracker::new();
        let mut est = FlowEstimator::new(tracker);
        let frame = GrayFrame::filled(64, 48, 0);

        assert!(!est.is_primed());
        assert_eq!(est.estimate(&frame, &anchors_at(30.0, 20.0)).unwrap(), None);
        assert!(est.is_primed());
    }

    #[test]
    fn test_uniform_shift() {
        let (tracker, shift) = ShiftTracker::new();
        let mut est = FlowEstimator::new(tracker);
        let frame = GrayFrame::filled(64, 48, 0);

        est.estimate(&frame, &anchors_at(30.0, 20.0)).unwrap();
        shift.set(Point2::new(-3.0, 18.0));
        let s = est.estimate(&frame, &anchors_at(27.0, 38.0)).unwrap().unwrap();
        assert!((s.dx + 3.0).abs() < 1e-4);
        assert!((s.dy - 18.0).abs() < 1e-4);
        assert_eq!(s.tracked, 10);
    }

    #[test]
    fn test_outlier_anchor_is_excluded() {
        let anchors = anchors_at(100.0, 100.0);
        let dys = [2.0, 2.1, 1.9, 2.0, 2.2, 1.8, 2.0, 2.1, 500.0, 2.0];
        let moved: Vec<TrackedPoint> = anchors
            .points
            .iter()
            .zip(dys.iter())
            .map(|(p, dy)| TrackedPoint::tracked(p.offset(0.0, *dy)))
            .collect();

        let mut est = FlowEstimator::new(ScriptedTracker::new(vec![Some(moved)]));
        let frame = GrayFrame::filled(8, 8, 0);
        est.estimate(&frame, &anchors).unwrap();
        let s = est.estimate(&frame, &anchors).unwrap().unwrap();

        assert!((s.dy - 2.0).abs() < 0.11, "dy={}", s.dy);
        assert_eq!(s.dx, 0.0);
    }

    #[test]
    fn test_lost_points_are_ignored() {
        let anchors = anchors_at(100.0, 100.0);
        let moved: Vec<TrackedPoint> = anchors
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                if i < 3 {
                    TrackedPoint::lost(p.offset(90.0, 90.0))
                } else {
                    TrackedPoint::tracked(p.offset(4.0, 0.0))
                }
            })
            .collect();

        let mut est = FlowEstimator::new(ScriptedTracker::new(vec![Some(moved)]));
        let frame = GrayFrame::filled(8, 8, 0);
        est.estimate(&frame, &anchors).unwrap();
        let s = est.estimate(&frame, &anchors).unwrap().unwrap();
        assert_eq!(s.tracked, 7);
        assert!((s.dx - 4.0).abs() < 1e-4);
        assert_eq!(s.dy, 0.0);
    }

    #[test]
    fn test_no_survivors_gives_zero() {
        let anchors = anchors_at(100.0, 100.0);
        let all_lost = anchors.points.iter().map(|&p| TrackedPoint::lost(p)).collect();
        let mut est = FlowEstimator::new(ScriptedTracker::new(vec![Some(all_lost)]));
        let frame = GrayFrame::filled(8, 8, 0);
        est.estimate(&frame, &anchors).unwrap();
        assert_eq!(est.estimate(&frame, &anchors).unwrap(), Some(FlowSample::zero()));
    }

    #[test]
    fn test_failure_keeps_current_frame_as_previous() {
        let anchors = anchors_at(100.0, 100.0);
        let moved = anchors
            .points
            .iter()
            .map(|p| TrackedPoint::tracked(p.offset(1.0, 1.0)))
            .collect();
        let mut est = FlowEstimator::new(ScriptedTracker::new(vec![None, Some(moved)]));
        let frame = GrayFrame::filled(8, 8, 0);

        est.estimate(&frame, &anchors).unwrap();
        assert!(est.estimate(&frame, &anchors).is_err());
        assert!(est.is_primed());

        // next call tracks from the frame stored during the failed call
        let s = est.estimate(&frame, &anchors).unwrap().unwrap();
        assert_eq!(s.dx, 1.0);
        assert_eq!(est.tracker().calls, 2);
    }
}
