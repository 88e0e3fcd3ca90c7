// src/analysis/point_tracker.rs
//
// Sparse point tracking between two consecutive grayscale frames.
//
// Two implementations sit behind the PointTracker trait:
//   - PyrLkTracker: OpenCV pyramidal Lucas-Kanade (feature "opencv")
//   - BlockMatchTracker: SAD patch search in plain Rust. Integer-pixel
//     accuracy and slower on large search ranges, but no native deps.
//
// Both report a per-point status; the flow estimator drops lost points.

use crate::frame::GrayFrame;
use crate::types::Point2;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    Tracked,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedPoint {
    pub position: Point2,
    pub status: TrackStatus,
}

impl TrackedPoint {
    pub fn tracked(position: Point2) -> Self {
        Self {
            position,
            status: TrackStatus::Tracked,
        }
    }

    pub fn lost(position: Point2) -> Self {
        Self {
            position,
            status: TrackStatus::Lost,
        }
    }

    pub fn is_tracked(&self) -> bool {
        self.status == TrackStatus::Tracked
    }
}

/// Follows points from `prev` into `next`.
///
/// Returns exactly one entry per input point, in input order.
pub trait PointTracker {
    fn track(
        &mut self,
        prev: &GrayFrame,
        next: &GrayFrame,
        points: &[Point2],
    ) -> Result<Vec<TrackedPoint>>;

    fn name(&self) -> &'static str;
}

impl<T: PointTracker + ?Sized> PointTracker for Box<T> {
    fn track(
        &mut self,
        prev: &GrayFrame,
        next: &GrayFrame,
        points: &[Point2],
    ) -> Result<Vec<TrackedPoint>> {
        (**self).track(prev, next, points)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

fn check_frames(prev: &GrayFrame, next: &GrayFrame) -> Result<()> {
    prev.ensure_valid()?;
    next.ensure_valid()?;
    if prev.width != next.width || prev.height != next.height {
        bail!(
            "frame size changed between calls: {}x{} -> {}x{}",
            prev.width,
            prev.height,
            next.width,
            next.height
        );
    }
    Ok(())
}

fn in_bounds(p: Point2, frame: &GrayFrame) -> bool {
    p.x.is_finite()
        && p.y.is_finite()
        && p.x >= 0.0
        && p.y >= 0.0
        && p.x < frame.width as f32
        && p.y < frame.height as f32
}

// ============================================================================
// PYRAMIDAL LUCAS-KANADE (OpenCV)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PyrLkConfig {
    /// Square search window side in pixels
    pub win_size: i32,
    /// Pyramid levels above the base image
    pub max_level: i32,
    pub max_iterations: i32,
    pub epsilon: f64,
}

impl Default for PyrLkConfig {
    fn default() -> Self {
        Self {
            win_size: 15,
            max_level: 2,
            max_iterations: 20,
            epsilon: 0.03,
        }
    }
}

#[cfg(feature = "opencv")]
pub use self::lk::PyrLkTracker;

#[cfg(feature = "opencv")]
mod lk {
    use super::{check_frames, in_bounds, PointTracker, PyrLkConfig, TrackedPoint};
    use crate::frame::GrayFrame;
    use crate::types::Point2;
    use anyhow::{Context, Result};
    use opencv::{
        core::{self, Point2f, Size, TermCriteria, Vector},
        video,
    };

    pub struct PyrLkTracker {
        config: PyrLkConfig,
    }

    impl PyrLkTracker {
        pub fn new(config: PyrLkConfig) -> Self {
            Self { config }
        }
    }

    impl Default for PyrLkTracker {
        fn default() -> Self {
            Self::new(PyrLkConfig::default())
        }
    }

    impl PointTracker for PyrLkTracker {
        fn track(
            &mut self,
            prev: &GrayFrame,
            next: &GrayFrame,
            points: &[Point2],
        ) -> Result<Vec<TrackedPoint>> {
            check_frames(prev, next)?;
            if points.is_empty() {
                return Ok(Vec::new());
            }

            let prev_mat = prev.to_mat()?;
            let next_mat = next.to_mat()?;

            let prev_pts: Vector<Point2f> =
                points.iter().map(|p| Point2f::new(p.x, p.y)).collect();
            let mut next_pts: Vector<Point2f> = Vector::new();
            let mut status: Vector<u8> = Vector::new();
            let mut err: Vector<f32> = Vector::new();

            let criteria = TermCriteria::new(
                core::TermCriteria_COUNT + core::TermCriteria_EPS,
                self.config.max_iterations,
                self.config.epsilon,
            )?;

            video::calc_optical_flow_pyr_lk(
                &prev_mat,
                &next_mat,
                &prev_pts,
                &mut next_pts,
                &mut status,
                &mut err,
                Size::new(self.config.win_size, self.config.win_size),
                self.config.max_level,
                criteria,
                0,    // flags
                1e-4, // min_eig_threshold
            )
            .context("calcOpticalFlowPyrLK failed")?;

            let tracked = points
                .iter()
                .enumerate()
                .map(|(i, &origin)| {
                    let ok = status.get(i).map(|s| s == 1).unwrap_or(false);
                    match next_pts.get(i) {
                        Ok(p) if ok => {
                            let position = Point2::new(p.x, p.y);
                            if in_bounds(position, next) {
                                TrackedPoint::tracked(position)
                            } else {
                                TrackedPoint::lost(position)
                            }
                        }
                        _ => TrackedPoint::lost(origin),
                    }
                })
                .collect();

            Ok(tracked)
        }

        fn name(&self) -> &'static str {
            "pyr_lk"
        }
    }
}

// ============================================================================
// SAD BLOCK MATCHER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockMatchConfig {
    /// Patch half-size; the compared patch is (2r+1)²
    pub patch_radius: usize,
    /// Maximum displacement searched along each axis (±)
    pub search_range: usize,
    /// Best-match mean absolute difference above which the point is lost
    pub max_mean_abs_diff: f32,
    /// Patches with a smaller intensity range are too flat to match
    pub min_contrast: u8,
}

impl Default for BlockMatchConfig {
    fn default() -> Self {
        Self {
            patch_radius: 7,
            search_range: 24,
            max_mean_abs_diff: 24.0,
            min_contrast: 8,
        }
    }
}

pub struct BlockMatchTracker {
    config: BlockMatchConfig,
}

impl BlockMatchTracker {
    pub fn new(config: BlockMatchConfig) -> Self {
        Self { config }
    }

    /// SAD between the patch centered at (px, py) in `a` and at (qx, qy) in
    /// `b`. Stops accumulating once `limit` is exceeded.
    #[inline]
    #[allow(clippy::too_many_arguments)]
    fn sad(
        &self,
        a: &GrayFrame,
        px: usize,
        py: usize,
        b: &GrayFrame,
        qx: usize,
        qy: usize,
        limit: u32,
    ) -> u32 {
        let r = self.config.patch_radius;
        let mut sum: u32 = 0;
        for dy in 0..=2 * r {
            let a_row = (py - r + dy) * a.width + (px - r);
            let b_row = (qy - r + dy) * b.width + (qx - r);
            for dx in 0..=2 * r {
                let diff = a.data[a_row + dx] as i32 - b.data[b_row + dx] as i32;
                sum += diff.unsigned_abs();
            }
            if sum > limit {
                return sum;
            }
        }
        sum
    }

    fn contrast(&self, frame: &GrayFrame, cx: usize, cy: usize) -> u8 {
        let r = self.config.patch_radius;
        let mut lo = u8::MAX;
        let mut hi = u8::MIN;
        for y in cy - r..=cy + r {
            for x in cx - r..=cx + r {
                let v = frame.pixel(x, y);
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        hi - lo
    }

    fn fits(&self, frame: &GrayFrame, x: i64, y: i64) -> bool {
        let r = self.config.patch_radius as i64;
        x - r >= 0 && y - r >= 0 && x + r < frame.width as i64 && y + r < frame.height as i64
    }

    fn track_one(&self, prev: &GrayFrame, next: &GrayFrame, origin: Point2) -> TrackedPoint {
        if !in_bounds(origin, prev) {
            return TrackedPoint::lost(origin);
        }
        let px = origin.x.round() as i64;
        let py = origin.y.round() as i64;
        if !self.fits(prev, px, py) {
            return TrackedPoint::lost(origin);
        }
        let (px, py) = (px as usize, py as usize);
        if self.contrast(prev, px, py) < self.config.min_contrast {
            return TrackedPoint::lost(origin);
        }

        let range = self.config.search_range as i64;
        let mut best: Option<(i64, i64, u32)> = None;
        // zero displacement first so ties resolve to "no motion"
        let candidates = std::iter::once((0, 0)).chain(
            (-range..=range).flat_map(|dy| (-range..=range).map(move |dx| (dx, dy))),
        );
        for (dx, dy) in candidates {
            let qx = px as i64 + dx;
            let qy = py as i64 + dy;
            if !self.fits(next, qx, qy) {
                continue;
            }
            let limit = best.map(|b| b.2).unwrap_or(u32::MAX);
            let score = self.sad(prev, px, py, next, qx as usize, qy as usize, limit);
            if score < limit {
                best = Some((dx, dy, score));
            }
        }

        let side = 2 * self.config.patch_radius + 1;
        match best {
            Some((dx, dy, score))
                if score as f32 / (side * side) as f32 <= self.config.max_mean_abs_diff =>
            {
                TrackedPoint::tracked(origin.offset(dx as f32, dy as f32))
            }
            _ => TrackedPoint::lost(origin),
        }
    }
}

impl Default for BlockMatchTracker {
    fn default() -> Self {
        Self::new(BlockMatchConfig::default())
    }
}

impl PointTracker for BlockMatchTracker {
    fn track(
        &mut self,
        prev: &GrayFrame,
        next: &GrayFrame,
        points: &[Point2],
    ) -> Result<Vec<TrackedPoint>> {
        check_frames(prev, next)?;
        Ok(points
            .iter()
            .map(|&p| self.track_one(prev, next, p))
            .collect())
    }

    fn name(&self) -> &'static str {
        "block_match"
    }
}

/// Lucas-Kanade when OpenCV is compiled in, block matching otherwise
pub fn default_tracker() -> Box<dyn PointTracker> {
    #[cfg(feature = "opencv")]
    {
        Box::new(PyrLkTracker::default())
    }
    #[cfg(not(feature = "opencv"))]
    {
        Box::new(BlockMatchTracker::default())
    }
}

// ============================================================================
// TEST DOUBLES
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anyhow::anyhow;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Moves every point by a shared, externally adjustable offset
    pub struct ShiftTracker {
        shift: Rc<Cell<Point2>>,
    }

    impl ShiftTracker {
        pub fn new() -> (Self, Rc<Cell<Point2>>) {
            let shift = Rc::new(Cell::new(Point2::default()));
            (
                Self {
                    shift: Rc::clone(&shift),
                },
                shift,
            )
        }
    }

    impl PointTracker for ShiftTracker {
        fn track(
            &mut self,
            _prev: &GrayFrame,
            _next: &GrayFrame,
            points: &[Point2],
        ) -> Result<Vec<TrackedPoint>> {
            let s = self.shift.get();
            Ok(points
                .iter()
                .map(|p| TrackedPoint::tracked(p.offset(s.x, s.y)))
                .collect())
        }

        fn name(&self) -> &'static str {
            "shift"
        }
    }

    /// Replays canned per-call outcomes; `None` entries fail the call
    pub struct ScriptedTracker {
        script: VecDeque<Option<Vec<TrackedPoint>>>,
        pub calls: usize,
    }

    impl ScriptedTracker {
        pub fn new(script: Vec<Option<Vec<TrackedPoint>>>) -> Self {
            Self {
                script: script.into(),
                calls: 0,
            }
        }
    }

    impl PointTracker for ScriptedTracker {
        fn track(
            &mut self,
            _prev: &GrayFrame,
            _next: &GrayFrame,
            points: &[Point2],
        ) -> Result<Vec<TrackedPoint>> {
            self.calls += 1;
            match self.script.pop_front() {
                Some(Some(out)) => Ok(out),
                Some(None) => Err(anyhow!("scripted tracker failure")),
                None => Ok(points.iter().map(|&p| TrackedPoint::lost(p)).collect()),
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }
}
