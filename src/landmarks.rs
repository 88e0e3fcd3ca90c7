// src/landmarks.rs
//
// 21-point hand skeleton as returned by the external landmark detector,
// already mapped into processing-frame pixels.
//
// Index layout:
//   0 wrist
//   1-4   thumb  (CMC, MCP, IP, tip)
//   5-8   index  (MCP, PIP, DIP, tip)
//   9-12  middle
//   13-16 ring
//   17-20 pinky

use crate::types::Point2;
use anyhow::{bail, Result};

pub const NUM_LANDMARKS: usize = 21;

pub const WRIST: usize = 0;
pub const INDEX_MCP: usize = 5;
pub const MIDDLE_MCP: usize = 9;
pub const RING_MCP: usize = 13;
pub const PINKY_MCP: usize = 17;

/// (tip, PIP) pairs of the four non-thumb fingers
pub const FINGER_TIP_PIP: [(usize, usize); 4] = [(8, 6), (12, 10), (16, 14), (20, 18)];
pub const FINGERTIPS: [usize; 4] = [8, 12, 16, 20];

/// Landmarks tracked by optical flow, after the palm center
pub const ANCHOR_LANDMARKS: [usize; 9] = [0, 5, 9, 13, 17, 8, 12, 16, 20];
pub const NUM_ANCHORS: usize = ANCHOR_LANDMARKS.len() + 1;

/// Bone list for skeleton overlays
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (13, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (0, 17),
];

const WIDTH_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: [Point2; NUM_LANDMARKS],
}

impl LandmarkSet {
    pub fn new(points: [Point2; NUM_LANDMARKS]) -> Self {
        Self { points }
    }

    pub fn from_points(points: &[Point2]) -> Result<Self> {
        if points.len() != NUM_LANDMARKS {
            bail!(
                "hand skeleton needs {} landmarks, got {}",
                NUM_LANDMARKS,
                points.len()
            );
        }
        let mut arr = [Point2::default(); NUM_LANDMARKS];
        arr.copy_from_slice(points);
        Ok(Self::new(arr))
    }

    /// Map detector output in [0, 1] into pixel coordinates of a
    /// `width` x `height` frame.
    pub fn from_normalized(points: &[Point2], width: usize, height: usize) -> Result<Self> {
        let scaled: Vec<Point2> = points
            .iter()
            .map(|p| Point2::new(p.x * width as f32, p.y * height as f32))
            .collect();
        Self::from_points(&scaled)
    }

    pub fn points(&self) -> &[Point2; NUM_LANDMARKS] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Point2 {
        self.points[index]
    }

    /// Mean of the wrist and the index/pinky knuckles
    pub fn palm_center(&self) -> Point2 {
        let a = self.points[WRIST];
        let b = self.points[INDEX_MCP];
        let c = self.points[PINKY_MCP];
        Point2::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0)
    }

    /// Horizontal span between the index and pinky knuckles, never zero
    pub fn hand_width(&self) -> f32 {
        (self.points[PINKY_MCP].x - self.points[INDEX_MCP].x).abs() + WIDTH_EPSILON
    }

    /// Axis-aligned bounding box area in px², at least 1
    pub fn bbox_area(&self) -> f32 {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        ((max_x - min_x) * (max_y - min_y)).max(1.0)
    }

    /// Tip at least `delta_px` above its PIP joint (image y grows downward)
    pub fn is_finger_up(&self, tip: usize, pip: usize, delta_px: f32) -> bool {
        self.points[tip].y < self.points[pip].y - delta_px
    }

    /// Number of extended non-thumb fingers, 0..=4
    pub fn extended_fingers(&self, delta_px: f32) -> usize {
        FINGER_TIP_PIP
            .iter()
            .filter(|(tip, pip)| self.is_finger_up(*tip, *pip, delta_px))
            .count()
    }

    /// Mean fingertip distance from `center` divided by hand width
    pub fn spread_ratio(&self, center: Point2) -> f32 {
        let total: f32 = FINGERTIPS
            .iter()
            .map(|&t| self.points[t].distance(&center))
            .sum();
        (total / FINGERTIPS.len() as f32) / self.hand_width()
    }

    /// Optical-flow anchors: palm center followed by wrist, MCPs and tips
    pub fn anchors(&self, center: Point2) -> AnchorSet {
        let mut points = [center; NUM_ANCHORS];
        for (slot, &idx) in points[1..].iter_mut().zip(ANCHOR_LANDMARKS.iter()) {
            *slot = self.points[idx];
        }
        AnchorSet { points }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorSet {
    pub points: [Point2; NUM_ANCHORS],
}

#[cfg(test)]
pub(crate) mod synthetic {
    use super::*;

    /// Synthetic right hand with palm-up orientation.
    ///
    /// Knuckles sit on y = `oy`, spaced so the hand width is `120 * scale`.
    /// Fingertips reach `reach * scale` above the knuckles; PIP joints sit
    /// at 40% of that, so any reach above ~17 px counts as extended. A
    /// negative reach curls the fingers below their PIPs.
    pub fn hand(ox: f32, oy: f32, reach: f32, scale: f32) -> LandmarkSet {
        let s = scale;
        let mut pts = [Point2::default(); NUM_LANDMARKS];
        pts[0] = Point2::new(ox, oy + 60.0 * s);
        pts[1] = Point2::new(ox - 70.0 * s, oy + 40.0 * s);
        pts[2] = Point2::new(ox - 85.0 * s, oy + 20.0 * s);
        pts[3] = Point2::new(ox - 95.0 * s, oy);
        pts[4] = Point2::new(ox - 100.0 * s, oy - 15.0 * s);
        let finger_x = [-60.0, -20.0, 20.0, 60.0];
        for (f, fx) in finger_x.iter().enumerate() {
            let base = 5 + f * 4;
            let x = ox + fx * s;
            let (pip, dip, tip) = if reach >= 0.0 {
                (reach * 0.4, reach * 0.7, reach)
            } else {
                // curled: PIP up, tip folded back below it
                (30.0, 15.0, -reach * 0.3)
            };
            pts[base] = Point2::new(x, oy);
            pts[base + 1] = Point2::new(x, oy - pip * s);
            pts[base + 2] = Point2::new(x, oy - dip * s);
            pts[base + 3] = Point2::new(x, oy - tip * s);
        }
        LandmarkSet::new(pts)
    }

    /// Four fingers up, spread ratio well below the open-palm band
    pub fn pointing_hand(ox: f32, oy: f32) -> LandmarkSet {
        hand(ox, oy, 70.0, 1.0)
    }

    /// Four fingers up, spread ratio inside the open-palm band
    pub fn open_palm(ox: f32, oy: f32) -> LandmarkSet {
        hand(ox, oy, 140.0, 1.0)
    }

    pub fn fist(ox: f32, oy: f32) -> LandmarkSet {
        hand(ox, oy, -30.0, 1.0)
    }
}
