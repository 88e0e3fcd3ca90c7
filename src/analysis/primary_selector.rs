// src/analysis/primary_selector.rs
//
// Picks the single hand that drives gesture classification.
//
// Policy: a freshly chosen primary is locked for `lock_window_ms` as long as
// its track is still detected; otherwise the hand with the largest
// landmark bounding box wins (closest to the camera), first in detection
// order on ties. The lock keeps two similar-sized hands from flapping.

use crate::landmarks::LandmarkSet;
use crate::types::Point2;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub lock_window_ms: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            lock_window_ms: 700.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    LockWindow,
    LargestArea,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimarySelection {
    pub detection_index: usize,
    pub track_id: u32,
    pub center: Point2,
    pub reason: SelectionReason,
}

pub struct PrimarySelector {
    pub config: SelectorConfig,
    primary_track_id: Option<u32>,
    last_primary_set_ms: f64,
    primary_last_center: Option<Point2>,
}

impl PrimarySelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            primary_track_id: None,
            last_primary_set_ms: 0.0,
            primary_last_center: None,
        }
    }

    /// Choose the primary hand among this frame's detections.
    ///
    /// `assignments[i]` is the track id of `hands[i]`.
    pub fn select(
        &mut self,
        hands: &[LandmarkSet],
        assignments: &[u32],
        timestamp_ms: f64,
    ) -> Option<PrimarySelection> {
        if hands.is_empty() {
            return None;
        }

        if let Some(primary_id) = self.primary_track_id {
            if timestamp_ms - self.last_primary_set_ms < self.config.lock_window_ms {
                let locked = assignments
                    .iter()
                    .position(|&tid| tid == primary_id)
                    .filter(|&idx| idx < hands.len());
                if let Some(idx) = locked {
                    let center = hands[idx].palm_center();
                    self.primary_last_center = Some(center);
                    return Some(PrimarySelection {
                        detection_index: idx,
                        track_id: primary_id,
                        center,
                        reason: SelectionReason::LockWindow,
                    });
                }
            }
        }

        let mut best: Option<(usize, f32)> = None;
        for (idx, hand) in hands.iter().enumerate() {
            let area = hand.bbox_area();
            if best.map(|(_, a)| area > a).unwrap_or(true) {
                best = Some((idx, area));
            }
        }
        let (idx, area) = best?;
        let track_id = *assignments.get(idx)?;
        let center = hands[idx].palm_center();

        if self.primary_track_id != Some(track_id) {
            debug!(
                "primary hand -> track {} (area {:.0}px², was {:?})",
                track_id, area, self.primary_track_id
            );
        }
        self.primary_track_id = Some(track_id);
        self.last_primary_set_ms = timestamp_ms;
        self.primary_last_center = Some(center);

        Some(PrimarySelection {
            detection_index: idx,
            track_id,
            center,
            reason: SelectionReason::LargestArea,
        })
    }

    pub fn primary_track_id(&self) -> Option<u32> {
        self.primary_track_id
    }

    pub fn last_center(&self) -> Option<Point2> {
        self.primary_last_center
    }
}

impl Default for PrimarySelector {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::synthetic::hand;

    #[test]
    fn test_no_hands_no_primary() {
        let mut sel = PrimarySelector::default();
        assert!(sel.select(&[], &[], 0.0).is_none());
    }

    #[test]
    fn test_largest_area_wins() {
        let mut sel = PrimarySelector::default();
        let hands = [
            hand(100.0, 200.0, 70.0, 1.0),
            hand(400.0, 200.0, 70.0, 1.3),
        ];
        let pick = sel.select(&hands, &[1, 2], 0.0).unwrap();
        assert_eq!(pick.detection_index, 1);
        assert_eq!(pick.track_id, 2);
        assert_eq!(pick.reason, SelectionReason::LargestArea);
    }

    #[test]
    fn test_tie_goes_to_first_detection() {
        let mut sel = PrimarySelector::default();
        let hands = [
            hand(100.0, 200.0, 70.0, 1.0),
            hand(400.0, 200.0, 70.0, 1.0),
        ];
        assert_eq!(sel.select(&hands, &[1, 2], 0.0).unwrap().track_id, 1);
    }

    #[test]
    fn test_lock_window_holds_then_releases() {
        let mut sel = PrimarySelector::default();
        let a = hand(100.0, 200.0, 70.0, 1.0);
        let b = hand(400.0, 200.0, 70.0, 1.5);

        assert_eq!(sel.select(&[a.clone()], &[1], 0.0).unwrap().track_id, 1);

        for t in [100.0, 400.0, 699.0] {
            let pick = sel.select(&[a.clone(), b.clone()], &[1, 2], t).unwrap();
            assert_eq!(pick.track_id, 1, "t={}", t);
            assert_eq!(pick.reason, SelectionReason::LockWindow);
        }

        let pick = sel.select(&[a.clone(), b.clone()], &[1, 2], 700.0).unwrap();
        assert_eq!(pick.track_id, 2);
        assert_eq!(pick.detection_index, 1);
        assert_eq!(sel.primary_track_id(), Some(2));
    }

    #[test]
    fn test_lost_primary_is_replaced_inside_window() {
        let mut sel = PrimarySelector::default();
        let a = hand(100.0, 200.0, 70.0, 1.5);
        let b = hand(400.0, 200.0, 70.0, 1.0);
        sel.select(&[a, b.clone()], &[1, 2], 0.0);
        let pick = sel.select(&[b], &[2], 100.0).unwrap();
        assert_eq!(pick.track_id, 2);
        assert_eq!(pick.reason, SelectionReason::LargestArea);
    }

    #[test]
    fn test_locked_center_follows_hand() {
        let mut sel = PrimarySelector::default();
        sel.select(&[hand(100.0, 200.0, 70.0, 1.0)], &[1], 0.0);
        let moved = hand(130.0, 210.0, 70.0, 1.0);
        let pick = sel.select(&[moved.clone()], &[1], 33.0).unwrap();
        assert_eq!(pick.center, moved.palm_center());
        assert_eq!(sel.last_center(), Some(moved.palm_center()));
    }
}
