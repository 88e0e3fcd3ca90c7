// src/pipeline/engine.rs
//
// Per-frame entry point: landmarks + grayscale frame in, DetectionResult out.
//
// Order per frame:
//   1. frame statistics
//   2. hand tracker update (always, so absence re-arms tracks)
//   3. primary selection
//   4. gesture classification of the primary hand
//   5. open-palm disarm of the owning track
//
// Single-threaded by construction: every component mutates its state in
// place. Run one engine per stream.

use crate::analysis::frame_stats::FrameStats;
use crate::analysis::gesture_classifier::{GestureClassifier, MotionSnapshot};
use crate::analysis::hand_tracker::HandTracker;
use crate::analysis::point_tracker::{default_tracker, PointTracker};
use crate::analysis::primary_selector::{PrimarySelection, PrimarySelector};
use crate::frame::GrayFrame;
use crate::landmarks::LandmarkSet;
use crate::types::{DetectionResult, EngineConfig, Gesture, Point2};
use anyhow::{bail, Result};
use tracing::{debug, warn};

pub struct GestureEngine<T: PointTracker> {
    tracker: HandTracker,
    selector: PrimarySelector,
    classifier: GestureClassifier<T>,
    stats: FrameStats,
    last_primary: Option<PrimarySelection>,
    frame_count: u64,
}

impl GestureEngine<Box<dyn PointTracker>> {
    /// Engine with the best point tracker compiled into this build
    pub fn with_default_tracker(config: EngineConfig) -> Self {
        Self::new(config, default_tracker())
    }
}

impl<T: PointTracker> GestureEngine<T> {
    pub fn new(config: EngineConfig, point_tracker: T) -> Self {
        debug!("gesture engine using {} point tracker", point_tracker.name());
        Self {
            tracker: HandTracker::new(config.tracker),
            selector: PrimarySelector::new(config.selector),
            classifier: GestureClassifier::new(config.classifier, point_tracker),
            stats: FrameStats::new(config.frame_stats),
            last_primary: None,
            frame_count: 0,
        }
    }

    /// Process one frame. Never fails: a frame that cannot be processed
    /// yields a neutral result.
    pub fn process_frame(
        &mut self,
        frame: &GrayFrame,
        hands: &[LandmarkSet],
        timestamp_ms: f64,
    ) -> DetectionResult {
        match self.try_process_frame(frame, hands, timestamp_ms) {
            Ok(result) => result,
            Err(e) => {
                warn!("frame {} dropped: {:#}", self.frame_count, e);
                self.last_primary = None;
                DetectionResult::neutral(self.stats.fps())
            }
        }
    }

    pub fn try_process_frame(
        &mut self,
        frame: &GrayFrame,
        hands: &[LandmarkSet],
        timestamp_ms: f64,
    ) -> Result<DetectionResult> {
        self.frame_count += 1;
        if !timestamp_ms.is_finite() {
            bail!("non-finite timestamp {}", timestamp_ms);
        }
        frame.ensure_valid()?;

        let fps = self.stats.tick(timestamp_ms);

        let centers: Vec<Point2> = hands.iter().map(|h| h.palm_center()).collect();
        let assignments = self.tracker.update(&centers, timestamp_ms);

        let Some(primary) = self.selector.select(hands, &assignments, timestamp_ms) else {
            self.classifier.disarm_open_palm();
            self.last_primary = None;
            return Ok(DetectionResult {
                hand_present: !hands.is_empty(),
                num_hands: hands.len(),
                gesture: None,
                cmd: None,
                primary_center: None,
                fps,
            });
        };

        let hand = &hands[primary.detection_index];
        let armed = self.tracker.is_armed(primary.track_id);
        let classification =
            self.classifier
                .classify(hand, frame, primary.track_id, armed, timestamp_ms);

        if classification.gesture == Some(Gesture::OpenPalm) {
            self.tracker.disarm(primary.track_id);
        }
        self.last_primary = Some(primary);

        Ok(DetectionResult {
            hand_present: true,
            num_hands: hands.len(),
            gesture: classification.gesture,
            cmd: classification.cmd,
            primary_center: Some(primary.center),
            fps,
        })
    }

    /// Primary selection of the most recent frame, if it had one
    pub fn last_primary(&self) -> Option<PrimarySelection> {
        self.last_primary
    }

    /// Flow measurements behind the most recent classification
    pub fn motion_snapshot(&self) -> Option<MotionSnapshot> {
        self.last_primary.map(|_| self.classifier.last_snapshot())
    }

    pub fn hand_tracker(&self) -> &HandTracker {
        &self.tracker
    }
}
