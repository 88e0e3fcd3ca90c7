// src/analysis/mod.rs
//
// Gesture analysis core.
//
// Signal flow:
//   Landmarks → hand_tracker (identity, armed) → primary_selector ─┐
//   Gray frame + anchors → flow_estimator (point_tracker) ─────────┼→ gesture_classifier → Gesture/Command
//                          motion_window / robust_stats ───────────┘
//   Timestamps → frame_stats
//
// Orchestrated by pipeline::engine::GestureEngine.

pub mod flow_estimator;
pub mod frame_stats;
pub mod gesture_classifier;
pub mod hand_tracker;
pub mod motion_window;
pub mod point_tracker;
pub mod primary_selector;
pub mod robust_stats;

pub use flow_estimator::{FlowEstimator, FlowSample};
pub use frame_stats::{FrameStats, FrameStatsConfig};
pub use gesture_classifier::{
    Classification, ClassifierConfig, ClassifierState, GestureClassifier, MotionSnapshot,
};
pub use hand_tracker::{HandTrack, HandTracker, TrackerConfig};
pub use point_tracker::{
    default_tracker, BlockMatchConfig, BlockMatchTracker, PointTracker, PyrLkConfig, TrackStatus,
    TrackedPoint,
};
#[cfg(feature = "opencv")]
pub use point_tracker::PyrLkTracker;
pub use primary_selector::{PrimarySelection, PrimarySelector, SelectionReason, SelectorConfig};
