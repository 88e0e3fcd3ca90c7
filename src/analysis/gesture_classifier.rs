// src/analysis/gesture_classifier.rs
//
// Motion-gated gesture classification for the primary hand.
//
// Per frame:
//   1. count extended fingers
//   2. robust anchor flow -> 4-sample windows -> per-axis medians
//   3. normalize to hand-widths/second, EMA smoothing
//   4. downward path integration over a short time window
//   5. hysteresis reset of the vertical/horizontal latches
//   6. vertical swipe, else horizontal swipe, else open palm
//
// Vertical and horizontal latches are independent; each stays set until its
// EMA magnitude decays below `hysteresis_ratio` of the threshold. Open palm
// is latched externally through the owning track's armed flag.

use super::flow_estimator::FlowEstimator;
use super::motion_window::{FlowWindow, PathWindow};
use super::point_tracker::PointTracker;
use crate::frame::GrayFrame;
use crate::landmarks::LandmarkSet;
use crate::types::{Command, Gesture};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const SPEED_EPSILON: f32 = 1e-6;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Tip must sit this many px above its PIP joint to count as extended
    pub finger_up_delta_px: f32,

    pub flow_window: usize,
    /// Same-sign samples required in the flow window before a swipe fires
    pub swipe_consistent_min: usize,

    pub ema_alpha: f32,
    /// Normalized speed thresholds, hand-widths per second
    pub vertical_threshold: f32,
    pub horizontal_threshold: f32,
    /// Latch clears once |ema| <= ratio * threshold
    pub hysteresis_ratio: f32,

    pub vertical_gate_ratio_up: f32,
    pub vertical_gate_ratio_down: f32,
    pub horizontal_gate_ratio: f32,

    pub down_bias: f32,
    pub bottom_margin_px: f32,
    pub bottom_margin_min_scale: f32,

    pub down_path_window_ms: f64,
    pub down_path_capacity: usize,
    pub down_path_threshold: f32,

    /// Static noise floor = max(min_px, ratio * max(width, height))
    pub flow_static_ratio: f32,
    pub flow_static_min_px: f32,

    pub open_palm_min_spread: f32,
    pub open_palm_max_spread: f32,
    pub open_palm_hold_ms: f64,
    pub open_palm_cooldown_ms: f64,
    /// Frame period assumed when converting the open-palm counter to time
    pub nominal_frame_ms: f64,

    pub min_dt_ms: f64,
    pub default_dt_ms: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            finger_up_delta_px: 10.0,
            flow_window: 4,
            swipe_consistent_min: 4,
            ema_alpha: 0.25,
            vertical_threshold: 1.20,
            horizontal_threshold: 1.20,
            hysteresis_ratio: 0.8,
            vertical_gate_ratio_up: 2.2,
            vertical_gate_ratio_down: 1.8,
            horizontal_gate_ratio: 2.2,
            down_bias: 0.90,
            bottom_margin_px: 120.0,
            bottom_margin_min_scale: 0.85,
            down_path_window_ms: 250.0,
            down_path_capacity: 24,
            down_path_threshold: 1.80,
            flow_static_ratio: 0.04,
            flow_static_min_px: 6.0,
            open_palm_min_spread: 1.22,
            open_palm_max_spread: 2.01,
            open_palm_hold_ms: 220.0,
            open_palm_cooldown_ms: 300.0,
            nominal_frame_ms: 33.0,
            min_dt_ms: 16.0,
            default_dt_ms: 33.0,
        }
    }
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone)]
pub struct ClassifierState {
    pub dy_ema: f32,
    pub dx_ema: f32,
    pub dy_gate_high: bool,
    pub dx_gate_high: bool,
    pub flow_dx: FlowWindow,
    pub flow_dy: FlowWindow,
    pub down_path: PathWindow,
    pub open_palm_stable_cnt: u32,
    pub open_palm_armed: bool,
    pub last_motion_cmd_ms: Option<f64>,
    pub last_frame_ms: Option<f64>,
    pub last_primary_track: Option<u32>,
}

impl ClassifierState {
    fn new(config: &ClassifierConfig) -> Self {
        Self {
            dy_ema: 0.0,
            dx_ema: 0.0,
            dy_gate_high: false,
            dx_gate_high: false,
            flow_dx: FlowWindow::new(config.flow_window),
            flow_dy: FlowWindow::new(config.flow_window),
            down_path: PathWindow::new(config.down_path_window_ms, config.down_path_capacity),
            open_palm_stable_cnt: 0,
            open_palm_armed: true,
            last_motion_cmd_ms: None,
            last_frame_ms: None,
            last_primary_track: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Classification {
    pub gesture: Option<Gesture>,
    pub cmd: Option<Command>,
}

impl Classification {
    pub fn none() -> Self {
        Self::default()
    }

    fn emit(gesture: Gesture) -> Self {
        Self {
            gesture: Some(gesture),
            cmd: Some(gesture.command()),
        }
    }
}

/// Per-frame measurements, kept for overlays and debugging
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionSnapshot {
    pub fingers: usize,
    pub dx_med: f32,
    pub dy_med: f32,
    pub dx_norm: f32,
    pub dy_norm: f32,
    pub down_path_sum: f32,
    pub spread: f32,
}

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct GestureClassifier<T: PointTracker> {
    pub config: ClassifierConfig,
    flow: FlowEstimator<T>,
    state: ClassifierState,
    last_snapshot: MotionSnapshot,
}

impl<T: PointTracker> GestureClassifier<T> {
    pub fn new(config: ClassifierConfig, tracker: T) -> Self {
        let state = ClassifierState::new(&config);
        Self {
            config,
            flow: FlowEstimator::new(tracker),
            state,
            last_snapshot: MotionSnapshot::default(),
        }
    }

    /// Classify one frame of the primary hand.
    ///
    /// `armed` is the owning track's open-palm eligibility. At most one
    /// gesture is returned per call.
    pub fn classify(
        &mut self,
        hand: &LandmarkSet,
        frame: &GrayFrame,
        track_id: u32,
        armed: bool,
        timestamp_ms: f64,
    ) -> Classification {
        if self.state.last_primary_track != Some(track_id) {
            if let Some(prev) = self.state.last_primary_track {
                debug!("primary track {} -> {}, clearing flow history", prev, track_id);
            }
            self.reset_motion_history();
            self.state.last_primary_track = Some(track_id);
        }
        self.state.open_palm_armed = armed;

        let cfg = &self.config;
        let fingers = hand.extended_fingers(cfg.finger_up_delta_px);
        let center = hand.palm_center();

        // --- flow ---
        let anchors = hand.anchors(center);
        match self.flow.estimate(frame, &anchors) {
            Ok(Some(sample)) => {
                self.state.flow_dx.push(sample.dx);
                self.state.flow_dy.push(sample.dy);
            }
            Ok(None) => {}
            Err(e) => warn!("hand flow unavailable, using zero: {:#}", e),
        }
        let dx_med = self.state.flow_dx.median();
        let dy_med = self.state.flow_dy.median();

        // --- speed normalization + EMA ---
        let dt_ms = match self.state.last_frame_ms {
            Some(last) => (timestamp_ms - last).max(cfg.min_dt_ms),
            None => cfg.default_dt_ms,
        };
        self.state.last_frame_ms = Some(timestamp_ms);

        let hand_w = hand.hand_width();
        let dt = dt_ms as f32 + SPEED_EPSILON;
        let dx_norm = (dx_med * 1000.0 / dt) / (hand_w + SPEED_EPSILON);
        let dy_norm = (dy_med * 1000.0 / dt) / (hand_w + SPEED_EPSILON);
        let a = cfg.ema_alpha;
        self.state.dy_ema = (1.0 - a) * self.state.dy_ema + a * dy_norm;
        self.state.dx_ema = (1.0 - a) * self.state.dx_ema + a * dx_norm;

        self.state.down_path.push(timestamp_ms, dy_norm);
        let down_path_sum = self.state.down_path.positive_sum();

        // --- hysteresis ---
        if self.state.dy_gate_high
            && self.state.dy_ema.abs() <= cfg.vertical_threshold * cfg.hysteresis_ratio
        {
            self.state.dy_gate_high = false;
            debug!("vertical gate reset (ema {:.2})", self.state.dy_ema);
        }
        if self.state.dx_gate_high
            && self.state.dx_ema.abs() <= cfg.horizontal_threshold * cfg.hysteresis_ratio
        {
            self.state.dx_gate_high = false;
            debug!("horizontal gate reset (ema {:.2})", self.state.dx_ema);
        }

        let spread = hand.spread_ratio(center);
        self.last_snapshot = MotionSnapshot {
            fingers,
            dx_med,
            dy_med,
            dx_norm,
            dy_norm,
            down_path_sum,
            spread,
        };

        // --- vertical swipe ---
        let is_down = dy_med > 0.0;
        let v_gate = if is_down {
            cfg.vertical_gate_ratio_down
        } else {
            cfg.vertical_gate_ratio_up
        };
        let v_thr = if is_down {
            cfg.vertical_threshold * cfg.down_bias * self.bottom_margin_scale(center.y, frame)
        } else {
            cfg.vertical_threshold
        };

        let is_vertical = dy_med.abs() > v_gate * dx_med.abs();
        let speed_pass = self.state.dy_ema.abs() > v_thr;
        let path_pass = is_down && down_path_sum > cfg.down_path_threshold;

        if fingers >= 1
            && is_vertical
            && (speed_pass || path_pass)
            && !self.state.dy_gate_high
            && self.state.flow_dy.consistent(cfg.swipe_consistent_min)
        {
            self.state.dy_gate_high = true;
            self.state.last_motion_cmd_ms = Some(timestamp_ms);
            let gesture = if self.state.dy_ema < 0.0 {
                Gesture::SwipeUp
            } else {
                Gesture::SwipeDown
            };
            info!(
                "👋 {} -> {} (ema {:.2}, path {:.2}, thr {:.2})",
                gesture,
                gesture.command(),
                self.state.dy_ema,
                down_path_sum,
                v_thr
            );
            return Classification::emit(gesture);
        }

        // --- horizontal swipe ---
        let is_horizontal = dx_med.abs() > cfg.horizontal_gate_ratio * dy_med.abs();
        if fingers >= 1
            && is_horizontal
            && self.state.dx_ema.abs() > cfg.horizontal_threshold
            && !self.state.dx_gate_high
            && self.state.flow_dx.consistent(cfg.swipe_consistent_min)
        {
            self.state.dx_gate_high = true;
            self.state.last_motion_cmd_ms = Some(timestamp_ms);
            // mirrored camera: image-space rightward motion is the user's left
            let gesture = if self.state.dx_ema > 0.0 {
                Gesture::SwipeLeft
            } else {
                Gesture::SwipeRight
            };
            info!(
                "👋 {} -> {} (ema {:.2})",
                gesture,
                gesture.command(),
                self.state.dx_ema
            );
            return Classification::emit(gesture);
        }

        // --- open palm ---
        let cooling = self
            .state
            .last_motion_cmd_ms
            .map(|t| timestamp_ms - t < cfg.open_palm_cooldown_ms)
            .unwrap_or(false);
        let static_px = cfg
            .flow_static_min_px
            .max(frame.scale() as f32 * cfg.flow_static_ratio);
        let is_static = dx_med.abs() < static_px && dy_med.abs() < static_px;
        let spread_ok = fingers >= 4
            && (cfg.open_palm_min_spread..=cfg.open_palm_max_spread).contains(&spread);

        if !cooling && is_static && spread_ok && self.state.open_palm_armed {
            self.state.open_palm_stable_cnt += 1;
            let held_ms = self.state.open_palm_stable_cnt as f64 * cfg.nominal_frame_ms;
            if held_ms >= cfg.open_palm_hold_ms {
                self.state.open_palm_stable_cnt = 0;
                self.state.open_palm_armed = false;
                info!(
                    "🖐️ {} -> {} (spread {:.2}, track {})",
                    Gesture::OpenPalm,
                    Command::Toggle,
                    spread,
                    track_id
                );
                return Classification::emit(Gesture::OpenPalm);
            }
        } else {
            self.state.open_palm_stable_cnt = 0;
        }

        Classification::none()
    }

    /// Threshold relaxation near the bottom edge: 1.0 at `bottom_margin_px`
    /// or more, down to `bottom_margin_min_scale` at the edge
    fn bottom_margin_scale(&self, center_y: f32, frame: &GrayFrame) -> f32 {
        let cfg = &self.config;
        let margin = (frame.height as f32 - center_y).max(0.0);
        if margin < cfg.bottom_margin_px {
            let min = cfg.bottom_margin_min_scale;
            min + (1.0 - min) * (margin / cfg.bottom_margin_px)
        } else {
            1.0
        }
    }

    /// Called when no primary hand is present this frame
    pub fn disarm_open_palm(&mut self) {
        self.state.open_palm_armed = false;
        self.state.open_palm_stable_cnt = 0;
    }

    fn reset_motion_history(&mut self) {
        self.flow.reset();
        self.state.flow_dx.clear();
        self.state.flow_dy.clear();
        self.state.down_path.clear();
        self.state.open_palm_stable_cnt = 0;
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    pub fn last_snapshot(&self) -> MotionSnapshot {
        self.last_snapshot
    }
}
