// src/pipeline/metrics.rs
//
// Session counters for a replay or live run. Cheap to clone and share with
// a reporting thread; every counter is a relaxed atomic.

use crate::types::{Command, DetectionResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct SessionMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub frames_with_hands: Arc<AtomicU64>,
    pub multi_hand_frames: Arc<AtomicU64>,
    pub neutral_frames: Arc<AtomicU64>,
    pub commands_emitted: Arc<AtomicU64>,
    pub commands_throttled: Arc<AtomicU64>,
    pub repeats_suppressed: Arc<AtomicU64>,
    pub primary_switches: Arc<AtomicU64>,
    pub engine_time_us: Arc<AtomicU64>,
    per_command: Arc<[AtomicU64; 5]>,
    pub started_at: Instant,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            frames_with_hands: Arc::new(AtomicU64::new(0)),
            multi_hand_frames: Arc::new(AtomicU64::new(0)),
            neutral_frames: Arc::new(AtomicU64::new(0)),
            commands_emitted: Arc::new(AtomicU64::new(0)),
            commands_throttled: Arc::new(AtomicU64::new(0)),
            repeats_suppressed: Arc::new(AtomicU64::new(0)),
            primary_switches: Arc::new(AtomicU64::new(0)),
            engine_time_us: Arc::new(AtomicU64::new(0)),
            per_command: Arc::new(Default::default()),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    /// Frame-level bookkeeping for one engine result.
    ///
    /// `had_input_hands` distinguishes a neutral fallback from a frame that
    /// simply had nobody in it.
    pub fn record_result(&self, result: &DetectionResult, had_input_hands: bool) {
        self.inc(&self.total_frames);
        if result.hand_present {
            self.inc(&self.frames_with_hands);
        }
        if result.num_hands > 1 {
            self.inc(&self.multi_hand_frames);
        }
        if had_input_hands && !result.hand_present {
            self.inc(&self.neutral_frames);
        }
    }

    pub fn record_command(&self, cmd: Command) {
        self.inc(&self.commands_emitted);
        self.inc(&self.per_command[command_slot(cmd)]);
    }

    pub fn command_count(&self, cmd: Command) -> u64 {
        self.per_command[command_slot(cmd)].load(Ordering::Relaxed)
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let commands = Command::ALL
            .iter()
            .map(|c| (c.as_str().to_string(), self.command_count(*c)))
            .collect();
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            frames_with_hands: self.frames_with_hands.load(Ordering::Relaxed),
            multi_hand_frames: self.multi_hand_frames.load(Ordering::Relaxed),
            neutral_frames: self.neutral_frames.load(Ordering::Relaxed),
            commands_emitted: self.commands_emitted.load(Ordering::Relaxed),
            commands_throttled: self.commands_throttled.load(Ordering::Relaxed),
            repeats_suppressed: self.repeats_suppressed.load(Ordering::Relaxed),
            primary_switches: self.primary_switches.load(Ordering::Relaxed),
            last_engine_us: self.engine_time_us.load(Ordering::Relaxed),
            commands,
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn command_slot(cmd: Command) -> usize {
    match cmd {
        Command::Toggle => 0,
        Command::SeekForward => 1,
        Command::SeekBack => 2,
        Command::VolUp => 3,
        Command::VolDown => 4,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub frames_with_hands: u64,
    pub multi_hand_frames: u64,
    pub neutral_frames: u64,
    pub commands_emitted: u64,
    pub commands_throttled: u64,
    pub repeats_suppressed: u64,
    pub primary_switches: u64,
    pub last_engine_us: u64,
    pub commands: BTreeMap<String, u64>,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point2;

    #[test]
    fn test_counts_and_clones_share_state() {
        let metrics = SessionMetrics::new();
        let shared = metrics.clone();

        let mut r = DetectionResult::neutral(30.0);
        metrics.record_result(&r, false);
        metrics.record_result(&r, true);
        r.hand_present = true;
        r.num_hands = 2;
        r.primary_center = Some(Point2::new(1.0, 2.0));
        metrics.record_result(&r, true);
        shared.record_command(Command::VolDown);
        shared.record_command(Command::VolDown);
        shared.record_command(Command::Toggle);

        let s = metrics.summary();
        assert_eq!(s.total_frames, 3);
        assert_eq!(s.frames_with_hands, 1);
        assert_eq!(s.multi_hand_frames, 1);
        assert_eq!(s.neutral_frames, 1);
        assert_eq!(s.commands_emitted, 3);
        assert_eq!(s.commands["vol_down"], 2);
        assert_eq!(s.commands["toggle"], 1);
        assert_eq!(s.commands["seek_back"], 0);
    }

    #[test]
    fn test_summary_serializes() {
        let metrics = SessionMetrics::new();
        metrics.record_command(Command::SeekForward);
        let json = serde_json::to_value(metrics.summary()).unwrap();
        assert_eq!(json["commands"]["seek_forward"], 1);
    }
}
