// src/analysis/frame_stats.rs
//
// Rolling frame-rate counter driven by frame timestamps.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameStatsConfig {
    /// Frames per measurement window
    pub window_frames: u32,
}

impl Default for FrameStatsConfig {
    fn default() -> Self {
        Self { window_frames: 30 }
    }
}

pub struct FrameStats {
    config: FrameStatsConfig,
    frame_count: u32,
    window_start_ms: Option<f64>,
    fps: f32,
}

impl FrameStats {
    pub fn new(config: FrameStatsConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            window_start_ms: None,
            fps: 0.0,
        }
    }

    /// Count one processed frame and return the current rate.
    ///
    /// The rate is recomputed once per window and held in between; it stays
    /// 0 until the first window completes.
    pub fn tick(&mut self, timestamp_ms: f64) -> f32 {
        let Some(start) = self.window_start_ms else {
            self.window_start_ms = Some(timestamp_ms);
            return self.fps;
        };

        self.frame_count += 1;
        if self.frame_count >= self.config.window_frames.max(1) {
            let elapsed_s = (timestamp_ms - start) / 1000.0;
            if elapsed_s > 0.0 {
                self.fps = (self.frame_count as f64 / elapsed_s) as f32;
            }
            self.frame_count = 0;
            self.window_start_ms = Some(timestamp_ms);
        }
        self.fps
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(FrameStatsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_until_first_window() {
        let mut stats = FrameStats::default();
        for i in 0..30 {
            assert_eq!(stats.tick(i as f64 * 33.0), 0.0);
        }
    }

    #[test]
    fn test_rate_from_timestamps() {
        let mut stats = FrameStats::default();
        let mut fps = 0.0;
        for i in 0..=30 {
            fps = stats.tick(i as f64 * 40.0);
        }
        // 30 intervals of 40 ms
        assert!((fps - 25.0).abs() < 1e-3, "fps={}", fps);

        // held until the next window closes
        assert_eq!(stats.tick(31.0 * 40.0 + 500.0), fps);
    }

    #[test]
    fn test_window_restarts() {
        let mut stats = FrameStats::new(FrameStatsConfig { window_frames: 10 });
        for i in 0..=10 {
            stats.tick(i as f64 * 50.0);
        }
        assert!((stats.fps() - 20.0).abs() < 1e-3);
        for i in 1..=10 {
            stats.tick(500.0 + i as f64 * 100.0);
        }
        assert!((stats.fps() - 10.0).abs() < 1e-3);
    }
}
