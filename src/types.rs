use crate::analysis::frame_stats::FrameStatsConfig;
use crate::analysis::gesture_classifier::ClassifierConfig;
use crate::analysis::hand_tracker::TrackerConfig;
use crate::analysis::primary_selector::SelectorConfig;
use crate::pipeline::repeat_filter::DEFAULT_REPEAT_RELEASE_MS;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tracker: TrackerConfig,
    pub selector: SelectorConfig,
    pub classifier: ClassifierConfig,
    pub frame_stats: FrameStatsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub input_dir: String,
    /// Appended to a video's file stem to locate its landmark recording
    pub landmark_suffix: String,
    pub output_dir: String,
    /// Frames wider than this are downscaled before processing
    pub proc_width: usize,
    /// Run the engine at most this often; `None` processes every frame
    pub detection_fps: Option<f64>,
    pub save_annotated: bool,
    pub save_results: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            input_dir: "recordings".to_string(),
            landmark_suffix: ".landmarks.jsonl".to_string(),
            output_dir: "output".to_string(),
            proc_width: 640,
            detection_fps: None,
            save_annotated: false,
            save_results: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Drop a command identical to the previous one until it has been
    /// absent for `repeat_release_ms`
    pub suppress_repeats: bool,
    pub repeat_release_ms: f64,
    /// Minimum spacing between forwarded commands; `None` forwards all
    pub command_throttle_ms: Option<f64>,
    pub hud_hold_frames: u32,
    pub event_bus_capacity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            suppress_repeats: true,
            repeat_release_ms: DEFAULT_REPEAT_RELEASE_MS,
            command_throttle_ms: None,
            hud_hold_frames: 5,
            event_bus_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Point in frame pixel coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    SwipeUp,
    SwipeDown,
    SwipeLeft,
    SwipeRight,
    OpenPalm,
}

impl Gesture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SwipeUp => "swipe_up",
            Self::SwipeDown => "swipe_down",
            Self::SwipeLeft => "swipe_left",
            Self::SwipeRight => "swipe_right",
            Self::OpenPalm => "open_palm",
        }
    }

    /// Command each gesture maps to
    pub fn command(&self) -> Command {
        match self {
            Self::SwipeUp => Command::VolUp,
            Self::SwipeDown => Command::VolDown,
            Self::SwipeLeft => Command::SeekBack,
            Self::SwipeRight => Command::SeekForward,
            Self::OpenPalm => Command::Toggle,
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Toggle,
    SeekForward,
    SeekBack,
    VolUp,
    VolDown,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Toggle,
        Command::SeekForward,
        Command::SeekBack,
        Command::VolUp,
        Command::VolDown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Toggle => "toggle",
            Self::SeekForward => "seek_forward",
            Self::SeekBack => "seek_back",
            Self::VolUp => "vol_up",
            Self::VolDown => "vol_down",
        }
    }

    /// What a downstream player does with the command
    pub fn action(&self) -> MediaAction {
        match self {
            Self::Toggle => MediaAction::TogglePlayback,
            Self::SeekForward => MediaAction::Seek { seconds: 5.0 },
            Self::SeekBack => MediaAction::Seek { seconds: -5.0 },
            Self::VolUp => MediaAction::Volume { percent: 5 },
            Self::VolDown => MediaAction::Volume { percent: -5 },
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaAction {
    TogglePlayback,
    Seek { seconds: f64 },
    Volume { percent: i32 },
}

impl fmt::Display for MediaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TogglePlayback => write!(f, "play/pause"),
            Self::Seek { seconds } => write!(f, "seek {:+.0}s", seconds),
            Self::Volume { percent } => write!(f, "volume {:+}%", percent),
        }
    }
}

/// Per-frame output of the engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionResult {
    pub hand_present: bool,
    pub num_hands: usize,
    pub gesture: Option<Gesture>,
    pub cmd: Option<Command>,
    pub primary_center: Option<Point2>,
    pub fps: f32,
}

impl DetectionResult {
    /// Result for a frame without a usable hand
    pub fn neutral(fps: f32) -> Self {
        Self {
            hand_present: false,
            num_hands: 0,
            gesture: None,
            cmd: None,
            primary_center: None,
            fps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gesture_command_mapping() {
        assert_eq!(Gesture::SwipeUp.command(), Command::VolUp);
        assert_eq!(Gesture::SwipeDown.command(), Command::VolDown);
        assert_eq!(Gesture::SwipeLeft.command(), Command::SeekBack);
        assert_eq!(Gesture::SwipeRight.command(), Command::SeekForward);
        assert_eq!(Gesture::OpenPalm.command(), Command::Toggle);
    }

    #[test]
    fn test_command_actions() {
        assert_eq!(Command::SeekBack.action(), MediaAction::Seek { seconds: -5.0 });
        assert_eq!(Command::VolUp.action(), MediaAction::Volume { percent: 5 });
        assert_eq!(Command::VolUp.action().to_string(), "volume +5%");
    }

    #[test]
    fn test_result_serializes_snake_case() {
        let result = DetectionResult {
            hand_present: true,
            num_hands: 1,
            gesture: Some(Gesture::SwipeDown),
            cmd: Some(Command::VolDown),
            primary_center: Some(Point2::new(10.0, 20.0)),
            fps: 30.0,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"gesture\":\"swipe_down\""));
        assert!(json.contains("\"cmd\":\"vol_down\""));
    }
}
