// src/landmark_source.rs
//
// Hand landmarks recorded by an external detector, one JSON object per
// line, keyed by video frame index:
//
//   {"frame": 12, "space": "normalized", "hands": [[[x, y], ... 21], ...]}
//   {"frame": 13, "space": "pixel", "source_width": 1280, "source_height": 720, "hands": [...]}
//
// Frames without a line have no hands. Coordinates are mapped into the
// pixel space of the processing frame before they reach the engine.

use crate::landmarks::LandmarkSet;
use crate::types::Point2;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// [0, 1] relative to the frame
    #[default]
    Normalized,
    /// Pixels of a `source_width` x `source_height` frame
    Pixel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkRecord {
    pub frame: u64,
    #[serde(default)]
    pub space: CoordinateSpace,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_height: Option<u32>,
    #[serde(default)]
    pub hands: Vec<Vec<[f32; 2]>>,
}

impl LandmarkRecord {
    /// Hands of this record in pixels of a `width` x `height` frame
    pub fn to_landmark_sets(&self, width: usize, height: usize) -> Result<Vec<LandmarkSet>> {
        self.hands
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let points: Vec<Point2> = raw.iter().map(|p| Point2::new(p[0], p[1])).collect();
                let hand = match self.space {
                    CoordinateSpace::Normalized => {
                        LandmarkSet::from_normalized(&points, width, height)
                    }
                    CoordinateSpace::Pixel => {
                        let (sx, sy) = self.pixel_scale(width, height);
                        let scaled: Vec<Point2> = points
                            .iter()
                            .map(|p| Point2::new(p.x * sx, p.y * sy))
                            .collect();
                        LandmarkSet::from_points(&scaled)
                    }
                };
                hand.with_context(|| format!("frame {} hand {}", self.frame, i))
            })
            .collect()
    }

    fn pixel_scale(&self, width: usize, height: usize) -> (f32, f32) {
        match (self.source_width, self.source_height) {
            (Some(sw), Some(sh)) if sw > 0 && sh > 0 => {
                (width as f32 / sw as f32, height as f32 / sh as f32)
            }
            _ => (1.0, 1.0),
        }
    }
}

pub struct LandmarkRecording {
    records: BTreeMap<u64, LandmarkRecord>,
}

impl LandmarkRecording {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open landmark recording {}", path.display()))?;
        let recording = Self::parse(BufReader::new(file))
            .with_context(|| format!("Invalid landmark recording {}", path.display()))?;
        debug!(
            "loaded {} landmark frames from {}",
            recording.len(),
            path.display()
        );
        Ok(recording)
    }

    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut records = BTreeMap::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record: LandmarkRecord = serde_json::from_str(trimmed)
                .with_context(|| format!("line {}", line_no + 1))?;
            records.insert(record.frame, record);
        }
        Ok(Self { records })
    }

    /// Hands for `frame`, empty when the detector saw none
    pub fn hands_for_frame(
        &self,
        frame: u64,
        width: usize,
        height: usize,
    ) -> Result<Vec<LandmarkSet>> {
        match self.records.get(&frame) {
            Some(record) => record.to_landmark_sets(width, height),
            None => Ok(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// `<dir>/<stem><suffix>` next to the video
pub fn recording_path_for(video: &Path, suffix: &str) -> Option<PathBuf> {
    let stem = video.file_stem()?.to_str()?;
    Some(video.with_file_name(format!("{}{}", stem, suffix)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_json(scale: f32) -> String {
        let pts: Vec<String> = (0..21)
            .map(|i| format!("[{}, {}]", i as f32 * scale, scale))
            .collect();
        format!("[{}]", pts.join(", "))
    }

    #[test]
    fn test_parse_and_map_normalized() {
        let text = format!(
            "{{\"frame\": 3, \"hands\": [{}]}}\n\n{{\"frame\": 5, \"hands\": []}}\n",
            hand_json(0.01)
        );
        let rec = LandmarkRecording::parse(text.as_bytes()).unwrap();
        assert_eq!(rec.len(), 2);

        let hands = rec.hands_for_frame(3, 640, 480).unwrap();
        assert_eq!(hands.len(), 1);
        let p = hands[0].get(20);
        assert!((p.x - 128.0).abs() < 1e-3);
        assert!((p.y - 4.8).abs() < 1e-3);

        assert!(rec.hands_for_frame(4, 640, 480).unwrap().is_empty());
        assert!(rec.hands_for_frame(5, 640, 480).unwrap().is_empty());
    }

    #[test]
    fn test_pixel_space_rescaled_from_source() {
        let text = format!(
            "{{\"frame\": 0, \"space\": \"pixel\", \"source_width\": 1280, \"source_height\": 960, \"hands\": [{}]}}",
            hand_json(10.0)
        );
        let rec = LandmarkRecording::parse(text.as_bytes()).unwrap();
        let hands = rec.hands_for_frame(0, 640, 480).unwrap();
        let p = hands[0].get(4);
        assert_eq!(p, Point2::new(20.0, 5.0));
    }

    #[test]
    fn test_short_hand_is_error() {
        let text = "{\"frame\": 0, \"hands\": [[[0.1, 0.2]]]}";
        let rec = LandmarkRecording::parse(text.as_bytes()).unwrap();
        assert!(rec.hands_for_frame(0, 640, 480).is_err());
    }

    #[test]
    fn test_bad_json_reports_line() {
        let text = "{\"frame\": 0, \"hands\": []}\nnot json\n";
        let err = LandmarkRecording::parse(text.as_bytes()).err().unwrap();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn test_recording_path() {
        let p = recording_path_for(Path::new("clips/demo.mp4"), ".landmarks.jsonl").unwrap();
        assert_eq!(p, PathBuf::from("clips/demo.landmarks.jsonl"));
    }
}
