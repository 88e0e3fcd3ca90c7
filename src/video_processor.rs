// src/video_processor.rs
//
// Video discovery, decoding at the processing resolution, annotated output
// and the overlay drawn on it.

use crate::analysis::gesture_classifier::MotionSnapshot;
use crate::frame::GrayFrame;
use crate::landmarks::{LandmarkSet, HAND_CONNECTIONS};
use crate::types::{Command, Config, DetectionResult};
use anyhow::{bail, Context, Result};
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTraitConst, VideoWriter},
};
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];
const FALLBACK_FPS: f64 = 30.0;

pub struct VideoProcessor {
    config: Config,
}

impl VideoProcessor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn find_video_files(&self) -> Result<Vec<PathBuf>> {
        let mut videos = Vec::new();

        for entry in WalkDir::new(&self.config.video.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let is_video = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(e)))
                .unwrap_or(false);
            if is_video {
                videos.push(path.to_path_buf());
            }
        }

        videos.sort();
        info!("Found {} video files", videos.len());
        Ok(videos)
    }

    pub fn open_video(&self, path: &Path) -> Result<VideoReader> {
        info!("Opening video: {}", path.display());

        let path_str = path
            .to_str()
            .with_context(|| format!("non UTF-8 video path {}", path.display()))?;
        let cap = VideoCapture::from_file(path_str, videoio::CAP_ANY)?;

        if !cap.is_opened()? {
            bail!("Failed to open video file {}", path.display());
        }

        let mut fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        if !(fps.is_finite() && fps > 0.0) {
            fps = FALLBACK_FPS;
        }
        let total_frames = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_COUNT)? as i64;
        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
        let (proc_width, proc_height) =
            processing_size(width, height, self.config.video.proc_width as i32);

        info!(
            "Video properties: {}x{} @ {:.1} FPS, {} frames (processing at {}x{})",
            width, height, fps, total_frames, proc_width, proc_height
        );

        Ok(VideoReader {
            cap,
            fps,
            total_frames,
            current_frame: 0,
            width: proc_width,
            height: proc_height,
        })
    }

    pub fn create_writer(
        &self,
        input_path: &Path,
        width: i32,
        height: i32,
        fps: f64,
    ) -> Result<Option<VideoWriter>> {
        if !self.config.video.save_annotated {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.config.video.output_dir)?;

        let output_path = output_path_for(
            &self.config.video.output_dir,
            input_path,
            "_annotated.mp4",
        )?;
        info!("Output video: {}", output_path.display());

        let output_str = output_path
            .to_str()
            .with_context(|| format!("non UTF-8 output path {}", output_path.display()))?;
        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
        let writer = VideoWriter::new(
            output_str,
            fourcc,
            fps,
            core::Size::new(width, height),
            true,
        )?;

        Ok(Some(writer))
    }
}

/// `<output_dir>/<video stem><suffix>`
pub fn output_path_for(output_dir: &str, input_path: &Path, suffix: &str) -> Result<PathBuf> {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("no file stem in {}", input_path.display()))?;
    Ok(PathBuf::from(output_dir).join(format!("{}{}", stem, suffix)))
}

/// Output size for a source frame: width capped at `proc_width`, aspect kept
pub fn processing_size(width: i32, height: i32, proc_width: i32) -> (i32, i32) {
    if proc_width <= 0 || width <= proc_width {
        return (width, height);
    }
    let scale = proc_width as f64 / width as f64;
    let scaled_height = ((height as f64 * scale).round() as i32).max(1);
    (proc_width, scaled_height)
}

pub struct DecodedFrame {
    /// BGR at processing resolution, used for the annotated output
    pub bgr: Mat,
    pub gray: GrayFrame,
    /// 0-based index in the source video
    pub index: u64,
    pub timestamp_ms: f64,
}

pub struct VideoReader {
    pub cap: VideoCapture,
    pub fps: f64,
    pub total_frames: i64,
    pub current_frame: i64,
    pub width: i32,
    pub height: i32,
}

impl VideoReader {
    pub fn read_frame(&mut self) -> Result<Option<DecodedFrame>> {
        use opencv::videoio::VideoCaptureTrait;

        let mut mat = Mat::default();

        if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
            return Ok(None);
        }

        let index = self.current_frame as u64;
        self.current_frame += 1;
        let timestamp_ms = (index as f64 / self.fps) * 1000.0;

        let bgr = if mat.cols() != self.width || mat.rows() != self.height {
            let mut resized = Mat::default();
            imgproc::resize(
                &mat,
                &mut resized,
                core::Size::new(self.width, self.height),
                0.0,
                0.0,
                imgproc::INTER_AREA,
            )?;
            resized
        } else {
            mat
        };
        let gray = GrayFrame::from_mat(&bgr)?;

        Ok(Some(DecodedFrame {
            bgr,
            gray,
            index,
            timestamp_ms,
        }))
    }

    pub fn progress(&self) -> f32 {
        if self.total_frames <= 0 {
            return 0.0;
        }
        (self.current_frame as f32 / self.total_frames as f32) * 100.0
    }
}

/// Landmarks, skeleton, primary center and status text. `motion` adds the
/// primary hand's flow readout.
pub fn draw_overlay(
    output: &mut Mat,
    hands: &[LandmarkSet],
    primary_index: Option<usize>,
    result: &DetectionResult,
    hud_cmd: Option<Command>,
    motion: Option<MotionSnapshot>,
) -> Result<()> {
    let skeleton = core::Scalar::new(255.0, 255.0, 255.0, 0.0);
    let joint = core::Scalar::new(0.0, 0.0, 255.0, 0.0);
    let primary_joint = core::Scalar::new(0.0, 255.0, 0.0, 0.0);

    for (i, hand) in hands.iter().enumerate() {
        let color = if Some(i) == primary_index {
            primary_joint
        } else {
            joint
        };
        let pts = hand.points();
        for &(a, b) in HAND_CONNECTIONS.iter() {
            imgproc::line(
                output,
                to_cv(pts[a]),
                to_cv(pts[b]),
                skeleton,
                2,
                imgproc::LINE_AA,
                0,
            )?;
        }
        for p in pts.iter() {
            imgproc::circle(output, to_cv(*p), 3, color, -1, imgproc::LINE_8, 0)?;
        }
    }

    if let Some(center) = result.primary_center {
        imgproc::circle(
            output,
            to_cv(center),
            8,
            core::Scalar::new(0.0, 255.0, 255.0, 0.0),
            -1,
            imgproc::LINE_8,
            0,
        )?;
    }

    imgproc::rectangle(
        output,
        core::Rect::new(5, 5, 360, 95),
        core::Scalar::new(40.0, 40.0, 40.0, 0.0),
        -1,
        imgproc::LINE_8,
        0,
    )?;

    let (label, label_color) = match hud_cmd {
        Some(cmd) => (
            format!("CMD: {} ({})", cmd, cmd.action()),
            core::Scalar::new(0.0, 255.0, 0.0, 0.0),
        ),
        None => (
            "CMD: -".to_string(),
            core::Scalar::new(200.0, 200.0, 200.0, 0.0),
        ),
    };
    imgproc::put_text(
        output,
        &label,
        core::Point::new(15, 32),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.7,
        label_color,
        2,
        imgproc::LINE_8,
        false,
    )?;

    let info = format!("Hands: {} | FPS: {:.1}", result.num_hands, result.fps);
    imgproc::put_text(
        output,
        &info,
        core::Point::new(15, 60),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        core::Scalar::new(200.0, 200.0, 200.0, 0.0),
        1,
        imgproc::LINE_8,
        false,
    )?;

    if let Some(m) = motion {
        imgproc::put_text(
            output,
            &motion_label(&m),
            core::Point::new(15, 84),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.45,
            core::Scalar::new(0.0, 200.0, 255.0, 0.0),
            1,
            imgproc::LINE_8,
            false,
        )?;
    }

    Ok(())
}

fn motion_label(m: &MotionSnapshot) -> String {
    format!(
        "dx {:+.1} dy {:+.1} path {:.2} spread {:.2} f{}",
        m.dx_med, m.dy_med, m.down_path_sum, m.spread, m.fingers
    )
}

fn to_cv(p: crate::types::Point2) -> core::Point {
    core::Point::new(p.x.round() as i32, p.y.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_size() {
        assert_eq!(processing_size(1280, 720, 640), (640, 360));
        assert_eq!(processing_size(640, 480, 640), (640, 480));
        assert_eq!(processing_size(320, 240, 640), (320, 240));
        assert_eq!(processing_size(1920, 1080, 0), (1920, 1080));
    }

    #[test]
    fn test_motion_label() {
        let m = MotionSnapshot {
            fingers: 2,
            dx_med: -1.5,
            dy_med: 18.0,
            down_path_sum: 2.5,
            spread: 1.4,
            ..Default::default()
        };
        assert_eq!(
            motion_label(&m),
            "dx -1.5 dy +18.0 path 2.50 spread 1.40 f2"
        );
    }

    #[test]
    fn test_output_path() {
        let p = output_path_for("out", Path::new("clips/demo.mov"), "_results.jsonl").unwrap();
        assert_eq!(p, PathBuf::from("out/demo_results.jsonl"));
    }

    #[test]
    fn test_find_video_files_case_insensitive() {
        let dir = std::env::temp_dir().join(format!("gesture_remote_find_{}", std::process::id()));
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        for name in ["a.mp4", "b.MOV", "nested/c.mkv", "notes.txt", "a.landmarks.jsonl"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }
        let mut config = Config::default();
        config.video.input_dir = dir.to_string_lossy().to_string();
        let found = VideoProcessor::new(config).find_video_files().unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"b.MOV".to_string()));
        assert!(names.contains(&"c.mkv".to_string()));
    }
}
