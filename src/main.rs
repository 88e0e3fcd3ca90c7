// src/main.rs
//
// Offline replay: runs the gesture engine over recorded videos using the
// landmark recording stored next to each video.

use anyhow::{Context, Result};
use gesture_remote::landmark_source::{recording_path_for, LandmarkRecording};
use gesture_remote::pipeline::{
    CommandHud, CommandThrottle, ControlEvent, EventBus, GestureEngine, MetricsSummary,
    RepeatFilter, SessionMetrics,
};
use gesture_remote::types::{Config, DetectionResult};
use gesture_remote::video_processor::{self, VideoProcessor};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

struct ProcessingStats {
    total_frames: u64,
    processed_frames: u64,
    dropped_events: u64,
    duration_secs: f64,
    summary: MetricsSummary,
}

#[derive(Serialize)]
struct FrameRecord<'a> {
    frame: u64,
    timestamp_ms: f64,
    #[serde(flatten)]
    result: &'a DetectionResult,
}

fn main() -> Result<()> {
    let config_path =
        std::env::var("GESTURE_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gesture_remote={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🖐️  Gesture Remote replay starting");
    info!("✓ Configuration loaded from {}", config_path);

    let clf = &config.engine.classifier;
    info!(
        "Thresholds: vertical={:.2}, horizontal={:.2}, down_path={:.2}, open_palm_hold={}ms",
        clf.vertical_threshold,
        clf.horizontal_threshold,
        clf.down_path_threshold,
        clf.open_palm_hold_ms
    );
    if config.runner.suppress_repeats {
        info!(
            "🔁 Repeat suppression: on ({:.0}ms release)",
            config.runner.repeat_release_ms
        );
    }
    if let Some(ms) = config.runner.command_throttle_ms {
        info!("⏱️  Command throttle: {:.0}ms", ms);
    }

    let processor = VideoProcessor::new(config.clone());
    let video_files = processor.find_video_files()?;

    if video_files.is_empty() {
        error!("No video files found in {}", config.video.input_dir);
        return Ok(());
    }

    info!("Found {} video file(s) to process", video_files.len());

    for (idx, video_path) in video_files.iter().enumerate() {
        info!("========================================");
        info!(
            "Processing video {}/{}: {}",
            idx + 1,
            video_files.len(),
            video_path.display()
        );
        info!("========================================");

        let Some(recording_path) =
            recording_path_for(video_path, &config.video.landmark_suffix)
        else {
            warn!("⚠️  Cannot derive landmark path for {}", video_path.display());
            continue;
        };
        if !recording_path.exists() {
            warn!(
                "⚠️  No landmark recording at {}, skipping",
                recording_path.display()
            );
            continue;
        }

        match process_video(video_path, &recording_path, &processor, &config) {
            Ok(stats) => log_stats(&stats),
            Err(e) => error!("❌ Failed to process {}: {:#}", video_path.display(), e),
        }
    }

    info!("✓ All videos processed");
    Ok(())
}

fn process_video(
    video_path: &Path,
    recording_path: &Path,
    processor: &VideoProcessor,
    config: &Config,
) -> Result<ProcessingStats> {
    use opencv::videoio::VideoWriterTrait;

    let start_time = Instant::now();

    let recording = LandmarkRecording::load(recording_path)?;
    info!("✓ Landmark recording: {} frames with entries", recording.len());

    let mut reader = processor.open_video(video_path)?;
    let mut writer =
        processor.create_writer(video_path, reader.width, reader.height, reader.fps)?;

    let mut results_file = if config.video.save_results {
        std::fs::create_dir_all(&config.video.output_dir)?;
        let path = video_processor::output_path_for(
            &config.video.output_dir,
            video_path,
            "_results.jsonl",
        )?;
        info!("💾 Results will be written to: {}", path.display());
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        Some(BufWriter::new(file))
    } else {
        None
    };

    let mut engine = GestureEngine::with_default_tracker(config.engine.clone());
    let mut repeats = config
        .runner
        .suppress_repeats
        .then(|| RepeatFilter::new(config.runner.repeat_release_ms));
    let mut throttle = config.runner.command_throttle_ms.map(CommandThrottle::new);
    let mut hud = CommandHud::new(config.runner.hud_hold_frames);
    let mut bus = EventBus::new(config.runner.event_bus_capacity);
    let metrics = SessionMetrics::new();

    let min_interval_ms = config
        .video
        .detection_fps
        .filter(|f| *f > 0.0 && *f < reader.fps)
        .map(|f| 1000.0 / f);
    let mut last_processed_ms: Option<f64> = None;

    let mut last_result = DetectionResult::neutral(0.0);
    let mut prev_primary_track: Option<u32> = None;
    let mut prev_had_hands = false;
    let mut processed_frames: u64 = 0;

    while let Some(mut frame) = reader.read_frame()? {
        let ts = frame.timestamp_ms;

        let due = match (min_interval_ms, last_processed_ms) {
            (Some(interval), Some(last)) => ts - last >= interval - 1e-6,
            _ => true,
        };

        let hands = match recording.hands_for_frame(
            frame.index,
            frame.gray.width,
            frame.gray.height,
        ) {
            Ok(h) => h,
            Err(e) => {
                warn!("Skipping landmarks: {:#}", e);
                Vec::new()
            }
        };

        if due {
            last_processed_ms = Some(ts);
            processed_frames += 1;

            let engine_start = Instant::now();
            let result = engine.process_frame(&frame.gray, &hands, ts);
            metrics.set_timing(
                &metrics.engine_time_us,
                engine_start.elapsed().as_micros() as u64,
            );
            metrics.record_result(&result, !hands.is_empty());

            // ── Events ───────────────────────────────────────────────────
            let primary = engine.last_primary();
            let primary_track = primary.map(|p| p.track_id);
            if let Some(p) = primary {
                if primary_track != prev_primary_track {
                    metrics.inc(&metrics.primary_switches);
                    bus.publish(ControlEvent::PrimaryChanged {
                        frame_id: frame.index,
                        timestamp_ms: ts,
                        track_id: p.track_id,
                        center: p.center,
                    });
                }
            }
            if prev_had_hands && !result.hand_present {
                bus.publish(ControlEvent::HandsLost {
                    frame_id: frame.index,
                    timestamp_ms: ts,
                });
            }
            prev_primary_track = primary_track;
            prev_had_hands = result.hand_present;

            let mut forwarded = None;
            if let (Some(gesture), Some(cmd)) = (result.gesture, result.cmd) {
                let fresh = repeats.as_mut().map(|r| r.allow(cmd, ts)).unwrap_or(true);
                let allowed =
                    fresh && throttle.as_mut().map(|t| t.allow(ts)).unwrap_or(true);
                if !fresh {
                    metrics.inc(&metrics.repeats_suppressed);
                } else if allowed {
                    metrics.record_command(cmd);
                    bus.publish(ControlEvent::Command {
                        frame_id: frame.index,
                        timestamp_ms: ts,
                        gesture,
                        cmd,
                        action: cmd.action(),
                    });
                    forwarded = Some(cmd);
                } else {
                    metrics.inc(&metrics.commands_throttled);
                }
            }
            hud.update(forwarded);

            if let Some(ref mut file) = results_file {
                let record = FrameRecord {
                    frame: frame.index,
                    timestamp_ms: ts,
                    result: &result,
                };
                writeln!(file, "{}", serde_json::to_string(&record)?)?;
            }

            for event in bus.drain() {
                match event {
                    ControlEvent::Command {
                        cmd,
                        action,
                        timestamp_ms,
                        ..
                    } => info!(
                        "🎛️  {} -> {} at {:.2}s (frame {})",
                        cmd,
                        action,
                        timestamp_ms / 1000.0,
                        frame.index
                    ),
                    other => debug!("event: {:?}", other),
                }
            }

            last_result = result;
        }

        if let Some(ref mut w) = writer {
            let primary_index = engine.last_primary().map(|p| p.detection_index);
            video_processor::draw_overlay(
                &mut frame.bgr,
                &hands,
                primary_index,
                &last_result,
                hud.current(),
                engine.motion_snapshot(),
            )?;
            w.write(&frame.bgr)?;
        }

        if reader.current_frame % 100 == 0 {
            info!(
                "Progress: {:.1}% ({}/{}) | Hands: {} | Commands: {}",
                reader.progress(),
                reader.current_frame,
                reader.total_frames,
                last_result.num_hands,
                metrics.summary().commands_emitted
            );
        }
    }

    if let Some(ref mut file) = results_file {
        file.flush()?;
    }

    Ok(ProcessingStats {
        total_frames: reader.current_frame as u64,
        processed_frames,
        dropped_events: bus.dropped_count(),
        duration_secs: start_time.elapsed().as_secs_f64(),
        summary: metrics.summary(),
    })
}

fn log_stats(stats: &ProcessingStats) {
    let s = &stats.summary;
    info!("✓ Video processed successfully!");
    info!(
        "  Total frames: {} ({} through the engine)",
        stats.total_frames, stats.processed_frames
    );
    info!(
        "  Frames with hands: {} ({:.1}%)",
        s.frames_with_hands,
        100.0 * s.frames_with_hands as f64 / s.total_frames.max(1) as f64
    );
    info!("  Multi-hand frames: {}", s.multi_hand_frames);
    info!("  Primary switches: {}", s.primary_switches);
    info!("  🎛️  Commands emitted: {}", s.commands_emitted);
    for (cmd, count) in &s.commands {
        if *count > 0 {
            info!("     {}: {}", cmd, count);
        }
    }
    if s.repeats_suppressed > 0 {
        info!("  🔁 Repeats suppressed: {}", s.repeats_suppressed);
    }
    if s.commands_throttled > 0 {
        info!("  ⏱️  Throttled: {}", s.commands_throttled);
    }
    if s.neutral_frames > 0 {
        warn!("  ⚠️  Neutral (failed) frames: {}", s.neutral_frames);
    }
    if stats.dropped_events > 0 {
        warn!("  ⚠️  Dropped events: {}", stats.dropped_events);
    }
    info!(
        "  Processing time: {:.1}s ({:.1} frames/s)",
        stats.duration_secs,
        stats.total_frames as f64 / stats.duration_secs.max(1e-3)
    );
    debug!(
        "  Summary: {}",
        serde_json::to_string(s).unwrap_or_default()
    );
}
