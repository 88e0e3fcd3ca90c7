// src/lib.rs
//
// Hand-gesture media remote: per-frame hand landmarks and a grayscale frame
// in, debounced play/seek/volume commands out.

pub mod analysis;
pub mod config;
pub mod frame;
pub mod landmark_source;
pub mod landmarks;
pub mod pipeline;
pub mod types;

#[cfg(feature = "opencv")]
pub mod video_processor;

pub use frame::GrayFrame;
pub use landmarks::LandmarkSet;
pub use pipeline::GestureEngine;
pub use types::{Command, Config, DetectionResult, Gesture, MediaAction, Point2};
