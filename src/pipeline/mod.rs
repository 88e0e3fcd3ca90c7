// src/pipeline/mod.rs

pub mod command_hud;
pub mod engine;
pub mod event_bus;
pub mod metrics;
pub mod repeat_filter;
pub mod throttle;

pub use command_hud::CommandHud;
pub use engine::GestureEngine;
pub use event_bus::{ControlEvent, EventBus};
pub use metrics::{MetricsSummary, SessionMetrics};
pub use repeat_filter::RepeatFilter;
pub use throttle::CommandThrottle;
