// src/pipeline/event_bus.rs
//
// Bounded queue between the engine and downstream consumers (media
// control, HUD, logs). The producer never blocks: when the queue is full
// the oldest event is dropped.

use crate::types::{Command, Gesture, MediaAction, Point2};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControlEvent {
    Command {
        frame_id: u64,
        timestamp_ms: f64,
        gesture: Gesture,
        cmd: Command,
        action: MediaAction,
    },

    /// Hands were visible on the previous frame and are gone now
    HandsLost { frame_id: u64, timestamp_ms: f64 },

    PrimaryChanged {
        frame_id: u64,
        timestamp_ms: f64,
        track_id: u32,
        center: Point2,
    },
}

impl ControlEvent {
    pub fn frame_id(&self) -> u64 {
        match self {
            Self::Command { frame_id, .. }
            | Self::HandsLost { frame_id, .. }
            | Self::PrimaryChanged { frame_id, .. } => *frame_id,
        }
    }
}

pub struct EventBus {
    events: VecDeque<ControlEvent>,
    max_pending: usize,
    dropped: u64,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
            dropped: 0,
        }
    }

    pub fn publish(&mut self, event: ControlEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<ControlEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}
