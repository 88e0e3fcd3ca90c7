// src/analysis/hand_tracker.rs
//
// Identity tracking for simultaneously visible hands.
//
// Design:
//   - Greedy nearest-neighbour matching of palm centers, detection order
//   - Track ids are monotonically increasing and never reused
//   - Tracks are not deleted by default: a stale track stays matchable
//     within the match radius, which is how a returning hand gets its
//     identity back
//   - The `armed` flag gates the open-palm command per track. It is
//     restored after the track has gone unmatched for `rearm_after_ms`.

use crate::types::Point2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum palm-center distance for a detection to continue a track
    pub match_distance_px: f32,
    /// Unmatched time after which a track is re-armed
    pub rearm_after_ms: f64,
    /// Drop tracks unmatched for longer than this; `None` keeps them forever
    pub evict_after_ms: Option<f64>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            match_distance_px: 120.0,
            rearm_after_ms: 400.0,
            evict_after_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandTrack {
    pub id: u32,
    pub center: Point2,
    pub last_seen_ms: f64,
    pub armed: bool,
}

pub struct HandTracker {
    pub config: TrackerConfig,
    tracks: BTreeMap<u32, HandTrack>,
    next_id: u32,
}

impl HandTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Assign each detected palm center to a track.
    ///
    /// Returns the track id of every detection, indexed like `centers`.
    pub fn update(&mut self, centers: &[Point2], timestamp_ms: f64) -> Vec<u32> {
        let mut unmatched: Vec<u32> = self.tracks.keys().copied().collect();
        let mut assignments = Vec::with_capacity(centers.len());

        for &center in centers {
            let best = unmatched
                .iter()
                .enumerate()
                .filter_map(|(slot, id)| {
                    self.tracks
                        .get(id)
                        .map(|t| (slot, *id, t.center.distance(&center)))
                })
                .min_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

            match best {
                Some((slot, id, dist)) if dist <= self.config.match_distance_px => {
                    unmatched.remove(slot);
                    if let Some(track) = self.tracks.get_mut(&id) {
                        // a caller that stopped feeding frames still counts as absence
                        let absent_ms = timestamp_ms - track.last_seen_ms;
                        if !track.armed && absent_ms >= self.config.rearm_after_ms {
                            track.armed = true;
                            debug!("hand track {} re-armed on return", id);
                        }
                        track.center = center;
                        track.last_seen_ms = timestamp_ms;
                    }
                    assignments.push(id);
                }
                _ => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.tracks.insert(
                        id,
                        HandTrack {
                            id,
                            center,
                            last_seen_ms: timestamp_ms,
                            armed: true,
                        },
                    );
                    debug!("new hand track {} at ({:.0}, {:.0})", id, center.x, center.y);
                    assignments.push(id);
                }
            }
        }

        for id in &unmatched {
            if let Some(track) = self.tracks.get_mut(id) {
                let absent_ms = timestamp_ms - track.last_seen_ms;
                if !track.armed && absent_ms >= self.config.rearm_after_ms {
                    track.armed = true;
                    debug!("hand track {} re-armed after absence", id);
                }
            }
        }

        if let Some(max_idle) = self.config.evict_after_ms {
            let before = self.tracks.len();
            self.tracks
                .retain(|_, t| timestamp_ms - t.last_seen_ms <= max_idle);
            if self.tracks.len() < before {
                debug!("evicted {} idle hand tracks", before - self.tracks.len());
            }
        }

        assignments
    }

    pub fn get(&self, id: u32) -> Option<&HandTrack> {
        self.tracks.get(&id)
    }

    pub fn is_armed(&self, id: u32) -> bool {
        self.tracks.get(&id).map(|t| t.armed).unwrap_or(false)
    }

    pub fn disarm(&mut self, id: u32) {
        if let Some(track) = self.tracks.get_mut(&id) {
            track.armed = false;
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl Default for HandTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
