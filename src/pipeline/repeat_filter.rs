// src/pipeline/repeat_filter.rs
//
// Drops consecutive repeats of the same command. A slow drift can satisfy
// the downward path check on every frame; downstream should see it once.
//
// A repeat is forwarded again only after the command has been absent for
// `release_after_ms`. Every sighting, forwarded or not, refreshes that
// window, so a continuous drift stays collapsed into a single command.

use crate::types::Command;
use tracing::debug;

pub const DEFAULT_REPEAT_RELEASE_MS: f64 = 600.0;

pub struct RepeatFilter {
    release_after_ms: f64,
    last_cmd: Option<Command>,
    last_seen_ms: f64,
}

impl RepeatFilter {
    pub fn new(release_after_ms: f64) -> Self {
        Self {
            release_after_ms,
            last_cmd: None,
            last_seen_ms: f64::NEG_INFINITY,
        }
    }

    /// True if `cmd` at `timestamp_ms` is not a repeat of the previous one
    pub fn allow(&mut self, cmd: Command, timestamp_ms: f64) -> bool {
        let repeat = self.last_cmd == Some(cmd)
            && timestamp_ms - self.last_seen_ms < self.release_after_ms;
        self.last_cmd = Some(cmd);
        self.last_seen_ms = timestamp_ms;
        if repeat {
            debug!("repeated {} suppressed", cmd);
        }
        !repeat
    }
}

impl Default for RepeatFilter {
    fn default() -> Self {
        Self::new(DEFAULT_REPEAT_RELEASE_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drift_collapses_to_one_command() {
        let mut filter = RepeatFilter::default();
        let forwarded = (4..30)
            .filter(|i| filter.allow(Command::VolDown, *i as f64 * 33.0))
            .count();
        assert_eq!(forwarded, 1);
    }

    #[test]
    fn test_different_command_passes() {
        let mut filter = RepeatFilter::default();
        assert!(filter.allow(Command::VolDown, 0.0));
        assert!(filter.allow(Command::VolUp, 33.0));
        assert!(filter.allow(Command::VolDown, 66.0));
        assert!(!filter.allow(Command::VolDown, 99.0));
    }

    #[test]
    fn test_repeat_released_after_quiet_gap() {
        let mut filter = RepeatFilter::new(600.0);
        assert!(filter.allow(Command::SeekForward, 0.0));
        assert!(!filter.allow(Command::SeekForward, 300.0));
        // window runs from the last sighting at 300
        assert!(!filter.allow(Command::SeekForward, 850.0));
        assert!(filter.allow(Command::SeekForward, 1500.0));
    }
}
