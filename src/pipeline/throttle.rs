// src/pipeline/throttle.rs
//
// Minimum spacing between commands forwarded downstream. Applied by the
// runner after classification; the engine itself is never throttled.

use tracing::debug;

pub const DEFAULT_COMMAND_SPACING_MS: f64 = 180.0;

pub struct CommandThrottle {
    min_spacing_ms: f64,
    last_sent_ms: Option<f64>,
}

impl CommandThrottle {
    pub fn new(min_spacing_ms: f64) -> Self {
        Self {
            min_spacing_ms,
            last_sent_ms: None,
        }
    }

    /// True if a command may go out at `timestamp_ms`; records it if so
    pub fn allow(&mut self, timestamp_ms: f64) -> bool {
        if let Some(last) = self.last_sent_ms {
            let since = timestamp_ms - last;
            if since < self.min_spacing_ms {
                debug!(
                    "command throttled ({:.0}ms < {:.0}ms)",
                    since, self.min_spacing_ms
                );
                return false;
            }
        }
        self.last_sent_ms = Some(timestamp_ms);
        true
    }
}

impl Default for CommandThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_SPACING_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spacing() {
        let mut throttle = CommandThrottle::default();
        assert!(throttle.allow(0.0));
        assert!(!throttle.allow(100.0));
        assert!(!throttle.allow(179.0));
        assert!(throttle.allow(180.0));
        // a rejected attempt does not push the window
        assert!(!throttle.allow(300.0));
        assert!(throttle.allow(360.0));
    }
}
