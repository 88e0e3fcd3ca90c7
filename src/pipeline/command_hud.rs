// src/pipeline/command_hud.rs
//
// Keeps the last command on screen for a few frames after it fires; a
// single-frame label would be unreadable in the overlay.

use crate::types::Command;

pub struct CommandHud {
    hold_frames: u32,
    current: Option<Command>,
    remaining: u32,
}

impl CommandHud {
    pub fn new(hold_frames: u32) -> Self {
        Self {
            hold_frames,
            current: None,
            remaining: 0,
        }
    }

    /// Advance one frame. Returns the command to display.
    pub fn update(&mut self, cmd: Option<Command>) -> Option<Command> {
        match cmd {
            Some(c) => {
                self.current = Some(c);
                self.remaining = self.hold_frames;
            }
            None if self.remaining > 0 => self.remaining -= 1,
            None => self.current = None,
        }
        self.current
    }

    pub fn current(&self) -> Option<Command> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holds_for_configured_frames() {
        let mut hud = CommandHud::new(5);
        assert_eq!(hud.update(Some(Command::VolUp)), Some(Command::VolUp));
        for _ in 0..5 {
            assert_eq!(hud.update(None), Some(Command::VolUp));
        }
        assert_eq!(hud.update(None), None);
    }

    #[test]
    fn test_new_command_replaces_and_restarts() {
        let mut hud = CommandHud::new(2);
        hud.update(Some(Command::VolUp));
        hud.update(None);
        assert_eq!(hud.update(Some(Command::Toggle)), Some(Command::Toggle));
        assert_eq!(hud.update(None), Some(Command::Toggle));
        assert_eq!(hud.update(None), Some(Command::Toggle));
        assert_eq!(hud.update(None), None);
        assert_eq!(hud.current(), None);
    }
}
