//! Standard 8-button controller

use emuscript_core::{ButtonName, ControlDevice};
use std::sync::atomic::{AtomicU8, Ordering};

/// Button ids of the standard controller.
pub mod buttons {
    pub const A: u8 = 0;
    pub const B: u8 = 1;
    pub const SELECT: u8 = 2;
    pub const START: u8 = 3;
    pub const UP: u8 = 4;
    pub const DOWN: u8 = 5;
    pub const LEFT: u8 = 6;
    pub const RIGHT: u8 = 7;
}

/// Controller state packed into one byte, one bit per button id.
#[derive(Debug, Default)]
pub struct StandardController {
    state: AtomicU8,
}

impl StandardController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bits(&self) -> u8 {
        self.state.load(Ordering::Acquire)
    }
}

impl ControlDevice for StandardController {
    fn is_pressed(&self, button: u8) -> bool {
        button < 8 && self.bits() & (1 << button) != 0
    }

    fn set_button(&self, button: u8, pressed: bool) {
        if button >= 8 {
            return;
        }
        let mask = 1 << button;
        if pressed {
            self.state.fetch_or(mask, Ordering::AcqRel);
        } else {
            self.state.fetch_and(!mask, Ordering::AcqRel);
        }
    }

    fn buttons(&self) -> Vec<ButtonName> {
        (0..8).map(ButtonName::digital).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buttons_map_to_bits() {
        let pad = StandardController::new();
        pad.set_button(buttons::START, true);
        pad.set_button(buttons::LEFT, true);
        assert_eq!(pad.bits(), 0b0100_1000);
        assert!(pad.is_pressed(buttons::START));

        pad.set_button(buttons::START, false);
        assert!(!pad.is_pressed(buttons::START));
        assert_eq!(pad.bits(), 0b0100_0000);
    }

    #[test]
    fn test_out_of_range_buttons_are_ignored() {
        let pad = StandardController::new();
        pad.set_button(9, true);
        assert_eq!(pad.bits(), 0);
        assert!(!pad.is_pressed(9));
        assert_eq!(pad.buttons().len(), 8);
    }
}
