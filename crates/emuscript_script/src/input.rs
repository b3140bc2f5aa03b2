//! Mapping between script button lists and host control devices
//!
//! Scripts see a controller as 8 booleans indexed by button id. Numeric
//! buttons never take part in the mapping.

use emuscript_core::ControlDevice;
use thiserror::Error;

/// Number of entries returned to scripts.
pub const SCRIPT_BUTTON_COUNT: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("expected a state for button {button} but the list ended")]
    SequenceTooShort { button: u8 },

    #[error("button states must be booleans or undefined")]
    NotBoolean,
}

/// Pressed state of every non-numeric button, indexed by button id.
///
/// Ids beyond the script-visible range are ignored.
pub fn read_buttons(device: &dyn ControlDevice) -> [bool; SCRIPT_BUTTON_COUNT] {
    let mut state = [false; SCRIPT_BUTTON_COUNT];
    for button in device.buttons() {
        if button.is_numeric {
            continue;
        }
        if let Some(slot) = state.get_mut(button.id as usize) {
            *slot = device.is_pressed(button.id);
        }
    }
    state
}

/// Apply `states` to the device's non-numeric buttons in listed order.
///
/// `None` leaves a button untouched. A list shorter than the number of
/// buttons is rejected before any button changes.
pub fn apply_buttons<I>(device: &dyn ControlDevice, states: I) -> Result<(), InputError>
where
    I: IntoIterator<Item = Option<bool>>,
{
    let buttons: Vec<u8> = device
        .buttons()
        .into_iter()
        .filter(|button| !button.is_numeric)
        .map(|button| button.id)
        .collect();
    let states: Vec<Option<bool>> = states.into_iter().take(buttons.len()).collect();
    if let Some(&button) = buttons.get(states.len()) {
        return Err(InputError::SequenceTooShort { button });
    }

    for (button, state) in buttons.into_iter().zip(states) {
        if let Some(pressed) = state {
            device.set_button(button, pressed);
        }
    }
    Ok(())
}
