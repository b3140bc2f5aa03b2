//! Emuscript Services Layer
//!
//! Settings persistence and a headless emulator that implements every
//! service the scripting bridge consumes.

pub mod headless;
pub mod input;
pub mod settings;

pub use headless::HeadlessEmulator;
pub use input::StandardController;
pub use settings::{HeadlessSettings, Settings, SettingsError};
