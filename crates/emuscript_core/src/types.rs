//! Discriminators exchanged between host, bridge and scripts

use crate::CoreError;
use std::fmt;

/// Host lifecycle occurrence a script can subscribe to.
///
/// The discriminants are the integers scripts pass to `addEventCallback`
/// and are mirrored by the `eventType` prelude object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    Nmi = 0,
    Irq = 1,
    StartFrame = 2,
    EndFrame = 3,
    Reset = 4,
    ScriptEnded = 5,
    InputPolled = 6,
    StateLoaded = 7,
    StateSaved = 8,
    CodeBreak = 9,
}

impl EventKind {
    /// Number of event kinds (length of a per-kind callback table).
    pub const COUNT: usize = 10;

    pub const ALL: [EventKind; Self::COUNT] = [
        EventKind::Nmi,
        EventKind::Irq,
        EventKind::StartFrame,
        EventKind::EndFrame,
        EventKind::Reset,
        EventKind::ScriptEnded,
        EventKind::InputPolled,
        EventKind::StateLoaded,
        EventKind::StateSaved,
        EventKind::CodeBreak,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used by the script prelude.
    pub fn script_name(self) -> &'static str {
        match self {
            EventKind::Nmi => "nmi",
            EventKind::Irq => "irq",
            EventKind::StartFrame => "startFrame",
            EventKind::EndFrame => "endFrame",
            EventKind::Reset => "reset",
            EventKind::ScriptEnded => "scriptEnded",
            EventKind::InputPolled => "inputPolled",
            EventKind::StateLoaded => "stateLoaded",
            EventKind::StateSaved => "stateSaved",
            EventKind::CodeBreak => "codeBreak",
        }
    }
}

impl TryFrom<i32> for EventKind {
    type Error = CoreError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or(CoreError::InvalidEventKind(value))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.script_name())
    }
}

/// Memory space selector understood by the host's memory inspection backend.
///
/// The bridge never interprets the value; it is forwarded verbatim.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryKind(pub u32);

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// CPU the host reports with an event; passed to callbacks as their only argument.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct CpuType(pub u8);
