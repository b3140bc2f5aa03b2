//! Callback invocation adapter
//!
//! Marshals host values into script calls and turns anything a script
//! throws into a [`ScriptFault`] the session can log. Nothing thrown by a
//! script propagates to the host.

use emuscript_core::CpuType;
use rquickjs::convert::Coerced;
use rquickjs::{CatchResultExt, CaughtError, Ctx, Function, Persistent};
use std::fmt;

/// A script function kept alive outside of any `Ctx` scope.
#[derive(Clone)]
pub struct ScriptCallback(Persistent<Function<'static>>);

// SAFETY: a callback is only restored and dropped by the session that saved
// it, with that session's execution lock held.
unsafe impl Send for ScriptCallback {}
unsafe impl Sync for ScriptCallback {}

impl ScriptCallback {
    pub fn save<'js>(ctx: &Ctx<'js>, function: Function<'js>) -> Self {
        Self(Persistent::save(ctx, function))
    }

    pub fn restore<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Function<'js>> {
        self.0.clone().restore(ctx)
    }

    /// Identity comparison with a live function.
    pub fn is<'js>(&self, ctx: &Ctx<'js>, function: &Function<'js>) -> bool {
        self.restore(ctx)
            .map(|saved| saved.as_value() == function.as_value())
            .unwrap_or(false)
    }
}

/// Something a script threw, rendered to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFault {
    /// Exception class name (`TypeError`, `SyntaxError`, ...) or the JS type
    /// of a thrown non-error value.
    pub kind: String,
    pub message: String,
    pub traceback: Option<String>,
}

impl ScriptFault {
    pub fn from_caught(caught: CaughtError<'_>) -> Self {
        match caught {
            CaughtError::Exception(exception) => {
                let kind = exception
                    .as_object()
                    .get::<_, Option<String>>("name")
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| "Error".to_string());
                Self {
                    kind,
                    message: exception.message().unwrap_or_default(),
                    traceback: exception.stack().filter(|stack| !stack.is_empty()),
                }
            }
            CaughtError::Value(value) => Self {
                kind: format!("{:?}", value.type_of()),
                message: value
                    .get::<Coerced<String>>()
                    .map(|text| text.0)
                    .unwrap_or_else(|_| "<unprintable value>".to_string()),
                traceback: None,
            },
            CaughtError::Error(error) => Self {
                kind: "InternalError".to_string(),
                message: error.to_string(),
                traceback: None,
            },
        }
    }

    /// Type, value and traceback as separate log entries.
    pub fn log_lines(&self) -> Vec<String> {
        let mut lines = vec![self.kind.clone(), self.message.clone()];
        if let Some(traceback) = &self.traceback {
            lines.push(traceback.clone());
        }
        lines
    }
}

impl fmt::Display for ScriptFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Call an event callback with the CPU discriminator as its only argument.
pub fn invoke_event_callback<'js>(
    ctx: &Ctx<'js>,
    callback: &ScriptCallback,
    cpu: CpuType,
) -> Result<(), ScriptFault> {
    let function = callback
        .restore(ctx)
        .catch(ctx)
        .map_err(ScriptFault::from_caught)?;
    function
        .call::<_, ()>((i32::from(cpu.0),))
        .catch(ctx)
        .map_err(ScriptFault::from_caught)
}
