//! Host-side owner of script sessions
//!
//! Loads scripts, fans host events out to every session in load order and
//! gives each session's deferred load a chance to run from the access hook.

use crate::ffi::ScriptId;
use crate::{BridgeError, Session};
use emuscript_core::{BridgeSettings, CpuType, EventKind, HostServices};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub struct ScriptManager {
    host: HostServices,
    settings: BridgeSettings,
    next_id: u32,
    sessions: Vec<(ScriptId, Arc<Session>)>,
}

impl ScriptManager {
    pub fn new(host: HostServices, settings: BridgeSettings) -> Self {
        Self {
            host,
            settings,
            next_id: 1,
            sessions: Vec::new(),
        }
    }

    /// Read a script file and load it. The script is named after the file.
    pub fn load_script(&mut self, path: &Path) -> Result<ScriptId, BridgeError> {
        let source = std::fs::read_to_string(path).map_err(|source| BridgeError::ReadScript {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.load_script_source(name, path, source)
    }

    pub fn load_script_source(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        source: impl Into<String>,
    ) -> Result<ScriptId, BridgeError> {
        let session = Session::new(self.host.clone(), self.settings.clone());
        session.load_script(name, path, source)?;

        let id = ScriptId(self.next_id);
        self.next_id += 1;
        info!(%id, script = %session.script_name(), "script added");
        self.sessions.push((id, session));
        Ok(id)
    }

    /// End a script and drop its session.
    pub fn remove_script(&mut self, id: ScriptId) -> Result<(), BridgeError> {
        let index = self
            .sessions
            .iter()
            .position(|(script, _)| *script == id)
            .ok_or(BridgeError::UnknownScript(id))?;
        let (_, session) = self.sessions.remove(index);
        session.call_event(EventKind::ScriptEnded, CpuType::default());
        info!(%id, "script removed");
        Ok(())
    }

    /// End and drop every script.
    pub fn remove_all(&mut self) {
        for (_, session) in self.sessions.drain(..) {
            session.call_event(EventKind::ScriptEnded, CpuType::default());
        }
    }

    /// Deliver an event to every session. Returns the total callbacks invoked.
    pub fn process_event(&self, kind: EventKind, cpu: CpuType) -> usize {
        self.sessions
            .iter()
            .map(|(_, session)| session.call_event(kind, cpu))
            .sum()
    }

    /// Called from the host's memory-access hook. Returns how many loads ran.
    pub fn process_access_hook(&self) -> usize {
        self.sessions
            .iter()
            .filter(|(_, session)| session.process_access_hook())
            .count()
    }

    pub fn is_save_state_allowed(&self) -> bool {
        self.sessions
            .iter()
            .all(|(_, session)| session.is_mutation_allowed())
    }

    pub fn session(&self, id: ScriptId) -> Option<&Arc<Session>> {
        self.sessions
            .iter()
            .find(|(script, _)| *script == id)
            .map(|(_, session)| session)
    }

    pub fn log(&self, id: ScriptId) -> Option<String> {
        self.session(id).map(|session| session.get_log())
    }

    pub fn script_ids(&self) -> Vec<ScriptId> {
        self.sessions.iter().map(|(id, _)| *id).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Drop for ScriptManager {
    fn drop(&mut self) {
        self.remove_all();
    }
}
