//! One loaded script's full runtime state
//!
//! Lifecycle: `Unloaded → PendingInit → Ready → Ended`.
//!
//! - `load_script` stores the source; no interpreter exists yet.
//! - The first `StartFrame` creates the runtime, registers it, installs the
//!   `emu` API and runs the script once. A failing script still reaches
//!   `Ready`.
//! - Every later event refreshes snapshots (on `StartFrame`) and invokes
//!   the callbacks registered for it, in registration order. Promise jobs
//!   queued by the script run before the event returns.
//! - `ScriptEnded` unregisters and destroys the runtime. It is a no-op if
//!   no runtime was ever created.
//!
//! The `lifecycle` mutex is the execution lock: it is held for every entry
//! into the interpreter. The log, snapshots, callbacks and deferred load
//! each have their own lock so entry points can use them while a script
//! call is in flight.

use crate::adapter::{self, ScriptCallback, ScriptFault};
use crate::callbacks::CallbackTable;
use crate::deferred::DeferredMutation;
use crate::ffi::{RuntimeHandle, SnapshotHandle};
use crate::log_sink::LogSink;
use crate::registry::{self, ActiveScope};
use crate::runtime::ScriptRuntime;
use crate::snapshot::MemorySnapshotRegistry;
use crate::{api, BridgeError};
use emuscript_core::{
    BridgeSettings, ControlDevice, CpuType, EventKind, FrameSize, HostServices, MemoryKind,
};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Observable lifecycle state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unloaded,
    PendingInit,
    Ready,
    Ended,
}

#[derive(Debug, Clone)]
struct ScriptInfo {
    name: String,
    path: PathBuf,
}

impl ScriptInfo {
    fn directory(&self) -> Option<&Path> {
        self.path.parent().filter(|dir| !dir.as_os_str().is_empty())
    }

    /// Module name the script is evaluated under; relative imports resolve
    /// against it.
    fn module_name(&self) -> String {
        if self.path.as_os_str().is_empty() {
            self.name.clone()
        } else {
            self.path.to_string_lossy().into_owned()
        }
    }
}

enum Lifecycle {
    Unloaded,
    PendingInit { source: String },
    Ready(ScriptRuntime),
    Ended,
}

impl Lifecycle {
    fn state(&self) -> SessionState {
        match self {
            Lifecycle::Unloaded => SessionState::Unloaded,
            Lifecycle::PendingInit { .. } => SessionState::PendingInit,
            Lifecycle::Ready(_) => SessionState::Ready,
            Lifecycle::Ended => SessionState::Ended,
        }
    }
}

pub struct Session {
    this: Weak<Session>,
    host: HostServices,
    settings: BridgeSettings,
    info: OnceCell<ScriptInfo>,
    runtime_handle: OnceCell<RuntimeHandle>,
    lifecycle: Mutex<Lifecycle>,
    executing: AtomicBool,
    callbacks: Mutex<CallbackTable<ScriptCallback>>,
    snapshots: Mutex<MemorySnapshotRegistry>,
    deferred: Mutex<DeferredMutation>,
    log: LogSink,
}

/// Held while script code may run; marks the runtime active on this thread.
struct Execution<'a> {
    session: &'a Session,
    _scope: ActiveScope,
}

impl Drop for Execution<'_> {
    fn drop(&mut self) {
        self.session.executing.store(false, Ordering::Release);
    }
}

impl Session {
    pub fn new(host: HostServices, settings: BridgeSettings) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            host,
            log: LogSink::new(settings.log_capacity),
            snapshots: Mutex::new(MemorySnapshotRegistry::new(settings.screen_capacity)),
            settings,
            info: OnceCell::new(),
            runtime_handle: OnceCell::new(),
            lifecycle: Mutex::new(Lifecycle::Unloaded),
            executing: AtomicBool::new(false),
            callbacks: Mutex::new(CallbackTable::new()),
            deferred: Mutex::new(DeferredMutation::new()),
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Store the script for execution on the first `StartFrame`.
    pub fn load_script(
        &self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        source: impl Into<String>,
    ) -> Result<(), BridgeError> {
        let info = ScriptInfo {
            name: name.into(),
            path: path.into(),
        };
        let mut lifecycle = self.lifecycle.lock();
        if !matches!(*lifecycle, Lifecycle::Unloaded) {
            return Err(BridgeError::AlreadyLoaded { name: info.name });
        }
        info!(script = %info.name, path = %info.path.display(), "script loaded");
        let _ = self.info.set(info);
        *lifecycle = Lifecycle::PendingInit {
            source: source.into(),
        };
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.lock().state()
    }

    /// Whether an interpreter is live for this session.
    pub fn is_initialized(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub fn script_name(&self) -> &str {
        self.info.get().map_or("", |info| info.name.as_str())
    }

    pub fn script_path(&self) -> Option<&Path> {
        self.info.get().map(|info| info.path.as_path())
    }

    /// Runtime handle assigned at initialization.
    pub fn runtime_handle(&self) -> Option<RuntimeHandle> {
        self.runtime_handle.get().copied()
    }

    /// Whether script code of this session is running on some thread.
    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::Acquire)
    }

    /// Whether the host may trigger disruptive state changes (save/load).
    pub fn is_mutation_allowed(&self) -> bool {
        !self.is_executing()
    }

    fn is_reentrant_call(&self) -> bool {
        self.runtime_handle()
            .is_some_and(|handle| registry::active_handle() == Some(handle))
            && self.is_executing()
    }

    fn enter(&self, handle: RuntimeHandle) -> Execution<'_> {
        let scope = ActiveScope::enter(handle);
        self.executing.store(true, Ordering::Release);
        Execution {
            session: self,
            _scope: scope,
        }
    }

    /// Deliver a host event. Returns the number of callbacks invoked.
    pub fn call_event(&self, kind: EventKind, cpu: CpuType) -> usize {
        if self.is_reentrant_call() {
            warn!(script = %self.script_name(), %kind, "event raised from inside a script call; ignored");
            return 0;
        }

        if kind == EventKind::ScriptEnded {
            self.teardown();
            return 0;
        }

        let mut lifecycle = self.lifecycle.lock();
        if kind == EventKind::StartFrame {
            self.initialize(&mut lifecycle);
        }
        let Lifecycle::Ready(runtime) = &*lifecycle else {
            return 0;
        };

        let _execution = self.enter(runtime.handle());
        if kind == EventKind::StartFrame {
            self.refresh_snapshots();
        }

        let callbacks = self.callbacks.lock().snapshot(kind);
        if callbacks.is_empty() {
            return 0;
        }
        let invoked = callbacks.len();
        let mut faults = runtime.with(move |ctx| {
            callbacks
                .iter()
                .filter_map(|callback| adapter::invoke_event_callback(&ctx, callback, cpu).err())
                .collect::<Vec<_>>()
        });
        faults.extend(runtime.run_pending_jobs());
        for fault in &faults {
            self.log_fault(fault);
        }
        invoked
    }

    fn initialize(&self, lifecycle: &mut Lifecycle) {
        if !matches!(lifecycle, Lifecycle::PendingInit { .. }) {
            return;
        }
        let Lifecycle::PendingInit { source } = std::mem::replace(lifecycle, Lifecycle::Ended) else {
            return;
        };

        let directory = self.info.get().and_then(ScriptInfo::directory);
        let module_name = self
            .info
            .get()
            .map(ScriptInfo::module_name)
            .unwrap_or_default();
        let runtime = match ScriptRuntime::create(&self.settings, directory) {
            Ok(runtime) => runtime,
            Err(err) => {
                error!(script = %self.script_name(), %err, "failed to create script runtime");
                self.log(format!("Failed to start script: {err}"));
                return;
            }
        };

        let handle = runtime.handle();
        if let Err(err) = registry::sessions().register(handle, &self.this) {
            error!(script = %self.script_name(), %err, "failed to register script session");
            self.log(format!("Failed to start script: {err}"));
            return;
        }
        let _ = self.runtime_handle.set(handle);

        {
            let _execution = self.enter(handle);
            let installed = runtime.with(|ctx| {
                api::install(&ctx).map_err(|err| ScriptFault {
                    kind: "InternalError".to_string(),
                    message: format!("failed to install the emu API: {err}"),
                    traceback: None,
                })
            });
            let faults = match installed {
                Ok(()) => runtime.execute(&module_name, &source),
                Err(fault) => vec![fault],
            };
            for fault in &faults {
                self.log_fault(fault);
            }
            info!(script = %self.script_name(), %handle, faults = faults.len(), "script started");
        }

        *lifecycle = Lifecycle::Ready(runtime);
    }

    fn teardown(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Ended);
        match previous {
            Lifecycle::Ready(runtime) => {
                registry::sessions().unregister(self);
                runtime.with(|_ctx| self.callbacks.lock().clear());
                self.snapshots.lock().clear();
                if self.deferred.lock().cancel() {
                    self.host.access_hook.disable_access_hook();
                }
                drop(runtime);
                info!(script = %self.script_name(), "script ended");
            }
            Lifecycle::PendingInit { .. } | Lifecycle::Unloaded => {
                debug!(script = %self.script_name(), "script ended before it started");
            }
            Lifecycle::Ended => {}
        }
    }

    fn refresh_snapshots(&self) {
        let mut snapshots = self.snapshots.lock();
        snapshots.update_frame_memory(self.host.memory.as_ref());
        if let Err(err) = snapshots.update_screen_memory(|| self.host.render_current_frame()) {
            self.log(err.to_string());
        }
    }

    // ------------------------------------------------------------------
    // Log
    // ------------------------------------------------------------------

    pub fn log(&self, message: impl Into<String>) {
        self.log.push(message);
    }

    fn log_fault(&self, fault: &ScriptFault) {
        warn!(script = %self.script_name(), %fault, "script error");
        for line in fault.log_lines() {
            self.log.push(line);
        }
    }

    /// Log entries joined for display.
    pub fn get_log(&self) -> String {
        self.log.text()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.log.lines()
    }

    // ------------------------------------------------------------------
    // Memory
    // ------------------------------------------------------------------

    pub fn read_memory(&self, kind: MemoryKind, address: u32) -> u8 {
        self.host.memory.read_byte(kind, address)
    }

    pub fn register_frame_memory(
        &self,
        kind: MemoryKind,
        addresses: Vec<u32>,
    ) -> Option<SnapshotHandle> {
        self.snapshots
            .lock()
            .register_frame_memory(kind, addresses, self.host.memory.as_ref())
    }

    pub fn unregister_frame_memory(&self, handle: SnapshotHandle) -> bool {
        self.snapshots.lock().unregister_frame_memory(handle)
    }

    /// Copy of a frame-memory buffer.
    pub fn frame_memory(&self, handle: SnapshotHandle) -> Option<Vec<u8>> {
        self.snapshots.lock().frame_memory(handle).map(<[u8]>::to_vec)
    }

    pub fn register_screen_memory(&self) -> SnapshotHandle {
        self.snapshots.lock().register_screen_memory()
    }

    pub fn unregister_screen_memory(&self, handle: SnapshotHandle) -> bool {
        self.snapshots.lock().unregister_screen_memory(handle)
    }

    /// Copy of the screen buffer while it is registered.
    pub fn screen_memory(&self, handle: SnapshotHandle) -> Option<Vec<u32>> {
        self.snapshots.lock().screen_memory(handle).map(<[u32]>::to_vec)
    }

    /// Dimensions of the last frame copied into the screen buffer.
    pub fn screen_size(&self, handle: SnapshotHandle) -> Option<FrameSize> {
        self.snapshots.lock().screen_size(handle)
    }

    pub fn screen_memory_refs(&self) -> u32 {
        self.snapshots.lock().screen_refs()
    }

    pub fn frame_memory_registrations(&self) -> usize {
        self.snapshots.lock().frame_registrations()
    }

    // ------------------------------------------------------------------
    // Callbacks
    // ------------------------------------------------------------------

    pub fn add_callback(&self, kind: EventKind, callback: ScriptCallback) {
        self.callbacks.lock().add(kind, callback);
        debug!(script = %self.script_name(), %kind, "event callback added");
    }

    pub fn remove_callback<F>(&self, kind: EventKind, is_match: F) -> bool
    where
        F: FnMut(&ScriptCallback) -> bool,
    {
        self.callbacks.lock().remove_first(kind, is_match)
    }

    pub fn callback_count(&self, kind: EventKind) -> usize {
        self.callbacks.lock().len(kind)
    }

    // ------------------------------------------------------------------
    // Deferred state load
    // ------------------------------------------------------------------

    /// Queue a save-state load to be applied from the access hook.
    pub fn request_load_state(&self, path: PathBuf) {
        debug!(script = %self.script_name(), path = %path.display(), "save state load requested");
        if self.deferred.lock().request(path) {
            self.host.access_hook.enable_access_hook();
        }
    }

    pub fn pending_load_state(&self) -> Option<PathBuf> {
        self.deferred.lock().pending().map(Path::to_path_buf)
    }

    /// Called by the host from the armed memory-access hook.
    ///
    /// Applies the pending load, if any, and disarms the hook. Does nothing
    /// while a script call is in flight. Returns whether a load was applied.
    pub fn process_access_hook(&self) -> bool {
        if self.is_executing() {
            return false;
        }
        let Some(path) = self.deferred.lock().take() else {
            return false;
        };
        self.host.access_hook.disable_access_hook();
        if self.host.save_states.load_state(&path) {
            info!(script = %self.script_name(), path = %path.display(), "save state loaded");
        } else {
            warn!(script = %self.script_name(), path = %path.display(), "save state load failed");
            self.log(format!("Failed to load save state: {}", path.display()));
        }
        true
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    pub fn controller(&self, port: u8, subport: u8) -> Option<Arc<dyn ControlDevice>> {
        self.host.controllers.device(port, subport)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
        registry::sessions().unregister(self as *const Session);
    }
}
