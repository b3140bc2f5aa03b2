//! Script runtime management
//!
//! Wraps a QuickJS runtime/context pair. In isolated mode each session owns
//! its own runtime; in shared mode every session borrows one process-wide
//! runtime that is created on first use and shut down when the last
//! session releases it.
//!
//! Scripts are evaluated as ES modules named after their path, so they can
//! `import` files from their own directory. Promise jobs are drained after
//! every entry into the interpreter.

use crate::adapter::ScriptFault;
use crate::ffi::RuntimeHandle;
use crate::BridgeError;
use emuscript_core::{BridgeSettings, RuntimeMode};
use rquickjs::loader::{Resolver, ScriptLoader};
use rquickjs::{CatchResultExt, CaughtError, Context, Ctx, Module, Runtime};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Script execution context
pub struct ScriptRuntime {
    handle: RuntimeHandle,
    context: Context,
    owner: RuntimeOwner,
}

enum RuntimeOwner {
    #[allow(dead_code)] // Kept alive for context lifetime
    Isolated(Runtime),
    Shared,
}

impl ScriptRuntime {
    /// Create (or join) a runtime according to `settings.runtime_mode`.
    ///
    /// `search_dir` is where bare module names are looked up. A shared
    /// runtime keeps the search directory of the session that started it.
    pub fn create(settings: &BridgeSettings, search_dir: Option<&Path>) -> Result<Self, BridgeError> {
        match settings.runtime_mode {
            RuntimeMode::Isolated => {
                let runtime = new_runtime(settings)?;
                configure_loader(&runtime, search_dir);
                let context = Context::full(&runtime)?;
                let handle = RuntimeHandle::next();
                debug!(%handle, "isolated runtime created");
                Ok(Self {
                    handle,
                    context,
                    owner: RuntimeOwner::Isolated(runtime),
                })
            }
            RuntimeMode::Shared => {
                let context = shared::acquire(settings, search_dir)?;
                Ok(Self {
                    handle: RuntimeHandle::SHARED,
                    context,
                    owner: RuntimeOwner::Shared,
                })
            }
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.handle
    }

    /// Run `f` inside the context.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: for<'js> FnOnce(Ctx<'js>) -> R + Send,
        R: Send,
    {
        self.context.with(f)
    }

    /// Evaluate `source` as the module `name`, then run the jobs it queued.
    ///
    /// Faults raised by queued jobs are returned after the module's own
    /// outcome. A module still waiting on a top-level `await` counts as
    /// started.
    pub fn execute(&self, name: &str, source: &str) -> Vec<ScriptFault> {
        let evaluated = self.context.with(|ctx| {
            Module::evaluate(ctx.clone(), name, source)
                .map(|promise| rquickjs::Persistent::save(&ctx, promise))
                .catch(&ctx)
                .map_err(ScriptFault::from_caught)
        });
        let promise = match evaluated {
            Ok(promise) => promise,
            Err(fault) => return vec![fault],
        };

        let mut faults = self.run_pending_jobs();
        let settled = self.context.with(move |ctx| {
            let promise = promise.restore(&ctx).catch(&ctx).map_err(ScriptFault::from_caught)?;
            match promise.result::<()>() {
                Some(result) => result.catch(&ctx).map_err(ScriptFault::from_caught),
                None => Ok(()),
            }
        });
        if let Err(fault) = settled {
            faults.insert(0, fault);
        }
        faults
    }

    /// Run every queued promise job. Must not be called from inside `with`.
    pub fn run_pending_jobs(&self) -> Vec<ScriptFault> {
        let mut faults = Vec::new();
        loop {
            match self.context.runtime().execute_pending_job() {
                Ok(true) => {}
                Ok(false) => break,
                Err(job) => faults.push(job.0.with(|ctx| {
                    ScriptFault::from_caught(CaughtError::from_error(&ctx, rquickjs::Error::Exception))
                })),
            }
        }
        faults
    }
}

impl Drop for ScriptRuntime {
    fn drop(&mut self) {
        if let RuntimeOwner::Shared = self.owner {
            shared::release();
        }
    }
}

fn new_runtime(settings: &BridgeSettings) -> rquickjs::Result<Runtime> {
    let runtime = Runtime::new()?;
    if let Some(limit) = settings.memory_limit {
        runtime.set_memory_limit(limit);
    }
    if let Some(size) = settings.max_stack_size {
        runtime.set_max_stack_size(size);
    }
    Ok(runtime)
}

fn configure_loader(runtime: &Runtime, search_dir: Option<&Path>) {
    let resolver = ScriptResolver::new(search_dir.unwrap_or(Path::new(".")));
    runtime.set_loader(resolver, ScriptLoader::default());
}

/// Resolves module names to script files on disk.
///
/// `./` and `../` names are relative to the importing module; bare names
/// are looked up in the search directory. A missing extension means `.js`.
#[derive(Debug, Clone)]
pub struct ScriptResolver {
    search_dir: PathBuf,
}

impl ScriptResolver {
    pub fn new(search_dir: impl Into<PathBuf>) -> Self {
        Self {
            search_dir: search_dir.into(),
        }
    }

    /// Path of the script `name` imported from module `base`, if it exists.
    pub fn resolve_path(&self, base: &str, name: &str) -> Option<PathBuf> {
        let candidate = if name.starts_with('.') {
            Path::new(base).parent().unwrap_or(Path::new("")).join(name)
        } else {
            self.search_dir.join(name)
        };
        existing_script(normalize(&candidate))
    }
}

impl Resolver for ScriptResolver {
    fn resolve<'js>(&mut self, _ctx: &Ctx<'js>, base: &str, name: &str) -> rquickjs::Result<String> {
        let path = self
            .resolve_path(base, name)
            .ok_or_else(|| rquickjs::Error::new_resolving(base, name))?;
        debug!(base, name, path = %path.display(), "module resolved");
        Ok(path.to_string_lossy().into_owned())
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn existing_script(path: PathBuf) -> Option<PathBuf> {
    if path.extension().is_some() && path.is_file() {
        return Some(path);
    }
    let mut with_extension = path.into_os_string();
    with_extension.push(".js");
    let path = PathBuf::from(with_extension);
    path.is_file().then_some(path)
}

/// Number of sessions currently holding the shared runtime.
pub fn shared_runtime_users() -> usize {
    shared::users()
}

mod shared {
    use super::{configure_loader, new_runtime};
    use emuscript_core::BridgeSettings;
    use once_cell::sync::Lazy;
    use parking_lot::Mutex;
    use rquickjs::{Context, Runtime};
    use std::path::Path;
    use tracing::info;

    struct SharedEngine {
        context: Context,
        #[allow(dead_code)] // Kept alive for context lifetime
        runtime: Runtime,
        users: usize,
    }

    static ENGINE: Lazy<Mutex<Option<SharedEngine>>> = Lazy::new(|| Mutex::new(None));

    /// Join the shared runtime, starting it if no session holds it.
    ///
    /// Settings and the module search directory only apply when the
    /// runtime is started; later joiners never reconfigure it.
    pub(super) fn acquire(
        settings: &BridgeSettings,
        search_dir: Option<&Path>,
    ) -> rquickjs::Result<Context> {
        let mut slot = ENGINE.lock();
        let engine = match slot.take() {
            Some(engine) => engine,
            None => {
                let runtime = new_runtime(settings)?;
                configure_loader(&runtime, search_dir);
                let context = Context::full(&runtime)?;
                info!("shared interpreter runtime started");
                SharedEngine {
                    context,
                    runtime,
                    users: 0,
                }
            }
        };
        let engine = slot.insert(engine);
        engine.users += 1;
        Ok(engine.context.clone())
    }

    pub(super) fn release() {
        let mut slot = ENGINE.lock();
        let Some(engine) = slot.as_mut() else {
            return;
        };
        engine.users = engine.users.saturating_sub(1);
        if engine.users == 0 {
            *slot = None;
            info!("shared interpreter runtime shut down");
        }
    }

    pub(super) fn users() -> usize {
        ENGINE.lock().as_ref().map_or(0, |engine| engine.users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("emuscript-{name}-{}", std::process::id()));
        fs::create_dir_all(dir.join("lib")).unwrap();
        dir
    }

    #[test]
    fn test_resolver_finds_bare_and_relative_names() {
        let dir = scratch_dir("resolver");
        fs::write(dir.join("helper.js"), "export const x = 1;").unwrap();
        fs::write(dir.join("lib").join("util.js"), "export const y = 2;").unwrap();
        let resolver = ScriptResolver::new(&dir);
        let main = dir.join("main.js");
        let base = main.to_string_lossy();

        assert_eq!(resolver.resolve_path(&base, "helper"), Some(dir.join("helper.js")));
        assert_eq!(resolver.resolve_path(&base, "helper.js"), Some(dir.join("helper.js")));
        assert_eq!(resolver.resolve_path(&base, "./lib/util"), Some(dir.join("lib").join("util.js")));

        let util = dir.join("lib").join("util.js");
        assert_eq!(
            resolver.resolve_path(&util.to_string_lossy(), "../helper.js"),
            Some(dir.join("helper.js"))
        );
        assert_eq!(resolver.resolve_path(&base, "missing"), None);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_normalize_drops_current_dir_components() {
        assert_eq!(normalize(Path::new("a/./b/../c.js")), PathBuf::from("a/c.js"));
        assert_eq!(normalize(Path::new("./x.js")), PathBuf::from("x.js"));
        assert_eq!(normalize(Path::new("../x.js")), PathBuf::from("../x.js"));
    }

    #[test]
    fn test_execute_reports_module_errors() {
        let runtime = ScriptRuntime::create(&BridgeSettings::default(), None).unwrap();
        let faults = runtime.execute("broken.js", "throw new RangeError('nope');");
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].kind, "RangeError");
        assert_eq!(faults[0].message, "nope");

        let faults = runtime.execute("syntax.js", "let = ;");
        assert_eq!(faults[0].kind, "SyntaxError");
    }

    #[test]
    fn test_pending_jobs_run_after_execute() {
        let runtime = ScriptRuntime::create(&BridgeSettings::default(), None).unwrap();
        let faults = runtime.execute(
            "jobs.js",
            "globalThis.settled = false; Promise.resolve().then(() => { globalThis.settled = true; });",
        );
        assert!(faults.is_empty());
        let settled = runtime.with(|ctx| ctx.globals().get::<_, bool>("settled").unwrap());
        assert!(settled);
    }
}
