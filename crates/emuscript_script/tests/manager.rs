use emuscript_core::{BridgeSettings, CpuType, EventKind, HostServices};
use emuscript_script::{BridgeError, ScriptId, ScriptManager, SessionState};
use emuscript_services::HeadlessEmulator;
use std::sync::Arc;

const CPU: CpuType = CpuType(0);

fn manager() -> (Arc<HeadlessEmulator>, ScriptManager) {
    let emu = Arc::new(HeadlessEmulator::default());
    let manager = ScriptManager::new(HostServices::from_host(emu.clone()), BridgeSettings::default());
    (emu, manager)
}

const COUNTER: &str = r#"
let frames = 0;
emu.addEventCallback(function () {
    frames += 1;
    emu.log("frame " + frames);
}, eventType.startFrame);
"#;

#[test]
fn events_reach_every_script() {
    let (_emu, mut manager) = manager();
    let a = manager.load_script_source("a.js", "a.js", COUNTER).unwrap();
    let b = manager.load_script_source("b.js", "b.js", COUNTER).unwrap();
    assert_ne!(a, b);
    assert_eq!(manager.script_ids(), vec![a, b]);

    assert_eq!(manager.process_event(EventKind::StartFrame, CPU), 2);
    assert_eq!(manager.process_event(EventKind::StartFrame, CPU), 2);
    assert_eq!(manager.process_event(EventKind::Nmi, CPU), 0);

    assert_eq!(manager.log(a).unwrap(), "frame 1\nframe 2");
    assert_eq!(manager.log(b).unwrap(), "frame 1\nframe 2");
}

#[test]
fn removing_a_script_ends_it() {
    let (_emu, mut manager) = manager();
    let a = manager.load_script_source("a.js", "a.js", COUNTER).unwrap();
    let b = manager.load_script_source("b.js", "b.js", COUNTER).unwrap();
    manager.process_event(EventKind::StartFrame, CPU);

    let session = manager.session(a).unwrap().clone();
    manager.remove_script(a).unwrap();
    assert_eq!(session.state(), SessionState::Ended);
    assert_eq!(manager.len(), 1);
    assert!(manager.log(a).is_none());

    assert_eq!(manager.process_event(EventKind::StartFrame, CPU), 1);
    assert_eq!(manager.log(b).unwrap(), "frame 1\nframe 2");

    assert!(matches!(
        manager.remove_script(ScriptId(99)),
        Err(BridgeError::UnknownScript(ScriptId(99)))
    ));

    manager.remove_all();
    assert!(manager.is_empty());
}

#[test]
fn access_hook_runs_pending_loads() {
    let (emu, mut manager) = manager();
    emu.save_state("quick.mss");
    manager
        .load_script_source("loader.js", "loader.js", r#"emu.loadSaveState("quick.mss");"#)
        .unwrap();
    manager
        .load_script_source("idle.js", "idle.js", "")
        .unwrap();

    manager.process_event(EventKind::StartFrame, CPU);
    assert!(manager.is_save_state_allowed());
    assert!(emu.is_access_hook_armed());

    assert_eq!(manager.process_access_hook(), 1);
    assert_eq!(manager.process_access_hook(), 0);
    assert_eq!(emu.loaded_states().len(), 1);
}

#[test]
fn script_files_are_named_after_the_file() {
    let dir = std::env::temp_dir().join(format!("emuscript-manager-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("hello.js");
    std::fs::write(&path, r#"emu.log("hello");"#).unwrap();

    let (_emu, mut manager) = manager();
    let id = manager.load_script(&path).unwrap();
    manager.process_event(EventKind::StartFrame, CPU);

    let session = manager.session(id).unwrap();
    assert_eq!(session.script_name(), "hello.js");
    assert_eq!(session.script_path(), Some(path.as_path()));
    assert_eq!(manager.log(id).unwrap(), "hello");

    let missing = manager.load_script(&dir.join("missing.js"));
    assert!(matches!(missing, Err(BridgeError::ReadScript { .. })));

    std::fs::remove_dir_all(&dir).unwrap();
}
