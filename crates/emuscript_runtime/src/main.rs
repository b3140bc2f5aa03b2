//! Emuscript Runtime
//!
//! Runs a script against the headless emulator and prints its log

use anyhow::{Context, Result};
use clap::Parser;
use emuscript_core::{CpuType, EventKind, HostServices};
use emuscript_script::ScriptManager;
use emuscript_services::{HeadlessEmulator, Settings};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "emuscript", version, about = "Run an emulator script headlessly")]
struct Args {
    /// Script to load
    script: PathBuf,

    /// Number of frames to emulate
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// JSON settings file
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let settings = match &args.settings {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };

    tracing::info!("Emuscript v{}", emuscript_core::VERSION);

    let emulator = Arc::new(HeadlessEmulator::new(settings.emulator.clone()));
    let mut manager = ScriptManager::new(HostServices::from_host(emulator.clone()), settings.bridge);
    let id = manager
        .load_script(&args.script)
        .with_context(|| format!("loading script {}", args.script.display()))?;

    let cpu = CpuType::default();
    for _ in 0..args.frames {
        emulator.advance_frame();
        manager.process_event(EventKind::StartFrame, cpu);
        if emulator.is_access_hook_armed() && manager.process_access_hook() > 0 {
            manager.process_event(EventKind::StateLoaded, cpu);
        }
        manager.process_event(EventKind::EndFrame, cpu);
    }
    tracing::info!(
        frames = emulator.frame_count(),
        hook_toggles = emulator.access_hook_toggles(),
        "emulation finished"
    );

    let log = manager.log(id).unwrap_or_default();
    manager.remove_script(id)?;
    println!("{log}");

    Ok(())
}
