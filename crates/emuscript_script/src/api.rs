//! Native entry points exposed to scripts as the global `emu` object
//!
//! None of these functions receives a session: each resolves the session
//! whose runtime is active on the calling thread. Bad arguments raise a
//! script exception and leave the session untouched.

use crate::adapter::ScriptCallback;
use crate::ffi::SnapshotHandle;
use crate::input::{self, InputError};
use crate::{registry, Session};
use emuscript_core::{EventKind, MemoryKind};
use rquickjs::convert::Coerced;
use rquickjs::{Array, Ctx, Exception, Function, Object, TypedArray, Value};
use std::path::PathBuf;
use std::sync::Arc;

const PRELUDE: &str = include_str!("prelude.js");

/// Install `emu` and the prelude into the context's globals.
pub fn install(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let emu = Object::new(ctx.clone())?;
    emu.set("log", Function::new(ctx.clone(), log)?)?;
    emu.set("read8", Function::new(ctx.clone(), read8)?)?;
    emu.set(
        "registerFrameMemory",
        Function::new(ctx.clone(), register_frame_memory)?,
    )?;
    emu.set(
        "unregisterFrameMemory",
        Function::new(ctx.clone(), unregister_frame_memory)?,
    )?;
    emu.set("readFrameMemory", Function::new(ctx.clone(), read_frame_memory)?)?;
    emu.set(
        "registerScreenMemory",
        Function::new(ctx.clone(), register_screen_memory)?,
    )?;
    emu.set(
        "unregisterScreenMemory",
        Function::new(ctx.clone(), unregister_screen_memory)?,
    )?;
    emu.set("readScreenMemory", Function::new(ctx.clone(), read_screen_memory)?)?;
    emu.set("getScreenSize", Function::new(ctx.clone(), get_screen_size)?)?;
    emu.set("addEventCallback", Function::new(ctx.clone(), add_event_callback)?)?;
    emu.set(
        "removeEventCallback",
        Function::new(ctx.clone(), remove_event_callback)?,
    )?;
    emu.set("loadSaveState", Function::new(ctx.clone(), load_save_state)?)?;
    emu.set("setInput", Function::new(ctx.clone(), set_input)?)?;
    emu.set("getInput", Function::new(ctx.clone(), get_input)?)?;
    ctx.globals().set("emu", emu)?;

    ctx.eval::<(), _>(PRELUDE)
}

fn current_session(ctx: &Ctx<'_>) -> rquickjs::Result<Arc<Session>> {
    registry::current().ok_or_else(|| Exception::throw_type(ctx, "No active script session."))
}

fn memory_kind(ctx: &Ctx<'_>, kind: i32) -> rquickjs::Result<MemoryKind> {
    u32::try_from(kind)
        .map(MemoryKind)
        .map_err(|_| Exception::throw_range(ctx, "Memory type must not be negative"))
}

fn event_kind(ctx: &Ctx<'_>, kind: i32) -> rquickjs::Result<EventKind> {
    EventKind::try_from(kind).map_err(|err| Exception::throw_range(ctx, &err.to_string()))
}

fn port(ctx: &Ctx<'_>, value: i32) -> rquickjs::Result<u8> {
    u8::try_from(value).map_err(|_| Exception::throw_range(ctx, "Invalid port"))
}

fn callable<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<Function<'js>> {
    value
        .into_function()
        .ok_or_else(|| Exception::throw_type(ctx, "First argument must be callable"))
}

fn log<'js>(ctx: Ctx<'js>, message: Coerced<String>) -> rquickjs::Result<()> {
    current_session(&ctx)?.log(message.0);
    Ok(())
}

fn read8<'js>(ctx: Ctx<'js>, address: i32, kind: i32, signed: bool) -> rquickjs::Result<i32> {
    let session = current_session(&ctx)?;
    let kind = memory_kind(&ctx, kind)?;
    let address = u32::try_from(address)
        .map_err(|_| Exception::throw_range(&ctx, "Address must not be negative"))?;
    let value = session.read_memory(kind, address);
    Ok(if signed {
        i32::from(value as i8)
    } else {
        i32::from(value)
    })
}

fn register_frame_memory<'js>(
    ctx: Ctx<'js>,
    kind: i32,
    addresses: Vec<i32>,
) -> rquickjs::Result<Option<u32>> {
    let session = current_session(&ctx)?;
    let kind = memory_kind(&ctx, kind)?;
    let addresses = addresses
        .into_iter()
        .map(u32::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| Exception::throw_range(&ctx, "Addresses must not be negative"))?;
    Ok(session
        .register_frame_memory(kind, addresses)
        .map(SnapshotHandle::to_raw))
}

fn unregister_frame_memory<'js>(ctx: Ctx<'js>, handle: u32) -> rquickjs::Result<bool> {
    let session = current_session(&ctx)?;
    Ok(session.unregister_frame_memory(SnapshotHandle::from_raw(handle)))
}

fn read_frame_memory<'js>(ctx: Ctx<'js>, handle: u32) -> rquickjs::Result<Option<Vec<u8>>> {
    let session = current_session(&ctx)?;
    Ok(session.frame_memory(SnapshotHandle::from_raw(handle)))
}

fn register_screen_memory<'js>(ctx: Ctx<'js>) -> rquickjs::Result<u32> {
    let session = current_session(&ctx)?;
    Ok(session.register_screen_memory().to_raw())
}

fn unregister_screen_memory<'js>(ctx: Ctx<'js>, handle: u32) -> rquickjs::Result<bool> {
    let session = current_session(&ctx)?;
    Ok(session.unregister_screen_memory(SnapshotHandle::from_raw(handle)))
}

/// Pixels of the last frame as a `Uint32Array` of `width * height` entries.
fn read_screen_memory<'js>(
    ctx: Ctx<'js>,
    handle: u32,
) -> rquickjs::Result<Option<TypedArray<'js, u32>>> {
    let session = current_session(&ctx)?;
    session
        .screen_memory(SnapshotHandle::from_raw(handle))
        .map(|pixels| TypedArray::new(ctx.clone(), pixels))
        .transpose()
}

fn get_screen_size<'js>(ctx: Ctx<'js>, handle: u32) -> rquickjs::Result<Option<Object<'js>>> {
    let session = current_session(&ctx)?;
    let Some(size) = session.screen_size(SnapshotHandle::from_raw(handle)) else {
        return Ok(None);
    };
    let dimensions = Object::new(ctx.clone())?;
    dimensions.set("width", size.width)?;
    dimensions.set("height", size.height)?;
    Ok(Some(dimensions))
}

fn add_event_callback<'js>(ctx: Ctx<'js>, callback: Value<'js>, kind: i32) -> rquickjs::Result<()> {
    let session = current_session(&ctx)?;
    let callback = callable(&ctx, callback)?;
    let kind = event_kind(&ctx, kind)?;
    session.add_callback(kind, ScriptCallback::save(&ctx, callback));
    Ok(())
}

fn remove_event_callback<'js>(
    ctx: Ctx<'js>,
    callback: Value<'js>,
    kind: i32,
) -> rquickjs::Result<()> {
    let session = current_session(&ctx)?;
    let callback = callable(&ctx, callback)?;
    let kind = event_kind(&ctx, kind)?;
    session.remove_callback(kind, |saved| saved.is(&ctx, &callback));
    Ok(())
}

fn load_save_state<'js>(ctx: Ctx<'js>, path: String) -> rquickjs::Result<()> {
    let session = current_session(&ctx)?;
    session.request_load_state(PathBuf::from(path));
    Ok(())
}

fn set_input<'js>(
    ctx: Ctx<'js>,
    port_index: i32,
    subport_index: i32,
    buttons: Array<'js>,
) -> rquickjs::Result<()> {
    let session = current_session(&ctx)?;
    let port_index = port(&ctx, port_index)?;
    let subport_index = port(&ctx, subport_index)?;
    let device = session
        .controller(port_index, subport_index)
        .ok_or_else(|| Exception::throw_range(&ctx, "Invalid port"))?;

    let mut states = Vec::with_capacity(buttons.len());
    for value in buttons.iter::<Value>() {
        let value = value?;
        let state = if value.is_undefined() || value.is_null() {
            None
        } else if let Some(pressed) = value.as_bool() {
            Some(pressed)
        } else {
            return Err(Exception::throw_type(&ctx, &InputError::NotBoolean.to_string()));
        };
        states.push(state);
    }

    input::apply_buttons(device.as_ref(), states)
        .map_err(|err| Exception::throw_type(&ctx, &err.to_string()))
}

fn get_input<'js>(ctx: Ctx<'js>, port_index: i32, subport_index: i32) -> rquickjs::Result<Vec<bool>> {
    let session = current_session(&ctx)?;
    let port_index = port(&ctx, port_index)?;
    let subport_index = port(&ctx, subport_index)?;
    let device = session
        .controller(port_index, subport_index)
        .ok_or_else(|| Exception::throw_range(&ctx, "Invalid port"))?;
    Ok(input::read_buttons(device.as_ref()).to_vec())
}
