//! IPC command types, global command bus, and Unix socket listener.
//!
//! Overlay commands are parsed from the socket, pushed onto an async channel,
//! and drained by the app loop on each tick. Media and assistant requests are
//! answered directly on the connection's thread.

use async_channel::{Receiver, Sender};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::assistant::{Assistant, ChatSession};
use crate::config::SharedConfig;
use crate::media::{NowPlaying, PlaybackCommand};
use crate::notch::{DeviceProfile, Phase, PROFILES};

/// An IPC command destined for the app loop.
#[derive(Debug, Clone, PartialEq)]
pub enum IpcCommand {
    Toggle,
    Expand,
    Collapse,
    SetProfile(DeviceProfile),
}

/// Async channel pair for IPC → app loop communication.
struct IpcCommandBus {
    tx: Sender<IpcCommand>,
    rx: Receiver<IpcCommand>,
}

static IPC_COMMAND_BUS: OnceLock<IpcCommandBus> = OnceLock::new();

/// Returns (or initialises) the global IPC command bus.
fn command_bus() -> &'static IpcCommandBus {
    IPC_COMMAND_BUS.get_or_init(|| {
        let (tx, rx) = async_channel::unbounded();
        IpcCommandBus { tx, rx }
    })
}

/// Returns a receiver for the app loop's drain.
pub fn subscribe_ipc_commands() -> Receiver<IpcCommand> {
    command_bus().rx.clone()
}

fn push_ipc_command(cmd: IpcCommand) {
    let _ = command_bus().tx.try_send(cmd);
}

pub fn socket_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(runtime_dir).join("notchify.sock")
}

// ---------------------------------------------------------------------------
// Shared state the listener reads
// ---------------------------------------------------------------------------

/// What `status` reports, published by the app loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub phase: Phase,
    pub profile: &'static str,
}

type SharedChat = Mutex<ChatSession<Box<dyn Assistant>>>;

static STATUS: OnceLock<Mutex<Option<StatusSnapshot>>> = OnceLock::new();
static CONFIG: OnceLock<SharedConfig> = OnceLock::new();
static NOW_PLAYING: OnceLock<Arc<NowPlaying>> = OnceLock::new();
static ASSISTANT: OnceLock<SharedChat> = OnceLock::new();

fn status_slot() -> &'static Mutex<Option<StatusSnapshot>> {
    STATUS.get_or_init(|| Mutex::new(None))
}

pub fn publish_status(snapshot: StatusSnapshot) {
    if let Ok(mut slot) = status_slot().lock() {
        *slot = Some(snapshot);
    }
}

fn current_status() -> Option<StatusSnapshot> {
    status_slot().lock().ok().and_then(|slot| slot.clone())
}

/// Config that `profile <id>` persists into.
pub fn register_config(config: SharedConfig) {
    let _ = CONFIG.set(config);
}

pub fn register_now_playing(provider: Arc<NowPlaying>) {
    let _ = NOW_PLAYING.set(provider);
}

pub fn register_assistant(session: ChatSession<Box<dyn Assistant>>) {
    let _ = ASSISTANT.set(Mutex::new(session));
}

// ---------------------------------------------------------------------------
// Command parsing
// ---------------------------------------------------------------------------

/// Parses and dispatches a single IPC command string, returning a response.
pub fn handle_ipc_command(command: &str) -> String {
    let trimmed = command.trim();
    let parts: Vec<&str> = trimmed.splitn(2, ' ').collect();
    let verb = parts.first().copied().unwrap_or("");
    let args = parts.get(1).copied().unwrap_or("").trim();

    match verb {
        "toggle" => {
            push_ipc_command(IpcCommand::Toggle);
            "OK".to_string()
        }
        "expand" => {
            push_ipc_command(IpcCommand::Expand);
            "OK".to_string()
        }
        "collapse" => {
            push_ipc_command(IpcCommand::Collapse);
            "OK".to_string()
        }
        "profile" => handle_profile(args, CONFIG.get()),
        "profiles" => handle_profiles(),
        "status" => handle_status(current_status()),
        "now-playing" => handle_now_playing(NOW_PLAYING.get().map(|p| p.as_ref())),
        "media" => handle_media(args, NOW_PLAYING.get().map(|p| p.as_ref())),
        "assistant" => handle_assistant(args, ASSISTANT.get()),
        "ask" => handle_ask(args, ASSISTANT.get()),
        other => format!("ERR: unknown command '{}'", other),
    }
}

/// `profile <id>`: validates, persists, and forwards the change.
fn handle_profile(args: &str, config: Option<&SharedConfig>) -> String {
    if args.is_empty() {
        return "ERR: profile requires <id>".to_string();
    }
    let Some(profile) = DeviceProfile::lookup(args) else {
        let ids: Vec<&str> = PROFILES.iter().map(|p| p.id).collect();
        return format!(
            "ERR: unknown profile '{}' (expected one of: {})",
            args,
            ids.join(", ")
        );
    };

    push_ipc_command(IpcCommand::SetProfile(profile));

    match config.map(|config| crate::config::persist_profile(config, profile.id)) {
        Some(Err(e)) => {
            log::warn!("Profile switched but not saved: {}", e);
            format!("OK: switched to {} (not saved: {})", profile.id, e)
        }
        _ => format!("OK: switched to {}", profile.id),
    }
}

/// `profiles`: JSON array of the known device profiles.
fn handle_profiles() -> String {
    serde_json::to_string(&PROFILES).unwrap_or_else(|_| "[]".to_string())
}

fn handle_status(snapshot: Option<StatusSnapshot>) -> String {
    let mut status = serde_json::json!({
        "version": crate::VERSION,
        "running": true,
    });
    if let Some(snapshot) = snapshot {
        status["phase"] = serde_json::json!(snapshot.phase);
        status["profile"] = serde_json::json!(snapshot.profile);
    }
    status.to_string()
}

fn handle_now_playing(provider: Option<&NowPlaying>) -> String {
    let Some(provider) = provider else {
        return "ERR: media is disabled".to_string();
    };
    let state = provider.state();
    let mut value = serde_json::to_value(&state).unwrap_or_default();
    if let Some(snapshot) = state.snapshot() {
        value["progress"] = serde_json::json!(snapshot.progress());
        value["elapsed"] = serde_json::json!(snapshot.formatted_position());
        value["length"] = serde_json::json!(snapshot.formatted_duration());
    }
    value["volume"] = serde_json::json!(provider.volume());
    value.to_string()
}

/// `media play|pause|toggle|next|previous|seek <secs>|volume <0-1>`
fn handle_media(args: &str, provider: Option<&NowPlaying>) -> String {
    let Some(provider) = provider else {
        return "ERR: media is disabled".to_string();
    };
    let mut tokens = args.split_whitespace();
    let Some(action) = tokens.next() else {
        return "ERR: media requires an action".to_string();
    };
    let value = tokens.next();

    let result = match action {
        "toggle" => provider.toggle(),
        "seek" => match value.and_then(|v| v.parse::<f64>().ok()) {
            Some(secs) => provider.seek(secs),
            None => return "ERR: seek requires <seconds>".to_string(),
        },
        "volume" => match value.and_then(|v| v.parse::<f32>().ok()) {
            Some(volume) => provider.set_volume(volume),
            None => return "ERR: volume requires a value between 0 and 1".to_string(),
        },
        other => match PlaybackCommand::parse(other) {
            Some(command) => provider.send(command),
            None => return format!("ERR: unknown media action '{}'", other),
        },
    };

    match result {
        Ok(()) => "OK".to_string(),
        Err(e) => format!("ERR: {}", e),
    }
}

fn lock_chat(session: &SharedChat) -> MutexGuard<'_, ChatSession<Box<dyn Assistant>>> {
    match session.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// `assistant [history|clear]`; bare `assistant` re-probes the server.
fn handle_assistant(args: &str, session: Option<&SharedChat>) -> String {
    let Some(session) = session else {
        return "ERR: assistant is not configured".to_string();
    };
    match args {
        "" => {
            // Probing can take seconds; keep the session unlocked meanwhile.
            let assistant = lock_chat(session).assistant();
            let availability = assistant.probe();
            let mut session = lock_chat(session);
            serde_json::to_string(session.set_availability(availability)).unwrap_or_default()
        }
        "history" => serde_json::to_string(lock_chat(session).messages())
            .unwrap_or_else(|_| "[]".to_string()),
        "clear" => {
            lock_chat(session).clear();
            "OK".to_string()
        }
        other => format!("ERR: unknown assistant action '{}'", other),
    }
}

/// `ask <prompt>`: blocks until the model answers. The session is only
/// locked to record the question and the reply.
fn handle_ask(prompt: &str, session: Option<&SharedChat>) -> String {
    if prompt.is_empty() {
        return "ERR: ask requires a prompt".to_string();
    }
    let Some(session) = session else {
        return "ERR: assistant is not configured".to_string();
    };
    let pending = lock_chat(session).begin(prompt);
    let Some(pending) = pending else {
        return "ERR: ask requires a prompt".to_string();
    };
    let reply = pending.resolve();
    let mut session = lock_chat(session);
    serde_json::json!({ "reply": session.finish(reply).content }).to_string()
}

// ---------------------------------------------------------------------------
// Unix socket listener
// ---------------------------------------------------------------------------

/// Starts the IPC listener on a Unix socket, spawning a background thread.
pub fn start_ipc_listener(socket_path: &std::path::Path) -> std::io::Result<()> {
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::{UnixListener, UnixStream};

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let listener = match UnixListener::bind(socket_path) {
        Ok(listener) => listener,
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            if UnixStream::connect(socket_path).is_ok() {
                eprintln!("Notchify is already running.");
                std::process::exit(0);
            }
            let _ = std::fs::remove_file(socket_path);
            UnixListener::bind(socket_path)?
        }
        Err(err) => return Err(err),
    };
    log::info!("IPC listening on {:?}", socket_path);

    std::thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            // `ask` can take a while; keep other clients responsive
            std::thread::spawn(move || {
                let mut reader = BufReader::new(stream);
                let mut line = String::new();
                let _ = reader.read_line(&mut line);
                log::debug!("IPC request: {}", line.trim());
                let response = handle_ipc_command(&line);
                let mut stream = reader.into_inner();
                let _ = writeln!(stream, "{}", response);
            });
        }
    });

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
