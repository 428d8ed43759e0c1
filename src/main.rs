// Allow complex types in internal code
#![allow(clippy::type_complexity)]
// The app loop and its platform only exist on macOS
#![cfg_attr(not(target_os = "macos"), allow(dead_code))]

mod app;
mod assistant;
mod config;
mod ipc;
mod media;
mod notch;
mod platform;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::assistant::{Assistant, AssistantBridge, ChatSession};
use crate::config::{load_config, SharedConfig};
use crate::media::{ArtworkCache, ArtworkFetcher, HttpArtwork, NowPlaying, Osascript};
use crate::notch::{DeviceProfile, PROFILES};
use crate::platform::PlatformError;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Removes the Unix socket file on process exit.
fn install_socket_cleanup() {
    let socket = ipc::socket_path();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = std::fs::remove_file(&socket);
        std::process::exit(0);
    }) {
        log::warn!("Failed to install signal handler: {}", e);
    }
}

fn print_help() {
    println!(
        "notchify {}
A macOS notch overlay that expands on hover

USAGE:
    notchify [OPTIONS]

OPTIONS:
    -h, --help            Print this help message
    -v, --version         Print version information
    --list-profiles       List the known device profiles
    --profile <id>        Choose a device profile and save it

ENVIRONMENT:
    RUST_LOG              Set log level (error, warn, info, debug, trace)

CONFIG:
    ~/.config/notchify/config.toml

EXAMPLES:
    notchify                        Run with the saved profile
    notchify --profile macbook-16   Switch to the 16-inch layout
    RUST_LOG=debug notchify         Run with debug logging",
        VERSION
    );
}

fn print_profiles() {
    for profile in PROFILES {
        println!(
            "{:<12} {:<22} {}x{}",
            profile.id, profile.display_name, profile.base_width, profile.base_height
        );
    }
}

fn init_logging() {
    // Flush each line for interactive debugging.
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    logger
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {:>5} {}] {}",
                chrono::Utc::now().to_rfc3339(),
                record.level(),
                record.target(),
                record.args()
            )?;
            buf.flush()
        })
        .init();
}

fn start_media(config: &SharedConfig) {
    let media = match config.read() {
        Ok(cfg) => cfg.media.clone(),
        Err(poisoned) => poisoned.into_inner().media.clone(),
    };
    if !media.enabled {
        log::info!("Media polling disabled");
        return;
    }

    let fetcher: Option<Box<dyn ArtworkFetcher>> = match HttpArtwork::new() {
        Ok(fetcher) => Some(Box::new(fetcher)),
        Err(e) => {
            log::warn!("Artwork downloads disabled: {}", e);
            None
        }
    };
    let provider = NowPlaying::spawn(
        Arc::new(Osascript),
        ArtworkCache::new(fetcher),
        Duration::from_millis(media.poll_interval_ms),
    );
    ipc::register_now_playing(Arc::new(provider));
}

fn start_assistant(config: &SharedConfig) {
    let settings = match config.read() {
        Ok(cfg) => cfg.assistant.clone(),
        Err(poisoned) => poisoned.into_inner().assistant.clone(),
    };
    // Probing blocks for up to two seconds
    std::thread::spawn(move || match AssistantBridge::new(&settings) {
        Ok(bridge) => {
            log::info!("Assistant model '{}' at {}", bridge.model(), settings.base_url);
            let session = ChatSession::new(Box::new(bridge) as Box<dyn Assistant>);
            ipc::register_assistant(session);
        }
        Err(e) => log::warn!("Assistant disabled: {}", e),
    });
}

#[cfg(target_os = "macos")]
fn run_app(config: SharedConfig) -> Result<(), PlatformError> {
    use crate::config::ConfigWatcher;
    use crate::notch::SystemClock;
    use crate::platform::macos::MacPlatform;

    let platform = MacPlatform::new()?;
    let mut app = app::App::new(
        platform,
        config.clone(),
        ipc::subscribe_ipc_commands(),
        SystemClock,
    )?;
    match ConfigWatcher::new(config) {
        Ok(watcher) => app = app.with_config_watcher(watcher),
        Err(e) => log::error!("Failed to set up config watcher: {}", e),
    }
    app.run()
}

#[cfg(not(target_os = "macos"))]
fn run_app(_config: SharedConfig) -> Result<(), PlatformError> {
    Err(PlatformError::Unsupported)
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli_profile: Option<DeviceProfile> = None;

    if !args.is_empty() {
        match args[0].as_str() {
            "-h" | "--help" => {
                print_help();
                return;
            }
            "-v" | "--version" => {
                println!("notchify {}", VERSION);
                return;
            }
            "--list-profiles" => {
                print_profiles();
                return;
            }
            "--profile" => {
                let Some(id) = args.get(1) else {
                    eprintln!("--profile requires an id. Try 'notchify --list-profiles'.");
                    std::process::exit(1);
                };
                match DeviceProfile::lookup(id) {
                    Some(profile) => cli_profile = Some(profile),
                    None => {
                        eprintln!("Unknown profile '{}'.", id);
                        eprintln!("Try 'notchify --list-profiles' for the valid ids.");
                        std::process::exit(1);
                    }
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[0]);
                eprintln!("Try 'notchify --help' for more information.");
                std::process::exit(1);
            }
        }
    }

    init_logging();
    log::info!("Starting Notchify v{}", VERSION);

    if cfg!(not(target_os = "macos")) {
        log::error!("{}", PlatformError::Unsupported);
        std::process::exit(1);
    }

    let config: SharedConfig = Arc::new(RwLock::new(load_config()));
    if let Some(profile) = cli_profile {
        match config::persist_profile(&config, profile.id) {
            Ok(()) => log::info!("Saved profile '{}'", profile.id),
            Err(e) => log::warn!("Using profile '{}' without saving it: {}", profile.id, e),
        }
    }
    let onboarded = config
        .read()
        .map(|cfg| cfg.notch.onboarding_complete)
        .unwrap_or(false);
    if !onboarded {
        log::info!(
            "No device profile chosen yet; run 'notchify --list-profiles' and 'notchify --profile <id>'"
        );
    }

    ipc::register_config(config.clone());
    start_media(&config);
    start_assistant(&config);

    if let Err(err) = ipc::start_ipc_listener(&ipc::socket_path()) {
        log::warn!("Failed to start IPC listener: {}", err);
    }
    install_socket_cleanup();

    if let Err(e) = run_app(config) {
        log::error!("{}", e);
        let _ = std::fs::remove_file(ipc::socket_path());
        std::process::exit(1);
    }
}
