//! Command-line tool to send messages to a running Notchify instance

use std::env;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

fn socket_path() -> PathBuf {
    let runtime_dir = env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(runtime_dir).join("notchify.sock")
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        eprintln!("Usage: notchify-msg <command> [args...]");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  toggle | expand | collapse      Drive the overlay");
        eprintln!("  profile <id>                    Switch and save the device profile");
        eprintln!("  profiles                        List device profiles (JSON)");
        eprintln!("  status                          Get overlay status (JSON)");
        eprintln!("  now-playing                     Get the current track (JSON)");
        eprintln!("  media play|pause|toggle|next|previous");
        eprintln!("  media seek <secs> | volume <0-1>");
        eprintln!("  assistant                       Check the assistant server (JSON)");
        eprintln!("  ask <prompt>                    Ask the assistant (JSON)");
        std::process::exit(1);
    }

    let command = args.join(" ");
    let socket = socket_path();

    match UnixStream::connect(&socket) {
        Ok(mut stream) => {
            if let Err(e) = writeln!(stream, "{}", command) {
                eprintln!("Failed to send command: {}", e);
                std::process::exit(1);
            }

            let mut reader = BufReader::new(stream);
            let mut response = String::new();
            if let Err(e) = reader.read_line(&mut response) {
                eprintln!("Failed to read response: {}", e);
                std::process::exit(1);
            }

            let response = response.trim();
            println!("{}", response);
            if response.starts_with("ERR:") {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Failed to connect to Notchify at {:?}: {}", socket, e);
            eprintln!("Is Notchify running?");
            std::process::exit(1);
        }
    }
}
