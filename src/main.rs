//! Entry point for `chat-war`.
//!
//! Parses CLI arguments, wires stdin to the session as [`Command`]s and runs
//! the session until the user quits.  All chat behaviour lives in the library;
//! `main.rs` owns only process setup (logging, signal handling, argument
//! parsing, the input thread).

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Context;
use chat_war::command::{Command, CommandParseError, HELP};
use chat_war::config::{DEFAULT_HOST, DEFAULT_PORT};
use chat_war::console::ConsoleDisplay;
use chat_war::{Role, Session, SessionConfig};
use clap::{ArgGroup, Parser};
use tokio::sync::mpsc;

/// Two-terminal chat with deflectors, spam and other pranks.
#[derive(Parser)]
#[command(author, version, about)]
#[command(group(ArgGroup::new("mode").required(true).args(["server", "client"])))]
struct Cli {
    /// Listen for the other terminal.
    #[arg(short, long)]
    server: bool,

    /// Connect to the other terminal.
    #[arg(short, long)]
    client: bool,

    /// Host to bind (server) or dial (client).
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// TCP port.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory for `/9` session logs.
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.  It writes to
    // stderr, the chat goes to stdout.
    env_logger::init();

    let cli = Cli::parse();
    let role = if cli.server {
        Role::Listener
    } else {
        Role::Initiator
    };
    let mut config = SessionConfig::new(role, cli.host, cli.port);
    config.log_dir = cli.log_dir;
    log::info!("Starting {role} for {}", config.addr());

    let (tx, rx) = mpsc::channel(64);
    spawn_input_thread(tx)?;
    println!("Type /help for commands.");

    let mut session = Session::new(config, Box::new(ConsoleDisplay::new()));

    // A listener only binds here and takes its peer inside `run`, so
    // commands are handled while it waits.
    tokio::select! {
        res = session.start() => {
            // The session has already shown the failure; a client can retry.
            if let Err(err) = res {
                log::warn!("link not established: {err}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("interrupted while connecting");
            return Ok(());
        }
    }

    tokio::select! {
        _ = session.run(rx) => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("interrupted");
        }
    }
    // `run` closes the link itself on quit; after Ctrl-C it was cut short.
    session.shutdown().await;
    Ok(())
}

/// Read stdin on a dedicated thread; blocking reads cannot be cancelled, so
/// keeping them off the runtime lets the process exit promptly.
fn spawn_input_thread(tx: mpsc::Sender<Command>) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        log::warn!("stdin: {err}");
                        break;
                    }
                };
                if line.trim().eq_ignore_ascii_case("/help") {
                    println!("{HELP}");
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(cmd) => {
                        if tx.blocking_send(cmd).is_err() {
                            return;
                        }
                    }
                    Err(CommandParseError::Empty) => {}
                    Err(err) => eprintln!("{err}"),
                }
            }
            // End of input quits the session.
            let _ = tx.blocking_send(Command::Quit);
        })
        .context("failed to start the input thread")?;
    Ok(())
}
