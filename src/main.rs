//! bbsterm - a telnet BBS node
//!
//! Accepts telnet callers and walks each one through a short sign-up form
//! built from bounded input fields. The first caller can be mirrored on
//! the local console, where the sysop can watch and type along.
//!
//! # Quick Start
//!
//! ```text
//! bbsterm                    # Listen on the configured address (0.0.0.0:2323)
//! bbsterm -l 127.0.0.1:23    # Listen elsewhere
//! bbsterm --no-console       # Run headless
//! ```
//!
//! # Form keys
//!
//! | Key | Action |
//! |-----|--------|
//! | Enter, Tab, Down | Next field |
//! | Up, Ctrl+O | Previous field |
//! | F1 | Finish the form |
//! | Esc | Abort |
//! | Ins | Toggle insert mode |

use std::env;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use bbsterm::config::{config_dir, Config};
use bbsterm::core::term::DrawSurface;
use bbsterm::core::transport::Result as TransportResult;
use bbsterm::ui::{ConsoleSurface, HeadlessSurface};
use bbsterm::{CharPolicy, Session, SessionSettings, Verdict};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long the closing screen waits for a key
const GOODBYE_WAIT: Duration = Duration::from_secs(30);

/// Command line options layered over the config file
#[derive(Default)]
struct Options {
    listen: Option<String>,
    no_console: bool,
    save_config: bool,
}

fn print_version() {
    eprintln!("bbsterm {}", VERSION);
}

fn print_help() {
    eprintln!("bbsterm {} - telnet BBS node", VERSION);
    eprintln!();
    eprintln!("Usage: bbsterm [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -l, --listen <ADDR>   Listen address (default from config.toml)");
    eprintln!("  --no-console          Do not mirror callers on the local console");
    eprintln!("  --save-config         Write the effective settings to config.toml");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Logging goes to ~/.bbsterm/bbsterm.log; set RUST_LOG to adjust.");
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-l" | "--listen" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing listen address".to_string());
                }
                options.listen = Some(args[i].clone());
            }
            "--no-console" => options.no_console = true,
            "--save-config" => options.save_config = true,
            other => return Err(format!("Unknown option: {}", other)),
        }
        i += 1;
    }

    Ok(options)
}

fn init_logging() {
    let log_path = config_dir()
        .map(|dir| dir.join("bbsterm.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("bbsterm.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_thread_names(true)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("bbsterm {} starting...", VERSION);

    let mut config = Config::load();
    if let Some(listen) = options.listen {
        config.node.listen = listen;
    }
    if options.no_console {
        config.node.local_console = false;
    }
    if options.save_config {
        config.save().map_err(anyhow::Error::msg)?;
    }

    let listener = TcpListener::bind(&config.node.listen)
        .with_context(|| format!("Failed to listen on {}", config.node.listen))?;
    info!("Listening on {}", config.node.listen);
    eprintln!("bbsterm listening on {}", config.node.listen);

    let console_busy = Arc::new(AtomicBool::new(false));

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!("Accept failed: {}", e);
                continue;
            }
        };

        let settings = config.session_settings();
        let use_console = config.node.local_console && !console_busy.swap(true, Ordering::SeqCst);
        let console_busy = console_busy.clone();

        thread::Builder::new()
            .name("caller".to_string())
            .spawn(move || {
                let result = if use_console {
                    run_with_console(stream, settings)
                } else {
                    let surface = HeadlessSurface::new(settings.width, settings.height);
                    run_caller(stream, surface, settings)
                };
                if use_console {
                    console_busy.store(false, Ordering::SeqCst);
                }
                if let Err(e) = result {
                    info!("Caller session ended: {}", e);
                }
            })
            .context("Failed to start caller thread")?;
    }

    Ok(())
}

fn run_with_console(stream: TcpStream, settings: SessionSettings) -> TransportResult<()> {
    let mut surface = ConsoleSurface::new(settings.width, settings.height);
    if let Err(e) = surface.init() {
        error!("Local console unavailable: {}", e);
        let surface = HeadlessSurface::new(settings.width, settings.height);
        return run_caller(stream, surface, settings);
    }
    run_caller(stream, surface, settings)
}

/// One form question
struct Prompt {
    label: &'static str,
    capacity: usize,
    policy: CharPolicy,
}

impl Prompt {
    fn new(label: &'static str, capacity: usize, policy: CharPolicy) -> Self {
        Self {
            label,
            capacity,
            policy,
        }
    }
}

fn prompts() -> Vec<Prompt> {
    vec![
        Prompt::new("Handle", 20, CharPolicy::Any),
        Prompt::new("City", 20, CharPolicy::UppercaseOnly),
        Prompt::new("Phone", 12, CharPolicy::DigitsAndSpace),
        Prompt::new("Protocols (XYZ)", 3, CharPolicy::fixed_set("XYZ")),
    ]
}

fn run_caller<S: DrawSurface>(
    stream: TcpStream,
    surface: S,
    settings: SessionSettings,
) -> TransportResult<()> {
    let mut session = Session::new(stream, surface, settings);
    session.open()?;
    let remote = session.channel().remote_info();
    let address = remote.address.clone();
    match &remote.display_name {
        Some(name) => info!("Caller connected from {} ({})", address, name),
        None => info!("Caller connected from {}", address),
    }

    session.output(b"\x0c\x1b[0;1;36mWelcome to bbsterm\x1b[0m\r\n\r\n")?;
    session.puts("Enter moves on, Up goes back, F1 finishes, Esc aborts.")?;

    let prompts = prompts();
    let mut answers = vec![String::new(); prompts.len()];
    let mut index = 0;

    while index < prompts.len() {
        let prompt = &prompts[index];
        let row = 5 + index;
        session.puts(&format!("\x1b[{};1H\x1b[0;1;33m{:>16}: \x1b[0m", row, prompt.label))?;

        let result = session.input_field(&answers[index], prompt.capacity, prompt.policy.clone())?;
        answers[index] = result.text;

        match result.verdict {
            Verdict::NextField | Verdict::Continue => index += 1,
            Verdict::PreviousField => index = index.saturating_sub(1),
            Verdict::Done => break,
            Verdict::Aborted => {
                info!("Caller {} aborted the form", address);
                session.puts("\x1b[12;1H\x1b[0;31mAborted.\x1b[0m\r\n")?;
                session.hangup();
                return Ok(());
            }
        }
    }

    session.puts("\x1b[12;1H\x1b[0mThanks! You entered:\r\n")?;
    for (prompt, answer) in prompts.iter().zip(&answers) {
        session.puts(&format!("  {}: {}\r\n", prompt.label, answer))?;
    }
    session.puts("\r\nPress any key to disconnect.")?;
    session.read_key(Some(GOODBYE_WAIT))?;

    info!("Caller {} finished", address);
    session.hangup();
    Ok(())
}
