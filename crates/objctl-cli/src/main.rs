//! `objctl` – drives simulated objects from the keyboard.
//!
//! 1. Loads `~/.objctl/config.toml` (optional) and `OBJCTL_*` overrides.
//! 2. Connects the configured transport (rosbridge or in-process loopback).
//! 3. Puts the terminal in raw mode for the lifetime of the loop.
//! 4. Registers the tracked objects, prints the key table, and runs the
//!    controller at a fixed rate until **Ctrl-C**.

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use objctl_core::{KEY_BINDINGS, ObjectController, RawTerminal, StdinInput, SystemClock};
use objctl_middleware::{EventBus, LoopbackTransport, RosbridgeTransport, Transport};
use tracing::{error, info, warn};

use crate::config::{Config, TransportKind};

fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filters (default "info"); OBJCTL_LOG_FORMAT=json switches to
    // newline-delimited JSON.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("OBJCTL_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    let cfg = load_config();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    // The loop checks the flag once per iteration.
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; stop the process with SIGKILL");
    }

    let transport = match connect(&cfg) {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, transport = %cfg.transport, "could not open transport");
            return ExitCode::FAILURE;
        }
    };
    let input = match StdinInput::new() {
        Ok(input) => input,
        Err(e) => {
            error!(error = %e, "could not open operator input");
            return ExitCode::FAILURE;
        }
    };

    // Restored when `terminal` drops, on every path out of this function.
    let terminal = RawTerminal::acquire().unwrap_or_else(|e| {
        warn!(error = %e, "stdin is not a raw-capable terminal; keys will need Enter");
        RawTerminal::inert()
    });

    print_help();

    let mut controller =
        ObjectController::new(cfg.controller_config(), transport, input, SystemClock::new());
    controller.bootstrap();
    let result = controller.run(&shutdown);
    info!(
        state = ?controller.state(),
        tracked_objects = controller.registry().len(),
        "controller stopped"
    );

    drop(terminal);
    match result {
        Ok(()) => {
            println!();
            println!("{}", "  ✓ Exiting object controller.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "read()".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> Config {
    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            info!(path = %config::config_path().display(), "config loaded");
            cfg
        }
        Ok(None) => Config::default(),
        Err(e) => {
            warn!(error = %e, "config error, using defaults");
            Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);
    cfg
}

fn connect(cfg: &Config) -> Result<Box<dyn Transport>, objctl_types::ObjctlError> {
    match cfg.transport {
        TransportKind::Rosbridge => {
            let transport = RosbridgeTransport::connect(&cfg.rosbridge_url, cfg.topics())?;
            Ok(Box::new(transport))
        }
        TransportKind::Loopback => {
            info!("using in-process loopback transport");
            Ok(Box::new(LoopbackTransport::new(EventBus::default())))
        }
    }
}

fn print_help() {
    let rule = "---------------------------";
    println!("{}", rule.dimmed());
    println!("{}", "-- Object Controller --".bold().cyan());
    println!("{}", rule.dimmed());
    for binding in KEY_BINDINGS {
        println!("{} : {}", binding.key.to_string().bold().yellow(), binding.description);
    }
    println!("{}", rule.dimmed());
}
