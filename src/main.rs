//! # Notifier - Entry Point
//! src/main.rs
//!
//! Levanta el listener de comandos y muestra cada notificación en la terminal
//! hasta recibir SIGINT/SIGTERM.

use notifier::config::Config;
use notifier::context::{LoopHandle, MainLoop, Turn};
use notifier::listener::{CommandListener, CommandServer};
use notifier::logging;
use notifier::notification::{NotificationBoard, UpdateOutcome};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Cada cuánto el loop revisa si hay que ocultar la notificación
const TICK_INTERVAL: Duration = Duration::from_millis(100);

fn main() {
    let config = Config::new();
    logging::init(&config.log_filter);

    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        std::process::exit(2);
    }

    let main_loop = MainLoop::new();
    let board = Arc::new(Mutex::new(NotificationBoard::new(config.display_time())));

    show(&board, &format!(
        "Notifier started&This app will run in the background on port {}",
        config.port
    ));

    let listener = CommandListener::new(main_loop.handle());
    {
        let board = Arc::clone(&board);
        listener.subscribe(move |command| show(&board, command));
    }

    let mut server = CommandServer::commands(config.server_config(), listener);
    match server.start() {
        Ok(addr) => info!(%addr, "notifier listening"),
        Err(e) => {
            error!(error = %e, "failed to start listener");
            std::process::exit(1);
        }
    }

    watch_signals(main_loop.handle());

    loop {
        match main_loop.run_once(TICK_INTERVAL) {
            Turn::Quit => break,
            Turn::Ran | Turn::Idle => {
                if lock(&board).tick(Instant::now()) {
                    debug!("notification hidden");
                }
            }
        }
    }

    info!("shutting down");
    server.stop();
}

fn lock(board: &Mutex<NotificationBoard>) -> MutexGuard<'_, NotificationBoard> {
    board.lock().unwrap_or_else(|e| e.into_inner())
}

/// Actualiza el board y "muestra" el resultado en la terminal
fn show(board: &Mutex<NotificationBoard>, command: &str) {
    let mut board = lock(board);
    let outcome = board.update(command, Instant::now());
    debug!(?outcome, "notification updated");

    // Toda notificación suena, como el aviso del sistema
    print!("\x07");
    if outcome == UpdateOutcome::Repeated {
        println!("»»");
    }
    println!("┌─ {}", board.title());
    for line in board.body().lines() {
        println!("│  {}", line);
    }
    println!("└─");
}

#[cfg(unix)]
fn watch_signals(handle: LoopHandle) {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            warn!(error = %e, "could not install signal handlers");
            return;
        }
    };

    let spawned = std::thread::Builder::new()
        .name("notifier-signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "signal received");
                let _ = handle.quit();
            }
        });

    if let Err(e) = spawned {
        warn!(error = %e, "could not spawn signal thread");
    }
}

#[cfg(not(unix))]
fn watch_signals(_handle: LoopHandle) {
    warn!("signal handling not available on this platform");
}
