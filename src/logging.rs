//! # Logging
//! src/logging.rs
//!
//! Solo el binario instala el subscriber; la librería únicamente emite eventos.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Instala el subscriber global
///
/// `RUST_LOG` tiene prioridad sobre `fallback`. Si ya había un subscriber
/// instalado (por ejemplo en tests) no hace nada.
pub fn init(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .try_init();
}
