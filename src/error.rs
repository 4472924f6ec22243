//! # Errores del Listener
//! src/error.rs
//!
//! Tipos de error compartidos por el servidor, la configuración y los handlers.

use crate::http::request::ParseError;
use std::io;
use thiserror::Error;

/// Errores del ciclo de vida del servidor
#[derive(Debug, Error)]
pub enum ServerError {
    /// No se pudo hacer bind del puerto. Es fatal y no se reintenta.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("server is already running")]
    AlreadyStarted,

    /// El servidor ya fue detenido; la señal de stop no se puede reiniciar
    #[error("server has been stopped and cannot be restarted")]
    Stopped,

    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        thread: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errores de validación de la configuración
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("port must be > 0")]
    InvalidPort,

    #[error("workers must be >= 1")]
    NoWorkers,

    #[error("queue capacity must be >= 1 when bounded")]
    ZeroQueueCapacity,

    #[error("{0} must be > 0")]
    ZeroDuration(&'static str),

    #[error("max request size must be >= {min} bytes")]
    RequestLimitTooSmall { min: usize },
}

/// Errores al procesar un request en un worker
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed request: {0}")]
    Parse(#[from] ParseError),

    #[error("request head exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("execution context is closed")]
    ContextClosed(#[from] ContextClosed),
}

/// El contexto de ejecución de la aplicación ya no acepta tareas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("execution context is closed")]
pub struct ContextClosed;
