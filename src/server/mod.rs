//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! Primitiva genérica de servidor concurrente:
//!
//! 1. Un accept thread escucha en un puerto; un lector corto por conexión
//!    espera la cabecera del request y lo encola
//! 2. Una cola FIFO thread-safe guarda los requests pendientes
//! 3. N workers sacan conexiones de la cola y llaman a un [`Handler`](crate::dispatcher::Handler)
//! 4. Una señal de stop compartida coordina el apagado
//!
//! El servidor no sabe nada de paths, métodos ni payloads: eso vive en el handler.

mod accept;
pub mod pending;
mod pool;
mod readers;
pub mod queue;
pub mod signal;
pub mod stats;
pub mod tcp;

pub use pending::PendingRequest;
pub use queue::{PushError, WorkQueue};
pub use signal::StopSignal;
pub use stats::{ServerStats, StatsSnapshot};
pub use tcp::HttpServer;
