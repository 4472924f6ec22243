//! # Contadores del Servidor
//! src/server/stats.rs
//!
//! Contadores atómicos compartidos por el accept loop y los workers.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Contadores thread-safe; clonar comparte los mismos valores
#[derive(Clone)]
pub struct ServerStats {
    inner: Arc<Counters>,
}

struct Counters {
    /// Conexiones aceptadas y encoladas
    accepted: AtomicU64,

    /// Conexiones rechazadas con 503 por cola llena
    rejected: AtomicU64,

    /// Requests que el handler terminó sin error
    processed: AtomicU64,

    /// Requests en los que el handler retornó error o hizo panic
    failed: AtomicU64,

    /// Requests que seguían en la cola al detener el servidor
    abandoned: AtomicU64,

    started_at: Instant,
}

/// Foto de los contadores en un instante
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub rejected: u64,
    pub processed: u64,
    pub failed: u64,
    pub abandoned: u64,
    pub uptime_secs: u64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Counters {
                accepted: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                processed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                abandoned: AtomicU64::new(0),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn record_accepted(&self) {
        self.inner.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.inner.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.inner.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.inner.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self, count: u64) {
        self.inner.abandoned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.inner.accepted.load(Ordering::Relaxed),
            rejected: self.inner.rejected.load(Ordering::Relaxed),
            processed: self.inner.processed.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            abandoned: self.inner.abandoned.load(Ordering::Relaxed),
            uptime_secs: self.inner.started_at.elapsed().as_secs(),
        }
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsSnapshot {
    /// Requests que salieron de la cola (con o sin error)
    pub fn completed(&self) -> u64 {
        self.processed + self.failed
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
