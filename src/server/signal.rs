//! # Señal de Stop
//! src/server/signal.rs
//!
//! Bandera compartida por el accept loop y los workers. Se activa una sola
//! vez por vida del servidor; activarla de nuevo no tiene efecto.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Señal cooperativa de cancelación
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    set: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activa la señal y despierta a quien espere en [`wait_timeout`](Self::wait_timeout)
    ///
    /// Retorna `true` solo la primera vez.
    pub fn trigger(&self) -> bool {
        let first = !self.inner.set.swap(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.inner.cond.notify_all();
        first
    }

    pub fn is_set(&self) -> bool {
        self.inner.set.load(Ordering::SeqCst)
    }

    /// Espera hasta que la señal se active o pase `timeout`
    ///
    /// Retorna `true` si la señal está activa.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        let (_guard, _) = self
            .inner
            .cond
            .wait_timeout_while(guard, timeout, |_| !self.inner.set.load(Ordering::SeqCst))
            .unwrap_or_else(|e| e.into_inner());
        self.is_set()
    }
}

impl std::fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopSignal").field("set", &self.is_set()).finish()
    }
}
