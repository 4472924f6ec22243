//! # Lectores de Cabecera
//! src/server/readers.rs
//!
//! Cada conexión aceptada recibe un thread corto que lee su cabecera antes de
//! encolarla. Este registro limita cuántos corren a la vez y permite que
//! `stop` corte las lecturas en curso y espere a que terminen.

use std::collections::HashMap;
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use tracing::debug;

#[derive(Clone)]
pub(crate) struct HeadReaders {
    inner: Arc<Inner>,
}

struct Inner {
    active: Mutex<HashMap<u64, TcpStream>>,
    idle: Condvar,
    limit: usize,
}

/// Lugar reservado en el registro; lo libera al soltarse
pub(crate) struct ReaderSlot {
    readers: HeadReaders,
    id: u64,
}

impl HeadReaders {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                active: Mutex::new(HashMap::new()),
                idle: Condvar::new(),
                limit,
            }),
        }
    }

    fn active(&self) -> MutexGuard<'_, HashMap<u64, TcpStream>> {
        self.inner.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserva un lugar para leer `stream`
    ///
    /// Retorna `None` si ya hay `limit` lecturas en curso.
    pub(crate) fn register(&self, id: u64, stream: &TcpStream) -> Option<ReaderSlot> {
        let mut active = self.active();
        if active.len() >= self.inner.limit {
            return None;
        }

        match stream.try_clone() {
            Ok(handle) => {
                active.insert(id, handle);
                Some(ReaderSlot {
                    readers: self.clone(),
                    id,
                })
            }
            Err(e) => {
                debug!(request_id = id, error = %e, "could not clone accepted socket");
                None
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.active().len()
    }

    /// Corta todas las lecturas en curso: el `read` bloqueado retorna enseguida
    pub(crate) fn shutdown_all(&self) {
        for stream in self.active().values() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Espera a que no quede ningún lector
    pub(crate) fn wait_idle(&self) {
        let active = self.active();
        let _active = self
            .inner
            .idle
            .wait_while(active, |active| !active.is_empty())
            .unwrap_or_else(|e| e.into_inner());
    }
}

impl Drop for ReaderSlot {
    fn drop(&mut self) {
        let mut active = self.readers.active();
        active.remove(&self.id);
        if active.is_empty() {
            self.readers.inner.idle.notify_all();
        }
    }
}
