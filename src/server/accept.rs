//! # Accept Loop
//! src/server/accept.rs
//!
//! Un solo thread bloqueado en `accept`. Cada conexión aceptada pasa a un
//! lector corto que espera su cabecera y recién entonces la encola, así que
//! una conexión que no manda nada nunca ocupa a un worker.
//!
//! `stop` despierta al accept thread con una conexión descartable; el loop
//! revisa la señal después de cada accept y termina sin procesarla.

use super::pending::{self, PendingRequest};
use super::queue::{PushError, WorkQueue};
use super::readers::HeadReaders;
use super::signal::StopSignal;
use super::stats::ServerStats;
use crate::error::HandlerError;
use crate::http::request::ParseError;
use crate::http::{Response, StatusCode};
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Tiempo máximo que se espera el request de una conexión rechazada
const REJECT_DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Tiempo máximo para la conexión que despierta al accept thread
const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) struct AcceptLoop {
    pub(crate) listener: TcpListener,
    pub(crate) queue: Arc<WorkQueue<PendingRequest>>,
    pub(crate) readers: HeadReaders,
    pub(crate) stop: StopSignal,
    pub(crate) stats: ServerStats,
    pub(crate) poll_interval: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) max_request_bytes: usize,
}

impl AcceptLoop {
    pub(crate) fn run(self) {
        let mut next_id: u64 = 0;
        debug!(addr = ?self.listener.local_addr().ok(), "accept loop started");

        loop {
            match self.listener.accept() {
                Ok(_) if self.stop.is_set() => break,
                Ok((stream, peer)) => {
                    next_id += 1;
                    self.admit(next_id, stream, peer);
                }
                // Carrera esperada: el listener se está deteniendo
                Err(_) if self.stop.is_set() => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    if self.stop.wait_timeout(self.poll_interval) {
                        break;
                    }
                }
            }
        }

        debug!("accept loop stopped");
    }

    /// Lanza el lector de cabecera de una conexión
    fn admit(&self, id: u64, stream: TcpStream, peer: SocketAddr) {
        let Some(slot) = self.readers.register(id, &stream) else {
            self.stats.record_rejected();
            warn!(request_id = id, peer = %peer, "too many connections waiting for a request");
            reject_unread(stream, self.max_request_bytes);
            return;
        };

        let queue = Arc::clone(&self.queue);
        let stop = self.stop.clone();
        let stats = self.stats.clone();
        let read_timeout = self.read_timeout;
        let max_request_bytes = self.max_request_bytes;

        let spawned = thread::Builder::new()
            .name(format!("notifier-reader-{}", id))
            .spawn(move || {
                let _slot = slot;
                match PendingRequest::read(id, stream, peer, read_timeout, max_request_bytes) {
                    Ok(pending) => enqueue(&queue, &stats, pending),
                    // Conexión abierta y cerrada sin datos
                    Err(HandlerError::Parse(ParseError::EmptyRequest)) => {
                        trace!(request_id = id, "connection closed without a request");
                    }
                    Err(_) if stop.is_set() => {}
                    Err(e) => {
                        stats.record_failed();
                        debug!(request_id = id, peer = %peer, error = %e, "could not read request");
                    }
                }
            });

        // El closure (con el socket y el slot) se descarta si no se pudo lanzar
        if let Err(e) = spawned {
            self.stats.record_failed();
            warn!(request_id = id, error = %e, "could not spawn reader thread");
        }
    }
}

fn enqueue(queue: &WorkQueue<PendingRequest>, stats: &ServerStats, pending: PendingRequest) {
    let id = pending.id();
    match queue.push(pending) {
        Ok(()) => {
            stats.record_accepted();
            trace!(request_id = id, "request queued");
        }
        Err(PushError::Full { item, capacity }) => {
            stats.record_rejected();
            warn!(request_id = id, peer = %item.peer(), capacity, "queue full, rejecting request");
            if let Err(e) = item.respond(&unavailable()) {
                debug!(request_id = id, error = %e, "could not write 503");
            }
        }
        Err(PushError::Closed(item)) => {
            trace!(request_id = id, "queue closed, dropping request");
            item.close();
        }
    }
}

fn unavailable() -> Response {
    Response::new(StatusCode::ServiceUnavailable).with_header("Connection", "close")
}

/// Responde 503 a una conexión cuyo request todavía no se leyó
///
/// Antes se consume el request (con un timeout corto) para que el cierre no
/// descarte la respuesta con un RST.
fn reject_unread(mut stream: TcpStream, max_request_bytes: usize) {
    if stream.set_nonblocking(false).is_ok() && stream.set_read_timeout(Some(REJECT_DRAIN_TIMEOUT)).is_ok() {
        let _ = pending::read_request(&mut stream, max_request_bytes);
    }
    let _ = stream.set_write_timeout(Some(REJECT_DRAIN_TIMEOUT));
    if let Err(e) = pending::write_response(&stream, &unavailable()) {
        debug!(error = %e, "could not write 503");
    }
    let _ = stream.shutdown(Shutdown::Both);
}

/// Despierta al accept thread bloqueado
pub(crate) fn wake(local_addr: SocketAddr) {
    let mut target = local_addr;
    if target.ip().is_unspecified() {
        let loopback = match target {
            SocketAddr::V4(_) => [127, 0, 0, 1].into(),
            SocketAddr::V6(_) => std::net::Ipv6Addr::LOCALHOST.into(),
        };
        target.set_ip(loopback);
    }

    if let Err(e) = TcpStream::connect_timeout(&target, WAKE_TIMEOUT) {
        warn!(addr = %target, error = %e, "could not wake accept thread");
    }
}
