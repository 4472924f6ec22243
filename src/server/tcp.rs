//! # Servidor TCP con Pool de Workers
//! src/server/tcp.rs
//!
//! Ensambla las piezas del servidor:
//!
//! ```text
//! accept thread ──▶ lector (cabecera) ──push──▶ WorkQueue ──next──▶ N workers ──▶ Handler
//!        ▲                                                             ▲
//!        └────────────────────────── StopSignal ───────────────────────┘
//! ```
//!
//! `start` hace el bind de forma síncrona (un fallo de bind se retorna al
//! llamador) y deja corriendo los threads en background. `stop` activa la
//! señal, despierta al accept thread, corta las lecturas en curso, espera a
//! que todos los threads terminen y descarta lo que quedó en la cola. Un
//! handler que nunca retorna bloquea `stop` indefinidamente.

use super::accept::{self, AcceptLoop};
use super::pending::PendingRequest;
use super::pool::WorkerPool;
use super::queue::WorkQueue;
use super::readers::HeadReaders;
use super::signal::StopSignal;
use super::stats::{ServerStats, StatsSnapshot};
use crate::config::ServerConfig;
use crate::dispatcher::Handler;
use crate::error::ServerError;
use std::mem;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Conexiones que pueden estar esperando su cabecera a la vez
const MAX_HEAD_READERS: usize = 64;

/// Servidor HTTP concurrente con un accept thread y N workers
pub struct HttpServer<H: Handler> {
    config: ServerConfig,
    handler: Arc<H>,
    queue: Arc<WorkQueue<PendingRequest>>,
    readers: HeadReaders,
    stop: StopSignal,
    stats: ServerStats,
    state: State,
}

enum State {
    Idle,
    Running(Running),
    Stopped,
}

struct Running {
    local_addr: SocketAddr,
    accept: JoinHandle<()>,
    workers: WorkerPool,
}

impl<H: Handler> HttpServer<H> {
    pub fn new(config: ServerConfig, handler: H) -> Self {
        let queue = WorkQueue::new(config.queue_capacity, config.poll_interval);
        Self {
            config,
            handler: Arc::new(handler),
            queue: Arc::new(queue),
            readers: HeadReaders::new(MAX_HEAD_READERS),
            stop: StopSignal::new(),
            stats: ServerStats::new(),
            state: State::Idle,
        }
    }

    /// Hace bind y arranca el accept thread y los workers
    ///
    /// Retorna la dirección efectiva (útil con `port = 0`).
    pub fn start(&mut self) -> Result<SocketAddr, ServerError> {
        match self.state {
            State::Idle => {}
            State::Running(_) => return Err(ServerError::AlreadyStarted),
            State::Stopped => return Err(ServerError::Stopped),
        }

        self.config.validate()?;

        let addr = self.config.address();
        let listener = TcpListener::bind(&addr).map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
        let local_addr = listener.local_addr()?;

        let workers = match WorkerPool::spawn(
            self.config.workers,
            Arc::clone(&self.handler),
            Arc::clone(&self.queue),
            &self.stop,
            &self.stats,
        ) {
            Ok(workers) => workers,
            Err(e) => {
                self.state = State::Stopped;
                return Err(e);
            }
        };

        let accept_loop = AcceptLoop {
            listener,
            queue: Arc::clone(&self.queue),
            readers: self.readers.clone(),
            stop: self.stop.clone(),
            stats: self.stats.clone(),
            poll_interval: self.config.poll_interval,
            read_timeout: self.config.read_timeout,
            max_request_bytes: self.config.max_request_bytes,
        };

        let accept = match thread::Builder::new()
            .name("notifier-accept".to_string())
            .spawn(move || accept_loop.run())
        {
            Ok(handle) => handle,
            Err(source) => {
                self.stop.trigger();
                self.queue.wake_all();
                workers.join();
                self.state = State::Stopped;
                return Err(ServerError::Spawn {
                    thread: "accept".to_string(),
                    source,
                });
            }
        };

        info!(
            addr = %local_addr,
            workers = workers.len(),
            queue_capacity = ?self.config.queue_capacity,
            "listener started"
        );

        self.state = State::Running(Running {
            local_addr,
            accept,
            workers,
        });

        Ok(local_addr)
    }

    /// Detiene el servidor y espera a todos sus threads
    ///
    /// Se puede llamar varias veces; solo la primera hace trabajo.
    pub fn stop(&mut self) {
        match mem::replace(&mut self.state, State::Stopped) {
            State::Running(running) => {
                self.stop.trigger();
                accept::wake(running.local_addr);
                if running.accept.join().is_err() {
                    error!("accept thread panicked");
                }

                self.readers.shutdown_all();
                self.readers.wait_idle();

                self.queue.wake_all();
                running.workers.join();

                let abandoned = self.queue.close();
                if !abandoned.is_empty() {
                    self.stats.record_abandoned(abandoned.len() as u64);
                    debug!(count = abandoned.len(), "abandoning queued requests");
                }
                drop(abandoned);

                info!(
                    addr = %running.local_addr,
                    stats = %self.stats.snapshot().to_json(),
                    "listener stopped"
                );
            }
            State::Idle => {
                self.stop.trigger();
                self.queue.close();
            }
            State::Stopped => {}
        }
    }

    /// Dirección efectiva mientras el servidor corre
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.state {
            State::Running(running) => Some(running.local_addr),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Requests aceptados que todavía esperan a un worker
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Conexiones aceptadas que todavía no mandaron su cabecera
    pub fn reading(&self) -> usize {
        self.readers.len()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl<H: Handler> Drop for HttpServer<H> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::http::{Response, StatusCode};
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn test_config() -> ServerConfig {
        ServerConfig::new(0).with_poll_interval(Duration::from_millis(10))
    }

    fn send(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        // El servidor puede cerrar sin leer (handler que falla)
        let _ = stream.write_all(raw);
        let mut text = String::new();
        let _ = stream.read_to_string(&mut text);
        text
    }

    /// Conexión que manda su cabecera y queda abierta
    fn open_request(addr: SocketAddr) -> TcpStream {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        stream
    }

    fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + deadline;
        while !done() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    fn ok_handler(pending: PendingRequest) -> Result<(), HandlerError> {
        pending.respond(&Response::new(StatusCode::Ok))?;
        Ok(())
    }

    #[test]
    fn test_start_and_serve() {
        let mut server = HttpServer::new(test_config(), ok_handler);
        let addr = server.start().unwrap();

        assert!(server.is_running());
        assert_eq!(server.local_addr(), Some(addr));
        assert!(send(addr, b"GET / HTTP/1.0\r\n\r\n").starts_with("HTTP/1.0 200 OK"));

        server.stop();
        assert!(!server.is_running());
        assert_eq!(server.stats().processed, 1);
    }

    #[test]
    fn test_bind_failure_is_returned() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let mut server = HttpServer::new(ServerConfig::new(port), ok_handler);
        assert!(matches!(server.start(), Err(ServerError::Bind { .. })));
        assert!(!server.is_running());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut server = HttpServer::new(test_config().with_workers(0), ok_handler);
        assert!(matches!(server.start(), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_start_twice_and_after_stop() {
        let mut server = HttpServer::new(test_config(), ok_handler);
        server.start().unwrap();
        assert!(matches!(server.start(), Err(ServerError::AlreadyStarted)));

        server.stop();
        assert!(matches!(server.start(), Err(ServerError::Stopped)));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut server = HttpServer::new(test_config(), ok_handler);
        server.start().unwrap();

        server.stop();
        let start = Instant::now();
        server.stop();
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_stop_without_start() {
        let mut server = HttpServer::new(test_config(), ok_handler);
        server.stop();
        server.stop();
        assert!(matches!(server.start(), Err(ServerError::Stopped)));
    }

    #[test]
    fn test_accept_wakes_without_polling() {
        // Con un poll largo, solo un accept bloqueante responde rápido
        let config = ServerConfig::new(0).with_poll_interval(Duration::from_secs(1));
        let mut server = HttpServer::new(config, ok_handler);
        let addr = server.start().unwrap();

        for _ in 0..3 {
            thread::sleep(Duration::from_millis(100));
            let start = Instant::now();
            assert!(send(addr, b"GET /?x HTTP/1.0\r\n\r\n").starts_with("HTTP/1.0 200 OK"));
            assert!(start.elapsed() < Duration::from_millis(250), "took {:?}", start.elapsed());
        }

        let start = Instant::now();
        server.stop();
        assert!(start.elapsed() < Duration::from_millis(500), "stop took {:?}", start.elapsed());
    }

    #[test]
    fn test_silent_connection_does_not_hold_worker() {
        let config = test_config().with_workers(1).with_read_timeout(Duration::from_secs(5));
        let mut server = HttpServer::new(config, ok_handler);
        let addr = server.start().unwrap();

        let _silent = TcpStream::connect(addr).unwrap();
        assert!(wait_for(Duration::from_secs(5), || server.reading() == 1));

        let start = Instant::now();
        assert!(send(addr, b"GET /?x HTTP/1.0\r\n\r\n").starts_with("HTTP/1.0 200 OK"));
        assert!(start.elapsed() < Duration::from_secs(1), "took {:?}", start.elapsed());

        // stop corta la lectura pendiente en vez de esperar el read timeout
        let start = Instant::now();
        server.stop();
        assert!(start.elapsed() < Duration::from_secs(2), "stop took {:?}", start.elapsed());
        assert_eq!(server.reading(), 0);
    }

    #[test]
    fn test_handler_errors_and_panics_do_not_kill_worker() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = {
            let calls = Arc::clone(&calls);
            move |pending: PendingRequest| -> Result<(), HandlerError> {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => panic!("boom"),
                    1 => Err(HandlerError::TooLarge { limit: 1 }),
                    _ => ok_handler(pending),
                }
            }
        };

        let mut server = HttpServer::new(test_config().with_workers(1), handler);
        let addr = server.start().unwrap();

        send(addr, b"GET / HTTP/1.0\r\n\r\n");
        send(addr, b"GET / HTTP/1.0\r\n\r\n");
        let text = send(addr, b"GET / HTTP/1.0\r\n\r\n");
        assert!(text.starts_with("HTTP/1.0 200 OK"));

        server.stop();
        let stats = server.stats();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.processed, 1);
    }

    #[test]
    fn test_malformed_request_never_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = {
            let calls = Arc::clone(&calls);
            move |pending: PendingRequest| -> Result<(), HandlerError> {
                calls.fetch_add(1, Ordering::SeqCst);
                ok_handler(pending)
            }
        };

        let mut server = HttpServer::new(test_config(), handler);
        let addr = server.start().unwrap();

        assert_eq!(send(addr, b"garbage\r\n\r\n"), "");
        assert!(send(addr, b"GET / HTTP/1.0\r\n\r\n").starts_with("HTTP/1.0 200 OK"));

        server.stop();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(server.stats().failed, 1);
    }

    #[test]
    fn test_stop_abandons_queued_requests() {
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = std::sync::Mutex::new(release_rx);

        let handler = move |pending: PendingRequest| -> Result<(), HandlerError> {
            let _ = entered_tx.send(());
            let _ = release_rx.lock().unwrap().recv_timeout(Duration::from_secs(5));
            pending.close();
            Ok(())
        };

        let mut server = HttpServer::new(test_config().with_workers(1), handler);
        let addr = server.start().unwrap();

        let clients: Vec<TcpStream> = (0..3).map(|_| open_request(addr)).collect();
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(wait_for(Duration::from_secs(5), || server.queued() == 2));

        drop(release_tx);
        server.stop();

        let stats = server.stats();
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.processed + stats.abandoned, 3);
        assert!(TcpStream::connect(addr).is_err());
        drop(clients);
    }

    #[test]
    fn test_bounded_queue_rejects_with_503() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = std::sync::Mutex::new(release_rx);

        let handler = move |pending: PendingRequest| -> Result<(), HandlerError> {
            let _ = release_rx.lock().unwrap().recv_timeout(Duration::from_secs(5));
            pending.close();
            Ok(())
        };

        let config = test_config().with_workers(1).with_queue_capacity(Some(1));
        let mut server = HttpServer::new(config, handler);
        let addr = server.start().unwrap();

        // Uno lo toma el worker (bloqueado), otro llena la cola
        let _busy = open_request(addr);
        assert!(wait_for(Duration::from_secs(5), || {
            server.stats().accepted == 1 && server.queued() == 0
        }));
        let _queued = open_request(addr);
        assert!(wait_for(Duration::from_secs(5), || server.queued() == 1));

        let text = send(addr, b"GET /?x HTTP/1.0\r\n\r\n");
        assert!(text.starts_with("HTTP/1.0 503 Service Unavailable"), "got: {}", text);
        assert_eq!(server.stats().rejected, 1);

        drop(release_tx);
        server.stop();
    }
}
