//! # Configuración del Listener
//! src/config.rs
//!
//! Dos niveles de configuración:
//!
//! - [`Config`]: argumentos CLI / variables de entorno del binario
//! - [`ServerConfig`]: configuración inmutable que recibe [`HttpServer`](crate::server::HttpServer)
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./notifier --port 9001 --workers 4 --queue-capacity 256
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! NOTIFIER_PORT=9001 NOTIFIER_WORKERS=2 ./notifier
//! ```

use crate::error::ConfigError;
use clap::Parser;
use std::time::Duration;

/// Puerto por defecto del listener
pub const DEFAULT_PORT: u16 = 83;

/// Tamaño máximo por defecto de la cabecera de un request
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 8192;

/// Tamaño mínimo aceptable para `max_request_bytes`
const MIN_REQUEST_BYTES: usize = 64;

/// Configuración del binario `notifier`
#[derive(Debug, Clone, Parser)]
#[command(name = "notifier")]
#[command(about = "Listener HTTP local que muestra notificaciones enviadas por otros procesos")]
#[command(version)]
pub struct Config {
    /// Puerto en el que escucha el listener
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "NOTIFIER_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "NOTIFIER_HOST")]
    pub host: String,

    /// Número de workers que procesan requests
    #[arg(short, long, default_value_t = 1, env = "NOTIFIER_WORKERS")]
    pub workers: usize,

    /// Capacidad máxima de la cola de requests (0 = sin límite)
    #[arg(long = "queue-capacity", default_value_t = 0, env = "NOTIFIER_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    /// Cota de espera de los workers antes de volver a mirar la señal de stop (ms)
    #[arg(long = "poll-ms", default_value_t = 50, env = "NOTIFIER_POLL_MS")]
    pub poll_interval_ms: u64,

    /// Timeout de lectura del request en milisegundos
    #[arg(long = "read-timeout-ms", default_value_t = 2000, env = "NOTIFIER_READ_TIMEOUT_MS")]
    pub read_timeout_ms: u64,

    /// Tiempo que una notificación permanece visible, en milisegundos
    #[arg(long = "display-ms", default_value_t = 5000, env = "NOTIFIER_DISPLAY_MS")]
    pub display_ms: u64,

    /// Filtro de logs cuando RUST_LOG no está definido
    #[arg(long = "log-filter", default_value = "notifier=info", env = "NOTIFIER_LOG")]
    pub log_filter: String,
}

impl Config {
    /// Parsea argumentos CLI (y variables de entorno)
    pub fn new() -> Self {
        Config::parse()
    }

    /// Dirección completa para bind (host:port)
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.display_ms == 0 {
            return Err(ConfigError::ZeroDuration("display time"));
        }
        self.server_config().validate()
    }

    /// Construye la configuración inmutable del servidor
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            workers: self.workers,
            queue_capacity: (self.queue_capacity > 0).then_some(self.queue_capacity),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }

    pub fn display_time(&self) -> Duration {
        Duration::from_millis(self.display_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: "127.0.0.1".to_string(),
            workers: 1,
            queue_capacity: 0,
            poll_interval_ms: 50,
            read_timeout_ms: 2000,
            display_ms: 5000,
            log_filter: "notifier=info".to_string(),
        }
    }
}

/// Configuración inmutable del servidor
///
/// Se fija al construir el servidor; no hay reconfiguración en caliente.
/// `port = 0` pide un puerto efímero al sistema operativo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Número de workers (>= 1)
    pub workers: usize,

    /// `None` = cola sin límite
    pub queue_capacity: Option<usize>,

    /// Cota de espera de los workers antes de volver a mirar la señal de stop
    pub poll_interval: Duration,

    /// Timeout de lectura de la cabecera del request
    pub read_timeout: Duration,

    pub max_request_bytes: usize,
}

impl ServerConfig {
    /// Configuración por defecto en `127.0.0.1:port` con un worker
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("poll interval"));
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("read timeout"));
        }
        if self.max_request_bytes < MIN_REQUEST_BYTES {
            return Err(ConfigError::RequestLimitTooSmall { min: MIN_REQUEST_BYTES });
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            workers: 1,
            queue_capacity: None,
            poll_interval: Duration::from_millis(50),
            read_timeout: Duration::from_secs(2),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}
