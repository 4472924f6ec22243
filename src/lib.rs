//! # Notifier
//! src/lib.rs
//!
//! Listener HTTP local y embebible que recibe comandos en `GET /?<comando>`
//! y los entrega a la aplicación en su propio contexto de ejecución.
//!
//! ## Arquitectura
//!
//! El crate está dividido en módulos especializados:
//! - `http`: Parsing de requests y serialización de respuestas
//! - `server`: Accept thread, cola FIFO, pool de workers y señal de stop
//! - `dispatcher`: Traits `Handler`/`Endpoint` y el dispatcher por path
//! - `listener`: El endpoint de comandos y sus suscriptores
//! - `context`: Contexto de ejecución de la aplicación (`MainLoop`)
//! - `notification`: Parsing `titulo&cuerpo` y estado de la notificación
//! - `config`: Configuración por CLI/env
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use notifier::config::ServerConfig;
//! use notifier::context::MainLoop;
//! use notifier::listener::{CommandListener, CommandServer};
//!
//! let main_loop = MainLoop::new();
//! let listener = CommandListener::new(main_loop.handle());
//! listener.subscribe(|command| println!("comando: {}", command));
//!
//! let mut server = CommandServer::commands(ServerConfig::new(8083), listener);
//! server.start().expect("Error al iniciar servidor");
//!
//! main_loop.run();
//! server.stop();
//! ```

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod listener;
pub mod logging;
pub mod notification;
pub mod server;

pub use config::{Config, ServerConfig};
pub use context::{ExecutionContext, LoopHandle, MainLoop, Turn};
pub use dispatcher::{Dispatcher, Endpoint, Handler};
pub use error::{ConfigError, ContextClosed, HandlerError, ServerError};
pub use listener::{CommandEvents, CommandListener, CommandServer, SubscriptionId};
pub use notification::{Notification, NotificationBoard, UpdateOutcome};
pub use server::{HttpServer, StopSignal};
