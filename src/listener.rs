//! # Command Listener
//! src/listener.rs
//!
//! Endpoint concreto montado sobre el [`Dispatcher`]:
//!
//! - Solo atiende el path `/`
//! - Toda respuesta lleva `Access-Control-Allow-Origin: *`, para que páginas
//!   del mismo equipo puedan llamarlo desde el navegador
//! - En un `GET`, todo lo que sigue al primer `?` es el comando, sin decodificar
//! - El comando se publica en el [`ExecutionContext`] de la aplicación y los
//!   suscriptores se invocan allí; el worker no espera
//!
//! ```text
//! curl "http://127.0.0.1:83/?Build%20ok&All#tests#green"
//! ```

use crate::config::ServerConfig;
use crate::context::ExecutionContext;
use crate::dispatcher::{Dispatcher, Endpoint};
use crate::error::HandlerError;
use crate::http::{Method, Request, Response};
use crate::server::HttpServer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Callback que recibe el comando crudo
pub type Subscriber = Arc<dyn Fn(&str) + Send + Sync>;

/// Identificador para cancelar una suscripción
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Lista de suscriptores a "comando recibido"
///
/// Clonar comparte la misma lista, así que se puede suscribir después de
/// entregar el listener al servidor.
#[derive(Clone, Default)]
pub struct CommandEvents {
    subscribers: Arc<RwLock<Vec<(SubscriptionId, Subscriber)>>>,
    next_id: Arc<AtomicU64>,
}

impl CommandEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        id
    }

    /// Retorna `false` si la suscripción no existía
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoca a todos los suscriptores actuales con el comando
    pub fn emit(&self, command: &str) {
        // Copia de la lista: un callback puede (des)suscribir sin deadlock
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();

        for subscriber in subscribers {
            subscriber(command);
        }
    }
}

/// Endpoint que recibe comandos en `GET /?<comando>`
pub struct CommandListener {
    events: CommandEvents,
    context: Arc<dyn ExecutionContext>,
}

impl CommandListener {
    pub const PATH: &'static str = "/";

    pub fn new(context: impl ExecutionContext) -> Self {
        Self {
            events: CommandEvents::new(),
            context: Arc::new(context),
        }
    }

    /// Handle compartido a la lista de suscriptores
    pub fn events(&self) -> CommandEvents {
        self.events.clone()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.events.subscribe(callback)
    }

    /// Extrae el comando de un request
    ///
    /// Solo los `GET` traen comando; sin `?` el comando es vacío.
    ///
    /// ```
    /// use notifier::http::Request;
    /// use notifier::listener::CommandListener;
    ///
    /// let request = Request::parse(b"GET /?hello%26world HTTP/1.1\r\n\r\n").unwrap();
    /// assert_eq!(CommandListener::command_from(&request), Some("hello%26world"));
    ///
    /// let request = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
    /// assert_eq!(CommandListener::command_from(&request), Some(""));
    ///
    /// let request = Request::parse(b"POST /?hello HTTP/1.1\r\n\r\n").unwrap();
    /// assert_eq!(CommandListener::command_from(&request), None);
    /// ```
    pub fn command_from(request: &Request) -> Option<&str> {
        match request.method() {
            Method::GET => Some(request.query().unwrap_or_default()),
            _ => None,
        }
    }

    /// Publica la entrega en el contexto de la aplicación y retorna enseguida
    fn deliver(&self, command: &str) -> Result<(), HandlerError> {
        if self.events.is_empty() {
            debug!(payload = command, "no subscribers, command dropped");
            return Ok(());
        }

        let events = self.events.clone();
        let command = command.to_string();
        self.context.post(Box::new(move || events.emit(&command)))?;
        Ok(())
    }
}

impl Endpoint for CommandListener {
    fn path(&self) -> &str {
        Self::PATH
    }

    fn prepare(&self, response: &mut Response) {
        response.add_header("Access-Control-Allow-Origin", "*");
    }

    fn handle(&self, request: &Request, _response: &mut Response) -> Result<(), HandlerError> {
        match Self::command_from(request) {
            Some(command) => {
                info!(payload = command, "command received");
                self.deliver(command)
            }
            None => Ok(()),
        }
    }
}

/// Servidor completo: pool de workers + dispatcher + command listener
pub type CommandServer = HttpServer<Dispatcher<CommandListener>>;

impl HttpServer<Dispatcher<CommandListener>> {
    /// Arma el servidor de comandos (sin arrancarlo)
    pub fn commands(config: ServerConfig, listener: CommandListener) -> Self {
        HttpServer::new(config, Dispatcher::new(listener))
    }

    pub fn listener(&self) -> &CommandListener {
        self.handler().endpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{MainLoop, Turn};
    use crate::http::StatusCode;
    use std::sync::Mutex;
    use std::time::Duration;

    fn collect(listener: &CommandListener) -> Arc<Mutex<Vec<String>>> {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        listener.subscribe(move |command| sink.lock().unwrap().push(command.to_string()));
        received
    }

    fn dispatch(listener: CommandListener, raw: &[u8]) -> (Dispatcher<CommandListener>, Response) {
        let dispatcher = Dispatcher::new(listener);
        let request = Request::parse(raw).unwrap();
        let (response, outcome) = dispatcher.route(&request);
        assert!(outcome.is_ok());
        (dispatcher, response)
    }

    #[test]
    fn test_get_root_delivers_on_context() {
        let main_loop = MainLoop::new();
        let listener = CommandListener::new(main_loop.handle());
        let received = collect(&listener);

        let (_dispatcher, response) = dispatch(listener, b"GET /?hello%26world HTTP/1.1\r\n\r\n");

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.header("Access-Control-Allow-Origin"), Some("*"));
        // Nada se entrega hasta que corre el loop
        assert!(received.lock().unwrap().is_empty());

        assert_eq!(main_loop.run_once(Duration::from_secs(1)), Turn::Ran);
        assert_eq!(*received.lock().unwrap(), vec!["hello%26world".to_string()]);
    }

    #[test]
    fn test_other_path_is_ignored_but_has_cors() {
        let main_loop = MainLoop::new();
        let listener = CommandListener::new(main_loop.handle());
        let received = collect(&listener);

        let (_dispatcher, response) = dispatch(listener, b"GET /other?hello HTTP/1.1\r\n\r\n");

        assert_eq!(response.header("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(main_loop.run_once(Duration::from_millis(20)), Turn::Idle);
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn test_post_is_ignored() {
        let main_loop = MainLoop::new();
        let listener = CommandListener::new(main_loop.handle());
        let received = collect(&listener);

        let (_dispatcher, response) = dispatch(listener, b"POST /?hello HTTP/1.1\r\nContent-Length: 0\r\n\r\n");

        assert_eq!(response.header("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(main_loop.run_once(Duration::from_millis(20)), Turn::Idle);
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn test_get_without_query_delivers_empty_command() {
        let main_loop = MainLoop::new();
        let listener = CommandListener::new(main_loop.handle());
        let received = collect(&listener);

        dispatch(listener, b"GET / HTTP/1.1\r\n\r\n");

        assert_eq!(main_loop.run_once(Duration::from_secs(1)), Turn::Ran);
        assert_eq!(*received.lock().unwrap(), vec![String::new()]);
    }

    #[test]
    fn test_empty_query_delivers_empty_command() {
        let main_loop = MainLoop::new();
        let listener = CommandListener::new(main_loop.handle());
        let received = collect(&listener);

        dispatch(listener, b"GET /? HTTP/1.1\r\n\r\n");

        assert_eq!(main_loop.run_once(Duration::from_secs(1)), Turn::Ran);
        assert_eq!(*received.lock().unwrap(), vec![String::new()]);
    }

    #[test]
    fn test_no_subscribers_posts_nothing() {
        let main_loop = MainLoop::new();
        let listener = CommandListener::new(main_loop.handle());

        dispatch(listener, b"GET /?hello HTTP/1.1\r\n\r\n");

        assert_eq!(main_loop.run_once(Duration::from_millis(20)), Turn::Idle);
    }

    #[test]
    fn test_closed_context_is_an_error() {
        let listener = CommandListener::new(MainLoop::new().handle());
        collect(&listener);

        let dispatcher = Dispatcher::new(listener);
        let request = Request::parse(b"GET /?hello HTTP/1.1\r\n\r\n").unwrap();
        let (response, outcome) = dispatcher.route(&request);

        assert!(matches!(outcome, Err(HandlerError::ContextClosed(_))));
        assert_eq!(response.header("Access-Control-Allow-Origin"), Some("*"));
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let events = CommandEvents::new();
        let hits = Arc::new(Mutex::new(0));

        let id = {
            let hits = Arc::clone(&hits);
            events.subscribe(move |_| *hits.lock().unwrap() += 1)
        };
        events.emit("a");
        assert!(events.unsubscribe(id));
        assert!(!events.unsubscribe(id));
        events.emit("b");

        assert_eq!(*hits.lock().unwrap(), 1);
        assert!(events.is_empty());
    }

    #[test]
    fn test_all_subscribers_receive_command() {
        let events = CommandEvents::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let received = Arc::clone(&received);
            events.subscribe(move |command| received.lock().unwrap().push(format!("{}:{}", tag, command)));
        }

        events.emit("x");

        assert_eq!(*received.lock().unwrap(), vec!["first:x", "second:x"]);
    }
}
