//! # Dispatcher de Requests
//! src/dispatcher/mod.rs
//!
//! Frontera entre el pool de workers (genérico) y el protocolo concreto.
//!
//! ## Arquitectura
//!
//! ```text
//! PendingRequest → Handler::process → (Dispatcher) → Endpoint::handle → Response
//! ```
//!
//! - [`Handler`]: lo único que conoce el pool. Recibe la conexión y es
//!   responsable de responder y cerrarla.
//! - [`Dispatcher`]: `Handler` HTTP genérico. Toma el request ya leído, arma
//!   la respuesta por defecto (200 vacío), filtra por path y delega en un [`Endpoint`].

use crate::error::HandlerError;
use crate::http::{Request, Response, StatusCode};
use crate::server::PendingRequest;
use tracing::debug;

/// Handler invocado una vez por cada request que sale de la cola
pub trait Handler: Send + Sync + 'static {
    fn process(&self, request: PendingRequest) -> Result<(), HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(PendingRequest) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    fn process(&self, request: PendingRequest) -> Result<(), HandlerError> {
        self(request)
    }
}

/// Endpoint montado en un único path fijo
pub trait Endpoint: Send + Sync + 'static {
    /// Path exacto que atiende el endpoint (ej: "/")
    fn path(&self) -> &str;

    /// Se llama para toda respuesta, coincida o no el path
    fn prepare(&self, _response: &mut Response) {}

    /// Se llama solo cuando el path coincide
    fn handle(&self, request: &Request, response: &mut Response) -> Result<(), HandlerError>;
}

/// Handler HTTP genérico sobre un [`Endpoint`]
pub struct Dispatcher<E> {
    endpoint: E,
}

impl<E: Endpoint> Dispatcher<E> {
    pub fn new(endpoint: E) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Construye la respuesta para un request ya parseado
    ///
    /// Paths distintos al del endpoint reciben el 200 vacío por defecto.
    ///
    /// # Ejemplo
    /// ```
    /// use notifier::dispatcher::{Dispatcher, Endpoint};
    /// use notifier::error::HandlerError;
    /// use notifier::http::{Request, Response};
    ///
    /// struct Hello;
    ///
    /// impl Endpoint for Hello {
    ///     fn path(&self) -> &str { "/hello" }
    ///     fn handle(&self, _req: &Request, res: &mut Response) -> Result<(), HandlerError> {
    ///         res.add_header("X-Hello", "world");
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let dispatcher = Dispatcher::new(Hello);
    /// let request = Request::parse(b"GET /hello HTTP/1.0\r\n\r\n").unwrap();
    /// let (response, outcome) = dispatcher.route(&request);
    /// assert!(outcome.is_ok());
    /// assert_eq!(response.header("X-Hello"), Some("world"));
    /// ```
    pub fn route(&self, request: &Request) -> (Response, Result<(), HandlerError>) {
        let mut response = Response::new(StatusCode::Ok);
        add_common_headers(&mut response);
        self.endpoint.prepare(&mut response);

        let outcome = if request.path() == self.endpoint.path() {
            self.endpoint.handle(request, &mut response)
        } else {
            debug!(path = request.path(), "path ignored");
            Ok(())
        };

        (response, outcome)
    }
}

impl<E: Endpoint> Handler for Dispatcher<E> {
    fn process(&self, pending: PendingRequest) -> Result<(), HandlerError> {
        let request = pending.request();
        debug!(
            request_id = pending.id(),
            peer = %pending.peer(),
            method = request.method().as_str(),
            target = request.target(),
            "request"
        );

        let (response, outcome) = self.route(request);
        // La respuesta se cierra aunque el endpoint haya fallado
        pending.respond(&response)?;
        outcome
    }
}

/// Headers comunes a todas las respuestas
fn add_common_headers(response: &mut Response) {
    response.add_header("Server", concat!("notifier/", env!("CARGO_PKG_VERSION")));
    response.add_header("Connection", "close");
}
