//! # Módulo HTTP
//!
//! Subconjunto de HTTP/1.x que necesita el listener:
//!
//! - Parsing de la cabecera del request (request line + headers)
//! - Construcción de responses sin body
//! - Los dos status codes que emitimos
//!
//! No hay keep-alive, chunked transfer ni compresión: cada conexión lleva
//! exactamente un request y se cierra después de responder.

pub mod request;
pub mod response;
pub mod status;

pub use request::{Method, Request};
pub use response::Response;
pub use status::StatusCode;
