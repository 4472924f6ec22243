//! # Construcción de Respuestas HTTP
//! src/http/response.rs
//!
//! Las respuestas del listener nunca llevan body: solo status line y headers.
//!
//! ```text
//! HTTP/1.0 200 OK\r\n
//! Access-Control-Allow-Origin: *\r\n
//! Connection: close\r\n
//! Content-Length: 0\r\n
//! \r\n
//! ```
//!
//! ## Ejemplo de uso
//!
//! ```
//! use notifier::http::{Response, StatusCode};
//!
//! let response = Response::new(StatusCode::Ok)
//!     .with_header("Access-Control-Allow-Origin", "*");
//!
//! let bytes = response.to_bytes();
//! assert!(bytes.starts_with(b"HTTP/1.0 200 OK\r\n"));
//! ```

use super::StatusCode;

/// Respuesta HTTP/1.0 sin body
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,

    /// Headers en orden de inserción; un nombre repetido reemplaza el valor
    headers: Vec<(String, String)>,
}

impl Response {
    /// Crea una respuesta sin headers
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// Agrega un header (builder)
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    /// Agrega un header a una respuesta existente
    ///
    /// Si el header ya existe (sin distinguir mayúsculas), se sobrescribe.
    pub fn add_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// Busca un header sin distinguir mayúsculas
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Convierte la respuesta a bytes listos para el socket
    ///
    /// `Content-Length: 0` se agrega siempre para que el cliente no espere body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.0 {}\r\n", self.status);

        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        if self.header("Content-Length").is_none() {
            head.push_str("Content-Length: 0\r\n");
        }
        head.push_str("\r\n");

        head.into_bytes()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}
