//! # Parsing de Requests HTTP
//! src/http/request.rs
//!
//! Parser mínimo para la cabecera de un request HTTP/1.x.
//!
//! ## Formato
//!
//! ```text
//! GET /?Titulo&Cuerpo HTTP/1.1\r\n
//! Host: localhost:83\r\n
//! \r\n
//! ```
//!
//! El target se conserva tal cual llega: la query string **no** se decodifica,
//! porque el listener la trata como un payload opaco.

use std::collections::HashMap;
use thiserror::Error;

/// Métodos HTTP
///
/// Cualquier token es aceptado; los que no conocemos quedan en `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    GET,
    HEAD,
    POST,
    PUT,
    DELETE,
    OPTIONS,
    Other(String),
}

impl Method {
    fn parse(token: &str) -> Self {
        match token {
            "GET" => Method::GET,
            "HEAD" => Method::HEAD,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "OPTIONS" => Method::OPTIONS,
            other => Method::Other(other.to_string()),
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::OPTIONS => "OPTIONS",
            Method::Other(token) => token,
        }
    }
}

/// Request HTTP parseado
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,

    /// Target completo tal como vino en la request line (ej: "/?a&b")
    target: String,

    /// Path sin query (ej: "/")
    path: String,

    /// Todo lo que sigue al primer '?', sin decodificar. `None` si no hay '?'.
    query: Option<String>,

    /// Headers con el nombre en minúsculas
    headers: HashMap<String, String>,

    version: String,

    body: Vec<u8>,
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Empty request")]
    EmptyRequest,

    /// Los bytes de la cabecera no son UTF-8 válido
    #[error("Request is not valid UTF-8")]
    InvalidEncoding,

    #[error("Invalid request line format")]
    InvalidRequestLine,

    /// Versión HTTP distinta de HTTP/1.0 o HTTP/1.1
    #[error("Invalid HTTP version: {0}")]
    InvalidHttpVersion(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl Request {
    /// Parsea un request desde bytes
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use notifier::http::Request;
    ///
    /// let raw = b"GET /?hello%26world HTTP/1.0\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.path(), "/");
    /// assert_eq!(request.query(), Some("hello%26world"));
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        // Solo la cabecera tiene que ser texto; el body se guarda como bytes
        let (head, body) = match Self::head_len(buffer) {
            Some(len) => (&buffer[..len - 4], &buffer[len..]),
            None => (buffer, &[][..]),
        };
        let head = std::str::from_utf8(head).map_err(|_| ParseError::InvalidEncoding)?;

        if head.trim().is_empty() {
            return Err(ParseError::EmptyRequest);
        }

        let mut lines = head.split("\r\n");
        let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;

        let (method, target, version) = Self::parse_request_line(request_line)?;
        let (path, query) = Self::split_target(&target);
        let headers = Self::parse_headers(lines)?;

        Ok(Request {
            method,
            path,
            query,
            target,
            headers,
            version,
            body: body.to_vec(),
        })
    }

    /// Formato: `METHOD TARGET HTTP/1.x`
    fn parse_request_line(line: &str) -> Result<(Method, String, String), ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        if parts.len() != 3 {
            return Err(ParseError::InvalidRequestLine);
        }

        let method = Method::parse(parts[0]);
        let target = parts[1].to_string();

        let version = parts[2].to_string();
        if version != "HTTP/1.0" && version != "HTTP/1.1" {
            return Err(ParseError::InvalidHttpVersion(version));
        }

        Ok((method, target, version))
    }

    /// Separa path y query del target
    ///
    /// Acepta también la forma absoluta (`http://host:83/?x`), quedándose
    /// solo con el path.
    fn split_target(target: &str) -> (String, Option<String>) {
        let (before_query, query) = match target.find('?') {
            Some(pos) => (&target[..pos], Some(target[pos + 1..].to_string())),
            None => (target, None),
        };

        let path = match before_query.find("://") {
            Some(scheme_end) => {
                let authority_and_path = &before_query[scheme_end + 3..];
                match authority_and_path.find('/') {
                    Some(slash) => &authority_and_path[slash..],
                    None => "/",
                }
            }
            None => before_query,
        };

        (path.to_string(), query)
    }

    /// Cada header tiene formato: "Name: Value"
    fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> Result<HashMap<String, String>, ParseError> {
        let mut headers = HashMap::new();

        for line in lines {
            if line.trim().is_empty() {
                break;
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ParseError::InvalidHeader(line.to_string()))?;
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        Ok(headers)
    }

    /// Posición donde termina la cabecera (`\r\n\r\n` incluido), si ya llegó completa
    pub fn head_len(buffer: &[u8]) -> Option<usize> {
        buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query string cruda (todo lo que sigue al primer '?')
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Obtiene un header, sin distinguir mayúsculas
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|s| s.as_str())
    }

    /// Valor de `Content-Length`, si existe y es válido
    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length").and_then(|v| v.parse().ok())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}
