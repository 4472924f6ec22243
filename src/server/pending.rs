//! # Request Pendiente
//! src/server/pending.rs
//!
//! Un intercambio aceptado que espera a un worker: la conexión más el request
//! ya leído. Solo se construye cuando la cabecera llegó completa, así que un
//! worker nunca queda esperando bytes de un cliente. La cola es su dueña hasta
//! que un worker la saca; desde ahí el worker es el único que escribe la
//! respuesta. Al soltarla (`drop`) se cierra el socket.

use crate::error::HandlerError;
use crate::http::{Request, Response};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug)]
pub struct PendingRequest {
    id: u64,
    stream: TcpStream,
    peer: SocketAddr,
    accepted_at: Instant,
    request: Request,
}

impl PendingRequest {
    /// Lee el request de una conexión recién aceptada
    ///
    /// Deja el socket en modo bloqueante con `read_timeout` para que un
    /// cliente lento no retenga al lector indefinidamente.
    pub fn read(
        id: u64,
        mut stream: TcpStream,
        peer: SocketAddr,
        read_timeout: Duration,
        max_request_bytes: usize,
    ) -> Result<Self, HandlerError> {
        let accepted_at = Instant::now();
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(read_timeout))?;
        stream.set_write_timeout(Some(read_timeout))?;

        let request = read_request(&mut stream, max_request_bytes)?;

        Ok(Self {
            id,
            stream,
            peer,
            accepted_at,
            request,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Tiempo transcurrido desde el accept
    pub fn age(&self) -> Duration {
        self.accepted_at.elapsed()
    }

    /// Escribe la respuesta y cierra la conexión
    pub fn respond(self, response: &Response) -> io::Result<()> {
        write_response(&self.stream, response)?;
        trace!(request_id = self.id, status = %response.status(), "response written");
        self.close();
        Ok(())
    }

    /// Cierra la conexión sin respuesta
    pub fn close(self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Lee y parsea la cabecera del request
///
/// Si hay `Content-Length`, también lee el body (dentro del mismo límite)
/// para no cerrar el socket con datos sin leer.
pub(crate) fn read_request(stream: &mut TcpStream, limit: usize) -> Result<Request, HandlerError> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    let head_len = loop {
        if let Some(len) = Request::head_len(&buffer) {
            break len;
        }
        if buffer.len() >= limit {
            return Err(HandlerError::TooLarge { limit });
        }

        let read = stream.read(&mut chunk)?;
        if read == 0 {
            // El cliente cerró antes de terminar la cabecera
            break buffer.len();
        }
        buffer.extend_from_slice(&chunk[..read]);
    };

    let request = Request::parse(&buffer)?;

    if let Some(content_length) = request.content_length() {
        let wanted = (head_len + content_length).min(limit);
        while buffer.len() < wanted {
            let read = stream.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
        }
        if buffer.len() > head_len + request.body().len() {
            return Ok(Request::parse(&buffer)?);
        }
    }

    Ok(request)
}

pub(crate) fn write_response(mut stream: &TcpStream, response: &Response) -> io::Result<()> {
    stream.write_all(&response.to_bytes())?;
    stream.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::ParseError;
    use crate::http::{Method, StatusCode};
    use std::net::TcpListener;

    fn accepted_pair() -> (TcpStream, SocketAddr, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (stream, peer) = listener.accept().unwrap();
        (stream, peer, client)
    }

    fn read(stream: TcpStream, peer: SocketAddr, limit: usize) -> Result<PendingRequest, HandlerError> {
        PendingRequest::read(1, stream, peer, Duration::from_secs(2), limit)
    }

    #[test]
    fn test_read_request_in_pieces() {
        let (stream, peer, mut client) = accepted_pair();

        client.write_all(b"GET /?hel").unwrap();
        client.flush().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        client.write_all(b"lo HTTP/1.0\r\nHost: x\r\n\r\n").unwrap();

        let pending = read(stream, peer, 8192).unwrap();
        assert_eq!(pending.request().method(), &Method::GET);
        assert_eq!(pending.request().query(), Some("hello"));
    }

    #[test]
    fn test_read_request_with_body() {
        let (stream, peer, mut client) = accepted_pair();

        client.write_all(b"POST / HTTP/1.0\r\nContent-Length: 5\r\n\r\n").unwrap();
        client.flush().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        client.write_all(b"hello").unwrap();

        let pending = read(stream, peer, 8192).unwrap();
        assert_eq!(pending.request().method(), &Method::POST);
        assert_eq!(pending.request().body(), b"hello");
    }

    #[test]
    fn test_read_request_too_large() {
        let (stream, peer, mut client) = accepted_pair();

        client.write_all(&[b'a'; 200]).unwrap();

        assert!(matches!(read(stream, peer, 64), Err(HandlerError::TooLarge { limit: 64 })));
    }

    #[test]
    fn test_closed_without_data_is_empty_request() {
        let (stream, peer, client) = accepted_pair();
        drop(client);

        assert!(matches!(
            read(stream, peer, 8192),
            Err(HandlerError::Parse(ParseError::EmptyRequest))
        ));
    }

    #[test]
    fn test_respond_closes_connection() {
        let (stream, peer, mut client) = accepted_pair();
        client.write_all(b"GET / HTTP/1.0\r\n\r\n").unwrap();

        let pending = read(stream, peer, 8192).unwrap();
        pending.respond(&Response::new(StatusCode::Ok)).unwrap();

        let mut text = String::new();
        client.read_to_string(&mut text).unwrap();
        assert!(text.starts_with("HTTP/1.0 200 OK\r\n"));
    }
}
