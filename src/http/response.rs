//! HTTP response construction and wire serialization.

use crate::http::types::{Header, StatusCode, PROTOCOL};

/// The `Server` header value stamped on every response.
pub(crate) const SERVER_VALUE: &str = concat!("forge_web/", env!("CARGO_PKG_VERSION"));

/// An HTTP response: a status code, protocol string, ordered header list
/// and a byte body.
///
/// Responses are produced whole - by a handler or by the fault-recovery
/// strategy - and are never partially written to the wire. Serialization
/// stamps `Server`, `Connection: close` and an accurate `Content-Length`,
/// replacing any caller-supplied values while preserving header order.
///
/// # Examples
/// ```
/// use forge_web::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("Content-Type", "text/html")
///     .body("<h1>Hello World</h1>");
/// assert_eq!(response.status(), StatusCode::Ok);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    protocol: String,
    headers: Vec<Header>,
    body: Vec<u8>,
}

impl Response {
    #[inline]
    pub fn new(status: StatusCode) -> Self {
        Response {
            status,
            protocol: PROTOCOL.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Appends a header. Duplicates are kept as distinct entries.
    #[inline]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    /// Sets the response body.
    #[inline]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    #[inline]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    #[inline]
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the response for the wire.
    ///
    /// With `head_only` (HEAD requests) the body bytes are omitted while
    /// `Content-Length` still reports the full body size.
    pub(crate) fn serialize(&self, head_only: bool) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128 + self.body.len());

        buf.extend_from_slice(self.protocol.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.status.status_line().as_bytes());
        buf.extend_from_slice(b"\r\n");

        let content_length = self.body.len().to_string();
        let mut wrote_server = false;
        let mut wrote_length = false;
        let mut wrote_connection = false;
        for header in &self.headers {
            // stamped fields keep their original position
            let (name, value) = if header.is("Server") {
                wrote_server = true;
                (header.name.as_str(), SERVER_VALUE)
            } else if header.is("Content-Length") {
                wrote_length = true;
                (header.name.as_str(), content_length.as_str())
            } else if header.is("Connection") {
                wrote_connection = true;
                (header.name.as_str(), "close")
            } else {
                (header.name.as_str(), header.value.as_str())
            };
            write_header(&mut buf, name, value);
        }
        if !wrote_server {
            write_header(&mut buf, "Server", SERVER_VALUE);
        }
        if !wrote_connection {
            write_header(&mut buf, "Connection", "close");
        }
        if !wrote_length {
            write_header(&mut buf, "Content-Length", &content_length);
        }

        buf.extend_from_slice(b"\r\n");
        if !head_only {
            buf.extend_from_slice(&self.body);
        }
        buf
    }
}

fn write_header(buf: &mut Vec<u8>, name: &str, value: &str) {
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(b"\r\n");
}
