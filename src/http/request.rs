//! HTTP request representation, head parsing and body framing.

use crate::{
    coding::registry::CodingRegistry,
    errors::Fault,
    http::types::{Header, Method, PROTOCOL},
    limits::ReqLimits,
};
use tracing::{debug, warn};

/// A parsed HTTP request.
///
/// Immutable once built: construction is staged through [`RequestBuilder`]
/// and completes only after the body-framing decision has been made, so a
/// finished request is never mutated to attach a body later.
///
/// Headers are kept as an ordered list with duplicates preserved -
/// insertion order is significant for multi-value lookups. The path is
/// normalized before dispatch: ASCII case-folded, guaranteed to end with
/// `/`, and percent-decoded as UTF-8.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    protocol: String,
    target: String,
    path: String,
    query: Option<String>,
    headers: Vec<Header>,
    body: Option<Vec<u8>>,
}

impl Request {
    #[inline]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }

    #[inline]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// The raw request target as received, query component included.
    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The normalized request path: case-folded, `/`-terminated,
    /// percent-decoded.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query component (the part after the last `?`), if any.
    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    #[inline]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Returns the first header value with case-insensitive name matching.
    /// Uses linear search.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.is(name))
            .map(|h| h.value.as_str())
    }

    /// Returns every value of the named header, in insertion order.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|h| h.is(name))
            .map(|h| h.value.as_str())
            .collect()
    }

    #[inline]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.is(name))
    }

    /// The raw request body, if one was framed.
    #[inline]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// The codings declared by `Transfer-Encoding`, in declared order.
    /// Multiple headers and comma-separated lists both contribute.
    pub fn transfer_codings(&self) -> Vec<String> {
        self.header_values("Transfer-Encoding")
            .iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Decodes the raw body through the registry, applying the declared
    /// codings in reverse order (the last-applied coding is removed
    /// first). The framer leaves transfer-encoded bodies raw; cascading
    /// decode is the caller's affair.
    pub fn decoded_body(&self, registry: &CodingRegistry) -> Result<Option<Vec<u8>>, Fault> {
        let Some(body) = &self.body else {
            return Ok(None);
        };

        let mut bytes = body.clone();
        for name in self.transfer_codings().iter().rev() {
            let coder = registry
                .resolve(name)
                .ok_or_else(|| Fault::CodingNotImplemented(name.clone()))?;
            bytes = coder.decode(&bytes)?;
        }
        Ok(Some(bytes))
    }
}

/// Staged construction of a [`Request`].
///
/// The parser fills in the request line and headers; the body is attached
/// once the framing decision has been made; `build` then normalizes the
/// path and produces the immutable request.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    protocol: String,
    target: String,
    headers: Vec<Header>,
    body: Option<Vec<u8>>,
}

impl RequestBuilder {
    #[inline]
    pub fn new() -> Self {
        RequestBuilder {
            method: Method::Get,
            protocol: PROTOCOL.to_string(),
            target: "/".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[inline]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[inline]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    #[inline]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    #[inline]
    pub fn header(mut self, header: Header) -> Self {
        self.headers.push(header);
        self
    }

    #[inline]
    pub fn headers(mut self, headers: impl IntoIterator<Item = Header>) -> Self {
        self.headers.extend(headers);
        self
    }

    #[inline]
    pub fn body(mut self, body: Option<Vec<u8>>) -> Self {
        self.body = body;
        self
    }

    #[inline]
    pub(crate) fn header_list(&self) -> &[Header] {
        &self.headers
    }

    /// Completes construction. Splits the target at the last `?` and
    /// normalizes the path component.
    pub fn build(self) -> Result<Request, Fault> {
        let (raw_path, query) = match self.target.rsplit_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (self.target.clone(), None),
        };
        let path = normalize_path(&raw_path)?;

        Ok(Request {
            method: self.method,
            protocol: self.protocol,
            target: self.target,
            path,
            query,
            headers: self.headers,
            body: self.body,
        })
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// Case-fold first, decode second: an uppercase letter hidden behind a
// percent escape survives the fold.
fn normalize_path(raw: &str) -> Result<String, Fault> {
    let mut path = raw.to_ascii_lowercase();
    if !path.ends_with('/') {
        path.push('/');
    }
    let decoded = urlencoding::decode(&path)
        .map_err(|_| Fault::malformed("request path percent-decodes to invalid UTF-8"))?;
    Ok(decoded.into_owned())
}

/// Parses the request head (request line plus header lines, without the
/// terminating blank line) into a body-less [`RequestBuilder`].
pub(crate) fn parse_head(head: &[u8], limits: &ReqLimits) -> Result<RequestBuilder, Fault> {
    let head = simdutf8::basic::from_utf8(head)
        .map_err(|_| Fault::malformed("request head is not valid UTF-8"))?;

    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or("");

    let mut tokens = request_line.split_whitespace();
    let (verb, target, protocol) = match (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    {
        (Some(verb), Some(target), Some(protocol), None) => (verb, target, protocol),
        _ => return Err(Fault::malformed("malformed request line")),
    };

    let method = Method::from_token(verb)
        .ok_or_else(|| Fault::malformed(format!("unknown request method `{verb}`")))?;
    if protocol != PROTOCOL {
        return Err(Fault::malformed(format!(
            "unsupported protocol `{protocol}`"
        )));
    }

    let mut builder = RequestBuilder::new().method(method).target(target);

    let mut count = 0usize;
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            warn!("discarding malformed header line {line:?}");
            continue;
        };
        let name = sanitize(name);
        let value = sanitize(value);
        if name.is_empty() {
            debug!("discarding header with empty name");
            continue;
        }

        count += 1;
        if count > limits.header_count {
            return Err(Fault::malformed("too many request headers"));
        }
        builder = builder.header(Header::new(name, value));
    }

    Ok(builder)
}

// Defensive normalization against header injection: embedded NUL/CR/LF
// become spaces, surrounding whitespace is trimmed.
fn sanitize(field: &str) -> String {
    field
        .replace(['\0', '\r', '\n'], " ")
        .trim()
        .to_string()
}

/// How the request body is framed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BodyFraming {
    /// No body follows the head.
    None,
    /// Exactly this many bytes follow the head.
    ContentLength(usize),
    /// The body is transfer-encoded with the listed codings (declared
    /// order); the framer reads the available bytes raw.
    TransferEncoded(Vec<String>),
}

/// The body-framing decision, in strict priority order.
///
/// `Transfer-Encoding` together with `Content-Length` is never resolved by
/// preferring one header - it is a smuggling signal and rejects the
/// request outright. Declared codings are checked against the registry in
/// reverse-declared order; the first unresolvable name fails with a
/// coding-not-implemented fault.
pub(crate) fn framing_decision(
    headers: &[Header],
    registry: &CodingRegistry,
    limits: &ReqLimits,
) -> Result<BodyFraming, Fault> {
    let transfer_encoding: Vec<&str> = headers
        .iter()
        .filter(|h| h.is("Transfer-Encoding"))
        .map(|h| h.value.as_str())
        .collect();
    let content_length: Vec<&str> = headers
        .iter()
        .filter(|h| h.is("Content-Length"))
        .map(|h| h.value.as_str())
        .collect();

    if !transfer_encoding.is_empty() && !content_length.is_empty() {
        return Err(Fault::malformed(
            "request carries both Transfer-Encoding and Content-Length; \
             possible request smuggling",
        ));
    }

    if !transfer_encoding.is_empty() {
        let codings: Vec<String> = transfer_encoding
            .iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect();

        for name in codings.iter().rev() {
            if registry.resolve(name).is_none() {
                return Err(Fault::CodingNotImplemented(name.clone()));
            }
        }
        return Ok(BodyFraming::TransferEncoded(codings));
    }

    if let Some(value) = content_length.first() {
        let length: usize = value
            .trim()
            .parse()
            .map_err(|_| Fault::malformed(format!("invalid Content-Length `{value}`")))?;
        if length > limits.body_size {
            return Err(Fault::malformed(
                "request body exceeds the configured limit",
            ));
        }
        if length == 0 {
            return Ok(BodyFraming::None);
        }
        return Ok(BodyFraming::ContentLength(length));
    }

    Ok(BodyFraming::None)
}
