//! Core HTTP protocol types.

use std::fmt;

/// The only protocol version accepted on the wire and produced in responses.
pub const PROTOCOL: &str = "HTTP/1.1";

// METHOD

/// HTTP request methods.
///
/// `TRACE` and `CONNECT` are intentionally absent; a request line carrying
/// any verb outside this set fails the connection.
///
/// `HEAD` requests are matched and dispatched as if they were `GET`; the
/// emitted response omits the body but still carries an accurate
/// `Content-Length`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    /// GET method - transfer a current representation of the target resource
    /// [[RFC7231, Section 4.3.1](https://tools.ietf.org/html/rfc7231#section-4.3.1)]
    Get,
    /// POST method - perform resource-specific processing on the request payload
    /// [[RFC7231, Section 4.3.3](https://tools.ietf.org/html/rfc7231#section-4.3.3)]
    Post,
    /// PUT method - replace all current representations of the target resource
    /// [[RFC7231, Section 4.3.4](https://tools.ietf.org/html/rfc7231#section-4.3.4)]
    Put,
    /// HEAD method - same as GET but without response body
    /// [[RFC7231, Section 4.3.2](https://tools.ietf.org/html/rfc7231#section-4.3.2)]
    Head,
    /// PATCH method - apply partial modifications to a resource
    /// [[RFC5789, Section 2](https://tools.ietf.org/html/rfc5789#section-2)]
    Patch,
    /// DELETE method - remove all current representations of the target resource
    /// [[RFC7231, Section 4.3.5](https://tools.ietf.org/html/rfc7231#section-4.3.5)]
    Delete,
    /// OPTIONS method - describe the communication options for the target resource
    /// [[RFC7231, Section 4.3.7](https://tools.ietf.org/html/rfc7231#section-4.3.7)]
    Options,
}

impl Method {
    const ALL: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Head,
        Method::Patch,
        Method::Delete,
        Method::Options,
    ];

    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Head => "HEAD",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }

    /// Parses a request-line verb token, ignoring ASCII case.
    #[inline]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(token))
    }

    /// The verb used for route matching: `HEAD` matches as `GET`,
    /// everything else matches as itself.
    #[inline]
    pub const fn effective(self) -> Self {
        match self {
            Method::Head => Method::Get,
            other => other,
        }
    }

    /// Whether requests with this verb may carry a body.
    #[inline]
    pub const fn allows_body(self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// HEADER

/// A single header field. Name comparison is case-insensitive; multiple
/// headers with the same name are distinct entries, never merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    #[inline]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Header {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Case-insensitive name comparison
    /// (per [RFC 7230](https://tools.ietf.org/html/rfc7230#section-3.2)).
    #[inline]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])*
        $name:ident = ($num:literal, $reason:literal);
    )+) => {
        /// HTTP status codes.
        ///
        /// The standard registry as defined in
        /// [RFC 9110](https://datatracker.ietf.org/doc/html/rfc9110#section-15)
        /// and related standards, each carrying its canonical reason phrase.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $reason)]
            $(#[$docs])*
            $name = $num,
        )+ }

        impl StatusCode {
            /// The numeric code, e.g. `404`.
            #[inline]
            pub const fn code(&self) -> u16 {
                match self { $( StatusCode::$name => $num, )+ }
            }

            /// The canonical reason phrase, e.g. `Not Found`.
            #[inline]
            pub const fn reason(&self) -> &'static str {
                match self { $( StatusCode::$name => $reason, )+ }
            }

            // Status line fragment, e.g. `404 Not Found`.
            #[inline]
            pub(crate) const fn status_line(&self) -> &'static str {
                match self { $(
                    StatusCode::$name => concat!($num, " ", $reason),
                )+ }
            }
        }
    }
}

set_status_codes! {
    // INFORMATIONAL responses
    Continue = (100, "Continue");
    SwitchingProtocols = (101, "Switching Protocols");
    /// This is a WebDAV response.
    Processing = (102, "Processing");
    EarlyHints = (103, "Early Hints");

    // SUCCESS responses
    Ok = (200, "OK");
    Created = (201, "Created");
    Accepted = (202, "Accepted");
    NonAuthoritativeInformation = (203, "Non-Authoritative Information");
    NoContent = (204, "No Content");
    ResetContent = (205, "Reset Content");
    PartialContent = (206, "Partial Content");
    /// This is a WebDAV response.
    MultiStatus = (207, "Multi-Status");
    /// This is a WebDAV response.
    AlreadyReported = (208, "Already Reported");
    /// This is a response from the HTTP Delta encoding.
    ImUsed = (226, "IM Used");

    // REDIRECTION responses
    MultipleChoices = (300, "Multiple Choices");
    MovedPermanently = (301, "Moved Permanently");
    Found = (302, "Found");
    SeeOther = (303, "See Other");
    NotModified = (304, "Not Modified");
    TemporaryRedirect = (307, "Temporary Redirect");
    PermanentRedirect = (308, "Permanent Redirect");

    // CLIENT ERROR responses
    BadRequest = (400, "Bad Request");
    Unauthorized = (401, "Unauthorized");
    PaymentRequired = (402, "Payment Required");
    Forbidden = (403, "Forbidden");
    NotFound = (404, "Not Found");
    MethodNotAllowed = (405, "Method Not Allowed");
    NotAcceptable = (406, "Not Acceptable");
    ProxyAuthenticationRequired = (407, "Proxy Authentication Required");
    RequestTimeout = (408, "Request Timeout");
    Conflict = (409, "Conflict");
    Gone = (410, "Gone");
    LengthRequired = (411, "Length Required");
    PreconditionFailed = (412, "Precondition Failed");
    PayloadTooLarge = (413, "Payload Too Large");
    UriTooLong = (414, "URI Too Long");
    UnsupportedMediaType = (415, "Unsupported Media Type");
    RangeNotSatisfiable = (416, "Range Not Satisfiable");
    ExpectationFailed = (417, "Expectation Failed");
    ImATeapot = (418, "I'm a teapot");
    MisdirectedRequest = (421, "Misdirected Request");
    /// This is a WebDAV response.
    UnprocessableEntity = (422, "Unprocessable Entity");
    /// This is a WebDAV response.
    Locked = (423, "Locked");
    /// This is a WebDAV response.
    FailedDependency = (424, "Failed Dependency");
    TooEarly = (425, "Too Early");
    UpgradeRequired = (426, "Upgrade Required");
    PreconditionRequired = (428, "Precondition Required");
    TooManyRequests = (429, "Too Many Requests");
    RequestHeaderFieldsTooLarge = (431, "Request Header Fields Too Large");
    UnavailableForLegalReasons = (451, "Unavailable For Legal Reasons");

    // SERVER ERROR responses
    InternalServerError = (500, "Internal Server Error");
    NotImplemented = (501, "Not Implemented");
    BadGateway = (502, "Bad Gateway");
    ServiceUnavailable = (503, "Service Unavailable");
    GatewayTimeout = (504, "Gateway Timeout");
    HttpVersionNotSupported = (505, "HTTP Version Not Supported");
    VariantAlsoNegotiates = (506, "Variant Also Negotiates");
    /// This is a WebDAV response.
    InsufficientStorage = (507, "Insufficient Storage");
    /// This is a WebDAV response.
    LoopDetected = (508, "Loop Detected");
    NotExtended = (510, "Not Extended");
    NetworkAuthenticationRequired = (511, "Network Authentication Required");
}

impl fmt::Display for StatusCode {
    /// Renders as `"<code> <reason>"`, e.g. `404 Not Found`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_line())
    }
}

#[cfg(test)]
mod types_self {
    use super::*;

    #[test]
    fn method_from_token() {
        #[rustfmt::skip]
        let cases = [
            ("GET",     Some(Method::Get)),
            ("get",     Some(Method::Get)),
            ("Post",    Some(Method::Post)),
            ("PUT",     Some(Method::Put)),
            ("HEAD",    Some(Method::Head)),
            ("PATCH",   Some(Method::Patch)),
            ("DELETE",  Some(Method::Delete)),
            ("OPTIONS", Some(Method::Options)),

            ("TRACE",   None),
            ("CONNECT", None),
            ("GETT",    None),
            ("",        None),
        ];

        for (token, expected) in cases {
            assert_eq!(Method::from_token(token), expected, "token {token:?}");
        }
    }

    #[test]
    fn method_effective() {
        assert_eq!(Method::Head.effective(), Method::Get);
        for method in [Method::Get, Method::Post, Method::Delete, Method::Options] {
            assert_eq!(method.effective(), method);
        }
    }

    #[test]
    fn method_body_rule() {
        #[rustfmt::skip]
        let cases = [
            (Method::Post,    true),
            (Method::Put,     true),
            (Method::Patch,   true),
            (Method::Get,     false),
            (Method::Head,    false),
            (Method::Delete,  false),
            (Method::Options, false),
        ];

        for (method, allowed) in cases {
            assert_eq!(method.allows_body(), allowed, "method {method}");
        }
    }

    #[test]
    fn status_code_rendering() {
        assert_eq!(StatusCode::Ok.to_string(), "200 OK");
        assert_eq!(StatusCode::NotFound.to_string(), "404 Not Found");
        assert_eq!(StatusCode::NotImplemented.code(), 501);
        assert_eq!(StatusCode::BadRequest.reason(), "Bad Request");
        assert_eq!(
            StatusCode::InternalServerError.to_string(),
            "500 Internal Server Error"
        );
    }

    #[test]
    fn header_name_comparison() {
        let header = Header::new("Content-Type", "application/json");
        assert!(header.is("content-type"));
        assert!(header.is("CONTENT-TYPE"));
        assert!(!header.is("content-length"));
    }
}
