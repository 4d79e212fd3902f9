use crate::http::types::{Method, StatusCode};
use thiserror::Error;

/// A recoverable fault raised while parsing, framing or handling a request.
///
/// Every fault maps to a client-visible response: the connection still
/// completes with a well-formed reply before closing. Faults are converted
/// by the installed [`FaultRecovery`](crate::FaultRecovery) strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// Client framing error: ambiguous `Transfer-Encoding` + `Content-Length`,
    /// bad chunk-size hex, missing chunk terminator, a body on a verb that
    /// does not allow one, and similar. Maps to `400 Bad Request`.
    #[error("{0}")]
    Malformed(String),

    /// `Transfer-Encoding` listed a coding absent from the registry.
    /// Maps to `501 Not Implemented`.
    #[error("transfer coding `{0}` is not implemented")]
    CodingNotImplemented(String),

    /// No route matched the request. Maps to `404 Not Found`.
    #[error("cannot locate {verb} handler for {path}")]
    HandlerNotFound { verb: Method, path: String },

    /// A fault raised by a bound handler, carrying its chosen status.
    #[error("{message}")]
    Handler {
        status: StatusCode,
        message: String,
        cause: Option<String>,
    },
}

impl Fault {
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Fault::Malformed(message.into())
    }

    /// A handler fault with the given status; `500 Internal Server Error`
    /// is the conventional status for unclassified failures.
    #[inline]
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Fault::Handler {
            status,
            message: message.into(),
            cause: None,
        }
    }

    /// The status the fault maps to on the wire.
    pub const fn status(&self) -> StatusCode {
        match self {
            Fault::Malformed(_) => StatusCode::BadRequest,
            Fault::CodingNotImplemented(_) => StatusCode::NotImplemented,
            Fault::HandlerNotFound { .. } => StatusCode::NotFound,
            Fault::Handler { status, .. } => *status,
        }
    }

    /// Stable kind name, used by diagnostic bodies.
    pub const fn kind(&self) -> &'static str {
        match self {
            Fault::Malformed(_) => "MalformedRequestException",
            Fault::CodingNotImplemented(_) => "TransferEncodingNotImplementedException",
            Fault::HandlerNotFound { .. } => "HandlerNotFoundException",
            Fault::Handler { .. } => "HandlerException",
        }
    }

    /// The underlying cause, when one was recorded.
    pub fn cause(&self) -> Option<&str> {
        match self {
            Fault::Handler { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }
}

/// An unrecoverable fault: the process or runtime itself is compromised.
///
/// This is the only error category permitted to end the entire server
/// rather than just one connection; it is routed through the strategy's
/// [`on_fatal`](crate::FaultRecovery::on_fatal) path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FatalFault {
    pub message: String,
}

impl FatalFault {
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        FatalFault {
            message: message.into(),
        }
    }
}

/// What a handler invocation can produce besides a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Fault(#[from] Fault),
    #[error(transparent)]
    Fatal(#[from] FatalFault),
}

/// Errors from the server lifecycle itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    /// A halted server is not restartable; construct a new instance.
    #[error("a halted server cannot be restarted")]
    Halted,
}

#[cfg(test)]
mod errors_self {
    use super::*;

    #[test]
    fn fault_status_mapping() {
        #[rustfmt::skip]
        let cases = [
            (Fault::malformed("bad framing"),                    StatusCode::BadRequest),
            (Fault::CodingNotImplemented("gzip".into()),         StatusCode::NotImplemented),
            (
                Fault::HandlerNotFound { verb: Method::Get, path: "/x/".into() },
                StatusCode::NotFound,
            ),
            (Fault::handler(StatusCode::Conflict, "busy"),       StatusCode::Conflict),
        ];

        for (fault, status) in cases {
            assert_eq!(fault.status(), status, "fault {fault:?}");
        }
    }

    #[test]
    fn fault_kind_names() {
        assert_eq!(Fault::malformed("x").kind(), "MalformedRequestException");
        assert_eq!(
            Fault::CodingNotImplemented("br".into()).kind(),
            "TransferEncodingNotImplementedException"
        );
        assert_eq!(
            Fault::HandlerNotFound {
                verb: Method::Post,
                path: "/a/".into()
            }
            .kind(),
            "HandlerNotFoundException"
        );
        assert_eq!(
            Fault::handler(StatusCode::InternalServerError, "boom").kind(),
            "HandlerException"
        );
    }

    #[test]
    fn fault_messages() {
        let fault = Fault::HandlerNotFound {
            verb: Method::Get,
            path: "/does-not-exist/".into(),
        };
        assert_eq!(
            fault.to_string(),
            "cannot locate GET handler for /does-not-exist/"
        );

        let fault = Fault::CodingNotImplemented("snappy".into());
        assert_eq!(fault.to_string(), "transfer coding `snappy` is not implemented");
    }
}
