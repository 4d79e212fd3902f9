//! Fault recovery: the pluggable policy turning faults into responses
//! and fatal faults into a server halt.

use crate::{
    errors::{Fault, FatalFault},
    http::{request::Request, response::Response},
    server::server_impl::ServerHandle,
};
use tracing::error;

/// A strategy for handling faults that occur while serving a request.
///
/// The server owns a single replaceable strategy cell, installed with
/// [`DefaultRecovery`] at construction. Swaps are visible to subsequently
/// dispatched connections only - an in-flight request keeps the strategy
/// it started with. Installing `None` restores the default, so the server
/// is never left without a strategy.
pub trait FaultRecovery: Send + Sync {
    /// Converts a recoverable fault into the response sent to the client.
    /// Must always produce a usable response.
    ///
    /// `request` is absent when the fault occurred before a request could
    /// be constructed (e.g. a malformed request line).
    fn on_fault(&self, fault: &Fault, request: Option<&Request>, server: &ServerHandle)
        -> Response;

    /// Handles a fatal fault. Halting the server can and will typically
    /// be expected; returning `None` is only valid when the server was
    /// halted as a result, as the response would serve no purpose.
    fn on_fatal(
        &self,
        fatal: &FatalFault,
        request: Option<&Request>,
        server: &ServerHandle,
    ) -> Option<Response>;
}

/// The default fault recovery.
///
/// - Faults map to the status they carry and a JSON diagnostic body
///   naming the fault kind, message, cause and status.
/// - Fatal faults halt the server and terminate the process with exit
///   code `1`.
pub struct DefaultRecovery;

impl FaultRecovery for DefaultRecovery {
    fn on_fault(
        &self,
        fault: &Fault,
        _request: Option<&Request>,
        _server: &ServerHandle,
    ) -> Response {
        let status = fault.status();
        let body = serde_json::json!({
            "exception": fault.kind(),
            "message": fault.to_string(),
            "cause": fault.cause(),
            "responseCode": status.to_string(),
        });

        Response::new(status)
            .header("Content-Type", "application/json")
            .body(body.to_string())
    }

    fn on_fatal(
        &self,
        fatal: &FatalFault,
        _request: Option<&Request>,
        server: &ServerHandle,
    ) -> Option<Response> {
        error!("fatal fault encountered, halting server and exiting - message: {fatal}");
        server.halt();
        std::process::exit(1);
    }
}
