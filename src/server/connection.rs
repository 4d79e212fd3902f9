//! Per-connection worker logic.
//!
//! Each accepted connection handles exactly one request/response
//! exchange, then closes. Reusing connections is disabled by design: a
//! fresh connection per exchange removes the request-smuggling ambiguity
//! that pipelining would reintroduce.

use crate::{
    errors::{Fault, HandlerError},
    http::{
        query::QueryParams,
        request::{self, BodyFraming, Request},
        response::Response,
        types::Method,
    },
    routing::dispatcher::Session,
    server::server_impl::ServerHandle,
};
use memchr::memmem;
use std::{io, net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::{debug, error, warn};

// A failure before dispatch could produce a response. Faults convert to a
// response at this boundary; I/O failures drop the connection.
enum ConnFault {
    Fault {
        fault: Fault,
        request: Option<Request>,
    },
    Io(io::Error),
}

/// Performs the full parse-dispatch-respond sequence for one connection.
///
/// All per-connection errors are caught here and converted to a response;
/// nothing escapes to the worker loop except a fatal fault that halted
/// the server. A failure while writing the error response itself is
/// logged, never silently swallowed.
pub(crate) async fn serve(mut stream: TcpStream, client_addr: SocketAddr, server: ServerHandle) {
    // strategy snapshot: swaps apply to subsequently dispatched
    // connections only
    let recovery = server.recovery();
    let session = Session::new(client_addr);

    let (response, head_only) = match read_request(&mut stream, &server).await {
        Ok((request, query)) => {
            debug!("handling {} request from {client_addr}", request.method());
            let head_only = request.method() == Method::Head;
            let response = match server.dispatcher().dispatch(&request, &query, &session).await {
                Ok(response) => response,
                Err(HandlerError::Fault(fault)) => {
                    debug!("request from {client_addr} faulted: {fault}");
                    recovery.on_fault(&fault, Some(&request), &server)
                }
                Err(HandlerError::Fatal(fatal)) => {
                    match recovery.on_fatal(&fatal, Some(&request), &server) {
                        Some(response) => response,
                        // absent is only valid when the server was halted
                        None => return,
                    }
                }
            };
            (response, head_only)
        }
        Err(ConnFault::Fault { fault, request }) => {
            warn!("rejected request from {client_addr}: {fault}");
            let head_only = request
                .as_ref()
                .is_some_and(|request| request.method() == Method::Head);
            let response = recovery.on_fault(&fault, request.as_ref(), &server);
            (response, head_only)
        }
        Err(ConnFault::Io(err)) => {
            debug!("connection from {client_addr} aborted: {err}");
            return;
        }
    };

    if let Err(err) = write_response(&mut stream, &response, head_only, &server).await {
        error!("failed to write response to {client_addr}: {err}");
    }

    // best-effort drain: closing with unread input would reset the
    // connection before the client reads the response
    let mut scratch = [0u8; 1024];
    loop {
        match stream.try_read(&mut scratch) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

// Reads the head, decides the body framing and completes the staged
// request. Header parsing always completes before body framing; framing
// always completes before the request is built.
async fn read_request(
    stream: &mut TcpStream,
    server: &ServerHandle,
) -> Result<(Request, QueryParams), ConnFault> {
    let req_limits = server.req_limits();
    let read_timeout = server.conn_limits().socket_read_timeout;

    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let head_end = loop {
        if let Some(at) = memmem::find(&buf, b"\r\n\r\n") {
            break at + 4;
        }
        if buf.len() > req_limits.head_size {
            return Err(fault_without_request(Fault::malformed(
                "request head exceeds the configured limit",
            )));
        }

        let mut chunk = [0u8; 1024];
        let count = read_with_timeout(stream, &mut chunk, read_timeout)
            .await
            .map_err(ConnFault::Io)?;
        if count == 0 {
            return Err(if buf.is_empty() {
                ConnFault::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before a request arrived",
                ))
            } else {
                fault_without_request(Fault::malformed(
                    "connection closed before the request head completed",
                ))
            });
        }
        buf.extend_from_slice(&chunk[..count]);
    };

    let builder =
        request::parse_head(&buf[..head_end - 4], req_limits).map_err(fault_without_request)?;

    let framing =
        match request::framing_decision(builder.header_list(), server.codings(), req_limits) {
            Ok(framing) => framing,
            Err(fault) => {
                // give the strategy the body-less request for context
                let request = builder.build().ok();
                return Err(ConnFault::Fault { fault, request });
            }
        };

    let mut rest = buf.split_off(head_end);
    let body = match framing {
        BodyFraming::None => None,
        BodyFraming::ContentLength(length) => {
            while rest.len() < length {
                let mut chunk = [0u8; 1024];
                let count = read_with_timeout(stream, &mut chunk, read_timeout)
                    .await
                    .map_err(ConnFault::Io)?;
                if count == 0 {
                    let request = builder.clone().build().ok();
                    return Err(ConnFault::Fault {
                        fault: Fault::malformed(
                            "connection closed before the declared Content-Length was read",
                        ),
                        request,
                    });
                }
                rest.extend_from_slice(&chunk[..count]);
            }
            rest.truncate(length);
            Some(rest)
        }
        BodyFraming::TransferEncoded(_) => {
            // the raw body is whatever input is available right now; a
            // cascading decode through the declared codings is the
            // caller's affair
            loop {
                let mut chunk = [0u8; 1024];
                match stream.try_read(&mut chunk) {
                    Ok(0) => break,
                    Ok(count) => rest.extend_from_slice(&chunk[..count]),
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                    Err(err) => return Err(ConnFault::Io(err)),
                }
                if rest.len() > req_limits.body_size {
                    let request = builder.clone().build().ok();
                    return Err(ConnFault::Fault {
                        fault: Fault::malformed("request body exceeds the configured limit"),
                        request,
                    });
                }
            }
            Some(rest)
        }
    };

    let request = builder.body(body).build().map_err(fault_without_request)?;
    let query = QueryParams::parse(request.query().unwrap_or(""));
    Ok((request, query))
}

fn fault_without_request(fault: Fault) -> ConnFault {
    ConnFault::Fault {
        fault,
        request: None,
    }
}

async fn read_with_timeout(
    stream: &mut TcpStream,
    chunk: &mut [u8],
    time: Duration,
) -> io::Result<usize> {
    match timeout(time, stream.read(chunk)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "read timeout")),
    }
}

async fn write_response(
    stream: &mut TcpStream,
    response: &Response,
    head_only: bool,
    server: &ServerHandle,
) -> io::Result<()> {
    let bytes = response.serialize(head_only);
    match timeout(
        server.conn_limits().socket_write_timeout,
        stream.write_all(&bytes),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => return Err(io::Error::new(io::ErrorKind::TimedOut, "write timeout")),
    }
    stream.shutdown().await
}
