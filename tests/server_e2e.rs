//! End-to-end tests driving a live server over real sockets.

use forge_web::{
    async_trait, Args, BindingRole, FatalFault, Fault, FaultRecovery, Handler, HandlerError,
    HandlerSpec, Method, Request, Response, Server, ServerHandle, StatusCode,
};
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

// Echoes the `name` query parameter and counts invocations.
struct EchoName {
    hits: Arc<AtomicUsize>,
}

#[async_trait]
impl Handler for EchoName {
    async fn handle(&self, args: Args<'_>) -> Result<Response, HandlerError> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        let name = args
            .query()
            .and_then(|query| query.get("name"))
            .unwrap_or("");
        Ok(Response::new(StatusCode::Ok).body(name))
    }
}

// Echoes the sole path parameter.
struct ItemEcho;

#[async_trait]
impl Handler for ItemEcho {
    async fn handle(&self, args: Args<'_>) -> Result<Response, HandlerError> {
        let item = args.path_param(0).unwrap_or("<absent>");
        Ok(Response::new(StatusCode::Ok).body(item))
    }
}

// Decodes a transfer-encoded body through the server's registry.
struct Upload {
    server: ServerHandle,
}

#[async_trait]
impl Handler for Upload {
    async fn handle(&self, args: Args<'_>) -> Result<Response, HandlerError> {
        let request = args.request().expect("request role is declared");
        let decoded = request.decoded_body(self.server.codings())?;
        Ok(Response::new(StatusCode::Ok).body(decoded.unwrap_or_default()))
    }
}

struct Fixture {
    addr: SocketAddr,
    server: Server,
    wow_hits: Arc<AtomicUsize>,
}

async fn start_server() -> Fixture {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::builder().listener(listener).build();

    let wow_hits = Arc::new(AtomicUsize::new(0));
    server.routes().map(
        "/wow",
        Method::Get,
        Some(HandlerSpec::new(
            Arc::new(EchoName {
                hits: wow_hits.clone(),
            }),
            vec![BindingRole::QueryParams],
        )),
    );
    server.routes().map(
        "/items/{}",
        Method::Get,
        Some(HandlerSpec::new(
            Arc::new(ItemEcho),
            vec![BindingRole::PathParam],
        )),
    );
    server.routes().map(
        "/upload",
        Method::Post,
        Some(HandlerSpec::new(
            Arc::new(Upload {
                server: server.handle(),
            }),
            vec![BindingRole::Request],
        )),
    );

    server.start().unwrap();
    Fixture {
        addr,
        server,
        wow_hits,
    }
}

struct Reply {
    status_line: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Reply {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn body_text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }
}

// One full exchange: write the request, read to connection close.
async fn exchange(addr: SocketAddr, request: &[u8]) -> Reply {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();

    let at = raw
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .expect("response head is terminated")
        + 4;
    let head = String::from_utf8(raw[..at - 4].to_vec()).unwrap();
    let body = raw[at..].to_vec();

    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap().to_string();
    let headers = lines
        .map(|line| {
            let (name, value) = line.split_once(": ").expect("well-formed header");
            (name.to_string(), value.to_string())
        })
        .collect();

    Reply {
        status_line,
        headers,
        body,
    }
}

#[tokio::test]
async fn echoes_a_query_parameter() {
    let fixture = start_server().await;

    let reply = exchange(fixture.addr, b"GET /wow/?name=abc HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply.status_line, "HTTP/1.1 200 OK");
    assert_eq!(reply.body_text(), "abc");
    assert_eq!(reply.header("Content-Length"), Some("3"));
    assert_eq!(reply.header("Connection"), Some("close"));
    assert_eq!(fixture.wow_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_route_is_a_structured_404() {
    let fixture = start_server().await;

    let reply = exchange(fixture.addr, b"GET /does-not-exist/ HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply.status_line, "HTTP/1.1 404 Not Found");

    let body: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(body["exception"], "HandlerNotFoundException");
    assert_eq!(
        body["message"],
        "cannot locate GET handler for /does-not-exist/"
    );
}

#[tokio::test]
async fn smuggling_signal_never_reaches_a_handler() {
    let fixture = start_server().await;

    let reply = exchange(
        fixture.addr,
        b"GET /wow/ HTTP/1.1\r\n\
          Transfer-Encoding: chunked\r\n\
          Content-Length: 5\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status_line, "HTTP/1.1 400 Bad Request");

    let body: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(body["exception"], "MalformedRequestException");
    assert!(body["message"].as_str().unwrap().contains("smuggling"));
    assert_eq!(fixture.wow_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn head_reuses_the_get_handler_without_a_body() {
    let fixture = start_server().await;

    let reply = exchange(fixture.addr, b"HEAD /wow/?name=abcdef HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply.status_line, "HTTP/1.1 200 OK");
    // accurate Content-Length, zero body bytes written
    assert_eq!(reply.header("Content-Length"), Some("6"));
    assert!(reply.body.is_empty());
    assert_eq!(fixture.wow_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn wildcard_binds_a_single_segment() {
    let fixture = start_server().await;

    let reply = exchange(fixture.addr, b"GET /items/42/ HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply.status_line, "HTTP/1.1 200 OK");
    assert_eq!(reply.body_text(), "42");

    let reply = exchange(fixture.addr, b"GET /items/42/extra/ HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply.status_line, "HTTP/1.1 404 Not Found");
}

#[tokio::test]
async fn chunked_upload_decodes_through_the_registry() {
    let fixture = start_server().await;

    let reply = exchange(
        fixture.addr,
        b"POST /upload/ HTTP/1.1\r\n\
          Transfer-Encoding: chunked\r\n\r\n\
          5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status_line, "HTTP/1.1 200 OK");
    assert_eq!(reply.body_text(), "hello world");
}

#[tokio::test]
async fn unknown_transfer_coding_is_not_implemented() {
    let fixture = start_server().await;

    let reply = exchange(
        fixture.addr,
        b"POST /upload/ HTTP/1.1\r\n\
          Transfer-Encoding: gzip\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status_line, "HTTP/1.1 501 Not Implemented");

    let body: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(
        body["exception"],
        "TransferEncodingNotImplementedException"
    );
    assert!(body["message"].as_str().unwrap().contains("gzip"));
}

#[tokio::test]
async fn unknown_verb_fails_the_connection_with_a_response() {
    let fixture = start_server().await;

    let reply = exchange(fixture.addr, b"BREW /wow/ HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply.status_line, "HTTP/1.1 400 Bad Request");

    let body: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(body["exception"], "MalformedRequestException");
}

struct Teapot;

impl FaultRecovery for Teapot {
    fn on_fault(
        &self,
        _fault: &Fault,
        _request: Option<&Request>,
        _server: &ServerHandle,
    ) -> Response {
        Response::new(StatusCode::ImATeapot).body("tea")
    }

    fn on_fatal(
        &self,
        _fatal: &FatalFault,
        _request: Option<&Request>,
        _server: &ServerHandle,
    ) -> Option<Response> {
        Some(Response::new(StatusCode::ImATeapot))
    }
}

#[tokio::test]
async fn strategy_swap_applies_to_subsequent_connections() {
    let fixture = start_server().await;

    fixture.server.set_fault_recovery(Some(Arc::new(Teapot)));
    let reply = exchange(fixture.addr, b"GET /nope/ HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply.status_line, "HTTP/1.1 418 I'm a teapot");
    assert_eq!(reply.body_text(), "tea");

    // absent restores the default strategy
    fixture.server.set_fault_recovery(None);
    let reply = exchange(fixture.addr, b"GET /nope/ HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply.status_line, "HTTP/1.1 404 Not Found");
    let body: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(body["exception"], "HandlerNotFoundException");
}

#[tokio::test]
async fn content_length_body_is_read_exactly() {
    let fixture = start_server().await;

    // POST with Content-Length is not transfer-encoded; decoded_body
    // passes the raw bytes through untouched
    let reply = exchange(
        fixture.addr,
        b"POST /upload/ HTTP/1.1\r\n\
          Content-Length: 5\r\n\r\n\
          hello",
    )
    .await;
    assert_eq!(reply.status_line, "HTTP/1.1 200 OK");
    assert_eq!(reply.body_text(), "hello");
}

struct Greeter;

#[async_trait]
impl Handler for Greeter {
    async fn handle(&self, _args: Args<'_>) -> Result<Response, HandlerError> {
        Ok(Response::new(StatusCode::Ok).body("greetings"))
    }
}

// Declares one route and maps a second one from its setup hook.
struct GreetingService;

impl forge_web::RouteOwner for GreetingService {
    fn routes(&self) -> Vec<forge_web::RouteSpec> {
        vec![forge_web::RouteSpec::new(
            Method::Get,
            "/greet",
            HandlerSpec::new(Arc::new(Greeter), Vec::new()),
        )]
    }

    fn setup(&self, routes: &forge_web::RouteConfig, _server: &ServerHandle) {
        routes.map(
            "/greet/extra",
            Method::Get,
            Some(HandlerSpec::new(Arc::new(Greeter), Vec::new())),
        );
    }
}

#[tokio::test]
async fn route_owner_registration_maps_declared_and_setup_routes() {
    let fixture = start_server().await;
    fixture.server.register(&GreetingService);

    let reply = exchange(fixture.addr, b"GET /greet/ HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply.status_line, "HTTP/1.1 200 OK");
    assert_eq!(reply.body_text(), "greetings");

    let reply = exchange(fixture.addr, b"GET /greet/extra/ HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply.status_line, "HTTP/1.1 200 OK");
}

#[tokio::test]
async fn oversized_head_is_rejected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::builder()
        .listener(listener)
        .request_limits(forge_web::limits::ReqLimits {
            head_size: 512,
            ..forge_web::limits::ReqLimits::default()
        })
        .build();
    server.start().unwrap();

    // a head that exceeds the limit before its terminating blank line
    let mut request = b"GET /wow/ HTTP/1.1\r\nX-Padding: ".to_vec();
    request.extend(std::iter::repeat(b'a').take(900));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&request).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let head = String::from_utf8_lossy(&raw);
    assert!(head.starts_with("HTTP/1.1 400 Bad Request"), "{head}");
}

#[tokio::test]
async fn body_on_a_bodyless_verb_is_rejected() {
    let fixture = start_server().await;

    let reply = exchange(
        fixture.addr,
        b"GET /wow/ HTTP/1.1\r\n\
          Content-Length: 3\r\n\r\n\
          abc",
    )
    .await;
    assert_eq!(reply.status_line, "HTTP/1.1 400 Bad Request");
    let body: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("cannot have request bodies"));
    assert_eq!(fixture.wow_hits.load(Ordering::SeqCst), 0);
}
