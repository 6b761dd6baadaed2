use std::io::{Read as _, Write as _};
use std::net::TcpStream;
use std::time::Duration;

use libiot_ingest::network::application::http::Client;
use libiot_ingest::network::error::Error;
use libiot_ingest::network::{Close, Connection, Read, Transport, Write};
use libiot_ingest::wire::{
    BufferPolicy, Method, RandomSource, RequestHead, USER_AGENT, WireRequest, content_type,
};

use super::MockConnection;

fn post_head() -> RequestHead {
    let mut head = RequestHead::new(Method::Post, "/iot/api/v2/messages", None).unwrap();
    head.add_header("Host", "iot.example.com").unwrap();
    head
}

#[test]
fn test_exchange_writes_request_and_parses_length_body() {
    let conn = MockConnection::replying(
        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 11\r\n\r\n{\"ok\":true}",
    );
    let mut client = Client::new(conn);

    let response = client.exchange(&post_head(), b"hello").unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.payload(), b"{\"ok\":true}");
    assert_eq!(response.content_length(), Ok(Some(11)));
    assert_eq!(
        response.header("Content-Type"),
        Ok(Some(" application/json"))
    );

    let expected = format!(
        "POST /iot/api/v2/messages HTTP/1.1\r\nUser-Agent: {USER_AGENT}\r\nHost: iot.example.com\r\nContent-Length: 5\r\n\r\nhello"
    );
    assert_eq!(client.connection().written_text(), expected);
}

#[test]
fn test_get_without_body_has_no_content_length() {
    let conn = MockConnection::replying(b"HTTP/1.1 204 No Content\r\n\r\n");
    let mut client = Client::new(conn);
    let head = RequestHead::new(Method::Get, "/status", Some("agent/2")).unwrap();

    let response = client.exchange(&head, &[]).unwrap();

    assert_eq!(response.status(), 204);
    assert!(response.payload().is_empty());
    let written = client.connection().written_text();
    assert!(written.starts_with("GET /status HTTP/1.1\r\n"));
    assert!(written.contains(&format!("User-Agent: {USER_AGENT} agent/2\r\n")));
    assert!(!written.contains("Content-Length"));
    assert!(written.ends_with("\r\n\r\n"));
}

#[test]
fn test_chunked_response_is_reassembled() {
    let conn = MockConnection::replying(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5;ext=1\r\npedia\r\n0\r\nX-Trailer: 1\r\n\r\n",
    );
    let mut client = Client::new(conn);

    let response = client.exchange(&post_head(), b"x").unwrap();

    assert_eq!(response.payload(), b"Wikipedia");
    assert_eq!(response.header("Transfer-Encoding"), Ok(Some(" chunked")));
}

#[test]
fn test_body_without_length_reads_until_close() {
    let conn = MockConnection::replying(b"HTTP/1.0 500 Internal Server Error\r\n\r\ndown for maintenance");
    let mut client = Client::new(conn);

    let response = client.exchange(&post_head(), b"x").unwrap();

    assert_eq!(response.status(), 500);
    assert_eq!(response.payload(), b"down for maintenance");
}

#[test]
fn test_response_split_across_small_reads() {
    let conn = MockConnection::replying(
        b"HTTP/1.1 401 Unauthorized\r\nServer-Time: 1700000000\r\nContent-Length: 12\r\n\r\ntoken stale!",
    )
    .with_max_read(3);
    let mut client = Client::new(conn);

    let response = client.exchange(&post_head(), b"x").unwrap();

    assert_eq!(response.status(), 401);
    assert_eq!(response.server_time(), Ok(Some(1_700_000_000)));
    assert_eq!(response.payload(), b"token stale!");
}

#[test]
fn test_chunked_response_split_across_single_byte_reads() {
    let conn = MockConnection::replying(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n0\r\n\r\n",
    )
    .with_max_read(1);
    let mut client = Client::new(conn);

    let response = client.exchange(&post_head(), b"x").unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.payload(), b"Wiki");
}

#[test]
fn test_chunk_without_trailing_crlf() {
    let conn = MockConnection::replying(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWikipedia\r\n0\r\n\r\n",
    );
    let mut client = Client::new(conn);

    assert_eq!(
        client.exchange(&post_head(), b"x").unwrap_err(),
        Error::ProtocolError
    );
}

#[test]
fn test_header_lines_are_stored_raw() {
    let conn = MockConnection::replying(
        b"HTTP/1.1 200 OK\r\nETag:   \"abc\"\r\nContent-Length: 0\r\n\r\n",
    );
    let mut client = Client::new(conn);

    let response = client.exchange(&post_head(), b"").unwrap();

    let lines: Vec<&str> = response.headers().iter().map(|line| line.as_str()).collect();
    assert_eq!(lines, ["ETag:   \"abc\"", "Content-Length: 0"]);
    assert_eq!(response.header("etag"), Ok(Some("   \"abc\"")));
}

#[test]
fn test_chunked_request_framing() {
    let conn = MockConnection::replying(b"HTTP/1.1 202 Accepted\r\nContent-Length: 0\r\n\r\n");
    let mut client = Client::new(conn);

    client.begin_chunked(&post_head()).unwrap();
    client.send_chunk(b"hello").unwrap();
    client.send_chunk(b"").unwrap();
    client.send_chunk(&[b'z'; 26]).unwrap();
    let response = client.finish_chunked().unwrap();

    assert_eq!(response.status(), 202);
    let expected = format!(
        "POST /iot/api/v2/messages HTTP/1.1\r\nUser-Agent: {USER_AGENT}\r\nHost: iot.example.com\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n1a\r\nzzzzzzzzzzzzzzzzzzzzzzzzzz\r\n0\r\n\r\n"
    );
    assert_eq!(client.connection().written_text(), expected);
}

#[test]
fn test_chunk_calls_out_of_order() {
    let mut client = Client::new(MockConnection::replying(b""));

    assert_eq!(client.send_chunk(b"x"), Err(Error::NotOpen));
    assert_eq!(client.finish_chunked().unwrap_err(), Error::NotOpen);

    client.begin_chunked(&post_head()).unwrap();
    assert_eq!(client.begin_chunked(&post_head()), Err(Error::ProtocolError));
    assert_eq!(
        client.exchange(&post_head(), b"x").unwrap_err(),
        Error::ProtocolError
    );
}

#[test]
fn test_malformed_status_line() {
    let mut client = Client::new(MockConnection::replying(b"SMTP ready\r\n\r\n"));
    assert_eq!(
        client.exchange(&post_head(), b"x").unwrap_err(),
        Error::ProtocolError
    );

    let mut client = Client::new(MockConnection::replying(b"HTTP/1.1 abc OK\r\n\r\n"));
    assert_eq!(
        client.exchange(&post_head(), b"x").unwrap_err(),
        Error::ProtocolError
    );
}

#[test]
fn test_header_line_without_colon() {
    let mut client = Client::new(MockConnection::replying(
        b"HTTP/1.1 200 OK\r\nnot a header\r\n\r\n",
    ));
    assert_eq!(
        client.exchange(&post_head(), b"x").unwrap_err(),
        Error::ProtocolError
    );
}

#[test]
fn test_peer_closes_early() {
    let mut client = Client::new(MockConnection::replying(b"HTTP/1.1 200 OK\r\nContent-"));
    assert_eq!(
        client.exchange(&post_head(), b"x").unwrap_err(),
        Error::ConnectionClosed
    );

    let mut client = Client::new(MockConnection::replying(
        b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort",
    ));
    assert_eq!(
        client.exchange(&post_head(), b"x").unwrap_err(),
        Error::ConnectionClosed
    );
}

#[test]
fn test_timeout_is_recorded() {
    let mut client = Client::new(MockConnection::replying(b""));
    assert_eq!(client.timeout_seconds(), 0);
    client.set_timeout(30);
    assert_eq!(client.timeout_seconds(), 30);
}

// --- Live tests against a real HTTP server ---

/// A connection over a plain TCP socket.
struct NetConnection {
    stream: TcpStream,
}

impl NetConnection {
    fn new(address: &str) -> Result<Self, Error> {
        let stream = TcpStream::connect(address).map_err(|_| Error::ConnectionRefused)?;
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .map_err(|_| Error::InvalidAddress)?;
        Ok(Self { stream })
    }
}

impl Read for NetConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.stream.read(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => Error::Timeout,
            _ => Error::ReadError,
        })
    }
}

impl Write for NetConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.stream.write(buf).map_err(|_| Error::WriteError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.stream.flush().map_err(|_| Error::WriteError)
    }
}

impl Close for NetConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for NetConnection {}

struct OsRandom(rand::rngs::ThreadRng);

impl RandomSource for OsRandom {
    type Error = ();

    fn next_u32(&mut self) -> Result<u32, ()> {
        Ok(rand::Rng::r#gen(&mut self.0))
    }
}

fn test_address() -> (String, String) {
    dotenvy::dotenv().ok();
    let address =
        std::env::var("TEST_HTTP_ADDRESS").unwrap_or_else(|_| "httpbin.org:80".to_string());
    let host = address.split(':').next().unwrap_or("httpbin.org").to_string();
    (address, host)
}

#[test]
#[ignore = "requires network access"]
fn test_live_get() {
    let (address, host) = test_address();
    let mut client = Client::new(NetConnection::new(&address).unwrap());

    let mut head = RequestHead::new(Method::Get, "/get", None).unwrap();
    head.add_header("Host", &host).unwrap();
    head.add_header("Connection", "close").unwrap();

    let response = client.exchange(&head, &[]).unwrap();
    assert_eq!(response.status(), 200);
    assert!(!response.payload().is_empty());
}

#[test]
#[ignore = "requires network access"]
fn test_live_multipart_post() {
    let (address, host) = test_address();
    let mut client = Client::new(NetConnection::new(&address).unwrap());

    let head = RequestHead::new(Method::Post, "/post", Some("live-test")).unwrap();
    let mut request =
        WireRequest::new(head, BufferPolicy::resizable(16 * 1024), OsRandom(rand::thread_rng()))
            .unwrap();
    request.add_header("Host", &host).unwrap();
    request.add_header("Connection", "close").unwrap();
    request
        .add_header("Content-Type", content_type::MULTIPART_MIXED)
        .unwrap();
    request
        .add_single(content_type::JSON, "m1", br#"{"temp":21.5}"#)
        .unwrap();
    request.finalize().unwrap();

    let response = client.exchange(request.head(), request.body()).unwrap();
    assert_eq!(response.status(), 200);
}
