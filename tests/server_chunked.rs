//! Chunked transfer-encoding on both sides of a connection: decoding a
//! chunked request body, and the wire shape a chunked response emits.

use cserve::http::{parse_request, Response, TransferMode};
use cserve::wire::WireCodec;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread;

fn loopback(bytes: &'static [u8]) -> (WireCodec, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let writer = thread::spawn(move || {
        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(bytes).unwrap();
        client
    });
    let (server_side, _) = listener.accept().unwrap();
    (WireCodec::plain(server_side), writer.join().unwrap())
}

#[test]
fn decodes_a_chunked_request_body_across_several_chunks() {
    let raw = b"POST /upload HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\r\n\
5\r\nHello\r\n\
7\r\n, World\r\n\
1\r\n!\r\n\
0\r\n\r\n";
    let (mut wire, _client) = loopback(raw);
    let req = parse_request(&mut wire, "127.0.0.1".into(), 9002, false, 4096, std::env::temp_dir().as_path()).unwrap();
    assert_eq!(req.raw_body, b"Hello, World!");
}

#[test]
fn chunked_body_over_the_limit_is_rejected() {
    let raw = b"POST /upload HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\r\n\
a\r\n0123456789\r\n\
0\r\n\r\n";
    let (mut wire, _client) = loopback(raw);
    let err = parse_request(&mut wire, "127.0.0.1".into(), 9002, false, 4, std::env::temp_dir().as_path()).unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[test]
fn chunked_response_wraps_the_body_as_a_single_terminal_chunk() {
    let mut res = Response::new();
    res.mode = TransferMode::Chunked;
    res.write(b"streamed");
    let bytes = res.to_bytes();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.to_ascii_lowercase().contains("transfer-encoding: chunked"));
    assert!(text.ends_with("8\r\nstreamed\r\n0\r\n\r\n"));
}
