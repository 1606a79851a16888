//! End-to-end request parsing over a real loopback socket: `WireCodec` only
//! wraps a `TcpStream`, so these drive `parse_request` the way a worker
//! thread actually would rather than poking at a parser struct directly.

use cserve::http::{parse_request, Method};
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
fn parses_a_simple_get_request() {
    let (mut wire, _client) = loopback(b"GET /index.html?a=1 HTTP/1.1\r\nHost: localhost\r\n\r\n");
    let req = parse_request(&mut wire, "127.0.0.1".into(), 9000, false, 1024, std::env::temp_dir().as_path()).unwrap();
    assert_eq!(req.method, Method::Get);
    assert_eq!(req.path, "/index.html");
    assert_eq!(req.host, "localhost");
    assert_eq!(req.query.get("a").map(String::as_str), Some("1"));
}

#[test]
fn parses_a_post_with_fixed_length_body() {
    let (mut wire, _client) = loopback(b"POST /api HTTP/1.1\r\nHost: localhost\r\nContent-Length: 13\r\n\r\nHello, World!");
    let req = parse_request(&mut wire, "127.0.0.1".into(), 9000, false, 1024, std::env::temp_dir().as_path()).unwrap();
    assert_eq!(req.method, Method::Post);
    assert_eq!(req.raw_body, b"Hello, World!");
}

#[test]
fn parses_url_encoded_form_body_into_post_params() {
    let body = b"name=ferris&lang=rust";
    let raw: Vec<u8> = [
        b"POST /submit HTTP/1.1\r\nHost: localhost\r\n".as_slice(),
        format!("Content-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n", body.len()).as_bytes(),
        body.as_slice(),
    ]
    .concat();
    let raw: &'static [u8] = Box::leak(raw.into_boxed_slice());
    let (mut wire, _client) = loopback(raw);
    let req = parse_request(&mut wire, "127.0.0.1".into(), 9000, false, 1024, std::env::temp_dir().as_path()).unwrap();
    assert_eq!(req.post_params.get("name").map(String::as_str), Some("ferris"));
    assert_eq!(req.params().get("lang").map(String::as_str), Some("rust"));
}

#[test]
fn rejects_a_body_over_the_configured_limit() {
    let (mut wire, _client) = loopback(b"POST /big HTTP/1.1\r\nHost: localhost\r\nContent-Length: 100\r\n\r\n");
    let err = parse_request(&mut wire, "127.0.0.1".into(), 9000, false, 10, std::env::temp_dir().as_path()).unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[test]
fn parses_cookies_off_the_cookie_header() {
    let (mut wire, _client) = loopback(b"GET / HTTP/1.1\r\nHost: localhost\r\nCookie: session=abc123; theme=dark\r\n\r\n");
    let req = parse_request(&mut wire, "127.0.0.1".into(), 9000, false, 1024, std::env::temp_dir().as_path()).unwrap();
    assert_eq!(req.cookies.get("session").map(String::as_str), Some("abc123"));
    assert_eq!(req.cookies.get("theme").map(String::as_str), Some("dark"));
}
