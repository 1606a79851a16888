//! Exercises `Dispatcher::dispatch` against real loopback-backed
//! `Connection`s rather than calling the private `find` directly, so the
//! 404-fallback and handler-invocation paths are covered too.

use cserve::connection::Connection;
use cserve::dispatcher::Dispatcher;
use cserve::http::{parse_request, Method};
use cserve::wire::WireCodec;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

fn connection_for(raw: &'static [u8]) -> Connection {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(raw).unwrap();
        client
    });
    let (server_side, _) = listener.accept().unwrap();
    let mut wire = WireCodec::plain(server_side);
    let request = parse_request(&mut wire, "127.0.0.1".into(), 9001, false, 4096, std::env::temp_dir().as_path()).unwrap();
    Connection::new(wire, request, Duration::from_secs(5))
}

#[test]
fn dispatches_to_the_longest_matching_prefix() {
    let mut dispatcher = Dispatcher::new();
    dispatcher.add_route(Method::Get, "/", Box::new(|c| {
        c.set_status(1, None);
        Ok(())
    }));
    dispatcher.add_route(Method::Get, "/api", Box::new(|c| {
        c.set_status(2, None);
        Ok(())
    }));
    dispatcher.lock();

    let mut conn = connection_for(b"GET /api/widgets HTTP/1.1\r\nHost: localhost\r\n\r\n");
    dispatcher.dispatch(&mut conn).unwrap();
    assert_eq!(conn.response.status_code, 2);
}

#[test]
fn falls_back_to_a_404_when_no_route_matches() {
    let mut dispatcher = Dispatcher::new();
    dispatcher.add_route(Method::Get, "/known", Box::new(|c| {
        c.set_status(200, None);
        Ok(())
    }));
    dispatcher.lock();

    let mut conn = connection_for(b"GET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n");
    dispatcher.dispatch(&mut conn).unwrap();
    assert_eq!(conn.response.status_code, 404);
}

#[test]
fn method_mismatch_on_the_same_path_falls_through_to_404() {
    let mut dispatcher = Dispatcher::new();
    dispatcher.add_route(Method::Post, "/submit", Box::new(|c| {
        c.set_status(200, None);
        Ok(())
    }));
    dispatcher.lock();

    let mut conn = connection_for(b"GET /submit HTTP/1.1\r\nHost: localhost\r\n\r\n");
    dispatcher.dispatch(&mut conn).unwrap();
    assert_eq!(conn.response.status_code, 404);
}

#[test]
fn first_registered_route_wins_an_equal_length_tie() {
    let mut dispatcher = Dispatcher::new();
    dispatcher.add_route(Method::Get, "/a", Box::new(|c| {
        c.set_status(10, None);
        Ok(())
    }));
    dispatcher.add_route(Method::Get, "/a", Box::new(|c| {
        c.set_status(20, None);
        Ok(())
    }));
    dispatcher.lock();

    let mut conn = connection_for(b"GET /a HTTP/1.1\r\nHost: localhost\r\n\r\n");
    dispatcher.dispatch(&mut conn).unwrap();
    assert_eq!(conn.response.status_code, 10);
}
