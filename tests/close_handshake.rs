//! Closing handshake and connection teardown.

mod harness;

use std::time::{Duration, Instant};

use harness::{Event, connected_pair, decode_from, encode_as};
use wsengine::{
    CloseCode, Config, ConnectionState, Error, ErrorKind, Frame, OpCode, Pump, Role, Timeouts,
};

#[test]
fn test_client_initiated_close() {
    let (mut client, mut server) = connected_pair(Config::client(), Config::server());

    client.conn.close(CloseCode::Normal, "bye").unwrap();
    assert_eq!(client.conn.state(), ConnectionState::Closing);

    server.receive_from(&client);
    assert_eq!(server.conn.state(), ConnectionState::Closed);
    assert_eq!(server.log.closes(), [(1000, "bye".to_string())]);

    client.receive_from(&server);
    assert_eq!(client.conn.state(), ConnectionState::Closed);
    assert_eq!(client.log.closes(), [(1000, String::new())]);

    // Nothing more is produced once both sides are closed.
    client.receive_from(&server);
    server.receive_from(&client);
    assert_eq!(client.log.closes().len(), 1);
    assert_eq!(server.log.closes().len(), 1);
    assert!(client.log.error_kinds().is_empty());
    assert!(server.log.error_kinds().is_empty());
}

#[test]
fn test_server_initiated_close() {
    let (mut client, mut server) = connected_pair(Config::client(), Config::server());

    server.conn.close(CloseCode::GoingAway, "restart").unwrap();
    client.receive_from(&server);
    server.receive_from(&client);

    assert_eq!(client.log.closes(), [(1001, "restart".to_string())]);
    assert_eq!(server.log.closes(), [(1001, String::new())]);
    assert_eq!(client.conn.state(), ConnectionState::Closed);
    assert_eq!(server.conn.state(), ConnectionState::Closed);
}

#[test]
fn test_simultaneous_close() {
    let (mut client, mut server) = connected_pair(Config::client(), Config::server());

    client.conn.close(CloseCode::Normal, "a").unwrap();
    server.conn.close(CloseCode::Normal, "b").unwrap();
    client.receive_from(&server);
    server.receive_from(&client);

    assert_eq!(client.log.closes(), [(1000, "b".to_string())]);
    assert_eq!(server.log.closes(), [(1000, "a".to_string())]);
    assert!(client.wire.take().is_empty());
    assert!(server.wire.take().is_empty());
}

#[test]
fn test_data_delivered_while_closing() {
    let (mut client, mut server) = connected_pair(Config::client(), Config::server());

    client.conn.close(CloseCode::Normal, "").unwrap();
    server.conn.send_text("in flight").unwrap();
    client.receive_from(&server);

    assert_eq!(client.conn.state(), ConnectionState::Closing);
    assert_eq!(client.log.messages(), [Event::Text("in flight".into())]);
}

#[test]
fn test_ping_not_answered_while_closing() {
    let (mut client, server) = connected_pair(Config::client(), Config::server());

    client.conn.close(CloseCode::Normal, "").unwrap();
    client.wire.take();
    client.feed(&encode_as(Role::Server, &[Frame::ping(b"late".to_vec())]));

    assert!(client.wire.take().is_empty());
    assert_eq!(client.conn.stats().pings_received, 1);
    drop(server);
}

#[test]
fn test_close_without_status_code() {
    let (_client, mut server) = connected_pair(Config::client(), Config::server());

    server.feed(&encode_as(Role::Client, &[Frame::close(None, "")]));
    assert_eq!(server.log.closes(), [(1005, String::new())]);

    let echo = decode_from(Role::Server, &server.wire.take());
    assert_eq!(echo.len(), 1);
    assert_eq!(echo[0].opcode, OpCode::Close);
    assert!(echo[0].payload().is_empty());
}

#[test]
fn test_invalid_close_code_is_protocol_error() {
    let (_client, mut server) = connected_pair(Config::client(), Config::server());

    server.feed(&encode_as(Role::Client, &[Frame::close(Some(1005), "")]));
    assert_eq!(server.conn.state(), ConnectionState::Closed);
    assert_eq!(server.log.error_kinds(), [ErrorKind::ProtocolViolation]);
    assert_eq!(server.log.closes()[0].0, 1002);

    let sent = decode_from(Role::Server, &server.wire.take());
    assert_eq!(sent[0].payload()[..2], 1002u16.to_be_bytes());
}

#[test]
fn test_close_reason_must_be_utf8() {
    let (_client, mut server) = connected_pair(Config::client(), Config::server());

    let mut payload = 1000u16.to_be_bytes().to_vec();
    payload.extend_from_slice(&[0xED, 0xA0, 0x80]);
    server.feed(&encode_as(Role::Client, &[Frame::new(true, OpCode::Close, payload)]));

    assert_eq!(server.log.closes()[0].0, 1007);
}

#[test]
fn test_end_of_stream_reports_abnormal_closure() {
    let (mut client, _server) = connected_pair(Config::client(), Config::server());

    let mut eof: &[u8] = &[];
    let step = client.conn.pump(&mut eof, &mut client.log).unwrap();
    assert_eq!(step, Pump::Closed);
    assert_eq!(
        client.log.closes(),
        [(1006, "Connection closed by peer".to_string())]
    );
    assert!(client.log.error_kinds().is_empty());
}

#[test]
fn test_run_until_peer_closes() {
    let (mut client, mut server) = connected_pair(Config::client(), Config::server());

    server.conn.send_text("one").unwrap();
    server.conn.send_text("two").unwrap();
    server.conn.close(CloseCode::Normal, "done").unwrap();

    let inbound = server.wire.take();
    let mut reader: &[u8] = &inbound;
    client.conn.run(&mut reader, &mut client.log).unwrap();

    assert_eq!(
        client.log.events[1..],
        [
            Event::Text("one".into()),
            Event::Text("two".into()),
            Event::Close(1000, "done".into()),
        ]
    );
    assert_eq!(client.conn.state(), ConnectionState::Closed);

    server.receive_from(&client);
    assert_eq!(server.conn.state(), ConnectionState::Closed);
}

#[test]
fn test_close_grace_period() {
    let timeouts = Timeouts::new(Duration::from_secs(30), Duration::from_millis(200));
    let (mut client, _server) =
        connected_pair(Config::client().with_timeouts(timeouts), Config::server());

    client.conn.close(CloseCode::Normal, "").unwrap();
    let start = Instant::now();
    assert!(!client.conn.check_close_timeout(start, &mut client.log));
    assert!(client
        .conn
        .check_close_timeout(start + Duration::from_secs(1), &mut client.log));

    assert_eq!(client.conn.state(), ConnectionState::Closed);
    assert_eq!(client.log.closes()[0].0, 1006);
}

#[test]
fn test_abort_from_transport_layer() {
    let (mut client, _server) = connected_pair(Config::client(), Config::server());

    client
        .conn
        .abort(Error::CertValidation("expired".into()), &mut client.log);
    assert_eq!(client.conn.state(), ConnectionState::Closed);
    assert_eq!(client.log.error_kinds(), [ErrorKind::CertValidationFailed]);
    assert_eq!(client.log.closes()[0].0, 1006);
    assert!(client.wire.take().is_empty());
}

#[test]
fn test_after_close_operations() {
    let (mut client, mut server) = connected_pair(Config::client(), Config::server());
    client.conn.close(CloseCode::Normal, "").unwrap();
    server.receive_from(&client);
    client.receive_from(&server);

    assert_eq!(
        client.conn.send_text("x"),
        Err(Error::InvalidState(ConnectionState::Closed))
    );
    assert!(client.conn.ping(Vec::new()).is_err());
    assert!(client.conn.close(CloseCode::Normal, "again").is_ok());
    assert!(client.wire.take().is_empty());
}

#[test]
fn test_close_argument_checks() {
    let (client, _server) = connected_pair(Config::client(), Config::server());
    assert!(matches!(
        client.conn.close(CloseCode::Normal, &"r".repeat(124)),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        client.conn.close(CloseCode::NoStatusReceived, ""),
        Err(Error::InvalidParameter(_))
    ));
    assert!(client.conn.is_open());
}
