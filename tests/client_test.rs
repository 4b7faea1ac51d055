//! End-to-end tests for the RCON connection against a scripted UDP server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::timeout;

use bercon::packet::Packet;
use bercon::{Config, Connection, Error};
use common::{echo_responder, silent_responder, LoginMode, MockServer};

fn fast_config() -> Config {
    Config::new().deadline(Duration::from_millis(800))
}

#[tokio::test]
async fn login_success_opens_alive_connection() {
    let server = MockServer::spawn(LoginMode::Accept, echo_responder()).await;

    let conn = Connection::open_with(&server.address(), "pw", fast_config())
        .await
        .expect("open");

    assert!(conn.alive());
    conn.close().await;
    assert!(!conn.alive());
}

#[tokio::test]
async fn login_failure_is_reported() {
    let server = MockServer::spawn(LoginMode::Reject, echo_responder()).await;

    let err = Connection::open_with(&server.address(), "wrong-pw", fast_config())
        .await
        .expect_err("open must fail");

    assert!(matches!(err, Error::LoginFailed));
}

#[tokio::test]
async fn login_wrong_kind_is_not_response() {
    let server = MockServer::spawn(LoginMode::WrongKind, echo_responder()).await;

    let err = Connection::open_with(&server.address(), "pw", fast_config())
        .await
        .expect_err("open must fail");

    assert!(matches!(err, Error::NotResponse));
}

#[tokio::test]
async fn login_timeout_after_attempts() {
    let server = MockServer::spawn(LoginMode::Ignore, echo_responder()).await;

    let config = Config::new()
        .deadline(Duration::from_millis(200))
        .login_attempts(2);

    let start = tokio::time::Instant::now();
    let err = Connection::open_with(&server.address(), "pw", config)
        .await
        .expect_err("open must time out");

    assert!(matches!(err, Error::Timeout));
    // Two attempts, each bounded by the deadline.
    assert!(start.elapsed() >= Duration::from_millis(400));

    let logins = server
        .wait_for(|pkts| {
            pkts.iter()
                .filter(|p| p.kind == bercon::packet::PacketKind::Login)
                .count()
                >= 2
        })
        .await;
    assert!(logins, "both login attempts must reach the server");
}

#[tokio::test]
async fn single_page_command_roundtrip() {
    let body = "Players on server:\n(0 players in total)";
    let server = MockServer::spawn(
        LoginMode::Accept,
        Box::new(move |pkt| vec![Packet::command(pkt.seq, Bytes::from(body))]),
    )
    .await;

    let conn = Connection::open_with(&server.address(), "pw", fast_config())
        .await
        .expect("open");

    let reply = conn.send("players").await.expect("send");
    assert_eq!(reply, Bytes::from(body));

    conn.close().await;
}

#[tokio::test]
async fn multipart_reply_is_reassembled_in_order() {
    let server = MockServer::spawn(
        LoginMode::Accept,
        Box::new(|pkt| {
            vec![
                Packet::command_page(pkt.seq, 2, 0, Bytes::from_static(b"AAA")),
                Packet::command_page(pkt.seq, 2, 1, Bytes::from_static(b"BBB")),
            ]
        }),
    )
    .await;

    let conn = Connection::open_with(&server.address(), "pw", fast_config())
        .await
        .expect("open");

    let reply = conn.send("bans").await.expect("send");
    assert_eq!(reply, Bytes::from_static(b"AAABBB"));

    conn.close().await;
}

#[tokio::test]
async fn out_of_order_page_fails_but_connection_survives() {
    // First command gets a gapped multipart reply, later ones are echoed.
    let mut first = true;
    let server = MockServer::spawn(
        LoginMode::Accept,
        Box::new(move |pkt| {
            if first {
                first = false;
                vec![
                    Packet::command_page(pkt.seq, 3, 0, Bytes::from_static(b"AAA")),
                    Packet::command_page(pkt.seq, 3, 2, Bytes::from_static(b"CCC")),
                ]
            } else {
                vec![Packet::command(pkt.seq, pkt.body.clone())]
            }
        }),
    )
    .await;

    let conn = Connection::open_with(&server.address(), "pw", fast_config())
        .await
        .expect("open");

    let err = conn.send("bans").await.expect_err("gap must fail");
    assert!(matches!(err, Error::BadSequence));

    // The connection keeps serving.
    let reply = conn.send("players").await.expect("send after gap");
    assert_eq!(reply, Bytes::from_static(b"players"));

    conn.close().await;
}

#[tokio::test]
async fn server_message_is_surfaced_and_acked() {
    let server = MockServer::spawn(LoginMode::Accept, echo_responder()).await;

    let conn = Connection::open_with(&server.address(), "pw", fast_config())
        .await
        .expect("open");
    let mut events = conn.events().expect("events receiver");
    assert!(conn.events().is_none(), "receiver can be taken only once");

    server.push(Packet::message(7, Bytes::from_static(b"hello")));

    let event = timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("event within deadline")
        .expect("event present");
    assert_eq!(event.seq, 7);
    assert_eq!(event.body, Bytes::from_static(b"hello"));

    // Exactly one empty-body Message ack with the same seq hits the wire.
    let acked = server
        .wait_for(|pkts| {
            pkts.iter().any(|p| {
                p.kind == bercon::packet::PacketKind::Message && p.seq == 7 && p.body.is_empty()
            })
        })
        .await;
    assert!(acked, "ack must reach the server");

    conn.close().await;

    // Close drains the tasks and closes the events channel.
    let end = timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("channel close within deadline");
    assert!(end.is_none());
}

#[tokio::test]
async fn keepalive_sends_empty_commands_while_idle() {
    let server = MockServer::spawn(LoginMode::Accept, echo_responder()).await;

    let config = fast_config()
        .keepalive(Duration::from_secs(1))
        .start_keepalive(true);

    let conn = Connection::open_with(&server.address(), "pw", config)
        .await
        .expect("open");

    let enough = server
        .wait_for(|pkts| {
            pkts.iter()
                .filter(|p| {
                    p.kind == bercon::packet::PacketKind::Command && p.body.is_empty()
                })
                .count()
                >= 2
        })
        .await;
    assert!(enough, "at least two keepalives within the wait window");

    // Keepalive echoes come back with no waiter registered; they must be
    // dropped without breaking the session.
    let reply = conn.send("players").await.expect("send");
    assert_eq!(reply, Bytes::from_static(b"players"));

    conn.close().await;
}

#[tokio::test]
async fn send_times_out_within_deadline() {
    let server = MockServer::spawn(LoginMode::Accept, silent_responder()).await;

    let conn = Connection::open_with(
        &server.address(),
        "pw",
        Config::new().deadline(Duration::from_millis(300)),
    )
    .await
    .expect("open");

    let start = tokio::time::Instant::now();
    let err = conn.send("players").await.expect_err("must time out");

    assert!(matches!(err, Error::Timeout));
    assert!(start.elapsed() < Duration::from_secs(2), "bounded by deadline");

    conn.close().await;
}

#[tokio::test]
async fn send_after_close_is_connection_down() {
    let server = MockServer::spawn(LoginMode::Accept, echo_responder()).await;

    let conn = Connection::open_with(&server.address(), "pw", fast_config())
        .await
        .expect("open");

    conn.close().await;
    // Idempotent: a second close is a no-op.
    conn.close().await;

    let err = conn.send("players").await.expect_err("closed");
    assert!(matches!(err, Error::ConnectionDown));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_senders_get_their_own_replies() {
    let server = MockServer::spawn(LoginMode::Accept, echo_responder()).await;

    let conn = Arc::new(
        Connection::open_with(&server.address(), "pw", Config::new())
            .await
            .expect("open"),
    );

    let mut workers = Vec::new();
    for worker in 0..8 {
        let conn = conn.clone();
        workers.push(tokio::spawn(async move {
            for i in 0..10 {
                let command = format!("cmd-{worker}-{i}");
                let reply = conn.send(&command).await.expect("send");
                assert_eq!(reply, Bytes::from(command));
            }
        }));
    }

    for worker in workers {
        worker.await.expect("worker");
    }

    conn.close().await;
}

#[tokio::test]
async fn sequence_ring_wraps_past_256() {
    let server = MockServer::spawn(LoginMode::Accept, echo_responder()).await;

    let conn = Connection::open_with(&server.address(), "pw", Config::new())
        .await
        .expect("open");

    for i in 0..300u32 {
        let command = format!("tick-{i}");
        let reply = conn.send(&command).await.expect("send");
        assert_eq!(reply, Bytes::from(command));
    }

    conn.close().await;
}

#[tokio::test]
async fn duplicate_reply_is_dropped_silently() {
    let server = MockServer::spawn(
        LoginMode::Accept,
        Box::new(|pkt| {
            // The same single-page reply twice: the second has no waiter.
            vec![
                Packet::command(pkt.seq, pkt.body.clone()),
                Packet::command(pkt.seq, pkt.body.clone()),
            ]
        }),
    )
    .await;

    let conn = Connection::open_with(&server.address(), "pw", fast_config())
        .await
        .expect("open");

    assert_eq!(conn.send("a").await.expect("first"), Bytes::from_static(b"a"));
    assert_eq!(conn.send("b").await.expect("second"), Bytes::from_static(b"b"));

    conn.close().await;
}

#[tokio::test]
async fn malformed_datagrams_are_counted_not_fatal() {
    let server = MockServer::spawn(LoginMode::Accept, echo_responder()).await;

    let conn = Connection::open_with(&server.address(), "pw", fast_config())
        .await
        .expect("open");

    server.push_raw(b"garbage");
    server.push_raw(b"BE\x00\x00\x00\x00\xFF\x09"); // unknown kind, bad CRC

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while conn.malformed_packets() < 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(conn.malformed_packets() >= 2);

    let reply = conn.send("still-works").await.expect("send");
    assert_eq!(reply, Bytes::from_static(b"still-works"));

    conn.close().await;
}

#[tokio::test]
async fn command_too_long_rejected_before_write() {
    let server = MockServer::spawn(LoginMode::Accept, echo_responder()).await;

    let conn = Connection::open_with(&server.address(), "pw", fast_config())
        .await
        .expect("open");

    let oversize = "x".repeat(bercon::packet::MAX_COMMAND_BODY + 1);
    let err = conn.send(&oversize).await.expect_err("too long");
    assert!(matches!(err, Error::CommandTooLong));

    // Nothing but the login reached the server.
    let pkts = server.received();
    assert!(pkts
        .iter()
        .all(|p| p.kind != bercon::packet::PacketKind::Command));

    conn.close().await;
}
