#![allow(missing_docs)]

//! End-to-end scenarios over real TCP connections: lobby placement,
//! countdown/activation, scoring, and every timeout policy. Durations come
//! from the (fully configurable) server config, shortened so the suite runs
//! in seconds.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use wordrush_core::config::Config;
use wordrush_core::protocol::{EventData, EventKind, ServerEvent};
use wordrush_core::words::WordPool;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Defaults shrunk for test speed; individual tests override further.
fn fast_config() -> Config {
    Config {
        words_per_race: 3,
        countdown_start: 2,
        countdown_tick_ms: 50,
        poll_interval_ms: 5,
        ..Config::default()
    }
}

async fn start_server(config: Config, words: &[&str]) -> SocketAddr {
    config.validate().expect("test config must be valid");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let pool = Arc::new(WordPool::new(words.iter().map(|w| (*w).to_string()).collect()));
    drop(tokio::spawn(wordrush_server::serve_on(
        listener,
        Arc::new(config),
        pool,
    )));
    addr
}

struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    async fn send(&mut self, raw: &str) {
        self.writer.write_all(raw.as_bytes()).await.expect("write");
        self.writer.write_all(b"\n").await.expect("write newline");
    }

    async fn hello(&mut self, uuid: &str, name: &str) {
        self.send(&format!(r#"{{"uuid":"{uuid}","name":"{name}"}}"#))
            .await;
    }

    async fn word(&mut self, word: &str) {
        self.send(&format!(r#"{{"word":"{word}"}}"#)).await;
    }

    async fn next_event(&mut self) -> ServerEvent {
        let line = timeout(EVENT_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for an event")
            .expect("read failed")
            .expect("connection closed while waiting for an event");
        serde_json::from_str(&line).expect("server sent invalid event json")
    }

    async fn expect_kind(&mut self, kind: EventKind) -> ServerEvent {
        let event = self.next_event().await;
        assert_eq!(event.kind, kind, "unexpected event: {event:?}");
        event
    }

    /// Skip events until one of the given kind arrives.
    async fn next_event_of(&mut self, kind: EventKind) -> ServerEvent {
        loop {
            let event = self.next_event().await;
            if event.kind == kind {
                return event;
            }
        }
    }

    /// Assert the server closes this connection (ignoring trailing events).
    async fn expect_closed(&mut self) {
        loop {
            match timeout(EVENT_TIMEOUT, self.lines.next_line()).await {
                Ok(Ok(None)) | Ok(Err(_)) => return,
                Ok(Ok(Some(_))) => {}
                Err(_) => panic!("server did not close the connection"),
            }
        }
    }

    /// Assert nothing arrives for `window`.
    async fn expect_quiet(&mut self, window: Duration) {
        if let Ok(read) = timeout(window, self.lines.next_line()).await {
            let line = read.expect("read failed");
            panic!("expected silence, got {line:?}");
        }
    }
}

// ── handshake ────────────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_handshake_gets_error_and_close() {
    let addr = start_server(fast_config(), &["alpha"]).await;
    let mut client = TestClient::connect(addr).await;
    client.send("this is not json").await;
    let event = client.expect_kind(EventKind::Error).await;
    assert!(event.message.is_some());
    client.expect_closed().await;
}

#[tokio::test]
async fn oversize_name_is_rejected() {
    let addr = start_server(fast_config(), &["alpha"]).await;
    let mut client = TestClient::connect(addr).await;
    client
        .hello("id-1", &"x".repeat(16)) // default max_name_len = 15
        .await;
    let _ = client.expect_kind(EventKind::Error).await;
    client.expect_closed().await;
}

// ── lobby, countdown, activation ─────────────────────────────────────────

#[tokio::test]
async fn second_join_triggers_countdown_then_identical_words() {
    let addr = start_server(fast_config(), &["alpha"]).await;

    let mut ada = TestClient::connect(addr).await;
    ada.hello("id-a", "ada").await;
    let lobby = ada.expect_kind(EventKind::Lobby).await;
    assert_eq!(lobby.player.as_deref(), Some("ada"));

    let mut bob = TestClient::connect(addr).await;
    bob.hello("id-b", "bob").await;
    let _ = bob.expect_kind(EventKind::Lobby).await;

    let expected_words = vec!["alpha".to_string(); 3];
    for client in [&mut ada, &mut bob] {
        for remaining in [2_u32, 1] {
            let tick = client.expect_kind(EventKind::Countdown).await;
            assert_eq!(tick.data, Some(EventData::Value { value: remaining }));
        }
        let words = client.expect_kind(EventKind::Words).await;
        assert_eq!(
            words.data,
            Some(EventData::Words {
                words: expected_words.clone()
            })
        );
    }
}

#[tokio::test]
async fn third_client_joining_mid_countdown_receives_words() {
    let config = Config {
        countdown_start: 3,
        countdown_tick_ms: 100,
        ..fast_config()
    };
    let addr = start_server(config, &["alpha"]).await;

    let mut ada = TestClient::connect(addr).await;
    ada.hello("id-a", "ada").await;
    let _ = ada.expect_kind(EventKind::Lobby).await;
    let mut bob = TestClient::connect(addr).await;
    bob.hello("id-b", "bob").await;
    let _ = bob.expect_kind(EventKind::Lobby).await;

    // Join while the coordinator is still ticking.
    let mut cleo = TestClient::connect(addr).await;
    cleo.hello("id-c", "cleo").await;
    let _ = cleo.expect_kind(EventKind::Lobby).await;

    let words = cleo.next_event_of(EventKind::Words).await;
    assert_eq!(
        words.data,
        Some(EventData::Words {
            words: vec!["alpha".to_string(); 3]
        })
    );
    // And the late joiner can race normally.
    cleo.word("alpha").await;
    let wpm = cleo.next_event_of(EventKind::Wpm).await;
    assert_eq!(wpm.player.as_deref(), Some("cleo"));
}

// ── scoring ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn correct_words_produce_wpm_broadcasts_and_completion() {
    let addr = start_server(fast_config(), &["echo"]).await;

    let mut ada = TestClient::connect(addr).await;
    ada.hello("id-a", "ada").await;
    let mut bob = TestClient::connect(addr).await;
    bob.hello("id-b", "bob").await;
    let _ = ada.next_event_of(EventKind::Words).await;
    let _ = bob.next_event_of(EventKind::Words).await;

    for _ in 0..3 {
        ada.word("echo").await;
        // One self-addressed wpm plus the group broadcast copy.
        for _ in 0..2 {
            let wpm = ada.expect_kind(EventKind::Wpm).await;
            assert_eq!(wpm.player.as_deref(), Some("ada"));
            assert!(matches!(wpm.data, Some(EventData::Value { .. })));
        }
        // The peer sees the broadcast copy.
        let seen = bob.next_event_of(EventKind::Wpm).await;
        assert_eq!(seen.player.as_deref(), Some("ada"));
    }

    let done = ada.expect_kind(EventKind::Completed).await;
    assert_eq!(done.player.as_deref(), Some("ada"));
}

#[tokio::test]
async fn wrong_word_is_silent_and_does_not_advance() {
    let addr = start_server(fast_config(), &["echo"]).await;

    let mut ada = TestClient::connect(addr).await;
    ada.hello("id-a", "ada").await;
    let mut bob = TestClient::connect(addr).await;
    bob.hello("id-b", "bob").await;
    let _ = ada.next_event_of(EventKind::Words).await;
    let _ = bob.next_event_of(EventKind::Words).await;

    bob.word("wrong").await;
    bob.expect_quiet(Duration::from_millis(200)).await;

    // The local index did not move: the first word is still expected.
    bob.word("echo").await;
    let _ = bob.expect_kind(EventKind::Wpm).await;
    let _ = bob.expect_kind(EventKind::Wpm).await;
    bob.expect_quiet(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn object_without_word_field_is_a_protocol_error() {
    let addr = start_server(fast_config(), &["echo"]).await;

    let mut ada = TestClient::connect(addr).await;
    ada.hello("id-a", "ada").await;
    let mut bob = TestClient::connect(addr).await;
    bob.hello("id-b", "bob").await;
    let _ = ada.next_event_of(EventKind::Words).await;

    ada.send(r#"{"woord":"echo"}"#).await;
    let _ = ada.expect_kind(EventKind::Error).await;
    // The connection survives the protocol error.
    ada.word("echo").await;
    let _ = ada.expect_kind(EventKind::Wpm).await;
}

// ── voluntary disconnect ─────────────────────────────────────────────────

#[tokio::test]
async fn disconnect_request_gets_bye_and_close() {
    let addr = start_server(fast_config(), &["alpha"]).await;
    let mut ada = TestClient::connect(addr).await;
    ada.hello("id-a", "ada").await;
    let _ = ada.expect_kind(EventKind::Lobby).await;

    ada.send(r#"{"type":"disconnect"}"#).await;
    let _ = ada.expect_kind(EventKind::Bye).await;
    ada.expect_closed().await;
}

#[tokio::test]
async fn disconnect_flag_form_is_honored() {
    let addr = start_server(fast_config(), &["alpha"]).await;
    let mut ada = TestClient::connect(addr).await;
    ada.hello("id-a", "ada").await;
    let _ = ada.expect_kind(EventKind::Lobby).await;

    ada.send(r#"{"disconnect":true}"#).await;
    let _ = ada.expect_kind(EventKind::Bye).await;
    ada.expect_closed().await;
}

// ── capacity gates ───────────────────────────────────────────────────────

#[tokio::test]
async fn connection_cap_rejects_with_error_before_any_handler() {
    let config = Config {
        max_connections: Some(1),
        ..fast_config()
    };
    let addr = start_server(config, &["alpha"]).await;

    let mut ada = TestClient::connect(addr).await;
    ada.hello("id-a", "ada").await;
    let _ = ada.expect_kind(EventKind::Lobby).await;

    let mut turned_away = TestClient::connect(addr).await;
    let event = turned_away.expect_kind(EventKind::Error).await;
    assert!(event.message.unwrap().contains("full"));
    turned_away.expect_closed().await;
}

#[tokio::test]
async fn exhausted_registry_rejects_new_players() {
    let config = Config {
        registry_capacity: 1,
        lobby_capacity: 2,
        countdown_start: 1,
        countdown_tick_ms: 25,
        ..fast_config()
    };
    let addr = start_server(config, &["alpha"]).await;

    let mut ada = TestClient::connect(addr).await;
    ada.hello("id-a", "ada").await;
    let mut bob = TestClient::connect(addr).await;
    bob.hello("id-b", "bob").await;
    // The only session has started: nothing is eligible and nothing can be
    // created.
    let _ = ada.next_event_of(EventKind::Words).await;

    let mut cleo = TestClient::connect(addr).await;
    cleo.hello("id-c", "cleo").await;
    let event = cleo.expect_kind(EventKind::Error).await;
    assert!(event.message.unwrap().contains("session"));
    cleo.expect_closed().await;
}

// ── timeout policies ─────────────────────────────────────────────────────

#[tokio::test]
async fn silent_player_is_kicked_for_inactivity() {
    let config = Config {
        inactivity_kick_secs: 1,
        countdown_start: 1,
        countdown_tick_ms: 25,
        ..fast_config()
    };
    let addr = start_server(config, &["alpha"]).await;

    let mut ada = TestClient::connect(addr).await;
    ada.hello("id-a", "ada").await;
    let mut bob = TestClient::connect(addr).await;
    bob.hello("id-b", "bob").await;
    let _ = ada.next_event_of(EventKind::Words).await;

    // Send nothing after the race starts.
    let _ = ada.next_event_of(EventKind::InactiveTimeout).await;
    ada.expect_closed().await;
}

#[tokio::test]
async fn hard_limit_ends_the_session_for_everyone() {
    let config = Config {
        hard_timeout_secs: 1,
        countdown_start: 1,
        countdown_tick_ms: 25,
        ..fast_config()
    };
    let addr = start_server(config, &["alpha"]).await;

    let mut ada = TestClient::connect(addr).await;
    ada.hello("id-a", "ada").await;
    let mut bob = TestClient::connect(addr).await;
    bob.hello("id-b", "bob").await;

    let _ = ada.next_event_of(EventKind::SessionEnd).await;
    let _ = bob.next_event_of(EventKind::SessionEnd).await;
    ada.expect_closed().await;
    bob.expect_closed().await;
}

#[tokio::test]
async fn grace_window_warns_then_times_out() {
    let config = Config {
        words_per_race: 1,
        countdown_start: 1,
        countdown_tick_ms: 25,
        grace_window_secs: 2,
        grace_warning_interval_secs: 1,
        ..fast_config()
    };
    let addr = start_server(config, &["echo"]).await;

    let mut ada = TestClient::connect(addr).await;
    ada.hello("id-a", "ada").await;
    let mut bob = TestClient::connect(addr).await;
    bob.hello("id-b", "bob").await;
    let _ = ada.next_event_of(EventKind::Words).await;

    ada.word("echo").await;
    let _ = ada.next_event_of(EventKind::Completed).await;
    let warning = ada.next_event_of(EventKind::TimeoutWarning).await;
    assert!(matches!(warning.data, Some(EventData::Remaining { .. })));
    let _ = ada.next_event_of(EventKind::Timeout).await;
    ada.expect_closed().await;
}
