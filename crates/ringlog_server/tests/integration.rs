//! End-to-end tests over loopback TCP.

use ringlog_core::SeekTo;
use ringlog_server::ServerConfig;
use ringlog_testkit::{LineClient, TestServer};
use std::net::SocketAddr;

#[tokio::test]
async fn eviction_and_seek_scenario() {
    let server = TestServer::start(2).await;
    let mut client = LineClient::connect(server.addr()).await.unwrap();

    client.exchange(b"a\n", 2).await.unwrap();
    client.exchange(b"bb\n", 5).await.unwrap();
    assert_eq!(client.exchange(b"ccc\n", 7).await.unwrap(), b"bb\nccc\n");
    assert_eq!(client.seek(SeekTo::new(0, 1), 6).await.unwrap(), b"b\nccc\n");
    assert_eq!(client.seek(SeekTo::new(1, 3), 1).await.unwrap(), b"\n");

    // Commands are never stored.
    assert_eq!(server.log().len(), 2);
    server.stop().await;
}

#[tokio::test]
async fn two_sessions_append_concurrently() {
    let server = TestServer::start(10).await;
    let before = server.log().len();

    let mut first = LineClient::connect(server.addr()).await.unwrap();
    let mut second = LineClient::connect(server.addr()).await.unwrap();
    first.send_raw(b"from-first\n").await.unwrap();
    second.send_raw(b"from-second\n").await.unwrap();
    first.finish().await.unwrap();
    second.finish().await.unwrap();
    first.read_until_closed().await.unwrap();
    second.read_until_closed().await.unwrap();

    let log = server.log();
    assert_eq!(log.len(), before + 2);
    let all = String::from_utf8(log.read_all().unwrap()).unwrap();
    assert_eq!(all.matches("from-first\n").count(), 1);
    assert_eq!(all.matches("from-second\n").count(), 1);
    assert_eq!(all.len(), "from-first\n".len() + "from-second\n".len());

    server.stop().await;
}

#[tokio::test]
async fn error_in_one_session_leaves_others_running() {
    let server = TestServer::start(4).await;

    let mut bad = LineClient::connect(server.addr()).await.unwrap();
    let mut good = LineClient::connect(server.addr()).await.unwrap();

    bad.send_raw(b"AESDCHAR_IOCSEEKTO:0,0\n").await.unwrap();
    assert!(bad.read_until_closed().await.unwrap().is_empty());

    assert_eq!(good.exchange(b"still here\n", 11).await.unwrap(), b"still here\n");
    server.stop().await;
}

#[tokio::test]
async fn graceful_drain_of_three_sessions() {
    let server = TestServer::start(10).await;
    let mut clients = Vec::new();

    for i in 0..3 {
        let mut client = LineClient::connect(server.addr()).await.unwrap();
        let line = format!("in-flight-{i}\n");
        let expected = server.log().total_length() as usize + line.len();
        client.exchange(line.as_bytes(), expected).await.unwrap();
        client.send_raw(b"half a rec").await.unwrap();
        clients.push(client);
    }

    let log = std::sync::Arc::clone(server.log());
    let report = server.stop().await;

    // Every session was still live and was drained, not dropped.
    assert_eq!(report.accepted, 3);
    assert_eq!(report.drained, 3);
    assert_eq!(report.records_committed, 3);

    // After the drain every connection is closed and only complete records
    // were committed.
    for client in &mut clients {
        client.read_until_closed().await.unwrap();
    }
    assert_eq!(log.len(), 3);
    assert_eq!(
        log.read_all().unwrap(),
        b"in-flight-0\nin-flight-1\nin-flight-2\n"
    );
}

#[tokio::test]
async fn journal_survives_restart_when_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ringlog.data");
    let config = ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)))
        .with_capacity(2)
        .with_data_path(&path)
        .with_remove_data_on_shutdown(false);

    let server = TestServer::with_config(config.clone()).await;
    let mut client = LineClient::connect(server.addr()).await.unwrap();
    for (line, len) in [(&b"one\n"[..], 4), (b"two\n", 8), (b"three\n", 10)] {
        client.exchange(line, len).await.unwrap();
    }
    client.finish().await.unwrap();
    client.read_until_closed().await.unwrap();
    server.stop().await;

    let server = TestServer::with_config(config).await;
    assert_eq!(server.log().read_all().unwrap(), b"two\nthree\n");
    let recovery = server.log().recovery_report();
    assert_eq!(recovery.records_found, 3);
    assert!(recovery.compacted);
    server.stop().await;

    assert_eq!(std::fs::read(&path).unwrap(), b"two\nthree\n");
}
