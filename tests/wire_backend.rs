//! `WireBackend` and `ConnectionManager` against an in-process fake LDAP server
//!
//! The fake server answers BindRequest and StartTLS with scripted result codes
//! and records the operation tags it receives.

use bytes::BytesMut;
use ldap_failover::protocol::encode::{put_integer, put_tlv};
use ldap_failover::{
    ConnectionConfig, ConnectionManager, DecisionCache, DirectoryBackend, Error,
    MemoryDecisionCache, ServerChoice, TlsConfig, WireBackend, OVERRIDE_MAIN_SERVER_KEY,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const OP_BIND_REQUEST: u8 = 0x60;
const OP_BIND_RESPONSE: u8 = 0x61;
const OP_UNBIND_REQUEST: u8 = 0x42;
const OP_EXTENDED_REQUEST: u8 = 0x77;
const OP_EXTENDED_RESPONSE: u8 = 0x78;

/// Scripted replies plus the log of received operation tags
struct FakeServer {
    port: u16,
    received: Arc<Mutex<Vec<u8>>>,
}

impl FakeServer {
    async fn start(bind_code: i64, start_tls_code: i64) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&received);

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 512];
            loop {
                let n = match socket.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                buf.extend_from_slice(&chunk[..n]);

                while let Some((id, op, len)) = parse_request(&buf) {
                    buf.drain(..len);
                    log.lock().unwrap().push(op);
                    let reply = match op {
                        OP_BIND_REQUEST => response(id, OP_BIND_RESPONSE, bind_code),
                        OP_EXTENDED_REQUEST => response(id, OP_EXTENDED_RESPONSE, start_tls_code),
                        OP_UNBIND_REQUEST => return,
                        _ => continue,
                    };
                    if socket.write_all(&reply).await.is_err() {
                        return;
                    }
                }
            }
        });

        Self { port, received }
    }

    fn received(&self) -> Vec<u8> {
        self.received.lock().unwrap().clone()
    }
}

/// Split one request frame: (message id, operation tag, frame length)
///
/// Requests in these tests are short, so only short-form lengths occur.
fn parse_request(buf: &[u8]) -> Option<(i64, u8, usize)> {
    if buf.len() < 2 {
        return None;
    }
    assert_eq!(buf[0], 0x30, "request is not a SEQUENCE");
    assert!(buf[1] < 0x80, "unexpected long-form length");
    let frame_len = 2 + buf[1] as usize;
    if buf.len() < frame_len {
        return None;
    }

    assert_eq!(buf[2], 0x02, "messageID is not an INTEGER");
    let id_len = buf[3] as usize;
    let id = buf[4..4 + id_len]
        .iter()
        .fold(0i64, |acc, b| (acc << 8) | *b as i64);
    let op = buf[4 + id_len];
    Some((id, op, frame_len))
}

fn response(id: i64, op_tag: u8, code: i64) -> Vec<u8> {
    let mut result = BytesMut::new();
    put_integer(&mut result, 0x0A, code);
    put_tlv(&mut result, 0x04, b"");
    put_tlv(&mut result, 0x04, b"");

    let mut message = BytesMut::new();
    put_integer(&mut message, 0x02, id);
    put_tlv(&mut message, op_tag, &result);

    let mut frame = BytesMut::new();
    put_tlv(&mut frame, 0x30, &message);
    frame.to_vec()
}

/// Port with nothing listening on it
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn config(port: u16) -> ConnectionConfig {
    ConnectionConfig::builder("127.0.0.1")
        .port(port)
        .agent("cn=agent,dc=example,dc=com", "SuchASecret")
        .timeout(Duration::from_secs(2))
        .build()
}

fn insecure_tls() -> TlsConfig {
    TlsConfig::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_bind_success() {
    let server = FakeServer::start(0, 0).await;
    let cache = Arc::new(MemoryDecisionCache::new());
    let mut manager = ConnectionManager::new(WireBackend::new(), cache, config(server.port));

    assert!(manager.init().await.unwrap());
    assert!(manager.is_bound());
    assert_eq!(manager.current_server(), Some(ServerChoice::Primary));

    manager.reset_connection_resource().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.received(), vec![OP_BIND_REQUEST, OP_UNBIND_REQUEST]);
}

#[tokio::test]
async fn test_invalid_credentials() {
    let server = FakeServer::start(49, 0).await;
    let cache = Arc::new(MemoryDecisionCache::new());
    let mut manager = ConnectionManager::new(WireBackend::new(), cache, config(server.port));

    assert!(!manager.init().await.unwrap());
    assert!(!manager.is_bound());
}

#[tokio::test]
async fn test_unavailable_result_code() {
    let server = FakeServer::start(52, 0).await;
    let cache = Arc::new(MemoryDecisionCache::new());
    let mut manager = ConnectionManager::new(WireBackend::new(), cache, config(server.port));

    let err = manager.init().await.unwrap_err();
    assert!(matches!(err, Error::ServerUnavailable(ref msg) if msg.contains("127.0.0.1")));
}

#[tokio::test]
async fn test_failover_to_live_backup() {
    let backup = FakeServer::start(0, 0).await;
    let dead = closed_port().await;
    let config = ConnectionConfig::builder("127.0.0.1")
        .port(dead)
        .backup("ldap://127.0.0.1", Some(backup.port))
        .agent("cn=agent,dc=example,dc=com", "SuchASecret")
        .timeout(Duration::from_secs(2))
        .build();

    let cache = Arc::new(MemoryDecisionCache::new());
    let mut manager = ConnectionManager::new(WireBackend::new(), Arc::clone(&cache), config);

    assert!(manager.init().await.unwrap());
    assert_eq!(manager.current_server(), Some(ServerChoice::Backup));
    assert_eq!(cache.get(OVERRIDE_MAIN_SERVER_KEY), Some(true));
}

#[tokio::test]
async fn test_start_tls_refused() {
    let server = FakeServer::start(0, 2).await;
    let config = ConnectionConfig {
        tls_required: true,
        ..config(server.port)
    };
    let cache = Arc::new(MemoryDecisionCache::new());
    let mut manager = ConnectionManager::new(WireBackend::with_tls(insecure_tls()), cache, config);

    let err = manager.init().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "server not available: Start TLS failed, when connecting to LDAP host 127.0.0.1."
    );
    let received = server.received();
    assert_eq!(received.first(), Some(&OP_EXTENDED_REQUEST));
    assert!(!received.contains(&OP_BIND_REQUEST));
}

#[tokio::test]
async fn test_start_tls_without_tls_config() {
    let server = FakeServer::start(0, 0).await;
    let config = ConnectionConfig {
        tls_required: true,
        ..config(server.port)
    };
    let cache = Arc::new(MemoryDecisionCache::new());
    let mut manager = ConnectionManager::new(WireBackend::new(), cache, config);

    let err = manager.init().await.unwrap_err();
    assert!(err.to_string().contains("Start TLS failed"));
}

#[tokio::test]
async fn test_backend_reports_result_codes() {
    let server = FakeServer::start(49, 0).await;
    let backend = WireBackend::new();

    let mut handle = backend
        .connect("127.0.0.1", server.port, Duration::from_secs(2))
        .await
        .unwrap();
    assert!(backend.is_valid(&handle));

    let code = backend
        .bind(&mut handle, "cn=agent,dc=example,dc=com", "wrong")
        .await
        .unwrap();
    assert_eq!(code.0, 49);
    assert!(backend.is_valid(&handle));

    backend.unbind(handle).await;
}

#[tokio::test]
async fn test_connect_refused_is_server_unavailable() {
    let backend = WireBackend::new();
    let err = backend
        .connect("127.0.0.1", closed_port().await, Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(err.is_server_unavailable());
}
