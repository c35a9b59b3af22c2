use bytes::Bytes;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, Duration};

use tinyredis::config::{Config, ReplicaOf};
use tinyredis::connection::Connection;
use tinyredis::frame::Frame;
use tinyredis::replication::{self, HandshakeError, Role};
use tinyredis::server::serve;

async fn start_server(role: Role) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = Config {
        port: addr.port(),
        sweep_interval_ms: 50,
        ..Config::default()
    };

    tokio::spawn(serve(listener, role, config));

    addr
}

async fn connect(addr: SocketAddr) -> Connection {
    Connection::new(TcpStream::connect(addr).await.unwrap())
}

async fn send(conn: &mut Connection, parts: &[&str]) -> Frame {
    let request = Frame::array_of_bulks(parts.iter().map(|p| p.to_string()));
    conn.write_frame(request).await.unwrap();
    conn.read_frame().await.unwrap().unwrap()
}

fn ok() -> Frame {
    Frame::Simple("OK".to_string())
}

fn bulk(s: &str) -> Frame {
    Frame::Bulk(Bytes::from(s.to_string()))
}

#[tokio::test]
async fn test_set_and_get() {
    let addr = start_server(Role::Master).await;
    let mut conn = connect(addr).await;

    assert_eq!(send(&mut conn, &["SET", "set_get_key_1", "1"]).await, ok());
    assert_eq!(send(&mut conn, &["SET", "set_get_key_2", "Argentina"]).await, ok());
    assert_eq!(send(&mut conn, &["GET", "set_get_key_1"]).await, bulk("1"));
    assert_eq!(send(&mut conn, &["GET", "set_get_key_2"]).await, bulk("Argentina"));
    assert_eq!(send(&mut conn, &["GET", "set_get_nonexistentkey"]).await, Frame::Null);

    // Overwrite.
    assert_eq!(send(&mut conn, &["set", "set_get_key_1", "2"]).await, ok());
    assert_eq!(send(&mut conn, &["get", "set_get_key_1"]).await, bulk("2"));
}

#[tokio::test]
async fn test_store_is_shared_between_connections() {
    let addr = start_server(Role::Master).await;
    let mut writer = connect(addr).await;
    let mut reader = connect(addr).await;

    assert_eq!(send(&mut writer, &["SET", "shared", "value"]).await, ok());
    assert_eq!(send(&mut reader, &["GET", "shared"]).await, bulk("value"));
}

#[tokio::test]
async fn test_set_with_px() {
    let addr = start_server(Role::Master).await;
    let mut conn = connect(addr).await;

    assert_eq!(send(&mut conn, &["SET", "px_key", "v", "PX", "100"]).await, ok());
    assert_eq!(send(&mut conn, &["GET", "px_key"]).await, bulk("v"));

    sleep(Duration::from_millis(150)).await;

    assert_eq!(send(&mut conn, &["GET", "px_key"]).await, Frame::Null);
}

#[tokio::test]
async fn test_set_clears_previous_expiration() {
    let addr = start_server(Role::Master).await;
    let mut conn = connect(addr).await;

    assert_eq!(send(&mut conn, &["SET", "k", "v1", "PX", "100"]).await, ok());
    assert_eq!(send(&mut conn, &["SET", "k", "v2"]).await, ok());

    // Long enough for the background sweeper to run a few times too.
    sleep(Duration::from_millis(250)).await;

    assert_eq!(send(&mut conn, &["GET", "k"]).await, bulk("v2"));
}

#[tokio::test]
async fn test_set_errors() {
    let addr = start_server(Role::Master).await;
    let mut conn = connect(addr).await;

    assert_eq!(send(&mut conn, &["SET", "only_key"]).await, Frame::Null);
    assert_eq!(send(&mut conn, &["GET", "only_key"]).await, Frame::Null);
    assert_eq!(send(&mut conn, &["GET"]).await, Frame::Null);

    assert_eq!(
        send(&mut conn, &["SET", "k", "v", "PX", "abc"]).await,
        Frame::Error("ERR value is not an integer or out of range".to_string())
    );
    assert_eq!(
        send(&mut conn, &["SET", "k", "v", "PX", "-1"]).await,
        Frame::Error("ERR invalid expire time in 'set' command".to_string())
    );
    assert_eq!(
        send(&mut conn, &["SET", "k", "v", "NOPE"]).await,
        Frame::Error("ERR syntax error".to_string())
    );
    assert_eq!(send(&mut conn, &["GET", "k"]).await, Frame::Null);
}

#[tokio::test]
async fn test_ping_echo_replconf() {
    let addr = start_server(Role::Master).await;
    let mut conn = connect(addr).await;

    assert_eq!(
        send(&mut conn, &["PING"]).await,
        Frame::Simple("PONG".to_string())
    );
    assert_eq!(
        send(&mut conn, &["ECHO", "hello"]).await,
        Frame::Simple("hello".to_string())
    );
    assert_eq!(
        send(&mut conn, &["ECHO"]).await,
        Frame::Error("ERR wrong number of arguments for 'echo' command".to_string())
    );
    assert_eq!(
        send(&mut conn, &["REPLCONF", "capa", "psync2"]).await,
        ok()
    );
}

#[tokio::test]
async fn test_unknown_command() {
    let addr = start_server(Role::Master).await;
    let mut conn = connect(addr).await;

    assert_eq!(
        send(&mut conn, &["FLUSHALL"]).await,
        Frame::Error("ERR unknown command 'flushall'".to_string())
    );

    // The connection stays usable.
    assert_eq!(
        send(&mut conn, &["PING"]).await,
        Frame::Simple("PONG".to_string())
    );
}

#[tokio::test]
async fn test_info_role() {
    let master = start_server(Role::Master).await;
    let mut conn = connect(master).await;

    let Frame::Bulk(body) = send(&mut conn, &["INFO", "replication"]).await else {
        panic!("expected a bulk reply");
    };
    assert_eq!(
        body,
        Bytes::from(
            "role:master\r\nmaster_replid:8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb\r\nmaster_repl_offset:0\r\n"
        )
    );

    let replica = start_server(Role::Slave).await;
    let mut conn = connect(replica).await;

    let Frame::Bulk(body) = send(&mut conn, &["INFO", "replication"]).await else {
        panic!("expected a bulk reply");
    };
    assert!(body.starts_with(b"role:slave\r\n"));
}

#[tokio::test]
async fn test_raw_wire_format() {
    let addr = start_server(Role::Master).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Several commands in one write, the last one split across two writes.
    stream
        .write_all(b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nva\r\nl\r\n*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n*0\r\n*1\r\n$4\r\nPI")
        .await
        .unwrap();
    sleep(Duration::from_millis(50)).await;
    stream.write_all(b"NG\r\n").await.unwrap();

    let expected = b"+OK\r\n$5\r\nva\r\nl\r\n+PONG\r\n";
    let mut received = vec![0; expected.len()];
    stream.read_exact(&mut received).await.unwrap();

    assert_eq!(received, expected);
}

#[tokio::test]
async fn test_protocol_error_closes_connection() {
    let addr = start_server(Role::Master).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"*1\r\n$2\r\nPING\r\n").await.unwrap();

    let mut received = Vec::new();
    stream.read_to_end(&mut received).await.unwrap();

    assert_eq!(
        String::from_utf8(received).unwrap(),
        "-ERR Protocol error: expected CRLF after bulk data\r\n"
    );

    // The server keeps accepting other clients.
    let mut conn = connect(addr).await;
    assert_eq!(
        send(&mut conn, &["PING"]).await,
        Frame::Simple("PONG".to_string())
    );
}

#[tokio::test]
async fn test_deeply_nested_array_is_rejected() {
    let addr = start_server(Role::Master).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut request = b"*1\r\n".repeat(64);
    request.extend_from_slice(b"+x\r\n");
    stream.write_all(&request).await.unwrap();

    let mut received = Vec::new();
    stream.read_to_end(&mut received).await.unwrap();

    assert_eq!(
        String::from_utf8(received).unwrap(),
        "-ERR Protocol error: arrays nested deeper than 32 levels\r\n"
    );

    let mut conn = connect(addr).await;
    assert_eq!(
        send(&mut conn, &["PING"]).await,
        Frame::Simple("PONG".to_string())
    );
}

#[tokio::test]
async fn test_concurrent_clients() {
    let addr = start_server(Role::Master).await;

    let clients: Vec<_> = (0..64)
        .map(|client| {
            tokio::spawn(async move {
                let mut conn = connect(addr).await;

                for round in 0..20 {
                    let key = format!("client_{}_key_{}", client, round % 5);
                    let value: String = rand::thread_rng()
                        .sample_iter(&Alphanumeric)
                        .take(16)
                        .map(char::from)
                        .collect();

                    assert_eq!(send(&mut conn, &["SET", key.as_str(), value.as_str()]).await, ok());
                    assert_eq!(send(&mut conn, &["GET", key.as_str()]).await, bulk(&value));
                }
            })
        })
        .collect();

    for client in clients {
        client.await.unwrap();
    }
}

#[tokio::test]
async fn test_replica_handshake() {
    let master = start_server(Role::Master).await;

    let replicaof = ReplicaOf {
        host: master.ip().to_string(),
        port: master.port(),
    };

    let mut link = replication::handshake(&replicaof, 6380).await.unwrap();

    // The master keeps serving the link after the handshake.
    assert_eq!(
        send(&mut link, &["PING"]).await,
        Frame::Simple("PONG".to_string())
    );
}

#[tokio::test]
async fn test_replica_handshake_unexpected_reply() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut conn = Connection::new(stream);
        conn.read_frame().await.unwrap();
        conn.write_frame(Frame::Error("ERR nope".to_string()))
            .await
            .unwrap();
    });

    let replicaof = ReplicaOf {
        host: addr.ip().to_string(),
        port: addr.port(),
    };

    let err = replication::handshake(&replicaof, 6380).await.unwrap_err();

    assert!(matches!(
        err,
        HandshakeError::UnexpectedReply {
            command: "PING",
            ..
        }
    ));
}
