//! End-to-end tests over a real socket: RESP command round trips and the
//! admin HTTP surface.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use chronos_server::Config;

/// Get an available port for testing.
fn get_available_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Wait for the server to be ready by polling the port.
fn wait_for_server(addr: SocketAddr, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if TcpStream::connect_timeout(&addr, Duration::from_millis(50)).is_ok() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

/// Start a test server; snapshots are disabled so tests leave no files.
fn start_test_server(resp_port: u16, admin_port: u16) -> (thread::JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    let handle = thread::spawn(move || {
        let config_str = format!(
            r#"
            [server]
            listen = "127.0.0.1:{}"
            admin_listen = "127.0.0.1:{}"
            worker_threads = 2

            [cache]
            segments = 16
            max_memory_bytes = "16MB"

            [prefetch]
            workers = 2

            [snapshot]
            enabled = false
            "#,
            resp_port, admin_port
        );

        let config: Config = toml::from_str(&config_str).unwrap();
        let _ = chronos_server::run(config, shutdown_clone);
    });

    (handle, shutdown)
}

fn stop_test_server(handle: thread::JoinHandle<()>, shutdown: Arc<AtomicBool>) {
    shutdown.store(true, Ordering::SeqCst);
    let _ = handle.join();
}

/// Send a RESP command and read the response.
fn send_command(stream: &mut TcpStream, cmd: &[u8]) -> Vec<u8> {
    stream.write_all(cmd).unwrap();
    stream.flush().unwrap();

    let mut response = vec![0u8; 64 * 1024];
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();

    match stream.read(&mut response) {
        Ok(n) => {
            response.truncate(n);
            response
        }
        Err(_) => Vec::new(),
    }
}

fn set_cmd(key: &str, value: &str) -> Vec<u8> {
    format!(
        "*3\r\n$3\r\nSET\r\n${}\r\n{}\r\n${}\r\n{}\r\n",
        key.len(),
        key,
        value.len(),
        value
    )
    .into_bytes()
}

fn get_cmd(key: &str) -> Vec<u8> {
    format!("*2\r\n$3\r\nGET\r\n${}\r\n{}\r\n", key.len(), key).into_bytes()
}

struct TestServer {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    addr: SocketAddr,
    admin_addr: SocketAddr,
}

impl TestServer {
    fn start() -> Self {
        let resp_port = get_available_port();
        let admin_port = get_available_port();
        let (handle, shutdown) = start_test_server(resp_port, admin_port);

        let addr: SocketAddr = format!("127.0.0.1:{}", resp_port).parse().unwrap();
        let admin_addr: SocketAddr = format!("127.0.0.1:{}", admin_port).parse().unwrap();
        assert!(
            wait_for_server(addr, Duration::from_secs(5)),
            "server failed to start within timeout"
        );

        Self {
            handle: Some(handle),
            shutdown,
            addr,
            admin_addr,
        }
    }

    fn connect(&self) -> TcpStream {
        let conn = TcpStream::connect(self.addr).expect("failed to connect");
        conn.set_nodelay(true).unwrap();
        conn
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            stop_test_server(handle, self.shutdown.clone());
        }
    }
}

#[test]
fn test_ping() {
    let server = TestServer::start();
    let mut conn = server.connect();

    let resp = send_command(&mut conn, b"*1\r\n$4\r\nPING\r\n");
    assert_eq!(&resp, b"+PONG\r\n");

    let resp = send_command(&mut conn, b"*2\r\n$4\r\nPING\r\n$5\r\nhello\r\n");
    assert_eq!(&resp, b"$5\r\nhello\r\n");
}

#[test]
fn test_basic_round_trip() {
    let server = TestServer::start();
    let mut conn = server.connect();

    let resp = send_command(&mut conn, &set_cmd("user:1", "Alice"));
    assert_eq!(&resp, b"+OK\r\n");

    let resp = send_command(&mut conn, &get_cmd("user:1"));
    assert_eq!(&resp, b"$5\r\nAlice\r\n");

    let resp = send_command(&mut conn, b"*2\r\n$3\r\nDEL\r\n$6\r\nuser:1\r\n");
    assert_eq!(&resp, b":1\r\n");

    let resp = send_command(&mut conn, &get_cmd("user:1"));
    assert_eq!(&resp, b"$-1\r\n");
}

#[test]
fn test_expiry() {
    let server = TestServer::start();
    let mut conn = server.connect();

    let resp = send_command(
        &mut conn,
        b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nEX\r\n$1\r\n1\r\n",
    );
    assert_eq!(&resp, b"+OK\r\n");

    let resp = send_command(&mut conn, b"*2\r\n$3\r\nTTL\r\n$1\r\nk\r\n");
    assert!(resp == b":1\r\n" || resp == b":0\r\n", "ttl reply {:?}", resp);

    thread::sleep(Duration::from_millis(1500));

    let resp = send_command(&mut conn, &get_cmd("k"));
    assert_eq!(&resp, b"$-1\r\n");

    let resp = send_command(&mut conn, b"*2\r\n$3\r\nTTL\r\n$1\r\nk\r\n");
    assert_eq!(&resp, b":-2\r\n");
}

#[test]
fn test_expire_command() {
    let server = TestServer::start();
    let mut conn = server.connect();

    send_command(&mut conn, &set_cmd("k", "v"));
    let resp = send_command(&mut conn, b"*3\r\n$6\r\nEXPIRE\r\n$1\r\nk\r\n$3\r\n600\r\n");
    assert_eq!(&resp, b":1\r\n");

    let resp = send_command(&mut conn, b"*2\r\n$3\r\nTTL\r\n$1\r\nk\r\n");
    let text = String::from_utf8(resp).unwrap();
    let seconds: i64 = text.trim_start_matches(':').trim_end().parse().unwrap();
    assert!((595..=600).contains(&seconds));
}

#[test]
fn test_del_multi() {
    let server = TestServer::start();
    let mut conn = server.connect();

    send_command(&mut conn, &set_cmd("a", "1"));
    send_command(&mut conn, &set_cmd("b", "2"));

    let resp = send_command(
        &mut conn,
        b"*4\r\n$3\r\nDEL\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n",
    );
    assert_eq!(&resp, b":2\r\n");
}

#[test]
fn test_keys_glob() {
    let server = TestServer::start();
    let mut conn = server.connect();

    send_command(&mut conn, &set_cmd("user:1", "a"));
    send_command(&mut conn, &set_cmd("user:2", "b"));
    send_command(&mut conn, &set_cmd("session:1", "c"));

    let resp = send_command(&mut conn, b"*2\r\n$4\r\nKEYS\r\n$6\r\nuser:?\r\n");
    let text = String::from_utf8(resp).unwrap();
    assert!(text.starts_with("*2\r\n"), "reply: {}", text);
    assert!(text.contains("user:1"));
    assert!(text.contains("user:2"));
    assert!(!text.contains("session:1"));
}

#[test]
fn test_flushall_and_info() {
    let server = TestServer::start();
    let mut conn = server.connect();

    send_command(&mut conn, &set_cmd("k", "v"));
    send_command(&mut conn, &get_cmd("k"));

    let resp = send_command(&mut conn, b"*1\r\n$8\r\nFLUSHALL\r\n");
    assert_eq!(&resp, b"+OK\r\n");

    let resp = send_command(&mut conn, b"*1\r\n$4\r\nINFO\r\n");
    let text = String::from_utf8(resp).unwrap();
    assert!(text.contains("hits:"), "info reply: {}", text);
    assert!(text.contains("keys:0"));
}

#[test]
fn test_unknown_command_keeps_connection() {
    let server = TestServer::start();
    let mut conn = server.connect();

    let resp = send_command(&mut conn, b"*1\r\n$7\r\nNOTACMD\r\n");
    assert!(resp.starts_with(b"-ERR unknown command"));

    // Still serving on the same connection.
    let resp = send_command(&mut conn, b"*1\r\n$4\r\nPING\r\n");
    assert_eq!(&resp, b"+PONG\r\n");
}

#[test]
fn test_concurrent_connections() {
    let server = TestServer::start();

    let mut connections: Vec<TcpStream> = (0..10).map(|_| server.connect()).collect();

    for (i, conn) in connections.iter_mut().enumerate() {
        let key = format!("key{}", i);
        let value = format!("value{}", i);

        let resp = send_command(conn, &set_cmd(&key, &value));
        assert_eq!(&resp, b"+OK\r\n", "SET from connection {} failed", i);

        let resp = send_command(conn, &get_cmd(&key));
        let expected = format!("${}\r\n{}\r\n", value.len(), value);
        assert_eq!(resp, expected.as_bytes(), "GET from connection {} failed", i);
    }

    // Cross-connection visibility.
    for (i, conn) in connections.iter_mut().enumerate() {
        let other = format!("key{}", (i + 5) % 10);
        let expected_value = format!("value{}", (i + 5) % 10);
        let resp = send_command(conn, &get_cmd(&other));
        let expected = format!("${}\r\n{}\r\n", expected_value.len(), expected_value);
        assert_eq!(resp, expected.as_bytes());
    }
}

/// Minimal HTTP GET over a raw socket; returns (status_line, body).
fn http_get(addr: SocketAddr, path: &str) -> (String, String) {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    write!(
        stream,
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        path
    )
    .unwrap();

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);
    let status = response.lines().next().unwrap_or("").to_string();
    let body = response
        .split("\r\n\r\n")
        .nth(1)
        .unwrap_or("")
        .to_string();
    (status, body)
}

#[test]
fn test_admin_endpoints() {
    let server = TestServer::start();
    let mut conn = server.connect();

    // Generate some traffic so the counters move.
    send_command(&mut conn, &set_cmd("k", "v"));
    for _ in 0..20 {
        send_command(&mut conn, &get_cmd("k"));
    }

    let (status, body) = http_get(server.admin_addr, "/stats");
    assert!(status.contains("200"), "status: {}", status);
    assert!(body.contains("\"hits\":"), "body: {}", body);
    assert!(body.contains("\"latency\""));

    let (_status, body) = http_get(server.admin_addr, "/metrics");
    assert!(body.contains("chronos_hits_total"), "body: {}", body);
    assert!(body.contains("chronos_memory_bytes"));
    assert!(body.contains("chronos_latency_milliseconds{quantile=\"0.99\"}"));

    // All-hit traffic scores a healthy 100.
    let (status, body) = http_get(server.admin_addr, "/health");
    assert!(status.contains("200"), "status: {} body: {}", status, body);
    assert!(body.contains("\"status\":\"healthy\""), "body: {}", body);
}

#[test]
fn test_health_degraded_on_cold_cache() {
    let server = TestServer::start();
    let mut conn = server.connect();

    // Nothing but misses: hit rate 0 drops the score to 70.
    for i in 0..10 {
        send_command(&mut conn, &get_cmd(&format!("missing{}", i)));
    }

    let (status, body) = http_get(server.admin_addr, "/health");
    assert!(status.contains("503"), "status: {} body: {}", status, body);
    assert!(body.contains("\"status\":\"degraded\""));
    assert!(body.contains("hit rate"));
}
