use std::time::Duration;

use quiz_core::time::fixed_clock;
use services::{GlobalStats, StatsClient};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Serve a single canned response and hand back the raw request text.
async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        request
    });
    (format!("http://{addr}/exec"), handle)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn client(endpoint: &str) -> StatsClient {
    StatsClient::new(endpoint).with_clock(fixed_clock())
}

#[tokio::test]
async fn fetches_stats_with_cache_busting_query() {
    let (endpoint, server) = serve_once("200 OK", r#"{"count":42,"avg":85}"#).await;

    let stats = client(&endpoint).fetch_stats("Relatives").await;
    assert_eq!(stats, GlobalStats { count: 42, avg: 85.0 });

    let request = server.await.unwrap();
    let expected = format!(
        "GET /exec?topic=Relatives&t={} ",
        fixed_clock().now_millis()
    );
    assert!(request.starts_with(&expected), "unexpected request: {request}");
}

#[tokio::test]
async fn non_ok_status_falls_back_to_zero() {
    let (endpoint, server) =
        serve_once("500 Internal Server Error", r#"{"count":42,"avg":85}"#).await;

    let stats = client(&endpoint).fetch_stats("Relatives").await;
    assert_eq!(stats, GlobalStats::default());
    server.await.unwrap();
}

#[tokio::test]
async fn malformed_body_falls_back_to_zero() {
    let (endpoint, server) = serve_once("200 OK", "<html>oops</html>").await;

    let stats = client(&endpoint).fetch_stats("Relatives").await;
    assert_eq!(stats, GlobalStats { count: 0, avg: 0.0 });
    server.await.unwrap();
}

#[tokio::test]
async fn missing_fields_default_to_zero() {
    let (endpoint, server) = serve_once("200 OK", r#"{"count":3}"#).await;

    let stats = client(&endpoint).fetch_stats("Relatives").await;
    assert_eq!(stats, GlobalStats { count: 3, avg: 0.0 });
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_endpoint_falls_back_to_zero() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let stats = client(&format!("http://{addr}/exec"))
        .fetch_stats("Relatives")
        .await;
    assert_eq!(stats, GlobalStats::default());

    // Posting to the same dead endpoint is silently dropped.
    client(&format!("http://{addr}/exec"))
        .post_score("Relatives", 67)
        .await;
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(socket);
    });

    let stats = client(&format!("http://{addr}/exec"))
        .with_timeout(Duration::from_millis(100))
        .fetch_stats("Relatives")
        .await;
    assert_eq!(stats, GlobalStats::default());
    server.abort();
}

#[tokio::test]
async fn posts_score_as_json() {
    let (endpoint, server) = serve_once("200 OK", "{}").await;

    client(&endpoint).post_score("Relatives", 67).await;

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /exec "), "unexpected request: {request}");
    assert!(request.to_lowercase().contains("content-type: application/json"));
    assert!(request.ends_with(r#"{"topic":"Relatives","score":67}"#));
}

#[tokio::test]
async fn rejected_post_is_swallowed() {
    let (endpoint, server) = serve_once("403 Forbidden", "{}").await;

    client(&endpoint).post_score("Relatives", 100).await;
    server.await.unwrap();
}
