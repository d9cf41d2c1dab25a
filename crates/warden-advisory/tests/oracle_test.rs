use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use warden_advisory::{AdvisoryError, Advisor, OracleClient, OracleConfig};

const PROMPT: &str = "The drone's temperature is 21.50°C. Should it land or continue hovering?";

/// Serve exactly one HTTP response and hand back the request body.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let request = read_request_body(&mut sock).await;
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        sock.write_all(response.as_bytes()).await.unwrap();
        sock.shutdown().await.ok();
        request
    });
    (format!("http://{}/api/generate", addr), handle)
}

async fn read_request_body(sock: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    loop {
        let n = sock.read(&mut tmp).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse::<usize>().unwrap())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                return String::from_utf8_lossy(&buf[end + 4..end + 4 + len]).into_owned();
            }
        }
    }
    String::new()
}

fn client(endpoint: String, stream: bool) -> OracleClient {
    OracleClient::new(OracleConfig {
        endpoint,
        model: "llama3".into(),
        stream,
        timeout_ms: Some(2_000),
    })
    .unwrap()
}

#[tokio::test]
async fn single_shot_reply_is_returned_trimmed() {
    let (url, server) = serve_once("200 OK", r#"{"model":"llama3","response":"  land\n","done":true}"#).await;
    let oracle = client(url, false);

    assert_eq!(oracle.try_ask(PROMPT).await.unwrap(), "land");

    let request: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(request["model"], "llama3");
    assert_eq!(request["prompt"], PROMPT);
    assert_eq!(request["stream"], false);
    assert_eq!(oracle.link_health().consecutive_failures, 0);
}

#[tokio::test]
async fn streamed_fragments_are_concatenated_in_order() {
    let body = concat!(
        "{\"response\":\"ho\",\"done\":false}\n",
        "{\"response\":\"ver\",\"done\":false}\n",
        "{\"response\":\"\",\"done\":true}\n",
    );
    let (url, server) = serve_once("200 OK", body).await;
    let oracle = client(url, true);

    assert_eq!(oracle.ask(PROMPT, "fallback").await, "hover");

    let request: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(request["stream"], true);
}

#[tokio::test]
async fn malformed_json_yields_the_fallback() {
    let (url, _server) = serve_once("200 OK", "{\"response\": land").await;
    let oracle = client(url, false);
    assert_eq!(oracle.ask(PROMPT, "hover").await, "hover");
    assert_eq!(oracle.link_health().consecutive_failures, 1);
}

#[tokio::test]
async fn missing_response_field_is_an_error_not_an_answer() {
    let (url, _server) = serve_once("200 OK", r#"{"error":"model not found"}"#).await;
    let oracle = client(url, false);
    assert!(matches!(oracle.try_ask(PROMPT).await, Err(AdvisoryError::MissingResponse)));
}

#[tokio::test]
async fn http_errors_yield_the_fallback() {
    let (url, _server) = serve_once("500 Internal Server Error", "{}").await;
    let oracle = client(url.clone(), false);
    assert_eq!(oracle.ask(PROMPT, "hover").await, "hover");

    let (url, _server) = serve_once("500 Internal Server Error", "{}").await;
    let oracle = client(url, false);
    assert!(matches!(oracle.try_ask(PROMPT).await, Err(AdvisoryError::Status(500))));
}

#[tokio::test]
async fn unreachable_oracle_yields_the_fallback() {
    // grab a free port, then close it again
    let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let oracle = client(format!("http://{}/api/generate", addr), false);

    assert_eq!(oracle.ask(PROMPT, "hover").await, "hover");
    assert_eq!(oracle.ask(PROMPT, "hover").await, "hover");
    let health = oracle.link_health();
    assert_eq!(health.consecutive_failures, 2);
    assert_eq!(health.quality, 60);
}
