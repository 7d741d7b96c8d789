//! Generate-endpoint client tests against a loopback HTTP server.
//!
//! The server answers each request with the next scripted response and
//! records the request bodies it received. Every response closes the
//! connection, so one request maps to one TCP accept.
//!
//! Run with:
//!   cargo test --test generate

use edgequake_pdf2docx::pipeline::extract::{build_document, RawPage};
use edgequake_pdf2docx::pipeline::layout::{PageLayout, TextRun};
use edgequake_pdf2docx::pipeline::transform::GenerateClient;
use edgequake_pdf2docx::{
    revise_document, ConversionConfig, LayoutConfig, OutputFormat, Pdf2DocxError, ServiceConfig,
    TransformError, Transformer,
};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// ── Loopback server ──────────────────────────────────────────────────────────

struct Scripted {
    status: u16,
    body: String,
}

fn reply(status: u16, body: &str) -> Scripted {
    Scripted {
        status,
        body: body.to_string(),
    }
}

/// Serve `script` in order; returns the endpoint URL and the request log.
async fn serve(script: Vec<Scripted>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api/generate", listener.local_addr().unwrap());
    let log = Arc::new(Mutex::new(Vec::new()));
    let requests = Arc::clone(&log);

    tokio::spawn(async move {
        for step in script {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let body = read_request(&mut socket).await;
            requests.lock().unwrap().push(body);
            let head = format!(
                "HTTP/1.1 {} Scripted\r\nContent-Type: application/x-ndjson\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n",
                step.status,
                step.body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(step.body.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (url, log)
}

/// Read one HTTP request and return its body.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find(&buf, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                return String::from_utf8_lossy(&buf[end + 4..end + 4 + len]).into_owned();
            }
        }
    }
    String::new()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn service(url: &str, stream: bool) -> ServiceConfig {
    ServiceConfig {
        endpoint: url.to_string(),
        model: "test-model".to_string(),
        stream,
        ..Default::default()
    }
}

const HELLO_FRAMES: &str = "{\"response\":\"Hello \",\"done\":false}\n\
                            {\"response\":\"world.\",\"done\":false}\n\
                            {\"response\":\"\",\"done\":true}\n";

// ── Client ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn streamed_frames_are_concatenated() {
    let (url, log) = serve(vec![reply(200, HELLO_FRAMES)]).await;
    let client = GenerateClient::new(&service(&url, true), 5).unwrap();

    let out = client.transform("Fix grammar.", "helo wrld").await.unwrap();
    assert_eq!(out, "Hello world.");

    let request: serde_json::Value = serde_json::from_str(&log.lock().unwrap()[0]).unwrap();
    assert_eq!(request["model"], "test-model");
    assert_eq!(request["stream"], true);
    let prompt = request["prompt"].as_str().unwrap();
    assert!(prompt.contains("Fix grammar."));
    assert!(prompt.contains("helo wrld"));
}

#[tokio::test]
async fn malformed_frames_are_skipped() {
    let body = "{\"response\":\"Hello \",\"done\":false}\n\
                not json at all\n\
                {\"response\":\"world.\",\"done\":true}\n";
    let (url, _) = serve(vec![reply(200, body)]).await;
    let client = GenerateClient::new(&service(&url, true), 5).unwrap();

    assert_eq!(client.transform("i", "t").await.unwrap(), "Hello world.");
}

#[tokio::test]
async fn stream_without_done_is_incomplete() {
    let body = "{\"response\":\"Hello \",\"done\":false}\n";
    let (url, _) = serve(vec![reply(200, body)]).await;
    let client = GenerateClient::new(&service(&url, true), 5).unwrap();

    let err = client.transform("i", "t").await.unwrap_err();
    assert!(matches!(err, TransformError::Incomplete { frames: 1 }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn single_object_answer() {
    let (url, log) = serve(vec![reply(200, "{\"response\":\"Fixed.\",\"done\":true}")]).await;
    let client = GenerateClient::new(&service(&url, false), 5).unwrap();

    assert_eq!(client.transform("i", "t").await.unwrap(), "Fixed.");
    let request: serde_json::Value = serde_json::from_str(&log.lock().unwrap()[0]).unwrap();
    assert_eq!(request["stream"], false);
}

#[tokio::test]
async fn error_status_is_reported() {
    let (url, _) = serve(vec![reply(404, "model 'test-model' not found")]).await;
    let client = GenerateClient::new(&service(&url, true), 5).unwrap();

    match client.transform("i", "t").await {
        Err(TransformError::Status { status, body }) => {
            assert_eq!(status, 404);
            assert!(body.contains("not found"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn refused_connection_is_transient() {
    // Bind then drop to get a port nobody listens on.
    let port = {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap().port()
    };
    let url = format!("http://127.0.0.1:{port}/api/generate");
    let client = GenerateClient::new(&service(&url, true), 5).unwrap();

    let err = client.transform("i", "t").await.unwrap_err();
    assert!(matches!(err, TransformError::Connection { .. }));
    assert!(err.is_transient());
}

// ── Through the invoker ──────────────────────────────────────────────────────

/// Two pages of ~70 characters each; with a 100-character budget every
/// page becomes its own chunk.
fn two_paragraph_document() -> edgequake_pdf2docx::pipeline::extract::ExtractedDocument {
    let run = |text: &str, y: f32| TextRun {
        text: format!("{text} {}", "lorem ".repeat(10).trim_end()),
        x: 50.0,
        y,
        width: 80.0,
        height: 10.0,
    };
    let pages = vec![
        RawPage {
            layout: PageLayout {
                number: 1,
                runs: vec![run("first page", 20.0)],
                images: vec![],
            },
            ..Default::default()
        },
        RawPage {
            layout: PageLayout {
                number: 2,
                runs: vec![run("second page", 20.0)],
                images: vec![],
            },
            ..Default::default()
        },
    ];
    build_document(pages, &LayoutConfig::default(), Default::default()).unwrap()
}

fn config(url: &str) -> ConversionConfig {
    ConversionConfig::builder()
        .endpoint(url)
        .model("test-model")
        .max_chunk_chars(100)
        .max_retries(2)
        .retry_backoff_ms(10)
        .output_format(OutputFormat::Json)
        .build()
        .unwrap()
}

fn done(text: &str) -> String {
    format!("{{\"response\":\"{text}\",\"done\":true}}\n")
}

#[tokio::test]
async fn server_error_is_retried() {
    let (url, log) = serve(vec![
        reply(503, "busy"),
        reply(200, &done("First page.")),
        reply(200, &done("Second page.")),
    ])
    .await;
    let config = config(&url);
    let client = GenerateClient::new(&config.service, 5).unwrap();

    let output = revise_document(two_paragraph_document(), "doc", &client, &config)
        .await
        .unwrap();

    assert_eq!(output.stats.retries, 1);
    assert_eq!(output.stats.chunks_sent, 2);
    assert_eq!(log.lock().unwrap().len(), 3);
    let json: serde_json::Value = serde_json::from_slice(&output.document).unwrap();
    assert_eq!(json["doc"], serde_json::json!(["First page.", "Second page."]));
}

#[tokio::test]
async fn client_error_aborts_without_sending_later_chunks() {
    let (url, log) = serve(vec![
        reply(400, "bad request"),
        reply(200, &done("never")),
    ])
    .await;
    let config = config(&url);
    let client = GenerateClient::new(&config.service, 5).unwrap();

    let err = revise_document(two_paragraph_document(), "doc", &client, &config)
        .await
        .unwrap_err();

    match err {
        Pdf2DocxError::TransformFailed { chunk, attempts, .. } => {
            assert_eq!(chunk, 1);
            assert_eq!(attempts, 1);
        }
        other => panic!("expected TransformFailed, got {other:?}"),
    }
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn model_chatter_is_stripped() {
    let answer = "{\"response\":\"Sure! Here is the corrected text:\\n\\n\",\"done\":false}\n\
                  {\"response\":\"First page.\",\"done\":true}\n";
    let (url, _) = serve(vec![reply(200, answer), reply(200, &done("Second page."))]).await;
    let config = config(&url);
    let client = GenerateClient::new(&config.service, 5).unwrap();

    let output = revise_document(two_paragraph_document(), "doc", &client, &config)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.document).unwrap();
    assert_eq!(json["doc"][0], "First page.");
}
